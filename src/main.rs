/**
 * MIT License
 *
 * Copyright (c) 2025 Takatoshi Kondo
 *
 * Permission is hereby granted, free of charge, to any person obtaining a copy
 * of this software and associated documentation files (the "Software"), to deal
 * in the Software without restriction, including without limitation the rights
 * to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
 * copies of the Software, and to permit persons to whom the Software is
 * furnished to do so, subject to the following conditions:
 *
 * The above copyright notice and this permission notice shall be included in all
 * copies or substantial portions of the Software.
 *
 * THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
 * IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
 * FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
 * AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
 * LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
 * OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
 * SOFTWARE.
 */
use clap::Parser;
use mqtt_gateway::tracing_setup::init_tracing;
use mqtt_gateway::{bridge, GatewayConfig};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(name = "mqtt-gateway")]
#[command(about = "MQTT intercept gateway routing broker events to topic handlers")]
struct Args {
    /// Gateway config file (JSON5); built-in defaults when omitted
    #[arg(long)]
    config: Option<String>,

    /// Port the broker plug-in connects to
    #[arg(long, default_value_t = 1884)]
    bridge_port: u16,

    /// Number of worker threads for async tasks
    #[arg(long)]
    worker_threads: Option<usize>,

    /// Number of blocking threads for blocking operations
    #[arg(long)]
    max_blocking_threads: Option<usize>,

    /// Thread stack size in bytes
    #[arg(long)]
    thread_stack_size: Option<usize>,

    /// Log level
    #[arg(long, default_value = "info")]
    #[arg(value_parser = ["error", "warn", "info", "debug", "trace"])]
    log_level: String,

    /// Enable TCP_NODELAY socket option on bridge connections
    #[arg(long)]
    socket_no_delay: Option<bool>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = match args.log_level.to_lowercase().as_str() {
        "error" => tracing::Level::ERROR,
        "warn" => tracing::Level::WARN,
        "info" => tracing::Level::INFO,
        "debug" => tracing::Level::DEBUG,
        "trace" => tracing::Level::TRACE,
        _ => unreachable!(), // clap validates this
    };

    let worker_threads = args.worker_threads.unwrap_or_else(num_cpus::get);

    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder
        .worker_threads(worker_threads)
        .thread_name("gateway-worker")
        .enable_all();

    if let Some(max_blocking) = args.max_blocking_threads {
        runtime_builder.max_blocking_threads(max_blocking);
    }

    if let Some(stack_size) = args.thread_stack_size {
        runtime_builder.thread_stack_size(stack_size);
    }

    let runtime = runtime_builder.build()?;

    runtime.block_on(async_main(log_level, worker_threads, args))
}

async fn async_main(
    log_level: tracing::Level,
    worker_threads: usize,
    args: Args,
) -> anyhow::Result<()> {
    let _guard = init_tracing(log_level)?;

    info!("Starting MQTT gateway with log level: {log_level}");
    info!("Tokio runtime configuration:");
    info!("  --worker-threads        {worker_threads}");
    info!(
        "  --max-blocking-threads  {}",
        args.max_blocking_threads
            .map_or("None".to_string(), |v| v.to_string())
    );
    info!(
        "  --thread-stack-size     {}",
        args.thread_stack_size
            .map_or("None".to_string(), |v| v.to_string())
    );
    info!(
        "  --socket-no-delay       {}",
        args.socket_no_delay
            .map_or("None".to_string(), |v| v.to_string())
    );

    let config = match &args.config {
        Some(path) => {
            info!("Loading config from {path}");
            GatewayConfig::load(path)?
        }
        None => {
            info!("No --config given, using defaults");
            GatewayConfig::default()
        }
    };
    if config.handlers.is_empty() {
        info!("No route handlers configured; topic events will be dropped");
    }

    let adapter = Arc::new(config.build_adapter()?);
    info!("Handler chain: {:?}", adapter.chain());

    // Expired graceful disconnects are also purged on access; this bounds
    // how long an idle table holds them.
    let purge_interval = config.reconciler.ttl().max(Duration::from_secs(1));
    let purge_adapter = adapter.clone();
    let purge_task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(purge_interval);
        loop {
            ticker.tick().await;
            let purged = purge_adapter.reconciler().purge_expired();
            if purged > 0 {
                info!("Purged {purged} expired graceful disconnects");
            }
        }
    });

    let bind_addr = format!("0.0.0.0:{}", args.bridge_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind bridge listener on {bind_addr}: {e}"))?;
    info!("Listening on {bind_addr} for broker intercept events");

    let result = tokio::select! {
        result = bridge::serve(listener, adapter.clone(), args.socket_no_delay) => result,
        signal = tokio::signal::ctrl_c() => {
            info!("Shutdown requested");
            signal.map_err(anyhow::Error::from)
        }
    };
    purge_task.abort();

    if let Err(e) = &result {
        error!("Gateway stopped: {e}");
    }
    info!(
        "Live connections at shutdown: {}",
        adapter.registry().len()
    );
    result
}
