// MIT License
//
// Copyright (c) 2025 Takatoshi Kondo
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.
use crate::event_adapter::{EventAdapter, Outcome};
use crate::intercept::InterceptEvent;
use anyhow::Result;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tracing::{error, trace, warn};

/// Accept broker plug-in connections forever, one task per connection
pub async fn serve(
    listener: TcpListener,
    adapter: Arc<EventAdapter>,
    socket_no_delay: Option<bool>,
) -> Result<()> {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                trace!("New bridge connection from: {addr}");

                if let Some(no_delay) = socket_no_delay {
                    if let Err(e) = stream.set_nodelay(no_delay) {
                        error!("Failed to set TCP_NODELAY for {addr}: {e}");
                    }
                }

                let adapter = adapter.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, adapter).await {
                        error!("Bridge connection error from {addr}: {e}");
                    }
                    trace!("Bridge connection closed: {addr}");
                });
            }
            Err(e) => error!("Failed to accept bridge connection: {e}"),
        }
    }
}

/// Read intercept events line by line and answer each with its outcome
pub async fn handle_connection<S>(stream: S, adapter: Arc<EventAdapter>) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (reader, mut writer) = tokio::io::split(stream);
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let outcome = handle_line(&adapter, line);
        let mut reply = serde_json::to_string(&outcome)?;
        reply.push('\n');
        writer.write_all(reply.as_bytes()).await?;
    }

    writer.flush().await?;
    Ok(())
}

/// Decode one request line and run it through the adapter
pub fn handle_line(adapter: &EventAdapter, line: &str) -> Outcome {
    match serde_json::from_str::<InterceptEvent>(line) {
        Ok(event) => {
            trace!(
                "Bridge event: type={}, client_id={}",
                event.kind(),
                event.client_id()
            );
            adapter.dispatch(&event)
        }
        Err(e) => {
            warn!("Rejected bridge request: {e}");
            Outcome::Rejected {
                error: e.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disconnect_reconciler::DisconnectReconciler;
    use crate::handler::HandlerChain;

    #[test]
    fn test_handle_line_rejects_garbage() {
        let adapter = EventAdapter::new(HandlerChain::empty(), DisconnectReconciler::default());
        assert!(matches!(
            handle_line(&adapter, "not json"),
            Outcome::Rejected { .. }
        ));
        assert!(matches!(
            handle_line(&adapter, r#"{"type":"teleport","client_id":"c1"}"#),
            Outcome::Rejected { .. }
        ));
        assert_eq!(
            handle_line(&adapter, r#"{"type":"connect","client_id":"c1"}"#),
            Outcome::Connected { halted_by: None }
        );
        assert!(adapter.registry().contains("c1"));
    }
}
