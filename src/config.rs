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
use crate::disconnect_reconciler::{DisconnectReconciler, DEFAULT_CAPACITY, DEFAULT_TTL};
use crate::event_adapter::EventAdapter;
use crate::handler::{HandlerChain, IdentityGuardHandler, MqttHandler, TopicRouteHandler};
use crate::identity_provider::RealmSecurity;
use crate::topic::TopicFilter;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Bounds of the graceful disconnect table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcilerConfig {
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    #[serde(default = "default_ttl_ms")]
    pub ttl_ms: u64,
}

fn default_capacity() -> usize {
    DEFAULT_CAPACITY
}

fn default_ttl_ms() -> u64 {
    DEFAULT_TTL.as_millis() as u64
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            ttl_ms: default_ttl_ms(),
        }
    }
}

impl ReconcilerConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }

    pub fn build(&self) -> Result<DisconnectReconciler> {
        let capacity = NonZeroUsize::new(self.capacity)
            .ok_or_else(|| anyhow!("reconciler.capacity must be greater than zero"))?;
        Ok(DisconnectReconciler::new(capacity, self.ttl()))
    }
}

/// One topic route handler, registered in file order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteConfig {
    pub name: String,
    /// Wildcard patterns such as `devices/#`
    #[serde(default)]
    pub filters: Vec<String>,
    /// Plain string prefix such as `alerts/`
    #[serde(default)]
    pub prefix: Option<String>,
}

impl RouteConfig {
    pub fn topic_filters(&self) -> Result<Vec<TopicFilter>> {
        let mut filters: Vec<TopicFilter> =
            self.filters.iter().map(|f| TopicFilter::pattern(f)).collect();
        if let Some(prefix) = &self.prefix {
            filters.push(TopicFilter::prefix(prefix));
        }
        if filters.is_empty() {
            return Err(anyhow!(
                "Handler '{}' needs at least one filter or a prefix",
                self.name
            ));
        }
        Ok(filters)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub reconciler: ReconcilerConfig,
    /// Realms and users; no identity guard is installed when absent
    #[serde(default)]
    pub identity_file: Option<PathBuf>,
    #[serde(default)]
    pub allow_anonymous: bool,
    #[serde(default)]
    pub handlers: Vec<RouteConfig>,
}

impl GatewayConfig {
    /// Load a JSON5 config file.
    ///
    /// A relative `identity_file` is resolved against the config file's
    /// directory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
        let mut config = Self::from_json_str(&content)
            .with_context(|| format!("Invalid config file '{}'", path.display()))?;

        if let (Some(identity), Some(dir)) = (config.identity_file.as_ref(), path.parent()) {
            if identity.is_relative() {
                config.identity_file = Some(dir.join(identity));
            }
        }
        Ok(config)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        Ok(json5::from_str(content)?)
    }

    /// Build the handler chain: identity guard first, then routes in order
    pub fn build_chain(&self) -> Result<HandlerChain> {
        let mut handlers: Vec<Arc<dyn MqttHandler>> = Vec::new();

        if let Some(identity_file) = &self.identity_file {
            let security = RealmSecurity::load_json(identity_file)?;
            info!(
                "Identity guard enabled: file={}, allow_anonymous={}",
                identity_file.display(),
                self.allow_anonymous
            );
            handlers.push(Arc::new(IdentityGuardHandler::new(
                Arc::new(security),
                self.allow_anonymous,
            )));
        }

        for route in &self.handlers {
            let filters = route.topic_filters()?;
            info!(
                "Route handler '{}': {}",
                route.name,
                filters
                    .iter()
                    .map(|f| f.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
            handlers.push(Arc::new(TopicRouteHandler::new(&route.name, filters)));
        }

        Ok(HandlerChain::new(handlers)?)
    }

    pub fn build_adapter(&self) -> Result<EventAdapter> {
        Ok(EventAdapter::new(self.build_chain()?, self.reconciler.build()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = GatewayConfig::from_json_str("{}").unwrap();
        assert_eq!(config.reconciler.capacity, 1024);
        assert_eq!(config.reconciler.ttl(), Duration::from_secs(30));
        assert!(config.identity_file.is_none());
        assert!(config.handlers.is_empty());
        assert!(config.build_chain().unwrap().is_empty());
    }

    #[test]
    fn test_load_with_identity_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("identity.json5"),
            r#"{ realms: [ { name: "acme", users: [ { name: "alice", method: "plain_password", password: "pw" } ] } ] }"#,
        )
        .unwrap();

        let config_path = dir.path().join("gateway.json5");
        let mut file = std::fs::File::create(&config_path).unwrap();
        write!(
            file,
            r#"{{
                reconciler: {{ capacity: 16, ttl_ms: 500 }},
                identity_file: "identity.json5",
                handlers: [
                    {{ name: "devices", filters: ["devices/#"] }},
                    {{ name: "alerts", prefix: "alerts/" }},
                ],
            }}"#
        )
        .unwrap();

        let config = GatewayConfig::load(&config_path).unwrap();
        assert_eq!(
            config.identity_file.as_deref(),
            Some(dir.path().join("identity.json5").as_path())
        );
        assert_eq!(config.reconciler.ttl(), Duration::from_millis(500));

        let chain = config.build_chain().unwrap();
        assert_eq!(chain.names(), vec!["identity-guard", "devices", "alerts"]);
    }

    #[test]
    fn test_invalid_configs() {
        let empty_route = GatewayConfig::from_json_str(r#"{ handlers: [ { name: "x" } ] }"#).unwrap();
        assert!(empty_route.build_chain().is_err());

        let duplicate = GatewayConfig::from_json_str(
            r#"{ handlers: [ { name: "x", prefix: "a/" }, { name: "x", prefix: "b/" } ] }"#,
        )
        .unwrap();
        assert!(duplicate.build_chain().is_err());

        let zero = GatewayConfig::from_json_str(r#"{ reconciler: { capacity: 0 } }"#).unwrap();
        assert!(zero.build_adapter().is_err());

        assert!(GatewayConfig::load("/nonexistent/gateway.json5").is_err());
    }
}
