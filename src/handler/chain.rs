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
use super::MqttHandler;
use crate::connection::Connection;
use crate::error::GatewayError;
use crate::intercept::{
    ConnectMessage, ConnectionLostMessage, DisconnectMessage, PublishMessage, SubscribeMessage,
    UnsubscribeMessage,
};
use crate::topic::Topic;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error, info, trace};

/// Ordered, immutable list of handlers
#[derive(Clone)]
pub struct HandlerChain {
    handlers: Vec<Arc<dyn MqttHandler>>,
}

impl HandlerChain {
    /// Build a chain in evaluation order; names must be unique
    pub fn new(handlers: Vec<Arc<dyn MqttHandler>>) -> Result<Self, GatewayError> {
        let mut seen = HashSet::new();
        for handler in &handlers {
            if !seen.insert(handler.name().to_string()) {
                return Err(GatewayError::DuplicateHandler {
                    name: handler.name().to_string(),
                });
            }
        }
        Ok(Self { handlers })
    }

    pub fn empty() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.handlers.iter().map(|h| h.name()).collect()
    }

    /// First handler, in registration order, that owns `topic`
    pub fn find(&self, topic: &Topic) -> Option<&Arc<dyn MqttHandler>> {
        self.handlers.iter().find(|h| h.handles_topic(topic))
    }

    /// Offer the connect to each handler until one returns false.
    ///
    /// Returns the name of the handler that stopped propagation. A failing
    /// handler counts as "continue".
    pub fn notify_connect(&self, connection: &Connection, msg: &ConnectMessage) -> Option<String> {
        for handler in &self.handlers {
            match guarded(handler.name(), "connect", || {
                handler.on_connect(connection, msg)
            }) {
                Ok(true) => {}
                Ok(false) => {
                    info!(
                        "Handler returned false from on_connect so not passing to other handlers: {}",
                        handler.name()
                    );
                    return Some(handler.name().to_string());
                }
                Err(_) => {}
            }
        }
        None
    }

    /// Notify every handler of a graceful disconnect
    pub fn notify_disconnect(&self, connection: &Connection, msg: &DisconnectMessage) {
        for handler in &self.handlers {
            let _ = guarded(handler.name(), "disconnect", || {
                handler.on_disconnect(connection, msg)
            });
        }
    }

    /// Notify every handler of a genuine connection loss
    pub fn notify_connection_lost(&self, connection: &Connection, msg: &ConnectionLostMessage) {
        for handler in &self.handlers {
            let _ = guarded(handler.name(), "connection_lost", || {
                handler.on_connection_lost(connection, msg)
            });
        }
    }

    /// Route SUBSCRIBE to the owning handler, returning its name
    pub fn dispatch_subscribe(
        &self,
        connection: &Connection,
        msg: &SubscribeMessage,
    ) -> Result<String, GatewayError> {
        let topic = Topic::new(&msg.topic_filter);
        self.dispatch_topic("subscribe", &topic, connection, |handler| {
            handler.do_subscribe(connection, &topic, msg)
        })
    }

    /// Route UNSUBSCRIBE to the owning handler, returning its name
    pub fn dispatch_unsubscribe(
        &self,
        connection: &Connection,
        msg: &UnsubscribeMessage,
    ) -> Result<String, GatewayError> {
        let topic = Topic::new(&msg.topic_filter);
        self.dispatch_topic("unsubscribe", &topic, connection, |handler| {
            handler.do_unsubscribe(connection, &topic, msg)
        })
    }

    /// Route PUBLISH to the owning handler, returning its name
    pub fn dispatch_publish(
        &self,
        connection: &Connection,
        msg: &PublishMessage,
    ) -> Result<String, GatewayError> {
        let topic = Topic::new(&msg.topic_name);
        self.dispatch_topic("publish", &topic, connection, |handler| {
            handler.do_publish(connection, &topic, msg)
        })
    }

    fn dispatch_topic<F>(
        &self,
        op: &str,
        topic: &Topic,
        connection: &Connection,
        call: F,
    ) -> Result<String, GatewayError>
    where
        F: FnOnce(&dyn MqttHandler) -> anyhow::Result<()>,
    {
        let Some(handler) = self.find(topic) else {
            trace!(
                "No handler for {op}: topic={topic}, client_id={}",
                connection.client_id()
            );
            return Err(GatewayError::NoMatchingHandler {
                topic: topic.to_string(),
            });
        };

        debug!(
            "Handler has handled {op}: handler={}, topic={topic}, connection={connection:?}",
            handler.name()
        );
        guarded(handler.name(), op, || call(handler.as_ref()))?;
        Ok(handler.name().to_string())
    }
}

impl std::fmt::Debug for HandlerChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

/// Run one handler callback, turning errors and panics into `HandlerFailure`
fn guarded<T>(
    handler: &str,
    op: &str,
    call: impl FnOnce() -> anyhow::Result<T>,
) -> Result<T, GatewayError> {
    let message = match std::panic::catch_unwind(AssertUnwindSafe(call)) {
        Ok(Ok(value)) => return Ok(value),
        Ok(Err(e)) => format!("{e:#}"),
        Err(payload) => {
            if let Some(s) = payload.downcast_ref::<&str>() {
                format!("panicked: {s}")
            } else if let Some(s) = payload.downcast_ref::<String>() {
                format!("panicked: {s}")
            } else {
                "panicked".to_string()
            }
        }
    };

    error!("Handler {handler} failed during {op}: {message}");
    Err(GatewayError::HandlerFailure {
        handler: handler.to_string(),
        message,
    })
}
