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
use crate::connection::Connection;
use crate::connection_registry::ConnectionRegistry;
use crate::disconnect_reconciler::{DisconnectReconciler, Reconciled};
use crate::error::GatewayError;
use crate::handler::HandlerChain;
use crate::identity::{decode_last_will, parse_identity, Identity};
use crate::intercept::{
    ConnectMessage, ConnectionLostMessage, DisconnectMessage, InterceptEvent, PublishMessage,
    SubscribeMessage, UnsubscribeMessage,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

/// What became of one intercept event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    /// Record installed; `halted_by` names the handler that stopped the chain
    Connected { halted_by: Option<String> },
    Disconnected,
    ConnectionLost,
    /// Connection lost echo of an earlier graceful disconnect
    DuplicateSuppressed,
    Dispatched { handler: String },
    Dropped { reason: GatewayError },
    HandlerFailed { handler: String, message: String },
    /// Bridge request line could not be decoded
    Rejected { error: String },
}

/// Entry point for the six broker callbacks.
///
/// Owns the registry and the disconnect table and drives the handler chain.
/// Every method is synchronous and safe to call from many threads at once.
///
/// A handler returning false from `on_connect` vetoes the session: the record
/// stays registered so its termination is still reported, but its topic
/// events are dropped with [`GatewayError::ConnectionVetoed`]. Closing the
/// client is left to the broker plug-in, which sees `halted_by` in the reply.
pub struct EventAdapter {
    registry: ConnectionRegistry,
    reconciler: DisconnectReconciler,
    chain: HandlerChain,
}

impl EventAdapter {
    pub fn new(chain: HandlerChain, reconciler: DisconnectReconciler) -> Self {
        Self {
            registry: ConnectionRegistry::new(),
            reconciler,
            chain,
        }
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn reconciler(&self) -> &DisconnectReconciler {
        &self.reconciler
    }

    pub fn chain(&self) -> &HandlerChain {
        &self.chain
    }

    /// Route a tagged event to the matching callback
    pub fn dispatch(&self, event: &InterceptEvent) -> Outcome {
        match event {
            InterceptEvent::Connect(msg) => self.on_connect(msg),
            InterceptEvent::Disconnect(msg) => self.on_disconnect(msg),
            InterceptEvent::ConnectionLost(msg) => self.on_connection_lost(msg),
            InterceptEvent::Subscribe(msg) => self.on_subscribe(msg),
            InterceptEvent::Unsubscribe(msg) => self.on_unsubscribe(msg),
            InterceptEvent::Publish(msg) => self.on_publish(msg),
        }
    }

    pub fn on_connect(&self, msg: &ConnectMessage) -> Outcome {
        let identity = msg.username.as_deref().and_then(|credential| {
            parse_identity(credential)
                .map_err(|e| warn!("{e}: client_id={}", msg.client_id))
                .ok()
        });
        let (realm, username) = match identity {
            Some(Identity { realm, username }) => (Some(realm), Some(username)),
            None => (None, None),
        };
        let password = msg
            .password
            .as_deref()
            .map(|raw| String::from_utf8_lossy(raw).into_owned());
        let last_will = msg.will.as_ref().map(decode_last_will);

        let connection = Arc::new(
            Connection::new(
                msg.client_id.clone(),
                realm,
                username,
                password,
                msg.clean_session,
                last_will,
            )
            .with_connected_at(self.reconciler.clock().now()),
        );
        debug!("Client connect: {connection:?}");
        self.registry.put(&msg.client_id, connection.clone());

        let halted_by = self.chain.notify_connect(&connection, msg);
        if let Some(handler) = &halted_by {
            // Unless a reconnect already replaced it, the session stays
            // registered but receives no topic events.
            let vetoed = Arc::new(connection.vetoed(handler));
            if !self.registry.replace(&msg.client_id, &connection, vetoed) {
                debug!(
                    "Connection replaced before veto was recorded: client_id={}",
                    msg.client_id
                );
            }
        }
        Outcome::Connected { halted_by }
    }

    pub fn on_disconnect(&self, msg: &DisconnectMessage) -> Outcome {
        let Some(connection) = self.reconciler.retire(&self.registry, &msg.client_id) else {
            debug!("Disconnect for unknown client: client_id={}", msg.client_id);
            return unknown(&msg.client_id);
        };
        debug!("Client disconnect: {connection:?}");
        self.chain.notify_disconnect(&connection, msg);
        Outcome::Disconnected
    }

    pub fn on_connection_lost(&self, msg: &ConnectionLostMessage) -> Outcome {
        match self.reconciler.reconcile_lost(&self.registry, &msg.client_id) {
            Reconciled::Echo => {
                trace!(
                    "Connection lost after graceful disconnect, suppressing: client_id={}",
                    msg.client_id
                );
                Outcome::DuplicateSuppressed
            }
            Reconciled::Lost(connection) => {
                debug!("Client connection lost: {connection:?}");
                self.chain.notify_connection_lost(&connection, msg);
                Outcome::ConnectionLost
            }
            Reconciled::Unknown => {
                debug!("Connection lost for unknown client: client_id={}", msg.client_id);
                unknown(&msg.client_id)
            }
        }
    }

    pub fn on_subscribe(&self, msg: &SubscribeMessage) -> Outcome {
        let Some(connection) = self.registry.get(&msg.client_id) else {
            info!("No connection found: client_id={}", msg.client_id);
            return unknown(&msg.client_id);
        };
        if let Some(dropped) = vetoed(&connection) {
            return dropped;
        }
        outcome(self.chain.dispatch_subscribe(&connection, msg))
    }

    pub fn on_unsubscribe(&self, msg: &UnsubscribeMessage) -> Outcome {
        let Some(connection) = self.registry.get(&msg.client_id) else {
            info!("No connection found: client_id={}", msg.client_id);
            return unknown(&msg.client_id);
        };
        if let Some(dropped) = vetoed(&connection) {
            return dropped;
        }
        outcome(self.chain.dispatch_unsubscribe(&connection, msg))
    }

    pub fn on_publish(&self, msg: &PublishMessage) -> Outcome {
        let Some(connection) = self.registry.get(&msg.client_id) else {
            let identity = msg.username.as_deref().and_then(|c| parse_identity(c).ok());
            warn!(
                "No connection found: client_id={}, realm={:?}, username={:?}",
                msg.client_id,
                identity.as_ref().map(|i| i.realm.as_str()),
                identity.as_ref().map(|i| i.username.as_str())
            );
            return unknown(&msg.client_id);
        };
        if let Some(dropped) = vetoed(&connection) {
            return dropped;
        }
        outcome(self.chain.dispatch_publish(&connection, msg))
    }
}

fn vetoed(connection: &Connection) -> Option<Outcome> {
    let handler = connection.vetoed_by()?;
    debug!(
        "Dropping topic event of vetoed connection: client_id={}, handler={handler}",
        connection.client_id()
    );
    Some(Outcome::Dropped {
        reason: GatewayError::ConnectionVetoed {
            client_id: connection.client_id().to_string(),
            handler: handler.to_string(),
        },
    })
}

fn unknown(client_id: &str) -> Outcome {
    Outcome::Dropped {
        reason: GatewayError::UnknownConnection {
            client_id: client_id.to_string(),
        },
    }
}

fn outcome(result: Result<String, GatewayError>) -> Outcome {
    match result {
        Ok(handler) => Outcome::Dispatched { handler },
        Err(GatewayError::HandlerFailure { handler, message }) => {
            Outcome::HandlerFailed { handler, message }
        }
        Err(reason) => Outcome::Dropped { reason },
    }
}
