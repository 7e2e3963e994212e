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
//! Intercept gateway between an MQTT broker and pluggable domain handlers.
//!
//! The broker reports six callbacks (connect, disconnect, connection lost,
//! subscribe, unsubscribe, publish) to an [`EventAdapter`]. The adapter keeps
//! one [`Connection`] per client id, folds the connection lost echo of a
//! graceful disconnect into a single termination, and routes each topic
//! event to the first handler in the [`HandlerChain`] that claims its topic.

pub mod bridge;
pub mod clock;
pub mod config;
pub mod connection;
pub mod connection_registry;
pub mod disconnect_reconciler;
pub mod error;
pub mod event_adapter;
pub mod handler;
pub mod identity;
pub mod identity_provider;
pub mod intercept;
pub mod topic;
pub mod tracing_setup;

pub use config::GatewayConfig;
pub use connection::{Connection, LastWill};
pub use connection_registry::ConnectionRegistry;
pub use disconnect_reconciler::DisconnectReconciler;
pub use error::GatewayError;
pub use event_adapter::{EventAdapter, Outcome};
pub use handler::{HandlerChain, MqttHandler};
pub use identity::{parse_identity, Identity};
pub use intercept::InterceptEvent;
pub use topic::{Topic, TopicFilter};
