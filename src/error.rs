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
use serde::Serialize;

/// Errors raised by the intercept layer.
///
/// None of these abort the broker connection: they are logged and turned
/// into an [`crate::event_adapter::Outcome`] at the event adapter boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "error", rename_all = "snake_case")]
pub enum GatewayError {
    /// Credential string is not of the form `<realm>:<username>`
    MalformedIdentity { credential: String },
    /// Topic event for a client the registry does not know
    UnknownConnection { client_id: String },
    /// Topic event from a session a handler refused at connect
    ConnectionVetoed { client_id: String, handler: String },
    /// No handler in the chain claims the topic
    NoMatchingHandler { topic: String },
    /// A handler returned an error or panicked
    HandlerFailure { handler: String, message: String },
    /// Two handlers registered under the same name
    DuplicateHandler { name: String },
}

impl std::fmt::Display for GatewayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GatewayError::MalformedIdentity { credential } => {
                write!(f, "Malformed identity '{credential}', expected <realm>:<username>")
            }
            GatewayError::UnknownConnection { client_id } => {
                write!(f, "No connection found: client_id={client_id}")
            }
            GatewayError::ConnectionVetoed { client_id, handler } => {
                write!(f, "Connection vetoed by handler '{handler}': client_id={client_id}")
            }
            GatewayError::NoMatchingHandler { topic } => {
                write!(f, "No handler matches topic '{topic}'")
            }
            GatewayError::HandlerFailure { handler, message } => {
                write!(f, "Handler '{handler}' failed: {message}")
            }
            GatewayError::DuplicateHandler { name } => {
                write!(f, "Handler name '{name}' registered more than once")
            }
        }
    }
}

impl std::error::Error for GatewayError {}
