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
use std::time::{Instant, SystemTime};

/// Last will registered at CONNECT
#[derive(Debug, Clone, PartialEq)]
pub struct LastWill {
    pub topic: String,
    /// Decoded JSON payload, `None` when absent or undecodable
    pub payload: Option<serde_json::Value>,
    pub qos: u8,
    pub retain: bool,
}

/// One client session, immutable once registered.
///
/// A reconnect with the same client id installs a new `Connection`; nothing
/// here is ever updated in place.
#[derive(Clone)]
pub struct Connection {
    client_id: String,
    realm: Option<String>,
    username: Option<String>,
    password: Option<String>,
    clean_session: bool,
    connected_at: Instant,
    connected_at_wall: SystemTime,
    last_will: Option<LastWill>,
    vetoed_by: Option<String>,
}

impl Connection {
    pub fn new(
        client_id: String,
        realm: Option<String>,
        username: Option<String>,
        password: Option<String>,
        clean_session: bool,
        last_will: Option<LastWill>,
    ) -> Self {
        Self {
            client_id,
            realm,
            username,
            password,
            clean_session,
            connected_at: Instant::now(),
            connected_at_wall: SystemTime::now(),
            last_will,
            vetoed_by: None,
        }
    }

    /// Stamp the monotonic connect time from an injected clock
    pub fn with_connected_at(mut self, connected_at: Instant) -> Self {
        self.connected_at = connected_at;
        self
    }

    /// Copy of this record marked as refused by `handler` during connect
    pub fn vetoed(&self, handler: &str) -> Self {
        Self {
            vetoed_by: Some(handler.to_string()),
            ..self.clone()
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn realm(&self) -> Option<&str> {
        self.realm.as_deref()
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    /// Password given at CONNECT, for handlers that authenticate
    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    pub fn clean_session(&self) -> bool {
        self.clean_session
    }

    /// Monotonic connect time
    pub fn connected_at(&self) -> Instant {
        self.connected_at
    }

    pub fn connected_at_wall(&self) -> SystemTime {
        self.connected_at_wall
    }

    pub fn last_will(&self) -> Option<&LastWill> {
        self.last_will.as_ref()
    }

    /// Handler that returned false from `on_connect`, if any.
    ///
    /// Topic events of a vetoed session are dropped; termination events still
    /// reach every handler.
    pub fn vetoed_by(&self) -> Option<&str> {
        self.vetoed_by.as_deref()
    }

    /// True when realm and username were both extracted at connect
    pub fn is_identified(&self) -> bool {
        self.realm.is_some() && self.username.is_some()
    }
}

// Manual impl keeps the password out of every log line.
impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("client_id", &self.client_id)
            .field("realm", &self.realm)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("clean_session", &self.clean_session)
            .field("connected_at_wall", &self.connected_at_wall)
            .field("last_will", &self.last_will)
            .field("vetoed_by", &self.vetoed_by)
            .finish()
    }
}
