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
use crate::identity::parse_identity;
use crate::identity_provider::IdentityProvider;
use crate::intercept::ConnectMessage;
use crate::topic::Topic;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Vetoes connects the identity provider does not accept.
///
/// Owns no topics. Placed first, later handlers never see `on_connect` for a
/// refused client, and the adapter drops the session's topic events. The
/// broker plug-in is expected to close the client on a non-null `halted_by`.
pub struct IdentityGuardHandler {
    provider: Arc<dyn IdentityProvider>,
    allow_anonymous: bool,
    rejected: AtomicU64,
}

impl IdentityGuardHandler {
    pub const NAME: &'static str = "identity-guard";

    pub fn new(provider: Arc<dyn IdentityProvider>, allow_anonymous: bool) -> Self {
        Self {
            provider,
            allow_anonymous,
            rejected: AtomicU64::new(0),
        }
    }

    /// Number of connects halted so far
    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    fn reject(&self, client_id: &str, reason: &str) -> bool {
        self.rejected.fetch_add(1, Ordering::Relaxed);
        info!("Rejecting connect: client_id={client_id}, reason={reason}");
        false
    }
}

impl MqttHandler for IdentityGuardHandler {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn handles_topic(&self, _topic: &Topic) -> bool {
        false
    }

    fn on_connect(&self, connection: &Connection, msg: &ConnectMessage) -> anyhow::Result<bool> {
        let Some(credential) = msg.username.as_deref() else {
            if self.allow_anonymous {
                debug!("Anonymous connect accepted: client_id={}", msg.client_id);
                return Ok(true);
            }
            return Ok(self.reject(&msg.client_id, "anonymous"));
        };

        // The record leaves realm/username unset on a malformed credential,
        // so parse again to tell the two cases apart.
        let identity = match parse_identity(credential) {
            Ok(identity) => identity,
            Err(_) => return Ok(self.reject(&msg.client_id, "malformed credential")),
        };

        let password = connection.password();
        if self
            .provider
            .validate(&identity.realm, &identity.username, password)
        {
            debug!(
                "Connect accepted: client_id={}, realm={}, username={}",
                msg.client_id, identity.realm, identity.username
            );
            Ok(true)
        } else {
            Ok(self.reject(&msg.client_id, "invalid credentials"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct OnlyAlice;

    impl IdentityProvider for OnlyAlice {
        fn validate(&self, realm: &str, username: &str, password: Option<&str>) -> bool {
            realm == "acme" && username == "alice" && password == Some("pw")
        }
    }

    fn connect(username: Option<&str>, password: Option<&str>) -> (Connection, ConnectMessage) {
        let msg = ConnectMessage {
            client_id: "c1".to_string(),
            username: username.map(str::to_string),
            password: password.map(|p| p.as_bytes().to_vec()),
            clean_session: true,
            will: None,
        };
        let connection = Connection::new(
            "c1".to_string(),
            None,
            None,
            password.map(str::to_string),
            true,
            None,
        );
        (connection, msg)
    }

    #[test]
    fn test_accepts_valid_user() {
        let guard = IdentityGuardHandler::new(Arc::new(OnlyAlice), false);
        let (connection, msg) = connect(Some("acme:alice"), Some("pw"));
        assert!(guard.on_connect(&connection, &msg).unwrap());
        assert_eq!(guard.rejected(), 0);
    }

    #[test]
    fn test_rejects_bad_password_and_malformed() {
        let guard = IdentityGuardHandler::new(Arc::new(OnlyAlice), false);

        let (connection, msg) = connect(Some("acme:alice"), Some("nope"));
        assert!(!guard.on_connect(&connection, &msg).unwrap());

        let (connection, msg) = connect(Some("alice"), Some("pw"));
        assert!(!guard.on_connect(&connection, &msg).unwrap());

        assert_eq!(guard.rejected(), 2);
    }

    #[test]
    fn test_anonymous_policy() {
        let (connection, msg) = connect(None, None);

        let strict = IdentityGuardHandler::new(Arc::new(OnlyAlice), false);
        assert!(!strict.on_connect(&connection, &msg).unwrap());

        let lenient = IdentityGuardHandler::new(Arc::new(OnlyAlice), true);
        assert!(lenient.on_connect(&connection, &msg).unwrap());
        assert!(!lenient.handles_topic(&Topic::new("any/topic")));
    }
}
