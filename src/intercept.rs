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
use serde::{Deserialize, Serialize};

/// Will message announced in CONNECT
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WillMessage {
    pub topic: String,
    #[serde(default, with = "hex_bytes::option")]
    pub payload: Option<Vec<u8>>,
    #[serde(default)]
    pub qos: u8,
    #[serde(default)]
    pub retain: bool,
}

/// CONNECT accepted by the broker
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectMessage {
    pub client_id: String,
    /// Composite `<realm>:<username>` credential
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default, with = "hex_bytes::option")]
    pub password: Option<Vec<u8>>,
    #[serde(default)]
    pub clean_session: bool,
    #[serde(default)]
    pub will: Option<WillMessage>,
}

impl std::fmt::Debug for ConnectMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectMessage")
            .field("client_id", &self.client_id)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("clean_session", &self.clean_session)
            .field("will", &self.will)
            .finish()
    }
}

/// Graceful DISCONNECT sent by the client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisconnectMessage {
    pub client_id: String,
    #[serde(default)]
    pub username: Option<String>,
}

/// Broker-internal notification fired on every session termination
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionLostMessage {
    pub client_id: String,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscribeMessage {
    pub client_id: String,
    #[serde(default)]
    pub username: Option<String>,
    pub topic_filter: String,
    #[serde(default)]
    pub qos: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsubscribeMessage {
    pub client_id: String,
    #[serde(default)]
    pub username: Option<String>,
    pub topic_filter: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishMessage {
    pub client_id: String,
    #[serde(default)]
    pub username: Option<String>,
    pub topic_name: String,
    #[serde(default, with = "hex_bytes")]
    pub payload: Vec<u8>,
    #[serde(default)]
    pub qos: u8,
    #[serde(default)]
    pub retain: bool,
}

/// One raw broker callback
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InterceptEvent {
    Connect(ConnectMessage),
    Disconnect(DisconnectMessage),
    ConnectionLost(ConnectionLostMessage),
    Subscribe(SubscribeMessage),
    Unsubscribe(UnsubscribeMessage),
    Publish(PublishMessage),
}

impl InterceptEvent {
    pub fn client_id(&self) -> &str {
        match self {
            InterceptEvent::Connect(msg) => &msg.client_id,
            InterceptEvent::Disconnect(msg) => &msg.client_id,
            InterceptEvent::ConnectionLost(msg) => &msg.client_id,
            InterceptEvent::Subscribe(msg) => &msg.client_id,
            InterceptEvent::Unsubscribe(msg) => &msg.client_id,
            InterceptEvent::Publish(msg) => &msg.client_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            InterceptEvent::Connect(_) => "connect",
            InterceptEvent::Disconnect(_) => "disconnect",
            InterceptEvent::ConnectionLost(_) => "connection_lost",
            InterceptEvent::Subscribe(_) => "subscribe",
            InterceptEvent::Unsubscribe(_) => "unsubscribe",
            InterceptEvent::Publish(_) => "publish",
        }
    }
}

/// Hex encoding for byte fields on the JSON bridge
pub(crate) mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(&s).map_err(serde::de::Error::custom)
    }

    pub mod option {
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            bytes: &Option<Vec<u8>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match bytes {
                Some(bytes) => serializer.serialize_some(&hex::encode(bytes)),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<Vec<u8>>, D::Error> {
            match Option::<String>::deserialize(deserializer)? {
                Some(s) => hex::decode(&s).map(Some).map_err(serde::de::Error::custom),
                None => Ok(None),
            }
        }
    }
}
