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
use crate::connection::LastWill;
use crate::error::GatewayError;
use crate::intercept::WillMessage;
use tracing::trace;

/// Realm and user extracted from a `<realm>:<username>` credential
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub realm: String,
    pub username: String,
}

/// Split a composite credential on its first colon.
///
/// The realm segment must be non-empty. The username keeps any further
/// colons verbatim.
pub fn parse_identity(credential: &str) -> Result<Identity, GatewayError> {
    match credential.split_once(':') {
        Some((realm, username)) if !realm.is_empty() => Ok(Identity {
            realm: realm.to_string(),
            username: username.to_string(),
        }),
        _ => Err(GatewayError::MalformedIdentity {
            credential: credential.to_string(),
        }),
    }
}

/// Build the last will record from the CONNECT will fields.
///
/// A payload that is not UTF-8 JSON leaves `payload` empty but keeps the
/// topic and flags.
pub fn decode_last_will(will: &WillMessage) -> LastWill {
    let payload = will.payload.as_deref().and_then(|raw| {
        match std::str::from_utf8(raw)
            .ok()
            .and_then(|text| serde_json::from_str::<serde_json::Value>(text).ok())
        {
            Some(value) => Some(value),
            None => {
                trace!(
                    "Last will payload for topic '{}' is not JSON, keeping it undecoded",
                    will.topic
                );
                None
            }
        }
    });

    LastWill {
        topic: will.topic.clone(),
        payload,
        qos: will.qos,
        retain: will.retain,
    }
}
