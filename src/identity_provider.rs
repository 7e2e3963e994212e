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
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::{trace, warn};

/// Answers whether a realm user may connect
pub trait IdentityProvider: Send + Sync {
    fn validate(&self, realm: &str, username: &str, password: Option<&str>) -> bool;
}

/// Authentication method for users
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    /// SHA256 hashed password with optional salt
    Sha256,
    /// Plain text password (not recommended for production)
    PlainPassword,
}

/// Authentication entry for a user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserEntry {
    pub name: String,
    pub method: AuthMethod,
    /// Password digest (SHA256 hash or plain password)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
    /// Alternative field name for plain_password method
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Salt for SHA256 hashing
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub salt: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealmEntry {
    pub name: String,
    #[serde(default)]
    pub users: Vec<UserEntry>,
}

/// Root of the identity file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    pub realms: Vec<RealmEntry>,
}

/// File-backed identity provider: realm -> user -> credential
pub struct RealmSecurity {
    realms: HashMap<String, HashMap<String, UserEntry>>,
}

impl RealmSecurity {
    /// Create a provider with no realms; every validation fails
    pub fn new() -> Self {
        Self {
            realms: HashMap::new(),
        }
    }

    /// Load realms and users from a JSON5 file
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read identity file '{}'", path.display()))?;
        Self::from_json_str(&content)
            .with_context(|| format!("Invalid identity file '{}'", path.display()))
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let config: IdentityConfig = json5::from_str(content)?;
        Self::from_config(config)
    }

    pub fn from_config(config: IdentityConfig) -> Result<Self> {
        let mut security = Self::new();

        for realm in config.realms {
            if !Self::is_valid_realm_name(&realm.name) {
                return Err(anyhow!("Invalid realm name: '{}'", realm.name));
            }
            if security.realms.contains_key(&realm.name) {
                return Err(anyhow!("Realm {} defined more than once", realm.name));
            }

            let mut users = HashMap::new();
            for user in realm.users {
                if !Self::is_valid_user_name(&user.name) {
                    return Err(anyhow!(
                        "Invalid username in realm {}: '{}'",
                        realm.name,
                        user.name
                    ));
                }

                // Handle password field for plain_password method
                let digest = if user.method == AuthMethod::PlainPassword {
                    user.password.or(user.digest)
                } else {
                    user.digest
                };
                if digest.is_none() {
                    return Err(anyhow!(
                        "User {} in realm {} has no credential",
                        user.name,
                        realm.name
                    ));
                }

                users.insert(
                    user.name.clone(),
                    UserEntry {
                        name: user.name,
                        method: user.method,
                        digest,
                        password: None,
                        salt: user.salt,
                    },
                );
            }
            security.realms.insert(realm.name, users);
        }

        security.warn_unsalted();
        Ok(security)
    }

    /// Realm names must be non-empty and free of ':'
    pub fn is_valid_realm_name(name: &str) -> bool {
        !name.is_empty() && !name.contains(':')
    }

    /// User names must be non-empty and free of ':'
    pub fn is_valid_user_name(name: &str) -> bool {
        !name.is_empty() && !name.contains(':')
    }

    /// Calculate SHA256 hash
    pub fn sha256hash(message: &str) -> String {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(message.as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn realm_names(&self) -> Vec<&str> {
        self.realms.keys().map(|s| s.as_str()).collect()
    }

    fn warn_unsalted(&self) {
        let mut unsalted: Vec<String> = self
            .realms
            .iter()
            .flat_map(|(realm, users)| {
                users
                    .values()
                    .filter(|u| u.method == AuthMethod::Sha256 && u.salt.is_empty())
                    .map(move |u| format!("{realm}:{}", u.name))
            })
            .collect();

        if !unsalted.is_empty() {
            unsalted.sort();
            warn!(
                "The following users have no salt specified: {}",
                unsalted.join(", ")
            );
        }
    }
}

impl IdentityProvider for RealmSecurity {
    fn validate(&self, realm: &str, username: &str, password: Option<&str>) -> bool {
        let Some(user) = self.realms.get(realm).and_then(|users| users.get(username)) else {
            trace!("Unknown user {realm}:{username}");
            return false;
        };
        let (Some(digest), Some(password)) = (user.digest.as_ref(), password) else {
            return false;
        };

        match user.method {
            AuthMethod::Sha256 => {
                let hash = Self::sha256hash(&format!("{}{password}", user.salt));
                digest.eq_ignore_ascii_case(&hash)
            }
            AuthMethod::PlainPassword => digest == password,
        }
    }
}

impl Default for RealmSecurity {
    fn default() -> Self {
        Self::new()
    }
}
