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
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace};

/// Live connections indexed by client id.
///
/// Holds at most one record per client id. The lock is only held for the
/// map operation itself, never while handlers run.
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<String, Arc<Connection>>>,
}

impl ConnectionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Install the live record for `client_id`, returning the one it replaced
    pub fn put(&self, client_id: &str, connection: Arc<Connection>) -> Option<Arc<Connection>> {
        let previous = self
            .connections
            .write()
            .insert(client_id.to_string(), connection);

        if let Some(ref stale) = previous {
            debug!("Superseding existing connection for {client_id}: {stale:?}");
        } else {
            trace!("Registered connection for {client_id}");
        }
        previous
    }

    /// Get the live record for `client_id`
    pub fn get(&self, client_id: &str) -> Option<Arc<Connection>> {
        self.connections.read().get(client_id).cloned()
    }

    /// Remove and return the live record for `client_id`
    pub fn remove(&self, client_id: &str) -> Option<Arc<Connection>> {
        let removed = self.connections.write().remove(client_id);
        if removed.is_some() {
            trace!("Removed connection for {client_id}");
        }
        removed
    }

    /// Swap in `next` only while `current` is still the live record.
    ///
    /// Returns false when a reconnect or termination got there first.
    pub fn replace(&self, client_id: &str, current: &Arc<Connection>, next: Arc<Connection>) -> bool {
        let mut connections = self.connections.write();
        match connections.get_mut(client_id) {
            Some(live) if Arc::ptr_eq(live, current) => {
                *live = next;
                true
            }
            _ => false,
        }
    }

    pub fn contains(&self, client_id: &str) -> bool {
        self.connections.read().contains_key(client_id)
    }

    pub fn len(&self) -> usize {
        self.connections.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.read().is_empty()
    }

    /// Snapshot of all connected client ids
    pub fn client_ids(&self) -> Vec<String> {
        self.connections.read().keys().cloned().collect()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
