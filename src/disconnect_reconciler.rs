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
use crate::clock::{Clock, SystemClock};
use crate::connection::Connection;
use crate::connection_registry::ConnectionRegistry;
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Default number of gracefully disconnected clients remembered
pub const DEFAULT_CAPACITY: usize = 1024;

/// Default time a graceful disconnect is remembered
pub const DEFAULT_TTL: Duration = Duration::from_secs(30);

/// Result of [`DisconnectReconciler::reconcile_lost`]
#[derive(Debug)]
pub enum Reconciled {
    /// Echo of a graceful disconnect already reported
    Echo,
    /// Genuine loss; the record has left the registry
    Lost(Arc<Connection>),
    /// Neither remembered nor live
    Unknown,
}

struct Stashed {
    connection: Arc<Connection>,
    stashed_at: Instant,
}

/// Short-lived memory of graceful disconnects.
///
/// The broker fires CONNECTION_LOST after every termination, including the
/// graceful ones already reported through DISCONNECT. A client id found here
/// when LOST arrives marks that LOST as an echo.
///
/// Entries leave the table when taken, when older than the TTL (checked on
/// access), or when pushed out by the capacity bound. Early eviction only
/// means the echo is reported as a genuine loss.
pub struct DisconnectReconciler {
    entries: Mutex<LruCache<String, Stashed>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl DisconnectReconciler {
    pub fn new(capacity: NonZeroUsize, ttl: Duration) -> Self {
        Self::with_clock(capacity, ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(capacity: NonZeroUsize, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
            clock,
        }
    }

    /// Remember a connection that just disconnected gracefully
    pub fn remember(&self, client_id: &str, connection: Arc<Connection>) {
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        Self::purge_locked(&mut entries, now, self.ttl);
        Self::push_locked(&mut entries, client_id, connection, now);
    }

    /// Take the remembered connection for `client_id`, if still fresh
    pub fn take(&self, client_id: &str) -> Option<Arc<Connection>> {
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        self.take_locked(&mut entries, client_id, now)
    }

    /// Graceful disconnect: move the live record from `registry` into the
    /// table.
    ///
    /// Both steps run under the table lock, so a connection lost handled by
    /// [`Self::reconcile_lost`] sees the record in exactly one place.
    pub fn retire(&self, registry: &ConnectionRegistry, client_id: &str) -> Option<Arc<Connection>> {
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        Self::purge_locked(&mut entries, now, self.ttl);

        let connection = registry.remove(client_id)?;
        Self::push_locked(&mut entries, client_id, connection.clone(), now);
        Some(connection)
    }

    /// Connection lost: consume a fresh table entry, otherwise remove the
    /// live record from `registry`, under the table lock.
    pub fn reconcile_lost(&self, registry: &ConnectionRegistry, client_id: &str) -> Reconciled {
        let now = self.clock.now();
        let mut entries = self.entries.lock();

        if self.take_locked(&mut entries, client_id, now).is_some() {
            return Reconciled::Echo;
        }
        match registry.remove(client_id) {
            Some(connection) => Reconciled::Lost(connection),
            None => Reconciled::Unknown,
        }
    }

    /// Time source shared with connection records
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    fn push_locked(
        entries: &mut LruCache<String, Stashed>,
        client_id: &str,
        connection: Arc<Connection>,
        now: Instant,
    ) {
        let displaced = entries.push(
            client_id.to_string(),
            Stashed {
                connection,
                stashed_at: now,
            },
        );
        if let Some((evicted_id, _)) = displaced {
            if evicted_id != client_id {
                debug!("Disconnect table full, forgetting graceful disconnect of {evicted_id}");
            }
        }
        trace!("Remembered graceful disconnect of {client_id}");
    }

    fn take_locked(
        &self,
        entries: &mut LruCache<String, Stashed>,
        client_id: &str,
        now: Instant,
    ) -> Option<Arc<Connection>> {
        let stashed = entries.pop(client_id)?;
        if now.saturating_duration_since(stashed.stashed_at) > self.ttl {
            debug!("Graceful disconnect of {client_id} expired before its connection lost");
            return None;
        }
        Some(stashed.connection)
    }

    /// Drop every expired entry, returning how many were dropped
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        Self::purge_locked(&mut entries, now, self.ttl)
    }

    // Entries are only ever pushed or popped, so LRU order is stash order.
    fn purge_locked(entries: &mut LruCache<String, Stashed>, now: Instant, ttl: Duration) -> usize {
        let mut purged = 0;
        loop {
            let expired = match entries.peek_lru() {
                Some((_, stashed)) => now.saturating_duration_since(stashed.stashed_at) > ttl,
                None => false,
            };
            if !expired {
                break;
            }
            entries.pop_lru();
            purged += 1;
        }
        purged
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl Default for DisconnectReconciler {
    fn default() -> Self {
        Self::new(
            NonZeroUsize::new(DEFAULT_CAPACITY).unwrap_or(NonZeroUsize::MIN),
            DEFAULT_TTL,
        )
    }
}
