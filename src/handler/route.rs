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
use crate::intercept::{
    ConnectMessage, ConnectionLostMessage, DisconnectMessage, PublishMessage, SubscribeMessage,
    UnsubscribeMessage,
};
use crate::topic::{Topic, TopicFilter};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

/// Counters snapshot of a [`TopicRouteHandler`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RouteStats {
    pub connects: u64,
    pub disconnects: u64,
    pub connections_lost: u64,
    pub subscribes: u64,
    pub unsubscribes: u64,
    pub publishes: u64,
}

#[derive(Default)]
struct Counters {
    connects: AtomicU64,
    disconnects: AtomicU64,
    connections_lost: AtomicU64,
    subscribes: AtomicU64,
    unsubscribes: AtomicU64,
    publishes: AtomicU64,
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

/// Handler owning the topics matched by any of its filters.
///
/// Connection events are counted and logged; topic events are counted and
/// logged with the owning client's identity.
pub struct TopicRouteHandler {
    name: String,
    filters: Vec<TopicFilter>,
    counters: Counters,
}

impl TopicRouteHandler {
    pub fn new(name: impl Into<String>, filters: Vec<TopicFilter>) -> Self {
        Self {
            name: name.into(),
            filters,
            counters: Counters::default(),
        }
    }

    pub fn filters(&self) -> &[TopicFilter] {
        &self.filters
    }

    pub fn stats(&self) -> RouteStats {
        let c = &self.counters;
        RouteStats {
            connects: c.connects.load(Ordering::Relaxed),
            disconnects: c.disconnects.load(Ordering::Relaxed),
            connections_lost: c.connections_lost.load(Ordering::Relaxed),
            subscribes: c.subscribes.load(Ordering::Relaxed),
            unsubscribes: c.unsubscribes.load(Ordering::Relaxed),
            publishes: c.publishes.load(Ordering::Relaxed),
        }
    }
}

impl MqttHandler for TopicRouteHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn handles_topic(&self, topic: &Topic) -> bool {
        self.filters.iter().any(|f| f.matches(topic))
    }

    fn on_connect(&self, connection: &Connection, _msg: &ConnectMessage) -> anyhow::Result<bool> {
        bump(&self.counters.connects);
        debug!(
            "[{}] connect: client_id={}, realm={:?}, username={:?}",
            self.name,
            connection.client_id(),
            connection.realm(),
            connection.username()
        );
        Ok(true)
    }

    fn on_disconnect(
        &self,
        connection: &Connection,
        _msg: &DisconnectMessage,
    ) -> anyhow::Result<()> {
        bump(&self.counters.disconnects);
        debug!("[{}] disconnect: client_id={}", self.name, connection.client_id());
        Ok(())
    }

    fn on_connection_lost(
        &self,
        connection: &Connection,
        _msg: &ConnectionLostMessage,
    ) -> anyhow::Result<()> {
        bump(&self.counters.connections_lost);
        match connection.last_will() {
            Some(will) => info!(
                "[{}] connection lost: client_id={}, will_topic={}, will_payload={}",
                self.name,
                connection.client_id(),
                will.topic,
                will.payload
                    .as_ref()
                    .map(|v| v.to_string())
                    .unwrap_or_else(|| "null".to_string())
            ),
            None => info!(
                "[{}] connection lost: client_id={}",
                self.name,
                connection.client_id()
            ),
        }
        Ok(())
    }

    fn do_subscribe(
        &self,
        connection: &Connection,
        topic: &Topic,
        msg: &SubscribeMessage,
    ) -> anyhow::Result<()> {
        bump(&self.counters.subscribes);
        debug!(
            "[{}] subscribe: client_id={}, topic={topic}, qos={}",
            self.name,
            connection.client_id(),
            msg.qos
        );
        Ok(())
    }

    fn do_unsubscribe(
        &self,
        connection: &Connection,
        topic: &Topic,
        _msg: &UnsubscribeMessage,
    ) -> anyhow::Result<()> {
        bump(&self.counters.unsubscribes);
        debug!(
            "[{}] unsubscribe: client_id={}, topic={topic}",
            self.name,
            connection.client_id()
        );
        Ok(())
    }

    fn do_publish(
        &self,
        connection: &Connection,
        topic: &Topic,
        msg: &PublishMessage,
    ) -> anyhow::Result<()> {
        bump(&self.counters.publishes);
        debug!(
            "[{}] publish: client_id={}, topic={topic}, bytes={}, qos={}, retain={}",
            self.name,
            connection.client_id(),
            msg.payload.len(),
            msg.qos,
            msg.retain
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handles_any_filter() {
        let handler = TopicRouteHandler::new(
            "devices",
            vec![
                TopicFilter::pattern("devices/#"),
                TopicFilter::prefix("telemetry/"),
            ],
        );
        assert!(handler.handles_topic(&Topic::new("devices/d1/status")));
        assert!(handler.handles_topic(&Topic::new("telemetry/cpu")));
        assert!(!handler.handles_topic(&Topic::new("alerts/fire")));
        assert_eq!(handler.filters().len(), 2);
    }

    #[test]
    fn test_counts_events() {
        let handler = TopicRouteHandler::new("all", vec![TopicFilter::pattern("#")]);
        let connection = Connection::new("c1".to_string(), None, None, None, true, None);
        let topic = Topic::new("a/b");
        let publish = PublishMessage {
            client_id: "c1".to_string(),
            username: None,
            topic_name: "a/b".to_string(),
            payload: b"hi".to_vec(),
            qos: 1,
            retain: false,
        };

        handler.do_publish(&connection, &topic, &publish).unwrap();
        handler.do_publish(&connection, &topic, &publish).unwrap();
        handler
            .on_connection_lost(
                &connection,
                &ConnectionLostMessage {
                    client_id: "c1".to_string(),
                    username: None,
                },
            )
            .unwrap();

        assert_eq!(
            handler.stats(),
            RouteStats {
                publishes: 2,
                connections_lost: 1,
                ..RouteStats::default()
            }
        );
    }
}
