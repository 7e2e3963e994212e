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
#![allow(dead_code)]

use mqtt_gateway::clock::Clock;
use mqtt_gateway::connection::Connection;
use mqtt_gateway::disconnect_reconciler::{DisconnectReconciler, DEFAULT_CAPACITY};
use mqtt_gateway::handler::{HandlerChain, MqttHandler};
use mqtt_gateway::intercept::{
    ConnectMessage, ConnectionLostMessage, DisconnectMessage, PublishMessage, SubscribeMessage,
    UnsubscribeMessage, WillMessage,
};
use mqtt_gateway::topic::{Topic, TopicFilter};
use mqtt_gateway::EventAdapter;
use std::num::NonZeroUsize;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// One callback observed by a [`RecordingHandler`]
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Connect(String),
    Disconnect(String),
    ConnectionLost {
        client_id: String,
        will_payload: Option<serde_json::Value>,
    },
    Subscribe(String, String),
    Unsubscribe(String, String),
    Publish(String, String),
}

/// Handler that records every callback it receives
pub struct RecordingHandler {
    name: String,
    filter: Option<TopicFilter>,
    halt_connect: bool,
    fail_topics: bool,
    calls: Mutex<Vec<Call>>,
}

impl RecordingHandler {
    pub fn new(name: &str, filter: TopicFilter) -> Arc<Self> {
        Self::build(name, Some(filter), false, false)
    }

    /// Owns no topics; only sees connection events
    pub fn observer(name: &str) -> Arc<Self> {
        Self::build(name, None, false, false)
    }

    /// Returns false from on_connect
    pub fn halting(name: &str) -> Arc<Self> {
        Self::build(name, None, true, false)
    }

    /// Panics on every topic event it owns
    pub fn failing(name: &str, filter: TopicFilter) -> Arc<Self> {
        Self::build(name, Some(filter), false, true)
    }

    fn build(name: &str, filter: Option<TopicFilter>, halt_connect: bool, fail_topics: bool) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            filter,
            halt_connect,
            fail_topics,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| pred(c)).count()
    }

    fn record(&self, call: Call) -> anyhow::Result<()> {
        self.calls.lock().unwrap().push(call);
        if self.fail_topics {
            panic!("{} refuses topic events", self.name);
        }
        Ok(())
    }
}

impl MqttHandler for RecordingHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn handles_topic(&self, topic: &Topic) -> bool {
        self.filter.as_ref().is_some_and(|f| f.matches(topic))
    }

    fn on_connect(&self, connection: &Connection, _msg: &ConnectMessage) -> anyhow::Result<bool> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::Connect(connection.client_id().to_string()));
        Ok(!self.halt_connect)
    }

    fn on_disconnect(&self, connection: &Connection, _msg: &DisconnectMessage) -> anyhow::Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::Disconnect(connection.client_id().to_string()));
        Ok(())
    }

    fn on_connection_lost(
        &self,
        connection: &Connection,
        _msg: &ConnectionLostMessage,
    ) -> anyhow::Result<()> {
        self.calls.lock().unwrap().push(Call::ConnectionLost {
            client_id: connection.client_id().to_string(),
            will_payload: connection.last_will().and_then(|w| w.payload.clone()),
        });
        Ok(())
    }

    fn do_subscribe(
        &self,
        connection: &Connection,
        topic: &Topic,
        _msg: &SubscribeMessage,
    ) -> anyhow::Result<()> {
        self.record(Call::Subscribe(
            connection.client_id().to_string(),
            topic.to_string(),
        ))
    }

    fn do_unsubscribe(
        &self,
        connection: &Connection,
        topic: &Topic,
        _msg: &UnsubscribeMessage,
    ) -> anyhow::Result<()> {
        self.record(Call::Unsubscribe(
            connection.client_id().to_string(),
            topic.to_string(),
        ))
    }

    fn do_publish(
        &self,
        connection: &Connection,
        topic: &Topic,
        _msg: &PublishMessage,
    ) -> anyhow::Result<()> {
        self.record(Call::Publish(
            connection.client_id().to_string(),
            topic.to_string(),
        ))
    }
}

pub fn adapter_with(handlers: Vec<Arc<RecordingHandler>>) -> EventAdapter {
    let handlers: Vec<Arc<dyn MqttHandler>> = handlers
        .into_iter()
        .map(|h| h as Arc<dyn MqttHandler>)
        .collect();
    EventAdapter::new(
        HandlerChain::new(handlers).unwrap(),
        DisconnectReconciler::default(),
    )
}

pub fn adapter_with_clock(
    handlers: Vec<Arc<RecordingHandler>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
) -> EventAdapter {
    let handlers: Vec<Arc<dyn MqttHandler>> = handlers
        .into_iter()
        .map(|h| h as Arc<dyn MqttHandler>)
        .collect();
    let capacity = NonZeroUsize::new(DEFAULT_CAPACITY).unwrap();
    EventAdapter::new(
        HandlerChain::new(handlers).unwrap(),
        DisconnectReconciler::with_clock(capacity, ttl, clock),
    )
}

/// Clock that only moves when told to, and can hold one caller inside
/// `now()` until released.
pub struct ManualClock {
    base: Instant,
    offset: Mutex<Duration>,
    gate: Mutex<Option<(Sender<()>, Receiver<()>)>>,
}

impl ManualClock {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            base: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
            gate: Mutex::new(None),
        })
    }

    pub fn advance(&self, by: Duration) {
        *self.offset.lock().unwrap() += by;
    }

    /// The next `now()` call signals `entered` and waits for `release`
    pub fn hold_next_call(&self) -> (Receiver<()>, Sender<()>) {
        let (entered_tx, entered_rx) = channel();
        let (release_tx, release_rx) = channel();
        *self.gate.lock().unwrap() = Some((entered_tx, release_rx));
        (entered_rx, release_tx)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        let gate = self.gate.lock().unwrap().take();
        if let Some((entered, release)) = gate {
            entered.send(()).unwrap();
            release.recv().unwrap();
        }
        self.base + *self.offset.lock().unwrap()
    }
}

pub fn connect(client_id: &str, credential: Option<&str>) -> ConnectMessage {
    ConnectMessage {
        client_id: client_id.to_string(),
        username: credential.map(str::to_string),
        password: Some(b"secret".to_vec()),
        clean_session: true,
        will: None,
    }
}

pub fn connect_with_will(client_id: &str, credential: &str, topic: &str, payload: &[u8]) -> ConnectMessage {
    ConnectMessage {
        will: Some(WillMessage {
            topic: topic.to_string(),
            payload: Some(payload.to_vec()),
            qos: 1,
            retain: true,
        }),
        ..connect(client_id, Some(credential))
    }
}

pub fn disconnect(client_id: &str) -> DisconnectMessage {
    DisconnectMessage {
        client_id: client_id.to_string(),
        username: None,
    }
}

pub fn lost(client_id: &str) -> ConnectionLostMessage {
    ConnectionLostMessage {
        client_id: client_id.to_string(),
        username: None,
    }
}

pub fn subscribe(client_id: &str, topic_filter: &str) -> SubscribeMessage {
    SubscribeMessage {
        client_id: client_id.to_string(),
        username: None,
        topic_filter: topic_filter.to_string(),
        qos: 1,
    }
}

pub fn unsubscribe(client_id: &str, topic_filter: &str) -> UnsubscribeMessage {
    UnsubscribeMessage {
        client_id: client_id.to_string(),
        username: None,
        topic_filter: topic_filter.to_string(),
    }
}

pub fn publish(client_id: &str, credential: Option<&str>, topic_name: &str) -> PublishMessage {
    PublishMessage {
        client_id: client_id.to_string(),
        username: credential.map(str::to_string),
        topic_name: topic_name.to_string(),
        payload: b"{\"value\":1}".to_vec(),
        qos: 0,
        retain: false,
    }
}
