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
mod common;

use common::*;
use mqtt_gateway::bridge;
use mqtt_gateway::topic::TopicFilter;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

struct BridgeClient {
    reader: tokio::io::Lines<BufReader<tokio::net::tcp::OwnedReadHalf>>,
    writer: tokio::net::tcp::OwnedWriteHalf,
}

impl BridgeClient {
    async fn connect(port: u16) -> Self {
        let stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        let (read, writer) = stream.into_split();
        Self {
            reader: BufReader::new(read).lines(),
            writer,
        }
    }

    async fn send(&mut self, line: &str) -> Value {
        self.writer.write_all(line.as_bytes()).await.unwrap();
        self.writer.write_all(b"\n").await.unwrap();
        let reply = self.reader.next_line().await.unwrap().unwrap();
        serde_json::from_str(&reply).unwrap()
    }
}

async fn start_bridge(handlers: Vec<Arc<RecordingHandler>>) -> (u16, Arc<mqtt_gateway::EventAdapter>) {
    let adapter = Arc::new(adapter_with(handlers));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(bridge::serve(listener, adapter.clone(), Some(true)));
    (port, adapter)
}

#[tokio::test]
async fn bridge_session_round_trip() {
    let devices = RecordingHandler::new("devices", TopicFilter::prefix("devices/"));
    let (port, adapter) = start_bridge(vec![devices.clone()]).await;
    let mut client = BridgeClient::connect(port).await;

    let reply = client
        .send(r#"{"type":"connect","client_id":"c1","username":"acme:alice","password":"707764","clean_session":true}"#)
        .await;
    assert_eq!(reply, json!({"outcome": "connected", "halted_by": null}));
    assert_eq!(
        adapter.registry().get("c1").unwrap().password(),
        Some("pwd")
    );

    let reply = client
        .send(r#"{"type":"subscribe","client_id":"c1","topic_filter":"devices/+/status","qos":1}"#)
        .await;
    assert_eq!(reply, json!({"outcome": "dispatched", "handler": "devices"}));

    let reply = client
        .send(r#"{"type":"publish","client_id":"c1","topic_name":"alerts/fire","payload":"7b7d"}"#)
        .await;
    assert_eq!(
        reply,
        json!({
            "outcome": "dropped",
            "reason": {"error": "no_matching_handler", "topic": "alerts/fire"}
        })
    );

    let reply = client.send(r#"{"type":"disconnect","client_id":"c1"}"#).await;
    assert_eq!(reply, json!({"outcome": "disconnected"}));
    let reply = client
        .send(r#"{"type":"connection_lost","client_id":"c1"}"#)
        .await;
    assert_eq!(reply, json!({"outcome": "duplicate_suppressed"}));

    assert_eq!(devices.count(|c| matches!(c, Call::Disconnect(_))), 1);
    assert_eq!(devices.count(|c| matches!(c, Call::ConnectionLost { .. })), 0);
}

#[tokio::test]
async fn bridge_rejects_malformed_lines_and_keeps_going() {
    let (port, adapter) = start_bridge(vec![]).await;
    let mut client = BridgeClient::connect(port).await;

    let reply = client.send("{not json").await;
    assert_eq!(reply["outcome"], "rejected");
    assert!(reply["error"].as_str().is_some());

    let reply = client
        .send(r#"{"type":"publish","client_id":"c1","topic_name":"a","payload":"zz"}"#)
        .await;
    assert_eq!(reply["outcome"], "rejected");

    let reply = client.send(r#"{"type":"connect","client_id":"c2"}"#).await;
    assert_eq!(reply["outcome"], "connected");
    assert!(adapter.registry().contains("c2"));
}

#[tokio::test]
async fn bridge_serves_clients_concurrently() {
    let (port, adapter) = start_bridge(vec![]).await;

    let tasks: Vec<_> = (0..4)
        .map(|i| {
            tokio::spawn(async move {
                let mut client = BridgeClient::connect(port).await;
                let line = format!(r#"{{"type":"connect","client_id":"c{i}"}}"#);
                client.send(&line).await
            })
        })
        .collect();
    for task in tasks {
        assert_eq!(task.await.unwrap()["outcome"], "connected");
    }
    assert_eq!(adapter.registry().len(), 4);
}
