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
use crate::intercept::{
    ConnectMessage, ConnectionLostMessage, DisconnectMessage, PublishMessage, SubscribeMessage,
    UnsubscribeMessage,
};
use crate::topic::Topic;

mod chain;
mod identity_guard;
mod route;

pub use chain::HandlerChain;
pub use identity_guard::IdentityGuardHandler;
pub use route::{RouteStats, TopicRouteHandler};

/// Domain handler plugged into the intercept chain.
///
/// Handlers are registered once, in order. Connection events reach every
/// handler; topic events reach only the first handler whose
/// [`MqttHandler::handles_topic`] returns true.
///
/// Errors and panics raised here are logged by the chain and never reach the
/// broker thread.
pub trait MqttHandler: Send + Sync {
    /// Unique name within the chain
    fn name(&self) -> &str;

    /// Whether this handler owns `topic`
    fn handles_topic(&self, topic: &Topic) -> bool;

    /// Return `false` to stop later handlers from seeing this connect
    fn on_connect(&self, _connection: &Connection, _msg: &ConnectMessage) -> anyhow::Result<bool> {
        Ok(true)
    }

    fn on_disconnect(
        &self,
        _connection: &Connection,
        _msg: &DisconnectMessage,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    fn on_connection_lost(
        &self,
        _connection: &Connection,
        _msg: &ConnectionLostMessage,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    fn do_subscribe(
        &self,
        _connection: &Connection,
        _topic: &Topic,
        _msg: &SubscribeMessage,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    fn do_unsubscribe(
        &self,
        _connection: &Connection,
        _topic: &Topic,
        _msg: &UnsubscribeMessage,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    fn do_publish(
        &self,
        _connection: &Connection,
        _topic: &Topic,
        _msg: &PublishMessage,
    ) -> anyhow::Result<()> {
        Ok(())
    }
}
