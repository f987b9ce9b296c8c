//! Queued delivery of subscription data.
//!
//! Middleware callbacks run on a middleware-managed context, potentially
//! concurrent with the simulation tick.  Instead of calling back into
//! simulation state, every subscription gets an inbox: deliveries are queued
//! and the owning side drains them from its own tick ([`try_drain`]) or
//! awaits them ([`recv`] / [`into_stream`]).
//!
//! [`try_drain`]: SubscriptionInbox::try_drain
//! [`recv`]: SubscriptionInbox::recv
//! [`into_stream`]: SubscriptionInbox::into_stream

use chrono::{DateTime, Utc};
use futures_util::stream::{self, BoxStream};
use tokio::sync::mpsc;

/// One message delivered to a subscription.
#[derive(Debug, Clone)]
pub struct TopicMessage {
    /// Fully-qualified topic the message arrived on.
    pub topic: String,
    /// Raw message payload.
    pub payload: serde_json::Value,
    /// When the middleware queued the message into this inbox.
    pub received_at: DateTime<Utc>,
}

/// Receiving end of a subscription's delivery queue.
///
/// Created by the middleware when a subscriber endpoint is registered;
/// fetched once by the endpoint's owner via
/// [`SimGraph::take_inbox`][crate::graph::SimGraph::take_inbox].
pub struct SubscriptionInbox {
    receiver: mpsc::UnboundedReceiver<TopicMessage>,
}

impl SubscriptionInbox {
    pub(crate) fn new(receiver: mpsc::UnboundedReceiver<TopicMessage>) -> Self {
        Self { receiver }
    }

    /// Drain every message currently queued, without blocking.
    ///
    /// This is the per-tick poll: call it from the simulation update loop.
    /// Returns an empty vec when nothing has arrived.
    pub fn try_drain(&mut self) -> Vec<TopicMessage> {
        let mut drained = Vec::new();
        while let Ok(msg) = self.receiver.try_recv() {
            drained.push(msg);
        }
        drained
    }

    /// Wait for the next message.
    ///
    /// Returns `None` once the endpoint has been stopped and the queue is
    /// empty.
    pub async fn recv(&mut self) -> Option<TopicMessage> {
        self.receiver.recv().await
    }

    /// Consume the inbox as an async stream of messages.
    ///
    /// The stream ends when the endpoint is stopped.
    pub fn into_stream(self) -> BoxStream<'static, TopicMessage> {
        Box::pin(stream::unfold(self.receiver, |mut rx| async move {
            rx.recv().await.map(|msg| (msg, rx))
        }))
    }
}
