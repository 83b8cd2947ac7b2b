//! Connection registry: recipient id to the set of live real-time channels.
//!
//! A recipient may be connected from several devices at once; every push fans
//! out to all of them. Channels whose receiving end has gone away are pruned on
//! the next push to that recipient.
//!
//! Each channel holds at most one pending signal. A signal carries no content,
//! so a push to a channel that has not drained the previous one is already
//! covered by it and is counted as delivered.

use crate::types::{ChannelId, UserId};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::HashMap;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{RwLock, mpsc};

/// Event delivered over a live channel.
///
/// The payload carries no content: it only tells the client to refetch its
/// notification feed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelEvent {
    /// Event name (e.g. `updates`)
    pub event: String,
    /// Always `true` for update signals
    pub payload: bool,
}

impl ChannelEvent {
    /// An update signal with the given event name.
    #[must_use]
    pub fn update(event: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            payload: true,
        }
    }
}

/// Pending signals a channel can hold.
pub const CHANNEL_CAPACITY: usize = 1;

/// Sending half of one live connection.
#[derive(Clone, Debug)]
pub struct Channel {
    id: ChannelId,
    sender: mpsc::Sender<ChannelEvent>,
}

impl Channel {
    /// Open a channel and return it with its receiving half.
    #[must_use]
    pub fn open() -> (Self, mpsc::Receiver<ChannelEvent>) {
        let (sender, receiver) = mpsc::channel(CHANNEL_CAPACITY);
        (
            Self {
                id: ChannelId::new(),
                sender,
            },
            receiver,
        )
    }

    /// Wrap an existing sender.
    #[must_use]
    pub fn from_sender(sender: mpsc::Sender<ChannelEvent>) -> Self {
        Self {
            id: ChannelId::new(),
            sender,
        }
    }

    /// Channel identifier.
    #[must_use]
    pub const fn id(&self) -> ChannelId {
        self.id
    }

    /// Whether the receiving half has been dropped.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Offer `event` without waiting. Returns `false` once the receiver is gone.
    fn send(&self, event: ChannelEvent) -> bool {
        match self.sender.try_send(event) {
            // A signal is still pending; the client will refetch anyway
            Ok(()) | Err(TrySendError::Full(_)) => true,
            Err(TrySendError::Closed(_)) => false,
        }
    }
}

// Most recipients are connected from one or two devices
type Channels = SmallVec<[Channel; 2]>;

/// Registry of live channels keyed by recipient.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<UserId, Channels>>,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `channel` to `recipient`. Returns the channel id.
    pub async fn register(&self, recipient: UserId, channel: Channel) -> ChannelId {
        let id = channel.id();
        let mut connections = self.connections.write().await;
        connections.entry(recipient).or_default().push(channel);
        tracing::debug!(%recipient, channel = %id, "Channel registered");
        id
    }

    /// Detach one channel. Returns `false` if it was not registered.
    pub async fn unregister(&self, recipient: UserId, channel_id: ChannelId) -> bool {
        let mut connections = self.connections.write().await;
        let Some(channels) = connections.get_mut(&recipient) else {
            return false;
        };
        let before = channels.len();
        channels.retain(|c| c.id() != channel_id);
        let removed = channels.len() != before;
        if channels.is_empty() {
            connections.remove(&recipient);
        }
        removed
    }

    /// Send `event` to every channel of `recipient` and return how many received it.
    ///
    /// A recipient without channels is a silent no-op. Channels that fail to
    /// accept the event are dropped from the registry.
    pub async fn push(&self, recipient: UserId, event: &ChannelEvent) -> usize {
        let mut connections = self.connections.write().await;
        let Some(channels) = connections.get_mut(&recipient) else {
            tracing::debug!(%recipient, "No live channel, push skipped");
            return 0;
        };

        let mut delivered = 0;
        channels.retain(|channel| {
            let sent = channel.send(event.clone());
            if sent {
                delivered += 1;
            } else {
                tracing::debug!(%recipient, channel = %channel.id(), "Pruning closed channel");
            }
            sent
        });
        if channels.is_empty() {
            connections.remove(&recipient);
        }
        delivered
    }

    /// Number of channels currently registered for `recipient`.
    pub async fn connected_channels(&self, recipient: UserId) -> usize {
        self.connections
            .read()
            .await
            .get(&recipient)
            .map_or(0, SmallVec::len)
    }

    /// Drop every channel. Receivers observe end-of-stream.
    pub async fn close_all(&self) -> usize {
        let mut connections = self.connections.write().await;
        let closed = connections.values().map(SmallVec::len).sum();
        connections.clear();
        closed
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_push_fans_out_to_every_device() {
        let registry = ConnectionRegistry::new();
        let recipient = UserId::new();
        let (phone, mut phone_rx) = Channel::open();
        let (laptop, mut laptop_rx) = Channel::open();
        registry.register(recipient, phone).await;
        registry.register(recipient, laptop).await;

        let delivered = registry.push(recipient, &ChannelEvent::update("updates")).await;

        assert_eq!(delivered, 2);
        assert_eq!(phone_rx.recv().await, Some(ChannelEvent::update("updates")));
        assert_eq!(laptop_rx.recv().await, Some(ChannelEvent::update("updates")));
    }

    #[tokio::test]
    async fn test_push_without_channels_is_a_noop() {
        let registry = ConnectionRegistry::new();
        assert_eq!(
            registry.push(UserId::new(), &ChannelEvent::update("updates")).await,
            0
        );
    }

    #[tokio::test]
    async fn test_closed_channels_are_pruned() {
        let registry = ConnectionRegistry::new();
        let recipient = UserId::new();
        let (open, mut open_rx) = Channel::open();
        let (gone, gone_rx) = Channel::open();
        registry.register(recipient, open).await;
        registry.register(recipient, gone).await;
        drop(gone_rx);

        assert_eq!(registry.push(recipient, &ChannelEvent::update("updates")).await, 1);
        assert_eq!(registry.connected_channels(recipient).await, 1);
        assert!(open_rx.recv().await.is_some());
    }

    #[tokio::test]
    async fn test_idle_device_queue_stays_bounded() {
        let registry = ConnectionRegistry::new();
        let recipient = UserId::new();
        let (idle, mut idle_rx) = Channel::open();
        registry.register(recipient, idle).await;

        for _ in 0..10_000 {
            assert_eq!(registry.push(recipient, &ChannelEvent::update("updates")).await, 1);
        }

        assert_eq!(idle_rx.len(), CHANNEL_CAPACITY);
        assert_eq!(registry.connected_channels(recipient).await, 1);
        assert_eq!(idle_rx.recv().await, Some(ChannelEvent::update("updates")));
        assert!(idle_rx.try_recv().is_err());

        // Draining makes room for the next signal
        assert_eq!(registry.push(recipient, &ChannelEvent::update("updates")).await, 1);
        assert_eq!(idle_rx.recv().await, Some(ChannelEvent::update("updates")));
    }

    #[tokio::test]
    async fn test_unregister_and_close_all() {
        let registry = ConnectionRegistry::new();
        let recipient = UserId::new();
        let (first, _first_rx) = Channel::open();
        let (second, mut second_rx) = Channel::open();
        let first_id = registry.register(recipient, first).await;
        registry.register(recipient, second).await;

        assert!(registry.unregister(recipient, first_id).await);
        assert!(!registry.unregister(recipient, first_id).await);
        assert_eq!(registry.connected_channels(recipient).await, 1);

        assert_eq!(registry.close_all().await, 1);
        assert_eq!(second_rx.recv().await, None);
    }
}
