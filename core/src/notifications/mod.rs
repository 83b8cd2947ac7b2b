//! Notification fan-out.

pub mod dispatcher;
pub mod registry;

pub use dispatcher::{
    DEFAULT_PUSH_EVENT, Dispatcher, NotificationDispatcher, NotificationFeed, NotificationMessage,
};
pub use registry::{CHANNEL_CAPACITY, Channel, ChannelEvent, ConnectionRegistry};
