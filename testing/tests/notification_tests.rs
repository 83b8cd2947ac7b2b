//! Notification dispatcher and recipient operations.

#![allow(clippy::unwrap_used)] // Tests can unwrap
#![allow(clippy::expect_used)] // Tests can expect

use municipal_portal_core::environment::Clock;
use municipal_portal_core::error::PortalError;
use municipal_portal_core::notifications::{
    Channel, ChannelEvent, ConnectionRegistry, Dispatcher, NotificationDispatcher,
    NotificationMessage,
};
use municipal_portal_core::types::UserId;
use municipal_portal_testing::{InMemoryPortalStore, TickingClock, test_clock};
use std::sync::Arc;

fn message(recipient: UserId, title: &str) -> NotificationMessage {
    NotificationMessage {
        recipient,
        title: title.to_string(),
        category: "announcement".to_string(),
        details: "Water interruption on Friday".to_string(),
        link: "/announcements".to_string(),
    }
}

fn dispatcher() -> (Arc<InMemoryPortalStore>, Arc<Dispatcher<InMemoryPortalStore>>) {
    let store = Arc::new(InMemoryPortalStore::new());
    let dispatcher = Arc::new(Dispatcher::new(
        Arc::clone(&store),
        Arc::new(ConnectionRegistry::new()),
        Arc::new(TickingClock::new(test_clock().now())),
    ));
    (store, dispatcher)
}

#[tokio::test]
async fn test_row_is_visible_when_the_push_arrives() {
    let (_store, dispatcher) = dispatcher();
    let recipient = UserId::new();
    let (channel, mut events) = Channel::open();
    dispatcher.registry().register(recipient, channel).await;

    let reader = {
        let dispatcher = Arc::clone(&dispatcher);
        tokio::spawn(async move {
            let event = events.recv().await.expect("push");
            let feed = dispatcher.get_notifications(recipient).await.unwrap();
            (event, feed.count)
        })
    };

    dispatcher.notify(message(recipient, "Advisory")).await.unwrap();

    let (event, count) = reader.await.unwrap();
    assert_eq!(event, ChannelEvent::update("updates"));
    assert_eq!(count, 1);
}

#[tokio::test]
async fn test_every_device_is_signalled() {
    let (_store, dispatcher) = dispatcher();
    let recipient = UserId::new();
    let (phone, mut phone_events) = Channel::open();
    let (desktop, mut desktop_events) = Channel::open();
    dispatcher.registry().register(recipient, phone).await;
    dispatcher.registry().register(recipient, desktop).await;

    dispatcher.notify(message(recipient, "Advisory")).await.unwrap();

    assert!(phone_events.recv().await.unwrap().payload);
    assert!(desktop_events.recv().await.unwrap().payload);
}

#[tokio::test]
async fn test_disconnected_recipient_still_gets_the_row() {
    let (store, dispatcher) = dispatcher();
    let recipient = UserId::new();

    let id = dispatcher.notify(message(recipient, "Advisory")).await.unwrap();

    let rows = store.notifications();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, id);
}

#[tokio::test]
async fn test_failed_persist_pushes_nothing() {
    let (store, dispatcher) = dispatcher();
    let recipient = UserId::new();
    let (channel, mut events) = Channel::open();
    dispatcher.registry().register(recipient, channel).await;
    store.fail_notifications(true);

    let result = dispatcher.notify(message(recipient, "Advisory")).await;

    assert!(matches!(result, Err(PortalError::DependencyFailure { .. })));
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn test_shutdown_closes_channels_and_refuses_notify() {
    let (store, dispatcher) = dispatcher();
    let recipient = UserId::new();
    let (channel, mut events) = Channel::open();
    dispatcher.registry().register(recipient, channel).await;

    dispatcher.shutdown().await;

    assert!(!dispatcher.is_open());
    assert_eq!(events.recv().await, None);
    assert!(matches!(
        dispatcher.notify(message(recipient, "Late")).await,
        Err(PortalError::DependencyFailure { .. })
    ));
    assert_eq!(store.notification_count(), 0);
}

#[tokio::test]
async fn test_feed_is_newest_first_with_unseen_count() {
    let (_store, dispatcher) = dispatcher();
    let recipient = UserId::new();
    let first = dispatcher.notify(message(recipient, "First")).await.unwrap();
    dispatcher.notify(message(recipient, "Second")).await.unwrap();
    dispatcher.notify(message(UserId::new(), "Someone else")).await.unwrap();

    dispatcher.mark_seen(recipient, first).await.unwrap();
    let feed = dispatcher.get_notifications(recipient).await.unwrap();

    assert_eq!(feed.count, 2);
    assert_eq!(feed.unseen, 1);
    let titles: Vec<_> = feed.list.iter().map(|n| n.title.as_str()).collect();
    assert_eq!(titles, vec!["Second", "First"]);
}

#[tokio::test]
async fn test_mark_all_seen_and_delete() {
    let (_store, dispatcher) = dispatcher();
    let recipient = UserId::new();
    let id = dispatcher.notify(message(recipient, "One")).await.unwrap();
    dispatcher.notify(message(recipient, "Two")).await.unwrap();

    assert_eq!(dispatcher.mark_all_seen(recipient).await.unwrap(), 2);
    assert_eq!(dispatcher.mark_all_seen(recipient).await.unwrap(), 0);

    // only the recipient may delete their row
    assert!(matches!(
        dispatcher.delete_notification(UserId::new(), id).await,
        Err(PortalError::NotFound { .. })
    ));
    dispatcher.delete_notification(recipient, id).await.unwrap();

    let feed = dispatcher.get_notifications(recipient).await.unwrap();
    assert_eq!(feed.count, 1);
    assert_eq!(feed.unseen, 0);
}

#[tokio::test]
async fn test_custom_push_event_name() {
    let store = Arc::new(InMemoryPortalStore::new());
    let registry = Arc::new(ConnectionRegistry::new());
    let dispatcher = Dispatcher::new(store, Arc::clone(&registry), Arc::new(test_clock()))
        .with_push_event("inbox");
    let recipient = UserId::new();
    let (channel, mut events) = Channel::open();
    registry.register(recipient, channel).await;

    dispatcher.notify(message(recipient, "Advisory")).await.unwrap();

    assert_eq!(events.recv().await.unwrap().event, "inbox");
}
