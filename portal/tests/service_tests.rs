//! `PortalService` scenarios over the in-memory store.

#![allow(clippy::unwrap_used)] // Tests can unwrap
#![allow(clippy::expect_used)] // Tests can expect

use municipal_portal::config::PortalSettings;
use municipal_portal::{PortalService, to_json_body};
use municipal_portal_core::lifecycle::{
    DocumentUpdate, EventRegistrationUpdate, NotificationOutcome, NotifyConfig, RequestUpdate,
    ReservationUpdate,
};
use municipal_portal_core::notifications::Channel;
use municipal_portal_core::types::{
    DocumentStatus, EventId, EventRegistrationStatus, ReservationStatus, UserId,
};
use municipal_portal_testing::{InMemoryPortalStore, march, test_clock};
use serde_json::json;
use std::sync::Arc;

fn portal_with(settings: &PortalSettings) -> (Arc<InMemoryPortalStore>, PortalService<InMemoryPortalStore>) {
    let store = Arc::new(InMemoryPortalStore::new());
    let service = PortalService::new(Arc::clone(&store), Arc::new(test_clock()), settings);
    (store, service)
}

fn portal() -> (Arc<InMemoryPortalStore>, PortalService<InMemoryPortalStore>) {
    portal_with(&PortalSettings {
        link_base: "https://portal.test".to_string(),
        push_event: "updates".to_string(),
    })
}

fn approve() -> ReservationUpdate {
    ReservationUpdate {
        status: Some(ReservationStatus::Approved),
        remarks: None,
    }
}

#[tokio::test]
async fn test_march_scenario_response_bodies() {
    let (store, portal) = portal();
    let chairs = store.add_resource("Monobloc chairs", 5);
    let first = portal
        .controller()
        .submit_reservation(UserId::new(), chairs.id, 3, march(1), march(10))
        .await
        .unwrap();
    portal
        .update_reservation(first.id, approve(), &NotifyConfig::silent())
        .await
        .unwrap();

    let resident = UserId::new();
    let second = portal
        .controller()
        .submit_reservation(resident, chairs.id, 2, march(5), march(7))
        .await
        .unwrap();

    let available = portal
        .check_availability(chairs.id, march(5), march(7), None)
        .await;
    assert_eq!(to_json_body(&available), json!({ "available": 2 }));

    let approved = portal
        .update_reservation(second.id, approve(), &NotifyConfig::send())
        .await;
    let body = to_json_body(&approved);
    assert_eq!(body["success"], true);
    assert_eq!(body["modified_count"], 1);
    assert_eq!(body["notification"]["state"], "sent");

    let third = portal
        .controller()
        .submit_reservation(UserId::new(), chairs.id, 3, march(5), march(7))
        .await
        .unwrap();
    let refused = portal
        .update_reservation(third.id, approve(), &NotifyConfig::send())
        .await;
    assert_eq!(
        to_json_body(&refused),
        json!({
            "success": false,
            "code": "CAPACITY_EXCEEDED",
            "message": "Capacity exceeded: requested 3, available 0",
            "retryable": false,
            "available": 0,
        })
    );

    let feed = portal.get_notifications(resident).await.unwrap();
    assert_eq!(feed.count, 1);
    assert_eq!(feed.unseen, 1);
    assert_eq!(
        feed.list[0].link,
        format!("https://portal.test/reservations/{}", second.id)
    );
}

#[tokio::test]
async fn test_update_request_accepts_a_tagged_json_body() {
    let (store, portal) = portal();
    let tents = store.add_resource("Tents", 2);
    let reservation = portal
        .controller()
        .submit_reservation(UserId::new(), tents.id, 1, march(3), march(4))
        .await
        .unwrap();

    let update: RequestUpdate = serde_json::from_value(json!({
        "kind": "reservation",
        "id": reservation.id,
        "fields": { "status": "approved", "remarks": "pick up at the hall" },
    }))
    .unwrap();
    let notify: NotifyConfig = serde_json::from_value(json!({})).unwrap();
    assert!(!notify.send_notif);

    let response = portal.update_request(update, &notify).await.unwrap();
    assert_eq!(response.modified_count, 1);
    assert_eq!(response.notification, NotificationOutcome::NotSent);

    let stored = store.reservation(reservation.id).unwrap();
    assert_eq!(stored.status, ReservationStatus::Approved);
    assert_eq!(stored.remarks.as_deref(), Some("pick up at the hall"));
}

#[tokio::test]
async fn test_create_notification_pushes_the_configured_event() {
    let (_store, portal) = portal_with(&PortalSettings {
        link_base: String::new(),
        push_event: "portal-updates".to_string(),
    });
    let resident = UserId::new();
    let (channel, mut receiver) = Channel::open();
    portal.registry().register(resident, channel).await;

    let ack = portal
        .create_notification(
            resident,
            "Road closure",
            "announcement",
            "Main street is closed on Sunday.",
            "/announcements",
        )
        .await
        .unwrap();
    assert!(ack.success);

    let event = receiver.recv().await.unwrap();
    assert_eq!(event.event, "portal-updates");
    assert!(event.payload);

    let feed = portal.get_notifications(resident).await.unwrap();
    assert_eq!(feed.list[0].category, "announcement");
}

#[tokio::test]
async fn test_failed_notification_is_a_partial_success() {
    let (store, portal) = portal();
    let resident = UserId::new();
    let registration = portal
        .controller()
        .register_for_event(resident, EventId::new())
        .await
        .unwrap();
    store.fail_notifications(true);

    let response = portal
        .update_event_registration(
            registration.id,
            EventRegistrationUpdate {
                status: Some(EventRegistrationStatus::Completed),
                remarks: None,
            },
            &NotifyConfig::send(),
        )
        .await
        .unwrap();
    assert!(response.success);
    assert_eq!(response.modified_count, 1);
    assert!(matches!(response.notification, NotificationOutcome::Failed(_)));
}

#[tokio::test]
async fn test_notification_housekeeping_through_the_facade() {
    let (_store, portal) = portal();
    let resident = UserId::new();
    let document = portal
        .controller()
        .submit_document_request(resident, "Certificate of residency".to_string(), None)
        .await
        .unwrap();

    portal
        .update_document_request(
            document.id,
            DocumentUpdate {
                status: Some(DocumentStatus::Processing),
                ..DocumentUpdate::default()
            },
            &NotifyConfig::send(),
        )
        .await
        .unwrap();

    let feed = portal.get_notifications(resident).await.unwrap();
    assert_eq!(feed.count, 1);
    let id = feed.list[0].id;

    let stranger = portal.mark_seen(UserId::new(), id).await;
    assert_eq!(to_json_body(&stranger)["code"], "NOT_FOUND");

    assert!(portal.mark_seen(resident, id).await.unwrap().success);
    let all = portal.mark_all_seen(resident).await.unwrap();
    assert_eq!(all.modified_count, 0);

    assert!(portal.delete_notification(resident, id).await.unwrap().success);
    assert_eq!(portal.get_notifications(resident).await.unwrap().count, 0);
}

#[tokio::test]
async fn test_shutdown_rejects_new_notifications() {
    let (_store, portal) = portal();
    portal.shutdown().await;

    let result = portal
        .create_notification(UserId::new(), "t", "c", "d", "/l")
        .await;
    let body = to_json_body(&result);
    assert_eq!(body["code"], "DEPENDENCY_FAILURE");
    assert_eq!(body["retryable"], true);
}
