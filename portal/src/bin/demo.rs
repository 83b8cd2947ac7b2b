//! Portal demo
//!
//! Walks through the borrowing scenario against a live database:
//! - 5 chairs, 3 already approved for March 1-10
//! - a request for 2 chairs over March 5-7 is approved and the resident notified
//! - a request for 3 more chairs over the same days is refused
//!
//! # Usage
//!
//! ```bash
//! docker compose up -d postgres
//! cargo run --bin demo
//! ```

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use municipal_portal::bootstrap;
use municipal_portal::config::PortalConfig;
use municipal_portal::service::to_json_body;
use municipal_portal::telemetry;
use municipal_portal_core::lifecycle::{NotifyConfig, ReservationUpdate};
use municipal_portal_core::types::{BookableResource, ReservationStatus, UserId};

fn march(day: u32) -> anyhow::Result<NaiveDate> {
    NaiveDate::from_ymd_opt(2025, 3, day).context("invalid March day")
}

fn approve() -> ReservationUpdate {
    ReservationUpdate {
        status: Some(ReservationStatus::Approved),
        remarks: None,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init_tracing();

    let config = PortalConfig::from_env();
    telemetry::init_metrics(&config.metrics)?;

    let (store, portal) = bootstrap::connect(&config)
        .await
        .context("Failed to start portal")?;

    println!("\n============================================");
    println!("   Municipal Portal - Reservation Demo");
    println!("============================================\n");

    let chairs = BookableResource::new("Monobloc chairs", 5, Utc::now());
    store.insert_resource(&chairs).await?;
    println!("Resource '{}' with {} units", chairs.name, chairs.total_units);

    let controller = portal.controller();
    let first = controller
        .submit_reservation(UserId::new(), chairs.id, 3, march(1)?, march(10)?)
        .await?;
    portal
        .update_reservation(first.id, approve(), &NotifyConfig::silent())
        .await?;
    println!("Approved 3 chairs for March 1-10");

    let resident = UserId::new();
    let second = controller
        .submit_reservation(resident, chairs.id, 2, march(5)?, march(7)?)
        .await?;
    let available = portal
        .check_availability(chairs.id, march(5)?, march(7)?, None)
        .await;
    println!("Availability March 5-7: {}", to_json_body(&available));

    let approved = portal
        .update_reservation(second.id, approve(), &NotifyConfig::send())
        .await;
    println!("Approve 2 chairs: {}", to_json_body(&approved));

    let third = controller
        .submit_reservation(UserId::new(), chairs.id, 3, march(5)?, march(7)?)
        .await?;
    let refused = portal
        .update_reservation(third.id, approve(), &NotifyConfig::send())
        .await;
    println!("Approve 3 more chairs: {}", to_json_body(&refused));

    let feed = portal.get_notifications(resident).await;
    println!("Resident notifications: {}", to_json_body(&feed));

    portal.shutdown().await;
    println!("\nDemo complete");
    Ok(())
}
