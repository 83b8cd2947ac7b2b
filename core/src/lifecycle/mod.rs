//! Request lifecycle: status machines, field updates and the controller that applies them.

pub mod controller;
pub mod machine;
pub mod updates;

pub use controller::LifecycleController;
pub use machine::StatusMachine;
pub use updates::{
    DocumentUpdate, EventRegistrationUpdate, NotificationOutcome, NotifyConfig, RequestUpdate,
    ReservationUpdate, ServiceUpdate, UpdateOutcome,
};
