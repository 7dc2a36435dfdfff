//! # Flagwatch Subscriptions
//! The subscription lifecycle and notification scheduler.
//!
//! One single-writer service owns the persisted subscription book and
//! applies `Subscribe`, `Unsubscribe`, and `Tick` strictly one at a time
//! from an ordered channel. The registrar path mutates subscriber sets and
//! deletes emptied records; the sweep path fires each reminder at most once
//! inside the pre-start window and reclaims concluded or unschedulable
//! records. The two paths never touch each other's fields.

pub mod service;
pub mod store;
pub mod sweep;

pub use service::{Command, SubscriptionHandle, SubscriptionService, spawn_sweeper};
pub use store::{SubscriptionBook, SubscriptionRecord, SubscriptionStore};
pub use sweep::{RecordState, SweepAction, SweepLimits};
