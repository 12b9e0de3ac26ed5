// src/pipeline/mod.rs

//! Pipeline entry points.
//!
//! - `notify`: Resolve the day's readings and fan them out (scheduled job)
//! - `consume`: Deliver bundles taken from the queue
//! - `deliver_in_rounds`: Ordered multi-message fan-out shared by both

pub mod consume;
pub mod deliver;
pub mod notify;

pub use consume::{QueueBatch, QueueRecord, consume};
pub use deliver::{Delivery, deliver_in_rounds};
pub use notify::{NotifyOutcome, chat_deliveries, notify, queue_targets};
