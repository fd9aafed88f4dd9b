//! Background Tasks Module
//!
//! Contains the tasks the cache schedules on the tokio runtime.
//!
//! # Tasks
//! - Expiry: one deferred, cancellable action per timed cache record

mod expiry;

pub use expiry::{spawn_expiry_task, TimerHandle};
