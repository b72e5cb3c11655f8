//! Background Tasks Module
//!
//! Contains background tasks that run alongside cache traffic.
//!
//! # Tasks
//! - TTL Cleanup: Removes expired memory-engine entries at a fixed interval

mod cleanup;

pub use cleanup::{spawn_janitor, Janitor, Sweep};
