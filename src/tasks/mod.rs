//! Background Tasks Module
//!
//! # Tasks
//! - TTL Sweep: removes expired cache entries at a configured interval

mod cleanup;

pub use cleanup::spawn_cleanup_task;
