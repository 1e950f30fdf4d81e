//! Background Tasks Module
//!
//! Contains background tasks that run for the lifetime of a manager.
//!
//! # Tasks
//! - Cleanup: removes expired and unreadable entries at configured intervals

mod cleanup;

pub use cleanup::spawn_cleanup_task;
