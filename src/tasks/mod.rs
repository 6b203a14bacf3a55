//! Background Tasks Module
//!
//! Contains the scheduler that runs periodic work independently of requests.
//!
//! # Tasks
//! - Session cache sweep: every minute
//! - Redirect URL cache sweep: every minute
//! - Durable purge: jittered first run, then daily at a fixed UTC time

mod scheduler;

pub use scheduler::{jittered_delay, next_aligned_run, ScheduleConfig, Scheduler};
