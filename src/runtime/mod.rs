//! Runtime system
//!
//! This module contains the runtime context guard and the task scheduler.

pub mod context;
pub mod scheduler;
