//! Foundation module - Core utilities and types
//!
//! This module provides fundamental utilities used throughout the engine:
//! - Math types and operations
//! - Ring buffers for cross-thread message passing
//! - Synchronization primitives
//! - Registration handles
//! - Time management
//! - Logging utilities

pub mod math;
pub mod ring_buffer;
pub mod sync;
pub mod collections;
pub mod time;
pub mod logging;
