//! Common types and utilities for lobx
//!
//! This crate provides shared types used by the matching engine and by the
//! thin collaborators that drive it (command loop, id generation, clocks).
//!
//! # Modules
//!
//! - [`error`] - Common error types
//! - [`types`] - Shared domain types (Side, OrderType, OrderStatus, ids)
//! - [`clock`] - Epoch-millisecond clocks

pub mod clock;
pub mod error;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock, Timestamp};
pub use error::{Error, Result};
pub use types::*;
