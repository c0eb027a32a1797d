//! Observability infrastructure for lobx
//!
//! Structured logging via `tracing`. Log lines go to stderr so they never
//! interleave with command output on stdout.
//!
//! # Quick Start
//!
//! ```ignore
//! use observability::{init_logging, LogFormat};
//!
//! init_logging("lobx", LogFormat::Pretty, "info")?;
//! ```

pub mod logging;

pub use logging::{init_logging, LogFormat};
