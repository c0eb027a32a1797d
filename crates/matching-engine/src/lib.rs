//! Limit order matching engine for a single instrument
//!
//! Orders are matched with strict price-time priority: the best opposite
//! price trades first, and orders at one price trade in arrival order.
//! Executions always happen at the resting order's price.
//!
//! # Example
//!
//! ```
//! use common::Side;
//! use matching_engine::{MatchingEngine, Order};
//!
//! let mut engine = MatchingEngine::new();
//! engine.submit(Order::limit("s1", Side::Sell, 100.0, 10, 0)).unwrap();
//!
//! let result = engine.submit(Order::limit("b1", Side::Buy, 101.0, 4, 0)).unwrap();
//! assert_eq!(result.trades[0].price, 100.0);
//! assert_eq!(engine.depth(None).ask_quantity_at(100.0), 6);
//! ```
//!
//! # Modules
//!
//! - [`book`] - Price levels, book sides and the order index
//! - [`engine`] - Order entry, cancel, expiry and snapshots
//! - [`log`] - Trade log and CSV ledger
//! - [`snapshot`] - JSON snapshot codec

pub mod book;
pub mod domain;
pub mod engine;
pub mod error;
pub mod log;
pub mod metrics;
pub mod result;
pub mod snapshot;

pub use book::{BookSide, OrderBook, OrderIndex, OrderLocation, PriceLevel};
pub use domain::{DepthLevel, DepthSnapshot, Order, Trade};
pub use engine::MatchingEngine;
pub use error::MatchingError;
pub use log::{TradeLedger, TradeLog, TradeSink, LEDGER_HEADER};
pub use metrics::{EngineMetrics, MetricsSnapshot};
pub use result::SubmitResult;
pub use snapshot::SnapshotRecord;

/// Result type for matching operations
pub type Result<T> = std::result::Result<T, MatchingError>;
