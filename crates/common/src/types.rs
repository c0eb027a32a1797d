//! Common types used across lobx
//!
//! This module provides the fundamental domain types shared by the engine
//! and the command layer.

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identifier of an order. Supplied by the caller, never reused by the engine.
pub type OrderId = String;

/// Sequential trade identifier, scoped to one engine instance
pub type TradeId = u64;

/// Generates order ids of the form `O1`, `O2`, ...
///
/// Safe to share between threads; each call hands out a distinct id.
#[derive(Debug)]
pub struct OrderIdGenerator {
    prefix: String,
    next: AtomicU64,
}

impl OrderIdGenerator {
    /// Create a generator starting at `O1`
    pub fn new() -> Self {
        Self {
            prefix: "O".to_string(),
            next: AtomicU64::new(1),
        }
    }

    /// Produce the next id
    pub fn next_id(&self) -> OrderId {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        format!("{}{}", self.prefix, n)
    }

    /// Make sure no future id collides with `id`
    ///
    /// Ids outside the `O<n>` pattern are ignored.
    pub fn skip_past(&self, id: &str) {
        let Some(n) = id
            .strip_prefix(self.prefix.as_str())
            .and_then(|digits| digits.parse::<u64>().ok())
        else {
            return;
        };
        self.next.fetch_max(n.saturating_add(1), Ordering::Relaxed);
    }
}

impl Default for OrderIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Order side (buy or sell)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    /// Buy order
    #[serde(alias = "buy")]
    Buy,
    /// Sell order
    #[serde(alias = "sell")]
    Sell,
}

impl Side {
    /// Returns true if this is a buy order
    pub fn is_buy(&self) -> bool {
        matches!(self, Side::Buy)
    }

    /// Returns true if this is a sell order
    pub fn is_sell(&self) -> bool {
        matches!(self, Side::Sell)
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // pad() honours width and alignment flags
        f.pad(match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        })
    }
}

impl FromStr for Side {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "buy" | "b" => Ok(Side::Buy),
            "sell" | "s" => Ok(Side::Sell),
            other => Err(Error::invalid_input(format!("unknown side: {}", other))),
        }
    }
}

/// Order type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderType {
    /// Limit order - execute at specified price or better, rest the remainder
    #[default]
    Limit,
    /// Market order - sweep the opposite side, never rests
    Market,
}

impl std::fmt::Display for OrderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderType::Limit => write!(f, "LIMIT"),
            OrderType::Market => write!(f, "MARKET"),
        }
    }
}

impl FromStr for OrderType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "limit" => Ok(OrderType::Limit),
            "market" => Ok(OrderType::Market),
            other => Err(Error::invalid_input(format!("unknown order type: {}", other))),
        }
    }
}

/// Order status
///
/// `Active` is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    /// Live: resting in the book or still being matched
    #[default]
    Active,
    /// Remaining quantity reached zero through matching
    Filled,
    /// Removed by an explicit cancel (or a discarded market remainder)
    Cancelled,
    /// Removed by the expiry sweep
    Expired,
}

impl OrderStatus {
    /// Returns true for Filled, Cancelled and Expired
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OrderStatus::Active)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatus::Active => write!(f, "ACTIVE"),
            OrderStatus::Filled => write!(f, "FILLED"),
            OrderStatus::Cancelled => write!(f, "CANCELLED"),
            OrderStatus::Expired => write!(f, "EXPIRED"),
        }
    }
}
