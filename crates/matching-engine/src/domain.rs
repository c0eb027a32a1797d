//! Domain types for the Matching Engine
//!
//! This module defines the order, trade and depth types shared by the book,
//! the engine and the snapshot codec.

use common::{OrderId, OrderStatus, OrderType, Side, Timestamp, TradeId};
use serde::{Deserialize, Serialize};

// ============================================================================
// Order
// ============================================================================

/// Ids must be non-blank and free of characters that would split a ledger row
pub(crate) fn is_valid_order_id(id: &str) -> bool {
    !id.trim().is_empty() && !id.chars().any(|c| c == ',' || c == '"' || c.is_control())
}

/// Order as seen by the matching engine
///
/// `quantity` is the remaining quantity and is decremented in place while the
/// order is matched. `status` can only move through [`Order::transition`].
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    /// Caller-supplied identifier
    pub order_id: OrderId,
    /// Limit price (0.0 and ignored for market orders)
    pub price: f64,
    /// Remaining quantity to fill
    pub quantity: u64,
    /// Buy or Sell
    pub side: Side,
    /// Limit or Market
    pub order_type: OrderType,
    /// Submission time, epoch-ms. Only used as an arrival tie-break.
    pub timestamp: Timestamp,
    /// Absolute expiry, epoch-ms
    pub expiry: Option<Timestamp>,
    status: OrderStatus,
}

impl Order {
    /// Create a new limit order
    pub fn limit(
        order_id: impl Into<OrderId>,
        side: Side,
        price: f64,
        quantity: u64,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            order_id: order_id.into(),
            price,
            quantity,
            side,
            order_type: OrderType::Limit,
            timestamp,
            expiry: None,
            status: OrderStatus::Active,
        }
    }

    /// Create a new market order
    pub fn market(
        order_id: impl Into<OrderId>,
        side: Side,
        quantity: u64,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            order_type: OrderType::Market,
            ..Self::limit(order_id, side, 0.0, quantity, timestamp)
        }
    }

    /// Set an absolute expiry instant
    pub fn with_expiry(mut self, expiry: Timestamp) -> Self {
        self.expiry = Some(expiry);
        self
    }

    /// Set the expiry relative to the submission timestamp
    pub fn with_ttl(self, ttl_ms: i64) -> Self {
        let expiry = self.timestamp.saturating_add(ttl_ms);
        self.with_expiry(expiry)
    }

    /// Current lifecycle state
    pub fn status(&self) -> OrderStatus {
        self.status
    }

    /// True while the order can still match, rest, be cancelled or expire
    pub fn is_active(&self) -> bool {
        self.status == OrderStatus::Active
    }

    /// True for market orders
    pub fn is_market(&self) -> bool {
        self.order_type == OrderType::Market
    }

    /// Reduce quantity after a (partial) fill
    pub(crate) fn fill(&mut self, qty: u64) {
        assert!(
            qty <= self.quantity,
            "fill of {} exceeds remaining {} on order {}",
            qty,
            self.quantity,
            self.order_id
        );
        self.quantity -= qty;
    }

    /// Check if order is completely filled
    pub fn is_filled(&self) -> bool {
        self.quantity == 0
    }

    /// True if the order carries an expiry at or before `now`
    pub fn is_expired_at(&self, now: Timestamp) -> bool {
        self.expiry.is_some_and(|expiry| expiry <= now)
    }

    /// Would this order trade against a resting order at `resting_price`?
    pub fn accepts_price(&self, resting_price: f64) -> bool {
        match (self.order_type, self.side) {
            (OrderType::Market, _) => true,
            (OrderType::Limit, Side::Buy) => self.price >= resting_price,
            (OrderType::Limit, Side::Sell) => self.price <= resting_price,
        }
    }

    /// The only place an order's status changes.
    ///
    /// Panics when leaving a terminal state or when asked to go back to
    /// `Active`: either means the book lost track of an order.
    pub(crate) fn transition(&mut self, next: OrderStatus) {
        assert!(
            !self.status.is_terminal(),
            "order {} is already {} and cannot become {}",
            self.order_id,
            self.status,
            next
        );
        assert!(
            next.is_terminal(),
            "order {} cannot transition back to {}",
            self.order_id,
            next
        );
        self.status = next;
    }
}

// ============================================================================
// Trade
// ============================================================================

/// One execution between a buyer and a seller
///
/// The price is always the resting order's price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    /// Sequential identifier, starts at 1 per engine
    pub trade_id: TradeId,
    /// Buying order
    pub buy_order_id: OrderId,
    /// Selling order
    pub sell_order_id: OrderId,
    /// Execution price
    pub price: f64,
    /// Executed quantity, always > 0
    pub quantity: u64,
    /// Execution time, epoch-ms
    pub timestamp: Timestamp,
}

// ============================================================================
// Depth
// ============================================================================

/// Aggregated view of one price level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepthLevel {
    /// Price
    pub price: f64,
    /// Total quantity at this price
    pub quantity: u64,
    /// Number of orders at this price
    pub order_count: usize,
}

/// Aggregate resting quantity per price, per side, best price first
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DepthSnapshot {
    /// Bid levels, highest price first
    pub bids: Vec<DepthLevel>,
    /// Ask levels, lowest price first
    pub asks: Vec<DepthLevel>,
}

impl DepthSnapshot {
    /// Total bid quantity resting at `price`
    pub fn bid_quantity_at(&self, price: f64) -> u64 {
        Self::quantity_at(&self.bids, price)
    }

    /// Total ask quantity resting at `price`
    pub fn ask_quantity_at(&self, price: f64) -> u64 {
        Self::quantity_at(&self.asks, price)
    }

    /// True when neither side has a level
    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }

    fn quantity_at(levels: &[DepthLevel], price: f64) -> u64 {
        levels
            .iter()
            .find(|level| level.price == price)
            .map(|level| level.quantity)
            .unwrap_or(0)
    }
}

// ============================================================================
// Tests
// ============================================================================
