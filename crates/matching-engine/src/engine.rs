//! Core Matching Engine
//!
//! This module implements the price-time priority matching engine for a
//! single instrument.

use common::{Clock, OrderStatus, SystemClock, Timestamp};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::book::OrderBook;
use crate::domain::{is_valid_order_id, DepthSnapshot, Order, Trade};
use crate::error::MatchingError;
use crate::log::{TradeLedger, TradeLog};
use crate::metrics::{EngineMetrics, MetricsSnapshot};
use crate::result::SubmitResult;
use crate::snapshot::{self, SnapshotRecord};
use crate::Result;

/// Matching Engine - owns the book and the trade log of one instrument
///
/// CRITICAL PROPERTIES:
/// 1. Deterministic (same inputs → same outputs, given the same clock)
/// 2. Price-time priority (strictly enforced)
/// 3. Executions priced at the resting order
/// 4. Book levels and order index always agree
///
/// Not thread-safe by itself: callers sharing an engine must serialize
/// access, e.g. behind one `Mutex` per book.
pub struct MatchingEngine {
    /// Label used in logs
    instrument: String,
    /// Resting orders and their index
    book: OrderBook,
    /// Executed trades
    trade_log: TradeLog,
    /// Time source for trade timestamps
    clock: Arc<dyn Clock>,
    /// Metrics collection
    metrics: Option<EngineMetrics>,
}

impl MatchingEngine {
    /// Create a new matching engine on the system clock
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create a new matching engine on a custom clock
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            instrument: String::from("default"),
            book: OrderBook::new(),
            trade_log: TradeLog::new(clock.clone()),
            clock,
            metrics: None,
        }
    }

    /// Set the instrument label
    pub fn with_instrument(mut self, instrument: impl Into<String>) -> Self {
        self.instrument = instrument.into();
        self
    }

    /// Mirror trades to a ledger file
    pub fn with_ledger(mut self, ledger: TradeLedger) -> Self {
        self.trade_log.attach_ledger(ledger);
        self
    }

    /// Enable metrics collection
    pub fn enable_metrics(&mut self) {
        self.metrics = Some(EngineMetrics::new());
    }

    /// Get metrics snapshot
    pub fn metrics(&self) -> Option<MetricsSnapshot> {
        self.metrics.as_ref().map(|m| m.snapshot())
    }

    /// Instrument label
    pub fn instrument(&self) -> &str {
        &self.instrument
    }

    /// Current time according to the engine's clock
    pub fn now(&self) -> Timestamp {
        self.clock.now_millis()
    }

    // ------------------------------------------------------------------------
    // Order entry
    // ------------------------------------------------------------------------

    /// Submit an order
    ///
    /// 1. Validate (positive quantity, finite limit price, unused id)
    /// 2. Cross against the opposite side at the best prices, FIFO per level
    /// 3. Rest a limit remainder; discard a market remainder
    pub fn submit(&mut self, mut order: Order) -> Result<SubmitResult> {
        let start_time = Instant::now();

        if let Some(ref metrics) = self.metrics {
            metrics.orders_received.increment();
        }

        if let Err(e) = self.validate(&order) {
            warn!(
                instrument = %self.instrument,
                order_id = %order.order_id,
                error = %e,
                "Order rejected"
            );
            if let Some(ref metrics) = self.metrics {
                metrics.orders_rejected.increment();
            }
            return Err(e);
        }

        info!(
            instrument = %self.instrument,
            order_id = %order.order_id,
            side = %order.side,
            order_type = %order.order_type,
            price = order.price,
            quantity = order.quantity,
            "Matching order"
        );

        let trades = self.book.cross(&mut order, &mut self.trade_log);

        let result = if order.is_filled() {
            order.transition(OrderStatus::Filled);
            SubmitResult::filled(&order, trades)
        } else if order.is_market() {
            // Market orders never rest
            order.transition(OrderStatus::Cancelled);
            info!(
                order_id = %order.order_id,
                discarded = order.quantity,
                "Market order remainder discarded"
            );
            SubmitResult::discarded(&order, trades)
        } else {
            let result = SubmitResult::rested(&order, trades);
            debug!(
                order_id = %order.order_id,
                price = order.price,
                remaining = order.quantity,
                "Order rested"
            );
            self.book.insert(order);
            result
        };

        self.check_consistency();

        if let Some(ref metrics) = self.metrics {
            metrics.record_submit(
                result.trades.len(),
                result.filled_quantity(),
                result.rested,
                start_time.elapsed(),
            );
            metrics.resting_orders.set(self.book.order_count() as u64);
        }

        Ok(result)
    }

    fn validate(&self, order: &Order) -> Result<()> {
        if order.order_id.trim().is_empty() {
            return Err(MatchingError::invalid_order("order id is empty"));
        }
        if !is_valid_order_id(&order.order_id) {
            return Err(MatchingError::invalid_order(format!(
                "order id {:?} contains a comma, quote or control character",
                order.order_id
            )));
        }
        if order.quantity == 0 {
            return Err(MatchingError::invalid_order(format!(
                "order {} has non-positive quantity",
                order.order_id
            )));
        }
        if !order.is_market() && !order.price.is_finite() {
            return Err(MatchingError::invalid_order(format!(
                "order {} has non-finite price {}",
                order.order_id, order.price
            )));
        }
        if !order.is_active() {
            return Err(MatchingError::invalid_order(format!(
                "order {} is already {}",
                order.order_id,
                order.status()
            )));
        }
        if self.book.contains(&order.order_id) {
            return Err(MatchingError::DuplicateOrder(order.order_id.clone()));
        }
        Ok(())
    }

    /// Cancel a resting order
    ///
    /// Returns `false` when the id is unknown or the order already reached a
    /// terminal state; both look the same because terminal orders leave the
    /// index immediately.
    pub fn cancel(&mut self, order_id: &str) -> bool {
        let Some(order) = self.book.cancel(order_id) else {
            debug!(order_id = %order_id, "Cancel ignored: order not resting");
            return false;
        };

        info!(
            instrument = %self.instrument,
            order_id = %order.order_id,
            remaining = order.quantity,
            "Order cancelled"
        );
        self.check_consistency();

        if let Some(ref metrics) = self.metrics {
            metrics.orders_cancelled.increment();
            metrics.resting_orders.set(self.book.order_count() as u64);
        }
        true
    }

    /// Remove every resting order whose expiry is at or before `now`
    ///
    /// Expiry is lazy: until this runs, an order past its expiry still
    /// matches and can still be cancelled.
    pub fn purge_expired(&mut self, now: Timestamp) -> usize {
        let expired = self.book.purge_expired(now);

        for order in &expired {
            info!(
                instrument = %self.instrument,
                order_id = %order.order_id,
                expiry = order.expiry,
                "Order expired"
            );
        }
        self.check_consistency();

        if let Some(ref metrics) = self.metrics {
            metrics.orders_expired.add(expired.len() as u64);
            metrics.resting_orders.set(self.book.order_count() as u64);
        }
        expired.len()
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    /// Best bid, or `0.0` when there are no bids
    pub fn best_bid(&self) -> f64 {
        self.book.best_bid().unwrap_or(0.0)
    }

    /// Best ask, or `0.0` when there are no asks
    pub fn best_ask(&self) -> f64 {
        self.book.best_ask().unwrap_or(0.0)
    }

    /// Get spread
    pub fn spread(&self) -> Option<f64> {
        self.book.spread()
    }

    /// Aggregate resting quantity per price, best first
    pub fn depth(&self, max_levels: Option<usize>) -> DepthSnapshot {
        self.book.depth(max_levels)
    }

    /// Every trade so far, oldest first
    pub fn trades(&self) -> &[Trade] {
        self.trade_log.trades()
    }

    /// Read-only view of the book
    pub fn book(&self) -> &OrderBook {
        &self.book
    }

    /// Look up a resting order by id
    pub fn order(&self, order_id: &str) -> Option<&Order> {
        self.book.get(order_id)
    }

    /// Resting orders in price-time order (bids first)
    pub fn active_orders(&self) -> Vec<&Order> {
        self.book.active_orders().collect()
    }

    // ------------------------------------------------------------------------
    // Snapshots
    // ------------------------------------------------------------------------

    /// Persist every resting order; returns how many were written
    pub fn save_snapshot<P: AsRef<Path>>(&self, path: P) -> Result<usize> {
        let records: Vec<SnapshotRecord> = self
            .book
            .active_orders()
            .map(SnapshotRecord::from_order)
            .collect();

        snapshot::write_snapshot(&path, &records)?;
        info!(
            instrument = %self.instrument,
            path = %path.as_ref().display(),
            orders = records.len(),
            "Snapshot saved"
        );
        Ok(records.len())
    }

    /// Restore resting orders from a snapshot; returns how many were loaded
    ///
    /// All-or-nothing: the file is read, parsed and checked in full before the
    /// book is touched. Restored orders are inserted directly and never
    /// matched. A snapshot that would leave the book crossed, or that reuses
    /// an id already resting, is rejected.
    pub fn load_snapshot<P: AsRef<Path>>(&mut self, path: P) -> Result<usize> {
        let path = path.as_ref();
        let records = match snapshot::read_snapshot(path) {
            Ok(records) => records,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Snapshot load failed");
                return Err(e);
            }
        };

        let orders: Vec<Order> = records.into_iter().map(SnapshotRecord::into_order).collect();
        if let Err(e) = self.check_restorable(&orders) {
            warn!(path = %path.display(), error = %e, "Snapshot rejected");
            return Err(e);
        }

        let count = orders.len();
        for order in orders {
            self.book.insert(order);
        }
        self.check_consistency();

        if let Some(ref metrics) = self.metrics {
            metrics.resting_orders.set(self.book.order_count() as u64);
        }
        info!(
            instrument = %self.instrument,
            path = %path.display(),
            orders = count,
            "Snapshot loaded"
        );
        Ok(count)
    }

    fn check_restorable(&self, orders: &[Order]) -> Result<()> {
        if let Some(dup) = orders.iter().find(|o| self.book.contains(&o.order_id)) {
            return Err(MatchingError::integrity(format!(
                "order {} is already resting",
                dup.order_id
            )));
        }

        let best_bid = orders
            .iter()
            .filter(|o| o.side.is_buy())
            .map(|o| o.price)
            .chain(self.book.best_bid())
            .reduce(f64::max);
        let best_ask = orders
            .iter()
            .filter(|o| o.side.is_sell())
            .map(|o| o.price)
            .chain(self.book.best_ask())
            .reduce(f64::min);

        if let (Some(bid), Some(ask)) = (best_bid, best_ask) {
            if bid >= ask {
                return Err(MatchingError::integrity(format!(
                    "restored book would be crossed (bid {} >= ask {})",
                    bid, ask
                )));
            }
        }
        Ok(())
    }

    #[inline]
    fn check_consistency(&self) {
        #[cfg(debug_assertions)]
        self.book.assert_consistent();
    }
}

impl Default for MatchingEngine {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================
