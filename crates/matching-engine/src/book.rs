//! Order book for a single instrument
//!
//! The book owns three structures that must always agree:
//!
//! 1. Bids: price levels traversed from the highest price down
//! 2. Asks: price levels traversed from the lowest price up
//! 3. The order index: order id → (price, side) of every resting order
//!
//! Every removal from a level queue (fill, cancel, expiry) also removes the
//! index entry in the same method, so the two views cannot drift apart.
//! Levels are dropped the moment their queue drains.

use common::{OrderId, OrderStatus, Side, Timestamp};
use ordered_float::OrderedFloat;
use std::collections::{BTreeMap, HashMap, VecDeque};

use crate::domain::{DepthLevel, DepthSnapshot, Order, Trade};
use crate::log::TradeSink;

type PriceKey = OrderedFloat<f64>;

// ============================================================================
// Price Level
// ============================================================================

/// FIFO queue of orders resting at one price on one side
#[derive(Debug, Clone)]
pub struct PriceLevel {
    price: f64,
    orders: VecDeque<Order>,
}

impl PriceLevel {
    fn new(price: f64) -> Self {
        Self {
            price,
            orders: VecDeque::new(),
        }
    }

    /// Price shared by every order in the level
    pub fn price(&self) -> f64 {
        self.price
    }

    /// Orders in arrival order
    pub fn orders(&self) -> impl Iterator<Item = &Order> {
        self.orders.iter()
    }

    /// Sum of remaining quantity in the level
    pub fn total_quantity(&self) -> u64 {
        self.orders.iter().map(|o| o.quantity).sum()
    }

    /// Number of orders in the level
    pub fn len(&self) -> usize {
        self.orders.len()
    }

    /// True once the last order has left
    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    fn push(&mut self, order: Order) {
        self.orders.push_back(order);
    }

    /// Remove an order by id, keeping the others in arrival order
    fn remove(&mut self, order_id: &str) -> Option<Order> {
        let pos = self.orders.iter().position(|o| o.order_id == order_id)?;
        self.orders.remove(pos)
    }

    /// Split out every order expired at `now`, keeping the rest in order
    fn take_expired(&mut self, now: Timestamp) -> Vec<Order> {
        if !self.orders.iter().any(|o| o.is_expired_at(now)) {
            return Vec::new();
        }
        let (expired, kept): (Vec<Order>, Vec<Order>) =
            self.orders.drain(..).partition(|o| o.is_expired_at(now));
        self.orders = kept.into();
        expired
    }
}

// ============================================================================
// Book Side
// ============================================================================

/// Price levels for one side of the book
#[derive(Debug, Clone)]
pub struct BookSide {
    side: Side,
    levels: BTreeMap<PriceKey, PriceLevel>,
}

impl BookSide {
    fn new(side: Side) -> Self {
        Self {
            side,
            levels: BTreeMap::new(),
        }
    }

    /// Which side this is
    pub fn side(&self) -> Side {
        self.side
    }

    /// Best price: highest bid or lowest ask
    pub fn best_price(&self) -> Option<f64> {
        self.best_level().map(|level| level.price)
    }

    /// Best level: highest bid or lowest ask
    pub fn best_level(&self) -> Option<&PriceLevel> {
        match self.side {
            Side::Buy => self.levels.values().next_back(),
            Side::Sell => self.levels.values().next(),
        }
    }

    fn best_level_mut(&mut self) -> Option<&mut PriceLevel> {
        match self.side {
            Side::Buy => self.levels.values_mut().next_back(),
            Side::Sell => self.levels.values_mut().next(),
        }
    }

    /// Levels from best to worst price
    pub fn levels(&self) -> Box<dyn Iterator<Item = &PriceLevel> + '_> {
        match self.side {
            Side::Buy => Box::new(self.levels.values().rev()),
            Side::Sell => Box::new(self.levels.values()),
        }
    }

    /// Level at an exact price
    pub fn level(&self, price: f64) -> Option<&PriceLevel> {
        self.levels.get(&OrderedFloat(price))
    }

    /// Number of price levels
    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    /// Number of resting orders
    pub fn order_count(&self) -> usize {
        self.levels.values().map(|l| l.len()).sum()
    }

    /// True when no level rests on this side
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Aggregate quantity per level, best first
    pub fn depth(&self, max_levels: Option<usize>) -> Vec<DepthLevel> {
        self.levels()
            .take(max_levels.unwrap_or(usize::MAX))
            .map(|level| DepthLevel {
                price: level.price,
                quantity: level.total_quantity(),
                order_count: level.len(),
            })
            .collect()
    }

    /// Append to the tail of the order's price level
    fn push_back(&mut self, order: Order) {
        let price = order.price;
        self.levels
            .entry(OrderedFloat(price))
            .or_insert_with(|| PriceLevel::new(price))
            .push(order);
    }

    fn remove_level_if_empty(&mut self, price: f64) {
        let key = OrderedFloat(price);
        if self.levels.get(&key).is_some_and(|level| level.is_empty()) {
            self.levels.remove(&key);
        }
    }
}

// ============================================================================
// Order Index
// ============================================================================

/// Where a resting order lives
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrderLocation {
    /// Price level
    pub price: f64,
    /// Book side
    pub side: Side,
}

/// Order id → location of every resting order
#[derive(Debug, Clone, Default)]
pub struct OrderIndex {
    entries: HashMap<OrderId, OrderLocation>,
}

impl OrderIndex {
    /// Location of a resting order
    pub fn get(&self, order_id: &str) -> Option<OrderLocation> {
        self.entries.get(order_id).copied()
    }

    /// True if the order is resting
    pub fn contains(&self, order_id: &str) -> bool {
        self.entries.contains_key(order_id)
    }

    /// Number of indexed orders
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing rests
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn insert(&mut self, order_id: OrderId, location: OrderLocation) {
        let previous = self.entries.insert(order_id, location);
        assert!(previous.is_none(), "order indexed twice");
    }

    fn remove(&mut self, order_id: &str) {
        assert!(
            self.entries.remove(order_id).is_some(),
            "order {} missing from index",
            order_id
        );
    }
}

// ============================================================================
// Order Book
// ============================================================================

/// Two-sided book plus the order index
///
/// CRITICAL PROPERTIES:
/// 1. Bids traversed descending, asks ascending
/// 2. Each price level is a FIFO queue
/// 3. No empty level is ever left in the book
/// 4. The index covers exactly the resting orders
#[derive(Debug, Clone)]
pub struct OrderBook {
    bids: BookSide,
    asks: BookSide,
    index: OrderIndex,
}

impl OrderBook {
    /// Create an empty book
    pub fn new() -> Self {
        Self {
            bids: BookSide::new(Side::Buy),
            asks: BookSide::new(Side::Sell),
            index: OrderIndex::default(),
        }
    }

    /// Bid side
    pub fn bids(&self) -> &BookSide {
        &self.bids
    }

    /// Ask side
    pub fn asks(&self) -> &BookSide {
        &self.asks
    }

    /// The order index
    pub fn index(&self) -> &OrderIndex {
        &self.index
    }

    /// Side holding orders of `side`
    pub fn side(&self, side: Side) -> &BookSide {
        match side {
            Side::Buy => &self.bids,
            Side::Sell => &self.asks,
        }
    }

    fn side_mut(&mut self, side: Side) -> &mut BookSide {
        match side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        }
    }

    /// Get best bid price (highest buy)
    pub fn best_bid(&self) -> Option<f64> {
        self.bids.best_price()
    }

    /// Get best ask price (lowest sell)
    pub fn best_ask(&self) -> Option<f64> {
        self.asks.best_price()
    }

    /// Get spread
    pub fn spread(&self) -> Option<f64> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some(ask - bid),
            _ => None,
        }
    }

    /// True if an order with this id is resting
    pub fn contains(&self, order_id: &str) -> bool {
        self.index.contains(order_id)
    }

    /// Look up a resting order
    pub fn get(&self, order_id: &str) -> Option<&Order> {
        let location = self.index.get(order_id)?;
        self.side(location.side)
            .level(location.price)?
            .orders()
            .find(|o| o.order_id == order_id)
    }

    /// Get total number of orders in book
    pub fn order_count(&self) -> usize {
        self.index.len()
    }

    /// Check if book is empty
    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }

    /// Resting orders: bids then asks, each best price first, FIFO within a level
    pub fn active_orders(&self) -> impl Iterator<Item = &Order> {
        self.bids
            .levels()
            .chain(self.asks.levels())
            .flat_map(|level| level.orders())
    }

    /// Aggregate depth per side, best first
    pub fn depth(&self, max_levels: Option<usize>) -> DepthSnapshot {
        DepthSnapshot {
            bids: self.bids.depth(max_levels),
            asks: self.asks.depth(max_levels),
        }
    }

    /// Cross `incoming` against the opposite side.
    ///
    /// Limit orders stop once the best opposite price is no longer acceptable;
    /// market orders only stop when they are filled or the side is empty.
    /// Each execution is priced at the resting order and handed to `sink`.
    /// Filled resting orders leave their level and the index together.
    pub(crate) fn cross(&mut self, incoming: &mut Order, sink: &mut dyn TradeSink) -> Vec<Trade> {
        let mut trades = Vec::new();
        let opposite = match incoming.side {
            Side::Buy => &mut self.asks,
            Side::Sell => &mut self.bids,
        };

        while incoming.quantity > 0 {
            // Re-read the best level after every structural change
            let Some(level) = opposite.best_level_mut() else {
                break; // Opposite side exhausted
            };
            let level_price = level.price;
            if !incoming.accepts_price(level_price) {
                break;
            }

            let resting = level
                .orders
                .front_mut()
                .expect("empty price level left in book");
            let trade_qty = incoming.quantity.min(resting.quantity);
            incoming.fill(trade_qty);
            resting.fill(trade_qty);

            let (buy_id, sell_id) = match incoming.side {
                Side::Buy => (&incoming.order_id, &resting.order_id),
                Side::Sell => (&resting.order_id, &incoming.order_id),
            };
            // Price improvement: always the resting price
            trades.push(sink.record(buy_id, sell_id, resting.price, trade_qty));

            if resting.is_filled() {
                let mut filled = level
                    .orders
                    .pop_front()
                    .expect("filled order vanished from level");
                filled.transition(OrderStatus::Filled);
                self.index.remove(&filled.order_id);
                opposite.remove_level_if_empty(level_price);
            }
        }

        trades
    }

    /// Rest an active order at the tail of its price level
    pub(crate) fn insert(&mut self, order: Order) {
        assert!(order.is_active(), "only active orders can rest");
        assert!(!order.is_market(), "market orders never rest");
        assert!(order.quantity > 0, "cannot rest an empty order");

        let location = OrderLocation {
            price: order.price,
            side: order.side,
        };
        self.index.insert(order.order_id.clone(), location);
        self.side_mut(order.side).push_back(order);
    }

    /// Remove a resting order and mark it cancelled
    pub(crate) fn cancel(&mut self, order_id: &str) -> Option<Order> {
        let location = self.index.get(order_id)?;
        let book_side = self.side_mut(location.side);

        let mut order = book_side
            .levels
            .get_mut(&OrderedFloat(location.price))
            .and_then(|level| level.remove(order_id))
            .unwrap_or_else(|| {
                panic!(
                    "indexed order {} not found at {} {}",
                    order_id, location.side, location.price
                )
            });
        book_side.remove_level_if_empty(location.price);
        self.index.remove(order_id);

        order.transition(OrderStatus::Cancelled);
        Some(order)
    }

    /// Remove every resting order whose expiry is at or before `now`
    pub(crate) fn purge_expired(&mut self, now: Timestamp) -> Vec<Order> {
        let mut expired = Vec::new();

        for book_side in [&mut self.bids, &mut self.asks] {
            for level in book_side.levels.values_mut() {
                expired.extend(level.take_expired(now));
            }
            // Drop drained levels after the walk, never during it
            book_side.levels.retain(|_, level| !level.is_empty());
        }

        for order in &mut expired {
            self.index.remove(&order.order_id);
            order.transition(OrderStatus::Expired);
        }

        expired
    }

    /// Panic if the levels and the index disagree
    ///
    /// Checks both directions: every indexed id sits at its recorded
    /// (price, side), and every resting order is indexed. Also rejects empty
    /// levels and non-active or empty resting orders.
    pub fn assert_consistent(&self) {
        let mut resting = 0usize;

        for book_side in [&self.bids, &self.asks] {
            for (key, level) in &book_side.levels {
                assert!(
                    !level.is_empty(),
                    "empty {} level at {}",
                    book_side.side,
                    key
                );
                assert_eq!(key.0, level.price, "level key/price mismatch");

                for order in level.orders() {
                    resting += 1;
                    assert!(order.is_active(), "resting order {} is {}", order.order_id, order.status());
                    assert!(order.quantity > 0, "resting order {} has no quantity", order.order_id);
                    assert_eq!(order.side, book_side.side, "order {} on wrong side", order.order_id);
                    assert_eq!(order.price, level.price, "order {} in wrong level", order.order_id);

                    let location = self
                        .index
                        .get(&order.order_id)
                        .unwrap_or_else(|| panic!("resting order {} not indexed", order.order_id));
                    assert_eq!(location.side, book_side.side);
                    assert_eq!(location.price, level.price);
                }
            }
        }

        assert_eq!(
            resting,
            self.index.len(),
            "index has {} entries for {} resting orders",
            self.index.len(),
            resting
        );
    }
}

impl Default for OrderBook {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::TradeLog;
    use common::ManualClock;
    use std::sync::Arc;

    fn trade_log() -> TradeLog {
        TradeLog::new(Arc::new(ManualClock::new(0)))
    }

    fn limit(id: &str, side: Side, price: f64, qty: u64) -> Order {
        Order::limit(id, side, price, qty, 0)
    }

    #[test]
    fn test_insert_and_best_prices() {
        let mut book = OrderBook::new();
        assert_eq!(book.best_bid(), None);
        assert_eq!(book.best_ask(), None);

        book.insert(limit("b1", Side::Buy, 99.0, 10));
        book.insert(limit("b2", Side::Buy, 100.0, 5));
        book.insert(limit("s1", Side::Sell, 101.0, 7));
        book.insert(limit("s2", Side::Sell, 102.0, 3));

        assert_eq!(book.best_bid(), Some(100.0));
        assert_eq!(book.best_ask(), Some(101.0));
        assert_eq!(book.spread(), Some(1.0));
        assert_eq!(book.order_count(), 4);
        book.assert_consistent();
    }

    #[test]
    fn test_depth_is_best_first() {
        let mut book = OrderBook::new();
        book.insert(limit("b1", Side::Buy, 99.0, 10));
        book.insert(limit("b2", Side::Buy, 100.0, 5));
        book.insert(limit("b3", Side::Buy, 100.0, 2));
        book.insert(limit("s1", Side::Sell, 102.0, 3));
        book.insert(limit("s2", Side::Sell, 101.0, 7));

        let depth = book.depth(None);
        let bid_prices: Vec<f64> = depth.bids.iter().map(|l| l.price).collect();
        let ask_prices: Vec<f64> = depth.asks.iter().map(|l| l.price).collect();

        assert_eq!(bid_prices, vec![100.0, 99.0]);
        assert_eq!(ask_prices, vec![101.0, 102.0]);
        assert_eq!(depth.bids[0].quantity, 7);
        assert_eq!(depth.bids[0].order_count, 2);

        let top = book.depth(Some(1));
        assert_eq!(top.bids.len(), 1);
        assert_eq!(top.asks.len(), 1);
    }

    #[test]
    fn test_cross_walks_levels_in_price_order() {
        let mut book = OrderBook::new();
        let mut log = trade_log();
        book.insert(limit("s1", Side::Sell, 101.0, 4));
        book.insert(limit("s2", Side::Sell, 100.0, 4));
        book.insert(limit("s3", Side::Sell, 102.0, 4));

        let mut buy = limit("b1", Side::Buy, 101.0, 10);
        let trades = book.cross(&mut buy, &mut log);

        assert_eq!(trades.len(), 2);
        assert_eq!(trades[0].sell_order_id, "s2");
        assert_eq!(trades[0].price, 100.0);
        assert_eq!(trades[1].sell_order_id, "s1");
        assert_eq!(trades[1].price, 101.0);
        assert_eq!(buy.quantity, 2);

        // 102 is beyond the limit
        assert_eq!(book.best_ask(), Some(102.0));
        assert!(!book.contains("s1"));
        assert!(!book.contains("s2"));
        book.assert_consistent();
    }

    #[test]
    fn test_cross_sell_against_bids_descending() {
        let mut book = OrderBook::new();
        let mut log = trade_log();
        book.insert(limit("b1", Side::Buy, 99.0, 5));
        book.insert(limit("b2", Side::Buy, 100.0, 5));

        let mut sell = limit("s1", Side::Sell, 99.0, 7);
        let trades = book.cross(&mut sell, &mut log);

        assert_eq!(trades.len(), 2);
        assert_eq!(trades[0].buy_order_id, "b2");
        assert_eq!(trades[0].price, 100.0);
        assert_eq!(trades[1].buy_order_id, "b1");
        assert_eq!(trades[1].quantity, 2);
        assert_eq!(book.get("b1").map(|o| o.quantity), Some(3));
        book.assert_consistent();
    }

    #[test]
    fn test_cancel_keeps_fifo_of_remaining() {
        let mut book = OrderBook::new();
        book.insert(limit("s1", Side::Sell, 100.0, 1));
        book.insert(limit("s2", Side::Sell, 100.0, 2));
        book.insert(limit("s3", Side::Sell, 100.0, 3));

        let cancelled = book.cancel("s2").unwrap();
        assert_eq!(cancelled.status(), OrderStatus::Cancelled);

        let ids: Vec<&str> = book.active_orders().map(|o| o.order_id.as_str()).collect();
        assert_eq!(ids, vec!["s1", "s3"]);
        assert!(book.cancel("s2").is_none());
        book.assert_consistent();
    }

    #[test]
    fn test_cancel_removes_empty_level() {
        let mut book = OrderBook::new();
        book.insert(limit("b1", Side::Buy, 99.0, 10));
        book.insert(limit("b2", Side::Buy, 100.0, 5));

        book.cancel("b1").unwrap();

        assert!(book.bids().level(99.0).is_none());
        assert_eq!(book.bids().level_count(), 1);
        book.assert_consistent();
    }

    #[test]
    fn test_purge_expired() {
        let mut book = OrderBook::new();
        book.insert(limit("b1", Side::Buy, 100.0, 1).with_expiry(50));
        book.insert(limit("b2", Side::Buy, 100.0, 1));
        book.insert(limit("s1", Side::Sell, 105.0, 1).with_expiry(80));
        book.insert(limit("s2", Side::Sell, 106.0, 1).with_expiry(200));

        let expired = book.purge_expired(100);
        let ids: Vec<&str> = expired.iter().map(|o| o.order_id.as_str()).collect();

        assert_eq!(ids, vec!["b1", "s1"]);
        assert!(expired.iter().all(|o| o.status() == OrderStatus::Expired));
        assert_eq!(book.best_ask(), Some(106.0));
        assert!(book.asks().level(105.0).is_none());
        assert_eq!(book.order_count(), 2);
        book.assert_consistent();
    }

    #[test]
    fn test_purge_expired_keeps_fifo_within_level() {
        let mut book = OrderBook::new();
        let mut log = trade_log();
        book.insert(limit("b1", Side::Buy, 100.0, 1));
        book.insert(limit("b2", Side::Buy, 100.0, 1).with_expiry(10));
        book.insert(limit("b3", Side::Buy, 100.0, 1));
        book.insert(limit("b4", Side::Buy, 100.0, 1).with_expiry(20));

        assert_eq!(book.purge_expired(30).len(), 2);

        let ids: Vec<&str> = book.active_orders().map(|o| o.order_id.as_str()).collect();
        assert_eq!(ids, vec!["b1", "b3"]);
        assert_eq!(book.bids().level(100.0).map(|l| l.len()), Some(2));

        let mut sell = limit("s1", Side::Sell, 100.0, 1);
        let trades = book.cross(&mut sell, &mut log);
        assert_eq!(trades[0].buy_order_id, "b1");
        book.assert_consistent();
    }

    #[test]
    #[should_panic(expected = "order indexed twice")]
    fn test_double_insert_panics() {
        let mut book = OrderBook::new();
        book.insert(limit("b1", Side::Buy, 100.0, 1));
        book.insert(limit("b1", Side::Buy, 101.0, 1));
    }

    #[test]
    #[should_panic(expected = "not indexed")]
    fn test_consistency_check_catches_unindexed_order() {
        let mut book = OrderBook::new();
        book.bids.push_back(limit("ghost", Side::Buy, 100.0, 1));
        book.assert_consistent();
    }
}
