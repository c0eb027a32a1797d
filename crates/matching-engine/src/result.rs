//! Result types for matching operations

use common::{OrderId, OrderStatus};

use super::domain::{Order, Trade};

/// Outcome of submitting one order
#[derive(Debug, Clone)]
pub struct SubmitResult {
    /// The submitted order
    pub order_id: OrderId,
    /// Trades generated while crossing, in execution order
    pub trades: Vec<Trade>,
    /// Status of the submitted order after the call
    pub status: OrderStatus,
    /// Quantity left unfilled (resting for limits, discarded for markets)
    pub remaining_quantity: u64,
    /// Whether the remainder was booked
    pub rested: bool,
}

impl SubmitResult {
    /// Order was fully matched
    pub fn filled(order: &Order, trades: Vec<Trade>) -> Self {
        Self {
            order_id: order.order_id.clone(),
            trades,
            status: order.status(),
            remaining_quantity: 0,
            rested: false,
        }
    }

    /// Limit remainder was booked
    pub fn rested(order: &Order, trades: Vec<Trade>) -> Self {
        Self {
            order_id: order.order_id.clone(),
            trades,
            status: order.status(),
            remaining_quantity: order.quantity,
            rested: true,
        }
    }

    /// Market remainder was thrown away
    pub fn discarded(order: &Order, trades: Vec<Trade>) -> Self {
        Self {
            order_id: order.order_id.clone(),
            trades,
            status: order.status(),
            remaining_quantity: order.quantity,
            rested: false,
        }
    }

    /// Check if any trades were generated
    pub fn has_trades(&self) -> bool {
        !self.trades.is_empty()
    }

    /// Total quantity filled
    pub fn filled_quantity(&self) -> u64 {
        self.trades.iter().map(|t| t.quantity).sum()
    }
}
