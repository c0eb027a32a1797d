//! Trade log for the matching engine
//!
//! The trade log is the append-only record of every execution. Trades are
//! issued sequential ids per engine and stamped with the engine's clock.
//! An optional [`TradeLedger`] mirrors each trade to a CSV file on disk.

use chrono::Local;
use common::{Clock, TradeId};
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::domain::Trade;

/// Header line of a ledger file
pub const LEDGER_HEADER: &str = "trade_id,buy_order_id,sell_order_id,price,quantity,timestamp_ms";

/// The single capability the crossing algorithm needs: record an execution
pub trait TradeSink {
    /// Record one execution and return the stored trade
    fn record(
        &mut self,
        buy_order_id: &str,
        sell_order_id: &str,
        price: f64,
        quantity: u64,
    ) -> Trade;
}

/// In-memory, append-only trade history
pub struct TradeLog {
    /// Trades in execution order
    trades: Vec<Trade>,
    /// Last issued trade id
    last_trade_id: TradeId,
    /// Timestamp source
    clock: Arc<dyn Clock>,
    /// Durable CSV mirror
    ledger: Option<TradeLedger>,
}

impl TradeLog {
    /// Create an empty trade log
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            trades: Vec::new(),
            last_trade_id: 0,
            clock,
            ledger: None,
        }
    }

    /// Mirror every future trade to `ledger`
    pub fn attach_ledger(&mut self, ledger: TradeLedger) {
        info!(path = %ledger.path().display(), "Trade ledger attached");
        self.ledger = Some(ledger);
    }

    /// Path of the attached ledger, if any
    pub fn ledger_path(&self) -> Option<&Path> {
        self.ledger.as_ref().map(|l| l.path())
    }

    /// All trades so far, oldest first
    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    /// Get total number of trades
    pub fn len(&self) -> usize {
        self.trades.len()
    }

    /// Check if log is empty
    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }

    /// Id of the most recent trade (0 before the first one)
    pub fn last_trade_id(&self) -> TradeId {
        self.last_trade_id
    }

    fn next_trade_id(&mut self) -> TradeId {
        self.last_trade_id += 1;
        self.last_trade_id
    }
}

impl TradeSink for TradeLog {
    fn record(
        &mut self,
        buy_order_id: &str,
        sell_order_id: &str,
        price: f64,
        quantity: u64,
    ) -> Trade {
        debug_assert!(quantity > 0, "zero-quantity trade");

        let trade = Trade {
            trade_id: self.next_trade_id(),
            buy_order_id: buy_order_id.to_string(),
            sell_order_id: sell_order_id.to_string(),
            price,
            quantity,
            timestamp: self.clock.now_millis(),
        };

        // The match already happened; a failing ledger cannot undo it.
        if let Some(ledger) = self.ledger.as_mut() {
            if let Err(e) = ledger.append(&trade) {
                error!(
                    trade_id = trade.trade_id,
                    path = %ledger.path().display(),
                    error = %e,
                    "Failed to append trade to ledger"
                );
            }
        }

        debug!(
            trade_id = trade.trade_id,
            buy = %trade.buy_order_id,
            sell = %trade.sell_order_id,
            price = trade.price,
            quantity = trade.quantity,
            "Trade recorded"
        );

        self.trades.push(trade.clone());
        trade
    }
}

/// Append-only CSV file of trades, flushed after every line
#[derive(Debug)]
pub struct TradeLedger {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl TradeLedger {
    /// Create (or truncate) a ledger at `path` and write the header
    pub fn create<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let file = File::create(&path)?;
        let mut writer = BufWriter::new(file);
        writeln!(writer, "{}", LEDGER_HEADER)?;
        writer.flush()?;

        Ok(Self { path, writer })
    }

    /// Create a ledger named `trades_YYYY-MM-DD_HHMMSS.csv` inside `dir`
    pub fn create_in<P: AsRef<Path>>(dir: P) -> io::Result<Self> {
        let name = format!("trades_{}.csv", Local::now().format("%Y-%m-%d_%H%M%S"));
        Self::create(dir.as_ref().join(name))
    }

    /// Write one trade and flush it to the OS
    pub fn append(&mut self, trade: &Trade) -> io::Result<()> {
        writeln!(
            self.writer,
            "{},{},{},{},{},{}",
            trade.trade_id,
            trade.buy_order_id,
            trade.sell_order_id,
            trade.price,
            trade.quantity,
            trade.timestamp
        )?;
        self.writer.flush()
    }

    /// Location of the ledger file
    pub fn path(&self) -> &Path {
        &self.path
    }
}
