//! Interactive command loop
//!
//! Reads one command per line, sweeps expired orders, then applies the
//! command to the engine and prints the outcome. Bad input is reported on
//! the output stream and never ends the session.

use anyhow::{Context, Result};
use common::{Clock, OrderIdGenerator, Side};
use config::LobxConfig;
use matching_engine::{DepthSnapshot, MatchingEngine, Order, SubmitResult, Trade, TradeLedger};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info};

/// One parsed input line
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    AddLimit {
        side: Side,
        price: f64,
        quantity: u64,
        ttl_ms: Option<u64>,
    },
    AddMarket {
        side: Side,
        quantity: u64,
    },
    Cancel(String),
    Depth,
    Orders,
    Trades,
    Save(Option<PathBuf>),
    Load(Option<PathBuf>),
    Help,
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

fn invalid(msg: impl Into<String>) -> common::Error {
    common::Error::invalid_input(msg)
}

fn expect_args(name: &str, args: &[&str], min: usize, max: usize, usage: &str) -> common::Result<()> {
    if args.len() < min || args.len() > max {
        return Err(invalid(format!("usage: {} {}", name, usage)));
    }
    Ok(())
}

fn parse_price(s: &str) -> common::Result<f64> {
    match s.parse::<f64>() {
        Ok(price) if price.is_finite() => Ok(price),
        _ => Err(invalid(format!("invalid price '{}'", s))),
    }
}

fn parse_quantity(s: &str) -> common::Result<u64> {
    s.parse()
        .map_err(|_| invalid(format!("invalid quantity '{}'", s)))
}

fn parse_ttl(s: &str) -> common::Result<u64> {
    match s.parse::<u64>() {
        Ok(ttl) if ttl > 0 => Ok(ttl),
        _ => Err(invalid(format!("invalid ttl_ms '{}'", s))),
    }
}

/// Parse one input line; `Ok(None)` for a blank line
pub fn parse_command(line: &str) -> common::Result<Option<Command>> {
    let mut tokens = line.split_whitespace();
    let Some(name) = tokens.next() else {
        return Ok(None);
    };
    let args: Vec<&str> = tokens.collect();
    let name = name.to_lowercase();

    let command = match name.as_str() {
        "add_limit" => {
            expect_args(&name, &args, 3, 4, "<buy|sell> <price> <qty> [ttl_ms]")?;
            Command::AddLimit {
                side: args[0].parse()?,
                price: parse_price(args[1])?,
                quantity: parse_quantity(args[2])?,
                ttl_ms: args.get(3).map(|s| parse_ttl(s)).transpose()?,
            }
        }
        "add_market" => {
            expect_args(&name, &args, 2, 2, "<buy|sell> <qty>")?;
            Command::AddMarket {
                side: args[0].parse()?,
                quantity: parse_quantity(args[1])?,
            }
        }
        "cancel" => {
            expect_args(&name, &args, 1, 1, "<order_id>")?;
            Command::Cancel(args[0].to_string())
        }
        "depth" | "print_depth" => Command::Depth,
        "orders" | "print_orders" => Command::Orders,
        "trades" | "print_trades" => Command::Trades,
        "save" => {
            expect_args(&name, &args, 0, 1, "[path]")?;
            Command::Save(args.first().map(PathBuf::from))
        }
        "load" => {
            expect_args(&name, &args, 0, 1, "[path]")?;
            Command::Load(args.first().map(PathBuf::from))
        }
        "help" | "?" => Command::Help,
        "quit" | "exit" | "q" => Command::Quit,
        other => return Err(invalid(format!("unknown command '{}' (try 'help')", other))),
    };

    Ok(Some(command))
}

/// Engine plus everything the command loop needs around it
pub struct Session {
    engine: MatchingEngine,
    ids: OrderIdGenerator,
    config: LobxConfig,
}

impl Session {
    pub fn new(config: LobxConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let mut engine =
            MatchingEngine::with_clock(clock).with_instrument(config.engine.instrument.clone());

        if config.trade_ledger.enabled {
            let ledger = TradeLedger::create_in(&config.trade_ledger.directory).with_context(|| {
                format!(
                    "Failed to create trade ledger in {:?}",
                    config.trade_ledger.directory
                )
            })?;
            engine = engine.with_ledger(ledger);
        }
        engine.enable_metrics();

        Ok(Self {
            engine,
            ids: OrderIdGenerator::new(),
            config,
        })
    }

    pub fn config(&self) -> &LobxConfig {
        &self.config
    }

    /// Replace the book with a snapshot and move the id generator past
    /// every restored id
    pub fn load_snapshot(&mut self, path: &Path) -> matching_engine::Result<usize> {
        let count = self.engine.load_snapshot(path)?;
        for order in self.engine.active_orders() {
            self.ids.skip_past(&order.order_id);
        }
        Ok(count)
    }

    /// Read commands until `quit` or end of input
    pub fn run<R: BufRead, W: Write>(&mut self, input: R, mut out: W) -> io::Result<()> {
        write!(out, "> ")?;
        out.flush()?;

        for line in input.lines() {
            if self.handle_line(&line?, &mut out)? == Flow::Quit {
                return Ok(());
            }
            write!(out, "> ")?;
            out.flush()?;
        }

        writeln!(out)?;
        Ok(())
    }

    /// Sweep expired orders, then parse and apply one line
    pub fn handle_line<W: Write>(&mut self, line: &str, out: &mut W) -> io::Result<Flow> {
        let now = self.engine.now();
        let expired = self.engine.purge_expired(now);
        if expired > 0 {
            debug!(expired, "Expired orders swept");
        }

        match parse_command(line) {
            Ok(Some(command)) => self.execute(command, out),
            Ok(None) => Ok(Flow::Continue),
            Err(e) => {
                writeln!(out, "Error: {}", e)?;
                Ok(Flow::Continue)
            }
        }
    }

    fn execute<W: Write>(&mut self, command: Command, out: &mut W) -> io::Result<Flow> {
        match command {
            Command::AddLimit {
                side,
                price,
                quantity,
                ttl_ms,
            } => {
                let mut order =
                    Order::limit(self.ids.next_id(), side, price, quantity, self.engine.now());
                if let Some(ttl) = ttl_ms.or(self.config.engine.default_ttl_ms) {
                    order = order.with_ttl(i64::try_from(ttl).unwrap_or(i64::MAX));
                }
                self.submit(order, out)?;
            }
            Command::AddMarket { side, quantity } => {
                let order = Order::market(self.ids.next_id(), side, quantity, self.engine.now());
                self.submit(order, out)?;
            }
            Command::Cancel(order_id) => {
                if self.engine.cancel(&order_id) {
                    writeln!(out, "Cancelled {}", order_id)?;
                } else {
                    writeln!(out, "Order {} not found or no longer active", order_id)?;
                }
            }
            Command::Depth => {
                let depth = self.engine.depth(Some(self.config.engine.max_depth_levels));
                print_depth(out, &depth)?;
            }
            Command::Orders => print_orders(out, &self.engine.active_orders())?,
            Command::Trades => print_trades(out, self.engine.trades())?,
            Command::Save(path) => {
                let path = path.unwrap_or_else(|| PathBuf::from(&self.config.snapshot.path));
                match self.engine.save_snapshot(&path) {
                    Ok(count) => writeln!(out, "Saved {} orders to {}", count, path.display())?,
                    Err(e) => writeln!(out, "Error: {}", e)?,
                }
            }
            Command::Load(path) => {
                let path = path.unwrap_or_else(|| PathBuf::from(&self.config.snapshot.path));
                match self.load_snapshot(&path) {
                    Ok(count) => writeln!(out, "Loaded {} orders from {}", count, path.display())?,
                    Err(e) => writeln!(out, "Error: {}", e)?,
                }
            }
            Command::Help => print_help(out)?,
            Command::Quit => return Ok(Flow::Quit),
        }
        Ok(Flow::Continue)
    }

    fn submit<W: Write>(&mut self, order: Order, out: &mut W) -> io::Result<()> {
        match self.engine.submit(order) {
            Ok(result) => print_submit(out, &result),
            Err(e) => writeln!(out, "Error: {}", e),
        }
    }

    /// Save on exit if configured and log the session totals
    pub fn shutdown(&self) {
        if self.config.snapshot.save_on_exit {
            let path = &self.config.snapshot.path;
            if let Err(e) = self.engine.save_snapshot(path) {
                error!(path = %path, error = %e, "Failed to save snapshot on exit");
            }
        }

        if let Some(metrics) = self.engine.metrics() {
            info!(
                orders = metrics.orders_received,
                rejected = metrics.orders_rejected,
                trades = metrics.trades_executed,
                volume = metrics.volume_traded,
                avg_submit_us = metrics.submit_latency_avg_us,
                "Session summary"
            );
        }
    }
}

// ============================================================================
// Printing
// ============================================================================

pub fn print_banner<W: Write>(out: &mut W) -> io::Result<()> {
    writeln!(out, "lobx {} - type 'help' for commands", env!("CARGO_PKG_VERSION"))
}

fn print_help<W: Write>(out: &mut W) -> io::Result<()> {
    writeln!(
        out,
        "\nAvailable commands:\n\
         \x20 add_limit  <buy|sell> <price> <qty> [ttl_ms]  place limit order\n\
         \x20 add_market <buy|sell> <qty>                   place market order\n\
         \x20 cancel     <order_id>                         cancel active order\n\
         \x20 depth                                         best bids/asks per level\n\
         \x20 orders                                        list resting orders\n\
         \x20 trades                                        list executed trades\n\
         \x20 save       [path]                             write book snapshot\n\
         \x20 load       [path]                             restore book snapshot\n\
         \x20 help                                          this message\n\
         \x20 quit / exit / q                               leave program"
    )
}

fn print_submit<W: Write>(out: &mut W, result: &SubmitResult) -> io::Result<()> {
    writeln!(
        out,
        "Order {}: {} ({} filled, {} {})",
        result.order_id,
        result.status,
        result.filled_quantity(),
        result.remaining_quantity,
        if result.rested { "resting" } else { "remaining" }
    )?;
    for trade in &result.trades {
        writeln!(
            out,
            "  Trade #{}: {} buys {} from {} @ {:.2}",
            trade.trade_id, trade.buy_order_id, trade.quantity, trade.sell_order_id, trade.price
        )?;
    }
    Ok(())
}

fn print_depth<W: Write>(out: &mut W, depth: &DepthSnapshot) -> io::Result<()> {
    writeln!(out, "\nDepth")?;
    writeln!(out, "+------+-----------+---------+--------+")?;
    writeln!(out, "| Side |   Price   |   Qty   | Orders |")?;
    writeln!(out, "+------+-----------+---------+--------+")?;
    // Asks worst to best so both best prices meet at the divider
    for level in depth.asks.iter().rev() {
        writeln!(
            out,
            "| SELL | {:>9.2} | {:>7} | {:>6} |",
            level.price, level.quantity, level.order_count
        )?;
    }
    writeln!(out, "+------+-----------+---------+--------+")?;
    for level in &depth.bids {
        writeln!(
            out,
            "| BUY  | {:>9.2} | {:>7} | {:>6} |",
            level.price, level.quantity, level.order_count
        )?;
    }
    writeln!(out, "+------+-----------+---------+--------+")
}

fn print_orders<W: Write>(out: &mut W, orders: &[&Order]) -> io::Result<()> {
    writeln!(out, "\nActive Orders ({})", orders.len())?;
    writeln!(out, "+--------+------+-----------+---------+---------------+")?;
    writeln!(out, "|   ID   | Side |   Price   |   Qty   |    Expiry     |")?;
    writeln!(out, "+--------+------+-----------+---------+---------------+")?;
    for order in orders {
        let expiry = order
            .expiry
            .map(|e| e.to_string())
            .unwrap_or_else(|| "-".to_string());
        writeln!(
            out,
            "| {:>6} | {:<4} | {:>9.2} | {:>7} | {:>13} |",
            order.order_id, order.side, order.price, order.quantity, expiry
        )?;
    }
    writeln!(out, "+--------+------+-----------+---------+---------------+")
}

fn print_trades<W: Write>(out: &mut W, trades: &[Trade]) -> io::Result<()> {
    writeln!(out, "\nTrade History ({})", trades.len())?;
    writeln!(out, "+--------+--------+--------+-----------+---------+")?;
    writeln!(out, "| Trade  |  Buy   |  Sell  |   Price   |   Qty   |")?;
    writeln!(out, "+--------+--------+--------+-----------+---------+")?;
    for t in trades {
        writeln!(
            out,
            "| {:>6} | {:>6} | {:>6} | {:>9.2} | {:>7} |",
            t.trade_id, t.buy_order_id, t.sell_order_id, t.price, t.quantity
        )?;
    }
    writeln!(out, "+--------+--------+--------+-----------+---------+")
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::ManualClock;
    use std::fs;
    use uuid::Uuid;

    fn session_with(config: LobxConfig) -> (Session, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(1_000));
        let session = Session::new(config, clock.clone()).unwrap();
        (session, clock)
    }

    fn run_line(session: &mut Session, line: &str) -> String {
        let mut out = Vec::new();
        session.handle_line(line, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_parse_add_limit() {
        assert_eq!(
            parse_command("add_limit buy 100.5 10").unwrap(),
            Some(Command::AddLimit {
                side: Side::Buy,
                price: 100.5,
                quantity: 10,
                ttl_ms: None
            })
        );
        assert_eq!(
            parse_command("  ADD_LIMIT s 99 1 500 ").unwrap(),
            Some(Command::AddLimit {
                side: Side::Sell,
                price: 99.0,
                quantity: 1,
                ttl_ms: Some(500)
            })
        );
    }

    #[test]
    fn test_parse_other_commands() {
        assert_eq!(
            parse_command("add_market sell 7").unwrap(),
            Some(Command::AddMarket {
                side: Side::Sell,
                quantity: 7
            })
        );
        assert_eq!(parse_command("cancel O3").unwrap(), Some(Command::Cancel("O3".into())));
        assert_eq!(parse_command("print_depth").unwrap(), Some(Command::Depth));
        assert_eq!(parse_command("orders").unwrap(), Some(Command::Orders));
        assert_eq!(parse_command("trades").unwrap(), Some(Command::Trades));
        assert_eq!(parse_command("save").unwrap(), Some(Command::Save(None)));
        assert_eq!(
            parse_command("load /tmp/b.json").unwrap(),
            Some(Command::Load(Some(PathBuf::from("/tmp/b.json"))))
        );
        assert_eq!(parse_command("q").unwrap(), Some(Command::Quit));
        assert_eq!(parse_command("   ").unwrap(), None);
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_command("add_limit hold 100 1").is_err());
        assert!(parse_command("add_limit buy abc 1").is_err());
        assert!(parse_command("add_limit buy inf 1").is_err());
        assert!(parse_command("add_limit buy 100 -1").is_err());
        assert!(parse_command("add_limit buy 100 1 0").is_err());
        assert!(parse_command("add_limit buy 100").is_err());
        assert!(parse_command("add_market buy").is_err());
        assert!(parse_command("cancel").is_err());
        assert!(parse_command("frobnicate").is_err());
    }

    #[test]
    fn test_orders_match_through_session() {
        let (mut session, _) = session_with(LobxConfig::default());

        let out = run_line(&mut session, "add_limit sell 100 10");
        assert!(out.contains("Order O1: ACTIVE"), "{}", out);

        let out = run_line(&mut session, "add_limit buy 100 4");
        assert!(out.contains("Order O2: FILLED"), "{}", out);
        assert!(out.contains("Trade #1: O2 buys 4 from O1 @ 100.00"), "{}", out);

        let out = run_line(&mut session, "depth");
        assert!(out.contains("| SELL |    100.00 |       6 |      1 |"), "{}", out);

        let out = run_line(&mut session, "trades");
        assert!(out.contains("Trade History (1)"));
    }

    #[test]
    fn test_bad_input_keeps_session_alive() {
        let (mut session, _) = session_with(LobxConfig::default());
        let input = "bogus\nadd_limit buy 100 0\nadd_limit buy 100 1\nquit\nadd_limit buy 101 1\n";
        let mut out = Vec::new();

        session.run(input.as_bytes(), &mut out).unwrap();
        let out = String::from_utf8(out).unwrap();

        assert!(out.contains("unknown command 'bogus'"));
        assert!(out.contains("Invalid order"));
        // Lines after quit are not read
        assert_eq!(session.engine.book().order_count(), 1);
        assert_eq!(session.engine.best_bid(), 100.0);
    }

    #[test]
    fn test_cancel_through_session() {
        let (mut session, _) = session_with(LobxConfig::default());
        run_line(&mut session, "add_limit buy 100 1");

        assert!(run_line(&mut session, "cancel O1").contains("Cancelled O1"));
        assert!(run_line(&mut session, "cancel O1").contains("not found"));
    }

    #[test]
    fn test_expired_orders_swept_before_command() {
        let (mut session, clock) = session_with(LobxConfig::default());
        run_line(&mut session, "add_limit buy 100 1 50");
        run_line(&mut session, "add_limit buy 99 1");

        clock.advance(49);
        let out = run_line(&mut session, "orders");
        assert!(out.contains("Active Orders (2)"), "{}", out);

        clock.advance(1);
        let out = run_line(&mut session, "orders");
        assert!(out.contains("Active Orders (1)"), "{}", out);
        assert_eq!(session.engine.best_bid(), 99.0);
    }

    #[test]
    fn test_default_ttl_applies() {
        let mut config = LobxConfig::default();
        config.engine.default_ttl_ms = Some(10);
        let (mut session, _) = session_with(config);

        run_line(&mut session, "add_limit sell 100 1");
        run_line(&mut session, "add_limit sell 101 1 5000");

        let orders = session.engine.active_orders();
        assert_eq!(orders[0].expiry, Some(1_010));
        assert_eq!(orders[1].expiry, Some(6_000));
    }

    #[test]
    fn test_market_order_never_rests() {
        let (mut session, _) = session_with(LobxConfig::default());
        run_line(&mut session, "add_limit sell 100 10");

        let out = run_line(&mut session, "add_market buy 15");
        assert!(out.contains("CANCELLED (10 filled, 5 remaining)"), "{}", out);
        assert!(session.engine.book().is_empty());
    }

    #[test]
    fn test_save_and_load_commands() {
        let dir = std::env::temp_dir().join(format!("lobx-repl-{}", Uuid::new_v4()));
        let mut config = LobxConfig::default();
        config.snapshot.path = dir.join("book.json").to_string_lossy().to_string();

        let (mut session, _) = session_with(config.clone());
        run_line(&mut session, "add_limit buy 99 3");
        run_line(&mut session, "add_limit sell 101 2");
        assert!(run_line(&mut session, "save").contains("Saved 2 orders"));

        let (mut restored, _) = session_with(config);
        assert!(run_line(&mut restored, "load").contains("Loaded 2 orders"));
        assert_eq!(restored.engine.depth(None), session.engine.depth(None));

        let out = run_line(&mut restored, "load /definitely/not/here.json");
        assert!(out.starts_with("Error: I/O error"), "{}", out);

        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_new_ids_skip_restored_orders() {
        let dir = std::env::temp_dir().join(format!("lobx-repl-{}", Uuid::new_v4()));
        let mut config = LobxConfig::default();
        config.snapshot.path = dir.join("book.json").to_string_lossy().to_string();

        let (mut session, _) = session_with(config.clone());
        run_line(&mut session, "add_limit buy 99 3");
        run_line(&mut session, "add_limit sell 101 2");
        run_line(&mut session, "save");

        let (mut restored, _) = session_with(config);
        assert!(run_line(&mut restored, "load").contains("Loaded 2 orders"));

        let out = run_line(&mut restored, "add_limit buy 90 1");
        assert!(out.starts_with("Order O3: ACTIVE"), "{}", out);
        let out = run_line(&mut restored, "add_limit buy 91 1");
        assert!(out.starts_with("Order O4: ACTIVE"), "{}", out);
        assert_eq!(restored.engine.active_orders().len(), 4);

        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_ledger_enabled_creates_file() {
        let dir = std::env::temp_dir().join(format!("lobx-repl-{}", Uuid::new_v4()));
        let mut config = LobxConfig::default();
        config.trade_ledger.enabled = true;
        config.trade_ledger.directory = dir.to_string_lossy().to_string();

        let (mut session, _) = session_with(config);
        run_line(&mut session, "add_limit sell 100 1");
        run_line(&mut session, "add_limit buy 100 1");

        let entries: Vec<_> = fs::read_dir(&dir).unwrap().collect();
        assert_eq!(entries.len(), 1);
        let content = fs::read_to_string(entries[0].as_ref().unwrap().path()).unwrap();
        assert_eq!(content.lines().count(), 2);

        fs::remove_dir_all(dir).unwrap();
    }
}
