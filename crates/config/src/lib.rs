//! Configuration for lobx
//!
//! YAML file, every section optional:
//!
//! ```yaml
//! engine:
//!   instrument: "DEMO"
//!   default_ttl_ms: 60000
//!   max_depth_levels: 10
//! snapshot:
//!   path: "snapshots/book.json"
//!   load_on_start: false
//!   save_on_exit: false
//! trade_ledger:
//!   enabled: true
//!   directory: "ledgers"
//! logging:
//!   format: "pretty"
//!   level: "info"
//! ```
//!
//! `${VAR}` and `$VAR` placeholders are replaced from the environment before
//! the YAML is parsed.

use serde::{Deserialize, Serialize};

pub mod defaults;
pub mod parser;
pub mod substitution;
pub mod validator;

pub use defaults::*;
pub use parser::*;
pub use substitution::*;
pub use validator::*;

/// Root of the configuration file
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct LobxConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub snapshot: SnapshotConfig,
    #[serde(default)]
    pub trade_ledger: TradeLedgerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Label attached to every engine log line
    #[serde(default = "default_instrument")]
    pub instrument: String,
    /// TTL applied to limit orders entered without one
    #[serde(default)]
    pub default_ttl_ms: Option<u64>,
    /// Levels per side shown by the `depth` command
    #[serde(default = "default_max_depth_levels")]
    pub max_depth_levels: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            instrument: default_instrument(),
            default_ttl_ms: None,
            max_depth_levels: default_max_depth_levels(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SnapshotConfig {
    /// File used by `save` / `load` without an argument
    #[serde(default = "default_snapshot_path")]
    pub path: String,
    #[serde(default)]
    pub load_on_start: bool,
    #[serde(default)]
    pub save_on_exit: bool,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            path: default_snapshot_path(),
            load_on_start: false,
            save_on_exit: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TradeLedgerConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Directory receiving `trades_<timestamp>.csv`
    #[serde(default = "default_ledger_directory")]
    pub directory: String,
}

impl Default for TradeLedgerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            directory: default_ledger_directory(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// pretty | json | compact
    #[serde(default = "default_log_format")]
    pub format: String,
    /// Filter used when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: default_log_format(),
            level: default_log_level(),
        }
    }
}
