use crate::*;
use regex::Regex;
use thiserror::Error;

const LOG_FORMATS: [&str; 3] = ["pretty", "json", "compact"];

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("{field} must be a positive integer")]
    InvalidPositiveInteger { field: String },

    #[error("{field} must not be empty")]
    EmptyField { field: String },

    #[error("Invalid log format: {0}. Must be one of: pretty, json, compact")]
    InvalidLogFormat(String),

    #[error("Invalid log level: {0}. Expected e.g. info, debug or matching_engine=debug,info")]
    InvalidLogLevel(String),
}

#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct DefaultApplied {
    pub field: String,
    pub value: String,
}

#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
    pub defaults_applied: Vec<DefaultApplied>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, field: &str, message: &str) {
        self.warnings.push(ValidationWarning {
            field: field.to_string(),
            message: message.to_string(),
        });
    }

    pub fn add_default(&mut self, field: &str, value: &str) {
        self.defaults_applied.push(DefaultApplied {
            field: field.to_string(),
            value: value.to_string(),
        });
    }
}

pub fn validate_config(config: &LobxConfig) -> ValidationReport {
    let mut report = ValidationReport::new();

    validate_engine(&config.engine, &mut report);
    validate_snapshot(&config.snapshot, &mut report);
    validate_trade_ledger(&config.trade_ledger, &mut report);
    validate_logging(&config.logging, &mut report);

    report
}

fn warn_unresolved(field: &str, value: &str, report: &mut ValidationReport) {
    for var in unresolved_env_vars(value) {
        report.add_warning(
            field,
            &format!("Environment variable '{}' is not set; placeholder kept literally", var),
        );
    }
}

fn validate_engine(engine: &EngineConfig, report: &mut ValidationReport) {
    if engine.instrument.trim().is_empty() {
        report.add_error(ValidationError::EmptyField {
            field: "engine.instrument".to_string(),
        });
    }
    warn_unresolved("engine.instrument", &engine.instrument, report);

    match engine.default_ttl_ms {
        Some(0) => report.add_error(ValidationError::InvalidPositiveInteger {
            field: "engine.default_ttl_ms".to_string(),
        }),
        Some(_) => {}
        None => report.add_default("engine.default_ttl_ms", "none (orders rest until cancelled)"),
    }

    if engine.max_depth_levels == 0 {
        report.add_error(ValidationError::InvalidPositiveInteger {
            field: "engine.max_depth_levels".to_string(),
        });
    }
}

fn validate_snapshot(snapshot: &SnapshotConfig, report: &mut ValidationReport) {
    if snapshot.path.trim().is_empty() {
        report.add_error(ValidationError::EmptyField {
            field: "snapshot.path".to_string(),
        });
    }
    warn_unresolved("snapshot.path", &snapshot.path, report);
}

fn validate_trade_ledger(ledger: &TradeLedgerConfig, report: &mut ValidationReport) {
    if ledger.enabled && ledger.directory.trim().is_empty() {
        report.add_warning(
            "trade_ledger.directory",
            "Empty directory; ledger files will be written to the working directory",
        );
    }
    warn_unresolved("trade_ledger.directory", &ledger.directory, report);
}

fn validate_logging(logging: &LoggingConfig, report: &mut ValidationReport) {
    if !LOG_FORMATS.contains(&logging.format.to_lowercase().as_str()) {
        report.add_error(ValidationError::InvalidLogFormat(logging.format.clone()));
    }

    // Comma-separated `level` or `target=level` directives
    let level_regex = Regex::new(
        r"^(?i)([\w:]+=)?(trace|debug|info|warn|error|off)(,([\w:]+=)?(trace|debug|info|warn|error|off))*$",
    )
    .expect("level regex is valid");
    if !level_regex.is_match(logging.level.trim()) {
        report.add_error(ValidationError::InvalidLogLevel(logging.level.clone()));
    }
}
