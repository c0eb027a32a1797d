pub fn default_instrument() -> String {
    "DEMO".to_string()
}

pub fn default_max_depth_levels() -> usize {
    10
}

pub fn default_snapshot_path() -> String {
    "snapshots/book.json".to_string()
}

pub fn default_ledger_directory() -> String {
    "ledgers".to_string()
}

pub fn default_log_format() -> String {
    "pretty".to_string()
}

pub fn default_log_level() -> String {
    "info".to_string()
}
