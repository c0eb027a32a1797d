use crate::*;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::{debug, info, instrument};

/// Read, substitute and parse a configuration file
#[instrument(skip(path))]
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<LobxConfig> {
    let path = path.as_ref();
    info!("Loading configuration from: {:?}", path);

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    debug!("Config file content length: {} bytes", content.len());

    let config = parse_config(&content)?;

    info!("Configuration loaded successfully");
    Ok(config)
}

/// Substitute environment variables and parse YAML text
pub fn parse_config(content: &str) -> Result<LobxConfig> {
    let substituted = substitution::substitute_env_vars(content);

    // An empty file is a valid, all-default configuration
    if substituted.trim().is_empty() {
        return Ok(LobxConfig::default());
    }

    serde_yaml::from_str(&substituted).with_context(|| "Failed to parse YAML configuration")
}

/// Configuration written by `lobx init`
#[instrument]
pub fn generate_default_config() -> LobxConfig {
    LobxConfig {
        engine: EngineConfig {
            instrument: default_instrument(),
            default_ttl_ms: Some(60_000),
            max_depth_levels: default_max_depth_levels(),
        },
        snapshot: SnapshotConfig {
            path: default_snapshot_path(),
            load_on_start: true,
            save_on_exit: true,
        },
        trade_ledger: TradeLedgerConfig {
            enabled: true,
            directory: default_ledger_directory(),
        },
        logging: LoggingConfig::default(),
    }
}

#[instrument(skip(config))]
pub fn save_config<P: AsRef<Path> + std::fmt::Debug>(config: &LobxConfig, path: P) -> Result<()> {
    let path = path.as_ref();
    info!("Saving configuration to: {:?}", path);

    let yaml = serde_yaml::to_string(config)
        .with_context(|| "Failed to serialize configuration to YAML")?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
    }

    fs::write(path, yaml)
        .with_context(|| format!("Failed to write config file: {:?}", path))?;

    info!("Configuration saved successfully");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use uuid::Uuid;

    fn temp_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("lobx-config-{}", Uuid::new_v4()))
            .join("lobx.yaml")
    }

    #[test]
    fn test_save_then_load() {
        let path = temp_path();
        let config = generate_default_config();

        save_config(&config, &path).unwrap();
        let loaded = load_config(&path).unwrap();
        assert_eq!(loaded, config);

        fs::remove_dir_all(path.parent().unwrap()).unwrap();
    }

    #[test]
    fn test_default_config_is_valid() {
        let report = validate_config(&generate_default_config());
        assert!(report.is_valid(), "{:?}", report.errors);
    }

    #[test]
    fn test_missing_file() {
        let err = load_config(temp_path()).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_empty_content_is_default() {
        assert_eq!(parse_config("").unwrap(), LobxConfig::default());
        assert_eq!(parse_config("# nothing\n").unwrap(), LobxConfig::default());
    }

    #[test]
    fn test_env_substitution_before_parse() {
        std::env::set_var("LOBX_TEST_PARSER_INSTRUMENT", "BTC-PERP");
        let config = parse_config("engine:\n  instrument: ${LOBX_TEST_PARSER_INSTRUMENT}\n").unwrap();
        assert_eq!(config.engine.instrument, "BTC-PERP");
    }

    #[test]
    fn test_bad_yaml() {
        assert!(parse_config("engine: [unterminated").is_err());
    }
}
