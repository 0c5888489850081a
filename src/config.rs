//! Configuration management for the settlements server

use serde::Deserialize;
use std::fs;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
}

#[derive(Debug, Deserialize)]
pub struct ApiConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

#[derive(Debug, Deserialize, Default)]
pub struct LedgerConfig {
    /// Hex-encoded admin identity to initialize a fresh ledger with.
    #[serde(default)]
    pub admin: String,
    /// Run `initialize` on startup when the store holds no state yet.
    #[serde(default)]
    pub auto_initialize: bool,
}

pub fn load_config() -> Result<Config, Box<dyn std::error::Error>> {
    let config_str = fs::read_to_string("config.toml").unwrap_or_default();
    let config: Config = if config_str.is_empty() {
        // Provide sane defaults when config.toml is absent
        Config {
            api: ApiConfig { port: 8080 },
            database: DatabaseConfig {
                path: default_db_path(),
            },
            ledger: LedgerConfig::default(),
        }
    } else {
        toml::from_str(&config_str)?
    };

    // Validate critical values
    if config.database.path.is_empty() {
        return Err("database.path must be set in config.toml".into());
    }

    if !config.ledger.admin.is_empty()
        && (config.ledger.admin.len() != 64 || hex::decode(&config.ledger.admin).is_err())
    {
        return Err("ledger.admin must be a 64-character hex string".into());
    }

    if config.ledger.auto_initialize && config.ledger.admin.is_empty() {
        return Err("ledger.auto_initialize requires ledger.admin to be set".into());
    }

    Ok(config)
}

fn default_db_path() -> String {
    "./settlements.db".to_string()
}
