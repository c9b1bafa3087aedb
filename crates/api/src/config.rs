//! Application configuration loaded from environment variables.

use settlement::SettlementConfig;

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST` — bind address (default: `"0.0.0.0"`)
/// - `PORT` — listen port (default: `3000`)
/// - `RUST_LOG` — tracing filter directive (default: `"info"`)
/// - `DATABASE_URL` — Postgres connection string; the in-memory store is
///   used when unset
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub database_url: Option<String>,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
            log_level: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            database_url: std::env::var("DATABASE_URL").ok(),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Builds the settlement configuration, applying chain overrides from
    /// the environment:
    /// - `CHAIN_NETWORK`, `TOKEN_SYMBOL`, `TOKEN_ADDRESS`, `TOKEN_DECIMALS`
    /// - `ESCROW_ADDRESS`, `EXPLORER_BASE_URL`, `FIAT_CURRENCY`
    pub fn settlement_config(&self) -> SettlementConfig {
        let mut config = SettlementConfig::default();

        if let Ok(v) = std::env::var("CHAIN_NETWORK") {
            config.chain.network = v;
        }
        if let Ok(v) = std::env::var("TOKEN_SYMBOL") {
            config.chain.token_symbol = v;
        }
        if let Ok(v) = std::env::var("TOKEN_ADDRESS") {
            config.chain.token_address = v;
        }
        if let Some(v) = std::env::var("TOKEN_DECIMALS")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            config.chain.token_decimals = v;
        }
        if let Ok(v) = std::env::var("ESCROW_ADDRESS") {
            config.chain.escrow_address = v;
        }
        if let Ok(v) = std::env::var("EXPLORER_BASE_URL") {
            config.chain.explorer_base_url = v;
        }
        if let Ok(v) = std::env::var("FIAT_CURRENCY") {
            config.fiat_currency = v;
        }

        config
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            database_url: None,
        }
    }
}
