//! Command line and environment configuration.

use std::path::PathBuf;

use clap::Parser;

const MIN_JWT_SECRET_LEN: usize = 32;

/// Gated artwork storefront (interactive console)
#[derive(Parser, Debug, Clone)]
#[command(name = "mystic-market")]
#[command(about = "Storefront for gated digital artworks")]
pub struct Args {
    /// SQLite database file
    #[arg(long = "db", env = "MARKET_DB", default_value = "./assets/db/market.db")]
    pub db_path: PathBuf,

    /// Keep everything in memory instead of opening the database file
    #[arg(long, env = "MARKET_IN_MEMORY", default_value = "false")]
    pub in_memory: bool,

    /// Catalog JSON used to seed an empty database (embedded catalog if absent)
    #[arg(long, env = "MARKET_CATALOG")]
    pub catalog: Option<PathBuf>,

    /// Secret for signing access tokens (required outside dev mode)
    #[arg(long, env = "JWT_SECRET")]
    pub jwt_secret: Option<String>,

    /// Access token lifetime in hours
    #[arg(long, env = "TOKEN_TTL_HOURS", default_value = "24")]
    pub token_ttl_hours: u64,

    /// Hold payments until `settle` instead of succeeding immediately
    #[arg(long, env = "MANUAL_SETTLEMENT", default_value = "false")]
    pub manual_settlement: bool,

    /// Development mode: falls back to a built-in token secret
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Args {
    pub fn validate(&self) -> Result<(), String> {
        match &self.jwt_secret {
            Some(secret) if secret.len() < MIN_JWT_SECRET_LEN => {
                return Err(format!(
                    "JWT_SECRET must be at least {} characters",
                    MIN_JWT_SECRET_LEN
                ));
            }
            None if !self.dev_mode => {
                return Err("JWT_SECRET is required unless --dev-mode is set".to_string());
            }
            _ => {}
        }
        if self.token_ttl_hours == 0 {
            return Err("TOKEN_TTL_HOURS must be at least 1".to_string());
        }
        Ok(())
    }

    pub fn token_ttl_seconds(&self) -> u64 {
        self.token_ttl_hours.saturating_mul(60 * 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_required_outside_dev_mode() {
        let args = Args::parse_from(["mystic-market"]);
        if args.jwt_secret.is_none() && !args.dev_mode {
            assert!(args.validate().is_err());
        }
        let dev = Args::parse_from(["mystic-market", "--dev-mode", "--in-memory"]);
        assert!(dev.validate().is_ok());
        assert!(dev.in_memory);
    }

    #[test]
    fn short_secret_fails_validation() {
        let args = Args::parse_from(["mystic-market", "--jwt-secret", "too-short"]);
        assert!(args.validate().is_err());
        let long = "s".repeat(MIN_JWT_SECRET_LEN);
        let args = Args::parse_from(["mystic-market", "--jwt-secret", long.as_str()]);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn ttl_converts_to_seconds() {
        let args = Args::parse_from(["mystic-market", "--dev-mode", "--token-ttl-hours", "2"]);
        assert_eq!(args.token_ttl_seconds(), 7200);
        let zero = Args::parse_from(["mystic-market", "--dev-mode", "--token-ttl-hours", "0"]);
        assert!(zero.validate().is_err());
    }
}
