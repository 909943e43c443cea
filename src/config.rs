// ⚙️ Configuration - environment-driven settings for CLI and server

use crate::error::BrokerageError;
use crate::money::parse_amount;
use anyhow::Result;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite database file
    pub db_path: PathBuf,

    /// Address the REST server binds to
    pub bind_addr: String,

    /// Directory with the compiled front-end, served under /static
    pub static_dir: PathBuf,

    /// Harmonized sales tax rate applied to commissions (0.13 = 13%)
    pub hst_rate: Decimal,

    /// Reconciliation: differences below this are treated as balanced
    pub recon_tolerance: Decimal,

    /// Reconciliation: minor vs major discrepancy threshold
    pub recon_major_threshold: Decimal,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            db_path: PathBuf::from("brokerage.db"),
            bind_addr: "0.0.0.0:3000".to_string(),
            static_dir: PathBuf::from("web"),
            hst_rate: dec!(0.13),
            recon_tolerance: dec!(0.01),
            recon_major_threshold: dec!(10.00),
        }
    }
}

impl Config {
    /// Load from the process environment (after reading `.env` if present)
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; unset keys keep their defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(path) = lookup("BROKERAGE_DB_PATH") {
            config.db_path = PathBuf::from(path);
        }
        if let Some(addr) = lookup("BROKERAGE_BIND_ADDR") {
            config.bind_addr = addr;
        }
        if let Some(dir) = lookup("BROKERAGE_STATIC_DIR") {
            config.static_dir = PathBuf::from(dir);
        }
        if let Some(rate) = lookup("BROKERAGE_HST_RATE") {
            config.hst_rate = parse_setting("BROKERAGE_HST_RATE", &rate)?;
            if config.hst_rate < Decimal::ZERO || config.hst_rate >= Decimal::ONE {
                return Err(BrokerageError::Validation(format!(
                    "BROKERAGE_HST_RATE must be in [0, 1), got {}",
                    config.hst_rate
                ))
                .into());
            }
        }
        if let Some(tol) = lookup("BROKERAGE_RECON_TOLERANCE") {
            config.recon_tolerance = parse_setting("BROKERAGE_RECON_TOLERANCE", &tol)?;
        }
        if let Some(threshold) = lookup("BROKERAGE_RECON_MAJOR_THRESHOLD") {
            config.recon_major_threshold =
                parse_setting("BROKERAGE_RECON_MAJOR_THRESHOLD", &threshold)?;
        }

        Ok(config)
    }
}

fn parse_setting(key: &str, raw: &str) -> Result<Decimal> {
    parse_amount(raw).map_err(|_| {
        BrokerageError::Validation(format!("{} is not a number: {:?}", key, raw)).into()
    })
}
