//! Ledger configuration.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use credits_core::{BillingError, PricingTable, Result, DEFAULT_MONTHLY_ALLOWANCE};

/// Default `RocksDB` data directory.
pub const DEFAULT_DATA_DIR: &str = "/data/credit-ledger";

/// Which ledger store to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreBackend {
    /// In-process store. Balances are lost on restart.
    #[default]
    Memory,
    /// Embedded `RocksDB` under `data_dir`.
    Rocks,
    /// PostgreSQL at `database_url`.
    Postgres,
}

impl StoreBackend {
    /// Name used in configuration and log events.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Rocks => "rocksdb",
            Self::Postgres => "postgres",
        }
    }
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StoreBackend {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "rocksdb" | "rocks" => Ok(Self::Rocks),
            "postgres" | "postgresql" => Ok(Self::Postgres),
            other => Err(BillingError::Configuration(format!(
                "unknown ledger backend: {other}"
            ))),
        }
    }
}

/// Ledger configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// Credits granted per period (default: 10000).
    pub monthly_allowance: i64,

    /// Store backend (default: memory).
    pub backend: StoreBackend,

    /// Path to `RocksDB` data directory (default: "/data/credit-ledger").
    pub data_dir: PathBuf,

    /// PostgreSQL connection URL.
    pub database_url: Option<String>,

    /// Pricing table.
    pub pricing: PricingTable,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            monthly_allowance: DEFAULT_MONTHLY_ALLOWANCE,
            backend: StoreBackend::default(),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            database_url: None,
            pricing: PricingTable::default(),
        }
    }
}

impl LedgerConfig {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `BillingError::Configuration` if a variable is set but cannot
    /// be parsed, the pricing file cannot be read, or the result fails
    /// [`validate`](Self::validate).
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through `lookup`, which maps a variable name to its
    /// value.
    ///
    /// # Errors
    ///
    /// Same as [`from_env`](Self::from_env).
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let monthly_allowance = match lookup("MONTHLY_CREDIT_ALLOWANCE") {
            Some(raw) => raw.trim().parse().map_err(|_| {
                BillingError::Configuration(format!(
                    "MONTHLY_CREDIT_ALLOWANCE is not an integer: {raw}"
                ))
            })?,
            None => defaults.monthly_allowance,
        };

        let backend = match lookup("LEDGER_BACKEND") {
            Some(raw) => raw.parse()?,
            None => defaults.backend,
        };

        let pricing = match lookup("PRICING_FILE") {
            Some(path) => {
                let json = std::fs::read_to_string(&path).map_err(|e| {
                    BillingError::Configuration(format!("cannot read pricing file {path}: {e}"))
                })?;
                PricingTable::from_json(&json)?
            }
            None => defaults.pricing,
        };

        let config = Self {
            monthly_allowance,
            backend,
            data_dir: lookup("LEDGER_DATA_DIR").map_or(defaults.data_dir, PathBuf::from),
            database_url: lookup("DATABASE_URL").filter(|url| !url.is_empty()),
            pricing,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns `BillingError::Configuration` if the allowance is not positive,
    /// the Postgres backend has no URL, or a pricing rate is not positive.
    pub fn validate(&self) -> Result<()> {
        if self.monthly_allowance <= 0 {
            return Err(BillingError::Configuration(format!(
                "monthly allowance must be positive, got {}",
                self.monthly_allowance
            )));
        }
        if self.backend == StoreBackend::Postgres && self.database_url.is_none() {
            return Err(BillingError::Configuration(
                "DATABASE_URL is required for the postgres backend".into(),
            ));
        }
        self.pricing.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn load(vars: &[(&str, &str)]) -> Result<LedgerConfig> {
        LedgerConfig::from_lookup(lookup(vars))
    }

    const PRICING_JSON: &str = r#"{
        "models": {
            "tiny": {
                "input_credits_per_million": 10,
                "output_credits_per_million": 20
            }
        },
        "default_rate": {
            "input_credits_per_million": 30000,
            "output_credits_per_million": 150000
        }
    }"#;

    #[test]
    fn defaults_when_unset() {
        let config = LedgerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.monthly_allowance, 10_000);
        assert_eq!(config.backend, StoreBackend::Memory);
        assert_eq!(config.data_dir, PathBuf::from("/data/credit-ledger"));
        assert!(config.database_url.is_none());
    }

    #[test]
    fn reads_variables() {
        let config = LedgerConfig::from_lookup(lookup(&[
            ("MONTHLY_CREDIT_ALLOWANCE", "500"),
            ("LEDGER_BACKEND", "Postgres"),
            ("DATABASE_URL", "postgres://localhost/ledger"),
            ("LEDGER_DATA_DIR", "/tmp/ledger"),
        ]))
        .unwrap();

        assert_eq!(config.monthly_allowance, 500);
        assert_eq!(config.backend, StoreBackend::Postgres);
        assert_eq!(
            config.database_url.as_deref(),
            Some("postgres://localhost/ledger")
        );
        assert_eq!(config.data_dir, PathBuf::from("/tmp/ledger"));
    }

    #[test]
    fn rejects_bad_values() {
        assert!(load(&[("MONTHLY_CREDIT_ALLOWANCE", "lots")]).is_err());
        assert!(load(&[("MONTHLY_CREDIT_ALLOWANCE", "0")]).is_err());
        assert!(load(&[("LEDGER_BACKEND", "sqlite")]).is_err());
        assert!(load(&[("LEDGER_BACKEND", "postgres")]).is_err());
    }

    #[test]
    fn loads_pricing_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(PRICING_JSON.as_bytes()).unwrap();

        let path = file.path().to_string_lossy().into_owned();
        let config = load(&[("PRICING_FILE", &path)]).unwrap();
        assert!(config.pricing.is_known("tiny"));
        assert!(!config.pricing.is_known(credits_core::HAIKU_MODEL));
    }

    #[test]
    fn missing_pricing_file_is_an_error() {
        let err = load(&[("PRICING_FILE", "/nonexistent/pricing.json")]).unwrap_err();
        assert!(matches!(err, BillingError::Configuration(_)));
    }

    #[test]
    fn backend_names_round_trip() {
        for backend in [StoreBackend::Memory, StoreBackend::Rocks, StoreBackend::Postgres] {
            assert_eq!(backend.as_str().parse::<StoreBackend>().unwrap(), backend);
        }
    }
}
