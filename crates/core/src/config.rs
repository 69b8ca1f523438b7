use rust_decimal::Decimal;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variables read on top of the config file.
pub const ENV_DRY_RUN: &str = "DRY_RUN";
pub const ENV_TARGET_SPEND: &str = "TARGET_SPEND_USD";
pub const ENV_LEDGER_PATH: &str = "METRICS_FILE";
pub const ENV_PRIVATE_KEY: &str = "POLY_PRIVATE_KEY";
pub const ENV_PROXY_ADDRESS: &str = "POLY_PROXY_ADDRESS";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub trading: TradingConfig,
    /// Exchange credentials. Only ever taken from the environment.
    #[serde(skip)]
    pub credentials: Option<Credentials>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TradingConfig {
    /// Record trades without contacting the exchange
    #[serde(default = "default_dry_run")]
    pub dry_run: bool,
    /// USD budget per trade; quantity is rounded up so this is always met.
    /// May be left out of the file and supplied through `TARGET_SPEND_USD`.
    #[serde(default)]
    pub target_spend_usd: Decimal,
    #[serde(default = "default_ledger_path")]
    pub ledger_path: PathBuf,
    /// Artificial latency of the simulated order submitter
    #[serde(default = "default_submit_latency_ms")]
    pub submit_latency_ms: u64,
}

fn default_dry_run() -> bool {
    true
}
fn default_ledger_path() -> PathBuf {
    PathBuf::from("logs/trades.csv")
}
fn default_submit_latency_ms() -> u64 {
    1000
}

/// Signing credentials for live order submission.
#[derive(Clone)]
pub struct Credentials {
    pub private_key: String,
    pub proxy_address: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("private_key", &"***")
            .field("proxy_address", &self.proxy_address)
            .finish()
    }
}

/// Snapshot of the settings the trade executor runs with. Taken once at
/// startup and never changed afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutorConfig {
    pub dry_run: bool,
    pub credentials_present: bool,
    pub target_spend: Decimal,
    pub ledger_path: PathBuf,
}

impl Config {
    /// Read the TOML file at `path`, then apply overrides from the process
    /// environment.
    pub fn load(path: &Path) -> crate::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::Config(format!("Failed to read {}: {e}", path.display())))?;
        let mut config = Self::from_toml_str(&contents)?;

        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;

        debug!(
            path = %path.display(),
            dry_run = config.trading.dry_run,
            credentials = config.credentials.is_some(),
            "config loaded"
        );
        Ok(config)
    }

    /// Build a config from environment variables alone. `TARGET_SPEND_USD`
    /// is required in this case.
    pub fn from_env() -> crate::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> crate::Result<Self> {
        if lookup(ENV_TARGET_SPEND).is_none() {
            return Err(crate::Error::Config(format!(
                "{ENV_TARGET_SPEND} must be set when no config file is used"
            )));
        }
        let mut config = Config {
            trading: TradingConfig {
                dry_run: default_dry_run(),
                target_spend_usd: Decimal::ZERO,
                ledger_path: default_ledger_path(),
                submit_latency_ms: default_submit_latency_ms(),
            },
            credentials: None,
        };
        config.apply_env(lookup)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> crate::Result<Self> {
        toml::from_str(contents)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {e}")))
    }

    /// Apply `DRY_RUN`, `TARGET_SPEND_USD` and `METRICS_FILE` overrides and
    /// pick up credentials. Empty values count as unset.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> crate::Result<()> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(raw) = get(ENV_DRY_RUN) {
            self.trading.dry_run = parse_bool(&raw).ok_or_else(|| {
                crate::Error::Config(format!("{ENV_DRY_RUN} must be true or false, got '{raw}'"))
            })?;
        }
        if let Some(raw) = get(ENV_TARGET_SPEND) {
            self.trading.target_spend_usd = raw.trim().parse().map_err(|e| {
                crate::Error::Config(format!("{ENV_TARGET_SPEND} is not a number ('{raw}'): {e}"))
            })?;
        }
        if let Some(raw) = get(ENV_LEDGER_PATH) {
            self.trading.ledger_path = PathBuf::from(raw);
        }

        self.credentials = get(ENV_PRIVATE_KEY).map(|private_key| Credentials {
            private_key,
            proxy_address: get(ENV_PROXY_ADDRESS),
        });
        Ok(())
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.trading.target_spend_usd <= Decimal::ZERO {
            return Err(crate::Error::Config(format!(
                "target_spend_usd must be positive, got {}",
                self.trading.target_spend_usd
            )));
        }
        if self.trading.ledger_path.as_os_str().is_empty() {
            return Err(crate::Error::Config("ledger_path is empty".into()));
        }
        Ok(())
    }

    pub fn executor_config(&self) -> ExecutorConfig {
        ExecutorConfig {
            dry_run: self.trading.dry_run,
            credentials_present: self.credentials.is_some(),
            target_spend: self.trading.target_spend_usd,
            ledger_path: self.trading.ledger_path.clone(),
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
