pub mod config;
pub mod error;
pub mod types;

pub use config::{Config, Credentials, ExecutorConfig, TradingConfig};
pub use error::Error;
pub use types::*;

pub type Result<T> = std::result::Result<T, Error>;
