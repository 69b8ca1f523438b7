use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Exchange-assigned order identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderId(pub String);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Buy or Sell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    #[serde(alias = "BUY", alias = "Buy")]
    Buy,
    #[serde(alias = "SELL", alias = "Sell")]
    Sell,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

/// Outcome tag of a single execution attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeStatus {
    DryRun,
    Pending,
    Success,
    Failed,
}

impl TradeStatus {
    /// Whether this status is a resolved outcome that may be written to the ledger.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TradeStatus::Pending)
    }
}

impl fmt::Display for TradeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeStatus::DryRun => write!(f, "DRY_RUN"),
            TradeStatus::Pending => write!(f, "PENDING"),
            TradeStatus::Success => write!(f, "SUCCESS"),
            TradeStatus::Failed => write!(f, "FAILED"),
        }
    }
}

/// A caller-supplied request to trade. Fields arrive loosely populated and
/// are checked with [`TradeIntent::validate`] before anything is sized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeIntent {
    pub side: Side,
    #[serde(default)]
    pub token_id: String,
    #[serde(default)]
    pub price: Decimal,
    #[serde(default)]
    pub market_slug: String,
    #[serde(default)]
    pub reason: String,
}

impl TradeIntent {
    pub fn new(
        side: Side,
        token_id: impl Into<String>,
        price: Decimal,
        market_slug: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            side,
            token_id: token_id.into(),
            price,
            market_slug: market_slug.into(),
            reason: reason.into(),
        }
    }

    /// Reject intents without an instrument or with a non-positive price.
    pub fn validate(&self) -> crate::Result<()> {
        if self.token_id.trim().is_empty() {
            return Err(crate::Error::InvalidIntent("missing token id".into()));
        }
        if self.price <= Decimal::ZERO {
            return Err(crate::Error::InvalidIntent(format!(
                "price must be positive, got {}",
                self.price
            )));
        }
        Ok(())
    }
}

/// Sized order handed to an order submitter.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    pub side: Side,
    pub token_id: String,
    pub price: Decimal,
    pub quantity: u64,
    pub total_cost: Decimal,
    pub market_slug: String,
}

/// Outcome of one execution attempt, as returned to the caller and written
/// to the ledger.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeRecord {
    #[serde(serialize_with = "serialize_timestamp")]
    pub timestamp: DateTime<Utc>,
    pub market_slug: String,
    pub side: Side,
    pub token_id: String,
    pub price: Decimal,
    pub quantity: u64,
    pub total_cost: Decimal,
    pub status: TradeStatus,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<OrderId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TradeRecord {
    /// ISO-8601 UTC timestamp with millisecond precision, e.g. `2026-10-19T08:30:00.123Z`.
    pub fn timestamp_iso(&self) -> String {
        format_timestamp(&self.timestamp)
    }

    /// The request that a live submission of this record would send.
    pub fn order_request(&self) -> OrderRequest {
        OrderRequest {
            side: self.side,
            token_id: self.token_id.clone(),
            price: self.price,
            quantity: self.quantity,
            total_cost: self.total_cost,
            market_slug: self.market_slug.clone(),
        }
    }
}

pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn serialize_timestamp<S>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&format_timestamp(ts))
}
