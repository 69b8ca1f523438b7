use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use polytrader_core::config::ENV_PRIVATE_KEY;
use polytrader_core::{Credentials, Error, OrderId, OrderRequest, Result};

use crate::submitter::OrderSubmitter;

/// Internal mutable state for the simulated submitter.
struct SimulatedState {
    /// Every order accepted so far, in submission order.
    submitted: Vec<OrderRequest>,
    /// Monotonic counter so ids stay unique within one millisecond.
    next_seq: u64,
}

/// Stands in for the Polymarket CLOB: accepts every order after a fixed
/// delay and hands back a synthetic `sim-` order id. Without credentials it
/// rejects everything, the same way a real signing client would.
pub struct SimulatedSubmitter {
    state: Arc<Mutex<SimulatedState>>,
    credentials: Option<Credentials>,
    latency: Duration,
}

impl SimulatedSubmitter {
    pub const DEFAULT_LATENCY: Duration = Duration::from_millis(1000);

    pub fn new(credentials: Option<Credentials>) -> Self {
        Self {
            state: Arc::new(Mutex::new(SimulatedState {
                submitted: Vec::new(),
                next_seq: 1,
            })),
            credentials,
            latency: Self::DEFAULT_LATENCY,
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Return a copy of all accepted orders.
    pub async fn submitted(&self) -> Vec<OrderRequest> {
        let state = self.state.lock().await;
        state.submitted.clone()
    }

    pub async fn submission_count(&self) -> usize {
        let state = self.state.lock().await;
        state.submitted.len()
    }
}

#[async_trait]
impl OrderSubmitter for SimulatedSubmitter {
    async fn submit_order(&self, order: &OrderRequest) -> Result<OrderId> {
        if self.credentials.is_none() {
            warn!(token = %order.token_id, "order submission without credentials");
            return Err(Error::Execution(format!(
                "missing exchange credentials ({ENV_PRIVATE_KEY} not set)"
            )));
        }

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let mut state = self.state.lock().await;
        let id = OrderId(format!("sim-{}-{}", Utc::now().timestamp_millis(), state.next_seq));
        state.next_seq += 1;

        debug!(
            order_id = %id,
            side = %order.side,
            price = %order.price,
            quantity = order.quantity,
            token = %order.token_id,
            "simulated order accepted"
        );

        state.submitted.push(order.clone());
        Ok(id)
    }
}
