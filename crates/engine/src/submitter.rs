use async_trait::async_trait;
use polytrader_core::{OrderId, OrderRequest, Result};

/// Boundary to whatever actually places orders on the exchange.
///
/// `SimulatedSubmitter` is the only implementation shipped here; a signing
/// CLOB client slots in behind the same trait without touching
/// `TradeExecutor`.
#[async_trait]
pub trait OrderSubmitter: Send + Sync {
    /// Submit a sized order and return the exchange's order id.
    ///
    /// Any error is treated by the caller as a terminal failure of this
    /// attempt; its message ends up in the ledger.
    async fn submit_order(&self, order: &OrderRequest) -> Result<OrderId>;
}

#[async_trait]
impl<T: OrderSubmitter + ?Sized> OrderSubmitter for std::sync::Arc<T> {
    async fn submit_order(&self, order: &OrderRequest) -> Result<OrderId> {
        (**self).submit_order(order).await
    }
}
