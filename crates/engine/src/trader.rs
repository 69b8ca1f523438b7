use chrono::Utc;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::{debug, error, info, warn};

use polytrader_core::{Error, ExecutorConfig, Result, TradeIntent, TradeRecord, TradeStatus};

use crate::ledger::Ledger;
use crate::submitter::OrderSubmitter;

/// Quantity and cost derived from the per-trade spend target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sizing {
    pub quantity: u64,
    pub total_cost: Decimal,
}

/// Size an order so that `quantity * price` is at least `target_spend`.
///
/// Returns `None` for non-positive inputs or a quantity that does not fit in
/// a `u64`.
pub fn size_order(target_spend: Decimal, price: Decimal) -> Option<Sizing> {
    if target_spend <= Decimal::ZERO || price <= Decimal::ZERO {
        return None;
    }

    let mut quantity = target_spend.checked_div(price)?.ceil().to_u64()?.max(1);
    let mut total_cost = Decimal::from(quantity).checked_mul(price)?;
    // Division rounds at 28 significant digits; never undershoot the target.
    if total_cost < target_spend {
        quantity = quantity.checked_add(1)?;
        total_cost = Decimal::from(quantity).checked_mul(price)?;
    }

    Some(Sizing {
        quantity,
        total_cost,
    })
}

/// Turns trade intents into ledger-backed trade records.
///
/// Each call to [`TradeExecutor::execute_trade`] runs
/// validate → size → (dry run | live submit) → persist, and writes exactly
/// one ledger row unless the intent is rejected up front. Calls are not
/// serialized against each other; share the executor behind an `Arc` and
/// add external locking if per-market ordering matters.
pub struct TradeExecutor<S: OrderSubmitter> {
    config: ExecutorConfig,
    submitter: S,
    ledger: Ledger,
}

impl<S: OrderSubmitter> TradeExecutor<S> {
    pub fn new(config: ExecutorConfig, submitter: S) -> Self {
        if !config.dry_run && !config.credentials_present {
            warn!("live trading enabled but no exchange credentials configured; orders will fail");
        }

        info!(
            dry_run = config.dry_run,
            target_spend = %config.target_spend,
            ledger = %config.ledger_path.display(),
            "trade executor ready"
        );

        let ledger = Ledger::new(config.ledger_path.clone());
        Self {
            config,
            submitter,
            ledger,
        }
    }

    /// Execute one trade intent.
    ///
    /// - `Ok(None)`: the intent had no token id or a non-positive price.
    ///   Nothing was sent and nothing was recorded.
    /// - `Ok(Some(record))`: the attempt resolved and was written to the
    ///   ledger. A rejected live submission is still `Ok`, with
    ///   `status == Failed` and the rejection message in `error`.
    /// - `Err(Error::LedgerWrite { record, .. })`: the attempt resolved but
    ///   its row could not be written.
    pub async fn execute_trade(&self, intent: &TradeIntent) -> Result<Option<TradeRecord>> {
        if let Err(e) = intent.validate() {
            warn!(market = %intent.market_slug, reason = %e, "cannot execute trade");
            return Ok(None);
        }

        let Some(sizing) = size_order(self.config.target_spend, intent.price) else {
            warn!(
                market = %intent.market_slug,
                price = %intent.price,
                target_spend = %self.config.target_spend,
                "cannot size trade"
            );
            return Ok(None);
        };

        info!(
            side = %intent.side,
            price = %intent.price,
            market = %intent.market_slug,
            reason = %intent.reason,
            quantity = sizing.quantity,
            total_cost = %sizing.total_cost.round_dp(2),
            "trade signal"
        );

        let mut record = TradeRecord {
            timestamp: Utc::now(),
            market_slug: intent.market_slug.clone(),
            side: intent.side,
            token_id: intent.token_id.clone(),
            price: intent.price,
            quantity: sizing.quantity,
            total_cost: sizing.total_cost,
            status: if self.config.dry_run {
                TradeStatus::DryRun
            } else {
                TradeStatus::Pending
            },
            reason: intent.reason.clone(),
            order_id: None,
            error: None,
        };

        if self.config.dry_run {
            info!(market = %record.market_slug, "dry run active, skipping real order");
        } else {
            self.submit(&mut record).await;
        }

        self.persist(record)
    }

    /// Send a pending record to the exchange and resolve its status.
    async fn submit(&self, record: &mut TradeRecord) {
        info!(market = %record.market_slug, token = %record.token_id, "submitting live order");

        match self.submitter.submit_order(&record.order_request()).await {
            Ok(order_id) => {
                info!(order_id = %order_id, market = %record.market_slug, "order accepted");
                record.status = TradeStatus::Success;
                record.order_id = Some(order_id);
            }
            Err(e) => {
                error!(market = %record.market_slug, error = %e, "trade failed");
                record.status = TradeStatus::Failed;
                record.error = Some(failure_message(e));
            }
        }
    }

    fn persist(&self, record: TradeRecord) -> Result<Option<TradeRecord>> {
        debug_assert!(record.status.is_terminal());

        match self.ledger.record(&record) {
            Ok(()) => {
                debug!(status = %record.status, path = %self.ledger.path().display(), "trade saved to ledger");
                Ok(Some(record))
            }
            Err(source) => {
                error!(
                    status = %record.status,
                    order_id = ?record.order_id,
                    path = %self.ledger.path().display(),
                    error = %source,
                    "failed to write trade to ledger"
                );
                Err(Error::LedgerWrite {
                    record: Box::new(record),
                    source,
                })
            }
        }
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    pub fn submitter(&self) -> &S {
        &self.submitter
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }
}

/// The text stored in a failed record: the submitter's own message, without
/// the error-kind prefix.
fn failure_message(e: Error) -> String {
    match e {
        Error::Execution(msg) => msg,
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use polytrader_core::{Credentials, OrderId, OrderRequest, Side};
    use rust_decimal_macros::dec;
    use tempfile::TempDir;

    use crate::ledger::LEDGER_HEADER;
    use crate::simulated::SimulatedSubmitter;

    /// Accepts everything and counts calls.
    #[derive(Default)]
    struct Accepting {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl OrderSubmitter for Accepting {
        async fn submit_order(&self, _order: &OrderRequest) -> Result<OrderId> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(OrderId(format!("ord-{n}")))
        }
    }

    /// Rejects everything with a fixed message.
    struct Rejecting(&'static str);

    #[async_trait]
    impl OrderSubmitter for Rejecting {
        async fn submit_order(&self, _order: &OrderRequest) -> Result<OrderId> {
            Err(Error::Execution(self.0.to_string()))
        }
    }

    fn config(dir: &Path, dry_run: bool) -> ExecutorConfig {
        ExecutorConfig {
            dry_run,
            credentials_present: !dry_run,
            target_spend: dec!(100),
            ledger_path: dir.join("logs/trades.csv"),
        }
    }

    fn intent(price: Decimal) -> TradeIntent {
        TradeIntent::new(
            Side::Buy,
            "71321045679252212594626385532706912750332728571942532289631379312455583992563",
            price,
            "btc-updown-15m-1760000000",
            "spot broke above strike, 3m left",
        )
    }

    #[test]
    fn sizing_rounds_quantity_up() {
        let s = size_order(dec!(100), dec!(37)).unwrap();
        assert_eq!(s.quantity, 3);
        assert_eq!(s.total_cost, dec!(111));

        let exact = size_order(dec!(100), dec!(0.25)).unwrap();
        assert_eq!(exact.quantity, 400);
        assert_eq!(exact.total_cost, dec!(100));

        // Price above the budget still buys one unit.
        let one = size_order(dec!(1), dec!(0.99)).unwrap();
        assert_eq!(one.quantity, 2);
        let expensive = size_order(dec!(0.5), dec!(0.99)).unwrap();
        assert_eq!(expensive.quantity, 1);
    }

    #[test]
    fn sizing_never_underspends() {
        let targets = [dec!(1), dec!(5), dec!(10), dec!(33.33), dec!(100), dec!(250)];
        let prices = [
            dec!(0.001),
            dec!(0.01),
            dec!(0.07),
            dec!(0.1),
            dec!(0.3333),
            dec!(0.37),
            dec!(0.5),
            dec!(0.6667),
            dec!(0.99),
            dec!(37),
        ];

        for target in targets {
            for price in prices {
                let s = size_order(target, price).unwrap();
                assert!(s.quantity >= 1);
                assert_eq!(s.total_cost, Decimal::from(s.quantity) * price);
                assert!(s.total_cost >= target, "{target} @ {price} underspent");
                // Minimal: one unit fewer would miss the target.
                assert!(Decimal::from(s.quantity - 1) * price < target);
            }
        }
    }

    #[test]
    fn sizing_rejects_non_positive_inputs() {
        assert!(size_order(dec!(100), dec!(0)).is_none());
        assert!(size_order(dec!(100), dec!(-1)).is_none());
        assert!(size_order(dec!(0), dec!(0.5)).is_none());
    }

    #[tokio::test]
    async fn dry_run_records_without_submitting() {
        let dir = TempDir::new().unwrap();
        let exec = TradeExecutor::new(config(dir.path(), true), Accepting::default());

        let record = exec.execute_trade(&intent(dec!(37))).await.unwrap().unwrap();

        assert_eq!(record.status, TradeStatus::DryRun);
        assert_eq!(record.quantity, 3);
        assert_eq!(record.total_cost, dec!(111));
        assert!(record.order_id.is_none());
        assert!(record.error.is_none());
        assert_eq!(exec.submitter().calls.load(Ordering::SeqCst), 0);

        let entries = exec.ledger().read_entries().unwrap();
        assert_eq!(entries.len(), 1);
        let row = &entries[0];
        assert_eq!(row.timestamp, record.timestamp_iso());
        assert_eq!(row.market_slug, record.market_slug);
        assert_eq!(row.side, Side::Buy);
        assert_eq!(row.token_id, record.token_id);
        assert_eq!(row.price, dec!(37));
        assert_eq!(row.quantity, 3);
        assert_eq!(row.total_cost, dec!(111));
        assert_eq!(row.status, TradeStatus::DryRun);
        assert_eq!(row.reason, record.reason);
        assert_eq!(row.error, None);
    }

    #[tokio::test]
    async fn live_success_sets_order_id() {
        let dir = TempDir::new().unwrap();
        let exec = TradeExecutor::new(config(dir.path(), false), Accepting::default());

        let record = exec.execute_trade(&intent(dec!(0.42))).await.unwrap().unwrap();

        assert_eq!(record.status, TradeStatus::Success);
        assert_eq!(record.order_id, Some(OrderId("ord-1".into())));
        assert!(record.error.is_none());

        let entries = exec.ledger().read_entries().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].status, TradeStatus::Success);
        assert_eq!(entries[0].error, None);
    }

    #[tokio::test]
    async fn live_failure_is_returned_as_data() {
        let dir = TempDir::new().unwrap();
        let exec = TradeExecutor::new(
            config(dir.path(), false),
            Rejecting("not enough balance, \"allowance\" too low"),
        );

        let record = exec.execute_trade(&intent(dec!(0.42))).await.unwrap().unwrap();

        assert_eq!(record.status, TradeStatus::Failed);
        assert_eq!(
            record.error.as_deref(),
            Some("not enough balance, \"allowance\" too low")
        );
        assert!(record.order_id.is_none());

        let entries = exec.ledger().read_entries().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].status, TradeStatus::Failed);
        assert_eq!(entries[0].error, record.error);
    }

    #[tokio::test]
    async fn invalid_intents_are_not_recorded() {
        let dir = TempDir::new().unwrap();
        let exec = TradeExecutor::new(config(dir.path(), true), Accepting::default());

        assert!(exec.execute_trade(&intent(dec!(0))).await.unwrap().is_none());
        assert!(exec.execute_trade(&intent(dec!(-0.3))).await.unwrap().is_none());

        let mut no_token = intent(dec!(0.5));
        no_token.token_id.clear();
        assert!(exec.execute_trade(&no_token).await.unwrap().is_none());

        assert!(!exec.ledger().path().exists());

        // An existing ledger is left unchanged too.
        exec.execute_trade(&intent(dec!(0.5))).await.unwrap().unwrap();
        let before = std::fs::read_to_string(exec.ledger().path()).unwrap();
        assert!(exec.execute_trade(&intent(dec!(0))).await.unwrap().is_none());
        let after = std::fs::read_to_string(exec.ledger().path()).unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn live_without_credentials_fails_at_submitter() {
        let dir = TempDir::new().unwrap();
        let mut cfg = config(dir.path(), false);
        cfg.credentials_present = false;
        let exec = TradeExecutor::new(cfg, SimulatedSubmitter::new(None).with_latency(Duration::ZERO));

        let record = exec.execute_trade(&intent(dec!(0.5))).await.unwrap().unwrap();
        assert_eq!(record.status, TradeStatus::Failed);
        assert!(record.error.unwrap().contains("missing exchange credentials"));
    }

    #[tokio::test]
    async fn live_with_simulated_submitter_succeeds() {
        let dir = TempDir::new().unwrap();
        let creds = Credentials {
            private_key: "0x01".into(),
            proxy_address: None,
        };
        let exec = TradeExecutor::new(
            config(dir.path(), false),
            SimulatedSubmitter::new(Some(creds)).with_latency(Duration::ZERO),
        );

        let record = exec.execute_trade(&intent(dec!(0.5))).await.unwrap().unwrap();
        assert_eq!(record.status, TradeStatus::Success);
        assert!(record.order_id.unwrap().0.starts_with("sim-"));

        let sent = exec.submitter().submitted().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].quantity, 200);
        assert_eq!(sent[0].total_cost, dec!(100));
    }

    #[tokio::test]
    async fn ledger_failure_carries_resolved_record() {
        let dir = TempDir::new().unwrap();
        let mut cfg = config(dir.path(), false);
        // A directory where the ledger file should be.
        cfg.ledger_path = dir.path().to_path_buf();
        let exec = TradeExecutor::new(cfg, Accepting::default());

        let err = exec.execute_trade(&intent(dec!(0.5))).await.unwrap_err();
        match err {
            Error::LedgerWrite { record, .. } => {
                assert_eq!(record.status, TradeStatus::Success);
                assert_eq!(record.order_id, Some(OrderId("ord-1".into())));
            }
            other => panic!("expected ledger write error, got {other:?}"),
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_calls_each_append_one_row() {
        let dir = TempDir::new().unwrap();
        let exec = Arc::new(TradeExecutor::new(
            config(dir.path(), false),
            Accepting::default(),
        ));

        let mut handles = Vec::new();
        for i in 1..=8 {
            let exec = Arc::clone(&exec);
            handles.push(tokio::spawn(async move {
                exec.execute_trade(&intent(Decimal::new(i, 1))).await
            }));
        }
        for handle in handles {
            let record = handle.await.unwrap().unwrap().unwrap();
            assert_eq!(record.status, TradeStatus::Success);
        }

        let entries = exec.ledger().read_entries().unwrap();
        assert_eq!(entries.len(), 8);
        let contents = std::fs::read_to_string(exec.ledger().path()).unwrap();
        assert_eq!(contents.lines().next(), Some(LEDGER_HEADER.join(",").as_str()));
        assert_eq!(contents.matches("timestamp,marketId").count(), 1);
    }
}
