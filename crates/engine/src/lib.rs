pub mod ledger;
pub mod simulated;
pub mod submitter;
pub mod trader;

pub use ledger::{append_row, Ledger, LedgerEntry, LEDGER_HEADER};
pub use simulated::SimulatedSubmitter;
pub use submitter::OrderSubmitter;
pub use trader::{size_order, Sizing, TradeExecutor};
