pub mod executor;
pub mod ledger;
pub mod orchestrator;
pub mod poller;
pub mod reconciliation;

pub use executor::{FloatAccount, SettlementExecutor};
pub use ledger::LedgerService;
pub use orchestrator::{CreateExchangeRequest, ExchangeService};
pub use poller::{PollerConfig, PollerRegistry};
pub use reconciliation::{Observation, ReconciliationEngine};
