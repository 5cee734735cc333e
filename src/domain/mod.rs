pub mod ledger;
pub mod transaction;

pub use ledger::{EntryType, LedgerEntry};
pub use transaction::{
    Direction, ExchangeStatus, ProviderStatus, Transaction, TransactionStatus,
};
