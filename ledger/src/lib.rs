//! The token ledger (§4.A): ACID credit/debit with row-locking and
//! idempotency enforced at the database level.

mod error;
mod ledger;
mod schema;

pub use error::{LedgerError, LedgerResult};
pub use ledger::{Balance, HistoryFilter, HistoryPage, Ledger, LedgerOpResult, MAX_HISTORY_LIMIT};
pub use schema::init_schema;
