pub mod period;
pub mod transaction;

pub use period::DateRange;
pub use transaction::{CategorizedTransaction, RawTransaction, TransactionId};
