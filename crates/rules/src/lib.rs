pub mod category;
pub mod engine;
pub mod store;

pub use category::{Category, FALLBACK_CATEGORY};
pub use engine::{match_category, Categorizer};
pub use store::{CategoryStore, LoadReport, RuleError};
