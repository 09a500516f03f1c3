pub mod service;

pub use service::{AggregationService, QueryError};
