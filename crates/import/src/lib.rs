pub mod adapter;
pub mod csv;
pub mod flatfile;
pub mod http;
pub mod pipeline;
pub(crate) mod util;
pub mod xml;

pub use adapter::{SourceAdapter, SourceError};
pub use csv::CsvFileSource;
pub use flatfile::FlatFileSource;
pub use http::JsonHttpSource;
pub use pipeline::{IngestReport, IngestionPipeline, SourceReport};
pub use xml::XmlFileSource;
