pub mod aggregate;
pub mod config;
pub mod dataset;
pub mod distinct;
pub mod error;
pub mod export;
pub mod fetch;
pub mod filter;
pub mod legacy;
pub mod logging;
pub mod process;
pub mod record;
pub mod schema;
pub mod stats;

pub use aggregate::{CategoryField, CountMatrix, ProcessedData, View};
pub use dataset::{load_dataset, Dataset};
pub use error::{FetchError, ParseError, PipelineError};
pub use record::DeviceRecord;
