pub mod cli;
pub mod error;
pub mod models;
pub mod processors;
pub mod readers;
pub mod settings;
pub mod utils;
pub mod writers;

pub use error::{ProcessingError, Result};
pub use models::{Station, StationTable};
pub use processors::{MergeStrategy, ParallelProcessor, PipelineSummary};
pub use settings::Settings;
pub use writers::format_report;
