pub mod abort;
pub mod merger;
pub mod parallel_processor;
pub mod producer;
pub mod worker;

pub use abort::{AbortGuard, AbortSignal};
pub use merger::{ChannelSink, MergeMessage, MergeStrategy, PartialSink, ResultCollector, SharedMerger};
pub use parallel_processor::{ParallelProcessor, PipelineSummary};
pub use producer::{Producer, ProducerStats};
pub use worker::{parse_line, Worker, WorkerStats};
