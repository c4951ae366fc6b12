pub mod chunk;
pub mod station;

pub use chunk::{Chunk, WorkItem};
pub use station::{merge_into, Station, StationTable};
