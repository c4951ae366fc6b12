/// Processing defaults
pub const DEFAULT_CHUNK_SIZE: usize = 2 * 1024 * 1024; // 2MB
pub const DEFAULT_WORKER_MULTIPLIER: usize = 2;
pub const DEFAULT_BUFFER_SIZE: usize = 8192 * 16; // 128KB

/// Work queue slots per worker when no explicit capacity is configured
pub const QUEUE_SLOTS_PER_WORKER: usize = 2;

/// Record format
pub const FIELD_DELIMITER: char = ';';
pub const ENTRY_SEPARATOR: &str = ",";

/// Environment variable prefix for settings overrides (e.g. STATION_AGG_CHUNK_SIZE)
pub const ENV_PREFIX: &str = "STATION_AGG";

/// Merge strategy names
pub const MERGE_CHANNEL: &str = "channel";
pub const MERGE_SHARED: &str = "shared";
