use crate::error::Result;
use crate::processors::MergeStrategy;
use crate::utils::constants::{
    DEFAULT_CHUNK_SIZE, DEFAULT_WORKER_MULTIPLIER, ENV_PREFIX, MERGE_CHANNEL,
    QUEUE_SLOTS_PER_WORKER,
};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use validator::Validate;

/// Pipeline tuning, read once at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Settings {
    /// Target chunk size in bytes.
    #[validate(range(min = 1))]
    pub chunk_size: usize,

    /// Workers per available CPU when `workers` is not set.
    #[validate(range(min = 1, max = 64))]
    pub worker_multiplier: usize,

    #[validate(range(min = 1))]
    pub workers: Option<usize>,

    /// Work queue capacity in chunks.
    #[validate(range(min = 1))]
    pub queue_capacity: Option<usize>,

    pub merge: MergeStrategy,
}

/// Values taken from the command line; they win over every other source.
#[derive(Debug, Clone, Default)]
pub struct SettingsOverrides {
    pub chunk_size: Option<usize>,
    pub worker_multiplier: Option<usize>,
    pub workers: Option<usize>,
    pub queue_capacity: Option<usize>,
    pub merge: Option<MergeStrategy>,
}

impl Settings {
    /// Layer defaults, an optional config file, `STATION_AGG_*` environment
    /// variables and CLI overrides, in that order, then validate.
    pub fn load(config_file: Option<&Path>, overrides: &SettingsOverrides) -> Result<Self> {
        let mut builder = Config::builder()
            .set_default("chunk_size", DEFAULT_CHUNK_SIZE as i64)?
            .set_default("worker_multiplier", DEFAULT_WORKER_MULTIPLIER as i64)?
            .set_default("merge", MERGE_CHANNEL)?;

        if let Some(path) = config_file {
            builder = builder.add_source(File::from(path).required(true));
        }

        let settings: Settings = builder
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .set_override_option("chunk_size", overrides.chunk_size.map(|v| v as i64))?
            .set_override_option(
                "worker_multiplier",
                overrides.worker_multiplier.map(|v| v as i64),
            )?
            .set_override_option("workers", overrides.workers.map(|v| v as i64))?
            .set_override_option("queue_capacity", overrides.queue_capacity.map(|v| v as i64))?
            .set_override_option("merge", overrides.merge.map(|m| m.to_string()))?
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    pub fn resolved_workers(&self) -> usize {
        self.workers
            .unwrap_or_else(|| num_cpus::get() * self.worker_multiplier)
            .max(1)
    }

    pub fn resolved_queue_capacity(&self) -> usize {
        self.queue_capacity
            .unwrap_or_else(|| self.resolved_workers() * QUEUE_SLOTS_PER_WORKER)
            .max(1)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            worker_multiplier: DEFAULT_WORKER_MULTIPLIER,
            workers: None,
            queue_capacity: None,
            merge: MergeStrategy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProcessingError;
    use std::io::Write;

    #[test]
    fn test_defaults_without_sources() {
        let settings = Settings::load(None, &SettingsOverrides::default()).unwrap();

        assert_eq!(settings.chunk_size, DEFAULT_CHUNK_SIZE);
        assert_eq!(settings.worker_multiplier, DEFAULT_WORKER_MULTIPLIER);
        assert_eq!(settings.merge, MergeStrategy::Channel);
        assert!(settings.resolved_workers() >= 1);
        assert_eq!(
            settings.resolved_queue_capacity(),
            settings.resolved_workers() * QUEUE_SLOTS_PER_WORKER
        );
    }

    #[test]
    fn test_config_file_then_overrides() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "chunk_size = 4096").unwrap();
        writeln!(file, "workers = 3").unwrap();
        writeln!(file, "merge = \"shared\"").unwrap();

        let overrides = SettingsOverrides {
            workers: Some(5),
            ..Default::default()
        };
        let settings = Settings::load(Some(file.path()), &overrides).unwrap();

        assert_eq!(settings.chunk_size, 4096);
        assert_eq!(settings.workers, Some(5));
        assert_eq!(settings.resolved_workers(), 5);
        assert_eq!(settings.merge, MergeStrategy::Shared);
    }

    #[test]
    fn test_zero_chunk_size_is_rejected() {
        let overrides = SettingsOverrides {
            chunk_size: Some(0),
            ..Default::default()
        };
        let result = Settings::load(None, &overrides);

        assert!(matches!(result, Err(ProcessingError::Validation(_))));
    }

    #[test]
    fn test_missing_config_file_is_rejected() {
        let result = Settings::load(
            Some(Path::new("no/such/settings.toml")),
            &SettingsOverrides::default(),
        );

        assert!(matches!(result, Err(ProcessingError::Settings(_))));
    }
}
