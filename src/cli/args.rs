use crate::processors::MergeStrategy;
use crate::settings::SettingsOverrides;
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "station-aggregator")]
#[command(about = "Parallel min/mean/max aggregation of station measurement files")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true, help = "Enable verbose logging")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Log file path")]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Aggregate a measurements file and print the sorted summary line
    Process(RunArgs),

    /// Parse and aggregate the whole file, printing only row and station counts
    Validate(RunArgs),
}

impl Commands {
    pub fn input(&self) -> &Path {
        match self {
            Commands::Process(args) | Commands::Validate(args) => &args.input,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[arg(help = "Input file with one `name;value` record per line")]
    pub input: PathBuf,

    #[arg(short, long, help = "Settings file (TOML, YAML or JSON)")]
    pub config: Option<PathBuf>,

    #[arg(long, help = "Target chunk size in bytes")]
    pub chunk_size: Option<usize>,

    #[arg(short, long, help = "Worker thread count [default: CPUs x multiplier]")]
    pub workers: Option<usize>,

    #[arg(long, help = "Workers per available CPU")]
    pub worker_multiplier: Option<usize>,

    #[arg(long, help = "Work queue capacity in chunks")]
    pub queue_capacity: Option<usize>,

    #[arg(long, value_enum, help = "How worker results are merged")]
    pub merge: Option<MergeStrategy>,

    #[arg(long, default_value = "false", help = "Show a progress bar on stderr")]
    pub progress: bool,
}

impl RunArgs {
    pub fn overrides(&self) -> SettingsOverrides {
        SettingsOverrides {
            chunk_size: self.chunk_size,
            worker_multiplier: self.worker_multiplier,
            workers: self.workers,
            queue_capacity: self.queue_capacity,
            merge: self.merge,
        }
    }
}
