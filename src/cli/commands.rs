use crate::cli::args::{Cli, Commands, RunArgs};
use crate::error::Result;
use crate::processors::{ParallelProcessor, PipelineSummary};
use crate::settings::Settings;
use crate::utils::logging::init_logging;
use crate::utils::progress::ProgressReporter;
use crate::writers::ReportWriter;
use std::io::Write;

pub async fn run(cli: Cli) -> Result<()> {
    init_logging(cli.verbose, cli.log_file.as_deref())?;

    let command = cli.command;
    // The pipeline blocks on channels and I/O; keep it off the async workers.
    tokio::task::spawn_blocking(move || {
        let mut stdout = std::io::stdout().lock();
        execute(command, &mut stdout)
    })
    .await?
}

/// Run one command, writing its result line to `out`.
pub fn execute<W: Write>(command: Commands, out: &mut W) -> Result<()> {
    match command {
        Commands::Process(args) => {
            let summary = aggregate(&args)?;
            ReportWriter::new(out).write_report(&summary.stations)?;
        }

        Commands::Validate(args) => {
            let summary = aggregate(&args)?;
            writeln!(
                out,
                "{} rows, {} stations, {} chunks",
                summary.rows,
                summary.stations.len(),
                summary.chunks
            )?;
        }
    }

    Ok(())
}

fn aggregate(args: &RunArgs) -> Result<PipelineSummary> {
    let settings = Settings::load(args.config.as_deref(), &args.overrides())?;
    tracing::debug!(?settings, "settings loaded");

    let processor = ParallelProcessor::from_settings(&settings);

    let progress = if args.progress {
        let total_bytes = std::fs::metadata(&args.input)?.len();
        ProgressReporter::new_bytes(total_bytes, "Aggregating measurements...", false)
    } else {
        ProgressReporter::silent()
    };

    match processor.process_file(&args.input, (!progress.is_silent()).then_some(&progress)) {
        Ok(summary) => {
            progress.finish_with_message(&format!(
                "Aggregated {} rows into {} stations",
                summary.rows,
                summary.stations.len()
            ));
            Ok(summary)
        }
        Err(e) => {
            progress.abandon();
            Err(e)
        }
    }
}
