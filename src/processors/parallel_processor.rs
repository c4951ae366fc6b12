use crate::error::{ProcessingError, Result};
use crate::models::{StationTable, WorkItem};
use crate::processors::{
    AbortSignal, MergeStrategy, PartialSink, Producer, ProducerStats, ResultCollector,
    SharedMerger, Worker, WorkerStats,
};
use crate::readers::ChunkReader;
use crate::settings::Settings;
use crate::utils::constants::{DEFAULT_CHUNK_SIZE, DEFAULT_WORKER_MULTIPLIER, QUEUE_SLOTS_PER_WORKER};
use crate::utils::progress::ProgressReporter;
use crossbeam::channel::{self, Receiver};
use crossbeam::thread::{Scope, ScopedJoinHandle};
use std::io::BufRead;
use std::path::Path;
use std::time::Instant;

/// Merged result of one run plus totals.
#[derive(Debug, Clone)]
pub struct PipelineSummary {
    pub stations: StationTable,
    pub rows: u64,
    pub chunks: u64,
    pub bytes: u64,
}

pub struct ParallelProcessor {
    max_workers: usize,
    chunk_size: usize,
    queue_capacity: Option<usize>,
    merge_strategy: MergeStrategy,
}

impl ParallelProcessor {
    pub fn new(max_workers: usize) -> Self {
        Self {
            max_workers: max_workers.max(1),
            chunk_size: DEFAULT_CHUNK_SIZE,
            queue_capacity: None,
            merge_strategy: MergeStrategy::default(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.resolved_workers())
            .with_chunk_size(settings.chunk_size)
            .with_queue_capacity(settings.resolved_queue_capacity())
            .with_merge_strategy(settings.merge)
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn with_queue_capacity(mut self, queue_capacity: usize) -> Self {
        self.queue_capacity = Some(queue_capacity.max(1));
        self
    }

    pub fn with_merge_strategy(mut self, merge_strategy: MergeStrategy) -> Self {
        self.merge_strategy = merge_strategy;
        self
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    fn queue_capacity(&self) -> usize {
        self.queue_capacity
            .unwrap_or(self.max_workers * QUEUE_SLOTS_PER_WORKER)
    }

    /// Aggregate every record of the file at `path`.
    ///
    /// The file is opened before any thread is started, so a missing or
    /// unreadable input fails without spawning workers.
    pub fn process_file(
        &self,
        path: &Path,
        progress: Option<&ProgressReporter>,
    ) -> Result<PipelineSummary> {
        let reader = ChunkReader::open(path, self.chunk_size)?;
        tracing::info!(
            input = %path.display(),
            workers = self.max_workers,
            chunk_size = self.chunk_size,
            queue_capacity = self.queue_capacity(),
            merge = %self.merge_strategy,
            "starting aggregation"
        );
        self.process_reader(reader, progress)
    }

    /// Run the producer, workers and merger over an already opened reader.
    pub fn process_reader<R: BufRead + Send>(
        &self,
        reader: ChunkReader<R>,
        progress: Option<&ProgressReporter>,
    ) -> Result<PipelineSummary> {
        let started = Instant::now();
        let workers = self.max_workers;
        let (queue_tx, queue_rx) = channel::bounded::<WorkItem>(self.queue_capacity());
        let abort = AbortSignal::new();
        let shared = SharedMerger::new();
        let collector = match self.merge_strategy {
            MergeStrategy::Channel => Some(ResultCollector::new(workers)),
            MergeStrategy::Shared => None,
        };

        let (queue_tx, queue_rx, abort_ref, shared_ref) = (&queue_tx, &queue_rx, &abort, &shared);

        let outcome = crossbeam::scope(move |s| -> Result<RunOutcome> {
            let producer = s
                .builder()
                .name("producer".to_string())
                .spawn(move |_| {
                    let _guard = abort_ref.guard();
                    let result = Producer::new(queue_tx, abort_ref)
                        .with_progress(progress)
                        .run(reader, workers);
                    if result.is_err() {
                        abort_ref.trigger();
                    }
                    result
                })
                .map_err(|e| {
                    abort_ref.trigger();
                    ProcessingError::from(e)
                })?;

            let mut handles = Vec::with_capacity(workers);
            for id in 0..workers {
                let spawned = match &collector {
                    Some(collector) => spawn_worker(s, id, queue_rx, abort_ref, collector.sink()),
                    None => spawn_worker(s, id, queue_rx, abort_ref, shared_ref),
                };
                match spawned {
                    Ok(handle) => handles.push(handle),
                    Err(e) => {
                        abort_ref.trigger();
                        return Err(e);
                    }
                }
            }

            let collected = collector.map(|collector| {
                let result = collector.collect(abort_ref);
                if result.is_err() {
                    abort_ref.trigger();
                }
                result
            });

            Ok(RunOutcome {
                producer: join(producer, "producer"),
                workers: handles
                    .into_iter()
                    .map(|handle| join(handle, "worker"))
                    .collect(),
                collected,
            })
        })
        .map_err(|_| ProcessingError::Internal("pipeline thread panicked".to_string()))??;

        let RunOutcome {
            producer,
            workers: worker_results,
            collected,
        } = outcome;

        let mut failures = Vec::new();
        let producer_stats = producer.unwrap_or_else(|e| {
            failures.push(e);
            ProducerStats::default()
        });
        let mut rows = 0u64;
        for result in worker_results {
            match result {
                Ok(stats) => rows += stats.rows,
                Err(e) => failures.push(e),
            }
        }
        let stations = match collected {
            Some(Ok(table)) => Some(table),
            Some(Err(e)) => {
                failures.push(e);
                None
            }
            None => None,
        };

        if let Some(error) = root_cause(failures) {
            tracing::warn!(error = %error, "aggregation failed");
            return Err(error);
        }

        let stations = match stations {
            Some(table) => table,
            None => shared.into_table()?,
        };

        tracing::info!(
            rows,
            chunks = producer_stats.chunks,
            bytes = producer_stats.bytes,
            stations = stations.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "aggregation complete"
        );

        Ok(PipelineSummary {
            stations,
            rows,
            chunks: producer_stats.chunks,
            bytes: producer_stats.bytes,
        })
    }
}

impl Default for ParallelProcessor {
    fn default() -> Self {
        Self::new(num_cpus::get() * DEFAULT_WORKER_MULTIPLIER)
    }
}

struct RunOutcome {
    producer: Result<ProducerStats>,
    workers: Vec<Result<WorkerStats>>,
    collected: Option<Result<StationTable>>,
}

fn spawn_worker<'scope, 'env, S>(
    scope: &'scope Scope<'env>,
    id: usize,
    queue: &'env Receiver<WorkItem>,
    abort: &'env AbortSignal,
    sink: S,
) -> Result<ScopedJoinHandle<'scope, Result<WorkerStats>>>
where
    S: PartialSink + Send + 'env,
{
    let handle = scope
        .builder()
        .name(format!("worker-{}", id))
        .spawn(move |_| {
            let _guard = abort.guard();
            let result = Worker::new(id, queue, abort).run(&sink);
            if result.is_err() {
                abort.trigger();
            }
            result
        })?;
    Ok(handle)
}

fn join<T>(handle: ScopedJoinHandle<'_, Result<T>>, role: &str) -> Result<T> {
    handle
        .join()
        .unwrap_or_else(|_| Err(ProcessingError::Internal(format!("{} thread panicked", role))))
}

/// The first failure that is not a secondary abort, if any.
fn root_cause(failures: Vec<ProcessingError>) -> Option<ProcessingError> {
    let mut aborted = None;
    for failure in failures {
        if failure.is_aborted() {
            aborted.get_or_insert(failure);
        } else {
            return Some(failure);
        }
    }
    aborted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writers::format_report;
    use pretty_assertions::assert_eq;
    use std::io::{BufReader, Cursor, Read, Write};
    use tempfile::NamedTempFile;

    fn sample_input() -> String {
        let names = ["Abha", "Zürich", "Bosaso", "Cracow", "Dakar", "Accra", "Ürümqi"];
        (0..2_000)
            .map(|i| {
                let name = names[(i * 7 + i / 3) % names.len()];
                // Quarter steps: exact sums regardless of merge order.
                let quarters = ((i * 37) % 480) as i64 - 160;
                format!("{};{}\n", name, quarters as f64 / 4.0)
            })
            .collect()
    }

    /// Serves `lines_left` valid records, then fails on the next read.
    struct FailingSource {
        lines_left: usize,
        panic: bool,
    }

    impl Read for FailingSource {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.lines_left == 0 {
                if self.panic {
                    panic!("device detached");
                }
                return Err(std::io::Error::new(std::io::ErrorKind::Other, "disk gone"));
            }
            self.lines_left -= 1;
            let line = b"Oslo;1.5\n";
            buf[..line.len()].copy_from_slice(line);
            Ok(line.len())
        }
    }

    fn run_on_failing(panic: bool) -> Result<PipelineSummary> {
        let source = FailingSource {
            lines_left: 500,
            panic,
        };
        let reader = ChunkReader::from_reader(BufReader::new(source), 64);
        ParallelProcessor::new(4).process_reader(reader, None)
    }

    fn run_on(input: &str, processor: &ParallelProcessor) -> Result<PipelineSummary> {
        let reader = ChunkReader::from_reader(
            Cursor::new(input.as_bytes().to_vec()),
            processor.chunk_size,
        );
        processor.process_reader(reader, None)
    }

    fn sequential(input: &str) -> StationTable {
        let mut table = StationTable::new();
        for line in input.lines() {
            let (name, value) = crate::processors::parse_line(line, 0).unwrap();
            match table.get_mut(name) {
                Some(station) => station.observe(value),
                None => {
                    table.insert(
                        name.to_string(),
                        crate::models::Station::new(name.to_string(), value),
                    );
                }
            }
        }
        table
    }

    #[test]
    fn test_two_station_example() {
        let processor = ParallelProcessor::new(2).with_chunk_size(8);
        let summary = run_on("A;10.0\nB;20.0\nA;30.0\n", &processor).unwrap();

        assert_eq!(
            format_report(&summary.stations),
            "{A;10.0;20.0;30.0,B;20.0;20.0;20.0}"
        );
        assert_eq!(summary.rows, 3);
    }

    #[test]
    fn test_result_independent_of_chunking_workers_and_strategy() {
        let input = sample_input();
        let expected = format_report(&sequential(&input));

        for chunk_size in [1, 64, 1024, 1 << 20] {
            for workers in [1, 3, 8] {
                for strategy in [MergeStrategy::Channel, MergeStrategy::Shared] {
                    let processor = ParallelProcessor::new(workers)
                        .with_chunk_size(chunk_size)
                        .with_queue_capacity(2)
                        .with_merge_strategy(strategy);
                    let summary = run_on(&input, &processor).unwrap();

                    assert_eq!(
                        format_report(&summary.stations),
                        expected,
                        "chunk_size={} workers={} strategy={}",
                        chunk_size,
                        workers,
                        strategy
                    );
                    assert_eq!(summary.rows, 2_000);
                }
            }
        }
    }

    #[test]
    fn test_counts_and_bounds_match_sequential_pass() {
        let input = sample_input();
        let expected = sequential(&input);
        let summary = run_on(&input, &ParallelProcessor::new(4).with_chunk_size(100)).unwrap();

        assert_eq!(summary.stations.len(), expected.len());
        for (name, station) in &summary.stations {
            let reference = &expected[name];
            assert_eq!(station.count, reference.count);
            assert_eq!(station.min, reference.min);
            assert_eq!(station.max, reference.max);
            assert!((station.sum - reference.sum).abs() < 1e-6);
            assert!(station.min <= station.mean() + 1e-9);
            assert!(station.mean() <= station.max + 1e-9);
        }
    }

    #[test]
    fn test_empty_input_produces_empty_table() {
        for strategy in [MergeStrategy::Channel, MergeStrategy::Shared] {
            let processor = ParallelProcessor::new(3).with_merge_strategy(strategy);
            let summary = run_on("", &processor).unwrap();

            assert!(summary.stations.is_empty());
            assert_eq!(summary.rows, 0);
            assert_eq!(summary.chunks, 0);
        }
    }

    #[test]
    fn test_malformed_line_aborts_run() {
        let mut input = sample_input();
        input.push_str("A;notanumber\n");
        input.push_str(&sample_input());

        for strategy in [MergeStrategy::Channel, MergeStrategy::Shared] {
            let processor = ParallelProcessor::new(4)
                .with_chunk_size(256)
                .with_queue_capacity(1)
                .with_merge_strategy(strategy);
            let err = run_on(&input, &processor).unwrap_err();

            assert!(
                matches!(err, ProcessingError::Parse { line: 2001, .. }),
                "unexpected error: {}",
                err
            );
        }
    }

    #[test]
    fn test_read_error_aborts_run() {
        let mut bytes = b"A;1.0\nB;2.0\n".to_vec();
        bytes.extend_from_slice(&[0xc3, 0x28, b';', b'1', b'\n']);
        let reader = ChunkReader::from_reader(Cursor::new(bytes), 6);

        let err = ParallelProcessor::new(2)
            .process_reader(reader, None)
            .unwrap_err();
        assert!(matches!(err, ProcessingError::InvalidFormat(_)));
    }

    #[test]
    fn test_io_error_mid_file_is_fatal() {
        let err = run_on_failing(false).unwrap_err();
        assert!(matches!(err, ProcessingError::Io(_)), "unexpected error: {}", err);
    }

    #[test]
    fn test_reader_panic_becomes_internal_error() {
        let err = run_on_failing(true).unwrap_err();
        assert!(
            matches!(err, ProcessingError::Internal(_)),
            "unexpected error: {}",
            err
        );
    }

    #[test]
    fn test_process_file_reads_from_disk() -> Result<()> {
        let mut temp_file = NamedTempFile::new()?;
        write!(temp_file, "Oslo;-3.0\nOslo;5.0\nLima;18.5\n")?;

        let summary = ParallelProcessor::new(2)
            .with_chunk_size(10)
            .process_file(temp_file.path(), None)?;

        assert_eq!(
            format_report(&summary.stations),
            "{Lima;18.5;18.5;18.5,Oslo;-3.0;1.0;5.0}"
        );
        assert_eq!(summary.bytes, 29);

        Ok(())
    }

    #[test]
    fn test_missing_file_fails_before_processing() {
        let result =
            ParallelProcessor::new(2).process_file(Path::new("missing/measurements.txt"), None);
        assert!(matches!(result, Err(ProcessingError::Io(_))));
    }

    #[test]
    fn test_root_cause_prefers_specific_errors() {
        let cause = root_cause(vec![
            ProcessingError::Aborted,
            ProcessingError::parse(9, "bad"),
            ProcessingError::Aborted,
        ]);
        assert!(matches!(cause, Some(ProcessingError::Parse { line: 9, .. })));

        assert!(matches!(
            root_cause(vec![ProcessingError::Aborted]),
            Some(ProcessingError::Aborted)
        ));
        assert!(root_cause(Vec::new()).is_none());
    }
}
