use crate::error::{ProcessingError, Result};
use crate::models::{Chunk, Station, StationTable, WorkItem};
use crate::processors::{AbortSignal, PartialSink};
use crate::utils::constants::FIELD_DELIMITER;
use crossbeam::channel::Receiver;
use crossbeam::select;

/// Per-worker totals, logged at hand-off.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub chunks: u64,
    pub rows: u64,
    pub stations: usize,
}

/// Split a record at the first delimiter and parse its value.
pub fn parse_line(line: &str, line_number: u64) -> Result<(&str, f64)> {
    let (name, raw_value) = line.split_once(FIELD_DELIMITER).ok_or_else(|| {
        ProcessingError::parse(
            line_number,
            format!("missing '{}' delimiter in '{}'", FIELD_DELIMITER, line),
        )
    })?;

    let value = raw_value.trim().parse::<f64>().map_err(|_| {
        ProcessingError::parse(line_number, format!("invalid value '{}'", raw_value))
    })?;

    // min <= max only holds for ordered values.
    if !value.is_finite() {
        return Err(ProcessingError::parse(
            line_number,
            format!("non-finite value '{}'", raw_value),
        ));
    }

    Ok((name, value))
}

/// Consumes chunks until its stop marker, aggregating into one local table.
///
/// The local table persists across every chunk the worker receives and is
/// handed off once, after the stop marker.
pub struct Worker<'a> {
    id: usize,
    queue: &'a Receiver<WorkItem>,
    abort: &'a AbortSignal,
    stations: StationTable,
    stats: WorkerStats,
}

impl<'a> Worker<'a> {
    pub fn new(id: usize, queue: &'a Receiver<WorkItem>, abort: &'a AbortSignal) -> Self {
        Self {
            id,
            queue,
            abort,
            stations: StationTable::new(),
            stats: WorkerStats::default(),
        }
    }

    pub fn run(mut self, sink: &impl PartialSink) -> Result<WorkerStats> {
        loop {
            let item = select! {
                recv(self.queue) -> item => item.map_err(|_| {
                    ProcessingError::Internal(format!(
                        "work queue closed before worker {} received its stop marker",
                        self.id
                    ))
                })?,
                recv(self.abort.listener()) -> _ => return Err(ProcessingError::Aborted),
            };

            match item {
                WorkItem::Chunk(chunk) => self.process_chunk(&chunk)?,
                WorkItem::Stop => break,
            }
        }

        self.stats.stations = self.stations.len();
        tracing::debug!(
            worker = self.id,
            chunks = self.stats.chunks,
            rows = self.stats.rows,
            stations = self.stats.stations,
            "worker handing off results"
        );

        let stats = self.stats;
        sink.hand_off(self.id, self.stations)?;
        Ok(stats)
    }

    fn process_chunk(&mut self, chunk: &Chunk) -> Result<()> {
        for (line_number, line) in chunk.numbered_lines() {
            let (name, value) = parse_line(line, line_number)?;
            self.observe(name, value);
        }
        self.stats.chunks += 1;
        self.stats.rows += chunk.len() as u64;
        Ok(())
    }

    fn observe(&mut self, name: &str, value: f64) {
        // Look up by &str first so known stations don't allocate.
        match self.stations.get_mut(name) {
            Some(station) => station.observe(value),
            None => {
                self.stations
                    .insert(name.to_string(), Station::new(name.to_string(), value));
            }
        }
    }
}
