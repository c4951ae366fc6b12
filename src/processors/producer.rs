use crate::error::{ProcessingError, Result};
use crate::models::WorkItem;
use crate::processors::AbortSignal;
use crate::readers::ChunkReader;
use crate::utils::progress::ProgressReporter;
use crossbeam::channel::Sender;
use crossbeam::select;
use std::io::BufRead;

/// Totals reported by the producer once the input is exhausted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProducerStats {
    pub chunks: u64,
    pub lines: u64,
    pub bytes: u64,
}

/// Drives a [`ChunkReader`] and feeds the bounded work queue.
pub struct Producer<'a> {
    queue: &'a Sender<WorkItem>,
    abort: &'a AbortSignal,
    progress: Option<&'a ProgressReporter>,
}

impl<'a> Producer<'a> {
    pub fn new(queue: &'a Sender<WorkItem>, abort: &'a AbortSignal) -> Self {
        Self {
            queue,
            abort,
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: Option<&'a ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    /// Enqueue every chunk in file order, then one stop marker per worker.
    ///
    /// Blocks while the queue is full. Returns `Aborted` if the run is
    /// cancelled while waiting.
    pub fn run<R: BufRead>(&self, reader: ChunkReader<R>, workers: usize) -> Result<ProducerStats> {
        let mut reader = reader;
        let mut stats = ProducerStats::default();
        let mut reported_bytes = 0u64;

        while let Some(chunk) = reader.next() {
            let chunk = chunk?;
            stats.chunks += 1;
            stats.lines += chunk.len() as u64;

            self.send(WorkItem::Chunk(chunk))?;

            if let Some(progress) = self.progress {
                let bytes = reader.bytes_read();
                progress.increment(bytes - reported_bytes);
                reported_bytes = bytes;
            }
        }
        stats.bytes = reader.bytes_read();

        tracing::debug!(
            chunks = stats.chunks,
            lines = stats.lines,
            bytes = stats.bytes,
            "input exhausted, sending stop markers"
        );

        for _ in 0..workers {
            self.send(WorkItem::Stop)?;
        }

        Ok(stats)
    }

    fn send(&self, item: WorkItem) -> Result<()> {
        select! {
            send(self.queue, item) -> sent => sent.map_err(|_| {
                ProcessingError::Internal("work queue closed before input was exhausted".to_string())
            }),
            recv(self.abort.listener()) -> _ => Err(ProcessingError::Aborted),
        }
    }
}
