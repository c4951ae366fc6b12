use crate::error::{ProcessingError, Result};
use crate::models::{merge_into, Station, StationTable};
use crate::processors::AbortSignal;
use crate::utils::constants::{MERGE_CHANNEL, MERGE_SHARED};
use crossbeam::channel::{self, Receiver, Sender};
use crossbeam::select;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Mutex;

/// How worker-local results reach the global table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MergeStrategy {
    /// Workers stream their stations to a single collector over a channel.
    #[default]
    Channel,
    /// Workers fold into one mutex-guarded table, locking once each.
    Shared,
}

impl fmt::Display for MergeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MergeStrategy::Channel => f.write_str(MERGE_CHANNEL),
            MergeStrategy::Shared => f.write_str(MERGE_SHARED),
        }
    }
}

/// Destination for a worker's complete local table.
pub trait PartialSink: Sync {
    fn hand_off(&self, worker: usize, stations: StationTable) -> Result<()>;
}

impl<T: PartialSink + ?Sized> PartialSink for &T {
    fn hand_off(&self, worker: usize, stations: StationTable) -> Result<()> {
        (**self).hand_off(worker, stations)
    }
}

#[derive(Debug)]
pub enum MergeMessage {
    Station(Station),
    /// Completion marker; one per worker, sent after all of its stations.
    Done { worker: usize },
}

/// Message-passing merger: the single owner of the global table.
pub struct ResultCollector {
    workers: usize,
    sender: Sender<MergeMessage>,
    receiver: Receiver<MergeMessage>,
}

impl ResultCollector {
    pub fn new(workers: usize) -> Self {
        let (sender, receiver) = channel::unbounded();
        Self {
            workers,
            sender,
            receiver,
        }
    }

    /// A sink for one worker. Each worker should own its own.
    pub fn sink(&self) -> ChannelSink {
        ChannelSink {
            sender: self.sender.clone(),
        }
    }

    /// Drain the results channel until every worker has reported completion.
    pub fn collect(self, abort: &AbortSignal) -> Result<StationTable> {
        let Self {
            workers,
            sender,
            receiver,
        } = self;
        // Only worker sinks keep the channel open from here on.
        drop(sender);

        let mut table = StationTable::new();
        let mut completed = 0usize;
        let mut merged = 0u64;

        while completed < workers {
            let message = select! {
                recv(receiver) -> message => message.map_err(|_| {
                    ProcessingError::Internal(format!(
                        "results channel closed after {} of {} workers completed",
                        completed, workers
                    ))
                })?,
                recv(abort.listener()) -> _ => return Err(ProcessingError::Aborted),
            };

            match message {
                MergeMessage::Station(station) => {
                    merge_into(&mut table, std::iter::once(station));
                    merged += 1;
                }
                MergeMessage::Done { worker } => {
                    completed += 1;
                    tracing::debug!(worker, completed, "worker results merged");
                }
            }
        }

        tracing::debug!(stations = table.len(), partials = merged, "collector finished");
        Ok(table)
    }
}

pub struct ChannelSink {
    sender: Sender<MergeMessage>,
}

impl PartialSink for ChannelSink {
    fn hand_off(&self, worker: usize, stations: StationTable) -> Result<()> {
        // The collector only drops its receiver once it has given up on the run.
        let closed = |_| ProcessingError::Aborted;

        for station in stations.into_values() {
            self.sender.send(MergeMessage::Station(station)).map_err(closed)?;
        }
        self.sender.send(MergeMessage::Done { worker }).map_err(closed)
    }
}

/// Lock-based merger: one shared table, locked once per worker.
#[derive(Default)]
pub struct SharedMerger {
    table: Mutex<StationTable>,
}

impl SharedMerger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_table(self) -> Result<StationTable> {
        self.table
            .into_inner()
            .map_err(|_| ProcessingError::Internal("shared result table lock poisoned".to_string()))
    }
}

impl PartialSink for SharedMerger {
    fn hand_off(&self, worker: usize, stations: StationTable) -> Result<()> {
        let mut table = self
            .table
            .lock()
            .map_err(|_| ProcessingError::Internal("shared result table lock poisoned".to_string()))?;
        let count = stations.len();
        merge_into(&mut table, stations.into_values());
        tracing::debug!(worker, stations = count, "worker results merged");
        Ok(())
    }
}
