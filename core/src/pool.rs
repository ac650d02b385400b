use std::collections::HashSet;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::debug;

use sweepr_common::device::{Device, DirectoryEntry};
use sweepr_common::progress::{Phase, ProgressReporter};

use crate::resolver::Resolver;
use crate::store::StoreError;
use crate::store::writer::RecordHandle;

/// The live subset of the directory plus what happened to the rest.
#[derive(Debug, Default)]
pub struct PoolOutcome {
    pub devices: Vec<Device>,
    /// Already holds a warranty record, never probed.
    pub skipped: usize,
    /// Failed resolution or the liveness probe; an error was recorded.
    pub dropped: usize,
}

enum Admission {
    Skipped,
    Dropped,
    Admitted(Device),
}

pub struct PoolBuilder {
    resolver: Resolver,
    records: RecordHandle,
    progress: Arc<dyn ProgressReporter>,
    workers: usize,
}

impl PoolBuilder {
    pub fn new(
        resolver: Resolver,
        records: RecordHandle,
        progress: Arc<dyn ProgressReporter>,
        workers: usize,
    ) -> Self {
        Self {
            resolver,
            records,
            progress,
            workers: workers.max(1),
        }
    }

    /// Probes every entry with at most `workers` probes in flight.
    ///
    /// Per-device failures are recorded and counted. A store failure aborts
    /// the build, but only after every in-flight probe has finished.
    pub async fn build(&self, entries: Vec<DirectoryEntry>) -> Result<PoolOutcome, StoreError> {
        let names: Vec<String> = unique_names(entries);
        self.progress.start(Phase::DevicePool, names.len());

        let results: Vec<Result<Admission, StoreError>> = stream::iter(names)
            .map(|name| self.admit(name))
            .buffer_unordered(self.workers)
            .collect()
            .await;

        self.progress.finish(Phase::DevicePool);

        let mut outcome = PoolOutcome::default();
        for result in results {
            match result? {
                Admission::Skipped => outcome.skipped += 1,
                Admission::Dropped => outcome.dropped += 1,
                Admission::Admitted(device) => outcome.devices.push(device),
            }
        }
        Ok(outcome)
    }

    async fn admit(&self, name: String) -> Result<Admission, StoreError> {
        let admission = self.classify(&name).await;
        self.progress.advance(Phase::DevicePool);
        admission
    }

    async fn classify(&self, name: &str) -> Result<Admission, StoreError> {
        if self.records.has_warranty_record(name).await? {
            debug!(device = name, "Already resolved, skipping");
            return Ok(Admission::Skipped);
        }

        let located = self.resolver.locate(name).await;
        Ok(match self.records.settle(name, located).await? {
            Some(device) => Admission::Admitted(device),
            None => Admission::Dropped,
        })
    }
}

/// Keeps the first occurrence of each name. Two entries with the same name
/// would otherwise race each other to a second warranty row.
fn unique_names(entries: Vec<DirectoryEntry>) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    entries
        .into_iter()
        .map(|entry| entry.name)
        .filter(|name| seen.insert(name.clone()))
        .collect()
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
