//! # Warranty Enrichment Engine
//!
//! Two stages over the live pool:
//!
//! * **identity**: read each device's serial number over remote execution,
//!   bounded by the identity worker count.
//! * **lookup**: submit each serial to the vendor portal. Every lookup
//!   worker owns one browser session for its whole lifetime and pulls devices
//!   from a shared queue, so a session never serves two lookups at once.
//!
//! Sessions are opened only if at least one device was identified, and every
//! opened session is closed exactly once, whatever happens to its worker.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use futures::future::join_all;
use futures::stream::{self, StreamExt};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use sweepr_common::browser::{BrowserError, BrowserLauncher, BrowserSession};
use sweepr_common::device::{Device, DeviceErrorKind, IdentifiedDevice};
use sweepr_common::progress::{Phase, ProgressReporter};

use crate::resolver::Resolver;
use crate::store::StoreError;
use crate::store::writer::RecordHandle;

#[derive(Debug, Clone)]
pub struct LookupSettings {
    pub web_url: String,
    pub input_locator: String,
    pub result_locator: String,
    pub page_timeout: Duration,
    pub element_timeout: Duration,
    pub headless: bool,
    /// Concurrent browser sessions.
    pub workers: usize,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EnrichmentOutcome {
    pub identified: usize,
    pub recorded: usize,
    /// Identity and lookup failures together.
    pub failed: usize,
}

#[derive(Default)]
struct LookupTally {
    recorded: usize,
    failed: usize,
}

pub struct Enricher {
    resolver: Resolver,
    launcher: Arc<dyn BrowserLauncher>,
    records: RecordHandle,
    progress: Arc<dyn ProgressReporter>,
    identity_workers: usize,
    lookup: LookupSettings,
}

impl Enricher {
    pub fn new(
        resolver: Resolver,
        launcher: Arc<dyn BrowserLauncher>,
        records: RecordHandle,
        progress: Arc<dyn ProgressReporter>,
        identity_workers: usize,
        lookup: LookupSettings,
    ) -> Self {
        Self {
            resolver,
            launcher,
            records,
            progress,
            identity_workers: identity_workers.max(1),
            lookup,
        }
    }

    pub async fn enrich(&self, pool: Vec<Device>) -> anyhow::Result<EnrichmentOutcome> {
        let pool_size: usize = pool.len();
        let identified: Vec<IdentifiedDevice> = self
            .identify_all(pool)
            .await
            .context("Record store failed during serial number retrieval")?;

        let mut outcome = EnrichmentOutcome {
            identified: identified.len(),
            recorded: 0,
            failed: pool_size - identified.len(),
        };

        if identified.is_empty() {
            info!("No device was identified, skipping warranty lookups");
            return Ok(outcome);
        }

        let tally: LookupTally = self.look_up_all(identified).await?;
        outcome.recorded = tally.recorded;
        outcome.failed += tally.failed;
        Ok(outcome)
    }

    async fn identify_all(&self, pool: Vec<Device>) -> Result<Vec<IdentifiedDevice>, StoreError> {
        self.progress.start(Phase::SerialNumbers, pool.len());

        let results: Vec<Result<Option<IdentifiedDevice>, StoreError>> = stream::iter(pool)
            .map(|device| async move {
                let name: String = device.name.clone();
                let identified = self.resolver.identify(device).await;
                let settled = self.records.settle(&name, identified).await;
                self.progress.advance(Phase::SerialNumbers);
                settled
            })
            .buffer_unordered(self.identity_workers)
            .collect()
            .await;

        self.progress.finish(Phase::SerialNumbers);

        let mut identified: Vec<IdentifiedDevice> = Vec::new();
        for result in results {
            identified.extend(result?);
        }
        Ok(identified)
    }

    async fn look_up_all(&self, devices: Vec<IdentifiedDevice>) -> anyhow::Result<LookupTally> {
        let workers: usize = self.lookup.workers.clamp(1, devices.len());
        let sessions: Vec<Box<dyn BrowserSession>> = self.open_sessions(workers).await?;
        debug!(sessions = sessions.len(), "Browser sessions ready");

        self.progress.start(Phase::Warranty, devices.len());
        let queue: Mutex<VecDeque<IdentifiedDevice>> = Mutex::new(devices.into());

        let finished: Vec<Result<LookupTally, StoreError>> = join_all(
            sessions
                .into_iter()
                .map(|session| self.lookup_worker(session, &queue)),
        )
        .await;

        self.progress.finish(Phase::Warranty);

        let mut tally = LookupTally::default();
        for worker in finished {
            let worker: LookupTally =
                worker.context("Record store failed during warranty lookups")?;
            tally.recorded += worker.recorded;
            tally.failed += worker.failed;
        }
        Ok(tally)
    }

    /// Opens `count` sessions, or none: if any launch fails the ones that
    /// did start are closed again before the error is returned.
    async fn open_sessions(&self, count: usize) -> anyhow::Result<Vec<Box<dyn BrowserSession>>> {
        let attempts = (0..count).map(|_| self.launcher.open(self.lookup.headless));
        let launched: Vec<anyhow::Result<Box<dyn BrowserSession>>> = join_all(attempts).await;

        let mut sessions: Vec<Box<dyn BrowserSession>> = Vec::with_capacity(count);
        let mut failure: Option<anyhow::Error> = None;
        for attempt in launched {
            match attempt {
                Ok(session) => sessions.push(session),
                Err(e) => {
                    failure.get_or_insert(e);
                }
            }
        }

        let Some(e) = failure else {
            return Ok(sessions);
        };

        for session in sessions {
            if let Err(close_err) = session.close().await {
                warn!(error = %close_err, "Failed to close browser session");
            }
        }
        Err(e.context("Failed to launch browser session"))
    }

    async fn lookup_worker(
        &self,
        mut session: Box<dyn BrowserSession>,
        queue: &Mutex<VecDeque<IdentifiedDevice>>,
    ) -> Result<LookupTally, StoreError> {
        let mut tally = LookupTally::default();
        let drained = self.drain(session.as_mut(), queue, &mut tally).await;

        if let Err(e) = session.close().await {
            warn!(error = %e, "Failed to close browser session");
        }
        drained.map(|()| tally)
    }

    async fn drain(
        &self,
        session: &mut dyn BrowserSession,
        queue: &Mutex<VecDeque<IdentifiedDevice>>,
        tally: &mut LookupTally,
    ) -> Result<(), StoreError> {
        loop {
            let next: Option<IdentifiedDevice> = queue.lock().await.pop_front();
            let Some(device) = next else {
                return Ok(());
            };

            let name: String = device.name().to_string();
            let looked_up = self.look_up(session, device.serial_number.as_str()).await;

            match self.records.settle(&name, looked_up).await? {
                Some(warranty_info) => {
                    self.records
                        .record_warranty(device.into_record(warranty_info))
                        .await?;
                    debug!(device = %name, "Warranty recorded");
                    tally.recorded += 1;
                }
                None => tally.failed += 1,
            }
            self.progress.advance(Phase::Warranty);
        }
    }

    async fn look_up(
        &self,
        session: &mut dyn BrowserSession,
        serial: &str,
    ) -> Result<String, DeviceErrorKind> {
        let lookup: &LookupSettings = &self.lookup;
        let result: Result<String, BrowserError> = async {
            session.navigate(&lookup.web_url, lookup.page_timeout).await?;
            session
                .fill_and_submit(&lookup.input_locator, serial, lookup.element_timeout)
                .await?;
            session
                .wait_for_text(&lookup.result_locator, lookup.element_timeout)
                .await
        }
        .await;

        match result {
            Ok(text) => Ok(text.trim().to_string()),
            Err(e) if e.is_timeout() => {
                debug!(serial, error = %e, "Warranty lookup timed out");
                Err(DeviceErrorKind::WarrantyLookupTimeout)
            }
            Err(e) => {
                debug!(serial, error = %e, "Warranty lookup failed");
                Err(DeviceErrorKind::WarrantyLookupFailed)
            }
        }
    }
}
