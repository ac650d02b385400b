//! # Pipeline Orchestrator
//!
//! `initialize store → connect → search → pool → enrich → disconnect`.
//!
//! The directory session is disconnected on every path once it is open, and
//! the record writer is always drained before [`Pipeline::run`] returns.

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use sweepr_common::browser::BrowserLauncher;
use sweepr_common::config::Config;
use sweepr_common::device::DirectoryEntry;
use sweepr_common::directory::{DirectoryConnector, DirectorySession};
use sweepr_common::network::NetworkProbe;
use sweepr_common::progress::{ProgressReporter, Silent};
use sweepr_common::remote::{Credentials, RemoteShell};

use crate::enrichment::{EnrichmentOutcome, Enricher, LookupSettings};
use crate::pool::{PoolBuilder, PoolOutcome};
use crate::resolver::Resolver;
use crate::store::RecordStore;
use crate::store::writer::{self, RecordHandle};

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub search_base: String,
    pub credentials: Credentials,
    pub serial_command: String,
    pub probe_workers: usize,
    pub identity_workers: usize,
    pub lookup: LookupSettings,
}

impl PipelineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            search_base: config.search_base.clone(),
            credentials: Credentials::new(&config.wmi_user, &config.wmi_password),
            serial_command: config.remote.command.clone(),
            probe_workers: config.workers.probe_workers(),
            identity_workers: config.workers.identity,
            lookup: LookupSettings {
                web_url: config.web_url.clone(),
                input_locator: config.input_xpath.clone(),
                result_locator: config.warranty_xpath.clone(),
                page_timeout: config.browser.page_load_timeout(),
                element_timeout: config.browser.element_timeout(),
                headless: config.browser.headless,
                workers: config.workers.lookup,
            },
        }
    }
}

/// Counts for one run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Computer accounts returned by the directory.
    pub entries: usize,
    /// Entries that already had a warranty record.
    pub skipped: usize,
    /// Devices that resolved and answered the probe.
    pub pool: usize,
    pub identified: usize,
    pub recorded: usize,
    /// Devices dropped at any stage in this run.
    pub failures: usize,
}

pub struct Pipeline {
    settings: PipelineSettings,
    directory: Arc<dyn DirectoryConnector>,
    probe: Arc<dyn NetworkProbe>,
    shell: Arc<dyn RemoteShell>,
    browser: Arc<dyn BrowserLauncher>,
    progress: Arc<dyn ProgressReporter>,
}

impl Pipeline {
    pub fn new(
        settings: PipelineSettings,
        directory: Arc<dyn DirectoryConnector>,
        probe: Arc<dyn NetworkProbe>,
        shell: Arc<dyn RemoteShell>,
        browser: Arc<dyn BrowserLauncher>,
    ) -> Self {
        Self {
            settings,
            directory,
            probe,
            shell,
            browser,
            progress: Arc::new(Silent),
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    pub async fn run(&self, mut store: Box<dyn RecordStore>) -> anyhow::Result<RunSummary> {
        store
            .initialize()
            .context("Failed to initialize record store")?;

        let (records, writer) = writer::spawn(store);
        let swept: anyhow::Result<RunSummary> = self.sweep(records).await;
        let drained = writer.finish().await;

        let summary: RunSummary = swept?;
        drained.context("Record writer did not shut down cleanly")?;
        Ok(summary)
    }

    async fn sweep(&self, records: RecordHandle) -> anyhow::Result<RunSummary> {
        let mut session: Box<dyn DirectorySession> = self
            .directory
            .connect()
            .await
            .context("Failed to connect to the directory")?;

        let processed = self.process(session.as_mut(), records).await;

        if let Err(e) = session.disconnect().await {
            warn!(error = %e, "Failed to disconnect from the directory");
        }
        processed
    }

    async fn process(
        &self,
        session: &mut dyn DirectorySession,
        records: RecordHandle,
    ) -> anyhow::Result<RunSummary> {
        let entries: Vec<DirectoryEntry> = session
            .computers(&self.settings.search_base)
            .await
            .context("Directory search failed")?;
        info!(count = entries.len(), "Found computer accounts");
        let entry_count: usize = entries.len();

        let resolver = Resolver::new(
            self.probe.clone(),
            self.shell.clone(),
            self.settings.credentials.clone(),
            &self.settings.serial_command,
        );

        let PoolOutcome {
            devices,
            skipped,
            dropped,
        } = PoolBuilder::new(
            resolver.clone(),
            records.clone(),
            self.progress.clone(),
            self.settings.probe_workers,
        )
        .build(entries)
        .await
        .context("Record store failed while building the device pool")?;

        let pool_size: usize = devices.len();
        info!(live = pool_size, skipped, dropped, "Device pool ready");

        let enricher = Enricher::new(
            resolver,
            self.browser.clone(),
            records,
            self.progress.clone(),
            self.settings.identity_workers,
            self.settings.lookup.clone(),
        );
        let enriched: EnrichmentOutcome = enricher.enrich(devices).await?;

        Ok(RunSummary {
            entries: entry_count,
            skipped,
            pool: pool_size,
            identified: enriched.identified,
            recorded: enriched.recorded,
            failures: dropped + enriched.failed,
        })
    }
}
