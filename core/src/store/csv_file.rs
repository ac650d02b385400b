//! CSV-backed [`RecordStore`].
//!
//! Two append-only files: one row per enriched device, one row per unique
//! `(device_name, error_type)` pair. Every append is flushed and synced before
//! returning, so the files stay valid if the process dies mid-run.

use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use sweepr_common::device::{ErrorEvent, WarrantyRecord};

use super::{RecordStore, Result, StoreError};

pub const WARRANTY_HEADERS: [&str; 4] = ["device_name", "ip_address", "serial_number", "warranty_info"];
pub const ERROR_HEADERS: [&str; 2] = ["device_name", "error_type"];

/// A row of the errors file as stored, without interpreting the error label.
///
/// Files written by older tooling carry free-form labels such as `DNS Error`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
pub struct ErrorRow {
    pub device_name: String,
    pub error_type: String,
}

#[derive(Default)]
struct DedupState {
    resolved: HashSet<String>,
    failures: HashSet<(String, String)>,
}

pub struct CsvRecordStore {
    warranty_path: PathBuf,
    errors_path: PathBuf,
    state: Option<DedupState>,
}

impl CsvRecordStore {
    pub fn new(warranty_path: impl Into<PathBuf>, errors_path: impl Into<PathBuf>) -> Self {
        Self {
            warranty_path: warranty_path.into(),
            errors_path: errors_path.into(),
            state: None,
        }
    }

    pub fn warranty_path(&self) -> &Path {
        &self.warranty_path
    }

    pub fn errors_path(&self) -> &Path {
        &self.errors_path
    }

    /// Reads every well-formed warranty row currently on disk.
    pub fn load_warranty_records(&self) -> Result<Vec<WarrantyRecord>> {
        read_rows(&self.warranty_path)
    }

    /// Reads every well-formed error row currently on disk.
    pub fn load_error_rows(&self) -> Result<Vec<ErrorRow>> {
        read_rows(&self.errors_path)
    }

    fn state(&self) -> Result<&DedupState> {
        self.state.as_ref().ok_or(StoreError::NotInitialized)
    }

    fn state_mut(&mut self) -> Result<&mut DedupState> {
        self.state.as_mut().ok_or(StoreError::NotInitialized)
    }
}

impl RecordStore for CsvRecordStore {
    fn initialize(&mut self) -> Result<()> {
        ensure_file(&self.warranty_path, &WARRANTY_HEADERS)?;
        ensure_file(&self.errors_path, &ERROR_HEADERS)?;

        let resolved: HashSet<String> = self
            .load_warranty_records()?
            .into_iter()
            .map(|record| record.device_name)
            .collect();

        let failures: HashSet<(String, String)> = self
            .load_error_rows()?
            .into_iter()
            .map(|row| (row.device_name, row.error_type))
            .collect();

        debug!(
            resolved = resolved.len(),
            failures = failures.len(),
            "Loaded record store state"
        );

        self.state = Some(DedupState { resolved, failures });
        Ok(())
    }

    fn has_warranty_record(&self, device_name: &str) -> Result<bool> {
        Ok(self.state()?.resolved.contains(device_name))
    }

    fn record_error(&mut self, event: &ErrorEvent) -> Result<bool> {
        let key: (String, String) = (event.device_name.clone(), event.error_type.to_string());
        if self.state()?.failures.contains(&key) {
            return Ok(false);
        }

        append_row(&self.errors_path, event)?;
        self.state_mut()?.failures.insert(key);
        Ok(true)
    }

    fn record_warranty(&mut self, record: &WarrantyRecord) -> Result<()> {
        self.state()?;
        append_row(&self.warranty_path, record)?;
        self.state_mut()?.resolved.insert(record.device_name.clone());
        Ok(())
    }
}

fn ensure_file(path: &Path, headers: &[&str]) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }

    let file: File = OpenOptions::new().create(true).append(true).open(path)?;
    if file.metadata()?.len() == 0 {
        let mut writer = csv::Writer::from_writer(&file);
        writer.write_record(headers)?;
        writer.flush()?;
        drop(writer);
        file.sync_all()?;
    }
    Ok(())
}

fn append_row<S: Serialize>(path: &Path, row: &S) -> Result<()> {
    let file: File = OpenOptions::new().append(true).open(path)?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(&file);
    writer.serialize(row)?;
    writer.flush()?;
    drop(writer);
    file.sync_data()?;
    Ok(())
}

fn read_rows<T>(path: &Path) -> Result<Vec<T>>
where
    T: for<'de> Deserialize<'de>,
{
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)?;

    let mut rows: Vec<T> = Vec::new();
    for (idx, row) in reader.deserialize::<T>().enumerate() {
        match row {
            Ok(row) => rows.push(row),
            Err(e) => warn!(
                file = %path.display(),
                row = idx + 1,
                error = %e,
                "Skipping malformed row"
            ),
        }
    }
    Ok(rows)
}
