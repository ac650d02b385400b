//! # Persistent Record Store
//!
//! [`RecordStore`] is the dedup/query contract the pipeline relies on. It is
//! independent of file format: [`csv_file::CsvRecordStore`] is what runs in
//! production, [`memory::MemoryRecordStore`] backs tests.
//!
//! Stores are not expected to be safe for concurrent use. The pipeline moves
//! the store onto a single writer thread ([`writer`]) and every worker talks
//! to it through a cloneable [`writer::RecordHandle`].

use sweepr_common::device::{ErrorEvent, WarrantyRecord};

pub mod csv_file;
pub mod memory;
pub mod writer;

/// Errors produced by [`RecordStore`] operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("csv error: {0}")]
    Csv(#[from] ::csv::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// A query or write was issued before [`RecordStore::initialize`].
    #[error("record store used before initialization")]
    NotInitialized,

    #[error("record store lock poisoned")]
    LockPoisoned,

    /// The writer thread is gone, so the request was never applied.
    #[error("record writer has shut down")]
    WriterClosed,
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Storage contract for sweep results.
///
/// Every mutating call is durable when it returns.
pub trait RecordStore: Send {
    /// Creates missing backing stores with their headers and loads the dedup
    /// state from whatever already exists. Never truncates.
    fn initialize(&mut self) -> Result<()>;

    fn has_warranty_record(&self, device_name: &str) -> Result<bool>;

    /// Appends `event` unless the same `(device_name, error_type)` pair is
    /// already stored. Returns whether a row was written.
    fn record_error(&mut self, event: &ErrorEvent) -> Result<bool>;

    /// Appends unconditionally.
    fn record_warranty(&mut self, record: &WarrantyRecord) -> Result<()>;
}
