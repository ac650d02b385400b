//! Single-writer access to a [`RecordStore`].
//!
//! The store is moved onto one blocking thread that applies requests in the
//! order they arrive. Workers hold a cloneable [`RecordHandle`]; each call
//! resolves only after the store has finished the durable write, so rows are
//! never interleaved and a worker never races ahead of its own records.

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::debug;

use sweepr_common::device::{DeviceErrorKind, ErrorEvent, WarrantyRecord};

use super::{RecordStore, Result, StoreError};

const QUEUE_DEPTH: usize = 256;

enum Request {
    HasWarranty {
        device_name: String,
        reply: oneshot::Sender<Result<bool>>,
    },
    RecordError {
        event: ErrorEvent,
        reply: oneshot::Sender<Result<bool>>,
    },
    RecordWarranty {
        record: WarrantyRecord,
        reply: oneshot::Sender<Result<()>>,
    },
}

#[derive(Clone)]
pub struct RecordHandle {
    tx: mpsc::Sender<Request>,
}

pub struct RecordWriter {
    task: JoinHandle<()>,
}

/// Moves `store` onto its writer thread.
pub fn spawn(store: Box<dyn RecordStore>) -> (RecordHandle, RecordWriter) {
    let (tx, rx) = mpsc::channel::<Request>(QUEUE_DEPTH);
    let task: JoinHandle<()> = tokio::task::spawn_blocking(move || serve(store, rx));
    (RecordHandle { tx }, RecordWriter { task })
}

fn serve(mut store: Box<dyn RecordStore>, mut rx: mpsc::Receiver<Request>) {
    while let Some(request) = rx.blocking_recv() {
        match request {
            Request::HasWarranty { device_name, reply } => {
                let _ = reply.send(store.has_warranty_record(&device_name));
            }
            Request::RecordError { event, reply } => {
                let _ = reply.send(store.record_error(&event));
            }
            Request::RecordWarranty { record, reply } => {
                let _ = reply.send(store.record_warranty(&record));
            }
        }
    }
}

impl RecordHandle {
    pub async fn has_warranty_record(&self, device_name: &str) -> Result<bool> {
        self.request(|reply| Request::HasWarranty {
            device_name: device_name.to_string(),
            reply,
        })
        .await
    }

    pub async fn record_error(&self, event: ErrorEvent) -> Result<bool> {
        self.request(|reply| Request::RecordError { event, reply })
            .await
    }

    pub async fn record_warranty(&self, record: WarrantyRecord) -> Result<()> {
        self.request(|reply| Request::RecordWarranty { record, reply })
            .await
    }

    /// Converts a per-device outcome into "keep going" or "dropped".
    ///
    /// A failure is recorded against `device_name` and yields `Ok(None)`.
    /// Only store failures come back as `Err`.
    pub async fn settle<T>(
        &self,
        device_name: &str,
        outcome: std::result::Result<T, DeviceErrorKind>,
    ) -> Result<Option<T>> {
        match outcome {
            Ok(value) => Ok(Some(value)),
            Err(kind) => {
                let written: bool = self.record_error(ErrorEvent::new(device_name, kind)).await?;
                debug!(device = device_name, error = %kind, new = written, "Device dropped");
                Ok(None)
            }
        }
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<Result<T>>) -> Request,
    ) -> Result<T> {
        let (reply, response) = oneshot::channel::<Result<T>>();
        self.tx
            .send(build(reply))
            .await
            .map_err(|_| StoreError::WriterClosed)?;
        response.await.map_err(|_| StoreError::WriterClosed)?
    }
}

impl RecordWriter {
    /// Waits for the writer thread to drain and exit.
    ///
    /// Resolves only once every [`RecordHandle`] has been dropped.
    pub async fn finish(self) -> Result<()> {
        self.task.await.map_err(|_| StoreError::WriterClosed)
    }
}
