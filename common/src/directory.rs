use async_trait::async_trait;

use crate::device::DirectoryEntry;

/// Opens authenticated connections to the directory of record.
#[async_trait]
pub trait DirectoryConnector: Send + Sync {
    async fn connect(&self) -> anyhow::Result<Box<dyn DirectorySession>>;
}

/// A bound directory connection.
///
/// The caller owns the session and must call [`DirectorySession::disconnect`]
/// on every exit path, including after a failed search.
#[async_trait]
pub trait DirectorySession: Send {
    /// Returns the name of every computer account below `search_base`.
    async fn computers(&mut self, search_base: &str) -> anyhow::Result<Vec<DirectoryEntry>>;

    async fn disconnect(&mut self) -> anyhow::Result<()>;
}
