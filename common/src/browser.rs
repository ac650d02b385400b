//! Browser automation contract used for vendor portal lookups.
//!
//! A session is heavyweight (one browser process each) and is never shared
//! between concurrent lookups.

use std::time::Duration;

use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum BrowserError {
    /// The awaited element or page did not show up within the bound.
    #[error("timed out after {timeout:?} waiting for {what}")]
    Timeout { what: String, timeout: Duration },
    /// Anything else the driver reported.
    #[error(transparent)]
    Driver(#[from] anyhow::Error),
}

impl BrowserError {
    pub fn timeout(what: impl Into<String>, timeout: Duration) -> Self {
        BrowserError::Timeout {
            what: what.into(),
            timeout,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, BrowserError::Timeout { .. })
    }
}

#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn open(&self, headless: bool) -> anyhow::Result<Box<dyn BrowserSession>>;
}

#[async_trait]
pub trait BrowserSession: Send {
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), BrowserError>;

    /// Waits for the field at `locator`, replaces its content with `text` and submits it.
    async fn fill_and_submit(
        &mut self,
        locator: &str,
        text: &str,
        timeout: Duration,
    ) -> Result<(), BrowserError>;

    async fn wait_for_text(&mut self, locator: &str, timeout: Duration)
    -> Result<String, BrowserError>;

    /// Ends the session and releases the browser process.
    async fn close(self: Box<Self>) -> anyhow::Result<()>;
}
