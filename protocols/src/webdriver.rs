//! Browser sessions over W3C WebDriver.
//!
//! Every session owns a dedicated driver process on its own local port. The
//! process lives exactly as long as the session: it is killed on
//! [`BrowserSession::close`], and on drop if close is never reached.

use std::future::Future;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::Duration;

use anyhow::{Context, anyhow, bail};
use async_trait::async_trait;
use fantoccini::elements::Element;
use fantoccini::error::CmdError;
use fantoccini::{Client, ClientBuilder, Locator};
use serde_json::{Map, Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio::process::{Child, Command};
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

use sweepr_common::browser::{BrowserError, BrowserLauncher, BrowserSession};
use sweepr_common::config::{BrowserKind, Config};

/// WebDriver code point for the Enter key.
const ENTER_KEY: &str = "\u{E007}";
const POLL_INTERVAL: Duration = Duration::from_millis(100);
/// Occupied ports skipped before giving up on a launch.
const PORT_ATTEMPTS: usize = 16;

pub struct WebDriverLauncher {
    driver: PathBuf,
    kind: BrowserKind,
    next_port: AtomicU16,
    startup_timeout: Duration,
}

impl WebDriverLauncher {
    pub fn new(
        driver: impl Into<PathBuf>,
        kind: BrowserKind,
        first_port: u16,
        startup_timeout: Duration,
    ) -> Self {
        Self {
            driver: driver.into(),
            kind,
            next_port: AtomicU16::new(first_port),
            startup_timeout,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            &config.driver_location,
            config.browser.kind,
            config.browser.port,
            config.browser.startup_timeout(),
        )
    }

    /// Next port nothing else is listening on. A driver left behind by an
    /// earlier run must never be mistaken for the one about to start.
    async fn reserve_port(&self) -> anyhow::Result<u16> {
        for _ in 0..PORT_ATTEMPTS {
            let port: u16 = self.next_port.fetch_add(1, Ordering::Relaxed);
            if port == 0 {
                continue;
            }
            match TcpListener::bind((Ipv4Addr::LOCALHOST, port)).await {
                Ok(_) => return Ok(port),
                Err(e) => debug!(port, error = %e, "Driver port busy, trying the next one"),
            }
        }
        bail!("No free driver port after {PORT_ATTEMPTS} attempts")
    }

    fn spawn_driver(&self, port: u16) -> anyhow::Result<Child> {
        Command::new(&self.driver)
            .arg(format!("--port={port}"))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to start {}", self.driver.display()))
    }
}

#[async_trait]
impl BrowserLauncher for WebDriverLauncher {
    async fn open(&self, headless: bool) -> anyhow::Result<Box<dyn BrowserSession>> {
        let port: u16 = self.reserve_port().await?;
        let mut driver: Child = self.spawn_driver(port)?;

        timeout(self.startup_timeout, wait_for_driver(&mut driver, port))
            .await
            .map_err(|_| {
                anyhow!("Driver on port {port} did not start within {:?}", self.startup_timeout)
            })??;

        let url: String = format!("http://127.0.0.1:{port}");
        let mut builder = ClientBuilder::native();
        builder.capabilities(capabilities(self.kind, headless));

        let client: Client = timeout(self.startup_timeout, builder.connect(&url))
            .await
            .map_err(|_| anyhow!("WebDriver session on port {port} did not open in time"))?
            .map_err(|e| anyhow!("Failed to open WebDriver session: {e}"))?;

        debug!(port, headless, "Browser session opened");
        Ok(Box::new(WebDriverSession {
            client,
            driver,
            close_timeout: self.startup_timeout,
        }))
    }
}

async fn wait_for_driver(driver: &mut Child, port: u16) -> anyhow::Result<()> {
    let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
    loop {
        if let Some(status) = driver.try_wait()? {
            bail!("Driver exited during start-up with {status}");
        }
        if TcpStream::connect(addr).await.is_ok() {
            if let Some(status) = driver.try_wait()? {
                bail!("Driver exited during start-up with {status}");
            }
            return Ok(());
        }
        sleep(POLL_INTERVAL).await;
    }
}

/// Session capabilities for `kind`.
pub fn capabilities(kind: BrowserKind, headless: bool) -> Map<String, Value> {
    let mut caps: Map<String, Value> = Map::new();
    match kind {
        BrowserKind::Firefox => {
            caps.insert("browserName".into(), json!("firefox"));
            let args: Vec<&str> = if headless { vec!["-headless"] } else { Vec::new() };
            caps.insert("moz:firefoxOptions".into(), json!({ "args": args }));
        }
        BrowserKind::Chrome => {
            caps.insert("browserName".into(), json!("chrome"));
            let args: Vec<&str> = if headless {
                vec!["--headless=new", "--disable-gpu"]
            } else {
                Vec::new()
            };
            caps.insert("goog:chromeOptions".into(), json!({ "args": args }));
        }
    }
    caps
}

pub struct WebDriverSession {
    client: Client,
    driver: Child,
    close_timeout: Duration,
}

/// Runs one driver round trip under `limit`. A request the driver never
/// answers counts as a timeout on `what`.
async fn bounded<T>(
    what: &str,
    limit: Duration,
    command: impl Future<Output = Result<T, BrowserError>>,
) -> Result<T, BrowserError> {
    timeout(limit, command)
        .await
        .map_err(|_| BrowserError::timeout(what, limit))?
}

async fn find(client: &Client, locator: &str, limit: Duration) -> Result<Element, BrowserError> {
    client
        .wait()
        .at_most(limit)
        .for_element(Locator::XPath(locator))
        .await
        .map_err(|e| match e {
            CmdError::WaitTimeout => BrowserError::timeout(locator, limit),
            other => driver_error(other),
        })
}

#[async_trait]
impl BrowserSession for WebDriverSession {
    async fn navigate(&mut self, url: &str, limit: Duration) -> Result<(), BrowserError> {
        timeout(limit, self.client.goto(url))
            .await
            .map_err(|_| BrowserError::timeout(url, limit))?
            .map_err(driver_error)
    }

    async fn fill_and_submit(
        &mut self,
        locator: &str,
        text: &str,
        limit: Duration,
    ) -> Result<(), BrowserError> {
        let client: &Client = &self.client;
        bounded(locator, limit, async {
            let field: Element = find(client, locator, limit).await?;
            field.clear().await.map_err(driver_error)?;
            field.send_keys(text).await.map_err(driver_error)?;
            field.send_keys(ENTER_KEY).await.map_err(driver_error)
        })
        .await
    }

    async fn wait_for_text(&mut self, locator: &str, limit: Duration) -> Result<String, BrowserError> {
        let client: &Client = &self.client;
        bounded(locator, limit, async {
            find(client, locator, limit)
                .await?
                .text()
                .await
                .map_err(driver_error)
        })
        .await
    }

    async fn close(self: Box<Self>) -> anyhow::Result<()> {
        let WebDriverSession {
            client,
            mut driver,
            close_timeout,
        } = *self;

        let closed: anyhow::Result<()> = match timeout(close_timeout, client.close()).await {
            Ok(res) => res.map_err(|e| anyhow!("Failed to end WebDriver session: {e}")),
            Err(_) => Err(anyhow!("WebDriver session did not end within {close_timeout:?}")),
        };

        if let Err(e) = driver.kill().await {
            warn!(error = %e, "Failed to stop driver process");
        }
        closed
    }
}

fn driver_error(e: CmdError) -> BrowserError {
    BrowserError::Driver(anyhow!("{e}"))
}
