use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;

use sweepr_common::browser::{BrowserError, BrowserLauncher, BrowserSession};
use sweepr_common::device::DirectoryEntry;
use sweepr_common::directory::{DirectoryConnector, DirectorySession};
use sweepr_common::network::NetworkProbe;
use sweepr_common::remote::{CommandOutput, Credentials, RemoteSession, RemoteShell};
use sweepr_core::enrichment::LookupSettings;
use sweepr_core::pipeline::{Pipeline, PipelineSettings};

pub fn ip(last_octet: u8) -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(10, 0, 0, last_octet))
}

// ── directory ────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct DirectoryState {
    names: Vec<String>,
    fail_search: bool,
    pub connects: AtomicUsize,
    pub disconnects: AtomicUsize,
}

struct FakeDirectory(Arc<DirectoryState>);

struct FakeDirectorySession {
    directory: Arc<DirectoryState>,
}

#[async_trait]
impl DirectoryConnector for FakeDirectory {
    async fn connect(&self) -> anyhow::Result<Box<dyn DirectorySession>> {
        self.0.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeDirectorySession {
            directory: self.0.clone(),
        }))
    }
}

#[async_trait]
impl DirectorySession for FakeDirectorySession {
    async fn computers(&mut self, _search_base: &str) -> anyhow::Result<Vec<DirectoryEntry>> {
        if self.directory.fail_search {
            return Err(anyhow!("operations error"));
        }
        Ok(self.directory.names.iter().map(DirectoryEntry::new).collect())
    }

    async fn disconnect(&mut self) -> anyhow::Result<()> {
        self.directory.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ── network ──────────────────────────────────────────────────────────────

/// Names missing from `hosts` do not resolve.
#[derive(Default)]
pub struct FakeProbe {
    hosts: HashMap<String, (IpAddr, bool)>,
    pub resolved: Mutex<Vec<String>>,
}

impl FakeProbe {
    pub fn resolved_names(&self) -> Vec<String> {
        self.resolved.lock().unwrap().clone()
    }
}

#[async_trait]
impl NetworkProbe for FakeProbe {
    async fn resolve(&self, name: &str) -> anyhow::Result<IpAddr> {
        self.resolved.lock().unwrap().push(name.to_string());
        self.hosts
            .get(name)
            .map(|(ip, _)| *ip)
            .ok_or_else(|| anyhow!("{name}: NXDOMAIN"))
    }

    async fn is_reachable(&self, addr: IpAddr) -> bool {
        self.hosts
            .values()
            .any(|(ip, online)| *ip == addr && *online)
    }
}

// ── remote execution ─────────────────────────────────────────────────────

#[derive(Clone)]
pub enum ShellReply {
    /// Status 0 with a console-formatted serial table.
    Serial(&'static str),
    Status(i32),
    Bytes(Vec<u8>),
    Unreachable,
}

#[derive(Default)]
pub struct FakeShell {
    replies: HashMap<String, ShellReply>,
    pub sessions: Mutex<Vec<String>>,
}

struct FakeShellSession(Option<CommandOutput>);

#[async_trait]
impl RemoteShell for FakeShell {
    async fn open_session(
        &self,
        host: &str,
        _credentials: &Credentials,
    ) -> anyhow::Result<Box<dyn RemoteSession>> {
        self.sessions.lock().unwrap().push(host.to_string());
        let output: CommandOutput = match self.replies.get(host) {
            Some(ShellReply::Serial(serial)) => CommandOutput {
                status_code: 0,
                stdout: format!("\r\nSerialNumber\r\n------------\r\n{serial}\r\n\r\n").into_bytes(),
            },
            Some(ShellReply::Status(code)) => CommandOutput {
                status_code: *code,
                stdout: Vec::new(),
            },
            Some(ShellReply::Bytes(bytes)) => CommandOutput {
                status_code: 0,
                stdout: bytes.clone(),
            },
            Some(ShellReply::Unreachable) | None => {
                return Err(anyhow!("WinRM cannot complete the operation on {host}"));
            }
        };
        Ok(Box::new(FakeShellSession(Some(output))))
    }
}

#[async_trait]
impl RemoteSession for FakeShellSession {
    async fn run(&mut self, _command: &str) -> anyhow::Result<CommandOutput> {
        self.0.take().ok_or_else(|| anyhow!("command already ran"))
    }
}

// ── browser ──────────────────────────────────────────────────────────────

#[derive(Clone)]
pub enum PortalReply {
    Text(&'static str),
    Timeout,
    Broken,
}

#[derive(Default)]
pub struct BrowserState {
    portal: HashMap<String, PortalReply>,
    fail_launch: bool,
    pub opened: AtomicUsize,
    pub closed: AtomicUsize,
}

impl BrowserState {
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

struct FakeBrowser(Arc<BrowserState>);

struct FakeBrowserSession {
    browser: Arc<BrowserState>,
    submitted: Option<String>,
}

#[async_trait]
impl BrowserLauncher for FakeBrowser {
    async fn open(&self, _headless: bool) -> anyhow::Result<Box<dyn BrowserSession>> {
        if self.0.fail_launch {
            return Err(anyhow!("geckodriver: not found"));
        }
        self.0.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeBrowserSession {
            browser: self.0.clone(),
            submitted: None,
        }))
    }
}

#[async_trait]
impl BrowserSession for FakeBrowserSession {
    async fn navigate(&mut self, _url: &str, _timeout: Duration) -> Result<(), BrowserError> {
        self.submitted = None;
        Ok(())
    }

    async fn fill_and_submit(
        &mut self,
        _locator: &str,
        text: &str,
        _timeout: Duration,
    ) -> Result<(), BrowserError> {
        self.submitted = Some(text.to_string());
        Ok(())
    }

    async fn wait_for_text(
        &mut self,
        locator: &str,
        timeout: Duration,
    ) -> Result<String, BrowserError> {
        let serial: &str = self
            .submitted
            .as_deref()
            .ok_or_else(|| BrowserError::Driver(anyhow!("no serial submitted")))?;

        match self.browser.portal.get(serial) {
            Some(PortalReply::Text(text)) => Ok(text.to_string()),
            Some(PortalReply::Broken) => Err(BrowserError::Driver(anyhow!("stale element"))),
            Some(PortalReply::Timeout) | None => Err(BrowserError::timeout(locator, timeout)),
        }
    }

    async fn close(self: Box<Self>) -> anyhow::Result<()> {
        self.browser.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ── assembly ─────────────────────────────────────────────────────────────

/// Every collaborator of one scenario, kept around for inspection after the run.
#[derive(Default)]
pub struct World {
    directory: DirectoryState,
    probe: FakeProbe,
    shell: FakeShell,
    browser: BrowserState,
}

pub struct Wired {
    pub directory: Arc<DirectoryState>,
    pub probe: Arc<FakeProbe>,
    pub shell: Arc<FakeShell>,
    pub browser: Arc<BrowserState>,
    pub pipeline: Pipeline,
}

impl World {
    pub fn new(names: &[&str]) -> Self {
        let mut world = Self::default();
        world.directory.names = names.iter().map(|n| n.to_string()).collect();
        world
    }

    pub fn online(mut self, name: &str, addr: IpAddr) -> Self {
        self.probe.hosts.insert(name.to_string(), (addr, true));
        self
    }

    pub fn offline(mut self, name: &str, addr: IpAddr) -> Self {
        self.probe.hosts.insert(name.to_string(), (addr, false));
        self
    }

    pub fn shell(mut self, name: &str, reply: ShellReply) -> Self {
        self.shell.replies.insert(name.to_string(), reply);
        self
    }

    pub fn portal(mut self, serial: &str, reply: PortalReply) -> Self {
        self.browser.portal.insert(serial.to_string(), reply);
        self
    }

    pub fn failing_search(mut self) -> Self {
        self.directory.fail_search = true;
        self
    }

    pub fn failing_browser(mut self) -> Self {
        self.browser.fail_launch = true;
        self
    }

    pub fn wire(self, lookup_workers: usize) -> Wired {
        let directory = Arc::new(self.directory);
        let probe = Arc::new(self.probe);
        let shell = Arc::new(self.shell);
        let browser = Arc::new(self.browser);

        let pipeline = Pipeline::new(
            settings(lookup_workers),
            Arc::new(FakeDirectory(directory.clone())),
            probe.clone(),
            shell.clone(),
            Arc::new(FakeBrowser(browser.clone())),
        );

        Wired {
            directory,
            probe,
            shell,
            browser,
            pipeline,
        }
    }
}

fn settings(lookup_workers: usize) -> PipelineSettings {
    PipelineSettings {
        search_base: "OU=Workstations,DC=corp,DC=example".to_string(),
        credentials: Credentials::new("CORP\\svc-inventory", "secret"),
        serial_command: "Get-WmiObject Win32_BIOS | Select-Object SerialNumber".to_string(),
        probe_workers: 8,
        identity_workers: 4,
        lookup: LookupSettings {
            web_url: "https://support.vendor.example/warranty".to_string(),
            input_locator: "//input[@id='serial']".to_string(),
            result_locator: "//div[@class='warranty-status']".to_string(),
            page_timeout: Duration::from_secs(5),
            element_timeout: Duration::from_secs(10),
            headless: true,
            workers: lookup_workers,
        },
    }
}
