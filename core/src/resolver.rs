//! # Liveness & Identity Resolver
//!
//! Classifies a device name step by step. Each step either advances the
//! device or stops it with exactly one [`DeviceErrorKind`]:
//!
//! 1. name resolution ([`DeviceErrorKind::DnsResolutionFailed`])
//! 2. TCP liveness probe ([`DeviceErrorKind::Offline`])
//! 3. remote inventory command ([`DeviceErrorKind::RemoteExecFailed`],
//!    [`DeviceErrorKind::RemoteExecNonZeroExit`])
//! 4. serial extraction ([`DeviceErrorKind::SerialDecodeFailed`],
//!    [`DeviceErrorKind::InvalidSerialFormat`])
//!
//! The resolver never touches the record store. Callers decide what to
//! persist, which keeps the steps usable on their own: the pool builder only
//! runs [`Resolver::locate`], the enrichment engine only [`Resolver::identify`].

use std::net::IpAddr;
use std::sync::Arc;

use tracing::debug;

use sweepr_common::device::{Device, DeviceErrorKind, ErrorEvent, IdentifiedDevice};
use sweepr_common::network::NetworkProbe;
use sweepr_common::remote::{CommandOutput, Credentials, RemoteSession, RemoteShell};
use sweepr_common::serial::SerialNumber;

#[derive(Clone)]
pub struct Resolver {
    probe: Arc<dyn NetworkProbe>,
    shell: Arc<dyn RemoteShell>,
    credentials: Credentials,
    command: String,
}

impl Resolver {
    pub fn new(
        probe: Arc<dyn NetworkProbe>,
        shell: Arc<dyn RemoteShell>,
        credentials: Credentials,
        command: impl Into<String>,
    ) -> Self {
        Self {
            probe,
            shell,
            credentials,
            command: command.into(),
        }
    }

    /// Steps 1 and 2.
    pub async fn locate(&self, name: &str) -> Result<Device, DeviceErrorKind> {
        let ip_address: IpAddr = match self.probe.resolve(name).await {
            Ok(ip) => ip,
            Err(e) => {
                debug!(device = name, error = %e, "Name resolution failed");
                return Err(DeviceErrorKind::DnsResolutionFailed);
            }
        };

        if !self.probe.is_reachable(ip_address).await {
            debug!(device = name, ip = %ip_address, "Device is offline");
            return Err(DeviceErrorKind::Offline);
        }

        Ok(Device::new(name, ip_address))
    }

    /// Steps 3 and 4 for a device that is already known to be live.
    pub async fn identify(&self, device: Device) -> Result<IdentifiedDevice, DeviceErrorKind> {
        let output: CommandOutput = self.run_inventory(&device.name).await?;

        if !output.success() {
            debug!(
                device = %device.name,
                status = output.status_code,
                "Inventory command reported failure"
            );
            return Err(DeviceErrorKind::RemoteExecNonZeroExit);
        }

        let serial_number: SerialNumber = SerialNumber::from_inventory_output(&output.stdout)
            .inspect_err(|kind| debug!(device = %device.name, error = %kind, "Unusable serial"))?;

        Ok(device.with_serial(serial_number))
    }

    /// All four steps, short-circuiting on the first failure.
    pub async fn resolve(&self, name: &str) -> Result<IdentifiedDevice, ErrorEvent> {
        let failed = |kind: DeviceErrorKind| ErrorEvent::new(name, kind);
        let device: Device = self.locate(name).await.map_err(failed)?;
        self.identify(device).await.map_err(failed)
    }

    async fn run_inventory(&self, host: &str) -> Result<CommandOutput, DeviceErrorKind> {
        let mut session: Box<dyn RemoteSession> = self
            .shell
            .open_session(host, &self.credentials)
            .await
            .map_err(|e| {
                debug!(device = host, error = %e, "Could not open remote session");
                DeviceErrorKind::RemoteExecFailed
            })?;

        session.run(&self.command).await.map_err(|e| {
            debug!(device = host, error = %e, "Remote command did not complete");
            DeviceErrorKind::RemoteExecFailed
        })
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
