use std::net::IpAddr;

use async_trait::async_trait;

/// Name resolution and reachability, the two cheap checks made before any
/// remote work is attempted on a device.
#[async_trait]
pub trait NetworkProbe: Send + Sync {
    /// Resolves a device name to the address used for every later step.
    async fn resolve(&self, name: &str) -> anyhow::Result<IpAddr>;

    /// Whether `addr` accepts a connection on the management port within the probe timeout.
    async fn is_reachable(&self, addr: IpAddr) -> bool;
}
