//! The system [`NetworkProbe`]: OS name resolution plus a TCP connect probe.

pub mod dns;
pub mod tcp;

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use async_trait::async_trait;
use sweepr_common::config::ProbeSettings;
use sweepr_common::network::NetworkProbe;

pub struct SystemProbe {
    port: u16,
    timeout: Duration,
    dns_timeout: Duration,
}

impl SystemProbe {
    pub fn new(port: u16, timeout: Duration, dns_timeout: Duration) -> Self {
        Self {
            port,
            timeout,
            dns_timeout,
        }
    }
}

impl From<&ProbeSettings> for SystemProbe {
    fn from(settings: &ProbeSettings) -> Self {
        Self::new(settings.port, settings.timeout(), settings.dns_timeout())
    }
}

#[async_trait]
impl NetworkProbe for SystemProbe {
    async fn resolve(&self, name: &str) -> anyhow::Result<IpAddr> {
        dns::resolve_host(name, self.dns_timeout).await
    }

    async fn is_reachable(&self, addr: IpAddr) -> bool {
        tcp::handshake_probe(SocketAddr::new(addr, self.port), self.timeout).await
    }
}
