use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use anyhow::{Context, bail};
use tokio::net::lookup_host;
use tokio::time::timeout;

/// Resolves `name` through the system resolver, preferring an IPv4 answer.
pub async fn resolve_host(name: &str, limit: Duration) -> anyhow::Result<IpAddr> {
    if name.trim().is_empty() {
        bail!("empty host name");
    }

    let answers: Vec<SocketAddr> = timeout(limit, lookup_host((name, 0)))
        .await
        .with_context(|| format!("lookup of {name} timed out after {limit:?}"))?
        .with_context(|| format!("lookup of {name} failed"))?
        .collect();

    answers
        .iter()
        .find(|addr| addr.is_ipv4())
        .or_else(|| answers.first())
        .map(SocketAddr::ip)
        .with_context(|| format!("{name} has no address records"))
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    const LIMIT: Duration = Duration::from_secs(2);

    #[tokio::test]
    async fn literal_addresses_resolve_to_themselves() {
        let ip: IpAddr = resolve_host("10.0.0.5", LIMIT).await.unwrap();
        assert_eq!(ip, IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5)));
    }

    #[tokio::test]
    async fn empty_names_are_rejected() {
        assert!(resolve_host("  ", LIMIT).await.is_err());
    }

    #[tokio::test]
    #[ignore]
    async fn reserved_invalid_tld_does_not_resolve() {
        assert!(resolve_host("ghost-pc.invalid", LIMIT).await.is_err());
    }
}
