use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::trace;

/// Full TCP handshake against `target`. Only a completed connect counts;
/// refusals and timeouts both mean the device is treated as offline.
pub async fn handshake_probe(target: SocketAddr, limit: Duration) -> bool {
    match timeout(limit, TcpStream::connect(target)).await {
        Ok(Ok(_stream)) => true,
        Ok(Err(e)) => {
            trace!(%target, error = %e, "Probe refused");
            false
        }
        Err(_elapsed) => {
            trace!(%target, "Probe timed out");
            false
        }
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
