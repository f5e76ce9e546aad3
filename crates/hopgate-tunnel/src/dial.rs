//! Backend dialing.

use std::time::Duration;

use socket2::{SockRef, TcpKeepalive};
use tokio::net::TcpStream;
use tracing::{debug, warn};

use crate::error::{TunnelError, TunnelResult};

/// TCP keep-alive probe period applied to every backend connection.
pub const KEEPALIVE_PERIOD: Duration = Duration::from_secs(5);

/// Resolve `target` and open a TCP connection to it.
///
/// `timeout` bounds resolution plus connect when set; `None` waits as
/// long as the OS does. Keep-alive is enabled on the returned stream.
pub async fn dial(target: &str, timeout: Option<Duration>) -> TunnelResult<TcpStream> {
    let connect = TcpStream::connect(target);
    let result = match timeout {
        Some(limit) => match tokio::time::timeout(limit, connect).await {
            Ok(result) => result,
            Err(_) => {
                return Err(TunnelError::DialTimeout {
                    target: target.to_string(),
                    limit,
                });
            }
        },
        None => connect.await,
    };

    let stream = result.map_err(|source| TunnelError::Dial {
        target: target.to_string(),
        source,
    })?;

    if let Err(e) = enable_keepalive(&stream) {
        warn!(target, error = %e, "failed to enable keep-alive on backend");
    }

    debug!(target, local = ?stream.local_addr().ok(), "backend connected");
    Ok(stream)
}

fn enable_keepalive(stream: &TcpStream) -> std::io::Result<()> {
    let keepalive = TcpKeepalive::new().with_time(KEEPALIVE_PERIOD);
    #[cfg(any(target_os = "linux", target_os = "macos", target_os = "windows"))]
    let keepalive = keepalive.with_interval(KEEPALIVE_PERIOD);

    SockRef::from(stream).set_tcp_keepalive(&keepalive)
}
