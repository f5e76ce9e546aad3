//! CONNECT request handler.
//!
//! `TunnelHandler` validates a CONNECT request against the `RuleTable`,
//! dials the backend and, once the `200` is on its way, spawns the
//! session task that waits for the upgrade and runs the relay.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use bytes::Bytes;
use http_body_util::Full;
use hyper::upgrade::OnUpgrade;
use hyper::{Method, Request, Response, StatusCode, Uri};
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use hop_core::RuleTable;

use crate::dial::dial;
use crate::error::{TunnelError, TunnelResult};
use crate::relay::{PipeOutcome, relay};

/// Handles CONNECT requests for registered services.
///
/// Cheap to clone; clones share the rule table and session counter.
#[derive(Clone)]
pub struct TunnelHandler {
    rules: RuleTable,
    dial_timeout: Option<Duration>,
    active: Arc<AtomicUsize>,
}

impl TunnelHandler {
    pub fn new(rules: RuleTable) -> Self {
        Self {
            rules,
            dial_timeout: None,
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Bound backend dialing. `None` (the default) means no deadline.
    pub fn with_dial_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.dial_timeout = timeout;
        self
    }

    /// Tunnels currently past the dial step and not yet torn down.
    pub fn active_sessions(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Serve one request. Errors are rendered as plain-text responses.
    pub async fn handle<B: Send>(
        &self,
        req: Request<B>,
        peer: SocketAddr,
    ) -> Response<Full<Bytes>> {
        match self.open(req, peer).await {
            Ok(()) => Response::builder()
                .status(StatusCode::OK)
                .body(Full::new(Bytes::new()))
                .expect("static response"),
            Err(e) => {
                debug!(%peer, error = %e, status = %e.status(), "CONNECT rejected");
                error_response(&e)
            }
        }
    }

    async fn open<B: Send>(&self, mut req: Request<B>, peer: SocketAddr) -> TunnelResult<()> {
        if req.method() != Method::CONNECT {
            return Err(TunnelError::MethodNotAllowed);
        }

        let service = request_target(req.uri());
        info!(%peer, service = %service, "new connection");

        let target = self
            .rules
            .lookup(&service)
            .ok_or_else(|| TunnelError::ServiceNotFound(service.clone()))?;

        let on_upgrade = req
            .extensions_mut()
            .remove::<OnUpgrade>()
            .ok_or(TunnelError::UpgradeUnsupported)?;
        drop(req);

        let backend = dial(&target, self.dial_timeout).await?;

        let session = Session {
            peer,
            service,
            target,
            _guard: SessionGuard::new(Arc::clone(&self.active)),
        };
        tokio::spawn(session.run(on_upgrade, backend));

        Ok(())
    }
}

/// Service name requested by a CONNECT, taken verbatim from the target.
fn request_target(uri: &Uri) -> String {
    uri.to_string()
}

fn error_response(err: &TunnelError) -> Response<Full<Bytes>> {
    Response::builder()
        .status(err.status())
        .header("content-type", "text/plain; charset=utf-8")
        .body(Full::new(Bytes::from(format!("{err}\n"))))
        .expect("static response")
}

/// One tunnel from upgrade to teardown.
struct Session {
    peer: SocketAddr,
    service: String,
    target: String,
    _guard: SessionGuard,
}

impl Session {
    async fn run(self, on_upgrade: OnUpgrade, backend: TcpStream) {
        let upgraded = match on_upgrade.await {
            Ok(upgraded) => upgraded,
            Err(e) => {
                // `backend` drops here and closes the dialed connection.
                warn!(peer = %self.peer, service = %self.service, error = %e, "upgrade failed");
                return;
            }
        };

        let started = Instant::now();
        let stats = relay(TokioIo::new(upgraded), backend).await;

        for (direction, outcome) in [
            ("client_to_backend", &stats.client_to_backend),
            ("backend_to_client", &stats.backend_to_client),
        ] {
            if let PipeOutcome::Failed(e) = outcome {
                debug!(
                    peer = %self.peer,
                    service = %self.service,
                    direction,
                    error = %e,
                    "relay error"
                );
            }
        }

        info!(
            peer = %self.peer,
            service = %self.service,
            target = %self.target,
            sent = ?stats.client_to_backend.bytes(),
            received = ?stats.backend_to_client.bytes(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "connection closed"
        );
    }
}

/// Counts a session as active for as long as it lives.
struct SessionGuard(Arc<AtomicUsize>);

impl SessionGuard {
    fn new(active: Arc<AtomicUsize>) -> Self {
        active.fetch_add(1, Ordering::SeqCst);
        Self(active)
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}
