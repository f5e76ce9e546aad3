//! Gateway listener.
//!
//! `Gateway` owns the TCP listener and runs a hyper HTTP/1.1 connection
//! per accepted socket, with upgrades enabled so CONNECT requests can
//! take the connection over.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use hyper::Request;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::router::RequestRouter;

/// HTTP gateway server.
pub struct Gateway {
    listener: TcpListener,
    router: Arc<RequestRouter>,
}

impl Gateway {
    /// Bind the listener. Port `0` picks a free port; see `local_addr`.
    pub async fn bind(addr: SocketAddr, router: RequestRouter) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind gateway on {addr}"))?;
        Ok(Self {
            listener,
            router: Arc::new(router),
        })
    }

    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until `shutdown` flips to `true`.
    ///
    /// Tunnels already established keep running after this returns.
    pub async fn serve(self, mut shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
        info!(addr = %self.local_addr()?, "gateway listening");

        loop {
            tokio::select! {
                accept_result = self.listener.accept() => {
                    let (stream, peer_addr) = match accept_result {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            error!(error = %e, "accept failed");
                            continue;
                        }
                    };
                    let router = Arc::clone(&self.router);

                    tokio::spawn(async move {
                        let io = TokioIo::new(stream);
                        let svc = service_fn(move |req: Request<Incoming>| {
                            let router = Arc::clone(&router);
                            async move {
                                Ok::<_, Infallible>(router.dispatch(req, peer_addr).await)
                            }
                        });

                        if let Err(e) = http1::Builder::new()
                            .serve_connection(io, svc)
                            .with_upgrades()
                            .await
                        {
                            debug!(%peer_addr, error = %e, "connection error");
                        }
                    });
                }
                _ = shutdown.wait_for(|stop| *stop) => {
                    info!("gateway shutting down");
                    break;
                }
            }
        }

        Ok(())
    }
}
