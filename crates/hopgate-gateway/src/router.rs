//! Request dispatch — CONNECT to the tunnel, everything else to the API.

use std::net::SocketAddr;

use axum::BoxError;
use axum::body::{Body, HttpBody};
use axum::http::{Method, Request, Response, StatusCode};
use bytes::Bytes;
use tower::ServiceExt;

use hopgate_tunnel::TunnelHandler;

/// Traffic class of an inbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Tunnel,
    Control,
}

impl Route {
    pub fn classify(method: &Method) -> Self {
        if method == Method::CONNECT {
            Route::Tunnel
        } else {
            Route::Control
        }
    }
}

/// Entry point for every request on the listener.
#[derive(Clone)]
pub struct RequestRouter {
    tunnel: TunnelHandler,
    control: Option<axum::Router>,
}

impl RequestRouter {
    /// `control` is `None` when the control API is disabled.
    pub fn new(tunnel: TunnelHandler, control: Option<axum::Router>) -> Self {
        Self { tunnel, control }
    }

    pub fn tunnel(&self) -> &TunnelHandler {
        &self.tunnel
    }

    pub async fn dispatch<B>(&self, req: Request<B>, peer: SocketAddr) -> Response<Body>
    where
        B: HttpBody<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        match Route::classify(req.method()) {
            Route::Tunnel => self.tunnel.handle(req, peer).await.map(Body::new),
            Route::Control => match &self.control {
                Some(control) => match control.clone().oneshot(req.map(Body::new)).await {
                    Ok(resp) => resp,
                    Err(never) => match never {},
                },
                None => not_configured(),
            },
        }
    }
}

fn not_configured() -> Response<Body> {
    Response::builder()
        .status(StatusCode::NOT_FOUND)
        .header("content-type", "text/plain; charset=utf-8")
        .body(Body::from("control API is not configured\n"))
        .expect("static response")
}
