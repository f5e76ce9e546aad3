//! hopgate-gateway — the listening side of hopgate.
//!
//! One HTTP/1.1 listener serves both traffic classes:
//!
//! ```text
//! TCP accept
//!   │
//!   ▼
//! hyper http1 (with upgrades)
//!   │
//!   ├── CONNECT ──▶ TunnelHandler ──▶ backend relay
//!   └── other   ──▶ control API router (or 404 when disabled)
//! ```

pub mod router;
pub mod server;

pub use router::{RequestRouter, Route};
pub use server::Gateway;
