//! hopgate-tunnel — the CONNECT side of the gateway.
//!
//! A client sends `CONNECT <service> HTTP/1.1`. The handler looks the
//! service up in the `RuleTable`, dials the registered backend, answers
//! `200`, takes over the upgraded connection and relays raw bytes until
//! either side goes away.
//!
//! ```text
//! client ──CONNECT ssh──▶ TunnelHandler ──lookup──▶ RuleTable
//!                              │
//!                              ├── dial 10.0.0.5:22 (keep-alive 5s)
//!                              ├── 200 + upgrade
//!                              ▼
//!                 client ◀══ relay ══▶ backend
//! ```

pub mod dial;
pub mod error;
pub mod handler;
pub mod relay;

pub use dial::{KEEPALIVE_PERIOD, dial};
pub use error::{TunnelError, TunnelResult};
pub use handler::TunnelHandler;
pub use relay::{PipeOutcome, RelayStats, relay};
