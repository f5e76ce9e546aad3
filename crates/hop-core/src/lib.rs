//! hop-core — shared building blocks for the hopgate CONNECT gateway.
//!
//! # Components
//!
//! - **`rules`** — `RuleTable`, the live service name → backend address registry
//! - **`loader`** — rule file parsing with environment template expansion
//! - **`config`** — `GatewayConfig`, the daemon's TOML configuration

pub mod config;
pub mod error;
pub mod loader;
pub mod rules;

pub use config::GatewayConfig;
pub use error::{ConfigError, ConfigResult};
pub use rules::RuleTable;
