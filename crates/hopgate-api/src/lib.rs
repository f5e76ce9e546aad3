//! hopgate-api — control API for the rule table.
//!
//! Served on the same listener as CONNECT traffic; the gateway hands
//! every non-CONNECT request to this router.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/rules` | List all rules |
//! | POST | `/rules` | Create or overwrite a rule |
//! | DELETE | `/rules` | Delete all rules |
//! | DELETE | `/rules/{service}` | Delete one rule |

pub mod handlers;

use axum::Router;
use axum::routing::{delete, get};
use hop_core::RuleTable;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub rules: RuleTable,
}

/// Build the control API router.
pub fn build_router(rules: RuleTable) -> Router {
    let state = ApiState { rules };

    Router::new()
        .route(
            "/rules",
            get(handlers::list_rules)
                .post(handlers::create_rule)
                .delete(handlers::clear_rules),
        )
        .route("/rules/{service}", delete(handlers::delete_rule))
        .with_state(state)
}
