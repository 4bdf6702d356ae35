use axum::routing::get;
use axum::Router;

use crate::state::AppState;

pub mod addresses;
pub mod availability;
pub mod events;
pub mod health;
pub mod pricing;

pub fn v1_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .merge(addresses::router())
        .merge(availability::router())
        .merge(pricing::router())
        .merge(events::router())
}
