pub(crate) mod analyze;
pub(crate) mod health;
pub(crate) mod metrics;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::app::AppState;

pub(crate) fn router(state: AppState) -> Router {
    Router::new()
        .route("/health/ready", get(health::ready))
        .route("/health/live", get(health::live))
        .route("/metrics", get(metrics::exporter))
        .route("/v1/analyze/hashtag", post(analyze::hashtag))
        .route("/v1/analyze/post", post(analyze::post))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
