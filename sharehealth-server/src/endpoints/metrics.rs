use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use axum::{Router, routing};

use crate::metrics::CONTENT_TYPE;
use crate::state::ServiceState;

pub fn router() -> Router<ServiceState> {
    Router::new().route("/metrics", routing::get(metrics))
}

async fn metrics(State(state): State<ServiceState>) -> impl IntoResponse {
    ([(header::CONTENT_TYPE, CONTENT_TYPE)], state.metrics.render())
}
