use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::handler;
use crate::state::AppState;

/// Build the axum router with all StreetSource endpoints.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/v1/health", get(handler::health_handler))
        .route("/v1/info", get(handler::info_handler))
        .route(
            "/v1/suppliers",
            get(handler::list_suppliers).post(handler::register_supplier),
        )
        .route("/v1/summaries", get(handler::list_summaries))
        .route("/v1/suppliers/:name", get(handler::supplier_details))
        .route("/v1/suppliers/:name/rating", get(handler::supplier_rating))
        .route("/v1/suppliers/:name/reviews", get(handler::supplier_reviews))
        .route("/v1/suppliers/:name/ratings", post(handler::add_rating))
        .route("/v1/suppliers/:name/verify", post(handler::verify_supplier))
        .route("/v1/suppliers/:name/unverify", post(handler::unverify_supplier))
        .route("/v1/stats", get(handler::platform_stats))
        .route("/v1/callers/:id/ratings", get(handler::caller_ratings))
        .route("/v1/callers/:id/rated/:name", get(handler::caller_has_rated))
        .route("/v1/events", get(handler::events_since))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
