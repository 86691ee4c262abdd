use axum::{extract::Request, routing::get, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::Level;

use crate::handlers::meter::{get_meter_readings, get_rates, health};
use crate::services::MeterService;

pub fn create_router(service: MeterService) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/meter_readings", get(get_meter_readings))
        .route("/meter_readings/rates", get(get_rates))
        .with_state(service)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request| {
                    tracing::span!(
                        Level::INFO,
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                    )
                })
                .on_response(
                    |_response: &axum::response::Response,
                     latency: std::time::Duration,
                     _span: &tracing::Span| {
                        tracing::event!(Level::INFO, latency = ?latency, "request completed");
                    },
                ),
        )
}
