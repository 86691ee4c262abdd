use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
};

use crate::error::Result;
use crate::models::{HourlyRate, MeterReadingsResponse, RawMeterQuery};
use crate::services::MeterService;

pub async fn get_meter_readings(
    State(service): State<MeterService>,
    Query(params): Query<RawMeterQuery>,
) -> Result<Json<MeterReadingsResponse>> {
    let response = service.query(params).await?;
    Ok(Json(response))
}

pub async fn get_rates(State(service): State<MeterService>) -> Json<Vec<HourlyRate>> {
    Json(service.rates())
}

pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(serde_json::json!({ "status": "ok" })),
    )
}
