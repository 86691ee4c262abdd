use crate::models::meter::{MeterChannel, MeterReading};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// One row of the paginated `data` array. Raw resolution passes readings
/// through 1:1; any other resolution yields aggregate buckets.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SeriesRow {
    Raw(RawReadingRow),
    Bucket(TimeBucket),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawReadingRow {
    pub timestamp: DateTime<Utc>,
    pub channel: MeterChannel,
    pub value: f64,
}

impl From<MeterReading> for RawReadingRow {
    fn from(reading: MeterReading) -> Self {
        Self {
            timestamp: reading.ts,
            channel: reading.channel,
            value: reading.value,
        }
    }
}

/// One (time window, channel) aggregate. Buckets with no readings are
/// omitted from the series so that absent data stays distinguishable from
/// a true zero reading.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeBucket {
    pub bucket_start: DateTime<Utc>,
    pub channel: MeterChannel,
    pub sum: f64,
    pub avg: f64,
    pub count: i64,
    pub std_dev: f64,
}

/// Average usage per hour of day over the whole filtered range.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HourlyPatternRow {
    pub hour: u32,
    pub channel: MeterChannel,
    pub avg: f64,
    pub total: f64,
    pub std_dev: f64,
    pub count: i64,
}

/// Average usage per day of week over the whole filtered range.
/// `day_of_week` uses Sunday=0 .. Saturday=6.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyPatternRow {
    pub day_of_week: u32,
    pub channel: MeterChannel,
    pub avg: f64,
    pub total: f64,
    pub std_dev: f64,
    pub count: i64,
}

/// Hour-by-weekday average matrix for one channel. `values[hour][day]`
/// with days ordered Monday..Sunday and hours 0..23; cells without data
/// hold 0.0 but never contribute to any statistic.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelHeatmap {
    pub days: Vec<String>,
    pub hours: Vec<String>,
    pub values: Vec<Vec<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeatmapSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active: Option<ChannelHeatmap>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reactive: Option<ChannelHeatmap>,
}

/// Per-channel summary over the full filtered range. `peak_hour` is the
/// hour of day with the highest average reading (lowest hour wins ties)
/// and is null when the channel has no readings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsSummary {
    pub channel: MeterChannel,
    pub total_kwh: f64,
    pub avg_kwh: f64,
    pub min_kwh: f64,
    pub max_kwh: f64,
    pub reading_count: i64,
    pub peak_hour: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TariffBucket {
    pub kwh: f64,
    pub cost_chf: f64,
    pub percent_of_total_energy: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostBreakdown {
    pub high_tariff: TariffBucket,
    pub low_tariff: TariffBucket,
    pub total_kwh: f64,
    pub total_cost_chf: f64,
    pub effective_rate_chf_per_kwh: f64,
    /// What-if estimate: `savings_shift_fraction` of high-tariff energy
    /// valued at the rate difference. Illustrative, not a prediction.
    pub potential_savings_chf: f64,
    pub savings_shift_fraction: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Pagination {
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TariffWindow {
    pub days: String,
    pub start_hour: u32,
    pub end_hour: u32,
}

/// The pricing the response was computed with. Always present so that
/// every cost figure in the payload can be reproduced by the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PricingInfo {
    pub high_tariff_rate: f64,
    pub low_tariff_rate: f64,
    pub window: TariffWindow,
    pub savings_shift_fraction: f64,
}

/// One row of the 24-hour rate schedule exposed at /meter_readings/rates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HourlyRate {
    pub hour: u32,
    pub hour_label: String,
    pub weekday_rate: f64,
    pub weekday_tariff: String,
    pub weekend_rate: f64,
    pub weekend_tariff: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MeterReadingsResponse {
    pub data: Vec<SeriesRow>,
    pub pagination: Pagination,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<Vec<StatsSummary>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hourly_pattern: Option<Vec<HourlyPatternRow>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub daily_pattern: Option<Vec<DailyPatternRow>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heatmap: Option<HeatmapSection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_breakdown: Option<CostBreakdown>,
    pub pricing: PricingInfo,
}
