use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One measurement channel of the meter. Active energy (kWh) is billable;
/// reactive energy (kVArh) is informational only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeterChannel {
    Active,
    Reactive,
}

impl fmt::Display for MeterChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MeterChannel::Active => write!(f, "active"),
            MeterChannel::Reactive => write!(f, "reactive"),
        }
    }
}

impl FromStr for MeterChannel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(MeterChannel::Active),
            "reactive" => Ok(MeterChannel::Reactive),
            other => Err(format!("unknown measurement channel: {}", other)),
        }
    }
}

/// A single interval reading as stored by the data loader.
#[derive(Debug, Clone, PartialEq)]
pub struct MeterReading {
    pub ts: DateTime<Utc>,
    pub channel: MeterChannel,
    pub value: f64,
}

/// Which channel(s) a query selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelFilter {
    Active,
    Reactive,
    Both,
}

impl ChannelFilter {
    pub fn channels(&self) -> Vec<MeterChannel> {
        match self {
            ChannelFilter::Active => vec![MeterChannel::Active],
            ChannelFilter::Reactive => vec![MeterChannel::Reactive],
            ChannelFilter::Both => vec![MeterChannel::Active, MeterChannel::Reactive],
        }
    }
}

impl FromStr for ChannelFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(ChannelFilter::Active),
            "reactive" => Ok(ChannelFilter::Reactive),
            "both" => Ok(ChannelFilter::Both),
            other => Err(format!(
                "unknown meter value: {} (expected active, reactive or both)",
                other
            )),
        }
    }
}

/// Bucket width for the row-level time series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Raw,
    Hourly,
    Daily,
    Weekly,
}

impl FromStr for Resolution {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "raw" => Ok(Resolution::Raw),
            "hourly" => Ok(Resolution::Hourly),
            "daily" => Ok(Resolution::Daily),
            "weekly" => Ok(Resolution::Weekly),
            other => Err(format!(
                "unknown aggregation value: {} (expected raw, hourly, daily or weekly)",
                other
            )),
        }
    }
}

/// Day-of-week restriction. When a request sets both weekday_only and
/// weekend_only, weekday_only wins; the two are never merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayFilter {
    All,
    WeekdaysOnly,
    WeekendsOnly,
}

impl DayFilter {
    pub fn matches(&self, ts: &DateTime<Utc>) -> bool {
        let weekday = ts.weekday().num_days_from_monday() < 5;
        match self {
            DayFilter::All => true,
            DayFilter::WeekdaysOnly => weekday,
            DayFilter::WeekendsOnly => !weekday,
        }
    }
}

/// The optional sections a request may ask for via `include`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IncludeSet {
    pub stats: bool,
    pub patterns: bool,
    pub heatmap: bool,
    pub cost: bool,
}

impl IncludeSet {
    /// Parse a comma-separated section list. Unknown section names are
    /// rejected rather than ignored.
    pub fn parse(list: &str) -> Result<Self, String> {
        let mut include = IncludeSet::default();
        for section in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            match section {
                "stats" => include.stats = true,
                "patterns" => include.patterns = true,
                "heatmap" => include.heatmap = true,
                "cost" => include.cost = true,
                other => {
                    return Err(format!(
                        "unknown include section: {} (expected stats, patterns, heatmap or cost)",
                        other
                    ))
                }
            }
        }
        Ok(include)
    }
}

/// Query parameters exactly as they arrive on the wire. Everything is an
/// optional string so that validation owns every error message.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawMeterQuery {
    pub start: Option<String>,
    pub end: Option<String>,
    pub meter: Option<String>,
    pub aggregation: Option<String>,
    pub weekday_only: Option<String>,
    pub weekend_only: Option<String>,
    pub include: Option<String>,
    pub page: Option<String>,
    pub per_page: Option<String>,
}

/// A fully validated and normalized query. `start` is inclusive and `end`
/// exclusive; both are derived from inclusive calendar dates, so `end` is
/// the midnight after the requested end date.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryFilter {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub channel: ChannelFilter,
    pub resolution: Resolution,
    pub day_filter: DayFilter,
    pub include: IncludeSet,
    pub page: i64,
    pub per_page: i64,
}
