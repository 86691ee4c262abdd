use crate::config::PricingConfig;
use crate::error::{AppError, Result};
use crate::models::{
    ChannelFilter, DayFilter, HourlyRate, IncludeSet, MeterReading, MeterReadingsResponse,
    Pagination, QueryFilter, RawMeterQuery, Resolution, SeriesRow,
};
use crate::repositories::MeterRepository;
use crate::services::{analytics, tariff};
use chrono::{Duration, NaiveDate};
use std::str::FromStr;

/// Hard cap on per_page; bounds the memory a single response can take.
const MAX_PER_PAGE: i64 = 1000;
const DEFAULT_PER_PAGE: i64 = 100;

#[derive(Clone)]
pub struct MeterService {
    repository: MeterRepository,
    pricing: PricingConfig,
}

impl MeterService {
    pub fn new(repository: MeterRepository, pricing: PricingConfig) -> Self {
        Self {
            repository,
            pricing,
        }
    }

    /// Run one analytical query end to end: validate, fetch, filter,
    /// derive the requested sections, paginate. Pure apart from the fetch;
    /// the same readings and filter always produce the same response.
    pub async fn query(&self, params: RawMeterQuery) -> Result<MeterReadingsResponse> {
        let filter = resolve_filter(&params)?;

        let mut readings = self
            .repository
            .find_range(filter.start, filter.end, filter.channel)
            .await?;

        readings.retain(|r| filter.day_filter.matches(&r.ts));
        // The adapter only guarantees timestamp order; make the full order
        // deterministic before grouping and slicing.
        readings.sort_by(|a, b| a.ts.cmp(&b.ts).then(a.channel.cmp(&b.channel)));

        Ok(assemble(readings, &filter, &self.pricing))
    }

    pub fn rates(&self) -> Vec<HourlyRate> {
        tariff::hourly_rates(&self.pricing)
    }
}

/// Normalize the raw query parameters into a `QueryFilter`, rejecting
/// anything malformed with a field-level message. Dates are required: an
/// unbounded query could return an unbounded row count.
pub fn resolve_filter(params: &RawMeterQuery) -> Result<QueryFilter> {
    let start_date = parse_date("start", params.start.as_deref())?;
    let end_date = parse_date("end", params.end.as_deref())?;

    if start_date > end_date {
        return Err(AppError::Validation(format!(
            "start {} must not be after end {}",
            start_date, end_date
        )));
    }

    let channel = match params.meter.as_deref() {
        None => ChannelFilter::Both,
        Some(s) => ChannelFilter::from_str(s).map_err(AppError::Validation)?,
    };

    let resolution = match params.aggregation.as_deref() {
        None => Resolution::Raw,
        Some(s) => Resolution::from_str(s).map_err(AppError::Validation)?,
    };

    let weekday_only = parse_bool("weekday_only", params.weekday_only.as_deref())?;
    let weekend_only = parse_bool("weekend_only", params.weekend_only.as_deref())?;
    // weekday_only wins when both are set; they are never merged
    let day_filter = if weekday_only {
        DayFilter::WeekdaysOnly
    } else if weekend_only {
        DayFilter::WeekendsOnly
    } else {
        DayFilter::All
    };

    let include = match params.include.as_deref() {
        None => IncludeSet::default(),
        Some(s) => IncludeSet::parse(s).map_err(AppError::Validation)?,
    };

    let page = parse_int("page", params.page.as_deref(), 1)?;
    if page < 1 {
        return Err(AppError::Validation(format!(
            "page must be at least 1, got {}",
            page
        )));
    }

    let per_page = parse_int("per_page", params.per_page.as_deref(), DEFAULT_PER_PAGE)?;
    if per_page < 1 {
        return Err(AppError::Validation(format!(
            "per_page must be at least 1, got {}",
            per_page
        )));
    }

    // An inclusive date range covers the whole end day
    let start = start_date.and_hms_opt(0, 0, 0).unwrap().and_utc();
    let end = (end_date + Duration::days(1))
        .and_hms_opt(0, 0, 0)
        .unwrap()
        .and_utc();

    Ok(QueryFilter {
        start,
        end,
        channel,
        resolution,
        day_filter,
        include,
        page,
        per_page: per_page.min(MAX_PER_PAGE),
    })
}

/// Combine the requested sections into one response and slice the
/// row-level data to the requested page. A page past the end yields an
/// empty data array, not an error.
pub fn assemble(
    readings: Vec<MeterReading>,
    filter: &QueryFilter,
    pricing: &PricingConfig,
) -> MeterReadingsResponse {
    let channels = filter.channel.channels();

    let rows: Vec<SeriesRow> = match filter.resolution {
        Resolution::Raw => readings
            .iter()
            .cloned()
            .map(|r| SeriesRow::Raw(r.into()))
            .collect(),
        _ => analytics::bucket_readings(&readings, filter.resolution)
            .into_iter()
            .map(SeriesRow::Bucket)
            .collect(),
    };

    let total = rows.len() as i64;
    let total_pages = if total == 0 {
        0
    } else {
        (total + filter.per_page - 1) / filter.per_page
    };
    let offset = ((filter.page - 1) * filter.per_page) as usize;
    let data: Vec<SeriesRow> = rows
        .into_iter()
        .skip(offset)
        .take(filter.per_page as usize)
        .collect();

    // The hourly pattern feeds both the patterns section and the stats
    // peak hour, so compute it once when either is requested.
    let hourly_rows = (filter.include.stats || filter.include.patterns)
        .then(|| analytics::hourly_pattern(&readings));

    let stats = filter.include.stats.then(|| {
        analytics::channel_stats(&readings, hourly_rows.as_deref().unwrap_or(&[]), &channels)
    });

    let daily_pattern = filter
        .include
        .patterns
        .then(|| analytics::daily_pattern(&readings));
    let hourly_pattern = if filter.include.patterns {
        hourly_rows
    } else {
        None
    };

    let heatmap = filter
        .include
        .heatmap
        .then(|| analytics::build_heatmap(&readings, &channels));

    let cost_breakdown = filter
        .include
        .cost
        .then(|| tariff::cost_breakdown(&readings, pricing));

    MeterReadingsResponse {
        data,
        pagination: Pagination {
            total,
            page: filter.page,
            per_page: filter.per_page,
            total_pages,
        },
        stats,
        hourly_pattern,
        daily_pattern,
        heatmap,
        cost_breakdown,
        pricing: tariff::pricing_info(pricing),
    }
}

fn parse_date(field: &str, value: Option<&str>) -> Result<NaiveDate> {
    let raw = value.ok_or_else(|| AppError::Validation(format!("{} is required", field)))?;
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
        AppError::Validation(format!(
            "invalid {} date: {} (expected YYYY-MM-DD)",
            field, raw
        ))
    })
}

fn parse_bool(field: &str, value: Option<&str>) -> Result<bool> {
    match value {
        None => Ok(false),
        Some("true") | Some("1") => Ok(true),
        Some("false") | Some("0") => Ok(false),
        Some(other) => Err(AppError::Validation(format!(
            "invalid {} value: {} (expected true or false)",
            field, other
        ))),
    }
}

fn parse_int(field: &str, value: Option<&str>, default: i64) -> Result<i64> {
    match value {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|_| {
            AppError::Validation(format!("invalid {} value: {} (expected an integer)", field, raw))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MeterChannel;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn base_params() -> RawMeterQuery {
        RawMeterQuery {
            start: Some("2023-02-01".to_string()),
            end: Some("2023-02-28".to_string()),
            ..Default::default()
        }
    }

    fn base_filter() -> QueryFilter {
        resolve_filter(&base_params()).unwrap()
    }

    fn reading(d: u32, h: u32, min: u32, channel: MeterChannel, value: f64) -> MeterReading {
        MeterReading {
            ts: Utc.with_ymd_and_hms(2023, 2, d, h, min, 0).unwrap(),
            channel,
            value,
        }
    }

    #[test]
    fn test_resolve_defaults() {
        let filter = base_filter();

        assert_eq!(filter.channel, ChannelFilter::Both);
        assert_eq!(filter.resolution, Resolution::Raw);
        assert_eq!(filter.day_filter, DayFilter::All);
        assert_eq!(filter.include, IncludeSet::default());
        assert_eq!(filter.page, 1);
        assert_eq!(filter.per_page, DEFAULT_PER_PAGE);
        assert_eq!(
            filter.start,
            Utc.with_ymd_and_hms(2023, 2, 1, 0, 0, 0).unwrap()
        );
        // Inclusive end date: the window extends to the next midnight
        assert_eq!(
            filter.end,
            Utc.with_ymd_and_hms(2023, 3, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_resolve_requires_dates() {
        let missing_start = RawMeterQuery {
            end: Some("2023-02-28".to_string()),
            ..Default::default()
        };
        let err = resolve_filter(&missing_start).unwrap_err();
        assert!(matches!(err, AppError::Validation(ref msg) if msg.contains("start")));

        let missing_end = RawMeterQuery {
            start: Some("2023-02-01".to_string()),
            ..Default::default()
        };
        assert!(resolve_filter(&missing_end).is_err());
    }

    #[test]
    fn test_resolve_rejects_bad_dates_and_order() {
        let bad = RawMeterQuery {
            start: Some("01.02.2023".to_string()),
            end: Some("2023-02-28".to_string()),
            ..Default::default()
        };
        assert!(resolve_filter(&bad).is_err());

        let reversed = RawMeterQuery {
            start: Some("2023-02-28".to_string()),
            end: Some("2023-02-01".to_string()),
            ..Default::default()
        };
        assert!(resolve_filter(&reversed).is_err());
    }

    #[test]
    fn test_resolve_rejects_unknown_enums() {
        let bad_meter = RawMeterQuery {
            meter: Some("apparent".to_string()),
            ..base_params()
        };
        let err = resolve_filter(&bad_meter).unwrap_err();
        assert!(matches!(err, AppError::Validation(ref msg) if msg.contains("apparent")));

        let bad_aggregation = RawMeterQuery {
            aggregation: Some("monthly".to_string()),
            ..base_params()
        };
        assert!(resolve_filter(&bad_aggregation).is_err());

        let bad_include = RawMeterQuery {
            include: Some("stats,charts".to_string()),
            ..base_params()
        };
        assert!(resolve_filter(&bad_include).is_err());
    }

    #[test]
    fn test_resolve_pagination_bounds() {
        let zero_per_page = RawMeterQuery {
            per_page: Some("0".to_string()),
            ..base_params()
        };
        assert!(resolve_filter(&zero_per_page).is_err());

        let negative_page = RawMeterQuery {
            page: Some("-1".to_string()),
            ..base_params()
        };
        assert!(resolve_filter(&negative_page).is_err());

        let huge = RawMeterQuery {
            per_page: Some("100000".to_string()),
            ..base_params()
        };
        assert_eq!(resolve_filter(&huge).unwrap().per_page, MAX_PER_PAGE);

        let not_a_number = RawMeterQuery {
            page: Some("abc".to_string()),
            ..base_params()
        };
        assert!(resolve_filter(&not_a_number).is_err());
    }

    #[test]
    fn test_weekday_only_wins_over_weekend_only() {
        let both = RawMeterQuery {
            weekday_only: Some("true".to_string()),
            weekend_only: Some("true".to_string()),
            ..base_params()
        };
        assert_eq!(
            resolve_filter(&both).unwrap().day_filter,
            DayFilter::WeekdaysOnly
        );

        let weekend = RawMeterQuery {
            weekend_only: Some("1".to_string()),
            ..base_params()
        };
        assert_eq!(
            resolve_filter(&weekend).unwrap().day_filter,
            DayFilter::WeekendsOnly
        );

        let garbage = RawMeterQuery {
            weekday_only: Some("yes".to_string()),
            ..base_params()
        };
        assert!(resolve_filter(&garbage).is_err());
    }

    #[test]
    fn test_pagination_pages_cover_rows_exactly() {
        // per_page=2 over 5 raw readings: pages of 2, 2, 1, then empty
        let readings: Vec<MeterReading> = (0..5)
            .map(|i| reading(1, 10, i * 10, MeterChannel::Active, 0.1 * (i + 1) as f64))
            .collect();
        let pricing = PricingConfig::default();
        let mut filter = base_filter();
        filter.per_page = 2;

        let mut seen = Vec::new();
        for page in 1..=3 {
            filter.page = page;
            let response = assemble(readings.clone(), &filter, &pricing);
            assert_eq!(response.pagination.total, 5);
            assert_eq!(response.pagination.total_pages, 3);
            seen.extend(response.data);
        }
        assert_eq!(seen.len(), 5);

        // Concatenated pages reproduce the full ordered set
        let full = {
            filter.page = 1;
            filter.per_page = MAX_PER_PAGE;
            assemble(readings.clone(), &filter, &pricing).data
        };
        assert_eq!(seen, full);

        // Page past the end is empty, not an error
        filter.page = 4;
        filter.per_page = 2;
        let past_end = assemble(readings, &filter, &pricing);
        assert!(past_end.data.is_empty());
        assert_eq!(past_end.pagination.page, 4);
        assert_eq!(past_end.pagination.total, 5);
    }

    #[test]
    fn test_assemble_bucketed_rows() {
        let readings = vec![
            reading(1, 10, 0, MeterChannel::Active, 0.2),
            reading(1, 10, 15, MeterChannel::Active, 0.4),
            reading(1, 11, 0, MeterChannel::Active, 0.6),
        ];
        let pricing = PricingConfig::default();
        let mut filter = base_filter();
        filter.resolution = Resolution::Hourly;

        let response = assemble(readings, &filter, &pricing);
        assert_eq!(response.pagination.total, 2);
        match &response.data[0] {
            SeriesRow::Bucket(bucket) => {
                assert_eq!(bucket.count, 2);
                assert!((bucket.sum - 0.6).abs() < 1e-9);
            }
            SeriesRow::Raw(_) => panic!("expected bucket rows for hourly resolution"),
        }
    }

    #[test]
    fn test_sections_appear_only_when_requested() {
        let readings = vec![reading(1, 10, 0, MeterChannel::Active, 0.5)];
        let pricing = PricingConfig::default();

        let bare = assemble(readings.clone(), &base_filter(), &pricing);
        assert!(bare.stats.is_none());
        assert!(bare.hourly_pattern.is_none());
        assert!(bare.daily_pattern.is_none());
        assert!(bare.heatmap.is_none());
        assert!(bare.cost_breakdown.is_none());
        // Pricing is always present
        assert_eq!(bare.pricing.high_tariff_rate, 0.32);

        let mut filter = base_filter();
        filter.include = IncludeSet {
            stats: true,
            patterns: true,
            heatmap: true,
            cost: true,
        };
        let full = assemble(readings, &filter, &pricing);
        assert!(full.stats.is_some());
        assert!(full.hourly_pattern.is_some());
        assert!(full.daily_pattern.is_some());
        assert!(full.heatmap.is_some());
        assert!(full.cost_breakdown.is_some());
    }

    #[test]
    fn test_stats_peak_hour_without_patterns_section() {
        let readings = vec![
            reading(1, 9, 0, MeterChannel::Active, 0.1),
            reading(1, 18, 0, MeterChannel::Active, 0.9),
        ];
        let pricing = PricingConfig::default();
        let mut filter = base_filter();
        filter.include.stats = true;

        let response = assemble(readings, &filter, &pricing);
        let stats = response.stats.unwrap();
        let active = stats
            .iter()
            .find(|s| s.channel == MeterChannel::Active)
            .unwrap();
        assert_eq!(active.peak_hour, Some(18));
        // stats alone must not drag the patterns section in
        assert!(response.hourly_pattern.is_none());
    }

    #[test]
    fn test_weekday_weekend_rows_partition_all_rows() {
        // Wed 2023-02-01 and Sat 2023-02-04
        let readings = vec![
            reading(1, 10, 0, MeterChannel::Active, 0.1),
            reading(1, 11, 0, MeterChannel::Active, 0.2),
            reading(4, 10, 0, MeterChannel::Active, 0.3),
        ];
        let pricing = PricingConfig::default();
        let filter = base_filter();

        let split = |day_filter: DayFilter| {
            let kept: Vec<MeterReading> = readings
                .iter()
                .filter(|r| day_filter.matches(&r.ts))
                .cloned()
                .collect();
            assemble(kept, &filter, &pricing).data
        };

        let all = split(DayFilter::All);
        let weekdays = split(DayFilter::WeekdaysOnly);
        let weekends = split(DayFilter::WeekendsOnly);

        assert_eq!(weekdays.len() + weekends.len(), all.len());
        let mut recombined = weekdays.clone();
        recombined.extend(weekends.clone());
        for row in &all {
            assert!(recombined.contains(row));
        }
        for row in &weekdays {
            assert!(!weekends.contains(row));
        }
    }

    #[test]
    fn test_empty_range_yields_well_formed_response() {
        let pricing = PricingConfig::default();
        let mut filter = base_filter();
        filter.include = IncludeSet {
            stats: true,
            patterns: true,
            heatmap: true,
            cost: true,
        };

        let response = assemble(Vec::new(), &filter, &pricing);
        assert!(response.data.is_empty());
        assert_eq!(response.pagination.total, 0);
        assert_eq!(response.pagination.total_pages, 0);

        let stats = response.stats.unwrap();
        assert_eq!(stats.len(), 2); // one zero summary per requested channel
        assert!(stats.iter().all(|s| s.reading_count == 0));

        assert!(response.hourly_pattern.unwrap().is_empty());
        assert!(response.daily_pattern.unwrap().is_empty());

        let heatmap = response.heatmap.unwrap();
        let active = heatmap.active.unwrap();
        assert_eq!(active.values.len(), 24); // full shape even when empty
        assert!(heatmap.reactive.is_some());

        let cost = response.cost_breakdown.unwrap();
        assert_eq!(cost.total_kwh, 0.0);
    }

    #[test]
    fn test_assemble_is_idempotent() {
        let readings = vec![
            reading(1, 10, 0, MeterChannel::Active, 0.3),
            reading(2, 11, 0, MeterChannel::Reactive, 0.1),
        ];
        let pricing = PricingConfig::default();
        let mut filter = base_filter();
        filter.include = IncludeSet {
            stats: true,
            patterns: true,
            heatmap: true,
            cost: true,
        };

        let first = serde_json::to_string(&assemble(readings.clone(), &filter, &pricing)).unwrap();
        let second = serde_json::to_string(&assemble(readings, &filter, &pricing)).unwrap();
        assert_eq!(first, second);
    }
}
