use crate::config::PricingConfig;
use crate::models::{
    CostBreakdown, HourlyRate, MeterChannel, MeterReading, PricingInfo, TariffBucket, TariffWindow,
};
use chrono::{DateTime, Datelike, Timelike, Utc};

/// True when the instant falls in the high-tariff (Hochtarif) window:
/// Mon-Fri, [start_hour, end_hour) in UTC. Weekends are low tariff at any
/// hour.
pub fn is_high_tariff(ts: &DateTime<Utc>, pricing: &PricingConfig) -> bool {
    let weekday = ts.weekday().num_days_from_monday() < 5;
    weekday
        && ts.hour() >= pricing.high_window_start_hour
        && ts.hour() < pricing.high_window_end_hour
}

/// Classify every active-channel reading into a tariff bucket and derive
/// the cost aggregates. Reactive energy is not billed and never enters the
/// breakdown. Zero active data yields an all-zero breakdown, not an error.
pub fn cost_breakdown(readings: &[MeterReading], pricing: &PricingConfig) -> CostBreakdown {
    let mut high_kwh = 0.0;
    let mut low_kwh = 0.0;

    for reading in readings.iter().filter(|r| r.channel == MeterChannel::Active) {
        if is_high_tariff(&reading.ts, pricing) {
            high_kwh += reading.value;
        } else {
            low_kwh += reading.value;
        }
    }

    let total_kwh = high_kwh + low_kwh;
    let high_cost = high_kwh * pricing.high_rate_chf_per_kwh;
    let low_cost = low_kwh * pricing.low_rate_chf_per_kwh;
    let total_cost = high_cost + low_cost;

    let percent_of_total = |kwh: f64| {
        if total_kwh > 0.0 {
            kwh / total_kwh * 100.0
        } else {
            0.0
        }
    };

    let effective_rate = if total_kwh > 0.0 {
        total_cost / total_kwh
    } else {
        0.0
    };

    // What-if: shift a fraction of high-tariff energy to the low rate
    let potential_savings = pricing.savings_shift_fraction
        * high_kwh
        * (pricing.high_rate_chf_per_kwh - pricing.low_rate_chf_per_kwh);

    CostBreakdown {
        high_tariff: TariffBucket {
            kwh: high_kwh,
            cost_chf: high_cost,
            percent_of_total_energy: percent_of_total(high_kwh),
        },
        low_tariff: TariffBucket {
            kwh: low_kwh,
            cost_chf: low_cost,
            percent_of_total_energy: percent_of_total(low_kwh),
        },
        total_kwh,
        total_cost_chf: total_cost,
        effective_rate_chf_per_kwh: effective_rate,
        potential_savings_chf: potential_savings,
        savings_shift_fraction: pricing.savings_shift_fraction,
    }
}

/// Rate for each hour of day, weekday and weekend. Frontends use this to
/// render the tariff schedule behind the cost figures.
pub fn hourly_rates(pricing: &PricingConfig) -> Vec<HourlyRate> {
    (0..24)
        .map(|hour| {
            let weekday_high =
                hour >= pricing.high_window_start_hour && hour < pricing.high_window_end_hour;
            let (weekday_rate, weekday_tariff) = if weekday_high {
                (pricing.high_rate_chf_per_kwh, "high")
            } else {
                (pricing.low_rate_chf_per_kwh, "low")
            };

            HourlyRate {
                hour,
                hour_label: format!("{:02}:00", hour),
                weekday_rate,
                weekday_tariff: weekday_tariff.to_string(),
                weekend_rate: pricing.low_rate_chf_per_kwh,
                weekend_tariff: "low".to_string(),
            }
        })
        .collect()
}

/// The pricing block included in every query response.
pub fn pricing_info(pricing: &PricingConfig) -> PricingInfo {
    PricingInfo {
        high_tariff_rate: pricing.high_rate_chf_per_kwh,
        low_tariff_rate: pricing.low_rate_chf_per_kwh,
        window: TariffWindow {
            days: "Mon-Fri".to_string(),
            start_hour: pricing.high_window_start_hour,
            end_hour: pricing.high_window_end_hour,
        },
        savings_shift_fraction: pricing.savings_shift_fraction,
    }
}
