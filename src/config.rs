use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub pricing: PricingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Swiss dual-tariff (Hochtarif/Niedertarif) residential pricing.
/// The high window is Mon-Fri [start_hour, end_hour); every other instant,
/// including all of Saturday and Sunday, bills at the low rate.
#[derive(Debug, Clone, Deserialize)]
pub struct PricingConfig {
    pub high_rate_chf_per_kwh: f64,
    pub low_rate_chf_per_kwh: f64,
    pub high_window_start_hour: u32,
    pub high_window_end_hour: u32,
    /// Fraction of high-tariff energy assumed shiftable in the
    /// potential-savings illustration.
    pub savings_shift_fraction: f64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            high_rate_chf_per_kwh: 0.32,
            low_rate_chf_per_kwh: 0.22,
            high_window_start_hour: 7,
            high_window_end_hour: 20,
            savings_shift_fraction: 0.30,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        let database_url = env::var("DATABASE_URL")
            .map_err(|_| config::ConfigError::NotFound("DATABASE_URL".into()))?;

        let max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(10);

        let host = env::var("SERVER_HOST")
            .unwrap_or_else(|_| "0.0.0.0".to_string());

        let port = env::var("SERVER_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(3000);

        let defaults = PricingConfig::default();
        let pricing = PricingConfig {
            high_rate_chf_per_kwh: env_f64("TARIFF_HIGH_RATE_CHF", defaults.high_rate_chf_per_kwh),
            low_rate_chf_per_kwh: env_f64("TARIFF_LOW_RATE_CHF", defaults.low_rate_chf_per_kwh),
            high_window_start_hour: defaults.high_window_start_hour,
            high_window_end_hour: defaults.high_window_end_hour,
            savings_shift_fraction: env_f64(
                "TARIFF_SAVINGS_SHIFT_FRACTION",
                defaults.savings_shift_fraction,
            ),
        };

        Ok(Config {
            database: DatabaseConfig {
                url: database_url,
                max_connections: Some(max_connections),
            },
            server: ServerConfig { host, port },
            pricing,
        })
    }
}

fn env_f64(name: &str, default: f64) -> f64 {
    env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}
