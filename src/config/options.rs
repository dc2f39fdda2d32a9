use crate::utils::retry::RetryConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_RESULTS_API: &str = "https://api.isuresults.eu";
pub const DEFAULT_WEATHER_API: &str = "https://archive-api.open-meteo.com";
pub const DEFAULT_SKATER_API: &str = "https://speedskatingresults.com";

/// 預設並發數：CPU 數的兩倍，上限 16
pub fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get() * 2)
        .unwrap_or(4)
        .min(16)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryOptions {
    pub start_page: u32,
    /// Consecutive "no new ids" pages that confirm the end of the index
    pub empty_pages_to_stop: u32,
    pub retry: RetryConfig,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            start_page: 1,
            empty_pages_to_stop: 2,
            retry: RetryConfig::discovery(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchOptions {
    pub concurrency: usize,
    pub request_timeout_secs: u64,
    /// Upper bound for all requests of one competition together
    pub item_timeout_secs: u64,
    pub retry: RetryConfig,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            request_timeout_secs: 15,
            item_timeout_secs: 180,
            retry: RetryConfig::fetch(),
        }
    }
}

impl FetchOptions {
    pub fn item_timeout(&self) -> Duration {
        Duration::from_secs(self.item_timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherOptions {
    /// Decimals kept when rounding venue coordinates into a lookup group
    pub coordinate_decimals: u32,
    /// Hour (UTC) used when a condition sample has no time of day
    pub default_event_hour: u32,
    /// Pause between two group queries
    pub request_delay_ms: u64,
    pub request_timeout_secs: u64,
    pub retry: RetryConfig,
}

impl Default for WeatherOptions {
    fn default() -> Self {
        Self {
            coordinate_decimals: 2,
            default_event_hour: 12,
            request_delay_ms: 1_000,
            request_timeout_secs: 30,
            retry: RetryConfig::weather(),
        }
    }
}

impl WeatherOptions {
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }
}

/// Previous-season bests from SpeedSkatingResults.com, off unless enabled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonalBestOptions {
    pub enabled: bool,
    pub api_url: String,
    /// Pause between two requests (about 15 per second)
    pub request_delay_ms: u64,
    pub request_timeout_secs: u64,
    pub retry: RetryConfig,
}

impl Default for SeasonalBestOptions {
    fn default() -> Self {
        Self {
            enabled: false,
            api_url: DEFAULT_SKATER_API.to_string(),
            request_delay_ms: 67,
            request_timeout_secs: 10,
            retry: RetryConfig::seasonal_best(),
        }
    }
}

impl SeasonalBestOptions {
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }
}
