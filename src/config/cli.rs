use crate::config::options::{
    default_concurrency, DiscoveryOptions, FetchOptions, SeasonalBestOptions, WeatherOptions,
    DEFAULT_RESULTS_API, DEFAULT_SKATER_API, DEFAULT_WEATHER_API,
};
use crate::core::etl::ResumePoint;
use crate::domain::ports::ConfigProvider;
use crate::utils::error::Result;
use crate::utils::retry::RetryConfig;
use crate::utils::validation::{self, Validate};
use clap::Parser;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(name = "isu-etl")]
#[command(about = "Scrape ISU speed skating results and ice conditions, enrich them with weather and load them into SQLite")]
pub struct CliConfig {
    #[arg(long, default_value = DEFAULT_RESULTS_API)]
    pub results_api: String,

    #[arg(long, default_value = DEFAULT_WEATHER_API)]
    pub weather_api: String,

    #[arg(long, default_value = "./output")]
    pub output_path: String,

    /// SQLite file (default: <output-path>/isu_data.db)
    #[arg(long)]
    pub database: Option<String>,

    /// Competitions fetched in parallel (default: 2x CPUs, at most 16)
    #[arg(long)]
    pub concurrent_requests: Option<usize>,

    /// Per-request timeout in seconds
    #[arg(long, default_value = "15")]
    pub request_timeout: u64,

    #[arg(long, default_value = "1")]
    pub start_page: u32,

    /// Consecutive pages without new competitions that end discovery
    #[arg(long, default_value = "2")]
    pub empty_pages_to_stop: u32,

    #[arg(long, default_value = "2")]
    pub coordinate_decimals: u32,

    /// Hour (UTC) assumed for conditions without a time of day
    #[arg(long, default_value = "12")]
    pub default_event_hour: u32,

    /// Pause between weather queries, in milliseconds
    #[arg(long, default_value = "1000")]
    pub weather_delay_ms: u64,

    #[arg(long, default_value = "4")]
    pub weather_retries: u32,

    /// Add each skater's previous-season best from SpeedSkatingResults.com
    #[arg(long)]
    pub seasonal_best: bool,

    #[arg(long, default_value = DEFAULT_SKATER_API)]
    pub skater_api: String,

    /// Extra race-title keywords to drop
    #[arg(long, value_delimiter = ',')]
    pub exclude_format: Vec<String>,

    /// Start from a later phase using the files of a previous run
    #[arg(long, value_enum, default_value_t = ResumePoint::Extract)]
    pub from_stage: ResumePoint,

    /// Exit non-zero when any competition or weather group failed
    #[arg(long)]
    pub strict: bool,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Log as JSON lines")]
    pub log_json: bool,

    #[arg(long, help = "Log CPU and memory usage per phase")]
    pub monitor: bool,
}

impl ConfigProvider for CliConfig {
    fn results_api(&self) -> &str {
        &self.results_api
    }

    fn weather_api(&self) -> &str {
        &self.weather_api
    }

    fn output_path(&self) -> &str {
        &self.output_path
    }

    fn database_path(&self) -> String {
        self.database
            .clone()
            .unwrap_or_else(|| format!("{}/isu_data.db", self.output_path))
    }

    fn excluded_formats(&self) -> &[String] {
        &self.exclude_format
    }

    fn discovery(&self) -> DiscoveryOptions {
        DiscoveryOptions {
            start_page: self.start_page,
            empty_pages_to_stop: self.empty_pages_to_stop,
            ..DiscoveryOptions::default()
        }
    }

    fn fetch(&self) -> FetchOptions {
        FetchOptions {
            concurrency: self.concurrent_requests.unwrap_or_else(default_concurrency),
            request_timeout_secs: self.request_timeout,
            ..FetchOptions::default()
        }
    }

    fn weather(&self) -> WeatherOptions {
        WeatherOptions {
            coordinate_decimals: self.coordinate_decimals,
            default_event_hour: self.default_event_hour,
            request_delay_ms: self.weather_delay_ms,
            retry: RetryConfig {
                max_attempts: self.weather_retries,
                ..RetryConfig::weather()
            },
            ..WeatherOptions::default()
        }
    }

    fn seasonal_best(&self) -> SeasonalBestOptions {
        SeasonalBestOptions {
            enabled: self.seasonal_best,
            api_url: self.skater_api.clone(),
            request_timeout_secs: self.request_timeout,
            ..SeasonalBestOptions::default()
        }
    }
}

impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_url("results_api", &self.results_api)?;
        validation::validate_url("weather_api", &self.weather_api)?;
        validation::validate_path("output_path", &self.output_path)?;
        validation::validate_path("database", &self.database_path())?;
        validation::validate_range("request_timeout", self.request_timeout, 1, 600)?;
        validation::validate_options(&self.discovery(), &self.fetch(), &self.weather())?;
        validation::validate_seasonal_best(&self.seasonal_best())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_command_line() {
        let config = CliConfig::parse_from(["isu-etl"]);
        assert_eq!(config.results_api(), DEFAULT_RESULTS_API);
        assert_eq!(config.database_path(), "./output/isu_data.db");
        assert_eq!(config.from_stage, ResumePoint::Extract);
        assert_eq!(config.discovery(), DiscoveryOptions::default());
        assert_eq!(config.weather().retry, RetryConfig::weather());
        assert!(!config.seasonal_best().enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_flags_override_options() {
        let config = CliConfig::parse_from([
            "isu-etl",
            "--concurrent-requests",
            "3",
            "--exclude-format",
            "neo-senior,junior",
            "--from-stage",
            "enrich",
            "--weather-retries",
            "6",
            "--strict",
            "--seasonal-best",
        ]);
        assert_eq!(config.fetch().concurrency, 3);
        assert_eq!(config.excluded_formats().len(), 2);
        assert_eq!(config.from_stage, ResumePoint::Enrich);
        assert_eq!(config.weather().retry.max_attempts, 6);
        assert!(config.strict);
        assert!(config.seasonal_best().enabled);
        assert_eq!(config.seasonal_best().api_url, DEFAULT_SKATER_API);
    }

    #[test]
    fn test_invalid_values_fail_validation() {
        let config = CliConfig::parse_from(["isu-etl", "--results-api", "not a url"]);
        assert!(config.validate().is_err());

        let config = CliConfig::parse_from(["isu-etl", "--empty-pages-to-stop", "0"]);
        assert!(config.validate().is_err());
    }
}
