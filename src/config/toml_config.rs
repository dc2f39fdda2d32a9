use crate::config::options::{
    default_concurrency, DiscoveryOptions, FetchOptions, SeasonalBestOptions, WeatherOptions,
    DEFAULT_RESULTS_API, DEFAULT_WEATHER_API,
};
use crate::domain::ports::ConfigProvider;
use crate::utils::error::{EtlError, Result};
use crate::utils::retry::RetryConfig;
use crate::utils::validation::{self, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::OnceLock;

/// File-based configuration; every section is optional and falls back to defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub pipeline: PipelineConfig,
    pub source: SourceConfig,
    pub discovery: DiscoveryConfig,
    pub fetch: FetchConfig,
    pub weather: WeatherConfig,
    pub seasonal_best: SeasonalBestConfig,
    pub filter: FilterConfig,
    pub load: LoadConfig,
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub name: String,
    pub description: String,
    pub version: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            name: "isu-etl".to_string(),
            description: String::new(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub results_api: String,
    pub weather_api: String,
    pub timeout_seconds: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            results_api: DEFAULT_RESULTS_API.to_string(),
            weather_api: DEFAULT_WEATHER_API.to_string(),
            timeout_seconds: FetchOptions::default().request_timeout_secs,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub start_page: Option<u32>,
    pub empty_pages_to_stop: Option<u32>,
    pub retry_attempts: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub concurrent_requests: Option<usize>,
    pub item_timeout_seconds: Option<u64>,
    pub retry_attempts: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    pub coordinate_decimals: Option<u32>,
    pub default_event_hour: Option<u32>,
    pub request_delay_ms: Option<u64>,
    pub retry_attempts: Option<u32>,
    pub initial_backoff_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SeasonalBestConfig {
    pub enabled: bool,
    pub api_url: Option<String>,
    pub request_delay_ms: Option<u64>,
    pub retry_attempts: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Additional title keywords to drop, on top of team/relay/mass start/mixed
    pub exclude_formats: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadConfig {
    pub output_path: String,
    /// Defaults to `<output_path>/isu_data.db`
    pub database: Option<String>,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            output_path: "./output".to_string(),
            database: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    pub enabled: bool,
    pub log_json: bool,
}

fn env_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\$\{([^}]+)\}").expect("static regex"))
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(EtlError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| EtlError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${ISU_API})，未設定的保持原樣
    fn substitute_env_vars(content: &str) -> String {
        env_pattern()
            .replace_all(content, |caps: &regex::Captures| {
                let var_name = &caps[1];
                std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
            })
            .to_string()
    }

    pub fn monitoring_enabled(&self) -> bool {
        self.monitoring.enabled
    }
}

impl ConfigProvider for TomlConfig {
    fn results_api(&self) -> &str {
        &self.source.results_api
    }

    fn weather_api(&self) -> &str {
        &self.source.weather_api
    }

    fn output_path(&self) -> &str {
        &self.load.output_path
    }

    fn database_path(&self) -> String {
        self.load
            .database
            .clone()
            .unwrap_or_else(|| format!("{}/isu_data.db", self.load.output_path))
    }

    fn excluded_formats(&self) -> &[String] {
        &self.filter.exclude_formats
    }

    fn discovery(&self) -> DiscoveryOptions {
        let defaults = DiscoveryOptions::default();
        DiscoveryOptions {
            start_page: self.discovery.start_page.unwrap_or(defaults.start_page),
            empty_pages_to_stop: self
                .discovery
                .empty_pages_to_stop
                .unwrap_or(defaults.empty_pages_to_stop),
            retry: RetryConfig {
                max_attempts: self
                    .discovery
                    .retry_attempts
                    .unwrap_or(defaults.retry.max_attempts),
                ..defaults.retry
            },
        }
    }

    fn fetch(&self) -> FetchOptions {
        let defaults = FetchOptions::default();
        FetchOptions {
            concurrency: self
                .fetch
                .concurrent_requests
                .unwrap_or_else(default_concurrency),
            request_timeout_secs: self.source.timeout_seconds,
            item_timeout_secs: self
                .fetch
                .item_timeout_seconds
                .unwrap_or(defaults.item_timeout_secs),
            retry: RetryConfig {
                max_attempts: self.fetch.retry_attempts.unwrap_or(defaults.retry.max_attempts),
                ..defaults.retry
            },
        }
    }

    fn weather(&self) -> WeatherOptions {
        let defaults = WeatherOptions::default();
        WeatherOptions {
            coordinate_decimals: self
                .weather
                .coordinate_decimals
                .unwrap_or(defaults.coordinate_decimals),
            default_event_hour: self
                .weather
                .default_event_hour
                .unwrap_or(defaults.default_event_hour),
            request_delay_ms: self
                .weather
                .request_delay_ms
                .unwrap_or(defaults.request_delay_ms),
            request_timeout_secs: defaults.request_timeout_secs,
            retry: RetryConfig {
                max_attempts: self
                    .weather
                    .retry_attempts
                    .unwrap_or(defaults.retry.max_attempts),
                initial_delay_ms: self
                    .weather
                    .initial_backoff_ms
                    .unwrap_or(defaults.retry.initial_delay_ms),
                ..defaults.retry
            },
        }
    }

    fn seasonal_best(&self) -> SeasonalBestOptions {
        let defaults = SeasonalBestOptions::default();
        SeasonalBestOptions {
            enabled: self.seasonal_best.enabled,
            api_url: self
                .seasonal_best
                .api_url
                .clone()
                .unwrap_or(defaults.api_url),
            request_delay_ms: self
                .seasonal_best
                .request_delay_ms
                .unwrap_or(defaults.request_delay_ms),
            request_timeout_secs: self.source.timeout_seconds,
            retry: RetryConfig {
                max_attempts: self
                    .seasonal_best
                    .retry_attempts
                    .unwrap_or(defaults.retry.max_attempts),
                ..defaults.retry
            },
        }
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_non_empty_string("pipeline.name", &self.pipeline.name)?;
        validation::validate_url("source.results_api", &self.source.results_api)?;
        validation::validate_url("source.weather_api", &self.source.weather_api)?;
        validation::validate_path("load.output_path", &self.load.output_path)?;
        if let Some(database) = &self.load.database {
            validation::validate_path("load.database", database)?;
        }
        validation::validate_range("source.timeout_seconds", self.source.timeout_seconds, 1, 600)?;
        validation::validate_options(
            &self.discovery(),
            &self.fetch(),
            &self.weather(),
        )?;
        validation::validate_seasonal_best(&self.seasonal_best())
    }
}
