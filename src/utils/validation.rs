use crate::config::options::{
    DiscoveryOptions, FetchOptions, SeasonalBestOptions, WeatherOptions,
};
use crate::utils::error::{EtlError, Result};
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_url(field_name: &str, url_str: &str) -> Result<()> {
    if url_str.is_empty() {
        return Err(EtlError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: "URL cannot be empty".to_string(),
        });
    }

    match Url::parse(url_str) {
        Ok(url) => {
            match url.scheme() {
                "http" | "https" => Ok(()),
                scheme => Err(EtlError::InvalidConfigValueError {
                    field: field_name.to_string(),
                    value: url_str.to_string(),
                    reason: format!("Unsupported URL scheme: {}", scheme),
                }),
            }
        }
        Err(e) => Err(EtlError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: format!("Invalid URL format: {}", e),
        }),
    }
}

pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(EtlError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path cannot be empty".to_string(),
        });
    }

    if path.contains('\0') {
        return Err(EtlError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path contains null bytes".to_string(),
        });
    }

    Ok(())
}

pub fn validate_positive_number(field_name: &str, value: usize, min_value: usize) -> Result<()> {
    if value < min_value {
        return Err(EtlError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be at least {}", min_value),
        });
    }
    Ok(())
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(EtlError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value cannot be empty or whitespace-only".to_string(),
        });
    }
    Ok(())
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    if value < min || value > max {
        return Err(EtlError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be between {} and {}", min, max),
        });
    }
    Ok(())
}

/// Ranges shared by every configuration source.
pub fn validate_options(
    discovery: &DiscoveryOptions,
    fetch: &FetchOptions,
    weather: &WeatherOptions,
) -> Result<()> {
    validate_range("discovery.start_page", discovery.start_page, 0, u32::MAX)?;
    validate_range("discovery.empty_pages_to_stop", discovery.empty_pages_to_stop, 1, 20)?;
    validate_range("discovery.retry_attempts", discovery.retry.max_attempts, 1, 10)?;
    validate_positive_number("fetch.concurrent_requests", fetch.concurrency, 1)?;
    validate_range("fetch.concurrent_requests", fetch.concurrency, 1, 64)?;
    validate_range("fetch.retry_attempts", fetch.retry.max_attempts, 1, 10)?;
    validate_range("weather.coordinate_decimals", weather.coordinate_decimals, 0, 6)?;
    validate_range("weather.default_event_hour", weather.default_event_hour, 0, 23)?;
    validate_range("weather.retry_attempts", weather.retry.max_attempts, 1, 10)?;
    Ok(())
}

/// Only checked when the stage is switched on.
pub fn validate_seasonal_best(options: &SeasonalBestOptions) -> Result<()> {
    if !options.enabled {
        return Ok(());
    }
    validate_url("seasonal_best.api_url", &options.api_url)?;
    validate_range("seasonal_best.retry_attempts", options.retry.max_attempts, 1, 10)?;
    validate_range("seasonal_best.request_timeout", options.request_timeout_secs, 1, 600)?;
    Ok(())
}
