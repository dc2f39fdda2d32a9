use crate::adapters::http::{build_client, get_json, join_url};
use crate::domain::model::{WeatherObservation, WeatherQuery};
use crate::domain::payload::{ArchiveResponse, HourlySeries};
use crate::domain::ports::WeatherApi;
use crate::utils::error::{EtlError, Result};
use async_trait::async_trait;
use chrono::{NaiveDateTime, Timelike};
use reqwest::Client;
use std::time::Duration;

const HOURLY_FIELDS: &str = "temperature_2m,surface_pressure,pressure_msl";

/// Open-Meteo historical archive (`/v1/archive`), hourly series in UTC.
#[derive(Clone)]
pub struct OpenMeteoClient {
    base_url: String,
    client: Client,
}

impl OpenMeteoClient {
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: build_client(request_timeout)?,
        })
    }
}

#[async_trait]
impl WeatherApi for OpenMeteoClient {
    async fn hourly(&self, query: &WeatherQuery) -> Result<Vec<WeatherObservation>> {
        let url = join_url(&self.base_url, "v1/archive");
        let params = [
            ("latitude", query.latitude.to_string()),
            ("longitude", query.longitude.to_string()),
            ("start_date", query.start_date.format("%Y-%m-%d").to_string()),
            ("end_date", query.end_date.format("%Y-%m-%d").to_string()),
            ("hourly", HOURLY_FIELDS.to_string()),
            ("timezone", "UTC".to_string()),
        ];

        let response: ArchiveResponse =
            get_json(&self.client, &url, &params)
                .await?
                .ok_or_else(|| EtlError::HttpStatusError {
                    status: 404,
                    url: url.clone(),
                })?;

        match response.hourly {
            Some(series) => series_to_observations(series, &url),
            None => Ok(Vec::new()),
        }
    }
}

fn series_to_observations(series: HourlySeries, url: &str) -> Result<Vec<WeatherObservation>> {
    let len = series.time.len();
    if series.temperature_2m.len() != len
        || series.surface_pressure.len() != len
        || series.pressure_msl.len() != len
    {
        return Err(EtlError::SchemaError {
            context: url.to_string(),
            message: "hourly arrays have different lengths".to_string(),
        });
    }

    let mut observations = Vec::with_capacity(len);
    for (i, stamp) in series.time.iter().enumerate() {
        let Ok(at) = NaiveDateTime::parse_from_str(stamp, "%Y-%m-%dT%H:%M") else {
            tracing::debug!("Skipping unparseable weather timestamp {}", stamp);
            continue;
        };
        observations.push(WeatherObservation {
            date: at.date(),
            hour: at.hour(),
            temperature: series.temperature_2m[i],
            surface_pressure: series.surface_pressure[i],
            sealevel_pressure: series.pressure_msl[i],
        });
    }
    Ok(observations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use httpmock::prelude::*;

    #[tokio::test]
    async fn test_hourly_request_and_parse() {
        let server = MockServer::start();
        let archive_mock = server.mock(|when, then| {
            when.method(GET)
                .path("/v1/archive")
                .query_param("latitude", "52.95")
                .query_param("start_date", "2024-01-12")
                .query_param("end_date", "2024-01-14")
                .query_param("hourly", HOURLY_FIELDS)
                .query_param("timezone", "UTC");
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(serde_json::json!({
                    "hourly": {
                        "time": ["2024-01-12T14:00", "2024-01-12T15:00"],
                        "temperature_2m": [3.1, null],
                        "surface_pressure": [1011.2, 1011.0],
                        "pressure_msl": [1014.9, 1014.7]
                    }
                }));
        });

        let client = OpenMeteoClient::new(&server.base_url(), Duration::from_secs(5)).unwrap();
        let observations = client
            .hourly(&WeatherQuery {
                latitude: 52.95,
                longitude: 5.94,
                start_date: NaiveDate::from_ymd_opt(2024, 1, 12).unwrap(),
                end_date: NaiveDate::from_ymd_opt(2024, 1, 14).unwrap(),
            })
            .await
            .unwrap();

        archive_mock.assert();
        assert_eq!(observations.len(), 2);
        assert_eq!(observations[0].hour, 14);
        assert!(observations[0].reading().is_some());
        assert!(observations[1].reading().is_none());
    }

    #[test]
    fn test_mismatched_series_is_schema_error() {
        let series = HourlySeries {
            time: vec!["2024-01-12T14:00".into()],
            temperature_2m: vec![],
            surface_pressure: vec![Some(1.0)],
            pressure_msl: vec![Some(1.0)],
        };
        assert!(matches!(
            series_to_observations(series, "test"),
            Err(EtlError::SchemaError { .. })
        ));
    }
}
