use crate::adapters::http::{build_client, get_json, join_url};
use crate::domain::payload::{SeasonBestsResponse, SeasonEntry, SkaterCandidate, SkaterLookupResponse};
use crate::domain::ports::SkaterApi;
use crate::utils::error::Result;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

/// SpeedSkatingResults.com JSON API. An unknown skater (404) is an empty answer.
#[derive(Clone)]
pub struct SpeedSkatingResultsClient {
    base_url: String,
    client: Client,
}

impl SpeedSkatingResultsClient {
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: build_client(request_timeout)?,
        })
    }
}

#[async_trait]
impl SkaterApi for SpeedSkatingResultsClient {
    async fn lookup(&self, family_name: &str, country: &str) -> Result<Vec<SkaterCandidate>> {
        let url = join_url(&self.base_url, "api/json/skater_lookup");
        let params = [
            ("familyname", family_name.to_string()),
            ("country", country.to_uppercase()),
        ];
        let response: Option<SkaterLookupResponse> = get_json(&self.client, &url, &params).await?;
        Ok(response.map(|r| r.skaters).unwrap_or_default())
    }

    async fn season_bests(&self, skater_id: &str, season: i32) -> Result<Vec<SeasonEntry>> {
        let url = join_url(&self.base_url, "api/json/season_bests");
        let params = [
            ("skater", skater_id.to_string()),
            ("start", season.to_string()),
            ("end", season.to_string()),
        ];
        let response: Option<SeasonBestsResponse> = get_json(&self.client, &url, &params).await?;
        Ok(response.map(|r| r.seasons).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::error::EtlError;
    use httpmock::prelude::*;

    fn client(server: &MockServer) -> SpeedSkatingResultsClient {
        SpeedSkatingResultsClient::new(&server.base_url(), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_lookup_uppercases_country() {
        let server = MockServer::start();
        let lookup_mock = server.mock(|when, then| {
            when.method(GET)
                .path("/api/json/skater_lookup")
                .query_param("familyname", "Leerdam")
                .query_param("country", "NED");
            then.status(200).json_body(serde_json::json!({
                "skaters": [{"id": 8212, "givenname": "Jutta", "familyname": "Leerdam"}]
            }));
        });

        let skaters = client(&server).lookup("Leerdam", "ned").await.unwrap();

        lookup_mock.assert();
        assert_eq!(skaters.len(), 1);
        assert_eq!(skaters[0].id.as_deref(), Some("8212"));
    }

    #[tokio::test]
    async fn test_season_bests_query_and_missing_skater() {
        let server = MockServer::start();
        let bests_mock = server.mock(|when, then| {
            when.method(GET)
                .path("/api/json/season_bests")
                .query_param("skater", "8212")
                .query_param("start", "2023")
                .query_param("end", "2023");
            then.status(200).json_body(serde_json::json!({
                "seasons": [{"start": 2023, "records": [{"distance": 500, "time": "36,49"}]}]
            }));
        });
        server.mock(|when, then| {
            when.method(GET)
                .path("/api/json/season_bests")
                .query_param("skater", "1");
            then.status(404);
        });

        let seasons = client(&server).season_bests("8212", 2023).await.unwrap();
        bests_mock.assert();
        assert_eq!(seasons[0].start, Some(2023));
        assert_eq!(seasons[0].records[0].time.as_deref(), Some("36,49"));

        assert!(client(&server).season_bests("1", 2023).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_throttled_lookup_is_rate_limited_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/json/skater_lookup");
            then.status(429);
        });

        let result = client(&server).lookup("Kok", "NED").await;
        assert!(matches!(result, Err(EtlError::RateLimitedError { .. })));
    }
}
