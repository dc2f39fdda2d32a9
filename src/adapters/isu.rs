use crate::adapters::http::{build_client, get_json, get_required_json, join_url};
use crate::domain::payload::{
    EventDetail, EventsListing, IndexPage, RaceDetail, RaceResults, RaceSummary, RawResult,
};
use crate::domain::ports::ResultsApi;
use crate::utils::error::Result;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

/// HTTP client for the ISU results API (`/events/...`).
#[derive(Clone)]
pub struct IsuClient {
    base_url: String,
    client: Client,
}

impl IsuClient {
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: build_client(request_timeout)?,
        })
    }

    fn url(&self, path: &str) -> String {
        join_url(&self.base_url, path)
    }
}

#[async_trait]
impl ResultsApi for IsuClient {
    async fn events_page(&self, page: u32) -> Result<IndexPage> {
        let url = self.url("events/");
        let listing: Option<EventsListing> =
            get_json(&self.client, &url, &[("page", page.to_string())]).await?;

        Ok(match listing {
            Some(listing) => IndexPage {
                events: listing.into_events(),
                end_of_results: false,
            },
            None => IndexPage {
                events: Vec::new(),
                end_of_results: true,
            },
        })
    }

    async fn event(&self, event_id: &str) -> Result<EventDetail> {
        let url = self.url(&format!("events/{}", event_id));
        get_required_json(&self.client, &url, &[]).await
    }

    async fn races(&self, event_id: &str) -> Result<Vec<RaceSummary>> {
        let url = self.url(&format!("events/{}/competitions", event_id));
        // 沒有任何比賽的賽事回傳 404，視為空清單
        Ok(get_json(&self.client, &url, &[]).await?.unwrap_or_default())
    }

    async fn race_detail(&self, event_id: &str, schedule_number: u32) -> Result<RaceDetail> {
        let url = self.url(&format!(
            "events/{}/competitions/{}/",
            event_id, schedule_number
        ));
        get_required_json(&self.client, &url, &[]).await
    }

    async fn race_results(&self, event_id: &str, schedule_number: u32) -> Result<Vec<RawResult>> {
        let url = self.url(&format!(
            "events/{}/competitions/{}/results/",
            event_id, schedule_number
        ));
        let results: Option<RaceResults> =
            get_json(&self.client, &url, &[("inSeconds", "0".to_string())]).await?;
        Ok(results.map(RaceResults::into_vec).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    #[tokio::test]
    async fn test_events_page_past_the_end() {
        let server = MockServer::start();
        let page_mock = server.mock(|when, then| {
            when.method(GET).path("/events/").query_param("page", "9");
            then.status(404)
                .header("Content-Type", "application/json")
                .json_body(serde_json::json!({"detail": "Invalid page."}));
        });

        let client = IsuClient::new(&server.base_url(), Duration::from_secs(5)).unwrap();
        let page = client.events_page(9).await.unwrap();

        page_mock.assert();
        assert!(page.end_of_results);
        assert!(page.events.is_empty());
    }

    #[tokio::test]
    async fn test_race_results_query() {
        let server = MockServer::start();
        let results_mock = server.mock(|when, then| {
            when.method(GET)
                .path("/events/WC2024/competitions/3/results/")
                .query_param("inSeconds", "0");
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(serde_json::json!([
                    {"rank": 1, "time": "36.49", "startNumber": 10},
                    {"rank": 2, "time": "36.61", "startNumber": 9}
                ]));
        });

        let client = IsuClient::new(&server.base_url(), Duration::from_secs(5)).unwrap();
        let results = client.race_results("WC2024", 3).await.unwrap();

        results_mock.assert();
        assert_eq!(results.len(), 2);
        assert_eq!(results[1].start_number, Some(9));
    }
}
