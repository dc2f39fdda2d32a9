use crate::utils::error::{EtlError, Result};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;

pub fn build_client(timeout: Duration) -> Result<Client> {
    let client = Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .user_agent(concat!("isu-etl/", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(client)
}

/// GET + JSON decode. A 404 is returned as `Ok(None)`; 429 and other non-2xx
/// statuses become typed errors so callers can decide what to retry.
pub async fn get_json<T: DeserializeOwned>(
    client: &Client,
    url: &str,
    query: &[(&str, String)],
) -> Result<Option<T>> {
    tracing::debug!("GET {} {:?}", url, query);
    let response = client.get(url).query(query).send().await?;
    let status = response.status();

    if status == StatusCode::NOT_FOUND {
        return Ok(None);
    }
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(EtlError::RateLimitedError {
            url: url.to_string(),
        });
    }
    if !status.is_success() {
        return Err(EtlError::HttpStatusError {
            status: status.as_u16(),
            url: url.to_string(),
        });
    }

    let body = response.text().await?;
    let parsed = serde_json::from_str(&body).map_err(|e| EtlError::SchemaError {
        context: url.to_string(),
        message: e.to_string(),
    })?;
    Ok(Some(parsed))
}

/// Like [`get_json`] but a missing resource is an error too.
pub async fn get_required_json<T: DeserializeOwned>(
    client: &Client,
    url: &str,
    query: &[(&str, String)],
) -> Result<T> {
    get_json(client, url, query)
        .await?
        .ok_or_else(|| EtlError::HttpStatusError {
            status: 404,
            url: url.to_string(),
        })
}

pub fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
