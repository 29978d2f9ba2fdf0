// src/fetch/mod.rs

use futures::future::try_join_all;
use reqwest::Client;
use std::time::Duration;
use tokio::task;
use tracing::{debug, info, instrument};

use crate::error::{FetchError, PipelineError};

/// Build the shared HTTP client. Google Sheets exports redirect once before
/// serving the CSV body, which reqwest follows by default.
pub fn build_client(timeout: Duration) -> Result<Client, PipelineError> {
    Client::builder()
        .timeout(timeout)
        .user_agent(concat!("devicestats/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| PipelineError::Config(format!("building HTTP client: {}", e)))
}

/// GET `url` and return the raw body.
///
/// A non-2xx status is an error, never an empty body. No retry. The body is
/// not decoded here; undecodable text surfaces as a parse error downstream.
#[instrument(level = "info", skip(client))]
pub async fn fetch_csv_body(client: &Client, url: &str) -> Result<Vec<u8>, FetchError> {
    let resp = client
        .get(url)
        .header(reqwest::header::ACCEPT, "text/csv,text/plain,*/*")
        .send()
        .await
        .map_err(|source| FetchError::Request {
            url: url.to_string(),
            source,
        })?;

    let status = resp.status();
    debug!(%status, "response received");
    if !status.is_success() {
        return Err(FetchError::Status {
            url: url.to_string(),
            status,
        });
    }

    let body = resp.bytes().await.map_err(|source| FetchError::Request {
        url: url.to_string(),
        source,
    })?;
    info!(bytes = body.len(), "fetched CSV body");
    Ok(body.to_vec())
}

/// Fetch several sources concurrently; results come back in input order.
/// The first failure wins.
pub async fn fetch_many(
    client: &Client,
    urls: &[String],
) -> Result<Vec<(String, Vec<u8>)>, PipelineError> {
    let mut handles = Vec::with_capacity(urls.len());

    for url in urls {
        let client = client.clone();
        let url = url.clone();
        handles.push(task::spawn(async move {
            let body = fetch_csv_body(&client, &url).await?;
            Ok::<_, FetchError>((url, body))
        }));
    }

    try_join_all(handles)
        .await?
        .into_iter()
        .map(|res| res.map_err(PipelineError::from))
        .collect()
}
