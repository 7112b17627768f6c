use std::time::Duration;

use reqwest::{Client, StatusCode};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {error}")]
    Request { url: String, error: reqwest::Error },
    #[error("unexpected status {status} from {url}")]
    Status { url: String, status: StatusCode },
}

pub fn build_http_client(request_timeout: Duration) -> reqwest::Result<Client> {
    Client::builder()
        .user_agent("storm-producer")
        .timeout(request_timeout)
        .build()
}

/// Download one feed. Anything but a 200 is an error.
pub async fn fetch_feed(client: &Client, url: &str) -> Result<Vec<u8>, FetchError> {
    let request_error = |error| FetchError::Request {
        url: url.to_string(),
        error,
    };

    let response = client.get(url).send().await.map_err(request_error)?;
    let status = response.status();
    debug!(url, %status, "Fetched storm report feed");

    if status != StatusCode::OK {
        return Err(FetchError::Status {
            url: url.to_string(),
            status,
        });
    }

    let body = response.bytes().await.map_err(request_error)?;
    Ok(body.to_vec())
}
