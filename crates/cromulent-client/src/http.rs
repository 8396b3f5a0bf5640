//! Request plumbing shared by the clients.

use std::fmt;
use std::time::Duration;

use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use tracing::{debug, trace};

use crate::error::{error_message, ClientError, Result};

pub(crate) fn build_client(timeout_secs: u64) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?)
}

/// Body of a rejected request; an unreadable body becomes empty so the
/// status still surfaces.
fn error_body<E: fmt::Display>(body: std::result::Result<String, E>, url: &str) -> String {
    body.unwrap_or_else(|e| {
        debug!(url, error = %e, "failed to read error response body");
        String::new()
    })
}

/// Send `request` and decode a JSON body. `url` is the request URL without
/// credentials, used in errors.
pub(crate) async fn send_json<T: DeserializeOwned>(request: RequestBuilder, url: &str) -> Result<T> {
    let response = request.send().await.map_err(|e| ClientError::from_request(url, e))?;
    let status = response.status();
    trace!(url, status = status.as_u16(), "response");

    if !status.is_success() {
        let body = error_body(response.text().await, url);
        return Err(ClientError::Status {
            status: status.as_u16(),
            url: url.to_string(),
            message: error_message(&body),
        });
    }

    let body = response.text().await?;
    Ok(serde_json::from_str(&body)?)
}
