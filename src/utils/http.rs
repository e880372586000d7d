// src/utils/http.rs

//! HTTP client utilities.

use std::time::Duration;

use reqwest::Client;

use crate::error::{FetchError, Result};
use crate::models::ScannerConfig;

/// Create a configured asynchronous HTTP client.
pub fn create_async_client(config: &ScannerConfig) -> Result<Client> {
    let client = Client::builder()
        .user_agent(&config.user_agent)
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .build()?;
    Ok(client)
}

/// Fetch a page body, retrying transient failures.
///
/// Attempt `n` waits `n` seconds before the next one.
pub async fn fetch_text(
    client: &Client,
    url: &str,
    attempts: u32,
) -> std::result::Result<String, FetchError> {
    let attempts = attempts.max(1);
    let mut attempt = 1;
    loop {
        match fetch_once(client, url).await {
            Ok(body) => return Ok(body),
            Err(e) if attempt < attempts && is_transient(&e) => {
                log::warn!("Fetch {} failed ({}/{}): {}", url, attempt, attempts, e);
                tokio::time::sleep(Duration::from_secs(u64::from(attempt))).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

async fn fetch_once(client: &Client, url: &str) -> std::result::Result<String, FetchError> {
    let http_err = |source| FetchError::Http {
        url: url.to_string(),
        source,
    };

    let response = client.get(url).send().await.map_err(http_err)?;
    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }
    response.text().await.map_err(http_err)
}

fn is_transient(error: &FetchError) -> bool {
    match error {
        FetchError::Http { .. } | FetchError::Timeout(_) => true,
        FetchError::Status { status, .. } => *status == 429 || *status >= 500,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_client() {
        assert!(create_async_client(&ScannerConfig::default()).is_ok());
    }

    #[test]
    fn test_transient_statuses() {
        let status = |code| FetchError::Status {
            url: "https://example.com".into(),
            status: code,
        };
        assert!(is_transient(&status(503)));
        assert!(is_transient(&status(429)));
        assert!(!is_transient(&status(404)));
        assert!(!is_transient(&FetchError::shape("wbm", "missing list")));
    }
}
