//! Page fetching. The source only needs "give me the bytes at this URL within this timeout".

use std::time::Duration;

use crate::error::LookupError;

pub trait Fetcher: Send + Sync {
    /// Fetch `url`, failing on transport errors, timeouts and non-success statuses.
    fn fetch(&self, url: &str, timeout: Duration) -> Result<Vec<u8>, LookupError>;
}

/// Blocking reqwest client with gzip enabled.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new(user_agent: &str) -> Result<Self, LookupError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(user_agent)
            .gzip(true)
            .build()
            .map_err(|e| LookupError::Client(e.to_string()))?;
        Ok(Self { client })
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str, timeout: Duration) -> Result<Vec<u8>, LookupError> {
        tracing::debug!(url, timeout_secs = timeout.as_secs(), "fetching");
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .map_err(|e| transport_error(url, timeout, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LookupError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().map_err(|e| transport_error(url, timeout, e))?;
        Ok(body.to_vec())
    }
}

fn transport_error(url: &str, timeout: Duration, e: reqwest::Error) -> LookupError {
    if e.is_timeout() {
        LookupError::Timeout {
            url: url.to_string(),
            seconds: timeout.as_secs(),
        }
    } else {
        LookupError::Network {
            url: url.to_string(),
            message: e.to_string(),
        }
    }
}
