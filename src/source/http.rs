// src/source/http.rs
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use super::PageSource;
use crate::config::consts::USER_AGENT;
use crate::error::FetchError;

pub struct HttpSource {
    client: Client,
}

impl HttpSource {
    pub fn new() -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| FetchError::Fatal(format!("cannot build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageSource for HttpSource {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn fetch(&mut self, url: &str, timeout: Duration) -> Result<String, FetchError> {
        let resp = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| classify(e, timeout))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status { status: status.as_u16(), url: s!(url) });
        }

        let body = resp.text().await.map_err(|e| classify(e, timeout))?;
        debug!(bytes = body.len(), "page fetched");
        Ok(body)
    }

    async fn close(&mut self) -> Result<(), FetchError> {
        Ok(())
    }
}

fn classify(e: reqwest::Error, timeout: Duration) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout(timeout)
    } else if e.is_builder() {
        // A URL reqwest refuses will never work on a later cycle either.
        FetchError::Fatal(format!("unusable request: {e}"))
    } else {
        FetchError::Network(e.to_string())
    }
}
