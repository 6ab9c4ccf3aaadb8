// src/source/mod.rs
//
// Page source providers: something that hands back the raw markup of a URL.
//
// - http:    plain GET; enough when the table is in the served HTML.
// - browser: headless Chromium dump, for tables rendered by page scripts.

pub mod browser;
pub mod http;

use std::time::Duration;

use async_trait::async_trait;

use crate::config::{Config, SourceKind};
use crate::error::FetchError;

pub use browser::BrowserSource;
pub use http::HttpSource;

#[async_trait]
pub trait PageSource: Send {
    /// Short label for logs.
    fn name(&self) -> &'static str;

    /// Raw markup of `url`. Providers should give up after `timeout`; the
    /// poller enforces it from the outside as well.
    async fn fetch(&mut self, url: &str, timeout: Duration) -> Result<String, FetchError>;

    /// Release the session. Called once by the poller on every exit path.
    async fn close(&mut self) -> Result<(), FetchError>;
}

/// Acquire the provider named in `cfg`. Any error here is `Fatal`.
pub async fn open(cfg: &Config) -> Result<Box<dyn PageSource>, FetchError> {
    Ok(match cfg.source {
        SourceKind::Http => Box::new(HttpSource::new()?),
        SourceKind::Browser => Box::new(BrowserSource::open(&cfg.browser_path, cfg.render_budget()).await?),
    })
}
