// tests/common/mod.rs
#![allow(dead_code)]

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use nepse_scrape::data::{Row, Schema};
use nepse_scrape::error::{FetchError, SinkError};
use nepse_scrape::poller::{PollSettings, Poller};
use nepse_scrape::sink::Sink;
use nepse_scrape::source::PageSource;
use nepse_scrape::specs::locator::{Signature, TableLocator};

pub const INTERVAL: Duration = Duration::from_secs(60);
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(5);

pub fn schema() -> Schema {
    Schema::new(["Symbol", "LTP", "Volume"]).unwrap()
}

pub fn settings(max_cycles: Option<u64>) -> PollSettings {
    PollSettings {
        url: "https://example.test/live-market".into(),
        interval: INTERVAL,
        fetch_timeout: FETCH_TIMEOUT,
        max_cycles,
        max_pending_batches: 16,
        empty_alert_after: 3,
    }
}

pub fn poller(max_cycles: Option<u64>) -> Poller {
    poller_with(settings(max_cycles))
}

pub fn poller_with(settings: PollSettings) -> Poller {
    Poller::new(
        settings,
        schema(),
        TableLocator::new(Signature {
            exact_class: "table table__lg table-striped".into(),
            marker_tokens: vec!["table__lg".into(), "table-striped".into()],
            min_header_cells: 3,
        }),
    )
}

pub fn row(v: [&str; 3]) -> Row {
    Row::from(v)
}

/// A market page in the current layout.
pub fn page(rows: &[[&str; 3]]) -> String {
    page_with_class("table table__lg table-striped", rows)
}

pub fn page_with_class(class: &str, rows: &[[&str; 3]]) -> String {
    let body: String = rows
        .iter()
        .map(|r| format!("<tr><td>{}</td><td>{}</td><td>{}</td></tr>", r[0], r[1], r[2]))
        .collect();
    format!(
        r#"<html><body><table class="{class}">
             <thead><tr><th>Symbol</th><th>LTP</th><th>Volume</th></tr></thead>
             <tbody>{body}</tbody>
           </table></body></html>"#
    )
}

pub enum Step {
    Page(String),
    /// Page delivered after a delay (paused clock).
    Slow(Duration, String),
    Fail(FetchError),
    /// Never answers.
    Hang,
}

/// Page source that plays back a fixed script, then fails with `Network`.
pub struct ScriptedSource {
    script: VecDeque<Step>,
    origin: Instant,
    /// Offsets (from construction) at which each fetch started.
    pub starts: Vec<Duration>,
    pub closes: usize,
    cancel_on_fetch: Option<(usize, CancellationToken)>,
}

impl ScriptedSource {
    pub fn new(script: impl IntoIterator<Item = Step>) -> Self {
        Self {
            script: script.into_iter().collect(),
            origin: Instant::now(),
            starts: Vec::new(),
            closes: 0,
            cancel_on_fetch: None,
        }
    }

    pub fn pages(pages: impl IntoIterator<Item = String>) -> Self {
        Self::new(pages.into_iter().map(Step::Page))
    }

    /// Fire `token` while serving the `nth` fetch (1-based), i.e. mid-cycle.
    pub fn cancel_during_fetch(mut self, nth: usize, token: CancellationToken) -> Self {
        self.cancel_on_fetch = Some((nth, token));
        self
    }

    pub fn fetches(&self) -> usize {
        self.starts.len()
    }
}

#[async_trait]
impl PageSource for ScriptedSource {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn fetch(&mut self, _url: &str, _timeout: Duration) -> Result<String, FetchError> {
        self.starts.push(self.origin.elapsed());
        if let Some((nth, token)) = &self.cancel_on_fetch {
            if self.starts.len() == *nth {
                token.cancel();
            }
        }
        match self.script.pop_front() {
            Some(Step::Page(html)) => Ok(html),
            Some(Step::Slow(delay, html)) => {
                tokio::time::sleep(delay).await;
                Ok(html)
            }
            Some(Step::Fail(e)) => Err(e),
            Some(Step::Hang) => std::future::pending().await,
            None => Err(FetchError::Network("script exhausted".into())),
        }
    }

    async fn close(&mut self) -> Result<(), FetchError> {
        self.closes += 1;
        Ok(())
    }
}

/// Sink that keeps every delivered batch and can be told to fail.
#[derive(Default)]
pub struct MemorySink {
    pub batches: Vec<Vec<Row>>,
    /// Remaining calls that fail before the sink recovers; `u32::MAX` is "always".
    pub failures_left: u32,
    pub attempts: u32,
}

impl MemorySink {
    pub fn failing(times: u32) -> Self {
        Self { failures_left: times, ..Self::default() }
    }

    pub fn delivered(&self) -> Vec<Row> {
        self.batches.concat()
    }
}

impl Sink for MemorySink {
    fn persist(&mut self, rows: &[Row], _schema: &Schema) -> Result<(), SinkError> {
        self.attempts += 1;
        if self.failures_left > 0 {
            if self.failures_left != u32::MAX {
                self.failures_left -= 1;
            }
            return Err(SinkError::Unavailable("disk full".into()));
        }
        self.batches.push(rows.to_vec());
        Ok(())
    }
}

/// Records of a file written by `CsvSink`: `"`-quoted fields with doubled
/// inner quotes, one record per `\n`.
pub fn read_rows(text: &str, sep: char) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    let mut record = Vec::new();
    let mut field = String::new();
    let mut quoted = false;
    let mut prev = None;

    for ch in text.chars() {
        match (quoted, ch) {
            (true, '"') => quoted = false,
            (false, '"') => {
                if prev == Some('"') {
                    field.push('"');
                }
                quoted = true;
            }
            (false, c) if c == sep => record.push(std::mem::take(&mut field)),
            (false, '\n') => {
                record.push(std::mem::take(&mut field));
                rows.push(std::mem::take(&mut record));
            }
            (_, c) => field.push(c),
        }
        prev = Some(ch);
    }
    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        rows.push(record);
    }
    rows
}
