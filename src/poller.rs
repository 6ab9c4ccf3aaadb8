// src/poller.rs
//! Poll Loop Controller.
//!
//! Owns everything that survives between cycles (snapshot, dataset, pending
//! sink batches) and drives fetch → locate → extract → diff → persist on a
//! fixed interval. A failed cycle is logged and the loop goes on; only a
//! `Fatal` page source error ends it early.

use std::collections::{HashSet, VecDeque};
use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, warn, Instrument};

use crate::config::Config;
use crate::data::{Row, Schema};
use crate::delta::{diff, Diff, Snapshot};
use crate::error::{ConfigError, CycleError, FetchError, PollError};
use crate::sink::Sink;
use crate::source::PageSource;
use crate::specs::locator::{Strategy, TableLocator};
use crate::specs::rows::extract;
use crate::specs::table::Table;
use crate::store::Dataset;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Running,
    Stopped,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PollSettings {
    pub url: String,
    /// Time between cycle starts.
    pub interval: Duration,
    pub fetch_timeout: Duration,
    /// Stop after this many cycles; `None` runs until cancelled.
    pub max_cycles: Option<u64>,
    pub max_pending_batches: usize,
    /// Consecutive empty or not-found cycles before warning. 0 disables.
    pub empty_alert_after: u32,
}

impl PollSettings {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            url: cfg.url.clone(),
            interval: cfg.poll_interval(),
            fetch_timeout: cfg.fetch_timeout(),
            max_cycles: cfg.max_cycles,
            max_pending_batches: cfg.max_pending_batches.max(1),
            empty_alert_after: cfg.empty_alert_after,
        }
    }
}

/// What one successful cycle did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CycleReport {
    pub strategy: Strategy,
    pub extracted: usize,
    pub rejected: usize,
    pub new_rows: usize,
    pub consolidated: usize,
    /// Batches still waiting for the sink after this cycle.
    pub pending: usize,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub cycles: u64,
    pub failed_cycles: u64,
    pub consolidated: usize,
    /// Rows the sink never accepted, even after the final flush.
    pub undelivered: usize,
}

pub struct Poller {
    settings: PollSettings,
    schema: Schema,
    locator: TableLocator,
    phase: Phase,

    snapshot: Option<Snapshot>,
    dataset: Dataset,
    pending: VecDeque<Vec<Row>>,

    empty_streak: u32,
    last_strategy: Option<Strategy>,
    drifted_headers: HashSet<Vec<String>>,
}

impl Poller {
    pub fn new(settings: PollSettings, schema: Schema, locator: TableLocator) -> Self {
        Self {
            settings,
            schema,
            locator,
            phase: Phase::Idle,
            snapshot: None,
            dataset: Dataset::new(),
            pending: VecDeque::new(),
            empty_streak: 0,
            last_strategy: None,
            drifted_headers: HashSet::new(),
        }
    }

    pub fn from_config(cfg: &Config) -> Result<Self, ConfigError> {
        cfg.validate()?;
        Ok(Self::new(PollSettings::from_config(cfg), cfg.schema()?, TableLocator::new(cfg.signature())))
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn snapshot(&self) -> Option<&Snapshot> {
        self.snapshot.as_ref()
    }

    pub fn pending_batches(&self) -> usize {
        self.pending.len()
    }

    pub fn empty_streak(&self) -> u32 {
        self.empty_streak
    }

    /// Run until `cancel` fires, `max_cycles` is reached or the source fails
    /// fatally. The source is closed on every one of those paths.
    pub async fn run<S, K>(&mut self, source: &mut S, sink: &mut K, cancel: CancellationToken) -> Result<RunSummary, PollError>
    where
        S: PageSource + ?Sized,
        K: Sink + ?Sized,
    {
        if self.phase != Phase::Idle {
            return Err(PollError::NotIdle(self.phase));
        }
        self.phase = Phase::Running;
        info!(
            url = %self.settings.url,
            interval_secs = self.settings.interval.as_secs(),
            source = source.name(),
            "polling started"
        );

        let outcome = self.drive(source, sink, &cancel).await;

        if !self.pending.is_empty() {
            self.flush(sink);
        }
        if let Err(e) = source.close().await {
            warn!(error = %e, "page source did not close cleanly");
        }
        self.phase = Phase::Stopped;

        let (cycles, failed_cycles) = outcome?;
        let summary = RunSummary {
            cycles,
            failed_cycles,
            consolidated: self.dataset.len(),
            undelivered: self.pending.iter().map(Vec::len).sum(),
        };
        info!(
            cycles,
            failed_cycles,
            consolidated = summary.consolidated,
            undelivered = summary.undelivered,
            "polling stopped"
        );
        Ok(summary)
    }

    async fn drive<S, K>(&mut self, source: &mut S, sink: &mut K, cancel: &CancellationToken) -> Result<(u64, u64), PollError>
    where
        S: PageSource + ?Sized,
        K: Sink + ?Sized,
    {
        let mut ticker = interval(self.settings.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let (mut cycles, mut failed) = (0u64, 0u64);

        loop {
            if self.settings.max_cycles.is_some_and(|max| cycles >= max) {
                info!(cycles, "cycle limit reached");
                break;
            }
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("stop requested");
                    break;
                }
                _ = ticker.tick() => {}
            }

            cycles += 1;
            let span = info_span!("cycle", n = cycles);
            match self.cycle(source, sink).instrument(span.clone()).await {
                Ok(_) => {}
                Err(e) if e.is_fatal() => {
                    span.in_scope(|| error!(error = %e, "page source failed fatally"));
                    return Err(PollError::Fatal(e));
                }
                Err(e) => {
                    failed += 1;
                    span.in_scope(|| warn!(error = %e, "cycle ended early"));
                }
            }
        }
        Ok((cycles, failed))
    }

    /// One fetch → locate → extract → diff → persist pass against the
    /// retained state. On `Err` nothing but the empty streak has changed.
    pub async fn cycle<S, K>(&mut self, source: &mut S, sink: &mut K) -> Result<CycleReport, CycleError>
    where
        S: PageSource + ?Sized,
        K: Sink + ?Sized,
    {
        let limit = self.settings.fetch_timeout;
        let markup = match tokio::time::timeout(limit, source.fetch(&self.settings.url, limit)).await {
            Ok(res) => res?,
            Err(_) => return Err(FetchError::Timeout(limit).into()),
        };

        let located = match self.locator.locate(&markup) {
            Ok(found) => found,
            Err(e) => {
                self.note_empty();
                return Err(e.into());
            }
        };
        self.note_strategy(located.strategy);
        self.check_headers(&located.table);

        let extraction = extract(&located.table, &self.schema);
        let rejected = extraction.rejected.len();
        let Diff { delta, snapshot } = diff(extraction.rows, self.snapshot.as_ref());
        let extracted = snapshot.len();

        if extracted == 0 {
            self.note_empty();
        } else {
            self.empty_streak = 0;
        }

        let new_rows = delta.len();
        if !delta.is_empty() {
            self.dataset.append(&delta);
            self.enqueue(delta);
        }
        if !self.pending.is_empty() {
            self.flush(sink);
        }
        self.snapshot = Some(snapshot);

        let report = CycleReport {
            strategy: located.strategy,
            extracted,
            rejected,
            new_rows,
            consolidated: self.dataset.len(),
            pending: self.pending.len(),
        };
        info!(
            strategy = %report.strategy,
            extracted,
            rejected,
            new_rows,
            consolidated = report.consolidated,
            pending = report.pending,
            "cycle complete"
        );
        Ok(report)
    }

    fn enqueue(&mut self, batch: Vec<Row>) {
        self.pending.push_back(batch);
        while self.pending.len() > self.settings.max_pending_batches {
            if let Some(dropped) = self.pending.pop_front() {
                error!(rows = dropped.len(), "sink backlog full, oldest undelivered batch dropped");
            }
        }
    }

    /// Deliver pending batches oldest first; stop at the first failure.
    fn flush<K: Sink + ?Sized>(&mut self, sink: &mut K) {
        while let Some(batch) = self.pending.front() {
            match sink.persist(batch, &self.schema) {
                Ok(()) => {
                    self.pending.pop_front();
                }
                Err(e) => {
                    warn!(error = %e, pending = self.pending.len(), "sink failed, batch kept for retry");
                    break;
                }
            }
        }
    }

    fn note_empty(&mut self) {
        self.empty_streak = self.empty_streak.saturating_add(1);
        let alert = self.settings.empty_alert_after;
        if alert > 0 && self.empty_streak == alert {
            warn!(streak = self.empty_streak, "no rows for several consecutive cycles, possible page breakage");
        }
    }

    fn note_strategy(&mut self, strategy: Strategy) {
        let previous = self.last_strategy.replace(strategy);
        let drifted = match previous {
            None => strategy != Strategy::ExactSignature,
            Some(prev) => prev != strategy,
        };
        if drifted {
            warn!(
                strategy = %strategy,
                previous = previous.map(|p| p.as_str()).unwrap_or("none"),
                "table located by a different strategy, page layout may have changed"
            );
        }
    }

    fn check_headers(&mut self, table: &Table<'_>) {
        let headers = table.header_cells();
        if headers.is_empty() || headers.len() == self.schema.len() {
            return;
        }
        if self.drifted_headers.insert(headers.clone()) {
            warn!(
                found = headers.len(),
                expected = self.schema.len(),
                headers = ?headers,
                "table header does not match schema width"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SinkError;
    use crate::specs::locator::Signature;
    use async_trait::async_trait;
    use tracing_test::traced_test;

    struct Scripted(VecDeque<Result<String, FetchError>>);

    #[async_trait]
    impl PageSource for Scripted {
        fn name(&self) -> &'static str {
            "scripted"
        }
        async fn fetch(&mut self, _url: &str, _timeout: Duration) -> Result<String, FetchError> {
            self.0.pop_front().unwrap_or_else(|| Err(FetchError::Network(s!("script exhausted"))))
        }
        async fn close(&mut self) -> Result<(), FetchError> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct Memory {
        batches: Vec<Vec<Row>>,
        down: bool,
    }

    impl Sink for Memory {
        fn persist(&mut self, rows: &[Row], _schema: &Schema) -> Result<(), SinkError> {
            if self.down {
                return Err(SinkError::Unavailable(s!("down")));
            }
            self.batches.push(rows.to_vec());
            Ok(())
        }
    }

    fn poller(max_pending: usize, alert: u32) -> Poller {
        Poller::new(
            PollSettings {
                url: s!("https://example.test/live-market"),
                interval: Duration::from_secs(60),
                fetch_timeout: Duration::from_secs(5),
                max_cycles: None,
                max_pending_batches: max_pending,
                empty_alert_after: alert,
            },
            Schema::new(["Symbol", "LTP", "Volume"]).unwrap(),
            TableLocator::new(Signature {
                exact_class: s!("market"),
                marker_tokens: strings!["market-v2"],
                min_header_cells: 3,
            }),
        )
    }

    fn page(class: &str, headers: &[&str], rows: &[[&str; 3]]) -> Result<String, FetchError> {
        let head: String = headers.iter().map(|h| format!("<th>{h}</th>")).collect();
        let body: String = rows
            .iter()
            .map(|r| format!("<tr><td>{}</td><td>{}</td><td>{}</td></tr>", r[0], r[1], r[2]))
            .collect();
        Ok(format!(r#"<table class="{class}"><thead><tr>{head}</tr></thead><tbody>{body}</tbody></table>"#))
    }

    const H: &[&str] = &["Symbol", "LTP", "Volume"];

    #[tokio::test]
    async fn pending_batches_are_retried_in_order_once_sink_recovers() {
        let mut p = poller(8, 0);
        let mut src = Scripted(VecDeque::from([
            page("market", H, &[["A", "1", "1"]]),
            page("market", H, &[["B", "2", "2"]]),
            page("market", H, &[["B", "2", "2"]]),
        ]));
        let mut sink = Memory { down: true, ..Memory::default() };

        assert_eq!(p.cycle(&mut src, &mut sink).await.unwrap().pending, 1);
        assert_eq!(p.cycle(&mut src, &mut sink).await.unwrap().pending, 2);
        assert_eq!(p.dataset().len(), 2);

        sink.down = false;
        let report = p.cycle(&mut src, &mut sink).await.unwrap();
        assert_eq!((report.new_rows, report.pending), (0, 0));
        assert_eq!(sink.batches, vec![vec![Row::from(["A", "1", "1"])], vec![Row::from(["B", "2", "2"])]]);
    }

    #[tokio::test]
    #[traced_test]
    async fn backlog_bound_drops_oldest_batch() {
        let mut p = poller(2, 0);
        let mut src = Scripted(VecDeque::from([
            page("market", H, &[["A", "1", "1"]]),
            page("market", H, &[["B", "2", "2"]]),
            page("market", H, &[["C", "3", "3"]]),
        ]));
        let mut sink = Memory { down: true, ..Memory::default() };
        for _ in 0..3 {
            p.cycle(&mut src, &mut sink).await.unwrap();
        }
        assert_eq!(p.pending_batches(), 2);
        assert_eq!(p.dataset().len(), 3);
        assert!(logs_contain("oldest undelivered batch dropped"));

        sink.down = false;
        p.flush(&mut sink);
        assert_eq!(sink.batches, vec![vec![Row::from(["B", "2", "2"])], vec![Row::from(["C", "3", "3"])]]);
    }

    #[tokio::test]
    #[traced_test]
    async fn empty_streak_alerts_once_and_resets_on_rows() {
        let mut p = poller(8, 2);
        let mut src = Scripted(VecDeque::from([
            page("market", H, &[]),
            Ok(s!("<p>maintenance</p>")),
            Err(FetchError::Network(s!("reset"))),
            page("market", H, &[]),
            page("market", H, &[["A", "1", "1"]]),
        ]));
        let mut sink = Memory::default();

        p.cycle(&mut src, &mut sink).await.unwrap();
        assert!(p.cycle(&mut src, &mut sink).await.is_err());
        assert_eq!(p.empty_streak(), 2);
        assert!(logs_contain("possible page breakage"));

        // A retrieval failure neither counts nor resets.
        assert!(p.cycle(&mut src, &mut sink).await.is_err());
        assert_eq!(p.empty_streak(), 2);

        p.cycle(&mut src, &mut sink).await.unwrap();
        assert_eq!(p.empty_streak(), 3);
        p.cycle(&mut src, &mut sink).await.unwrap();
        assert_eq!(p.empty_streak(), 0);
        logs_assert(|lines| {
            match lines.iter().filter(|l| l.contains("possible page breakage")).count() {
                1 => Ok(()),
                n => Err(format!("expected one alert, saw {n}")),
            }
        });
    }

    #[tokio::test]
    #[traced_test]
    async fn strategy_change_is_reported_as_drift() {
        let mut p = poller(8, 0);
        let mut src = Scripted(VecDeque::from([
            page("market", H, &[["A", "1", "1"]]),
            page("market", H, &[["A", "1", "1"]]),
            page("x market-v2 y", H, &[["A", "1", "1"]]),
        ]));
        let mut sink = Memory::default();

        p.cycle(&mut src, &mut sink).await.unwrap();
        p.cycle(&mut src, &mut sink).await.unwrap();
        assert!(!logs_contain("page layout may have changed"));

        let report = p.cycle(&mut src, &mut sink).await.unwrap();
        assert_eq!(report.strategy, Strategy::MarkerTokens);
        assert_eq!(report.new_rows, 0);
        assert!(logs_contain("page layout may have changed"));
    }

    #[tokio::test]
    #[traced_test]
    async fn header_width_mismatch_is_warned_once_per_header_set() {
        let mut p = poller(8, 0);
        let wide = &["Symbol", "LTP", "Volume", "Turnover"];
        let mut src = Scripted(VecDeque::from([
            page("market", wide, &[["A", "1", "1"]]),
            page("market", wide, &[["A", "1", "1"]]),
        ]));
        let mut sink = Memory::default();
        p.cycle(&mut src, &mut sink).await.unwrap();
        p.cycle(&mut src, &mut sink).await.unwrap();
        logs_assert(|lines| {
            match lines.iter().filter(|l| l.contains("table header does not match schema width")).count() {
                1 => Ok(()),
                n => Err(format!("expected one warning, saw {n}")),
            }
        });
    }

    #[tokio::test]
    async fn failed_cycle_leaves_state_untouched() {
        let mut p = poller(8, 0);
        let mut src = Scripted(VecDeque::from([
            page("market", H, &[["A", "1", "1"]]),
            Err(FetchError::Status { status: 502, url: s!("u") }),
            Ok(s!("<div>no table</div>")),
        ]));
        let mut sink = Memory::default();
        p.cycle(&mut src, &mut sink).await.unwrap();
        let before = p.snapshot().cloned();

        assert!(matches!(p.cycle(&mut src, &mut sink).await, Err(CycleError::Fetch(_))));
        assert!(matches!(p.cycle(&mut src, &mut sink).await, Err(CycleError::NotFound(_))));
        assert_eq!(p.snapshot().cloned(), before);
        assert_eq!(p.dataset().len(), 1);
        assert_eq!(sink.batches.len(), 1);
    }
}
