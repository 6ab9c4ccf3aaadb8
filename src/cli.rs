// src/cli.rs
use std::path::PathBuf;

use clap::Parser;
use color_eyre::eyre::{Result, WrapErr};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::{Config, ExportFormat, SourceKind};
use crate::poller::Poller;
use crate::sink::CsvSink;

/// Poll the NEPSE live market table and keep only what changed.
#[derive(Parser, Debug, Default)]
#[command(name = "nepse_scrape", version, about)]
pub struct Args {
    /// TOML config file; flags below override it.
    #[arg(short, long, env = "NEPSE_SCRAPE_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Page holding the market table.
    #[arg(long)]
    pub url: Option<String>,

    /// Seconds between cycle starts.
    #[arg(short, long, value_name = "SECS")]
    pub interval: Option<u64>,

    /// Give up on a page fetch after this many seconds.
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Output directory.
    #[arg(short, long, value_name = "DIR")]
    pub out: Option<PathBuf>,

    /// Output file name prefix.
    #[arg(long)]
    pub prefix: Option<String>,

    #[arg(long, value_enum)]
    pub format: Option<ExportFormat>,

    /// How pages are fetched.
    #[arg(long, value_enum)]
    pub source: Option<SourceKind>,

    /// Chromium-family binary used by `--source browser`.
    #[arg(long, value_name = "PATH")]
    pub browser_path: Option<String>,

    /// Stop after N cycles instead of running until interrupted.
    #[arg(long, value_name = "N")]
    pub max_cycles: Option<u64>,

    /// Log one JSON object per event.
    #[arg(long, env = "NEPSE_SCRAPE_LOG_JSON")]
    pub log_json: bool,
}

impl Args {
    /// Overlay the flags that were given onto `cfg`.
    pub fn apply(&self, cfg: &mut Config) {
        if let Some(url) = &self.url {
            cfg.url = url.clone();
        }
        if let Some(secs) = self.interval {
            cfg.poll_interval_seconds = secs;
        }
        if let Some(secs) = self.timeout {
            cfg.fetch_timeout_seconds = secs;
        }
        if let Some(dir) = &self.out {
            cfg.output_directory = dir.clone();
        }
        if let Some(prefix) = &self.prefix {
            cfg.file_prefix = prefix.clone();
        }
        if let Some(format) = self.format {
            cfg.format = format;
        }
        if let Some(source) = self.source {
            cfg.source = source;
        }
        if let Some(path) = &self.browser_path {
            cfg.browser_path = path.clone();
        }
        if self.max_cycles.is_some() {
            cfg.max_cycles = self.max_cycles;
        }
    }

    /// Effective, validated configuration.
    pub fn resolve(&self) -> Result<Config> {
        let mut cfg = Config::load(self.config.as_deref()).wrap_err("loading configuration")?;
        self.apply(&mut cfg);
        cfg.validate()?;
        Ok(cfg)
    }
}

pub async fn run() -> Result<()> {
    run_with(Args::parse()).await
}

pub async fn run_with(args: Args) -> Result<()> {
    crate::log::init_tracing(args.log_json);
    let cfg = args.resolve()?;

    let mut poller = Poller::from_config(&cfg)?;
    let mut sink = CsvSink::new(&cfg.output_directory, cfg.file_prefix.clone(), cfg.format)?;
    info!(out = %sink.dir().display(), consolidated = %sink.consolidated_path().display(), "writing output");

    // From here on the poller owns closing the source.
    let mut source = crate::source::open(&cfg).await.wrap_err("opening page source")?;

    let cancel = CancellationToken::new();
    spawn_shutdown_listener(cancel.clone());

    let summary = poller
        .run(source.as_mut(), &mut sink, cancel)
        .await
        .wrap_err("polling aborted")?;

    if summary.undelivered > 0 {
        warn!(rows = summary.undelivered, "some new rows were never written to disk");
    }
    Ok(())
}

fn spawn_shutdown_listener(cancel: CancellationToken) {
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("interrupt received, stopping at the next cycle boundary");
        cancel.cancel();
    });
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        if let Ok(mut term) = signal(SignalKind::terminate()) {
            tokio::select! {
                res = tokio::signal::ctrl_c() => {
                    if res.is_err() {
                        term.recv().await;
                    }
                }
                _ = term.recv() => {}
            }
            return;
        }
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "cannot listen for Ctrl-C; stop with --max-cycles or kill");
        std::future::pending::<()>().await;
    }
}
