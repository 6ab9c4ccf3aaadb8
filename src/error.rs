// src/error.rs
use std::{io, path::PathBuf, time::Duration};

use thiserror::Error;

use crate::poller::Phase;

/// Page retrieval failures. Only `Fatal` escapes the poll loop.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("page retrieval timed out after {0:?}")]
    Timeout(Duration),

    #[error("network error: {0}")]
    Network(String),

    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    #[error("render failed: {0}")]
    Render(String),

    /// The page source cannot be used at all (e.g. the browser binary will not start).
    #[error("page source unavailable: {0}")]
    Fatal(String),
}

impl FetchError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, FetchError::Fatal(_))
    }
}

/// No strategy of the locator recognised a market table.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("market table not found ({tables_seen} table(s) on page)")]
pub struct NotFound {
    pub tables_seen: usize,
}

/// Why a cycle ended early.
#[derive(Error, Debug)]
pub enum CycleError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    NotFound(#[from] NotFound),
}

impl CycleError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, CycleError::Fetch(e) if e.is_fatal())
    }
}

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("cannot write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("sink unavailable: {0}")]
    Unavailable(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Error, Debug)]
pub enum PollError {
    #[error("poller can only start from Idle (currently {0:?})")]
    NotIdle(Phase),

    #[error("fatal cycle failure: {0}")]
    Fatal(#[source] CycleError),
}
