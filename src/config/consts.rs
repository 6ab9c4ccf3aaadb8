// src/config/consts.rs

// Target
pub const DEFAULT_URL: &str = "https://nepalstock.com/live-market";
pub const DEFAULT_SCHEMA: &[&str] = &[
    "SN",
    "Symbol",
    "LTP",
    "LTV",
    "Point Change",
    "% Change",
    "Open Price",
    "High Price",
    "Low Price",
    "Avg Traded Price",
    "Volume",
    "Previous Closing",
];

// Locator signature, last observed page version
pub const EXACT_CLASS: &str = "table table__lg table-striped table__border table__border--bottom";
pub const MARKER_TOKENS: &[&str] = &["table__lg", "table-striped"];
pub const MIN_HEADER_CELLS: usize = 6;

// Export
pub const DEFAULT_OUT_DIR: &str = "out";
pub const DEFAULT_PREFIX: &str = "nepse_live_market";
pub const CONSOLIDATED_SUFFIX: &str = "consolidated";
pub const STAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

// Polling
pub const POLL_INTERVAL_SECS: u64 = 60;
pub const FETCH_TIMEOUT_SECS: u64 = 30;
pub const MAX_PENDING_BATCHES: usize = 32;
pub const EMPTY_ALERT_AFTER: u32 = 5;

// Browser source
pub const BROWSER_PATH: &str = "chromium";
pub const RENDER_BUDGET_MS: u64 = 10_000;
pub const USER_AGENT: &str = concat!("nepse_scrape/", env!("CARGO_PKG_VERSION"));
