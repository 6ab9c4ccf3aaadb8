// src/source/browser.rs
//
// Headless Chromium as a page source. Each fetch is one short-lived
// `--dump-dom` run; the session itself is the private profile directory,
// which lives until `close` (or drop).

use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::process::Command;
use tracing::{debug, info};

use super::PageSource;
use crate::error::FetchError;

pub struct BrowserSource {
    binary: PathBuf,
    render_budget: Duration,
    profile: Option<TempDir>,
}

impl BrowserSource {
    /// Check that `binary` runs at all and set up the profile directory.
    pub async fn open(binary: impl AsRef<Path>, render_budget: Duration) -> Result<Self, FetchError> {
        let binary = binary.as_ref().to_path_buf();
        let out = Command::new(&binary)
            .arg("--version")
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| FetchError::Fatal(format!("cannot start {}: {e}", binary.display())))?;
        if !out.status.success() {
            return Err(FetchError::Fatal(format!("{} --version exited with {}", binary.display(), out.status)));
        }

        let profile = tempfile::Builder::new()
            .prefix("nepse_scrape-profile-")
            .tempdir()
            .map_err(|e| FetchError::Fatal(format!("cannot create browser profile: {e}")))?;

        let version = String::from_utf8_lossy(&out.stdout);
        info!(browser = version.trim(), profile = %profile.path().display(), "browser session opened");
        Ok(Self { binary, render_budget, profile: Some(profile) })
    }

    pub fn profile_dir(&self) -> Option<&Path> {
        self.profile.as_ref().map(TempDir::path)
    }

    pub fn is_closed(&self) -> bool {
        self.profile.is_none()
    }

    fn command(&self, profile: &Path, url: &str) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.args(["--headless", "--no-sandbox", "--disable-dev-shm-usage", "--disable-gpu", "--no-first-run"])
            .arg(format!("--user-data-dir={}", profile.display()))
            .arg(format!("--virtual-time-budget={}", self.render_budget.as_millis()))
            .arg("--dump-dom")
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl PageSource for BrowserSource {
    fn name(&self) -> &'static str {
        "browser"
    }

    async fn fetch(&mut self, url: &str, timeout: Duration) -> Result<String, FetchError> {
        let Some(profile) = self.profile.as_ref() else {
            return Err(FetchError::Fatal(s!("browser session already closed")));
        };

        // Dropping the output future on timeout kills the child.
        let out = match tokio::time::timeout(timeout, self.command(profile.path(), url).output()).await {
            Err(_) => return Err(FetchError::Timeout(timeout)),
            Ok(Err(e)) if e.kind() == io::ErrorKind::NotFound => {
                return Err(FetchError::Fatal(format!("{} is gone: {e}", self.binary.display())));
            }
            Ok(Err(e)) => return Err(FetchError::Render(e.to_string())),
            Ok(Ok(out)) => out,
        };

        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr);
            let last = stderr.lines().rev().find(|l| !l.trim().is_empty()).unwrap_or("");
            return Err(FetchError::Render(format!("exit {}: {}", out.status, last.trim())));
        }

        let dom = String::from_utf8_lossy(&out.stdout).into_owned();
        debug!(bytes = dom.len(), "dom dumped");
        Ok(dom)
    }

    async fn close(&mut self) -> Result<(), FetchError> {
        let Some(profile) = self.profile.take() else {
            return Ok(());
        };
        let path = profile.path().to_path_buf();
        profile
            .close()
            .map_err(|e| FetchError::Render(format!("cannot remove profile {}: {e}", path.display())))?;
        info!("browser session closed");
        Ok(())
    }
}
