//! Per-run result files under a timestamped output directory.
//!
//! Every line is flushed as it is written, so an interrupted run leaves
//! complete files behind.

use crate::error::{Result, StoreError};
use crate::lines::load_lines;
use chrono::{DateTime, Local};
use mailprobe_core::{ProbeTarget, Score, ScoreBand};
use std::path::{Path, PathBuf};
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// A truncated-on-open result file written one line at a time.
#[derive(Debug)]
pub struct LineSink {
    path: PathBuf,
    file: Mutex<File>,
}

impl LineSink {
    /// Create (or truncate) the file.
    pub async fn create(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = File::create(&path).await.map_err(StoreError::io(&path))?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    /// Append one line and flush it.
    pub async fn write_line(&self, line: &str) -> Result<()> {
        let mut file = self.file.lock().await;
        file.write_all(format!("{line}\n").as_bytes())
            .await
            .map_err(StoreError::io(&self.path))?;
        file.flush().await.map_err(StoreError::io(&self.path))?;
        Ok(())
    }

    /// Flush and sync to disk.
    pub async fn close(&self) -> Result<()> {
        let mut file = self.file.lock().await;
        file.flush().await.map_err(StoreError::io(&self.path))?;
        file.sync_all().await.map_err(StoreError::io(&self.path))?;
        Ok(())
    }

    /// Backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// The `results_<timestamp>` directory for one run.
#[derive(Debug, Clone)]
pub struct RunDirectory {
    path: PathBuf,
}

impl RunDirectory {
    /// Create `results_<YYYY-MM-DD_HH-MM-SS>` under `root`.
    pub async fn create(root: &Path, started_at: DateTime<Local>) -> Result<Self> {
        let name = format!("results_{}", started_at.format("%Y-%m-%d_%H-%M-%S"));
        let path = root.join(name);
        fs::create_dir_all(&path)
            .await
            .map_err(StoreError::io(&path))?;
        Ok(Self { path })
    }

    /// Reopen the directory of an earlier run, e.g. to score the free
    /// addresses an interrupted run found.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let meta = fs::metadata(&path).await.map_err(StoreError::io(&path))?;
        if !meta.is_dir() {
            return Err(StoreError::io(&path)(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "not a directory",
            )));
        }
        Ok(Self { path })
    }

    /// Directory path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open the availability sinks.
    pub async fn availability_sinks(&self) -> Result<AvailabilitySinks> {
        Ok(AvailabilitySinks {
            available: LineSink::create(self.path.join("available.txt")).await?,
            busy: LineSink::create(self.path.join("busy.txt")).await?,
        })
    }

    /// Open the reputation sinks.
    pub async fn reputation_sinks(&self) -> Result<ReputationSinks> {
        Ok(ReputationSinks {
            good: LineSink::create(self.path.join("reputation_good.txt")).await?,
            medium: LineSink::create(self.path.join("reputation_medium.txt")).await?,
            bad: LineSink::create(self.path.join("reputation_bad.txt")).await?,
            retry_failed: LineSink::create(self.path.join("reputation_retry_failed.txt")).await?,
            errors: LineSink::create(self.path.join("reputation_errors.txt")).await?,
        })
    }

    /// Addresses listed in this run's `available.txt`, in file order.
    pub async fn available_addresses(&self) -> Result<Vec<ProbeTarget>> {
        let lines = load_lines(&self.path.join("available.txt")).await?;
        Ok(lines
            .iter()
            .filter_map(|l| l.split(':').next())
            .filter_map(|a| ProbeTarget::parse(a).ok())
            .collect())
    }
}

/// `available.txt` and `busy.txt`.
#[derive(Debug)]
pub struct AvailabilitySinks {
    available: LineSink,
    busy: LineSink,
}

impl AvailabilitySinks {
    /// Record a free address with its generated credential.
    pub async fn record_free(&self, target: &ProbeTarget, password: &str) -> Result<()> {
        self.available
            .write_line(&format!("{target}:{password}"))
            .await
    }

    /// Record a taken (or undecided) address.
    pub async fn record_busy(&self, target: &ProbeTarget) -> Result<()> {
        self.busy.write_line(target.as_str()).await
    }

    /// Flush and sync both files.
    pub async fn close(&self) -> Result<()> {
        self.available.close().await?;
        self.busy.close().await
    }
}

/// Reputation result files.
#[derive(Debug)]
pub struct ReputationSinks {
    good: LineSink,
    medium: LineSink,
    bad: LineSink,
    retry_failed: LineSink,
    errors: LineSink,
}

impl ReputationSinks {
    /// Route a score to its band file. Zero goes to the retry-failed file.
    ///
    /// Returns the band written, if any.
    pub async fn record_score(
        &self,
        target: &ProbeTarget,
        score: Score,
    ) -> Result<Option<ScoreBand>> {
        let Some(band) = score.band() else {
            self.record_failed(target).await?;
            return Ok(None);
        };
        let sink = match band {
            ScoreBand::Good => &self.good,
            ScoreBand::Medium => &self.medium,
            ScoreBand::Bad => &self.bad,
        };
        sink.write_line(&format!("{target}:{score}")).await?;
        Ok(Some(band))
    }

    /// Record an address that could not be scored.
    pub async fn record_failed(&self, target: &ProbeTarget) -> Result<()> {
        self.retry_failed.write_line(target.as_str()).await
    }

    /// Record an unexpected error while scoring.
    pub async fn record_error(&self, target: &ProbeTarget, detail: &str) -> Result<()> {
        let detail = detail.replace('\n', " ");
        self.errors
            .write_line(&format!("{target} | EXC | {detail}"))
            .await
    }

    /// Flush and sync every file.
    pub async fn close(&self) -> Result<()> {
        for sink in [
            &self.good,
            &self.medium,
            &self.bad,
            &self.retry_failed,
            &self.errors,
        ] {
            sink.close().await?;
        }
        Ok(())
    }
}
