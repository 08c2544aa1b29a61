//! `mailprobe` - checks mailbox availability on provider signup forms and
//! scores the free addresses on a reputation page.

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use mailprobe_browser::{ChromiumFactory, SessionFactory};
use mailprobe_core::AppConfig;
use mailprobe_scanner::{BatchCoordinator, BrowserGauge, ReputationSummary, RunSummary};
use mailprobe_store::{CacheStore, PendingList, RunDirectory};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Command-line options. Anything given here wins over the config file.
#[derive(Parser, Debug)]
#[command(
    name = "mailprobe",
    version,
    about = "Check mailbox availability on signup forms and score the free ones"
)]
struct Cli {
    /// Config file (default: ~/.config/mailprobe/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Pending-work list to read and rewrite
    #[arg(long)]
    pending_file: Option<PathBuf>,

    /// Check at most this many targets (0 = all)
    #[arg(long)]
    limit: Option<usize>,

    /// Targets per batch
    #[arg(long)]
    batch_size: Option<usize>,

    /// Stop after the availability phase
    #[arg(long)]
    skip_reputation: bool,

    /// Skip availability and score the free addresses of an earlier
    /// `results_*` directory, e.g. one left by an interrupted run
    #[arg(long, value_name = "DIR", conflicts_with = "skip_reputation")]
    score_dir: Option<PathBuf>,

    /// Run the browser without a window
    #[arg(long)]
    headless: bool,

    /// Write the default config file and exit
    #[arg(long)]
    init_config: bool,
}

impl Cli {
    fn config_path(&self) -> Result<PathBuf> {
        match &self.config {
            Some(path) => Ok(path.clone()),
            None => AppConfig::config_path().context("locating config directory"),
        }
    }

    fn load_config(&self) -> Result<AppConfig> {
        let config = match &self.config {
            Some(path) => AppConfig::load_from(path)
                .with_context(|| format!("loading config from {}", path.display()))?,
            None => AppConfig::load().context("loading config")?,
        };

        let mut config = config.with_env_overrides();
        if let Some(path) = &self.pending_file {
            config.general.pending_file = path.clone();
        }
        if let Some(limit) = self.limit {
            config.general.limit = limit;
        }
        if let Some(size) = self.batch_size {
            config.general.batch_size = size;
        }
        if self.skip_reputation {
            config.reputation.enabled = false;
        }
        if self.headless {
            config.browser.headless = true;
        }

        config.validate().context("invalid configuration")?;
        Ok(config)
    }
}

fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,mailprobe=debug"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .init();
}

/// Cancel the run on Ctrl+C. Loops notice at their next tick, results
/// already written stay on disk.
fn cancel_on_ctrl_c(cancel: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                warn!("interrupt received, stopping after the current step");
                cancel.cancel();
            }
            Err(e) => warn!("cannot listen for Ctrl+C: {}", e),
        }
    });
}

fn log_availability(summary: &RunSummary) {
    info!(
        "availability: {} queued, {} free, {} busy ({} after failed attempts), {} cached, {} pending lines pruned, {} domain runs failed",
        summary.queued,
        summary.free,
        summary.busy,
        summary.forced_busy,
        summary.skipped_cached,
        summary.pruned_lines,
        summary.failed_domains
    );
}

fn log_reputation(summary: &ReputationSummary) {
    info!(
        "reputation: {} good, {} medium, {} bad, {} from cache, {} unscored, {} errors",
        summary.good, summary.medium, summary.bad, summary.cached, summary.failed, summary.errors
    );
}

/// Score the free addresses listed in `run_dir`.
async fn score_run<F>(
    coordinator: &BatchCoordinator<F>,
    factory: Arc<F>,
    config: &AppConfig,
    run_dir: &RunDirectory,
    cancel: &CancellationToken,
) -> Result<()>
where
    F: SessionFactory,
{
    let targets = run_dir
        .available_addresses()
        .await
        .context("reading free addresses")?;
    if targets.is_empty() {
        info!("no free addresses to score");
        return Ok(());
    }

    let mut gauge = BrowserGauge::new(factory, config.reputation.clone(), cancel.clone());
    let reputation = coordinator
        .run_reputation(&mut gauge, &targets, run_dir)
        .await
        .context("reputation phase")?;
    log_reputation(&reputation);
    if reputation.cancelled {
        warn!("reputation phase interrupted");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    if cli.init_config {
        let path = cli.config_path()?;
        AppConfig::default()
            .save_to(&path)
            .with_context(|| format!("writing {}", path.display()))?;
        info!("wrote default config to {}", path.display());
        return Ok(());
    }

    let config = Arc::new(cli.load_config()?);
    info!("Starting mailprobe v{}", env!("CARGO_PKG_VERSION"));

    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());

    let cache = Arc::new(
        CacheStore::open(
            &config.general.availability_cache,
            &config.general.reputation_cache,
        )
        .await
        .context("opening caches")?,
    );
    let factory = Arc::new(ChromiumFactory::new(config.browser.clone()));
    let coordinator = BatchCoordinator::new(
        Arc::clone(&config),
        Arc::clone(&factory),
        Arc::clone(&cache),
        cancel.clone(),
    );

    if let Some(dir) = &cli.score_dir {
        let run_dir = RunDirectory::open(dir)
            .await
            .with_context(|| format!("opening {}", dir.display()))?;
        info!("scoring free addresses from {}", run_dir.path().display());
        return score_run(&coordinator, factory, &config, &run_dir, &cancel).await;
    }

    let mut pending = PendingList::load(&config.general.pending_file)
        .await
        .with_context(|| format!("loading {}", config.general.pending_file.display()))?;
    let run_dir = RunDirectory::create(&config.general.output_root, Local::now())
        .await
        .context("creating results directory")?;
    info!("writing results to {}", run_dir.path().display());

    let summary = coordinator
        .run_availability(&mut pending, &run_dir)
        .await
        .context("availability phase")?;
    log_availability(&summary);

    if summary.cancelled || cancel.is_cancelled() {
        warn!(
            "run interrupted; progress is saved and the next run resumes from here. \
             Free addresses found so far are cached and will not be checked again; \
             score them with --score-dir {}",
            run_dir.path().display()
        );
        return Ok(());
    }
    if !config.reputation.enabled {
        info!("reputation phase disabled");
        return Ok(());
    }

    score_run(&coordinator, factory, &config, &run_dir, &cancel).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use tempfile::TempDir;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_overrides_apply_on_top_of_config() {
        let tmp = TempDir::new().expect("create temp dir");
        let path = tmp.path().join("config.toml");
        AppConfig::default().save_to(&path).expect("write config");

        let cli = Cli::try_parse_from([
            "mailprobe",
            "--config",
            path.to_str().expect("utf-8 path"),
            "--limit",
            "5",
            "--batch-size",
            "7",
            "--skip-reputation",
            "--headless",
        ])
        .expect("parse args");
        let config = cli.load_config().expect("load config");

        assert_eq!(config.general.limit, 5);
        assert_eq!(config.general.batch_size, 7);
        assert!(!config.reputation.enabled);
        assert!(config.browser.headless);
    }

    #[test]
    fn test_score_dir_flag() {
        let cli = Cli::try_parse_from(["mailprobe", "--score-dir", "results_2026-05-04_12-00-00"])
            .expect("parse args");
        assert_eq!(
            cli.score_dir,
            Some(PathBuf::from("results_2026-05-04_12-00-00"))
        );

        let conflict = Cli::try_parse_from([
            "mailprobe",
            "--score-dir",
            "results_2026-05-04_12-00-00",
            "--skip-reputation",
        ]);
        assert!(conflict.is_err());
    }

    #[test]
    fn test_zero_batch_size_is_rejected() {
        let tmp = TempDir::new().expect("create temp dir");
        let path = tmp.path().join("config.toml");
        AppConfig::default().save_to(&path).expect("write config");

        let cli = Cli::try_parse_from([
            "mailprobe",
            "--config",
            path.to_str().expect("utf-8 path"),
            "--batch-size",
            "0",
        ])
        .expect("parse args");
        assert!(cli.load_config().is_err());
    }
}
