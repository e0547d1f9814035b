//! `reposnap` binary: configuration from the environment, logging, signal
//! handling, then the driver loop.

use anyhow::Context;
use reposnap_core::{Settings, Shutdown};
use reposnap_daemon::Driver;
use reposnap_github::GithubClient;
use reposnap_pipeline::GitArchiver;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// `json` switches log output to one JSON object per line
const ENV_LOG_FORMAT: &str = "REPOSNAP_LOG_FORMAT";

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("reposnap: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> anyhow::Result<()> {
    let settings = Settings::from_env().context("invalid configuration")?;
    settings
        .prepare_directories()
        .context("cannot prepare backup directories")?;
    tracing::info!(
        version = reposnap_daemon::VERSION,
        backup_root = %settings.backup_root.display(),
        scratch_root = %settings.scratch_root.display(),
        retention_limit = settings.retention_limit,
        poll_interval_secs = settings.poll_interval.as_secs(),
        max_retries = settings.retry.max_retries,
        export_concurrency = settings.export_concurrency,
        "starting reposnap"
    );

    let api = GithubClient::from_settings(&settings).context("cannot create API client")?;
    let archiver = GitArchiver::new(settings.token.clone(), &settings.git_host);

    let shutdown = Shutdown::new();
    tokio::spawn(wait_for_signal(shutdown.clone()));

    let driver = Driver::new(&settings, Arc::new(api), Arc::new(archiver), shutdown.signal());
    if let Some(report) = driver
        .recover()
        .await
        .context("cannot finish interrupted rotation")?
    {
        tracing::warn!(evicted = ?report.evicted, "recovered interrupted rotation");
    }

    driver.run().await;
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var(ENV_LOG_FORMAT).is_ok_and(|format| format.eq_ignore_ascii_case("json"));

    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }
}

async fn wait_for_signal(shutdown: Shutdown) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(error) => {
                tracing::warn!(%error, "cannot listen for SIGTERM, only Ctrl-C stops the daemon");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    tracing::info!("shutdown requested, finishing current step");
    shutdown.trigger();
}
