//! `idsync daemon`: the fixed-interval reconciliation loop.

use anyhow::{Context, Result};
use clap::Args;

use idsync_daemon::{init_tracing, start_blocking, LogFormat};

#[derive(Args, Debug, Default)]
pub struct DaemonArgs {
    /// Emit logs as JSON lines.
    #[arg(long)]
    pub json: bool,

    /// Plan and log every pass without writing to the platform.
    #[arg(long)]
    pub dry_run: bool,
}

impl DaemonArgs {
    pub fn run(self) -> Result<()> {
        init_tracing(if self.json {
            LogFormat::Json
        } else {
            LogFormat::Text
        });

        let config = super::load_config()?;
        tracing::info!(
            directory = %config.directory.url,
            realm = %config.directory.realm,
            platform = %config.platform.url,
            interval_secs = config.sync_interval.as_secs(),
            "starting idsync daemon",
        );

        let passes = start_blocking(&config, self.dry_run).context("daemon exited with error")?;
        tracing::info!(passes, "idsync daemon stopped");
        Ok(())
    }
}
