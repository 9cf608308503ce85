use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{fmt, EnvFilter};

use idsync_core::{Config, Directory, Platform};
use idsync_directory::KeycloakDirectory;
use idsync_platform::GiteaPlatform;
use idsync_reconcile::{PassReport, Reconciler};

use crate::error::DaemonError;

/// Reconciler wired to the real Keycloak and Gitea clients.
pub type LiveReconciler = Reconciler<KeycloakDirectory, GiteaPlatform>;

/// Output format of the process-wide subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Result of one pass as seen by the scheduler.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PassOutcome {
    Completed(PassReport),
    Failed { kind: &'static str, message: String },
}

impl PassOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PassSummary {
    /// 1-based pass counter since the scheduler started.
    pub pass: u64,
    pub duration_ms: u64,
    pub outcome: PassOutcome,
}

/// Build the live reconciler from configuration.
pub fn connect(config: &Config) -> LiveReconciler {
    let directory = KeycloakDirectory::new(&config.directory, config.http_timeout);
    let platform = GiteaPlatform::new(&config.platform, config.http_timeout);
    Reconciler::new(directory, platform, config.reconcile.clone())
}

/// Start the scheduler against the live systems and block the current thread
/// until ctrl-c. Returns the number of passes run.
pub fn start_blocking(config: &Config, dry_run: bool) -> Result<u64, DaemonError> {
    let scheduler =
        Scheduler::new(Arc::new(connect(config)), config.sync_interval).dry_run(dry_run);
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(DaemonError::Runtime)?;
    runtime.block_on(run(scheduler))
}

/// Run `scheduler` until ctrl-c is received.
pub async fn run<D, P>(scheduler: Scheduler<D, P>) -> Result<u64, DaemonError>
where
    D: Directory + 'static,
    P: Platform + 'static,
{
    let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(4);

    let signal_handle = {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            let result = tokio::signal::ctrl_c().await.map_err(DaemonError::Signal);
            if result.is_ok() {
                tracing::info!("received ctrl-c, shutting down daemon");
            }
            let _ = shutdown.send(());
            result
        })
    };

    let passes = scheduler.run(shutdown_rx).await;

    match signal_handle.await {
        Ok(result) => result?,
        Err(err) => {
            return Err(DaemonError::Join {
                task: "signal_handler",
                message: err.to_string(),
            })
        }
    }
    Ok(passes)
}

/// Runs one pass, waits for it to finish, sleeps for the interval, repeats.
///
/// Passes never overlap. A failed pass is logged with its error kind and
/// the loop continues. Shutdown is observed between passes and during the
/// sleep; an in-flight pass always runs to completion.
pub struct Scheduler<D, P> {
    reconciler: Arc<Reconciler<D, P>>,
    interval: Duration,
    dry_run: bool,
    summaries: Option<mpsc::UnboundedSender<PassSummary>>,
}

impl<D, P> Scheduler<D, P>
where
    D: Directory + 'static,
    P: Platform + 'static,
{
    pub fn new(reconciler: Arc<Reconciler<D, P>>, interval: Duration) -> Self {
        Self {
            reconciler,
            interval,
            dry_run: false,
            summaries: None,
        }
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Also send every pass summary to `tx`.
    pub fn report_to(mut self, tx: mpsc::UnboundedSender<PassSummary>) -> Self {
        self.summaries = Some(tx);
        self
    }

    /// Loop until a message (or closure) on `shutdown_rx`. Returns the number
    /// of passes run.
    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) -> u64 {
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            dry_run = self.dry_run,
            "scheduler started",
        );

        let mut pass = 0u64;
        loop {
            pass += 1;
            let summary = self.run_pass(pass).await;
            log_summary(&summary);
            if let Some(tx) = &self.summaries {
                let _ = tx.send(summary);
            }

            tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!(passes = pass, "scheduler stopped");
                    break;
                }
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
        pass
    }

    async fn run_pass(&self, pass: u64) -> PassSummary {
        let started = Instant::now();
        let reconciler = Arc::clone(&self.reconciler);
        let dry_run = self.dry_run;

        let joined = tokio::task::spawn_blocking(move || reconciler.run_pass(dry_run)).await;
        let outcome = match joined {
            Ok(Ok(report)) => PassOutcome::Completed(report),
            Ok(Err(err)) => PassOutcome::Failed {
                kind: err.kind(),
                message: err.to_string(),
            },
            Err(err) => PassOutcome::Failed {
                kind: "pass_panicked",
                message: err.to_string(),
            },
        };

        PassSummary {
            pass,
            duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            outcome,
        }
    }
}

fn log_summary(summary: &PassSummary) {
    match &summary.outcome {
        PassOutcome::Completed(report) => tracing::info!(
            pass = summary.pass,
            duration_ms = summary.duration_ms,
            writes = report.writes(),
            dry_run = report.dry_run,
            "pass completed",
        ),
        PassOutcome::Failed { kind, message } => tracing::error!(
            pass = summary.pass,
            duration_ms = summary.duration_ms,
            kind = *kind,
            error = %message,
            "pass failed, retrying next interval",
        ),
    }
}

/// Install the global subscriber writing to stdout. `RUST_LOG` overrides
/// the `info` default.
pub fn init_tracing(format: LogFormat) {
    init_tracing_with(format, std::io::stdout);
}

/// Same as [`init_tracing`], writing to `writer`.
pub fn init_tracing_with<W>(format: LogFormat, writer: W)
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(writer);
    let _ = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use idsync_core::{
        DirectoryError, DownstreamOrganization, DownstreamUser, PlatformError, ReconcileSettings,
        TeamId, UpstreamGroup, UpstreamUser, UserSpec,
    };

    use super::*;

    const INTERVAL: Duration = Duration::from_secs(60);

    /// Empty directory that fails its first `failures` user listings.
    #[derive(Default)]
    struct FlakyDirectory {
        failures: usize,
        calls: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl Directory for FlakyDirectory {
        fn list_users(&self) -> Result<Vec<UpstreamUser>, DirectoryError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(5));
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                return Err(DirectoryError::unavailable("list_users", "connection refused"));
            }
            Ok(Vec::new())
        }

        fn list_groups(&self) -> Result<Vec<UpstreamGroup>, DirectoryError> {
            Ok(Vec::new())
        }
    }

    /// Platform with nothing on it; every write is a test failure.
    struct EmptyPlatform;

    impl Platform for EmptyPlatform {
        fn list_users(&self) -> Result<Vec<DownstreamUser>, PlatformError> {
            Ok(Vec::new())
        }
        fn create_user(&self, _: &UserSpec) -> Result<(), PlatformError> {
            unreachable!("no user to create")
        }
        fn update_user(&self, _: &str, _: &UserSpec) -> Result<(), PlatformError> {
            unreachable!("no user to update")
        }
        fn disable_user(&self, _: &DownstreamUser) -> Result<(), PlatformError> {
            unreachable!("no user to disable")
        }
        fn list_organizations(&self) -> Result<Vec<DownstreamOrganization>, PlatformError> {
            Ok(Vec::new())
        }
        fn create_organization(&self, _: &str) -> Result<(), PlatformError> {
            unreachable!("no organization to create")
        }
        fn membership_team_id(&self, _: &str) -> Result<Option<TeamId>, PlatformError> {
            Ok(None)
        }
        fn add_member(&self, _: &str, _: &str) -> Result<(), PlatformError> {
            unreachable!("no member to add")
        }
        fn remove_member(&self, _: &str, _: &str) -> Result<(), PlatformError> {
            unreachable!("no member to remove")
        }
    }

    fn scheduler(
        failures: usize,
    ) -> (
        Scheduler<FlakyDirectory, EmptyPlatform>,
        Arc<Reconciler<FlakyDirectory, EmptyPlatform>>,
        mpsc::UnboundedReceiver<PassSummary>,
    ) {
        let directory = FlakyDirectory {
            failures,
            ..FlakyDirectory::default()
        };
        let reconciler = Arc::new(Reconciler::new(
            directory,
            EmptyPlatform,
            ReconcileSettings::default(),
        ));
        let (tx, rx) = mpsc::unbounded_channel();
        let scheduler = Scheduler::new(Arc::clone(&reconciler), INTERVAL).report_to(tx);
        (scheduler, reconciler, rx)
    }

    #[tokio::test(start_paused = true)]
    async fn failed_pass_does_not_stop_the_loop() {
        let (scheduler, _, mut summaries) = scheduler(1);
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = tokio::spawn(scheduler.run(shutdown_rx));

        let first = summaries.recv().await.expect("first pass");
        let second = summaries.recv().await.expect("second pass");
        let third = summaries.recv().await.expect("third pass");
        shutdown_tx.send(()).expect("scheduler listening");
        handle.await.expect("join");

        assert!(matches!(
            first.outcome,
            PassOutcome::Failed { kind: "directory_unavailable", .. }
        ));
        assert!(second.outcome.is_completed());
        assert!(third.outcome.is_completed());
        assert_eq!([first.pass, second.pass, third.pass], [1, 2, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn passes_are_spaced_by_the_interval_and_never_overlap() {
        let (scheduler, reconciler, mut summaries) = scheduler(0);
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = tokio::spawn(scheduler.run(shutdown_rx));

        summaries.recv().await.expect("first pass");
        let after_first = Instant::now();
        summaries.recv().await.expect("second pass");
        assert!(after_first.elapsed() >= INTERVAL);

        shutdown_tx.send(()).expect("scheduler listening");
        assert_eq!(handle.await.expect("join"), 2);
        assert_eq!(
            reconciler.directory().max_in_flight.load(Ordering::SeqCst),
            1
        );
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_requested_mid_pass_lets_the_pass_finish() {
        let (scheduler, reconciler, mut summaries) = scheduler(0);
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        shutdown_tx.send(()).expect("receiver alive");

        let passes = scheduler.dry_run(true).run(shutdown_rx).await;

        assert_eq!(passes, 1);
        assert_eq!(reconciler.directory().calls.load(Ordering::SeqCst), 1);
        let summary = summaries.recv().await.expect("summary");
        assert!(matches!(&summary.outcome, PassOutcome::Completed(r) if r.dry_run));
    }

    #[test]
    fn summary_serializes_with_status_tag() {
        let summary = PassSummary {
            pass: 4,
            duration_ms: 12,
            outcome: PassOutcome::Failed {
                kind: "platform_query_failed",
                message: "boom".into(),
            },
        };
        let json = serde_json::to_value(&summary).expect("json");
        assert_eq!(json["outcome"]["status"], "failed");
        assert_eq!(json["outcome"]["kind"], "platform_query_failed");
    }
}
