//! `idsync sync`: one pass, then exit.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use idsync_daemon::{connect, init_tracing, LogFormat};
use idsync_reconcile::PassReport;

#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Show what would change without writing to the platform.
    #[arg(long)]
    pub dry_run: bool,
}

impl SyncArgs {
    pub fn run(self) -> Result<()> {
        init_tracing(LogFormat::Text);
        let config = super::load_config()?;

        let report = connect(&config)
            .run_pass(self.dry_run)
            .context("reconciliation pass failed")?;
        print_report(&report);
        Ok(())
    }
}

fn print_report(report: &PassReport) {
    let prefix = if report.dry_run { "[dry-run] " } else { "" };

    if report.writes() == 0 {
        println!("{prefix}{} platform already matches directory", "✓".green());
    } else {
        println!(
            "{prefix}{} {} write(s){}",
            "✓".green(),
            report.writes(),
            if report.dry_run { " planned" } else { " issued" },
        );
    }

    let lines = [
        ("users created", report.users_created),
        ("users updated", report.users_updated),
        ("users disabled", report.users_disabled),
        ("organizations created", report.organizations_created),
        ("members added", report.members_added),
        ("members removed", report.members_removed),
    ];
    for (label, count) in lines.into_iter().filter(|(_, count)| *count > 0) {
        println!("  {count:>4}  {label}");
    }

    if report.users_skipped > 0 {
        println!(
            "  {} {} user(s) skipped: incomplete directory profile",
            "!".yellow().bold(),
            report.users_skipped
        );
    }
    if report.organizations_skipped > 0 {
        println!(
            "  {} {} organization(s) skipped: no Members team",
            "!".yellow().bold(),
            report.organizations_skipped
        );
    }
}
