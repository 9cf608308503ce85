//! `idsync plan`: print what the next pass would do, without writing.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use idsync_core::ProfileError;
use idsync_daemon::{connect, init_tracing_with, LogFormat};
use idsync_reconcile::{DisableReason, PassPlan, UserAction};

#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Print the plan as JSON instead of a table.
    #[arg(long)]
    pub json: bool,
}

impl PlanArgs {
    pub fn run(self) -> Result<()> {
        // stdout carries the plan itself.
        init_tracing_with(LogFormat::Text, std::io::stderr);
        let config = super::load_config()?;

        let plan = connect(&config)
            .plan()
            .context("failed to read directory and platform state")?;

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&plan).context("failed to serialize plan JSON")?
            );
        } else {
            print_table(&plan);
        }
        Ok(())
    }
}

#[derive(Tabled)]
struct PlanRow {
    #[tabled(rename = "step")]
    step: &'static str,
    #[tabled(rename = "action")]
    action: String,
    #[tabled(rename = "target")]
    target: String,
    #[tabled(rename = "detail")]
    detail: String,
}

impl PlanRow {
    fn new(
        step: &'static str,
        action: Action,
        target: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            step,
            action: action.label(),
            target: target.into(),
            detail: detail.into(),
        }
    }
}

#[derive(Clone, Copy)]
enum Action {
    Create,
    Update,
    Disable,
    Add,
    Remove,
    Skip,
}

impl Action {
    fn label(self) -> String {
        match self {
            Action::Create => "create".green().bold().to_string(),
            Action::Update => "update".yellow().bold().to_string(),
            Action::Disable => "disable".red().bold().to_string(),
            Action::Add => "add".green().to_string(),
            Action::Remove => "remove".red().to_string(),
            Action::Skip => "skip".bright_black().to_string(),
        }
    }
}

fn rows(plan: &PassPlan) -> Vec<PlanRow> {
    let mut rows = Vec::new();

    for action in &plan.users.actions {
        let spec = action.spec();
        let kind = match action {
            UserAction::Create(_) => Action::Create,
            UserAction::Update(_) => Action::Update,
        };
        let detail = if spec.admin { "admin" } else { "" };
        rows.push(PlanRow::new("users", kind, spec.username.as_str(), detail));
    }
    for err in &plan.users.incomplete {
        let ProfileError::IncompleteProfile { username, field } = err;
        rows.push(PlanRow::new(
            "users",
            Action::Skip,
            username.as_str(),
            format!("missing {field}"),
        ));
    }

    for disable in &plan.disables {
        let reason = match disable.reason {
            DisableReason::NotInDirectory => "not in directory",
            DisableReason::DisabledInDirectory => "disabled in directory",
        };
        rows.push(PlanRow::new(
            "disable",
            Action::Disable,
            disable.user.login.as_str(),
            reason,
        ));
    }

    for name in &plan.organizations {
        rows.push(PlanRow::new("organizations", Action::Create, name.as_str(), ""));
    }

    for change in &plan.memberships.changes {
        let org = change.organization.as_str();
        for login in &change.to_add {
            rows.push(PlanRow::new("memberships", Action::Add, login.as_str(), org));
        }
        for login in &change.to_remove {
            rows.push(PlanRow::new("memberships", Action::Remove, login.as_str(), org));
        }
    }
    for name in &plan.memberships.missing_team {
        rows.push(PlanRow::new(
            "memberships",
            Action::Skip,
            name.as_str(),
            "no Members team",
        ));
    }

    rows
}

fn print_table(plan: &PassPlan) {
    if plan.is_empty()
        && plan.users.incomplete.is_empty()
        && plan.memberships.missing_team.is_empty()
    {
        println!("{} platform already matches directory", "✓".green());
        return;
    }

    let mut table = Table::new(rows(plan));
    table.with(Style::rounded());
    println!("{table}");

    if !plan.memberships.unprovisioned.is_empty() {
        println!(
            "{} {} expected member(s) have no platform account yet; they join after the account is created",
            "·".bright_black(),
            plan.memberships.unprovisioned.len()
        );
    }
}
