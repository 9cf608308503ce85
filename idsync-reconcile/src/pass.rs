//! The pass driver: read both systems, plan a step, apply it, move on.
//!
//! ## Pass protocol
//!
//! 1. Users: create missing accounts (create, then update), refresh stale
//!    ones. Re-fetch platform users.
//! 2. Disablement: accounts absent upstream (unless protected) or disabled
//!    upstream.
//! 3. Organizations: create one per eligible group. Re-fetch organizations.
//! 4. Memberships: add expected members, then remove unexpected ones.
//!
//! A read failure aborts the pass; steps already applied stay applied and
//! the next pass converges from wherever this one stopped.

use serde::Serialize;

use idsync_core::{
    Directory, DownstreamOrganization, DownstreamUser, Platform, PlatformError, ReconcileSettings,
    UpstreamUser,
};

use crate::error::ReconcileError;
use crate::plan::{self, PassPlan, UserAction};

// ---------------------------------------------------------------------------
// Pass report
// ---------------------------------------------------------------------------

/// Counts of what a pass did (or, in dry-run mode, would do).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PassReport {
    pub dry_run: bool,
    pub users_created: usize,
    pub users_updated: usize,
    pub users_unchanged: usize,
    pub users_skipped: usize,
    pub users_disabled: usize,
    pub organizations_created: usize,
    pub organizations_skipped: usize,
    pub members_added: usize,
    pub members_removed: usize,
}

impl PassReport {
    /// Number of write calls issued (or planned).
    pub fn writes(&self) -> usize {
        // Creating a user is two calls: create, then update.
        self.users_created * 2
            + self.users_updated
            + self.users_disabled
            + self.organizations_created
            + self.members_added
            + self.members_removed
    }
}

// ---------------------------------------------------------------------------
// Reconciler
// ---------------------------------------------------------------------------

/// Mirrors the directory into the platform, one pass at a time.
pub struct Reconciler<D, P> {
    directory: D,
    platform: P,
    settings: ReconcileSettings,
}

impl<D: Directory, P: Platform> Reconciler<D, P> {
    pub fn new(directory: D, platform: P, settings: ReconcileSettings) -> Self {
        Self {
            directory,
            platform,
            settings,
        }
    }

    pub fn directory(&self) -> &D {
        &self.directory
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn settings(&self) -> &ReconcileSettings {
        &self.settings
    }

    /// Plan every step from one snapshot of each system, without writing.
    ///
    /// Later steps see the snapshot as it was, not as earlier steps would
    /// leave it: accounts created in step 1 are not yet known to step 4.
    pub fn plan(&self) -> Result<PassPlan, ReconcileError> {
        let upstream = self.directory.list_users()?;
        let downstream = self.platform.list_users()?;
        let users = plan::plan_users(&upstream, &downstream, &self.settings);
        let disables = plan::plan_disables(&upstream, &downstream, &self.settings);

        let organizations = self.platform.list_organizations()?;
        let groups = self.directory.list_groups()?;
        let to_create = plan::plan_organizations(&groups, &organizations);
        let memberships = plan::plan_memberships(
            &upstream,
            &organizations,
            &downstream,
            self.settings.membership_policy,
        );

        Ok(PassPlan {
            users,
            disables,
            organizations: to_create,
            memberships,
        })
    }

    /// Run one pass. With `dry_run` the pass is planned and logged but no
    /// write is issued.
    pub fn run_pass(&self, dry_run: bool) -> Result<PassReport, ReconcileError> {
        if dry_run {
            let plan = self.plan()?;
            log_plan(&plan);
            return Ok(report_for_plan(&plan));
        }

        let mut report = PassReport::default();
        let upstream = self.directory.list_users()?;

        let downstream = self.platform.list_users()?;
        self.sync_users(&upstream, &downstream, &mut report)?;

        let downstream = self.platform.list_users()?;
        self.disable_users(&upstream, &downstream, &mut report)?;

        let organizations = self.platform.list_organizations()?;
        self.create_organizations(&organizations, &mut report)?;

        let organizations = self.platform.list_organizations()?;
        self.sync_memberships(&upstream, &organizations, &downstream, &mut report)?;

        tracing::info!(
            created = report.users_created,
            updated = report.users_updated,
            disabled = report.users_disabled,
            organizations = report.organizations_created,
            added = report.members_added,
            removed = report.members_removed,
            "reconciliation pass completed",
        );
        Ok(report)
    }

    fn sync_users(
        &self,
        upstream: &[UpstreamUser],
        downstream: &[DownstreamUser],
        report: &mut PassReport,
    ) -> Result<(), ReconcileError> {
        let plan = plan::plan_users(upstream, downstream, &self.settings);
        report.users_unchanged += plan.unchanged;

        for err in &plan.incomplete {
            tracing::warn!(error = %err, "skipping user with incomplete profile");
            report.users_skipped += 1;
        }

        for action in &plan.actions {
            match action {
                UserAction::Create(spec) => {
                    tracing::info!(user = %spec.username, "user does not exist on platform, creating");
                    self.platform.create_user(spec)?;
                    self.platform
                        .update_user(&spec.username, &spec.with_fresh_password())?;
                    report.users_created += 1;
                }
                UserAction::Update(spec) => {
                    tracing::info!(user = %spec.username, admin = spec.admin, "updating user");
                    self.platform.update_user(&spec.username, spec)?;
                    report.users_updated += 1;
                }
            }
        }
        Ok(())
    }

    fn disable_users(
        &self,
        upstream: &[UpstreamUser],
        downstream: &[DownstreamUser],
        report: &mut PassReport,
    ) -> Result<(), ReconcileError> {
        for disable in plan::plan_disables(upstream, downstream, &self.settings) {
            tracing::info!(
                user = %disable.user.login,
                reason = ?disable.reason,
                "disabling platform user",
            );
            self.platform.disable_user(&disable.user)?;
            report.users_disabled += 1;
        }
        Ok(())
    }

    fn create_organizations(
        &self,
        organizations: &[DownstreamOrganization],
        report: &mut PassReport,
    ) -> Result<(), ReconcileError> {
        let groups = self.directory.list_groups()?;
        for name in plan::plan_organizations(&groups, organizations) {
            tracing::info!(organization = %name, "organization not found, creating");
            self.platform.create_organization(&name)?;
            report.organizations_created += 1;
        }
        Ok(())
    }

    fn sync_memberships(
        &self,
        upstream: &[UpstreamUser],
        organizations: &[DownstreamOrganization],
        downstream: &[DownstreamUser],
        report: &mut PassReport,
    ) -> Result<(), ReconcileError> {
        let plan = plan::plan_memberships(
            upstream,
            organizations,
            downstream,
            self.settings.membership_policy,
        );

        for name in &plan.missing_team {
            tracing::warn!(organization = %name, "organization has no membership team, skipping");
            report.organizations_skipped += 1;
        }
        for (organization, login) in &plan.unprovisioned {
            tracing::debug!(%organization, user = %login, "expected member has no platform account yet");
        }

        for change in &plan.changes {
            let org = change.organization.as_str();
            let mut skipped = false;

            for login in &change.to_add {
                tracing::info!(organization = org, user = %login, "adding member");
                if self.tolerate_missing_team(self.platform.add_member(org, login))? {
                    report.members_added += 1;
                } else {
                    skipped = true;
                }
            }
            for login in &change.to_remove {
                tracing::info!(organization = org, user = %login, "removing member");
                if self.tolerate_missing_team(self.platform.remove_member(org, login))? {
                    report.members_removed += 1;
                } else {
                    skipped = true;
                }
            }

            if skipped {
                report.organizations_skipped += 1;
            }
        }
        Ok(())
    }

    /// `Ok(true)` on success, `Ok(false)` when the membership team vanished
    /// between listing and writing.
    fn tolerate_missing_team(&self, result: Result<(), PlatformError>) -> Result<bool, ReconcileError> {
        match result {
            Ok(()) => Ok(true),
            Err(PlatformError::MembershipTeamMissing { organization }) => {
                tracing::warn!(%organization, "organization has no membership team, skipping");
                Ok(false)
            }
            Err(err) => Err(err.into()),
        }
    }
}

fn report_for_plan(plan: &PassPlan) -> PassReport {
    let (created, updated) = plan
        .users
        .actions
        .iter()
        .fold((0, 0), |(c, u), action| match action {
            UserAction::Create(_) => (c + 1, u),
            UserAction::Update(_) => (c, u + 1),
        });
    PassReport {
        dry_run: true,
        users_created: created,
        users_updated: updated,
        users_unchanged: plan.users.unchanged,
        users_skipped: plan.users.incomplete.len(),
        users_disabled: plan.disables.len(),
        organizations_created: plan.organizations.len(),
        organizations_skipped: plan.memberships.missing_team.len(),
        members_added: plan.memberships.changes.iter().map(|c| c.to_add.len()).sum(),
        members_removed: plan.memberships.changes.iter().map(|c| c.to_remove.len()).sum(),
    }
}

fn log_plan(plan: &PassPlan) {
    for err in &plan.users.incomplete {
        tracing::warn!(error = %err, "[dry-run] would skip user with incomplete profile");
    }
    for action in &plan.users.actions {
        match action {
            UserAction::Create(spec) => tracing::info!(user = %spec.username, "[dry-run] would create user"),
            UserAction::Update(spec) => tracing::info!(user = %spec.username, "[dry-run] would update user"),
        }
    }
    for disable in &plan.disables {
        tracing::info!(user = %disable.user.login, reason = ?disable.reason, "[dry-run] would disable user");
    }
    for name in &plan.organizations {
        tracing::info!(organization = %name, "[dry-run] would create organization");
    }
    for change in &plan.memberships.changes {
        for login in &change.to_add {
            tracing::info!(organization = %change.organization, user = %login, "[dry-run] would add member");
        }
        for login in &change.to_remove {
            tracing::info!(organization = %change.organization, user = %login, "[dry-run] would remove member");
        }
    }
}
