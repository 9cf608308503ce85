//! Pure planners: each step of a pass as a function of two snapshots.
//!
//! Nothing here talks to a remote system. The pass driver feeds fresh
//! snapshots in and applies what comes out, and `idsync plan` prints it.

use std::collections::{BTreeSet, HashMap, HashSet};

use serde::Serialize;

use idsync_core::{
    DownstreamOrganization, DownstreamUser, MembershipPolicy, ProfileError, ReconcileSettings,
    UpstreamGroup, UpstreamUser, UserSpec,
};

// ---------------------------------------------------------------------------
// Step 1: users
// ---------------------------------------------------------------------------

/// Write planned for one upstream user.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "action", content = "user", rename_all = "snake_case")]
pub enum UserAction {
    /// Not on the platform: create, then apply the full attribute set.
    Create(UserSpec),
    /// On the platform, enabled upstream, and out of date.
    Update(UserSpec),
}

impl UserAction {
    pub fn spec(&self) -> &UserSpec {
        match self {
            Self::Create(spec) | Self::Update(spec) => spec,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UserPlan {
    pub actions: Vec<UserAction>,
    /// Present, enabled and already matching.
    pub unchanged: usize,
    /// Present but disabled upstream; handled by disablement.
    pub deferred: usize,
    #[serde(serialize_with = "serialize_display")]
    pub incomplete: Vec<ProfileError>,
}

pub fn plan_users(
    upstream: &[UpstreamUser],
    downstream: &[DownstreamUser],
    settings: &ReconcileSettings,
) -> UserPlan {
    let by_login: HashMap<&str, &DownstreamUser> =
        downstream.iter().map(|d| (d.login.as_str(), d)).collect();
    let mut plan = UserPlan::default();

    for user in upstream {
        let existing = by_login.get(user.username.as_str()).copied();
        if existing.is_some() && !user.enabled {
            plan.deferred += 1;
            continue;
        }

        let spec = match UserSpec::for_upstream(user, &settings.admin_group, settings.auth_source_id)
        {
            Ok(spec) => spec,
            Err(err) => {
                plan.incomplete.push(err);
                continue;
            }
        };

        match existing {
            None => plan.actions.push(UserAction::Create(spec)),
            Some(current) if spec.is_satisfied_by(current) => plan.unchanged += 1,
            Some(_) => plan.actions.push(UserAction::Update(spec)),
        }
    }
    plan
}

// ---------------------------------------------------------------------------
// Step 2: disablement
// ---------------------------------------------------------------------------

/// Why a platform account is disabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DisableReason {
    NotInDirectory,
    DisabledInDirectory,
}

#[derive(Debug, Clone, Serialize)]
pub struct Disable {
    pub user: DownstreamUser,
    pub reason: DisableReason,
}

pub fn plan_disables(
    upstream: &[UpstreamUser],
    downstream: &[DownstreamUser],
    settings: &ReconcileSettings,
) -> Vec<Disable> {
    let enabled_by_username: HashMap<&str, bool> = upstream
        .iter()
        .map(|u| (u.username.as_str(), u.enabled))
        .collect();

    downstream
        .iter()
        .filter_map(|user| {
            let reason = match enabled_by_username.get(user.login.as_str()) {
                None if settings.protected_users.contains(&user.login) => return None,
                None => DisableReason::NotInDirectory,
                Some(false) => DisableReason::DisabledInDirectory,
                Some(true) => return None,
            };
            (!user.is_disabled()).then(|| Disable {
                user: user.clone(),
                reason,
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Step 3: organizations
// ---------------------------------------------------------------------------

/// Names of eligible groups with no organization yet, sorted and deduplicated.
pub fn plan_organizations(
    groups: &[UpstreamGroup],
    organizations: &[DownstreamOrganization],
) -> Vec<String> {
    let existing: HashSet<&str> = organizations.iter().map(|o| o.name.as_str()).collect();
    groups
        .iter()
        .filter(|g| g.is_customer_org() && !existing.contains(g.name.as_str()))
        .map(|g| g.name.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

// ---------------------------------------------------------------------------
// Step 4: memberships
// ---------------------------------------------------------------------------

/// Roster changes for one organization. Adds are applied before removes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MembershipChange {
    pub organization: String,
    pub to_add: Vec<String>,
    pub to_remove: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MembershipPlan {
    pub changes: Vec<MembershipChange>,
    /// Organizations without a membership team; skipped.
    pub missing_team: Vec<String>,
    /// (organization, login) pairs expected but with no platform account yet.
    pub unprovisioned: Vec<(String, String)>,
}

/// Expected roster of `organization`: upstream users in the group of the
/// same name, admitted by `policy`.
pub fn expected_members(
    organization: &str,
    upstream: &[UpstreamUser],
    policy: MembershipPolicy,
) -> BTreeSet<String> {
    upstream
        .iter()
        .filter(|u| u.is_member_of(organization) && policy.admits(u.enabled))
        .map(|u| u.username.clone())
        .collect()
}

pub fn plan_memberships(
    upstream: &[UpstreamUser],
    organizations: &[DownstreamOrganization],
    downstream: &[DownstreamUser],
    policy: MembershipPolicy,
) -> MembershipPlan {
    let known: HashSet<&str> = downstream.iter().map(|d| d.login.as_str()).collect();
    let mut plan = MembershipPlan::default();

    for org in organizations {
        if org.membership_team.is_none() {
            plan.missing_team.push(org.name.clone());
            continue;
        }

        let expected = expected_members(&org.name, upstream, policy);
        let mut to_add = Vec::new();
        for login in expected.difference(&org.members) {
            if known.contains(login.as_str()) {
                to_add.push(login.clone());
            } else {
                plan.unprovisioned.push((org.name.clone(), login.clone()));
            }
        }
        let to_remove: Vec<String> = org.members.difference(&expected).cloned().collect();

        if !to_add.is_empty() || !to_remove.is_empty() {
            plan.changes.push(MembershipChange {
                organization: org.name.clone(),
                to_add,
                to_remove,
            });
        }
    }
    plan
}

// ---------------------------------------------------------------------------
// Whole pass
// ---------------------------------------------------------------------------

/// Every step planned against the snapshots taken at the start of a pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PassPlan {
    pub users: UserPlan,
    pub disables: Vec<Disable>,
    pub organizations: Vec<String>,
    pub memberships: MembershipPlan,
}

impl PassPlan {
    /// True when applying the plan would issue no write.
    pub fn is_empty(&self) -> bool {
        self.users.actions.is_empty()
            && self.disables.is_empty()
            && self.organizations.is_empty()
            && self.memberships.changes.is_empty()
    }
}

fn serialize_display<S, T>(items: &[T], serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
    T: std::fmt::Display,
{
    serializer.collect_seq(items.iter().map(ToString::to_string))
}
