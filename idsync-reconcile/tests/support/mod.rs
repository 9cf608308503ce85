//! In-memory directory and platform doubles.
//!
//! `FakePlatform` behaves like the real platform for everything the
//! reconciler relies on and records every write it receives.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use idsync_core::{
    Directory, DirectoryError, DownstreamOrganization, DownstreamUser, Platform, PlatformError,
    ProtectedUsers, ReconcileSettings, TeamId, UpstreamGroup, UpstreamUser, UserSpec,
};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

pub fn settings() -> ReconcileSettings {
    ReconcileSettings {
        protected_users: ProtectedUsers::new(["gitea"]),
        ..ReconcileSettings::default()
    }
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

pub fn upstream(username: &str, enabled: bool, groups: &[&str]) -> UpstreamUser {
    UpstreamUser {
        id: format!("kc-{username}"),
        username: username.to_owned(),
        email: Some(format!("{username}@example.com")),
        display_name: Some(format!("{username} display")),
        enabled,
        groups: groups.iter().map(|g| g.to_string()).collect(),
    }
}

pub fn group(name: &str, category: Option<&str>) -> UpstreamGroup {
    let mut attributes = BTreeMap::new();
    if let Some(category) = category {
        attributes.insert("businessCategory".to_owned(), vec![category.to_owned()]);
    }
    UpstreamGroup {
        name: name.to_owned(),
        attributes,
    }
}

pub fn active_account(login: &str) -> DownstreamUser {
    DownstreamUser {
        login: login.to_owned(),
        email: format!("{login}@local"),
        full_name: login.to_owned(),
        active: true,
        admin: false,
        prohibit_login: false,
        source_id: None,
        login_name: None,
    }
}

// ---------------------------------------------------------------------------
// Directory
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeDirectory {
    pub users: Mutex<Vec<UpstreamUser>>,
    pub groups: Mutex<Vec<UpstreamGroup>>,
    pub unavailable: Mutex<bool>,
}

impl FakeDirectory {
    pub fn new(users: Vec<UpstreamUser>, groups: Vec<UpstreamGroup>) -> Self {
        Self {
            users: Mutex::new(users),
            groups: Mutex::new(groups),
            unavailable: Mutex::new(false),
        }
    }

    pub fn set_users(&self, users: Vec<UpstreamUser>) {
        *self.users.lock().unwrap() = users;
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        *self.unavailable.lock().unwrap() = unavailable;
    }

    fn check(&self, operation: &'static str) -> Result<(), DirectoryError> {
        if *self.unavailable.lock().unwrap() {
            return Err(DirectoryError::unavailable(operation, "connection refused"));
        }
        Ok(())
    }
}

impl Directory for FakeDirectory {
    fn list_users(&self) -> Result<Vec<UpstreamUser>, DirectoryError> {
        self.check("list_users")?;
        Ok(self.users.lock().unwrap().clone())
    }

    fn list_groups(&self) -> Result<Vec<UpstreamGroup>, DirectoryError> {
        self.check("list_groups")?;
        Ok(self.groups.lock().unwrap().clone())
    }
}

// ---------------------------------------------------------------------------
// Platform
// ---------------------------------------------------------------------------

/// A write received by [`FakePlatform`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Write {
    CreateUser(String),
    UpdateUser(String),
    DisableUser(String),
    CreateOrganization(String),
    AddMember(String, String),
    RemoveMember(String, String),
}

#[derive(Debug, Clone)]
struct Org {
    team: Option<TeamId>,
    members: BTreeSet<String>,
}

#[derive(Default)]
struct State {
    users: BTreeMap<String, DownstreamUser>,
    orgs: BTreeMap<String, Org>,
    next_team: i64,
    writes: Vec<Write>,
    passwords: Vec<String>,
    reads: usize,
    fail_on: Option<&'static str>,
}

#[derive(Default)]
pub struct FakePlatform {
    state: Mutex<State>,
}

impl FakePlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_users(users: impl IntoIterator<Item = DownstreamUser>) -> Self {
        let platform = Self::new();
        {
            let mut state = platform.state.lock().unwrap();
            for user in users {
                state.users.insert(user.login.clone(), user);
            }
        }
        platform
    }

    pub fn add_organization(&self, name: &str, members: &[&str]) {
        let mut state = self.state.lock().unwrap();
        state.next_team += 1;
        let team = Some(TeamId(state.next_team));
        state.orgs.insert(
            name.to_owned(),
            Org {
                team,
                members: members.iter().map(|m| m.to_string()).collect(),
            },
        );
    }

    pub fn add_organization_without_team(&self, name: &str, members: &[&str]) {
        self.state.lock().unwrap().orgs.insert(
            name.to_owned(),
            Org {
                team: None,
                members: members.iter().map(|m| m.to_string()).collect(),
            },
        );
    }

    /// Make the named operation fail with a query error from now on.
    pub fn fail_on(&self, operation: &'static str) {
        self.state.lock().unwrap().fail_on = Some(operation);
    }

    pub fn user(&self, login: &str) -> Option<DownstreamUser> {
        self.state.lock().unwrap().users.get(login).cloned()
    }

    pub fn members(&self, organization: &str) -> Option<BTreeSet<String>> {
        self.state
            .lock()
            .unwrap()
            .orgs
            .get(organization)
            .map(|o| o.members.clone())
    }

    pub fn has_organization(&self, organization: &str) -> bool {
        self.state.lock().unwrap().orgs.contains_key(organization)
    }

    pub fn writes(&self) -> Vec<Write> {
        self.state.lock().unwrap().writes.clone()
    }

    pub fn take_writes(&self) -> Vec<Write> {
        std::mem::take(&mut self.state.lock().unwrap().writes)
    }

    /// Passwords received by create and update calls, in order.
    pub fn passwords(&self) -> Vec<String> {
        self.state.lock().unwrap().passwords.clone()
    }

    pub fn reads(&self) -> usize {
        self.state.lock().unwrap().reads
    }

    fn guard(state: &State, operation: &'static str) -> Result<(), PlatformError> {
        if state.fail_on == Some(operation) {
            return Err(PlatformError::query_failed(operation, "injected failure"));
        }
        Ok(())
    }
}

impl Platform for FakePlatform {
    fn list_users(&self) -> Result<Vec<DownstreamUser>, PlatformError> {
        let mut state = self.state.lock().unwrap();
        Self::guard(&state, "list_users")?;
        state.reads += 1;
        Ok(state.users.values().cloned().collect())
    }

    fn create_user(&self, spec: &UserSpec) -> Result<(), PlatformError> {
        let mut state = self.state.lock().unwrap();
        Self::guard(&state, "create_user")?;
        if state.users.contains_key(&spec.username) {
            return Err(PlatformError::query_failed("create_user", "user already exists"));
        }
        state.users.insert(
            spec.username.clone(),
            DownstreamUser {
                login: spec.username.clone(),
                email: spec.email.clone(),
                full_name: spec.full_name.clone(),
                active: true,
                admin: false,
                prohibit_login: false,
                source_id: Some(spec.source_id),
                login_name: Some(spec.login_name.clone()),
            },
        );
        state.writes.push(Write::CreateUser(spec.username.clone()));
        state.passwords.push(spec.password.clone());
        Ok(())
    }

    fn update_user(&self, login: &str, spec: &UserSpec) -> Result<(), PlatformError> {
        let mut state = self.state.lock().unwrap();
        Self::guard(&state, "update_user")?;
        let user = state
            .users
            .get_mut(login)
            .ok_or_else(|| PlatformError::query_failed("update_user", "user not found"))?;
        user.email = spec.email.clone();
        user.full_name = spec.full_name.clone();
        user.active = spec.active;
        user.admin = spec.admin;
        user.prohibit_login = spec.prohibit_login;
        user.source_id = Some(spec.source_id);
        user.login_name = Some(spec.login_name.clone());
        state.writes.push(Write::UpdateUser(login.to_owned()));
        state.passwords.push(spec.password.clone());
        Ok(())
    }

    fn disable_user(&self, target: &DownstreamUser) -> Result<(), PlatformError> {
        let mut state = self.state.lock().unwrap();
        Self::guard(&state, "disable_user")?;
        let user = state
            .users
            .get_mut(&target.login)
            .ok_or_else(|| PlatformError::query_failed("disable_user", "user not found"))?;
        user.active = false;
        user.admin = false;
        user.prohibit_login = true;
        state.writes.push(Write::DisableUser(target.login.clone()));
        Ok(())
    }

    fn list_organizations(&self) -> Result<Vec<DownstreamOrganization>, PlatformError> {
        let mut state = self.state.lock().unwrap();
        Self::guard(&state, "list_organizations")?;
        state.reads += 1;
        Ok(state
            .orgs
            .iter()
            .map(|(name, org)| DownstreamOrganization {
                name: name.clone(),
                membership_team: org.team,
                members: if org.team.is_some() {
                    org.members.clone()
                } else {
                    BTreeSet::new()
                },
            })
            .collect())
    }

    fn create_organization(&self, name: &str) -> Result<(), PlatformError> {
        let mut state = self.state.lock().unwrap();
        Self::guard(&state, "create_organization")?;
        if state.orgs.contains_key(name) {
            return Err(PlatformError::query_failed("create_organization", "already exists"));
        }
        state.next_team += 1;
        let team = Some(TeamId(state.next_team));
        state.orgs.insert(
            name.to_owned(),
            Org {
                team,
                members: BTreeSet::new(),
            },
        );
        state.writes.push(Write::CreateOrganization(name.to_owned()));
        Ok(())
    }

    fn membership_team_id(&self, organization: &str) -> Result<Option<TeamId>, PlatformError> {
        let state = self.state.lock().unwrap();
        Ok(state.orgs.get(organization).and_then(|o| o.team))
    }

    fn add_member(&self, organization: &str, login: &str) -> Result<(), PlatformError> {
        let mut state = self.state.lock().unwrap();
        Self::guard(&state, "add_member")?;
        if !state.users.contains_key(login) {
            return Err(PlatformError::query_failed("add_member", "user not found"));
        }
        let org = state
            .orgs
            .get_mut(organization)
            .filter(|o| o.team.is_some())
            .ok_or_else(|| PlatformError::MembershipTeamMissing {
                organization: organization.to_owned(),
            })?;
        org.members.insert(login.to_owned());
        state
            .writes
            .push(Write::AddMember(organization.to_owned(), login.to_owned()));
        Ok(())
    }

    fn remove_member(&self, organization: &str, login: &str) -> Result<(), PlatformError> {
        let mut state = self.state.lock().unwrap();
        Self::guard(&state, "remove_member")?;
        let org = state
            .orgs
            .get_mut(organization)
            .filter(|o| o.team.is_some())
            .ok_or_else(|| PlatformError::MembershipTeamMissing {
                organization: organization.to_owned(),
            })?;
        org.members.remove(login);
        state
            .writes
            .push(Write::RemoveMember(organization.to_owned(), login.to_owned()));
        Ok(())
    }
}
