//! Gitea API v1 request and response bodies.

use serde::{Deserialize, Serialize};

use idsync_core::{DownstreamUser, UserSpec};

/// Units granted to the membership team of every managed organization.
pub(crate) const MEMBERSHIP_TEAM_UNITS: [&str; 8] = [
    "repo.code",
    "repo.issues",
    "repo.pulls",
    "repo.releases",
    "repo.wiki",
    "repo.ext_wiki",
    "repo.ext_issues",
    "repo.projects",
];

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct User {
    pub login: String,
    #[serde(default)]
    pub login_name: Option<String>,
    #[serde(default)]
    pub source_id: Option<i64>,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub prohibit_login: bool,
}

impl From<User> for DownstreamUser {
    fn from(user: User) -> Self {
        DownstreamUser {
            login: user.login,
            email: user.email,
            full_name: user.full_name,
            active: user.active,
            admin: user.is_admin,
            prohibit_login: user.prohibit_login,
            source_id: user.source_id,
            // Local accounts report an empty login name.
            login_name: user.login_name.filter(|name| !name.is_empty()),
        }
    }
}

/// Gitea reports the organization name in `username` on older releases and
/// in `name` on newer ones.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Organization {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

impl Organization {
    pub fn org_name(self) -> Option<String> {
        self.username
            .filter(|n| !n.is_empty())
            .or(self.name.filter(|n| !n.is_empty()))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Team {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct TeamMember {
    pub login: String,
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub(crate) struct CreateUserOption<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub full_name: &'a str,
    pub login_name: &'a str,
    pub password: &'a str,
    pub must_change_password: bool,
    pub source_id: i64,
}

impl<'a> From<&'a UserSpec> for CreateUserOption<'a> {
    fn from(spec: &'a UserSpec) -> Self {
        Self {
            username: &spec.username,
            email: &spec.email,
            full_name: &spec.full_name,
            login_name: &spec.login_name,
            password: &spec.password,
            must_change_password: spec.must_change_password,
            source_id: spec.source_id,
        }
    }
}

#[derive(Debug, Default, Serialize)]
pub(crate) struct EditUserOption<'a> {
    pub active: bool,
    pub admin: bool,
    pub prohibit_login: bool,
    pub email: &'a str,
    pub login_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_create_organization: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub must_change_password: Option<bool>,
}

impl<'a> EditUserOption<'a> {
    pub fn update(spec: &'a UserSpec) -> Self {
        Self {
            active: spec.active,
            admin: spec.admin,
            prohibit_login: spec.prohibit_login,
            email: &spec.email,
            login_name: &spec.login_name,
            source_id: Some(spec.source_id),
            allow_create_organization: Some(spec.allow_create_organization),
            full_name: Some(&spec.full_name),
            password: Some(&spec.password),
            must_change_password: Some(spec.must_change_password),
        }
    }

    pub fn disable(user: &'a DownstreamUser) -> Self {
        Self {
            active: false,
            admin: false,
            prohibit_login: true,
            email: &user.email,
            login_name: user.login_name.as_deref().unwrap_or(&user.login),
            source_id: user.source_id,
            ..Self::default()
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct CreateOrgOption<'a> {
    pub username: &'a str,
    pub visibility: &'static str,
}

#[derive(Debug, Serialize)]
pub(crate) struct CreateTeamOption<'a> {
    pub name: &'a str,
    pub permission: &'static str,
    pub units: &'static [&'static str],
}
