//! Domain types shared by the directory client, the platform client and the
//! reconciler.
//!
//! Upstream types describe what the identity directory reports; downstream
//! types describe what the collaboration platform currently holds. All of
//! them are plain snapshots: nothing here is persisted between passes.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;

use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::ProfileError;

/// Attribute on an upstream group that classifies it.
pub const BUSINESS_CATEGORY_ATTRIBUTE: &str = "businessCategory";

/// Value of [`BUSINESS_CATEGORY_ATTRIBUTE`] that marks a customer-facing group.
pub const CUSTOMER_CATEGORY: &str = "customer";

/// Name of the team inside every organization that holds its roster.
pub const MEMBERSHIP_TEAM_NAME: &str = "Members";

const GENERATED_PASSWORD_LEN: usize = 20;

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Identifier of a team on the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TeamId(pub i64);

impl fmt::Display for TeamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<i64> for TeamId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

// ---------------------------------------------------------------------------
// Upstream (directory) snapshot
// ---------------------------------------------------------------------------

/// A user as reported by the identity directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpstreamUser {
    /// Stable, immutable directory id.
    pub id: String,
    /// Join key against [`DownstreamUser::login`].
    pub username: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub enabled: bool,
    #[serde(default)]
    pub groups: BTreeSet<String>,
}

impl UpstreamUser {
    pub fn is_member_of(&self, group: &str) -> bool {
        self.groups.contains(group)
    }
}

/// A group as reported by the identity directory, with its attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpstreamGroup {
    pub name: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, Vec<String>>,
}

impl UpstreamGroup {
    /// Whether this group should be mirrored as an organization.
    ///
    /// A group without a `businessCategory` attribute counts as customer
    /// facing; one that carries the attribute must list `customer` in it.
    pub fn is_customer_org(&self) -> bool {
        match self.attributes.get(BUSINESS_CATEGORY_ATTRIBUTE) {
            Some(values) => values.iter().any(|v| v == CUSTOMER_CATEGORY),
            None => true,
        }
    }
}

// ---------------------------------------------------------------------------
// Downstream (platform) snapshot
// ---------------------------------------------------------------------------

/// A user account on the collaboration platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownstreamUser {
    pub login: String,
    pub email: String,
    pub full_name: String,
    pub active: bool,
    pub admin: bool,
    #[serde(default)]
    pub prohibit_login: bool,
    /// Auth source the account is bound to, when the platform reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<i64>,
    /// Login name bound to the external auth source, when the platform
    /// reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub login_name: Option<String>,
}

impl DownstreamUser {
    /// True when the account is already in the state `disable_user` produces.
    pub fn is_disabled(&self) -> bool {
        !self.active && !self.admin && self.prohibit_login
    }
}

/// An organization on the platform together with its membership roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownstreamOrganization {
    pub name: String,
    /// `None` when the organization has no [`MEMBERSHIP_TEAM_NAME`] team.
    pub membership_team: Option<TeamId>,
    #[serde(default)]
    pub members: BTreeSet<String>,
}

// ---------------------------------------------------------------------------
// Protected users
// ---------------------------------------------------------------------------

/// Logins that are never disabled, whatever the directory says.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProtectedUsers(HashSet<String>);

impl ProtectedUsers {
    pub fn new<I, S>(logins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(logins.into_iter().map(Into::into).collect())
    }

    pub fn contains(&self, login: &str) -> bool {
        self.0.contains(login)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for ProtectedUsers {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self::new(iter)
    }
}

// ---------------------------------------------------------------------------
// Write model
// ---------------------------------------------------------------------------

/// Full attribute set written to the platform on create and update.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct UserSpec {
    pub username: String,
    pub email: String,
    pub full_name: String,
    /// Always the immutable upstream id, never the username.
    pub login_name: String,
    pub active: bool,
    pub admin: bool,
    pub allow_create_organization: bool,
    pub prohibit_login: bool,
    pub must_change_password: bool,
    pub source_id: i64,
    #[serde(skip)]
    pub password: String,
}

impl fmt::Debug for UserSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserSpec")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("full_name", &self.full_name)
            .field("login_name", &self.login_name)
            .field("active", &self.active)
            .field("admin", &self.admin)
            .field("source_id", &self.source_id)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

impl UserSpec {
    /// Build the spec for an enabled upstream user.
    ///
    /// Fails with [`ProfileError::IncompleteProfile`] when the directory
    /// profile lacks a display name or an email address.
    pub fn for_upstream(
        user: &UpstreamUser,
        admin_group: &str,
        source_id: i64,
    ) -> Result<Self, ProfileError> {
        let full_name = non_empty(user.display_name.as_deref())
            .ok_or_else(|| ProfileError::incomplete(&user.username, "display name"))?;
        let email = non_empty(user.email.as_deref())
            .ok_or_else(|| ProfileError::incomplete(&user.username, "email"))?;
        let admin = user.is_member_of(admin_group);

        Ok(Self {
            username: user.username.clone(),
            email: email.to_owned(),
            full_name: full_name.to_owned(),
            login_name: user.id.clone(),
            active: true,
            admin,
            allow_create_organization: admin,
            prohibit_login: false,
            must_change_password: false,
            source_id,
            password: generate_password(),
        })
    }

    /// Same attributes with a newly generated password, for the next call.
    pub fn with_fresh_password(&self) -> Self {
        Self {
            password: generate_password(),
            ..self.clone()
        }
    }

    /// Whether `existing` already carries every attribute this spec writes.
    ///
    /// The password is not compared: it is a throwaway value and the
    /// platform never reports it back.
    pub fn is_satisfied_by(&self, existing: &DownstreamUser) -> bool {
        existing.active == self.active
            && existing.prohibit_login == self.prohibit_login
            && existing.admin == self.admin
            && existing.email == self.email
            && existing.full_name == self.full_name
            && existing.source_id.map_or(true, |id| id == self.source_id)
            && existing
                .login_name
                .as_deref()
                .map_or(true, |name| name == self.login_name)
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Random local password for accounts that authenticate through the
/// directory. Regenerated on every call.
pub fn generate_password() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(GENERATED_PASSWORD_LEN)
        .map(char::from)
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
