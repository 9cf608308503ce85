//! Process configuration read from the environment.
//!
//! # API pattern
//!
//! - `Config::from_lookup(f)` reads through an explicit lookup function;
//!   used in tests with a `HashMap`.
//! - `Config::from_env()` reads the process environment and delegates.
//!
//! Tests must NEVER call `from_env`; always use `from_lookup`.

use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::types::ProtectedUsers;

pub const SYNC_INTERVAL_SECONDS: &str = "SYNC_INTERVAL_SECONDS";
pub const KEYCLOAK_URL: &str = "KEYCLOAK_URL";
pub const KEYCLOAK_REALM: &str = "KEYCLOAK_REALM";
pub const KEYCLOAK_USERNAME: &str = "KEYCLOAK_USERNAME";
pub const KEYCLOAK_PASSWORD: &str = "KEYCLOAK_PASSWORD";
pub const KEYCLOAK_CLIENT_ID: &str = "KEYCLOAK_CLIENT_ID";
pub const KEYCLOAK_CLIENT_SECRET: &str = "KEYCLOAK_CLIENT_SECRET";
pub const GITEA_URL: &str = "GITEA_URL";
pub const GITEA_API_KEY: &str = "GITEA_API_KEY";
pub const GITEA_ORG_OWNER: &str = "GITEA_ORG_OWNER";
pub const GITEA_AUTH_SOURCE_ID: &str = "GITEA_AUTH_SOURCE_ID";
pub const SYNC_ADMIN_GROUP: &str = "SYNC_ADMIN_GROUP";
pub const SYNC_PROTECTED_USERS: &str = "SYNC_PROTECTED_USERS";
pub const SYNC_MEMBERSHIP_ENABLED_ONLY: &str = "SYNC_MEMBERSHIP_ENABLED_ONLY";
pub const SYNC_HTTP_TIMEOUT_SECONDS: &str = "SYNC_HTTP_TIMEOUT_SECONDS";

const DEFAULT_CLIENT_ID: &str = "admin-cli";
const DEFAULT_ORG_OWNER: &str = "gitea";
const DEFAULT_AUTH_SOURCE_ID: i64 = 2;
const DEFAULT_ADMIN_GROUP: &str = "gitea-admin";
const DEFAULT_PROTECTED_USERS: &[&str] = &["gitea"];
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Which upstream users count toward an organization's expected roster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MembershipPolicy {
    /// Every user in the group, including disabled ones.
    #[default]
    IncludeDisabled,
    /// Only enabled users are expected members.
    EnabledOnly,
}

impl MembershipPolicy {
    pub fn admits(self, enabled: bool) -> bool {
        match self {
            Self::EnabledOnly => enabled,
            Self::IncludeDisabled => true,
        }
    }
}

/// Connection settings for the identity directory.
#[derive(Debug, Clone)]
pub struct DirectorySettings {
    pub url: String,
    pub realm: String,
    pub username: String,
    pub password: SecretString,
    pub client_id: String,
    pub client_secret: Option<SecretString>,
}

/// Connection settings for the collaboration platform.
#[derive(Debug, Clone)]
pub struct PlatformSettings {
    pub url: String,
    pub api_key: SecretString,
    /// Account that owns newly created organizations.
    pub org_owner: String,
}

/// Policy knobs of the reconciler.
#[derive(Debug, Clone)]
pub struct ReconcileSettings {
    pub admin_group: String,
    pub protected_users: ProtectedUsers,
    /// Platform auth source id written on every managed account.
    pub auth_source_id: i64,
    pub membership_policy: MembershipPolicy,
}

impl Default for ReconcileSettings {
    fn default() -> Self {
        Self {
            admin_group: DEFAULT_ADMIN_GROUP.to_owned(),
            protected_users: ProtectedUsers::new(DEFAULT_PROTECTED_USERS.iter().copied()),
            auth_source_id: DEFAULT_AUTH_SOURCE_ID,
            membership_policy: MembershipPolicy::default(),
        }
    }
}

/// Complete process configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub sync_interval: Duration,
    pub http_timeout: Duration,
    pub directory: DirectorySettings,
    pub platform: PlatformSettings,
    pub reconcile: ReconcileSettings,
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl Config {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read configuration through `lookup`, which returns the raw value of a
    /// variable or `None` when unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Lookup(lookup);

        let interval = env.parse_positive(SYNC_INTERVAL_SECONDS)?;
        let timeout = env
            .optional(SYNC_HTTP_TIMEOUT_SECONDS)
            .map(|_| env.parse_positive(SYNC_HTTP_TIMEOUT_SECONDS))
            .transpose()?
            .unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS);

        let directory = DirectorySettings {
            url: trim_trailing_slash(env.required(KEYCLOAK_URL)?),
            realm: env.required(KEYCLOAK_REALM)?,
            username: env.required(KEYCLOAK_USERNAME)?,
            password: SecretString::from(env.required(KEYCLOAK_PASSWORD)?),
            client_id: env
                .optional(KEYCLOAK_CLIENT_ID)
                .unwrap_or_else(|| DEFAULT_CLIENT_ID.to_owned()),
            client_secret: env.optional(KEYCLOAK_CLIENT_SECRET).map(SecretString::from),
        };

        let platform = PlatformSettings {
            url: trim_trailing_slash(env.required(GITEA_URL)?),
            api_key: SecretString::from(env.required(GITEA_API_KEY)?),
            org_owner: env
                .optional(GITEA_ORG_OWNER)
                .unwrap_or_else(|| DEFAULT_ORG_OWNER.to_owned()),
        };

        let protected_users = match env.optional(SYNC_PROTECTED_USERS) {
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|login| !login.is_empty())
                .collect(),
            None => ProtectedUsers::new(DEFAULT_PROTECTED_USERS.iter().copied()),
        };

        let auth_source_id = match env.optional(GITEA_AUTH_SOURCE_ID) {
            Some(raw) => raw.parse::<i64>().map_err(|e| ConfigError::Invalid {
                name: GITEA_AUTH_SOURCE_ID,
                reason: e.to_string(),
            })?,
            None => DEFAULT_AUTH_SOURCE_ID,
        };

        let membership_policy = if env.parse_bool(SYNC_MEMBERSHIP_ENABLED_ONLY)? {
            MembershipPolicy::EnabledOnly
        } else {
            MembershipPolicy::IncludeDisabled
        };

        Ok(Self {
            sync_interval: Duration::from_secs(interval),
            http_timeout: Duration::from_secs(timeout),
            directory,
            platform,
            reconcile: ReconcileSettings {
                admin_group: env
                    .optional(SYNC_ADMIN_GROUP)
                    .unwrap_or_else(|| DEFAULT_ADMIN_GROUP.to_owned()),
                protected_users,
                auth_source_id,
                membership_policy,
            },
        })
    }
}

struct Lookup<F>(F);

impl<F> Lookup<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Unset and blank values are both treated as absent.
    fn optional(&self, name: &str) -> Option<String> {
        (self.0)(name)
            .map(|v| v.trim().to_owned())
            .filter(|v| !v.is_empty())
    }

    fn required(&self, name: &'static str) -> Result<String, ConfigError> {
        self.optional(name).ok_or(ConfigError::Missing(name))
    }

    fn parse_positive(&self, name: &'static str) -> Result<u64, ConfigError> {
        let raw = self.required(name)?;
        match raw.parse::<u64>() {
            Ok(0) => Err(ConfigError::Invalid {
                name,
                reason: "must be greater than zero".to_owned(),
            }),
            Ok(value) => Ok(value),
            Err(e) => Err(ConfigError::Invalid {
                name,
                reason: format!("'{raw}' is not a whole number of seconds: {e}"),
            }),
        }
    }

    fn parse_bool(&self, name: &'static str) -> Result<bool, ConfigError> {
        match self.optional(name).map(|v| v.to_ascii_lowercase()).as_deref() {
            None | Some("0" | "false" | "no" | "off") => Ok(false),
            Some("1" | "true" | "yes" | "on") => Ok(true),
            Some(other) => Err(ConfigError::Invalid {
                name,
                reason: format!("'{other}' is not a boolean"),
            }),
        }
    }
}

fn trim_trailing_slash(url: String) -> String {
    url.trim_end_matches('/').to_owned()
}
