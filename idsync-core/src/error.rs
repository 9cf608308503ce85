//! Error types for idsync-core.

use thiserror::Error;

/// Failure of a read against the identity directory. Fatal for the pass.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// The directory could not be reached or answered with an error status.
    #[error("directory unavailable during {operation}: {message}")]
    Unavailable {
        operation: &'static str,
        message: String,
    },

    /// The admin token could not be obtained.
    #[error("directory authentication failed: {0}")]
    Auth(String),

    /// The directory answered with a body that does not match its schema.
    #[error("malformed directory response for {operation}: {message}")]
    Decode {
        operation: &'static str,
        message: String,
    },
}

impl DirectoryError {
    pub fn unavailable(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Unavailable {
            operation,
            message: message.into(),
        }
    }
}

/// Failure of a call against the collaboration platform.
#[derive(Debug, Error)]
pub enum PlatformError {
    /// Transport failure or an unexpected error status.
    #[error("platform query failed during {operation}: {message}")]
    QueryFailed {
        operation: &'static str,
        message: String,
    },

    /// The platform answered with a body that does not match its schema.
    #[error("malformed platform response for {operation}: {message}")]
    Decode {
        operation: &'static str,
        message: String,
    },

    /// The organization has no membership team to carry its roster.
    #[error("organization {organization} has no 'Members' team")]
    MembershipTeamMissing { organization: String },
}

impl PlatformError {
    pub fn query_failed(operation: &'static str, message: impl Into<String>) -> Self {
        Self::QueryFailed {
            operation,
            message: message.into(),
        }
    }

    /// Short, stable name of the error kind for log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::QueryFailed { .. } => "platform_query_failed",
            Self::Decode { .. } => "platform_decode",
            Self::MembershipTeamMissing { .. } => "membership_team_missing",
        }
    }
}

impl DirectoryError {
    /// Short, stable name of the error kind for log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unavailable { .. } => "directory_unavailable",
            Self::Auth(_) => "directory_auth",
            Self::Decode { .. } => "directory_decode",
        }
    }
}

/// An upstream profile lacks a field required to write the platform user.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProfileError {
    #[error("user {username} has an incomplete profile: missing {field}")]
    IncompleteProfile {
        username: String,
        field: &'static str,
    },
}

impl ProfileError {
    pub(crate) fn incomplete(username: &str, field: &'static str) -> Self {
        Self::IncompleteProfile {
            username: username.to_owned(),
            field,
        }
    }
}

/// Invalid or missing process configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}
