//! Client seams between the reconciler and the two remote systems.
//!
//! Both traits are synchronous: a pass issues one call at a time and waits
//! for it. Implementations must be shareable across threads so the daemon
//! can hand a reconciler to a blocking worker.

use crate::error::{DirectoryError, PlatformError};
use crate::types::{
    DownstreamOrganization, DownstreamUser, TeamId, UpstreamGroup, UpstreamUser, UserSpec,
};

/// Read-only view of the authoritative identity directory.
pub trait Directory: Send + Sync {
    /// Every user, with group names resolved.
    fn list_users(&self) -> Result<Vec<UpstreamUser>, DirectoryError>;

    /// Every group, with attributes.
    fn list_groups(&self) -> Result<Vec<UpstreamGroup>, DirectoryError>;
}

/// Read/write view of the downstream collaboration platform.
pub trait Platform: Send + Sync {
    fn list_users(&self) -> Result<Vec<DownstreamUser>, PlatformError>;

    fn create_user(&self, spec: &UserSpec) -> Result<(), PlatformError>;

    fn update_user(&self, login: &str, spec: &UserSpec) -> Result<(), PlatformError>;

    /// Deactivate, drop admin and prohibit login; email and login name are
    /// written back unchanged.
    fn disable_user(&self, user: &DownstreamUser) -> Result<(), PlatformError>;

    /// Every organization with its membership roster.
    fn list_organizations(&self) -> Result<Vec<DownstreamOrganization>, PlatformError>;

    /// Create a private organization and its membership team.
    fn create_organization(&self, name: &str) -> Result<(), PlatformError>;

    fn membership_team_id(&self, organization: &str) -> Result<Option<TeamId>, PlatformError>;

    /// Fails with [`PlatformError::MembershipTeamMissing`] when the
    /// organization has no membership team.
    fn add_member(&self, organization: &str, login: &str) -> Result<(), PlatformError>;

    /// Fails with [`PlatformError::MembershipTeamMissing`] when the
    /// organization has no membership team.
    fn remove_member(&self, organization: &str, login: &str) -> Result<(), PlatformError>;
}
