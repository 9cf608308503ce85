//! idsync core library: domain types, client traits, errors, configuration.
//!
//! - [`types`]: upstream/downstream snapshots and the user write model
//! - [`client`]: [`Directory`] and [`Platform`] seams
//! - [`error`]: error taxonomy shared by every crate
//! - [`config`]: environment configuration

pub mod client;
pub mod config;
pub mod error;
pub mod types;

pub use client::{Directory, Platform};
pub use config::{Config, DirectorySettings, MembershipPolicy, PlatformSettings, ReconcileSettings};
pub use error::{ConfigError, DirectoryError, PlatformError, ProfileError};
pub use types::{
    generate_password, DownstreamOrganization, DownstreamUser, ProtectedUsers, TeamId,
    UpstreamGroup, UpstreamUser, UserSpec, MEMBERSHIP_TEAM_NAME,
};
