//! # idsync-reconcile
//!
//! One-way reconciliation of directory users, groups and memberships into
//! the platform's users, organizations and membership teams.
//!
//! Build a [`Reconciler`] from a [`Directory`](idsync_core::Directory) and a
//! [`Platform`](idsync_core::Platform), then call [`Reconciler::run_pass`]
//! once per interval, or [`Reconciler::plan`] to preview a pass.

pub mod error;
pub mod pass;
pub mod plan;

pub use error::ReconcileError;
pub use pass::{PassReport, Reconciler};
pub use plan::{
    Disable, DisableReason, MembershipChange, MembershipPlan, PassPlan, UserAction, UserPlan,
};
