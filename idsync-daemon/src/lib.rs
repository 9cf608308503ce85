//! Scheduler: runs reconciliation passes on a fixed interval until ctrl-c.

mod error;
mod runtime;

pub use error::DaemonError;
pub use runtime::{
    connect, init_tracing, init_tracing_with, run, start_blocking, LiveReconciler, LogFormat,
    PassOutcome, PassSummary, Scheduler,
};
