pub mod daemon;
pub mod plan;
pub mod sync;

use anyhow::{Context, Result};
use idsync_core::Config;

pub(crate) fn load_config() -> Result<Config> {
    Config::from_env().context("invalid configuration")
}
