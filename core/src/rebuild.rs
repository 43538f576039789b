//! Brings the programs under test up to date before they are run.

use std::{io, path::Path};

use tokio::process::Command;

use crate::config::BuildConfig;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Failed to spawn build command '{0}': {1}")]
    Spawn(String, #[source] io::Error),

    #[error("Build failed: exitcode={0}")]
    Failed(i32),

    #[error("Build was terminated by a signal")]
    Terminated,
}

impl Error {
    /// Exit code the whole process should end with.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Failed(code) => *code,
            _ => 1,
        }
    }
}

/// A build tool invoking us (e.g. `make` running `kyohack` as a recipe) sets this.
const NESTED_BUILD_ENV: &str = "MAKELEVEL";

pub fn should_rebuild(cfg: &BuildConfig) -> bool {
    cfg.enabled && std::env::var_os(NESTED_BUILD_ENV).is_none()
}

/// Runs `<command> -s <targets...>`.
pub async fn rebuild<P: AsRef<Path>>(targets: &[P], cfg: &BuildConfig) -> Result<(), Error> {
    if !should_rebuild(cfg) {
        log::debug!("Skipping rebuild");
        return Ok(());
    }
    let mut cmd = Command::new(&cfg.command);
    cmd.arg("-s");
    cmd.args(targets.iter().map(|t| t.as_ref().as_os_str()));

    log::info!("Building with {:?}", cmd);
    let status = cmd
        .status()
        .await
        .map_err(|e| Error::Spawn(cfg.command.clone(), e))?;

    match status.code() {
        Some(0) => Ok(()),
        Some(code) => Err(Error::Failed(code)),
        None => Err(Error::Terminated),
    }
}
