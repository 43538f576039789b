use std::{
    path::{Path, PathBuf},
    process::exit,
    time::Duration,
};

use anyhow::{ensure, Context as _};
use kyohack_core::{config::Config, rebuild, testing::Executor};

pub fn current_dir() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|e| {
        eprintln!("Failed to get current dir: {}", e);
        exit(1);
    })
}

pub fn executor(cfg: &Config) -> Executor {
    Executor::new(cfg.run.interpreters.clone())
}

/// Per-run timeout: the command line wins over the config file.
pub fn timeout(arg_secs: Option<f64>, cfg: &Config) -> anyhow::Result<Duration> {
    let secs = arg_secs.unwrap_or(cfg.run.timeout_secs);
    ensure!(
        secs.is_finite() && secs > 0.0,
        "Timeout must be a positive number of seconds, got {}",
        secs
    );
    Duration::try_from_secs_f64(secs).with_context(|| format!("Timeout is out of range: {}", secs))
}

pub async fn rebuild<P: AsRef<Path>>(targets: &[P], cfg: &Config) -> anyhow::Result<()> {
    rebuild::rebuild(targets, &cfg.build).await?;
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn timeout_prefers_argument() {
        let cfg = Config::default();
        assert_eq!(timeout(None, &cfg).unwrap(), Duration::from_secs(10));
        assert_eq!(timeout(Some(0.5), &cfg).unwrap(), Duration::from_millis(500));
        assert!(timeout(Some(0.0), &cfg).is_err());
        assert!(timeout(Some(-1.0), &cfg).is_err());
        assert!(timeout(Some(1e300), &cfg).is_err());
        assert!(timeout(Some(f64::NAN), &cfg).is_err());
    }
}
