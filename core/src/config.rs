use std::path::{Path, PathBuf};
use std::result::Result as StdResult;

use anyhow::Context as _;
use serde::Deserialize;

use crate::serdable::GlobPattern;
use crate::testing::Interpreters;

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    #[serde(skip)]
    pub source_config_file: Option<PathBuf>,
    pub run: RunConfig,
    pub hack: HackConfig,
    pub interact: InteractConfig,
    pub serve: ServeConfig,
    pub build: BuildConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    pub timeout_secs: f64,
    pub interpreters: Interpreters,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10.0,
            interpreters: Interpreters::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HackConfig {
    pub generator: PathBuf,
    pub rounds: u32,
    pub failed_file: PathBuf,
}

impl Default for HackConfig {
    fn default() -> Self {
        Self {
            generator: "g".into(),
            rounds: 10000,
            failed_file: "failed".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InteractConfig {
    pub rounds: u32,
}

impl Default for InteractConfig {
    fn default() -> Self {
        Self { rounds: 1 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServeConfig {
    pub bind: String,
    pub port: u16,
    /// Sources whose extension-stripped sibling is the executable to evaluate.
    pub compiled: Vec<GlobPattern>,
    /// Files evaluated directly through an interpreter.
    pub scripts: Vec<GlobPattern>,
}

impl Default for ServeConfig {
    fn default() -> Self {
        let globs = |pats: &[&str]| {
            pats.iter()
                .filter_map(|p| GlobPattern::parse(p).ok())
                .collect()
        };
        Self {
            bind: "127.0.0.1".to_owned(),
            port: 17624,
            compiled: globs(&["**/*.cc", "**/*.cpp"]),
            scripts: globs(&["**/*.py"]),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BuildConfig {
    pub enabled: bool,
    pub command: String,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            command: "make".to_owned(),
        }
    }
}

impl Config {
    pub const FILENAME: &str = "kyohack.toml";

    pub fn from_toml(s: &str) -> StdResult<Self, toml::de::Error> {
        toml::from_str(s)
    }

    pub fn from_toml_file(filepath: PathBuf) -> anyhow::Result<Self> {
        let toml = fsutil::read_to_string(&filepath).context("Cannot read a file")?;
        let mut cfg = Self::from_toml(&toml)
            .with_context(|| format!("Invalid config TOML: {:?}", filepath))?;
        cfg.source_config_file = Some(filepath);
        Ok(cfg)
    }

    /// Find config file ancestor dirs, including current dir.
    pub fn find_file_in_ancestors(cur_dir: impl AsRef<Path>) -> Option<PathBuf> {
        cur_dir
            .as_ref()
            .ancestors()
            .map(|dir| dir.join(Self::FILENAME))
            .find(|path| path.is_file())
    }

    /// Defaults apply when no config file is found.
    pub fn from_file_finding_in_ancestors(cur_dir: impl AsRef<Path>) -> anyhow::Result<Self> {
        match Self::find_file_in_ancestors(cur_dir) {
            Some(path) => {
                log::info!("Using config {}", path.to_string_lossy());
                Self::from_toml_file(path)
            }
            None => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn empty_toml_gives_defaults() {
        let cfg = Config::from_toml("").unwrap();
        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.run.timeout_secs, 10.0);
        assert_eq!(cfg.hack.generator, Path::new("g"));
        assert_eq!(cfg.hack.failed_file, Path::new("failed"));
        assert_eq!(cfg.serve.port, 17624);
        assert_eq!(cfg.serve.compiled.len(), 2);
        assert!(cfg.build.enabled);
    }

    #[test]
    fn partial_toml_overrides_only_given_keys() {
        let toml = r#"
[run]
timeout_secs = 2.5

[run.interpreters]
rb = "ruby"

[hack]
rounds = 100

[serve]
scripts = ["*.rb"]

[build]
enabled = false
"#;
        let cfg = dbg!(Config::from_toml(toml)).unwrap();
        assert_eq!(cfg.run.timeout_secs, 2.5);
        assert_eq!(cfg.run.interpreters.for_path(Path::new("a.rb")), Some("ruby"));
        assert_eq!(cfg.run.interpreters.for_path(Path::new("a.py")), None);
        assert_eq!(cfg.hack.rounds, 100);
        assert_eq!(cfg.hack.generator, Path::new("g"));
        assert_eq!(cfg.serve.scripts, vec![GlobPattern::parse("*.rb").unwrap()]);
        assert_eq!(cfg.serve.port, 17624);
        assert!(!cfg.build.enabled);
        assert_eq!(cfg.build.command, "make");
    }

    #[test]
    fn invalid_glob_is_rejected() {
        assert!(Config::from_toml("[serve]\ncompiled = [\"[a\"]").is_err());
    }

    #[test]
    fn unknown_key_is_rejected() {
        assert!(Config::from_toml("[hack]\nround = 3").is_err());
    }

    #[test]
    fn find_in_ancestors() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b");
        fsutil::mkdir_all(&nested).unwrap();
        assert_eq!(Config::find_file_in_ancestors(&nested), None);

        fsutil::write(dir.path().join(Config::FILENAME), "[interact]\nrounds = 5\n").unwrap();
        let cfg = Config::from_file_finding_in_ancestors(&nested).unwrap();
        assert_eq!(cfg.interact.rounds, 5);
        assert_eq!(
            cfg.source_config_file,
            Some(dir.path().join(Config::FILENAME))
        );
    }
}
