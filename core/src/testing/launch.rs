use std::{
    collections::BTreeMap,
    fmt,
    path::{Path, PathBuf},
};

use serde::Deserialize;
use tokio::process::Command;

#[derive(Debug, thiserror::Error)]
#[error("Not an executable: '{}'", .0.to_string_lossy())]
pub struct ResolutionError(pub PathBuf);

/// File extension (without dot) => interpreter program, e.g. `py => python3`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Interpreters(BTreeMap<String, String>);

impl Default for Interpreters {
    fn default() -> Self {
        let mut m = BTreeMap::new();
        m.insert("py".to_owned(), "python3".to_owned());
        Self(m)
    }
}

impl Interpreters {
    pub fn new(map: BTreeMap<String, String>) -> Self {
        Self(map)
    }

    pub fn for_path(&self, path: &Path) -> Option<&str> {
        let ext = path.extension()?.to_str()?;
        self.0.get(ext).map(String::as_str)
    }
}

/// What is known about a program path before launching it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileFacts {
    pub is_file: bool,
    pub is_executable: bool,
}

impl FileFacts {
    pub fn of(path: &Path) -> Self {
        Self {
            is_file: path.is_file(),
            is_executable: fsutil::is_executable(path),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchStrategy {
    Native { program: PathBuf },
    Interpreted { interpreter: String, script: PathBuf },
}

impl LaunchStrategy {
    /// The executable bit wins over the extension.
    pub fn classify(
        path: &Path,
        facts: FileFacts,
        interpreters: &Interpreters,
    ) -> Result<Self, ResolutionError> {
        if !facts.is_file {
            return Err(ResolutionError(path.to_owned()));
        }
        if facts.is_executable {
            return Ok(Self::Native {
                program: path.to_owned(),
            });
        }
        match interpreters.for_path(path) {
            Some(interpreter) => Ok(Self::Interpreted {
                interpreter: interpreter.to_owned(),
                script: path.to_owned(),
            }),
            None => Err(ResolutionError(path.to_owned())),
        }
    }

    /// Classifies `path` as found on disk, using its absolute form in the command.
    pub fn resolve(path: &Path, interpreters: &Interpreters) -> Result<Self, ResolutionError> {
        let facts = FileFacts::of(path);
        let abs = fsutil::canonicalize_path(path).map_err(|_| ResolutionError(path.to_owned()))?;
        Self::classify(&abs, facts, interpreters)
    }

    pub fn command(&self) -> Command {
        match self {
            Self::Native { program } => Command::new(program),
            Self::Interpreted {
                interpreter,
                script,
            } => {
                let mut cmd = Command::new(interpreter);
                cmd.arg(script);
                cmd
            }
        }
    }
}

impl fmt::Display for LaunchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Native { program } => write!(f, "{}", program.to_string_lossy()),
            Self::Interpreted {
                interpreter,
                script,
            } => write!(f, "{} {}", interpreter, script.to_string_lossy()),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const FILE: FileFacts = FileFacts {
        is_file: true,
        is_executable: false,
    };
    const EXECUTABLE: FileFacts = FileFacts {
        is_file: true,
        is_executable: true,
    };
    const MISSING: FileFacts = FileFacts {
        is_file: false,
        is_executable: false,
    };

    #[test]
    fn executable_bit_takes_precedence() {
        let got = LaunchStrategy::classify(Path::new("/w/a.py"), EXECUTABLE, &Interpreters::default());
        assert_eq!(
            got.unwrap(),
            LaunchStrategy::Native {
                program: "/w/a.py".into()
            }
        );
    }

    #[test]
    fn script_goes_through_interpreter() {
        let got = LaunchStrategy::classify(Path::new("/w/a.py"), FILE, &Interpreters::default());
        assert_eq!(
            got.unwrap(),
            LaunchStrategy::Interpreted {
                interpreter: "python3".into(),
                script: "/w/a.py".into()
            }
        );
    }

    #[test]
    fn unknown_extension_is_not_launchable() {
        let got = LaunchStrategy::classify(Path::new("/w/a.cc"), FILE, &Interpreters::default());
        assert!(got.is_err());
    }

    #[test]
    fn missing_file_is_not_launchable() {
        let got = LaunchStrategy::classify(Path::new("/w/a"), MISSING, &Interpreters::default());
        assert!(got.is_err());
    }

    #[test]
    fn custom_interpreter() {
        let mut m = BTreeMap::new();
        m.insert("rb".to_owned(), "ruby".to_owned());
        let interpreters = Interpreters::new(m);
        let got = LaunchStrategy::classify(Path::new("a.rb"), FILE, &interpreters).unwrap();
        assert_eq!(got.to_string(), "ruby a.rb");
        assert!(LaunchStrategy::classify(Path::new("a.py"), FILE, &interpreters).is_err());
    }
}
