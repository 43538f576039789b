use std::path::{Path, PathBuf};

use crate::judge::{Tolerance, ToleranceError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCase {
    pub name: String,
    pub input: String,
    /// `None` means input-only: the case is run and shown but never judged.
    pub expected: Option<String>,
}

impl TestCase {
    pub fn new(
        name: impl Into<String>,
        input: impl Into<String>,
        expected: Option<impl Into<String>>,
    ) -> Self {
        Self {
            name: name.into(),
            input: input.into(),
            expected: expected.map(Into::into),
        }
    }

    pub fn is_input_only(&self) -> bool {
        self.expected.is_none()
    }
}

/// A labeled set of testcases received from outside (e.g. a problem page).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestBatch {
    pub label: String,
    pub cases: Vec<TestCase>,
}

impl TestBatch {
    /// Pairs inputs with outputs, naming the cases `#1`, `#2`, ...
    pub fn from_pairs(label: impl Into<String>, pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        let cases = pairs
            .into_iter()
            .enumerate()
            .map(|(i, (input, output))| TestCase::new(format!("#{}", i + 1), input, Some(output)))
            .collect();
        Self {
            label: label.into(),
            cases,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error(transparent)]
    Fs(#[from] fsutil::Error),

    #[error("Invalid tolerance in '{}': {source}", .path.to_string_lossy())]
    InvalidTolerance {
        path: PathBuf,
        #[source]
        source: ToleranceError,
    },
}

pub struct TestcaseDir;

impl TestcaseDir {
    pub const NUMBERED_CASES: usize = 10;
    pub const INPUT_DIR_NAME: &str = "in";
    pub const OUTPUT_DIR_NAME: &str = "out";
    pub const TOLERANCE_FILENAME: &str = "tol";

    /// Loads `in0..in9` (paired with `out0..out9` when present), then every
    /// `in/<name>` (paired with `out/<name>`), in that order.
    pub fn load(dir: impl AsRef<Path>) -> Result<Vec<TestCase>, LoadError> {
        let dir = dir.as_ref();
        let mut res = Vec::new();

        for i in 0..Self::NUMBERED_CASES {
            let name = format!("in{}", i);
            let Some(input) = fsutil::read_to_string_if_exists(dir.join(&name))? else {
                continue;
            };
            let expected = fsutil::read_to_string_if_exists(dir.join(format!("out{}", i)))?;
            res.push(TestCase {
                name,
                input,
                expected,
            });
        }

        let in_dir = dir.join(Self::INPUT_DIR_NAME);
        if in_dir.is_dir() {
            let out_dir = dir.join(Self::OUTPUT_DIR_NAME);
            for filename in fsutil::sorted_file_names(&in_dir)? {
                let input = fsutil::read_to_string(in_dir.join(&filename))?;
                let expected = fsutil::read_to_string_if_exists(out_dir.join(&filename))?;
                res.push(TestCase {
                    name: format!("{}/{}", Self::INPUT_DIR_NAME, filename),
                    input,
                    expected,
                });
            }
        }
        Ok(res)
    }

    /// Reads the optional `tol` file holding a single floating-point literal.
    pub fn load_tolerance(dir: impl AsRef<Path>) -> Result<Option<Tolerance>, LoadError> {
        let path = dir.as_ref().join(Self::TOLERANCE_FILENAME);
        let Some(text) = fsutil::read_to_string_if_exists(&path)? else {
            return Ok(None);
        };
        text.parse()
            .map(Some)
            .map_err(|source| LoadError::InvalidTolerance { path, source })
    }
}
