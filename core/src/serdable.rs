use std::{fmt, ops::Deref};

use glob::PatternError;
use serde::{Deserialize, Serialize};

/// A glob pattern validated at deserialization time.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(try_from = "String", into = "String")]
pub struct GlobPattern(glob::Pattern);

impl GlobPattern {
    pub fn parse(pattern: &str) -> Result<Self, PatternError> {
        glob::Pattern::new(pattern).map(Self)
    }
}

impl Deref for GlobPattern {
    type Target = glob::Pattern;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl TryFrom<String> for GlobPattern {
    type Error = PatternError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<GlobPattern> for String {
    fn from(value: GlobPattern) -> Self {
        value.0.as_str().to_owned()
    }
}

impl fmt::Display for GlobPattern {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn deserialize_from_toml_string() {
        #[derive(Deserialize)]
        struct T {
            pat: GlobPattern,
        }
        let t: T = toml::from_str(r#"pat = "**/*.cc""#).unwrap();
        assert_eq!(t.pat.as_str(), "**/*.cc");
        assert!(t.pat.matches("a/b/main.cc"));
    }

    #[test]
    fn invalid_pattern_is_rejected() {
        let res: Result<GlobPattern, _> = serde_json::from_str(r#""[a""#);
        assert!(res.is_err());
    }

    #[test]
    fn serializes_back_to_string() {
        let pat = GlobPattern::parse("*.py").unwrap();
        assert_eq!(serde_json::to_string(&pat).unwrap(), r#""*.py""#);
    }
}
