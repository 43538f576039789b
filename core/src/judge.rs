//! Token-wise output comparison with optional numeric tolerance.
//!
//! Integers never match approximately: two integer tokens are equal only when
//! they are textually identical, whatever the tolerance is.

use std::{fmt, str::FromStr};

/// Allowed numeric error, strictly between 0 and 1.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Tolerance(f64);

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ToleranceError {
    #[error("Tolerance must be in (0, 1), got {0}")]
    OutOfRange(f64),

    #[error("Not a floating-point number: {0:?}")]
    NotANumber(String),
}

impl Tolerance {
    pub fn new(value: f64) -> Result<Self, ToleranceError> {
        if 0.0 < value && value < 1.0 {
            Ok(Self(value))
        } else {
            Err(ToleranceError::OutOfRange(value))
        }
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

impl FromStr for Tolerance {
    type Err = ToleranceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let value = s
            .parse::<f64>()
            .map_err(|_| ToleranceError::NotANumber(s.to_owned()))?;
        Self::new(value)
    }
}

impl fmt::Display for Tolerance {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TokenComparison {
    pub equal: bool,
    /// `min(absolute, relative)` error, present only when both tokens were compared as floats.
    pub error: Option<f64>,
}

impl TokenComparison {
    const EQUAL: Self = Self {
        equal: true,
        error: None,
    };
    const NOT_EQUAL: Self = Self {
        equal: false,
        error: None,
    };
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum JudgeVerdict {
    Accepted { max_error: Option<f64> },
    WrongAnswer { max_error: Option<f64> },
    /// Line or token counts differ; no numeric error is meaningful.
    Undetermined,
}

impl JudgeVerdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }

    pub fn max_error(&self) -> Option<f64> {
        match *self {
            Self::Accepted { max_error } | Self::WrongAnswer { max_error } => max_error,
            Self::Undetermined => None,
        }
    }
}

fn is_integer(token: &str) -> bool {
    let digits = token.strip_prefix(&['+', '-'][..]).unwrap_or(token);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

fn parse_finite(token: &str) -> Option<f64> {
    token.parse::<f64>().ok().filter(|x| x.is_finite())
}

pub fn compare_token(expected: &str, actual: &str, tolerance: Option<Tolerance>) -> TokenComparison {
    if expected == actual {
        return TokenComparison::EQUAL;
    }
    if is_integer(expected) && is_integer(actual) {
        return TokenComparison::NOT_EQUAL;
    }
    let (Some(e), Some(a)) = (parse_finite(expected), parse_finite(actual)) else {
        return TokenComparison::NOT_EQUAL;
    };

    let abs_err = (e - a).abs();
    let rel_err = if e != 0.0 {
        abs_err / e.abs()
    } else {
        f64::INFINITY
    };
    let error = abs_err.min(rel_err);
    TokenComparison {
        equal: tolerance.map_or(false, |t| error < t.value()),
        error: Some(error),
    }
}

pub fn judge(expected: &str, actual: &str, tolerance: Option<Tolerance>) -> JudgeVerdict {
    if expected == actual {
        return JudgeVerdict::Accepted { max_error: None };
    }

    let expected_lines: Vec<_> = expected.lines().collect();
    let actual_lines: Vec<_> = actual.lines().collect();
    if expected_lines.len() != actual_lines.len() {
        return JudgeVerdict::Undetermined;
    }

    let mut accepted = true;
    let mut max_error: Option<f64> = None;

    for (eline, aline) in expected_lines.iter().zip(&actual_lines) {
        let etokens: Vec<_> = eline.split_whitespace().collect();
        let atokens: Vec<_> = aline.split_whitespace().collect();
        if etokens.len() != atokens.len() {
            return JudgeVerdict::Undetermined;
        }
        for (e, a) in etokens.iter().zip(&atokens) {
            let cmp = compare_token(e, a, tolerance);
            accepted &= cmp.equal;
            if let Some(err) = cmp.error {
                max_error = Some(max_error.map_or(err, |m| m.max(err)));
            }
        }
    }

    if accepted {
        JudgeVerdict::Accepted { max_error }
    } else {
        JudgeVerdict::WrongAnswer { max_error }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn tol(x: f64) -> Option<Tolerance> {
        Some(Tolerance::new(x).unwrap())
    }

    #[test]
    fn tolerance_range() {
        assert!(Tolerance::new(1e-9).is_ok());
        assert!(Tolerance::new(0.0).is_err());
        assert!(Tolerance::new(1.0).is_err());
        assert!(Tolerance::new(f64::NAN).is_err());
        assert_eq!(" 1e-6\n".parse::<Tolerance>().unwrap().value(), 1e-6);
        assert!(matches!(
            "x".parse::<Tolerance>(),
            Err(ToleranceError::NotANumber(_))
        ));
    }

    #[test]
    fn identical_tokens_are_equal() {
        assert_eq!(compare_token("42", "42", None), TokenComparison::EQUAL);
        assert_eq!(compare_token("abc", "abc", tol(0.5)), TokenComparison::EQUAL);
    }

    #[test]
    fn integers_never_match_approximately() {
        assert_eq!(compare_token("5", "6", tol(0.9)), TokenComparison::NOT_EQUAL);
        assert_eq!(
            compare_token("1000000", "1000001", tol(0.0000001)),
            TokenComparison::NOT_EQUAL
        );
        assert_eq!(compare_token("+5", "5", tol(0.5)), TokenComparison::NOT_EQUAL);
    }

    #[test]
    fn integer_against_float_takes_float_path() {
        // "5.0" is not an integer token, so tolerance applies
        let cmp = compare_token("5", "5.0", tol(1e-9));
        assert_eq!(cmp, TokenComparison { equal: true, error: Some(0.0) });

        let cmp = compare_token("5", "5.0", None);
        assert_eq!(cmp, TokenComparison { equal: false, error: Some(0.0) });
    }

    #[test]
    fn absolute_error_near_zero() {
        let cmp = compare_token("0", "0.0000001", tol(0.01));
        assert!(cmp.equal);
        assert!((cmp.error.unwrap() - 1e-7).abs() < 1e-15);
    }

    #[test]
    fn relative_error_uses_expected_as_denominator() {
        let cmp = compare_token("1000.0", "1000.5", tol(0.001));
        assert!(cmp.equal);
        assert!((cmp.error.unwrap() - 0.0005).abs() < 1e-12);

        let cmp = compare_token("1000000.0", "1000001.0", tol(0.0000001));
        assert!(!cmp.equal);
    }

    #[test]
    fn non_finite_and_non_numeric_tokens() {
        assert_eq!(compare_token("nan", "NaN", tol(0.5)), TokenComparison::NOT_EQUAL);
        assert_eq!(compare_token("inf", "1e400", tol(0.5)), TokenComparison::NOT_EQUAL);
        assert_eq!(compare_token("Yes", "yes", tol(0.5)), TokenComparison::NOT_EQUAL);
        assert_eq!(compare_token("1.5", "x", tol(0.5)), TokenComparison::NOT_EQUAL);
    }

    #[test]
    fn identical_text_is_accepted_regardless_of_tolerance() {
        for text in ["", "1 2\n3\n", "hello", "1.5\n"] {
            assert_eq!(judge(text, text, None), JudgeVerdict::Accepted { max_error: None });
            assert_eq!(judge(text, text, tol(0.1)), JudgeVerdict::Accepted { max_error: None });
        }
    }

    #[test]
    fn whitespace_differences_are_ignored() {
        assert!(judge("1 2\n", "1   2\n", None).is_accepted());
        assert!(judge("1 2\n", "1 2", None).is_accepted());
    }

    #[test]
    fn structural_mismatch_is_undetermined() {
        assert_eq!(judge("1\n2\n", "1\n2\n3\n", tol(0.5)), JudgeVerdict::Undetermined);
        assert_eq!(judge("1 2\n", "1\n", tol(0.5)), JudgeVerdict::Undetermined);
        assert_eq!(judge("1.0\n2.0\n", "1.0\n", tol(0.5)).max_error(), None);
    }

    #[test]
    fn max_error_is_aggregated() {
        let got = judge("1.0 2.0\n3.0\n", "1.1 2.0\n3.0003\n", tol(0.2));
        match got {
            JudgeVerdict::Accepted { max_error: Some(e) } => assert!((e - 0.1).abs() < 1e-9),
            _ => panic!("unexpected verdict {:?}", got),
        }

        let got = judge("1.0 2\n", "1.5 3\n", tol(0.01));
        match got {
            JudgeVerdict::WrongAnswer { max_error: Some(e) } => assert!((e - 0.5).abs() < 1e-9),
            _ => panic!("unexpected verdict {:?}", got),
        }
    }

    #[test]
    fn float_output_for_integer_answer_is_wrong_without_tolerance() {
        assert_eq!(
            judge("9\n", "9.0\n", None),
            JudgeVerdict::WrongAnswer { max_error: Some(0.0) }
        );
        assert!(judge("9\n", "9\n", None).is_accepted());
    }
}
