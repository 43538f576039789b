//! HTTP endpoints through which a browser pushes samples or asks for an evaluation.
//!
//! * `POST /?<token>` with `{"label": str, "I": [str], "O": [str]}` replaces the testcases.
//! * `POST /eval?<token>` with an absolute file path evaluates that file.
//!
//! Every malformed request is answered with `400` and an empty body.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use axum::{
    extract::{RawQuery, State},
    http::StatusCode,
    routing::post,
    Router,
};
use serde::Deserialize;

use super::Daemon;
use crate::testing::TestBatch;

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("Invalid token")]
    InvalidToken,

    #[error("Failed to parse JSON: {0}")]
    MalformedJson(#[from] serde_json::Error),

    #[error("Number of inputs ({inputs}) and outputs ({outputs}) differ")]
    ArityMismatch { inputs: usize, outputs: usize },

    #[error("Not an absolute path: {0:?}")]
    NotAbsolute(String),

    #[error("Not a file: '{}'", .0.to_string_lossy())]
    NotAFile(PathBuf),

    #[error("Outside of the working tree: '{}'", .0.to_string_lossy())]
    OutsideRoot(PathBuf),
}

#[derive(Debug, Deserialize)]
struct PushBody {
    #[serde(alias = "url")]
    label: String,
    #[serde(rename = "I")]
    inputs: Vec<String>,
    #[serde(rename = "O")]
    outputs: Vec<String>,
}

/// The raw query string is the token itself. An empty token never matches.
pub fn check_token(query: Option<&str>, token: &str) -> Result<(), IngestError> {
    match query {
        Some(q) if !token.is_empty() && q == token => Ok(()),
        _ => Err(IngestError::InvalidToken),
    }
}

pub fn parse_push(body: &str) -> Result<TestBatch, IngestError> {
    let PushBody {
        label,
        inputs,
        outputs,
    } = serde_json::from_str(body)?;
    if inputs.len() != outputs.len() {
        return Err(IngestError::ArityMismatch {
            inputs: inputs.len(),
            outputs: outputs.len(),
        });
    }
    Ok(TestBatch::from_pairs(label, inputs.into_iter().zip(outputs)))
}

/// Accepts an absolute path to an existing file under `root`.
pub fn parse_eval_path(body: &str, root: &Path) -> Result<PathBuf, IngestError> {
    let raw = body.trim_end_matches(|c| c == '\r' || c == '\n');
    let path = Path::new(raw);
    if !path.is_absolute() {
        return Err(IngestError::NotAbsolute(raw.to_owned()));
    }
    if !path.is_file() {
        return Err(IngestError::NotAFile(path.to_owned()));
    }
    if !fsutil::is_within(root, path) {
        return Err(IngestError::OutsideRoot(path.to_owned()));
    }
    Ok(fsutil::normalize_path(path))
}

#[derive(Debug, Clone)]
struct IngestState {
    daemon: Arc<Daemon>,
    token: Arc<str>,
}

impl IngestState {
    fn reject(&self, e: IngestError) -> StatusCode {
        log::warn!("Rejected request: {}", e);
        self.daemon.reject(e.to_string());
        StatusCode::BAD_REQUEST
    }
}

async fn bad_request() -> StatusCode {
    StatusCode::BAD_REQUEST
}

async fn push_tests(
    State(st): State<IngestState>,
    RawQuery(query): RawQuery,
    body: String,
) -> StatusCode {
    let res = check_token(query.as_deref(), &st.token).and_then(|()| parse_push(&body));
    match res {
        Ok(batch) => {
            st.daemon.push(batch);
            StatusCode::OK
        }
        Err(e) => st.reject(e),
    }
}

async fn eval_path(
    State(st): State<IngestState>,
    RawQuery(query): RawQuery,
    body: String,
) -> StatusCode {
    let res = check_token(query.as_deref(), &st.token)
        .and_then(|()| parse_eval_path(&body, st.daemon.root()));
    let target = match res {
        Ok(target) => target,
        Err(e) => return st.reject(e),
    };
    // a well-formed request whose target cannot run is still reported through events
    if let Err(e) = st.daemon.evaluate(&target).await {
        log::warn!("{}", e);
    }
    StatusCode::OK
}

pub fn router(daemon: Arc<Daemon>, token: impl Into<Arc<str>>) -> Router {
    let state = IngestState {
        daemon,
        token: token.into(),
    };
    Router::new()
        .route("/", post(push_tests).fallback(bad_request))
        .route("/eval", post(eval_path).fallback(bad_request))
        .fallback(bad_request)
        .with_state(state)
}
