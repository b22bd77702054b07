use std::path::PathBuf;

use thiserror::Error;

use crate::jobs::tracker::JobId;

/// Failures talking to the Playwright driver process.
#[derive(Debug, Error)]
pub enum BrowserError {
    /// Node.js driver failed to spawn
    #[error("failed to spawn {script} (is Node.js installed?): {source}")]
    Spawn {
        script: String,
        #[source]
        source: std::io::Error,
    },

    /// Pipe to or from the driver broke
    #[error("browser session I/O: {0}")]
    SessionIO(String),

    /// Driver answered `ok: false` or with a malformed payload
    #[error("browser command '{command}' failed: {error}")]
    Protocol { command: String, error: String },

    #[error("JSON parse error ({context}): {source}")]
    JsonParse {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("JSON serialize error ({context}): {source}")]
    JsonSerialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no fingerprint for category '{category}' at {}", path.display())]
    NotFound { category: String, path: PathBuf },

    #[error("fingerprint at {} is malformed: {reason}", path.display())]
    Malformed { path: PathBuf, reason: String },

    #[error("invalid category name '{0}'")]
    InvalidCategory(String),

    #[error("fingerprint I/O at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize fingerprint: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("element '{key}' is not defined in fingerprint '{category}'")]
    UnknownElement { category: String, key: String },

    #[error("could not find or heal locator for '{key}' in '{category}'")]
    Unresolved { category: String, key: String },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Browser(#[from] BrowserError),
}

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("oracle request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("oracle returned HTTP {status}: {body}")]
    BadStatus { status: u16, body: String },

    #[error("oracle returned no text")]
    EmptyResponse,

    #[error("oracle API key not set (expected env var {0})")]
    MissingApiKey(String),
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("authentication requested but no session state at {}", .0.display())]
    MissingAuthState(PathBuf),

    #[error("navigation to {requested} landed on {landed}; session state may be expired (pass allow_redirects to proceed)")]
    Redirected { requested: String, landed: String },

    #[error("page simplification produced an empty digest")]
    EmptyDigest,

    #[error("oracle response is malformed: {reason}")]
    MalformedResponse { reason: String, raw: String },

    #[error("oracle response does not look like source code")]
    NotSourceCode { raw: String },

    #[error("invalid artifact file name '{0}': must start with 'test_', end with '.rs' and contain no path separators")]
    InvalidFileName(String),

    #[error("oracle returned no executable steps")]
    EmptyPlan { raw: String },

    #[error("step {index} ({step}) failed: {source}")]
    StepFailed {
        index: usize,
        step: String,
        #[source]
        source: BrowserError,
    },

    #[error("step {index} has an unusable navigation target '{target}': {source}")]
    InvalidNavigation {
        index: usize,
        target: String,
        #[source]
        source: url::ParseError,
    },

    #[error(transparent)]
    Oracle(#[from] OracleError),

    #[error(transparent)]
    Browser(#[from] BrowserError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum JobError {
    #[error("job {0} not found")]
    NotFound(JobId),
}
