use std::sync::Arc;

pub type DeployResult<T> = Result<T, DeployError>;

/// Errors raised while declaring or publishing a deployment.
///
/// Errors travel through shared deferred values and are cloned to
/// every dependent, so foreign error types are held behind `Arc`.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DeployError {
    #[error("malformed route '{operation}': {reason}")]
    MalformedRoute { operation: String, reason: String },

    #[error("missing credential for backend '{0}'")]
    MissingCredential(String),

    #[error("unresolved token [{token}] in {path}")]
    UnresolvedToken { path: String, token: String },

    #[error("upstream resolution failed for {producer}: {reason}")]
    UpstreamResolution { producer: String, reason: String },

    #[error("secret '{0}' is already bound to a different producer")]
    DuplicateSecret(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("{0}")]
    Other(String),

    #[error(transparent)]
    Io(Arc<std::io::Error>),

    #[error(transparent)]
    Json(Arc<serde_json::Error>),

    #[error(transparent)]
    Yaml(Arc<serde_yaml::Error>),

    #[error(transparent)]
    Walk(Arc<walkdir::Error>),
}

impl DeployError {
    /// Failure of the operation producing a deferred value.
    #[must_use]
    pub fn upstream(producer: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UpstreamResolution {
            producer: producer.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn malformed(operation: &str, reason: impl Into<String>) -> Self {
        Self::MalformedRoute {
            operation: operation.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<std::io::Error> for DeployError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(Arc::new(err))
    }
}

impl From<serde_json::Error> for DeployError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(Arc::new(err))
    }
}

impl From<serde_yaml::Error> for DeployError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Yaml(Arc::new(err))
    }
}

impl From<walkdir::Error> for DeployError {
    fn from(err: walkdir::Error) -> Self {
        Self::Walk(Arc::new(err))
    }
}
