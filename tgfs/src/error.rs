use reqwest::StatusCode;
use thiserror::Error;

/// Outcome of a single backend request that did not produce a value.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("{0}: no such node")]
    NotFound(String),

    #[error("{0}: node already exists")]
    Conflict(String),

    #[error("{path}: backend answered {status}")]
    Status { status: StatusCode, path: String },

    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("malformed backend response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ClientError {
    /// True when the backend could not give a definite answer.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ClientError::Status { .. } | ClientError::Transport(_) | ClientError::Decode(_)
        )
    }
}

/// How lookups and creations treat a backend that could not answer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ErrorPolicy {
    /// Transport failures surface as `EIO`.
    #[default]
    Strict,
    /// Transport failures look like "does not exist" / "already exists".
    Legacy,
}

/// Errors returned to the kernel, one errno each.
#[derive(Error, Debug)]
pub enum FsError {
    #[error("no such file or directory")]
    NotFound,

    #[error("file exists")]
    AlreadyExists,

    #[error("invalid argument")]
    InvalidArgument,

    #[error("backend failure: {0}")]
    TransportFailure(#[source] ClientError),
}

impl FsError {
    pub fn errno(&self) -> i32 {
        match self {
            FsError::NotFound => libc::ENOENT,
            FsError::AlreadyExists => libc::EEXIST,
            FsError::InvalidArgument => libc::EINVAL,
            FsError::TransportFailure(_) => libc::EIO,
        }
    }
}

impl From<FsError> for rfuse3::Errno {
    fn from(err: FsError) -> Self {
        err.errno().into()
    }
}

impl ErrorPolicy {
    /// Error for attribute lookup and directory listing.
    pub fn lookup_error(self, err: ClientError) -> FsError {
        match err {
            ClientError::NotFound(_) => FsError::NotFound,
            err if err.is_transport() && self == ErrorPolicy::Strict => {
                FsError::TransportFailure(err)
            }
            _ => FsError::NotFound,
        }
    }

    /// Error for file and directory creation.
    pub fn create_error(self, err: ClientError) -> FsError {
        match err {
            ClientError::Conflict(_) => FsError::AlreadyExists,
            err if err.is_transport() && self == ErrorPolicy::Strict => {
                FsError::TransportFailure(err)
            }
            _ => FsError::AlreadyExists,
        }
    }
}

impl From<ClientError> for FsError {
    fn from(err: ClientError) -> Self {
        FsError::TransportFailure(err)
    }
}
