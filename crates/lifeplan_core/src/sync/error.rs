//! Pass-level sync errors.

use crate::repo::RepoError;
use crate::sync::remote::RemoteError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type SyncResult<T> = Result<T, SyncError>;

/// Failure that aborts a whole reconciliation pass.
///
/// Per-entity failures never surface here; they are collected as messages in
/// the phase reports.
#[derive(Debug)]
pub enum SyncError {
    /// The session is not authenticated; nothing was attempted.
    AuthRequired,
    /// Another pass is still running on this orchestrator.
    AlreadyRunning,
    Remote(RemoteError),
    Store(RepoError),
}

impl Display for SyncError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AuthRequired => write!(f, "authentication required"),
            Self::AlreadyRunning => write!(f, "sync already in progress"),
            Self::Remote(err) => write!(f, "{err}"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for SyncError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Remote(err) => Some(err),
            Self::Store(err) => Some(err),
            Self::AuthRequired | Self::AlreadyRunning => None,
        }
    }
}

impl From<RemoteError> for SyncError {
    fn from(value: RemoteError) -> Self {
        match value {
            RemoteError::AuthRequired => Self::AuthRequired,
            other => Self::Remote(other),
        }
    }
}

impl From<RepoError> for SyncError {
    fn from(value: RepoError) -> Self {
        Self::Store(value)
    }
}
