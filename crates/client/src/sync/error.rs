//! Synchronizer failure taxonomy.

use thiserror::Error;

use crate::api::ApiError;

/// Why a synchronizer operation did not take effect.
///
/// None of these are fatal. Each is also published as a notice, so callers
/// that only render notices may ignore the returned error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    /// No session: mutations require a logged-in user.
    #[error("Not logged in")]
    NotAuthenticated,

    /// Network failure or server-side (5xx) error. Local state is kept.
    #[error("Remote store unavailable: {0}")]
    RemoteUnavailable(String),

    /// The server refused the request (4xx). Local state is unchanged.
    #[error("Rejected by remote store ({status}): {message}")]
    RemoteRejected { status: u16, message: String },

    /// The session changed while the request was in flight; its result was
    /// discarded.
    #[error("Session changed before the request completed")]
    Superseded,

    /// An order was requested for an empty cart.
    #[error("Cart is empty")]
    EmptyCart,
}

impl SyncError {
    /// Message suitable for a notice, preferring the server's wording.
    #[must_use]
    pub fn notice_message(&self, fallback: &str) -> String {
        match self {
            Self::RemoteRejected { message, .. } => message.clone(),
            _ => fallback.to_string(),
        }
    }
}

impl From<ApiError> for SyncError {
    fn from(err: ApiError) -> Self {
        let rejected = err.is_rejection();
        match err {
            ApiError::Status {
                status, message, ..
            } if rejected => Self::RemoteRejected { status, message },
            other => Self::RemoteUnavailable(other.to_string()),
        }
    }
}
