//! Error types for remote calls and catalog fetches.

use std::fmt;

use thiserror::Error;

/// Error codes reported by the managed record database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteErrorCode {
    NetworkUnavailable,
    NetworkFailure,
    ServiceUnavailable,
    RequestRateLimited,
    ZoneBusy,
    NotAuthenticated,
    PermissionFailure,
    UnknownItem,
    ReferenceViolation,
    InvalidArguments,
    ServerRejectedRequest,
    QuotaExceeded,
    InternalError,
}

impl fmt::Display for RemoteErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RemoteErrorCode::NetworkUnavailable => "network unavailable",
            RemoteErrorCode::NetworkFailure => "network failure",
            RemoteErrorCode::ServiceUnavailable => "service unavailable",
            RemoteErrorCode::RequestRateLimited => "request rate limited",
            RemoteErrorCode::ZoneBusy => "zone busy",
            RemoteErrorCode::NotAuthenticated => "not authenticated",
            RemoteErrorCode::PermissionFailure => "permission failure",
            RemoteErrorCode::UnknownItem => "unknown item",
            RemoteErrorCode::ReferenceViolation => "reference violation",
            RemoteErrorCode::InvalidArguments => "invalid arguments",
            RemoteErrorCode::ServerRejectedRequest => "server rejected request",
            RemoteErrorCode::QuotaExceeded => "quota exceeded",
            RemoteErrorCode::InternalError => "internal error",
        };
        f.write_str(name)
    }
}

/// A failure returned by a remote collaborator, for a whole page or a single record.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{code}: {message}")]
pub struct RemoteError {
    pub code: RemoteErrorCode,
    pub message: String,
}

impl RemoteError {
    pub fn new(code: RemoteErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Coarse classification of fetch failures, driving retry and user messaging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchErrorKind {
    /// Connectivity, availability or throttling. Retried.
    Network,
    /// Authentication or authorization failure.
    Permissions,
    /// Unknown or invalid record reference.
    DataCorruption,
    Unknown,
}

impl FetchErrorKind {
    pub fn classify(code: RemoteErrorCode) -> Self {
        match code {
            RemoteErrorCode::NetworkUnavailable
            | RemoteErrorCode::NetworkFailure
            | RemoteErrorCode::ServiceUnavailable
            | RemoteErrorCode::RequestRateLimited
            | RemoteErrorCode::ZoneBusy => FetchErrorKind::Network,
            RemoteErrorCode::NotAuthenticated | RemoteErrorCode::PermissionFailure => {
                FetchErrorKind::Permissions
            }
            RemoteErrorCode::UnknownItem | RemoteErrorCode::ReferenceViolation => {
                FetchErrorKind::DataCorruption
            }
            _ => FetchErrorKind::Unknown,
        }
    }

    pub fn is_retryable(self) -> bool {
        matches!(self, FetchErrorKind::Network)
    }

    /// Text shown in the transient status message.
    pub fn user_message(self) -> &'static str {
        match self {
            FetchErrorKind::Network => {
                "Couldn't reach the recipe service. Check your connection and try again."
            }
            FetchErrorKind::Permissions => {
                "Access to the recipe service was denied. Check that you are signed in to your account."
            }
            FetchErrorKind::DataCorruption => {
                "The recipe data could not be read. Try again later."
            }
            FetchErrorKind::Unknown => "Something went wrong while loading recipes.",
        }
    }
}

impl fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchErrorKind::Network => write!(f, "network"),
            FetchErrorKind::Permissions => write!(f, "permissions"),
            FetchErrorKind::DataCorruption => write!(f, "data corruption"),
            FetchErrorKind::Unknown => write!(f, "unknown"),
        }
    }
}

/// A catalog fetch that was abandoned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("catalog fetch failed after {attempts} attempt(s) ({kind}): {source}")]
pub struct FetchError {
    pub kind: FetchErrorKind,
    pub attempts: u32,
    #[source]
    pub source: RemoteError,
}

impl FetchError {
    pub fn new(source: RemoteError, attempts: u32) -> Self {
        Self {
            kind: FetchErrorKind::classify(source.code),
            attempts,
            source,
        }
    }

    pub fn user_message(&self) -> &'static str {
        self.kind.user_message()
    }
}

/// Why a remote record could not become a recipe.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("record {record}: missing required field `{field}`")]
    MissingField { record: String, field: &'static str },

    #[error("record {record}: field `{field}` is invalid: {reason}")]
    InvalidField {
        record: String,
        field: String,
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_network_codes_are_retryable() {
        for code in [
            RemoteErrorCode::NetworkUnavailable,
            RemoteErrorCode::NetworkFailure,
            RemoteErrorCode::ServiceUnavailable,
            RemoteErrorCode::RequestRateLimited,
            RemoteErrorCode::ZoneBusy,
        ] {
            let kind = FetchErrorKind::classify(code);
            assert_eq!(kind, FetchErrorKind::Network, "{code}");
            assert!(kind.is_retryable());
        }
    }

    #[test]
    fn test_classify_non_retryable_codes() {
        assert_eq!(
            FetchErrorKind::classify(RemoteErrorCode::NotAuthenticated),
            FetchErrorKind::Permissions
        );
        assert_eq!(
            FetchErrorKind::classify(RemoteErrorCode::PermissionFailure),
            FetchErrorKind::Permissions
        );
        assert_eq!(
            FetchErrorKind::classify(RemoteErrorCode::UnknownItem),
            FetchErrorKind::DataCorruption
        );
        assert_eq!(
            FetchErrorKind::classify(RemoteErrorCode::ReferenceViolation),
            FetchErrorKind::DataCorruption
        );
        assert_eq!(
            FetchErrorKind::classify(RemoteErrorCode::QuotaExceeded),
            FetchErrorKind::Unknown
        );
        assert!(!FetchErrorKind::Permissions.is_retryable());
        assert!(!FetchErrorKind::DataCorruption.is_retryable());
        assert!(!FetchErrorKind::Unknown.is_retryable());
    }

    #[test]
    fn test_fetch_error_display() {
        let err = FetchError::new(
            RemoteError::new(RemoteErrorCode::NotAuthenticated, "no account"),
            1,
        );
        assert_eq!(err.kind, FetchErrorKind::Permissions);
        assert_eq!(
            err.to_string(),
            "catalog fetch failed after 1 attempt(s) (permissions): not authenticated: no account"
        );
        assert!(err.user_message().contains("signed in"));
    }
}
