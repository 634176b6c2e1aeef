use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failures reported by a signing provider at its boundary
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum ProviderError {
    #[error("User rejected the request: {0}")]
    UserRejected(String),
    #[error("Provider request failed: {0}")]
    Request(String),
    #[error("Transaction reverted: {0}")]
    Reverted(String),
    #[error("Timed out waiting for the network")]
    Timeout,
    #[error("Provider is no longer available")]
    Unavailable,
}

/// Stable, serializable tag for every [`OnboardingError`] variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    NoProvider,
    ConnectionDenied,
    NotConnected,
    UnknownRole,
    IncompleteForm,
    SubmissionRejected,
    ConfirmationTimeout,
    ConfirmationFailed,
    Contract,
}

// Top-level error for the onboarding flow.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum OnboardingError {
    #[error("No signing provider detected. Install or enable a browser wallet to continue.")]
    NoProvider,
    #[error("Account access was denied: {0}")]
    ConnectionDenied(String),
    #[error("Please connect your wallet first.")]
    NotConnected,
    #[error("No schema registered for role '{0}'")]
    UnknownRole(String),
    #[error("Registration form is incomplete, missing: {}", .0.join(", "))]
    IncompleteForm(Vec<String>),
    #[error("Transaction was not signed: {0}")]
    SubmissionRejected(String),
    #[error("Timed out waiting for confirmation of transaction {0}")]
    ConfirmationTimeout(String),
    #[error("Transaction {transaction} failed: {reason}")]
    ConfirmationFailed { transaction: String, reason: String },
    #[error("Contract configuration error: {0}")]
    Contract(String),
}

impl OnboardingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            OnboardingError::NoProvider => ErrorKind::NoProvider,
            OnboardingError::ConnectionDenied(_) => ErrorKind::ConnectionDenied,
            OnboardingError::NotConnected => ErrorKind::NotConnected,
            OnboardingError::UnknownRole(_) => ErrorKind::UnknownRole,
            OnboardingError::IncompleteForm(_) => ErrorKind::IncompleteForm,
            OnboardingError::SubmissionRejected(_) => ErrorKind::SubmissionRejected,
            OnboardingError::ConfirmationTimeout(_) => ErrorKind::ConfirmationTimeout,
            OnboardingError::ConfirmationFailed { .. } => ErrorKind::ConfirmationFailed,
            OnboardingError::Contract(_) => ErrorKind::Contract,
        }
    }

    /// Whether the user can recover by acting in the UI (connecting, editing, re-signing).
    ///
    /// `UnknownRole` and `Contract` point at a broken deployment rather than at user input.
    pub fn is_user_recoverable(&self) -> bool {
        !matches!(
            self,
            OnboardingError::UnknownRole(_) | OnboardingError::Contract(_)
        )
    }
}

/// Errors raised while loading [`crate::config::OnboardingConfig`]
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid config value: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_matches_variant() {
        assert_eq!(OnboardingError::NoProvider.kind(), ErrorKind::NoProvider);
        assert_eq!(
            OnboardingError::ConfirmationFailed {
                transaction: "0x01".to_string(),
                reason: "reverted".to_string(),
            }
            .kind(),
            ErrorKind::ConfirmationFailed
        );
        assert_eq!(
            OnboardingError::IncompleteForm(vec!["role".to_string()]).kind(),
            ErrorKind::IncompleteForm
        );
    }

    #[test]
    fn test_incomplete_form_message_lists_fields() {
        let err = OnboardingError::IncompleteForm(vec!["role".to_string(), "username".to_string()]);
        assert_eq!(
            err.to_string(),
            "Registration form is incomplete, missing: role, username"
        );
    }

    #[test]
    fn test_recoverability() {
        assert!(OnboardingError::NotConnected.is_user_recoverable());
        assert!(OnboardingError::SubmissionRejected("cancelled".to_string()).is_user_recoverable());
        assert!(!OnboardingError::UnknownRole("Doctor".to_string()).is_user_recoverable());
        assert!(!OnboardingError::Contract("bad abi".to_string()).is_user_recoverable());
    }

    #[test]
    fn test_error_kind_serializes_as_name() {
        let json = serde_json::to_string(&ErrorKind::ConfirmationTimeout).unwrap();
        assert_eq!(json, "\"ConfirmationTimeout\"");
    }
}
