//! Authentication and authorization error types.
//!
//! Every failure in the session flow is local to one page or command and is
//! recoverable by retrying; nothing here is fatal to the process.

use std::fmt;

/// Errors that can occur while authenticating, refreshing or authorizing.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Bad credentials or the backend refused to issue tokens.
    #[error("Authentication failed: {message}")]
    AuthenticationFailed {
        /// Description of why authentication failed.
        message: String,
    },

    /// The session is valid but may not perform the action, e.g. choosing a
    /// role when one is already set.
    #[error("Forbidden: {message}")]
    Forbidden {
        /// Description of why access is forbidden.
        message: String,
    },

    /// The backend could not be reached or did not answer in time.
    #[error("Network error: {message}")]
    Network {
        /// Description of the transport failure.
        message: String,
    },

    /// Client-side input checks failed; no request was sent.
    #[error("Validation failed for {field}: {message}")]
    Validation {
        /// The offending input field.
        field: String,
        /// Description of the problem.
        message: String,
    },

    /// The backend answered with an unexpected non-success status.
    #[error("Backend rejected request ({status}): {message}")]
    BackendRejected {
        /// HTTP status returned by the backend.
        status: u16,
        /// Response body or summary.
        message: String,
    },

    /// The persisted session token is malformed or its signature is wrong.
    #[error("Invalid session: {message}")]
    InvalidSession {
        /// Description of why the session was rejected.
        message: String,
    },

    /// The session outlived its maximum age.
    #[error("Session expired")]
    SessionExpired,

    /// An OAuth provider returned an error or an unusable profile.
    #[error("Identity provider error: {provider} - {message}")]
    IdentityProvider {
        /// The provider id.
        provider: String,
        /// Description of the error.
        message: String,
    },

    /// The auth configuration is invalid.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration error.
        message: String,
    },

    /// An unexpected internal error occurred.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl AuthError {
    /// Creates a new `AuthenticationFailed` error.
    #[must_use]
    pub fn authentication_failed(message: impl Into<String>) -> Self {
        Self::AuthenticationFailed {
            message: message.into(),
        }
    }

    /// Creates a new `Forbidden` error.
    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
        }
    }

    /// Creates a new `Network` error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Creates a new `Validation` error.
    #[must_use]
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Creates a new `BackendRejected` error.
    #[must_use]
    pub fn backend_rejected(status: u16, message: impl Into<String>) -> Self {
        Self::BackendRejected {
            status,
            message: message.into(),
        }
    }

    /// Creates a new `InvalidSession` error.
    #[must_use]
    pub fn invalid_session(message: impl Into<String>) -> Self {
        Self::InvalidSession {
            message: message.into(),
        }
    }

    /// Creates a new `IdentityProvider` error.
    #[must_use]
    pub fn identity_provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::IdentityProvider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Creates a new `Configuration` error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` if the user can fix this by changing their input.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::AuthenticationFailed { .. }
                | Self::Forbidden { .. }
                | Self::Validation { .. }
                | Self::InvalidSession { .. }
                | Self::SessionExpired
        )
    }

    /// Returns `true` if this failure should read as "no session".
    #[must_use]
    pub fn is_session_error(&self) -> bool {
        matches!(self, Self::InvalidSession { .. } | Self::SessionExpired)
    }

    /// Returns the error category for logging.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::AuthenticationFailed { .. } => ErrorCategory::Authentication,
            Self::Forbidden { .. } => ErrorCategory::Authorization,
            Self::Network { .. } => ErrorCategory::Network,
            Self::Validation { .. } => ErrorCategory::Validation,
            Self::BackendRejected { .. } => ErrorCategory::Backend,
            Self::InvalidSession { .. } | Self::SessionExpired => ErrorCategory::Session,
            Self::IdentityProvider { .. } => ErrorCategory::Federation,
            Self::Configuration { .. } => ErrorCategory::Configuration,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }

    /// Message suitable for showing inline on a form.
    ///
    /// Transport and server details are never shown to the user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::AuthenticationFailed { .. } => "Invalid email or password.".to_string(),
            Self::Validation { message, .. } => message.clone(),
            Self::Network { .. } => {
                "Could not reach the server. Please try again.".to_string()
            }
            Self::InvalidSession { .. } | Self::SessionExpired => {
                "Your session has ended. Please sign in again.".to_string()
            }
            Self::Forbidden { .. } => "Your role has already been chosen.".to_string(),
            Self::IdentityProvider { .. } => {
                "Sign-in with the external provider failed.".to_string()
            }
            Self::BackendRejected { .. } | Self::Configuration { .. } | Self::Internal { .. } => {
                "Something went wrong. Please try again.".to_string()
            }
        }
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return Self::internal(format!("malformed backend response: {err}"));
        }
        if let Some(status) = err.status() {
            return Self::backend_rejected(status.as_u16(), err.to_string());
        }
        Self::network(err.to_string())
    }
}

/// Categories of auth errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Identity could not be established.
    Authentication,
    /// Identity established, access denied.
    Authorization,
    /// Transport failures.
    Network,
    /// Client-side input checks.
    Validation,
    /// Unexpected backend answers.
    Backend,
    /// Session token problems.
    Session,
    /// External OAuth provider failures.
    Federation,
    /// Configuration problems.
    Configuration,
    /// Anything else.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Authentication => write!(f, "authentication"),
            Self::Authorization => write!(f, "authorization"),
            Self::Network => write!(f, "network"),
            Self::Validation => write!(f, "validation"),
            Self::Backend => write!(f, "backend"),
            Self::Session => write!(f, "session"),
            Self::Federation => write!(f, "federation"),
            Self::Configuration => write!(f, "configuration"),
            Self::Internal => write!(f, "internal"),
        }
    }
}
