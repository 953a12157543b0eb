// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Error types for backend API calls, identity-provider operations and
//! CLI pages.

use crate::auth::AuthPhase;

/// Message used when the backend's error body cannot be decoded.
pub const GENERIC_ERROR_MESSAGE: &str = "An error occurred";

/// Error returned by the Summit backend REST client.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Non-2xx response. `message` is the backend's `{"error": ...}` text.
    #[error("{message}")]
    Status { status: u16, message: String },

    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Invalid response body: {0}")]
    Decode(String),

    #[error("Invalid request: {0}")]
    Invalid(String),

    #[error("Request timed out")]
    Timeout,
}

impl ApiError {
    /// HTTP status, when the backend answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            ApiError::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// 404 and 401 on the profile endpoint mean "no profile yet", not a fault.
    pub fn is_absent_profile(&self) -> bool {
        matches!(self.status(), Some(404) | Some(401))
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ApiError::Invalid(errors.to_string())
    }
}

/// Error returned by the identity provider or session storage.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Rejection from the provider, carrying its human-readable message.
    #[error("{0}")]
    Provider(String),

    #[error("Identity provider unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Session storage error: {0}")]
    Storage(String),

    #[error("Invalid access token: {0}")]
    InvalidToken(String),

    #[error("Identity provider timed out")]
    Timeout,

    #[error("No pending OAuth sign-in (missing code verifier)")]
    MissingVerifier,

    #[error("Secure random number generator unavailable")]
    Random,
}

impl From<std::io::Error> for AuthError {
    fn from(e: std::io::Error) -> Self {
        AuthError::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(e: serde_json::Error) -> Self {
        AuthError::Storage(e.to_string())
    }
}

/// Error shown to the user by a CLI page.
#[derive(Debug, thiserror::Error)]
pub enum PageError {
    #[error("Not signed in ({0})")]
    NotReady(AuthPhase),

    #[error("Set up your profile first with `summit profile setup`")]
    NeedsProfile,

    /// A gated request failed; carries the recorded error text.
    #[error("{0}")]
    Request(String),

    #[error(transparent)]
    Api(#[from] ApiError),

    /// Input rejected before anything was sent.
    #[error("{0}")]
    Invalid(String),
}

/// Result type alias for backend calls
pub type Result<T> = std::result::Result<T, ApiError>;
