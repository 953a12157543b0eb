// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Client configuration loaded from environment variables.
//!
//! A `.env` file in the working directory is honored for local development.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::auth::CoordinatorSettings;

/// Client configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Summit backend base URL (no trailing slash)
    pub api_url: String,
    /// Supabase project URL; the auth API lives under `/auth/v1`
    pub supabase_url: Option<String>,
    /// Public anon key sent as the `apikey` header
    pub supabase_anon_key: Option<String>,
    /// Pre-issued bearer token; bypasses interactive sign-in when set
    pub access_token: Option<String>,
    /// Where the identity provider session is persisted
    pub session_file: PathBuf,
    /// OAuth callback URL registered with the provider
    pub oauth_redirect: String,
    /// Per-request timeout for the HTTP clients
    pub http_timeout: Duration,
    /// Coordinator timeouts and retry bounds
    pub coordinator: CoordinatorSettings,
    /// Bound on token retrieval inside the readiness gate
    pub token_timeout: Duration,
}

impl Config {
    /// Config for tests: local URLs, in-repo session file, short timeouts.
    pub fn test_default() -> Self {
        Self {
            api_url: "http://localhost:8080".to_string(),
            supabase_url: Some("http://localhost:54321".to_string()),
            supabase_anon_key: Some("test-anon-key".to_string()),
            access_token: None,
            session_file: PathBuf::from("target/test-session.json"),
            oauth_redirect: "http://localhost:3000/auth/callback".to_string(),
            http_timeout: Duration::from_secs(5),
            coordinator: CoordinatorSettings::default(),
            token_timeout: Duration::from_secs(3),
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let access_token = non_empty("SUMMIT_ACCESS_TOKEN");
        let supabase_url = non_empty("SUPABASE_URL").map(|u| u.trim_end_matches('/').to_string());
        let supabase_anon_key = non_empty("SUPABASE_ANON_KEY");

        // Interactive auth needs the provider; a raw token does not.
        if access_token.is_none() {
            if supabase_url.is_none() {
                return Err(ConfigError::Missing("SUPABASE_URL"));
            }
            if supabase_anon_key.is_none() {
                return Err(ConfigError::Missing("SUPABASE_ANON_KEY"));
            }
        }

        let defaults = CoordinatorSettings::default();
        let coordinator = CoordinatorSettings {
            ready_timeout: millis("SUMMIT_READY_TIMEOUT_MS", defaults.ready_timeout)?,
            profile_timeout: millis("SUMMIT_PROFILE_TIMEOUT_MS", defaults.profile_timeout)?,
            probe_timeout: millis("SUMMIT_PROBE_TIMEOUT_MS", defaults.probe_timeout)?,
            probe_attempts: parse_or("SUMMIT_PROBE_ATTEMPTS", defaults.probe_attempts)?,
            probe_backoff: millis("SUMMIT_PROBE_BACKOFF_MS", defaults.probe_backoff)?,
        };
        if coordinator.probe_attempts == 0 {
            return Err(ConfigError::Invalid("SUMMIT_PROBE_ATTEMPTS", "0".to_string()));
        }

        Ok(Self {
            api_url: env::var("SUMMIT_API_URL")
                .unwrap_or_else(|_| "http://localhost:8080".to_string())
                .trim_end_matches('/')
                .to_string(),
            supabase_url,
            supabase_anon_key,
            access_token,
            session_file: non_empty("SUMMIT_SESSION_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(default_session_file),
            oauth_redirect: env::var("SUMMIT_OAUTH_REDIRECT")
                .unwrap_or_else(|_| "http://localhost:3000/auth/callback".to_string()),
            http_timeout: Duration::from_secs(parse_or("SUMMIT_HTTP_TIMEOUT_SECS", 10)?),
            coordinator,
            token_timeout: millis("SUMMIT_TOKEN_TIMEOUT_MS", Duration::from_millis(3000))?,
        })
    }
}

fn non_empty(key: &'static str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_or<T: std::str::FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match non_empty(key) {
        Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid(key, raw)),
        None => Ok(default),
    }
}

fn millis(key: &'static str, default: Duration) -> Result<Duration, ConfigError> {
    let ms: u64 = parse_or(key, default.as_millis() as u64)?;
    Ok(Duration::from_millis(ms))
}

fn default_session_file() -> PathBuf {
    match env::var("HOME") {
        Ok(home) => PathBuf::from(home).join(".summit").join("session.json"),
        Err(_) => PathBuf::from(".summit-session.json"),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}
