// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Identity-provider session store.
//!
//! [`SessionStore`] is the seam the auth coordinator depends on.
//! [`GoTrueStore`] implements it against the Supabase Auth REST API:
//! - Password sign-in and sign-up
//! - OAuth with PKCE (authorize URL + code exchange)
//! - Session persistence through [`SessionStorage`]
//! - Transparent refresh of expiring sessions
//! - Auth-change broadcast to subscribers

use async_trait::async_trait;
use chrono::{Duration, Utc};
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};

use crate::error::AuthError;
use crate::models::{AuthChange, AuthChangeEvent, OAuthProvider, OAuthRedirect, Session};
use crate::services::pkce::PkcePair;
use crate::services::storage::SessionStorage;

/// Refresh sessions this close to expiry (1 minute).
const REFRESH_MARGIN_SECS: i64 = 60;

/// Buffered auth-change events per subscriber.
pub const EVENT_CHANNEL_CAPACITY: usize = 32;

/// Session primitives of an identity provider.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Current session, refreshed if it is about to expire. `None` when
    /// signed out.
    async fn get_session(&self) -> Result<Option<Session>, AuthError>;

    async fn sign_in_with_password(&self, email: &str, password: &str)
        -> Result<Session, AuthError>;

    /// Register a new account. `None` when the provider requires email
    /// confirmation before issuing a session.
    async fn sign_up(&self, email: &str, password: &str) -> Result<Option<Session>, AuthError>;

    /// Start an OAuth sign-in; the caller sends the user to the returned URL.
    fn authorize_url(
        &self,
        provider: OAuthProvider,
        redirect_to: &str,
    ) -> Result<OAuthRedirect, AuthError>;

    /// Finish an OAuth sign-in with the code from the callback URL.
    async fn exchange_code(&self, auth_code: &str) -> Result<Session, AuthError>;

    /// End the session. Local state is cleared even if the provider call fails.
    async fn sign_out(&self) -> Result<(), AuthError>;

    fn subscribe(&self) -> broadcast::Receiver<AuthChange>;
}

/// Supabase Auth (GoTrue) session store.
pub struct GoTrueStore {
    http: reqwest::Client,
    /// `{project_url}/auth/v1`
    auth_url: String,
    anon_key: String,
    storage: Arc<dyn SessionStorage>,
    storage_key: String,
    events: broadcast::Sender<AuthChange>,
    /// Serializes refreshes so one expiring token is refreshed once.
    refresh_lock: Mutex<()>,
}

impl GoTrueStore {
    pub fn new(
        project_url: &str,
        anon_key: impl Into<String>,
        storage: Arc<dyn SessionStorage>,
        http: reqwest::Client,
    ) -> Self {
        let project_url = project_url.trim_end_matches('/');
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            http,
            auth_url: format!("{}/auth/v1", project_url),
            anon_key: anon_key.into(),
            storage,
            storage_key: storage_key_for(project_url),
            events,
            refresh_lock: Mutex::new(()),
        }
    }

    /// Storage key holding the serialized session.
    pub fn storage_key(&self) -> &str {
        &self.storage_key
    }

    fn verifier_key(&self) -> String {
        format!("{}-code-verifier", self.storage_key)
    }

    fn emit(&self, event: AuthChangeEvent, session: Option<Session>) {
        // No subscribers is fine.
        let _ = self.events.send(AuthChange::new(event, session));
    }

    // ─── Session persistence ─────────────────────────────────────────────────

    fn load_session(&self) -> Result<Option<Session>, AuthError> {
        let Some(raw) = self.storage.get_item(&self.storage_key)? else {
            return Ok(None);
        };
        match serde_json::from_str::<Session>(&raw) {
            Ok(session) => Ok(Some(session)),
            Err(e) => {
                tracing::warn!(error = %e, "Discarding unreadable stored session");
                self.storage.remove_item(&self.storage_key)?;
                Ok(None)
            }
        }
    }

    fn save_session(&self, session: &Session) -> Result<(), AuthError> {
        let raw = serde_json::to_string(session)?;
        self.storage.set_item(&self.storage_key, &raw)
    }

    fn clear_session(&self) -> Result<(), AuthError> {
        self.storage.remove_item(&self.storage_key)
    }

    /// Persist a fresh session and announce it.
    fn establish(&self, session: Session, event: AuthChangeEvent) -> Result<Session, AuthError> {
        let session = session.with_expiry_from(Utc::now());
        self.save_session(&session)?;
        tracing::info!(user_id = %session.user.id, ?event, "Session established");
        self.emit(event, Some(session.clone()));
        Ok(session)
    }

    // ─── HTTP helpers ────────────────────────────────────────────────────────

    async fn post(
        &self,
        path: &str,
        grant_type: Option<&str>,
        body: Value,
        bearer: Option<&str>,
    ) -> Result<(StatusCode, Value), AuthError> {
        let mut request = self
            .http
            .post(format!("{}{}", self.auth_url, path))
            .header("apikey", &self.anon_key);
        if !body.is_null() {
            request = request.json(&body);
        }
        if let Some(grant_type) = grant_type {
            request = request.query(&[("grant_type", grant_type)]);
        }
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = if status.is_success() {
            response.text().await?
        } else {
            response.text().await.unwrap_or_default()
        };
        let value = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };
        Ok((status, value))
    }

    /// Token endpoint call that must yield a session.
    async fn token_grant(&self, grant_type: &str, body: Value) -> Result<Session, AuthError> {
        let (status, value) = self.post("/token", Some(grant_type), body, None).await?;
        if !status.is_success() {
            return Err(AuthError::Provider(provider_message(status, &value)));
        }
        serde_json::from_value(value)
            .map_err(|e| AuthError::Provider(format!("Unexpected token response: {}", e)))
    }

    async fn refresh(&self, session: &Session) -> Result<Option<Session>, AuthError> {
        let Some(refresh_token) = session.refresh_token.as_deref() else {
            tracing::info!("Session expired without refresh token, signing out");
            self.clear_session()?;
            self.emit(AuthChangeEvent::SignedOut, None);
            return Ok(None);
        };

        let (status, value) = self
            .post(
                "/token",
                Some("refresh_token"),
                json!({ "refresh_token": refresh_token }),
                None,
            )
            .await?;

        if status.is_success() {
            let refreshed: Session = serde_json::from_value(value)
                .map_err(|e| AuthError::Provider(format!("Unexpected token response: {}", e)))?;
            return self
                .establish(refreshed, AuthChangeEvent::TokenRefreshed)
                .map(Some);
        }

        if status.is_client_error() {
            // Refresh token revoked or already used.
            tracing::info!(
                status = status.as_u16(),
                error = %provider_message(status, &value),
                "Session refresh rejected, signing out"
            );
            self.clear_session()?;
            self.emit(AuthChangeEvent::SignedOut, None);
            return Ok(None);
        }

        Err(AuthError::Provider(provider_message(status, &value)))
    }
}

#[async_trait]
impl SessionStore for GoTrueStore {
    async fn get_session(&self) -> Result<Option<Session>, AuthError> {
        let margin = Duration::seconds(REFRESH_MARGIN_SECS);

        let Some(session) = self.load_session()? else {
            return Ok(None);
        };
        if !session.expires_within(margin, Utc::now()) {
            return Ok(Some(session));
        }

        let _guard = self.refresh_lock.lock().await;

        // Another caller may have refreshed while we waited.
        let Some(session) = self.load_session()? else {
            return Ok(None);
        };
        if !session.expires_within(margin, Utc::now()) {
            return Ok(Some(session));
        }

        tracing::debug!(user_id = %session.user.id, "Access token expiring, refreshing");
        self.refresh(&session).await
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, AuthError> {
        let session = self
            .token_grant("password", json!({ "email": email, "password": password }))
            .await?;
        self.establish(session, AuthChangeEvent::SignedIn)
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<Option<Session>, AuthError> {
        let (status, value) = self
            .post(
                "/signup",
                None,
                json!({ "email": email, "password": password }),
                None,
            )
            .await?;
        if !status.is_success() {
            return Err(AuthError::Provider(provider_message(status, &value)));
        }

        if value.get("access_token").is_none() {
            tracing::info!(email, "Sign-up pending email confirmation");
            return Ok(None);
        }
        let session: Session = serde_json::from_value(value)
            .map_err(|e| AuthError::Provider(format!("Unexpected sign-up response: {}", e)))?;
        self.establish(session, AuthChangeEvent::SignedIn).map(Some)
    }

    fn authorize_url(
        &self,
        provider: OAuthProvider,
        redirect_to: &str,
    ) -> Result<OAuthRedirect, AuthError> {
        let pkce = PkcePair::generate()?;
        self.storage.set_item(&self.verifier_key(), &pkce.verifier)?;

        let url = format!(
            "{}/authorize?\
             provider={}&\
             redirect_to={}&\
             code_challenge={}&\
             code_challenge_method=s256",
            self.auth_url,
            provider.as_str(),
            urlencoding::encode(redirect_to),
            pkce.challenge
        );

        tracing::info!(%provider, redirect_to, "Starting OAuth sign-in");
        Ok(OAuthRedirect { provider, url })
    }

    async fn exchange_code(&self, auth_code: &str) -> Result<Session, AuthError> {
        let key = self.verifier_key();
        let verifier = self
            .storage
            .get_item(&key)?
            .ok_or(AuthError::MissingVerifier)?;

        let session = self
            .token_grant(
                "pkce",
                json!({ "auth_code": auth_code, "code_verifier": verifier }),
            )
            .await?;
        // The verifier is single-use.
        self.storage.remove_item(&key)?;
        self.establish(session, AuthChangeEvent::SignedIn)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        let remote = match self.load_session()? {
            Some(session) => {
                match self
                    .post("/logout", None, Value::Null, Some(&session.access_token))
                    .await
                {
                    // Already invalid on the provider side.
                    Ok((status, _))
                        if status.is_success()
                            || matches!(status.as_u16(), 401 | 403 | 404) =>
                    {
                        Ok(())
                    }
                    Ok((status, value)) => {
                        Err(AuthError::Provider(provider_message(status, &value)))
                    }
                    Err(e) => Err(e),
                }
            }
            None => Ok(()),
        };

        self.clear_session()?;
        self.emit(AuthChangeEvent::SignedOut, None);
        tracing::info!("Signed out");
        remote
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthChange> {
        self.events.subscribe()
    }
}

/// `sb-<project-ref>-auth-token`, where the ref is the first host label.
fn storage_key_for(project_url: &str) -> String {
    let host = project_url
        .split("://")
        .nth(1)
        .unwrap_or(project_url);
    let label = host
        .split(['.', ':', '/'])
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or("local");
    format!("sb-{}-auth-token", label)
}

/// Human-readable message from a provider error body.
pub fn provider_message(status: StatusCode, body: &Value) -> String {
    for key in ["error_description", "msg", "message", "error"] {
        if let Some(message) = body.get(key).and_then(Value::as_str) {
            if !message.trim().is_empty() {
                return message.to_string();
            }
        }
    }
    match body {
        Value::String(text) if !text.trim().is_empty() => text.clone(),
        _ => format!("Authentication failed (HTTP {})", status.as_u16()),
    }
}
