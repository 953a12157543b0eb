// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session store backed by a pre-issued access token.
//!
//! Useful for scripts and CI: export a token obtained elsewhere as
//! `SUMMIT_ACCESS_TOKEN` and skip interactive sign-in. The token is never
//! verified locally; the backend does that. Claims are only read to learn
//! the user id and expiry.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::broadcast;

use crate::error::AuthError;
use crate::models::{AuthChange, AuthChangeEvent, OAuthProvider, OAuthRedirect, Session, User};
use crate::services::identity::{SessionStore, EVENT_CHANNEL_CAPACITY};

const INTERACTIVE_DISABLED: &str =
    "Interactive sign-in is disabled while an access token is configured";

/// Claims read from a provider-issued JWT.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenClaims {
    /// Provider user id
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    /// Expiration time (Unix timestamp)
    #[serde(default)]
    pub exp: Option<i64>,
}

/// Read claims without checking the signature, audience or expiry.
pub fn decode_claims(token: &str) -> Result<TokenClaims, AuthError> {
    let header =
        jsonwebtoken::decode_header(token).map_err(|e| AuthError::InvalidToken(e.to_string()))?;

    let mut validation = Validation::new(header.alg);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    let data = decode::<TokenClaims>(token, &DecodingKey::from_secret(&[]), &validation)
        .map_err(|e| AuthError::InvalidToken(e.to_string()))?;
    Ok(data.claims)
}

/// Read-only session store for a fixed bearer token.
pub struct StaticTokenStore {
    session: Session,
    signed_out: AtomicBool,
    events: broadcast::Sender<AuthChange>,
}

impl StaticTokenStore {
    pub fn new(access_token: &str) -> Result<Self, AuthError> {
        let access_token = access_token.trim();
        let claims = decode_claims(access_token)?;
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(Self {
            session: Session {
                access_token: access_token.to_string(),
                refresh_token: None,
                token_type: "bearer".to_string(),
                expires_in: None,
                expires_at: claims.exp,
                user: User {
                    id: claims.sub,
                    email: claims.email,
                },
            },
            signed_out: AtomicBool::new(false),
            events,
        })
    }
}

#[async_trait]
impl SessionStore for StaticTokenStore {
    async fn get_session(&self) -> Result<Option<Session>, AuthError> {
        if self.signed_out.load(Ordering::SeqCst) {
            return Ok(None);
        }
        if self.session.expires_within(Duration::zero(), Utc::now()) {
            tracing::warn!(user_id = %self.session.user.id, "Configured access token has expired");
            return Ok(None);
        }
        Ok(Some(self.session.clone()))
    }

    async fn sign_in_with_password(
        &self,
        _email: &str,
        _password: &str,
    ) -> Result<Session, AuthError> {
        Err(AuthError::Provider(INTERACTIVE_DISABLED.to_string()))
    }

    async fn sign_up(&self, _email: &str, _password: &str) -> Result<Option<Session>, AuthError> {
        Err(AuthError::Provider(INTERACTIVE_DISABLED.to_string()))
    }

    fn authorize_url(
        &self,
        _provider: OAuthProvider,
        _redirect_to: &str,
    ) -> Result<OAuthRedirect, AuthError> {
        Err(AuthError::Provider(INTERACTIVE_DISABLED.to_string()))
    }

    async fn exchange_code(&self, _auth_code: &str) -> Result<Session, AuthError> {
        Err(AuthError::Provider(INTERACTIVE_DISABLED.to_string()))
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        self.signed_out.store(true, Ordering::SeqCst);
        let _ = self
            .events
            .send(AuthChange::new(AuthChangeEvent::SignedOut, None));
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthChange> {
        self.events.subscribe()
    }
}
