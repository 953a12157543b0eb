// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared fixtures: scripted session store and profile source, plus
//! in-process axum servers standing in for the backend and the identity
//! provider.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use summit_client::auth::{AuthCoordinator, CoordinatorSettings, ProfileSource};
use summit_client::error::{ApiError, AuthError};
use summit_client::models::{
    AuthChange, AuthChangeEvent, OAuthProvider, OAuthRedirect, Profile, Session, User,
};
use summit_client::services::SessionStore;
use tokio::sync::broadcast;

pub const PASSWORD: &str = "correct horse";

pub fn session(user_id: &str, token: &str) -> Session {
    Session {
        access_token: token.to_string(),
        refresh_token: Some(format!("refresh-{}", token)),
        token_type: "bearer".to_string(),
        expires_in: Some(3600),
        expires_at: None,
        user: User {
            id: user_id.to_string(),
            email: Some(format!("{}@example.com", user_id)),
        },
    }
}

pub fn profile(user_id: &str, name: &str, credits: i64) -> Profile {
    Profile {
        id: user_id.to_string(),
        name: name.to_string(),
        avatar_url: None,
        skills: vec!["rust".to_string()],
        credits,
        created_at: None,
        updated_at: None,
    }
}

/// Timeouts matching production defaults.
pub fn settings() -> CoordinatorSettings {
    CoordinatorSettings::default()
}

// ─── Scripted session store ──────────────────────────────────────────────────

/// Session store whose probe outcomes are set by the test.
pub struct FakeStore {
    session: Mutex<Option<Session>>,
    /// Remaining probes that fail before probes succeed
    failures: AtomicU32,
    /// Extra latency on every probe
    probe_delay: Mutex<Duration>,
    probes: AtomicUsize,
    fail_sign_out: AtomicBool,
    events: broadcast::Sender<AuthChange>,
}

impl FakeStore {
    pub fn new(session: Option<Session>) -> Arc<Self> {
        let (events, _) = broadcast::channel(32);
        Arc::new(Self {
            session: Mutex::new(session),
            failures: AtomicU32::new(0),
            probe_delay: Mutex::new(Duration::ZERO),
            probes: AtomicUsize::new(0),
            fail_sign_out: AtomicBool::new(false),
            events,
        })
    }

    pub fn fail_probes(&self, count: u32) {
        self.failures.store(count, Ordering::SeqCst);
    }

    pub fn delay_probes(&self, delay: Duration) {
        *self.probe_delay.lock().unwrap() = delay;
    }

    pub fn fail_sign_out(&self) {
        self.fail_sign_out.store(true, Ordering::SeqCst);
    }

    pub fn probes(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }

    /// Announce an auth change as the provider would.
    pub fn emit(&self, event: AuthChangeEvent, session: Option<Session>) {
        *self.session.lock().unwrap() = session.clone();
        let _ = self.events.send(AuthChange::new(event, session));
    }
}

#[async_trait]
impl SessionStore for FakeStore {
    async fn get_session(&self) -> Result<Option<Session>, AuthError> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        let delay = *self.probe_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let failing = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(AuthError::Provider("provider unavailable".to_string()));
        }
        Ok(self.session.lock().unwrap().clone())
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, AuthError> {
        if password != PASSWORD {
            return Err(AuthError::Provider("Invalid login credentials".to_string()));
        }
        let user_id = email.split('@').next().unwrap_or(email);
        let session = session(user_id, &format!("token-{}", user_id));
        self.emit(AuthChangeEvent::SignedIn, Some(session.clone()));
        Ok(session)
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<Option<Session>, AuthError> {
        if email.starts_with("confirm") {
            return Ok(None);
        }
        self.sign_in_with_password(email, password).await.map(Some)
    }

    fn authorize_url(
        &self,
        provider: OAuthProvider,
        redirect_to: &str,
    ) -> Result<OAuthRedirect, AuthError> {
        Ok(OAuthRedirect {
            provider,
            url: format!(
                "https://auth.test/authorize?provider={}&redirect_to={}",
                provider, redirect_to
            ),
        })
    }

    async fn exchange_code(&self, auth_code: &str) -> Result<Session, AuthError> {
        let session = session("oauth-user", &format!("token-{}", auth_code));
        self.emit(AuthChangeEvent::SignedIn, Some(session.clone()));
        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        self.emit(AuthChangeEvent::SignedOut, None);
        if self.fail_sign_out.load(Ordering::SeqCst) {
            return Err(AuthError::Provider("logout failed".to_string()));
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthChange> {
        self.events.subscribe()
    }
}

// ─── Scripted profile source ─────────────────────────────────────────────────

#[derive(Clone)]
pub enum ProfileReply {
    Found(Profile),
    Status(u16),
}

/// Profile lookups keyed by access token. Unknown tokens get a 404.
pub struct FakeProfiles {
    replies: Mutex<HashMap<String, ProfileReply>>,
    delay: Mutex<Duration>,
    calls: AtomicUsize,
}

impl FakeProfiles {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(HashMap::new()),
            delay: Mutex::new(Duration::ZERO),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn reply(&self, token: &str, reply: ProfileReply) {
        self.replies.lock().unwrap().insert(token.to_string(), reply);
    }

    pub fn delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProfileSource for FakeProfiles {
    async fn fetch_profile(&self, access_token: &str) -> Result<Profile, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let reply = self.replies.lock().unwrap().get(access_token).cloned();
        match reply {
            Some(ProfileReply::Found(profile)) => Ok(profile),
            Some(ProfileReply::Status(status)) => Err(ApiError::Status {
                status,
                message: "scripted failure".to_string(),
            }),
            None => Err(ApiError::Status {
                status: 404,
                message: "Profile not found".to_string(),
            }),
        }
    }
}

pub fn coordinator(
    store: &Arc<FakeStore>,
    profiles: &Arc<FakeProfiles>,
    settings: CoordinatorSettings,
) -> AuthCoordinator {
    AuthCoordinator::new(store.clone(), profiles.clone(), settings)
}

// ─── Mock HTTP servers ───────────────────────────────────────────────────────

/// Serve `router` on an ephemeral local port and return its base URL.
pub async fn serve(router: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind mock server");
    let addr = listener.local_addr().expect("Mock server address");
    tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });
    format!("http://{}", addr)
}

/// Raw server that promises a longer body than it sends, then hangs up on
/// every connection.
pub async fn serve_truncated(body: &'static str) -> String {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind truncating server");
    let addr = listener.local_addr().expect("Truncating server address");
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let mut request = [0u8; 4096];
            let _ = socket.read(&mut request).await;
            let head = format!(
                "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\n\r\n",
                body.len() + 64
            );
            let _ = socket.write_all(head.as_bytes()).await;
            let _ = socket.write_all(body.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
    });
    format!("http://{}", addr)
}
