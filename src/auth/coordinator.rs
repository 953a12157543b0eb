// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Process-wide auth coordinator.
//!
//! Tracks the signed-in user, their Summit profile, a cached bearer token
//! and a loading flag. State lives in a `watch` channel; every transition
//! runs inside a single `send_modify`/`send_if_modified` closure.
//!
//! Session-changing transitions bump an epoch counter. Profile fetches and
//! session probes remember the epoch they started in and drop their result
//! if it moved, so a later sign-in or sign-out always wins over an earlier
//! in-flight request.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};

use super::{CoordinatorSettings, ProfileSource};
use crate::error::AuthError;
use crate::models::{
    AuthChange, AuthChangeEvent, OAuthProvider, OAuthRedirect, Profile, Session, User,
};
use crate::services::SessionStore;

/// Snapshot of the coordinator state.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthState {
    pub user: Option<User>,
    /// Only ever set while `user` is set
    pub profile: Option<Profile>,
    pub access_token: Option<String>,
    /// True until initialization finished, gave up, or timed out
    pub loading: bool,
}

impl Default for AuthState {
    fn default() -> Self {
        Self {
            user: None,
            profile: None,
            access_token: None,
            loading: true,
        }
    }
}

impl AuthState {
    pub fn phase(&self) -> AuthPhase {
        if self.loading {
            return AuthPhase::Initializing;
        }
        match (&self.user, &self.profile) {
            (None, _) => AuthPhase::NoUser,
            (Some(_), None) => AuthPhase::UserNoProfile,
            (Some(_), Some(_)) => AuthPhase::UserWithProfile,
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.id.as_str())
    }
}

/// Coarse coordinator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthPhase {
    Initializing,
    NoUser,
    UserNoProfile,
    UserWithProfile,
}

impl fmt::Display for AuthPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AuthPhase::Initializing => "initializing",
            AuthPhase::NoUser => "signed out",
            AuthPhase::UserNoProfile => "signed in, no profile",
            AuthPhase::UserWithProfile => "signed in",
        };
        f.write_str(s)
    }
}

/// Result of [`AuthCoordinator::sign_up`].
#[derive(Debug, Clone, PartialEq)]
pub enum SignUpOutcome {
    SignedIn(AuthState),
    /// The provider sent a confirmation email; no session yet.
    ConfirmationRequired,
}

enum ProfileLookup {
    Found(Profile),
    Absent,
    Failed,
}

struct Inner {
    store: Arc<dyn SessionStore>,
    profiles: Arc<dyn ProfileSource>,
    settings: CoordinatorSettings,
    state: watch::Sender<AuthState>,
    epoch: AtomicU64,
    started: AtomicBool,
    disposed: AtomicBool,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

/// Single source of truth for who is signed in and what their profile is.
///
/// Construct with [`AuthCoordinator::new`], then call [`start`] once and
/// [`dispose`] when done. Clones share the same state.
///
/// [`start`]: AuthCoordinator::start
/// [`dispose`]: AuthCoordinator::dispose
#[derive(Clone)]
pub struct AuthCoordinator {
    inner: Arc<Inner>,
}

impl AuthCoordinator {
    pub fn new(
        store: Arc<dyn SessionStore>,
        profiles: Arc<dyn ProfileSource>,
        settings: CoordinatorSettings,
    ) -> Self {
        let (state, _) = watch::channel(AuthState::default());
        Self {
            inner: Arc::new(Inner {
                store,
                profiles,
                settings,
                state,
                epoch: AtomicU64::new(0),
                started: AtomicBool::new(false),
                disposed: AtomicBool::new(false),
                tasks: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Spawn the event listener, the initial session probe and the safety
    /// timer. Later calls do nothing.
    pub fn start(&self) {
        if self.inner.disposed.load(Ordering::SeqCst)
            || self.inner.started.swap(true, Ordering::SeqCst)
        {
            return;
        }

        // Subscribe before probing so no event between the two is lost.
        let events = self.inner.store.subscribe();
        let handles = [
            tokio::spawn(Arc::clone(&self.inner).listen(events)),
            tokio::spawn(Arc::clone(&self.inner).initialize()),
            tokio::spawn(Arc::clone(&self.inner).safety_timeout()),
        ];
        self.inner.tasks().extend(handles);
        tracing::debug!(settings = ?self.inner.settings, "Auth coordinator started");
    }

    /// Stop background work. Results still in flight are discarded and
    /// later provider events are ignored.
    pub fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.inner.state.send_if_modified(|s| {
            self.inner.epoch.fetch_add(1, Ordering::SeqCst);
            std::mem::replace(&mut s.loading, false)
        });
        for handle in self.inner.tasks().drain(..) {
            handle.abort();
        }
        tracing::debug!("Auth coordinator disposed");
    }

    pub fn settings(&self) -> &CoordinatorSettings {
        &self.inner.settings
    }

    pub fn state(&self) -> AuthState {
        self.inner.state.borrow().clone()
    }

    pub fn phase(&self) -> AuthPhase {
        self.inner.state.borrow().phase()
    }

    pub fn is_loading(&self) -> bool {
        self.inner.state.borrow().loading
    }

    /// Receiver that observes every state transition.
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.inner.state.subscribe()
    }

    /// Overwrite the state without touching the epoch.
    #[cfg(test)]
    pub(crate) fn replace_state(&self, state: AuthState) {
        self.inner.state.send_replace(state);
    }

    /// Resolve once loading is over.
    pub async fn wait_until_ready(&self) -> AuthState {
        let mut rx = self.inner.state.subscribe();
        let ready = rx.wait_for(|s| !s.loading).await.map(|s| s.clone());
        // The sender lives in `inner`, so the channel cannot close here.
        ready.unwrap_or_else(|_| self.state())
    }

    /// Cached bearer token, or the result of one session-store probe.
    /// Never fails: any problem reads as "no token".
    pub async fn get_access_token(&self) -> Option<String> {
        let cached = self.inner.state.borrow().access_token.clone();
        if cached.is_some() {
            return cached;
        }

        let epoch = self.inner.epoch();
        match self.inner.probe_session().await {
            Ok(Some(session)) => {
                let token = session.access_token.clone();
                match self.inner.adopt_session(&session, Some(epoch)) {
                    Some(epoch) => {
                        tracing::debug!(
                            user_id = %session.user.id,
                            "Cached access token from session probe"
                        );
                        self.inner.spawn_profile_load(epoch, token.clone());
                        Some(token)
                    }
                    // A newer auth event decided the session while we probed.
                    None => self.inner.state.borrow().access_token.clone(),
                }
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(error = %e, "Could not read session for access token");
                None
            }
        }
    }

    /// Fetch the profile with `access_token` and cache the outcome.
    ///
    /// Returns the profile cached afterwards: the fetched one, `None` when
    /// the backend has none (404/401), or the previous one when the fetch
    /// failed.
    pub async fn fetch_profile(&self, access_token: &str) -> Option<Profile> {
        let epoch = self.inner.epoch();
        self.inner.load_profile(epoch, access_token).await
    }

    /// Re-fetch the profile of the signed-in user, e.g. after editing it.
    pub async fn refresh_profile(&self) -> Option<Profile> {
        let (epoch, token) = {
            let state = self.inner.state.borrow();
            (self.inner.epoch(), state.access_token.clone())
        };
        let token = token?;
        self.inner.load_profile(epoch, &token).await
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<AuthState, AuthError> {
        let session = self
            .inner
            .store
            .sign_in_with_password(email, password)
            .await
            .inspect_err(|e| tracing::warn!(error = %e, "Password sign-in failed"))?;
        self.inner.establish(&session).await;
        Ok(self.state())
    }

    pub async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome, AuthError> {
        let session = self
            .inner
            .store
            .sign_up(email, password)
            .await
            .inspect_err(|e| tracing::warn!(error = %e, "Sign-up failed"))?;
        match session {
            Some(session) => {
                self.inner.establish(&session).await;
                Ok(SignUpOutcome::SignedIn(self.state()))
            }
            None => Ok(SignUpOutcome::ConfirmationRequired),
        }
    }

    /// Begin an OAuth sign-in. The caller opens the returned URL.
    pub fn sign_in_with_provider(
        &self,
        provider: OAuthProvider,
        redirect_to: &str,
    ) -> Result<OAuthRedirect, AuthError> {
        self.inner.store.authorize_url(provider, redirect_to)
    }

    /// Finish an OAuth sign-in with the `code` from the callback URL.
    pub async fn complete_oauth(&self, auth_code: &str) -> Result<AuthState, AuthError> {
        let session = self
            .inner
            .store
            .exchange_code(auth_code)
            .await
            .inspect_err(|e| tracing::warn!(error = %e, "OAuth code exchange failed"))?;
        self.inner.establish(&session).await;
        Ok(self.state())
    }

    /// Sign out. Local state is cleared even when the provider call fails;
    /// that failure is still returned.
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        let result = self.inner.store.sign_out().await;
        self.inner.clear_session();
        if let Err(e) = &result {
            tracing::warn!(error = %e, "Provider sign-out failed, local session cleared");
        }
        result
    }
}

impl Inner {
    fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    fn tasks(&self) -> std::sync::MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.tasks.lock().unwrap_or_else(|e| e.into_inner())
    }

    // ─── Transitions ─────────────────────────────────────────────────────────

    /// Make `session` current, unless `expected` is given and the epoch has
    /// moved past it. Returns the new epoch on success.
    fn adopt_session(&self, session: &Session, expected: Option<u64>) -> Option<u64> {
        let mut adopted = None;
        self.state.send_if_modified(|s| {
            if expected.is_some_and(|epoch| epoch != self.epoch()) {
                return false;
            }
            if s.user_id() != Some(session.user.id.as_str()) {
                s.profile = None;
            }
            s.user = Some(session.user.clone());
            s.access_token = Some(session.access_token.clone());
            adopted = Some(self.epoch.fetch_add(1, Ordering::SeqCst) + 1);
            true
        });
        adopted
    }

    fn clear_session(&self) -> bool {
        self.state.send_if_modified(|s| {
            self.epoch.fetch_add(1, Ordering::SeqCst);
            let had_session = s.user.is_some() || s.access_token.is_some();
            s.user = None;
            s.profile = None;
            s.access_token = None;
            had_session
        })
    }

    /// Returns true if this call ended loading.
    fn finish_loading(&self) -> bool {
        self.state
            .send_if_modified(|s| std::mem::replace(&mut s.loading, false))
    }

    /// Adopt a session produced by one of our own calls and load its profile.
    async fn establish(&self, session: &Session) {
        if let Some(epoch) = self.adopt_session(session, None) {
            tracing::info!(user_id = %session.user.id, "Signed in");
            self.load_profile(epoch, &session.access_token).await;
        }
    }

    // ─── Backend and provider calls ──────────────────────────────────────────

    async fn probe_session(&self) -> Result<Option<Session>, AuthError> {
        match timeout(self.settings.probe_timeout, self.store.get_session()).await {
            Ok(result) => result,
            Err(_) => Err(AuthError::Timeout),
        }
    }

    async fn lookup_profile(&self, access_token: &str) -> ProfileLookup {
        let fetch = self.profiles.fetch_profile(access_token);
        match timeout(self.settings.profile_timeout, fetch).await {
            Ok(Ok(profile)) => ProfileLookup::Found(profile),
            Ok(Err(e)) if e.is_absent_profile() => {
                tracing::debug!(status = ?e.status(), "No profile for user yet");
                ProfileLookup::Absent
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Profile fetch failed, keeping cached profile");
                ProfileLookup::Failed
            }
            Err(_) => {
                tracing::warn!(
                    timeout_ms = self.settings.profile_timeout.as_millis() as u64,
                    "Profile fetch timed out, keeping cached profile"
                );
                ProfileLookup::Failed
            }
        }
    }

    /// Fetch the profile and store the result if `epoch` is still current.
    async fn load_profile(&self, epoch: u64, access_token: &str) -> Option<Profile> {
        let lookup = self.lookup_profile(access_token).await;

        let mut stale = false;
        self.state.send_if_modified(|s| {
            if epoch != self.epoch() || s.user.is_none() {
                stale = true;
                return false;
            }
            match lookup {
                ProfileLookup::Found(profile) => {
                    let changed = s.profile.as_ref() != Some(&profile);
                    s.profile = Some(profile);
                    changed
                }
                ProfileLookup::Absent => s.profile.take().is_some(),
                ProfileLookup::Failed => false,
            }
        });
        if stale {
            tracing::debug!("Discarding profile result superseded by a newer auth event");
        }

        self.state.borrow().profile.clone()
    }

    /// Load the profile for whatever session is current, so loading never
    /// ends before a found session's profile has resolved.
    async fn load_current_profile(&self) {
        let (epoch, token) = {
            let state = self.state.borrow();
            (self.epoch(), state.access_token.clone())
        };
        if let Some(token) = token {
            self.load_profile(epoch, &token).await;
        }
    }

    fn spawn_profile_load(self: &Arc<Self>, epoch: u64, access_token: String) {
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            inner.load_profile(epoch, &access_token).await;
        });
    }

    // ─── Background tasks ────────────────────────────────────────────────────

    async fn initialize(self: Arc<Self>) {
        let epoch = self.epoch();
        let attempts = self.settings.probe_attempts.max(1);

        for attempt in 1..=attempts {
            match self.probe_session().await {
                Ok(Some(session)) => {
                    match self.adopt_session(&session, Some(epoch)) {
                        Some(epoch) => {
                            tracing::info!(user_id = %session.user.id, "Restored session");
                            self.load_profile(epoch, &session.access_token).await;
                        }
                        None => {
                            tracing::debug!("Stored session superseded by a newer auth event");
                            self.load_current_profile().await;
                        }
                    }
                    self.finish_loading();
                    return;
                }
                Ok(None) => {
                    tracing::info!("No stored session");
                    self.finish_loading();
                    return;
                }
                Err(e) => {
                    tracing::warn!(attempt, attempts, error = %e, "Session probe failed");
                    if attempt < attempts {
                        sleep(self.settings.probe_backoff).await;
                    }
                }
            }
        }

        tracing::warn!(attempts, "Giving up on session probe, continuing signed out");
        self.finish_loading();
    }

    async fn safety_timeout(self: Arc<Self>) {
        sleep(self.settings.ready_timeout).await;
        if self.finish_loading() {
            tracing::warn!(
                timeout_ms = self.settings.ready_timeout.as_millis() as u64,
                "Auth initialization did not finish in time, continuing"
            );
        }
    }

    async fn listen(self: Arc<Self>, mut events: broadcast::Receiver<AuthChange>) {
        loop {
            match events.recv().await {
                Ok(change) => self.handle_change(change),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Missed auth events, re-reading session");
                    self.resync().await;
                }
                Err(RecvError::Closed) => {
                    tracing::debug!("Auth event stream closed");
                    return;
                }
            }
        }
    }

    fn handle_change(self: &Arc<Self>, change: AuthChange) {
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }

        let session = match (change.event, change.session) {
            (AuthChangeEvent::SignedOut, _) | (_, None) => {
                if self.clear_session() {
                    tracing::info!(event = ?change.event, "Session ended");
                }
                return;
            }
            (_, Some(session)) => session,
        };

        let cached = self.state.borrow().access_token.clone();
        if cached.as_deref() == Some(session.access_token.as_str()) {
            if change.event == AuthChangeEvent::UserUpdated {
                self.state.send_if_modified(|s| match &mut s.user {
                    Some(user) if user.id == session.user.id && *user != session.user => {
                        *user = session.user;
                        true
                    }
                    _ => false,
                });
            } else {
                tracing::trace!(event = ?change.event, "Auth event carries the cached token");
            }
            return;
        }

        if let Some(epoch) = self.adopt_session(&session, None) {
            tracing::info!(event = ?change.event, user_id = %session.user.id, "Session changed");
            self.spawn_profile_load(epoch, session.access_token);
        }
    }

    async fn resync(self: &Arc<Self>) {
        match self.probe_session().await {
            Ok(session) => {
                let event = if session.is_some() {
                    AuthChangeEvent::SignedIn
                } else {
                    AuthChangeEvent::SignedOut
                };
                self.handle_change(AuthChange::new(event, session));
            }
            Err(e) => tracing::warn!(error = %e, "Session re-read failed, keeping current state"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> Profile {
        Profile {
            id: "u1".to_string(),
            name: "Ada".to_string(),
            avatar_url: None,
            skills: vec!["rust".to_string()],
            credits: 100,
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn test_phase_follows_state() {
        let mut state = AuthState::default();
        assert_eq!(state.phase(), AuthPhase::Initializing);

        state.loading = false;
        assert_eq!(state.phase(), AuthPhase::NoUser);

        state.user = Some(User {
            id: "u1".to_string(),
            email: None,
        });
        assert_eq!(state.phase(), AuthPhase::UserNoProfile);

        state.profile = Some(profile());
        assert_eq!(state.phase(), AuthPhase::UserWithProfile);
        assert_eq!(state.user_id(), Some("u1"));
    }
}
