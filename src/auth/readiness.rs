// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Gate for backend calls that need a signed-in user.

use std::fmt::Display;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::timeout;

use super::{AuthCoordinator, AuthState};

/// Recorded when the gate is open but no token could be obtained.
pub const NOT_AUTHENTICATED: &str = "Not authenticated";

/// Runs authenticated requests only once the coordinator has settled on a
/// signed-in user, handing each one a fresh bearer token.
pub struct ApiReadiness {
    coordinator: AuthCoordinator,
    token_timeout: Duration,
    last_error: Mutex<Option<String>>,
    in_flight: AtomicUsize,
}

/// Decrements the in-flight count even if the request future is dropped.
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ApiReadiness {
    pub fn new(coordinator: AuthCoordinator, token_timeout: Duration) -> Self {
        Self {
            coordinator,
            token_timeout,
            last_error: Mutex::new(None),
            in_flight: AtomicUsize::new(0),
        }
    }

    pub fn coordinator(&self) -> &AuthCoordinator {
        &self.coordinator
    }

    /// Loading is over and a user is signed in.
    pub fn is_ready(&self) -> bool {
        let state = self.coordinator.state();
        !state.loading && state.user.is_some()
    }

    /// A gated request is running.
    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }

    /// Error text from the most recent gated request, if it failed.
    pub fn last_error(&self) -> Option<String> {
        self.errors().clone()
    }

    pub async fn wait_until_ready(&self) -> AuthState {
        self.coordinator.wait_until_ready().await
    }

    /// Call `request_fn` with a bearer token if the gate is open.
    ///
    /// Returns `None` without calling it while not ready or when no token
    /// can be had within the token timeout. A failed request is recorded
    /// in [`last_error`](Self::last_error) and also yields `None`. Nothing
    /// is retried.
    pub async fn execute_when_ready<T, E, F, Fut>(&self, request_fn: F) -> Option<T>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        if !self.is_ready() {
            tracing::debug!(phase = %self.coordinator.phase(), "Skipping request, auth not ready");
            return None;
        }

        let _in_flight = InFlight::enter(&self.in_flight);
        *self.errors() = None;

        let token = match timeout(self.token_timeout, self.coordinator.get_access_token()).await {
            Ok(token) => token,
            Err(_) => {
                tracing::warn!(
                    timeout_ms = self.token_timeout.as_millis() as u64,
                    "Timed out waiting for access token"
                );
                None
            }
        };
        let Some(token) = token else {
            *self.errors() = Some(NOT_AUTHENTICATED.to_string());
            return None;
        };

        match request_fn(token).await {
            Ok(value) => Some(value),
            Err(e) => {
                let message = e.to_string();
                tracing::warn!(error = %message, "Authenticated request failed");
                *self.errors() = Some(message);
                None
            }
        }
    }

    fn errors(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        self.last_error.lock().unwrap_or_else(|e| e.into_inner())
    }
}
