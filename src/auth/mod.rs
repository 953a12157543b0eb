// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Authentication state: who is signed in, their profile, and when it is
//! safe to call the backend on their behalf.

pub mod coordinator;
pub mod readiness;

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;
use crate::models::Profile;

pub use coordinator::{AuthCoordinator, AuthPhase, AuthState, SignUpOutcome};
pub use readiness::{ApiReadiness, NOT_AUTHENTICATED};

/// Backend lookup of the signed-in user's profile.
#[async_trait]
pub trait ProfileSource: Send + Sync {
    async fn fetch_profile(&self, access_token: &str) -> Result<Profile>;
}

/// Timeouts and retry bounds for [`AuthCoordinator`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorSettings {
    /// Loading is cleared after this long no matter what the probes do
    pub ready_timeout: Duration,
    /// Bound on each `GET /v1/profile`
    pub profile_timeout: Duration,
    /// Bound on each session-store probe
    pub probe_timeout: Duration,
    /// Session probes attempted during initialization
    pub probe_attempts: u32,
    /// Pause between failed probes
    pub probe_backoff: Duration,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            ready_timeout: Duration::from_secs(5),
            profile_timeout: Duration::from_secs(5),
            probe_timeout: Duration::from_secs(5),
            probe_attempts: 3,
            probe_backoff: Duration::from_secs(1),
        }
    }
}
