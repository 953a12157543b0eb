// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Plain-text pages behind the `summit` CLI.
//!
//! Public listings call [`SummitApi`] directly. Everything that needs a
//! signed-in user goes through the [`ApiReadiness`] gate.

pub mod account;
pub mod market;
pub mod tasks;

use std::future::Future;

use crate::auth::{ApiReadiness, AuthCoordinator, NOT_AUTHENTICATED};
use crate::error::{self, PageError};
use crate::services::SummitApi;

pub use account::{onboarding_status, render_status, Onboarding};
pub use market::{rank_badge, render_leaderboard, render_rewards, render_transactions};
pub use tasks::{filter_tasks, render_task_detail, render_task_list, unique_skills, TaskFilter};

/// Page context: the REST client plus the readiness gate.
pub struct Pages {
    api: SummitApi,
    gate: ApiReadiness,
}

impl Pages {
    pub fn new(api: SummitApi, gate: ApiReadiness) -> Self {
        Self { api, gate }
    }

    pub fn api(&self) -> &SummitApi {
        &self.api
    }

    pub fn gate(&self) -> &ApiReadiness {
        &self.gate
    }

    pub fn coordinator(&self) -> &AuthCoordinator {
        self.gate.coordinator()
    }

    /// Run `request_fn` through the gate, turning a skipped or failed call
    /// into the error the user should see.
    async fn authenticated<T, F, Fut>(&self, request_fn: F) -> Result<T, PageError>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = error::Result<T>>,
    {
        if !self.gate.is_ready() {
            return Err(PageError::NotReady(self.coordinator().phase()));
        }
        match self.gate.execute_when_ready(request_fn).await {
            Some(value) => Ok(value),
            None => Err(PageError::Request(
                self.gate
                    .last_error()
                    .unwrap_or_else(|| NOT_AUTHENTICATED.to_string()),
            )),
        }
    }
}
