// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Summit backend REST client.
//!
//! Handles:
//! - Public listings (tasks, leaderboard, rewards)
//! - Profile onboarding and edits
//! - Task posting and lifecycle actions
//! - Credit transaction history
//!
//! All responses go through [`super::envelope`].

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use validator::Validate;

use crate::auth::ProfileSource;
use crate::error::{ApiError, Result};
use crate::models::{
    CreateProfileRequest, CreateTaskRequest, LeaderboardEntry, Profile, Reward, Task, TaskAction,
    Transaction, UpdateProfileRequest,
};
use crate::services::envelope;

/// Default page size for `GET /v1/transactions`.
pub const DEFAULT_TRANSACTION_LIMIT: u32 = 50;

/// Summit backend API client.
#[derive(Clone)]
pub struct SummitApi {
    http: reqwest::Client,
    base_url: String,
}

impl SummitApi {
    /// Create a client with a per-request timeout.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(base_url, http))
    }

    /// Create a client around an existing `reqwest::Client`.
    pub fn with_client(base_url: impl Into<String>, http: reqwest::Client) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // ─── Public endpoints ────────────────────────────────────────────────────

    pub async fn get_leaderboard(&self) -> Result<Vec<LeaderboardEntry>> {
        self.get_list("/v1/leaderboard", None).await
    }

    pub async fn list_rewards(&self) -> Result<Vec<Reward>> {
        self.get_list("/v1/rewards", None).await
    }

    /// List open tasks.
    pub async fn list_tasks(&self) -> Result<Vec<Task>> {
        self.get_list("/v1/tasks", None).await
    }

    pub async fn get_task(&self, task_id: &str) -> Result<Task> {
        let path = format!("/v1/tasks/{}", urlencoding::encode(task_id));
        let body = self.send(self.request(Method::GET, &path, None)).await?;
        envelope::decode_data(body)
    }

    // ─── Profile ─────────────────────────────────────────────────────────────

    /// Fetch the caller's profile. 404 means onboarding is not complete.
    pub async fn get_profile(&self, access_token: &str) -> Result<Profile> {
        let body = self
            .send(self.request(Method::GET, "/v1/profile", Some(access_token)))
            .await?;
        envelope::decode_data(body)
    }

    pub async fn create_profile(
        &self,
        access_token: &str,
        data: &CreateProfileRequest,
    ) -> Result<Profile> {
        data.validate()?;
        let body = self
            .send(
                self.request(Method::POST, "/v1/profile", Some(access_token))
                    .json(data),
            )
            .await?;
        envelope::decode_data(body)
    }

    pub async fn update_profile(
        &self,
        access_token: &str,
        data: &UpdateProfileRequest,
    ) -> Result<Profile> {
        data.validate()?;
        let body = self
            .send(
                self.request(Method::PUT, "/v1/profile", Some(access_token))
                    .json(data),
            )
            .await?;
        envelope::decode_data(body)
    }

    // ─── Tasks ───────────────────────────────────────────────────────────────

    /// Post a task. The backend escrows `credit_reward` from the caller.
    pub async fn create_task(&self, access_token: &str, data: &CreateTaskRequest) -> Result<Task> {
        data.validate()?;
        let body = self
            .send(
                self.request(Method::POST, "/v1/tasks", Some(access_token))
                    .json(data),
            )
            .await?;
        envelope::decode_data(body)
    }

    pub async fn get_my_posted_tasks(&self, access_token: &str) -> Result<Vec<Task>> {
        self.get_list("/v1/tasks/my-posted", Some(access_token)).await
    }

    pub async fn get_my_claimed_tasks(&self, access_token: &str) -> Result<Vec<Task>> {
        self.get_list("/v1/tasks/my-claimed", Some(access_token)).await
    }

    /// Delete an open task owned by the caller (credits are refunded).
    pub async fn delete_task(&self, access_token: &str, task_id: &str) -> Result<()> {
        let path = format!("/v1/tasks/{}", urlencoding::encode(task_id));
        self.send(self.request(Method::DELETE, &path, Some(access_token)))
            .await?;
        Ok(())
    }

    pub async fn claim_task(&self, access_token: &str, task_id: &str) -> Result<Task> {
        self.post_action(access_token, task_id, "claim").await
    }

    pub async fn complete_task(&self, access_token: &str, task_id: &str) -> Result<Task> {
        self.post_action(access_token, task_id, "complete").await
    }

    pub async fn confirm_task(&self, access_token: &str, task_id: &str) -> Result<Task> {
        self.post_action(access_token, task_id, "confirm").await
    }

    pub async fn cancel_task(&self, access_token: &str, task_id: &str) -> Result<Task> {
        self.post_action(access_token, task_id, "cancel").await
    }

    /// Run a lifecycle action. Returns the updated task, or `None` after a
    /// delete.
    pub async fn apply_action(
        &self,
        access_token: &str,
        task_id: &str,
        action: TaskAction,
    ) -> Result<Option<Task>> {
        match action.path_segment() {
            Some(segment) => self
                .post_action(access_token, task_id, segment)
                .await
                .map(Some),
            None => self.delete_task(access_token, task_id).await.map(|_| None),
        }
    }

    // ─── Transactions ────────────────────────────────────────────────────────

    pub async fn get_transactions(
        &self,
        access_token: &str,
        limit: u32,
    ) -> Result<Vec<Transaction>> {
        let builder = self
            .request(Method::GET, "/v1/transactions", Some(access_token))
            .query(&[("limit", limit.to_string())]);
        let body = self.send(builder).await?;
        envelope::decode_list(body)
    }

    // ─── Helpers ─────────────────────────────────────────────────────────────

    fn request(&self, method: Method, path: &str, access_token: Option<&str>) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let builder = self.http.request(method, url);
        match access_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn post_action(&self, access_token: &str, task_id: &str, segment: &str) -> Result<Task> {
        let path = format!("/v1/tasks/{}/{}", urlencoding::encode(task_id), segment);
        let body = self
            .send(self.request(Method::POST, &path, Some(access_token)))
            .await?;
        envelope::decode_data(body)
    }

    async fn get_list<T: DeserializeOwned>(
        &self,
        path: &str,
        access_token: Option<&str>,
    ) -> Result<Vec<T>> {
        let body = self
            .send(self.request(Method::GET, path, access_token))
            .await?;
        envelope::decode_list(body)
    }

    /// Send a request and return the parsed JSON body, or the backend's
    /// error message on a non-2xx status.
    async fn send(&self, builder: RequestBuilder) -> Result<Value> {
        let response = builder.send().await.map_err(transport_error)?;

        let status = response.status();
        let url = response.url().path().to_string();

        if !status.is_success() {
            // An unreadable error body still gets the generic message.
            let text = response.text().await.unwrap_or_default();
            let message = envelope::error_message(&text);
            tracing::debug!(
                status = status.as_u16(),
                path = %url,
                error = %message,
                "Backend request failed"
            );
            return Err(ApiError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let text = response.text().await.map_err(transport_error)?;
        tracing::trace!(status = status.as_u16(), path = %url, "Backend request succeeded");
        envelope::parse_body(&text)
    }
}

fn transport_error(e: reqwest::Error) -> ApiError {
    if e.is_timeout() {
        ApiError::Timeout
    } else {
        ApiError::Transport(e)
    }
}

#[async_trait]
impl ProfileSource for SummitApi {
    async fn fetch_profile(&self, access_token: &str) -> Result<Profile> {
        self.get_profile(access_token).await
    }
}
