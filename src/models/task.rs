// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Task model and lifecycle actions.
//!
//! The backend owns the lifecycle rules. The client only decides which
//! actions to offer a given user, the same way the task page did.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::Validate;

use super::timestamp;

/// Task lifecycle status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Open,
    Claimed,
    Completed,
    Confirmed,
    Cancelled,
    /// Status string this client does not know about.
    #[serde(other)]
    Other,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Open => "open",
            TaskStatus::Claimed => "claimed",
            TaskStatus::Completed => "completed",
            TaskStatus::Confirmed => "confirmed",
            TaskStatus::Cancelled => "cancelled",
            TaskStatus::Other => "unknown",
        };
        f.write_str(s)
    }
}

/// A unit of work posted for credits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub description: String,
    pub skill: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urgency: Option<String>,
    pub credit_reward: i64,
    #[serde(default)]
    pub status: TaskStatus,
    pub requester_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claimed_by_id: Option<String>,
    #[serde(default, with = "timestamp")]
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, with = "timestamp")]
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub updated_at: Option<DateTime<Utc>>,
}

/// State-changing actions exposed as `POST /v1/tasks/{id}/{action}`,
/// plus deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskAction {
    Claim,
    Complete,
    Confirm,
    Cancel,
    Delete,
}

impl TaskAction {
    /// Path segment for the POST actions. `None` for `Delete`.
    pub fn path_segment(self) -> Option<&'static str> {
        match self {
            TaskAction::Claim => Some("claim"),
            TaskAction::Complete => Some("complete"),
            TaskAction::Confirm => Some("confirm"),
            TaskAction::Cancel => Some("cancel"),
            TaskAction::Delete => None,
        }
    }

    /// Confirmation shown after the backend accepts the action.
    pub fn success_message(self) -> &'static str {
        match self {
            TaskAction::Claim => "Task claimed successfully!",
            TaskAction::Complete => "Task marked as completed!",
            TaskAction::Confirm => "Task confirmed! Credits transferred.",
            TaskAction::Cancel => "Task cancelled.",
            TaskAction::Delete => "Task deleted successfully!",
        }
    }
}

impl fmt::Display for TaskAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path_segment().unwrap_or("delete"))
    }
}

impl Task {
    pub fn is_requester(&self, user_id: &str) -> bool {
        self.requester_id == user_id
    }

    pub fn is_claimer(&self, user_id: &str) -> bool {
        self.claimed_by_id.as_deref() == Some(user_id)
    }

    /// Actions the given user may attempt on this task.
    ///
    /// Requesters confirm, cancel and delete; anyone else claims; the
    /// claimer completes.
    pub fn available_actions(&self, user_id: Option<&str>) -> Vec<TaskAction> {
        let Some(user_id) = user_id else {
            return Vec::new();
        };
        let requester = self.is_requester(user_id);
        let claimer = self.is_claimer(user_id);

        let mut actions = Vec::new();
        match self.status {
            TaskStatus::Open if requester => actions.push(TaskAction::Delete),
            TaskStatus::Open => actions.push(TaskAction::Claim),
            TaskStatus::Claimed => {
                if claimer {
                    actions.push(TaskAction::Complete);
                }
                if requester {
                    actions.push(TaskAction::Cancel);
                }
            }
            TaskStatus::Completed if requester => {
                actions.push(TaskAction::Confirm);
                actions.push(TaskAction::Cancel);
            }
            _ => {}
        }
        actions
    }

    /// Case-insensitive match on title or description.
    pub fn matches_query(&self, query: &str) -> bool {
        let query = query.trim().to_lowercase();
        query.is_empty()
            || self.title.to_lowercase().contains(&query)
            || self.description.to_lowercase().contains(&query)
    }
}

/// Body of `POST /v1/tasks`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CreateTaskRequest {
    #[validate(length(min = 1, message = "Title is required"))]
    pub title: String,
    #[validate(length(min = 1, message = "Description is required"))]
    pub description: String,
    #[validate(length(min = 1, message = "Skill is required"))]
    pub skill: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub urgency: Option<String>,
    #[validate(range(min = 1, message = "Credit reward must be positive"))]
    pub credit_reward: i64,
}
