// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Marketplace profile model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::Validate;

use super::timestamp;

/// Application-level user record owned by the backend.
///
/// Distinct from the identity-provider [`super::User`]: a signed-in user
/// without a profile has not finished onboarding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Profile {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub credits: i64,
    #[serde(default, with = "timestamp")]
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, with = "timestamp")]
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Body of `POST /v1/profile`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CreateProfileRequest {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(url)]
    pub avatar_url: Option<String>,
    pub skills: Vec<String>,
}

/// Body of `PUT /v1/profile`. Same shape as creation.
pub type UpdateProfileRequest = CreateProfileRequest;

impl CreateProfileRequest {
    /// Build a request from free-form CLI input: trims the name and drops
    /// blank or duplicate skills while keeping their order.
    pub fn new(name: &str, avatar_url: Option<String>, skills: &[String]) -> Self {
        let mut cleaned: Vec<String> = Vec::with_capacity(skills.len());
        for skill in skills {
            let skill = skill.trim();
            if !skill.is_empty() && !cleaned.iter().any(|s| s == skill) {
                cleaned.push(skill.to_string());
            }
        }
        Self {
            name: name.trim().to_string(),
            avatar_url: avatar_url.filter(|u| !u.trim().is_empty()),
            skills: cleaned,
        }
    }
}
