// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the backend API and identity provider.

pub mod market;
pub mod profile;
pub mod session;
pub mod task;

pub use market::{LeaderboardEntry, Reward, Transaction};
pub use profile::{CreateProfileRequest, Profile, UpdateProfileRequest};
pub use session::{AuthChange, AuthChangeEvent, OAuthProvider, OAuthRedirect, Session, User};
pub use task::{CreateTaskRequest, Task, TaskAction, TaskStatus};

/// RFC 3339 timestamps as sent by the backend. An empty string means unset.
pub(crate) mod timestamp {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        match raw.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(s) => DateTime::parse_from_rfc3339(s)
                .map(|t| Some(t.with_timezone(&Utc)))
                .map_err(serde::de::Error::custom),
        }
    }

    pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(t) => serializer.serialize_str(&t.to_rfc3339()),
            None => serializer.serialize_str(""),
        }
    }
}
