// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Sign-in status, onboarding and the profile pages.

use super::Pages;
use crate::auth::AuthState;
use crate::error::PageError;
use crate::models::{CreateProfileRequest, Profile, UpdateProfileRequest};

/// Where the user stands in onboarding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Onboarding {
    Loading,
    SignedOut,
    /// Signed in but `GET /v1/profile` found nothing. Callers decide
    /// whether and when to send the user to profile setup.
    NeedsProfile,
    Ready,
}

pub fn onboarding_status(state: &AuthState) -> Onboarding {
    if state.loading {
        Onboarding::Loading
    } else if state.user.is_none() {
        Onboarding::SignedOut
    } else if state.profile.is_none() {
        Onboarding::NeedsProfile
    } else {
        Onboarding::Ready
    }
}

fn render_profile(profile: &Profile) -> String {
    let mut lines = vec![
        profile.name.clone(),
        format!("Credits: {}", profile.credits),
        format!("Skills: {}", profile.skills.join(", ")),
    ];
    if let Some(avatar_url) = &profile.avatar_url {
        lines.push(format!("Avatar: {}", avatar_url));
    }
    if let Some(created_at) = profile.created_at {
        lines.push(format!("Member since {}", created_at.format("%Y-%m-%d")));
    }
    lines.join("\n")
}

/// One-screen summary of the auth state.
pub fn render_status(state: &AuthState) -> String {
    let mut lines = vec![format!("Status: {}", state.phase())];
    if let Some(user) = &state.user {
        lines.push(format!(
            "User: {}",
            user.email.as_deref().unwrap_or(user.id.as_str())
        ));
    }
    match onboarding_status(state) {
        Onboarding::NeedsProfile => {
            lines.push("No profile yet. Run `summit profile setup` to create one.".to_string())
        }
        Onboarding::Ready => {
            if let Some(profile) = &state.profile {
                lines.push(format!("{} ({} credits)", profile.name, profile.credits));
            }
        }
        Onboarding::SignedOut => lines.push("Run `summit login` to sign in.".to_string()),
        Onboarding::Loading => {}
    }
    lines.join("\n")
}

/// Same checks as the setup and edit forms.
fn check_profile_form(request: &CreateProfileRequest) -> Result<(), PageError> {
    if request.name.is_empty() {
        return Err(PageError::Invalid("Please enter your name".to_string()));
    }
    if request.skills.is_empty() {
        return Err(PageError::Invalid(
            "Please select at least one skill".to_string(),
        ));
    }
    Ok(())
}

impl Pages {
    pub async fn profile(&self) -> Result<String, PageError> {
        let state = self.coordinator().state();
        if state.loading || state.user.is_none() {
            return Err(PageError::NotReady(state.phase()));
        }
        let api = self.api();
        let profile = self
            .authenticated(|token| async move {
                match api.get_profile(&token).await {
                    Ok(profile) => Ok(Some(profile)),
                    Err(e) if e.is_absent_profile() => Ok(None),
                    Err(e) => Err(e),
                }
            })
            .await?;
        // Keep the coordinator's cached profile in step with what we show.
        self.coordinator().refresh_profile().await;
        match profile {
            Some(profile) => Ok(render_profile(&profile)),
            None => Err(PageError::NeedsProfile),
        }
    }

    /// Create the profile for a signed-in user who has none.
    pub async fn setup_profile(&self, request: CreateProfileRequest) -> Result<String, PageError> {
        check_profile_form(&request)?;
        if onboarding_status(&self.coordinator().state()) == Onboarding::Ready {
            return Err(PageError::Invalid(
                "Profile already exists; use `summit profile update`".to_string(),
            ));
        }

        let api = self.api();
        let profile = self
            .authenticated(|token| async move { api.create_profile(&token, &request).await })
            .await?;
        tracing::info!(profile_id = %profile.id, "Profile created");
        self.coordinator().refresh_profile().await;

        Ok(format!(
            "Profile created successfully!\n\n{}",
            render_profile(&profile)
        ))
    }

    pub async fn update_profile(&self, request: UpdateProfileRequest) -> Result<String, PageError> {
        check_profile_form(&request)?;
        if onboarding_status(&self.coordinator().state()) == Onboarding::NeedsProfile {
            return Err(PageError::NeedsProfile);
        }

        let api = self.api();
        let profile = self
            .authenticated(|token| async move { api.update_profile(&token, &request).await })
            .await?;
        tracing::info!(profile_id = %profile.id, "Profile updated");
        self.coordinator().refresh_profile().await;

        Ok(format!(
            "Profile updated successfully!\n\n{}",
            render_profile(&profile)
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::User;

    #[test]
    fn test_onboarding_status() {
        let mut state = AuthState::default();
        assert_eq!(onboarding_status(&state), Onboarding::Loading);

        state.loading = false;
        assert_eq!(onboarding_status(&state), Onboarding::SignedOut);

        state.user = Some(User {
            id: "u1".to_string(),
            email: Some("ada@example.com".to_string()),
        });
        assert_eq!(onboarding_status(&state), Onboarding::NeedsProfile);
        assert!(render_status(&state).contains("summit profile setup"));

        state.profile = Some(Profile {
            id: "u1".to_string(),
            name: "Ada".to_string(),
            avatar_url: None,
            skills: vec!["rust".to_string()],
            credits: 100,
            created_at: None,
            updated_at: None,
        });
        assert_eq!(onboarding_status(&state), Onboarding::Ready);
        assert!(render_status(&state).contains("Ada (100 credits)"));
    }

    #[test]
    fn test_profile_form_requires_name_and_skill() {
        let no_skills = CreateProfileRequest::new("Ada", None, &[]);
        assert!(matches!(
            check_profile_form(&no_skills),
            Err(PageError::Invalid(_))
        ));

        let ok = CreateProfileRequest::new("Ada", None, &["rust".to_string()]);
        assert!(check_profile_form(&ok).is_ok());
    }
}
