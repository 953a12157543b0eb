// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Summit: client for the Summit task marketplace.
//!
//! This crate provides the typed REST client for the Summit backend, the
//! identity-provider session store, and the auth coordinator that decides
//! when it is safe to call the backend on a user's behalf. The `summit`
//! binary builds its pages on top of these.

pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod pages;
pub mod services;

use std::sync::Arc;

use auth::{ApiReadiness, AuthCoordinator};
use config::Config;
use pages::Pages;
use services::{FileStorage, GoTrueStore, SessionStore, StaticTokenStore, SummitApi};

/// Errors raised while wiring the client together.
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error(transparent)]
    Api(#[from] error::ApiError),

    #[error(transparent)]
    Auth(#[from] error::AuthError),

    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
}

/// Fully wired client.
pub struct AppState {
    pub config: Config,
    pub coordinator: AuthCoordinator,
    pub pages: Pages,
}

impl AppState {
    /// Build the client from configuration. The coordinator is not started.
    pub fn from_config(config: Config) -> Result<Self, SetupError> {
        let api = SummitApi::new(&config.api_url, config.http_timeout)?;

        let store: Arc<dyn SessionStore> = match &config.access_token {
            Some(token) => Arc::new(StaticTokenStore::new(token)?),
            None => {
                let url = config
                    .supabase_url
                    .as_deref()
                    .ok_or(SetupError::Missing("SUPABASE_URL"))?;
                let anon_key = config
                    .supabase_anon_key
                    .clone()
                    .ok_or(SetupError::Missing("SUPABASE_ANON_KEY"))?;
                let http = reqwest::Client::builder()
                    .timeout(config.http_timeout)
                    .build()
                    .map_err(error::AuthError::from)?;
                let storage = Arc::new(FileStorage::new(&config.session_file));
                Arc::new(GoTrueStore::new(url, anon_key, storage, http))
            }
        };

        let coordinator = AuthCoordinator::new(
            store,
            Arc::new(api.clone()),
            config.coordinator.clone(),
        );
        let gate = ApiReadiness::new(coordinator.clone(), config.token_timeout);
        let pages = Pages::new(api, gate);

        Ok(Self {
            config,
            coordinator,
            pages,
        })
    }
}
