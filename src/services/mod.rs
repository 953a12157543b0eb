// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - backend and identity-provider clients.

pub mod api;
pub mod envelope;
pub mod identity;
pub mod pkce;
pub mod storage;
pub mod token;

pub use api::{SummitApi, DEFAULT_TRANSACTION_LIMIT};
pub use identity::{GoTrueStore, SessionStore};
pub use pkce::PkcePair;
pub use storage::{FileStorage, MemoryStorage, SessionStorage};
pub use token::StaticTokenStore;
