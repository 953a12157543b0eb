// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Auth coordinator state machine tests.
//!
//! Run on a paused clock: timeouts and backoffs elapse instantly once every
//! task is idle.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use summit_client::auth::{AuthPhase, AuthState, CoordinatorSettings, SignUpOutcome};
use summit_client::error::AuthError;
use summit_client::models::AuthChangeEvent;
use tokio::time::{sleep, Instant};

mod common;
use common::{coordinator, profile, session, settings, FakeProfiles, FakeStore, ProfileReply};

/// Record every state the coordinator publishes.
fn record_states(coordinator: &summit_client::auth::AuthCoordinator) -> Arc<Mutex<Vec<AuthState>>> {
    let seen = Arc::new(Mutex::new(vec![coordinator.state()]));
    let mut rx = coordinator.subscribe();
    let sink = seen.clone();
    tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let state = rx.borrow_and_update().clone();
            sink.lock().unwrap().push(state);
        }
    });
    seen
}

async fn wait_for_phase(coordinator: &summit_client::auth::AuthCoordinator, phase: AuthPhase) {
    let mut rx = coordinator.subscribe();
    tokio::time::timeout(Duration::from_secs(60), rx.wait_for(|s| s.phase() == phase))
        .await
        .expect("phase not reached")
        .expect("coordinator dropped");
}

#[tokio::test(start_paused = true)]
async fn test_loading_clears_within_safety_timeout_when_probes_hang() {
    let store = FakeStore::new(None);
    store.delay_probes(Duration::from_secs(3600));
    let profiles = FakeProfiles::new();
    let coordinator = coordinator(
        &store,
        &profiles,
        CoordinatorSettings {
            probe_timeout: Duration::from_secs(30),
            ..settings()
        },
    );

    let started = Instant::now();
    coordinator.start();
    let state = coordinator.wait_until_ready().await;

    assert!(!state.loading);
    assert_eq!(state.phase(), AuthPhase::NoUser);
    assert!(started.elapsed() <= Duration::from_secs(5) + Duration::from_millis(1));
    coordinator.dispose();
}

#[tokio::test(start_paused = true)]
async fn test_three_failed_probes_end_signed_out() {
    let store = FakeStore::new(Some(session("u1", "T0")));
    store.fail_probes(3);
    let profiles = FakeProfiles::new();
    let coordinator = coordinator(
        &store,
        &profiles,
        CoordinatorSettings {
            ready_timeout: Duration::from_secs(60),
            ..settings()
        },
    );

    let started = Instant::now();
    coordinator.start();
    let state = coordinator.wait_until_ready().await;

    assert_eq!(state.phase(), AuthPhase::NoUser);
    assert_eq!(store.probes(), 3);
    // Two backoffs between three attempts
    assert!(started.elapsed() >= Duration::from_secs(2));
    assert!(started.elapsed() < Duration::from_secs(60));
    assert_eq!(profiles.calls(), 0);
    coordinator.dispose();
}

#[tokio::test(start_paused = true)]
async fn test_probe_retry_recovers_session() {
    let store = FakeStore::new(Some(session("u1", "T0")));
    store.fail_probes(2);
    let profiles = FakeProfiles::new();
    profiles.reply("T0", ProfileReply::Found(profile("u1", "Ada", 100)));
    let coordinator = coordinator(
        &store,
        &profiles,
        CoordinatorSettings {
            ready_timeout: Duration::from_secs(60),
            ..settings()
        },
    );

    coordinator.start();
    let state = coordinator.wait_until_ready().await;

    assert_eq!(state.phase(), AuthPhase::UserWithProfile);
    assert_eq!(state.access_token.as_deref(), Some("T0"));
    assert_eq!(store.probes(), 3);
    coordinator.dispose();
}

#[tokio::test(start_paused = true)]
async fn test_not_found_profile_is_a_valid_state() {
    let store = FakeStore::new(Some(session("u1", "T0")));
    let profiles = FakeProfiles::new();
    profiles.reply("T0", ProfileReply::Status(404));
    let coordinator = coordinator(&store, &profiles, settings());

    coordinator.start();
    let state = coordinator.wait_until_ready().await;

    assert!(!state.loading);
    assert!(state.user.is_some());
    assert!(state.profile.is_none());
    assert_eq!(state.phase(), AuthPhase::UserNoProfile);

    // 401 reads the same way
    profiles.reply("T0", ProfileReply::Status(401));
    assert!(coordinator.refresh_profile().await.is_none());
    assert_eq!(coordinator.phase(), AuthPhase::UserNoProfile);
    coordinator.dispose();
}

#[tokio::test(start_paused = true)]
async fn test_signed_in_event_then_profile_resolves() {
    let store = FakeStore::new(None);
    let profiles = FakeProfiles::new();
    let coordinator = coordinator(&store, &profiles, settings());
    coordinator.start();
    assert_eq!(coordinator.wait_until_ready().await.phase(), AuthPhase::NoUser);

    profiles.delay(Duration::from_millis(200));
    profiles.reply("T1", ProfileReply::Found(profile("u1", "Ada", 100)));
    store.emit(AuthChangeEvent::SignedIn, Some(session("u1", "T1")));

    wait_for_phase(&coordinator, AuthPhase::UserNoProfile).await;
    assert_eq!(coordinator.state().access_token.as_deref(), Some("T1"));

    wait_for_phase(&coordinator, AuthPhase::UserWithProfile).await;
    let state = coordinator.state();
    assert!(!state.loading);
    assert_eq!(state.profile.map(|p| p.name), Some("Ada".to_string()));
    coordinator.dispose();
}

#[tokio::test(start_paused = true)]
async fn test_event_during_initial_probe_waits_for_profile() {
    let store = FakeStore::new(None);
    store.delay_probes(Duration::from_secs(2));
    let profiles = FakeProfiles::new();
    profiles.delay(Duration::from_millis(1500));
    profiles.reply("T1", ProfileReply::Found(profile("u1", "Ada", 100)));
    let coordinator = coordinator(&store, &profiles, settings());

    coordinator.start();
    {
        let store = store.clone();
        tokio::spawn(async move {
            sleep(Duration::from_secs(1)).await;
            store.emit(AuthChangeEvent::SignedIn, Some(session("u1", "T1")));
        });
    }

    let state = coordinator.wait_until_ready().await;
    assert_eq!(state.phase(), AuthPhase::UserWithProfile);
    assert_eq!(state.profile.map(|p| p.name), Some("Ada".to_string()));
    coordinator.dispose();
}

#[tokio::test(start_paused = true)]
async fn test_sign_out_during_profile_fetch_wins() {
    let store = FakeStore::new(None);
    let profiles = FakeProfiles::new();
    let coordinator = coordinator(&store, &profiles, settings());
    coordinator.start();
    coordinator.wait_until_ready().await;
    let seen = record_states(&coordinator);

    profiles.delay(Duration::from_secs(1));
    profiles.reply("T1", ProfileReply::Found(profile("u1", "Ada", 100)));
    store.emit(AuthChangeEvent::SignedIn, Some(session("u1", "T1")));
    wait_for_phase(&coordinator, AuthPhase::UserNoProfile).await;

    store.emit(AuthChangeEvent::SignedOut, None);
    wait_for_phase(&coordinator, AuthPhase::NoUser).await;

    // Let the profile fetch finish
    sleep(Duration::from_secs(2)).await;

    let state = coordinator.state();
    assert!(state.user.is_none());
    assert!(state.profile.is_none());
    assert!(state.access_token.is_none());
    assert_eq!(profiles.calls(), 1);

    for state in seen.lock().unwrap().iter() {
        assert!(
            state.user.is_some() || state.profile.is_none(),
            "profile set without a user: {:?}",
            state
        );
    }
    coordinator.dispose();
}

#[tokio::test(start_paused = true)]
async fn test_access_token_is_cached_after_one_probe() {
    let store = FakeStore::new(Some(session("u1", "T1")));
    let profiles = FakeProfiles::new();
    let coordinator = coordinator(&store, &profiles, settings());

    let first = coordinator.get_access_token().await;
    let second = coordinator.get_access_token().await;

    assert_eq!(first.as_deref(), Some("T1"));
    assert_eq!(first, second);
    assert_eq!(store.probes(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_access_token_failures_read_as_none() {
    let store = FakeStore::new(Some(session("u1", "T1")));
    store.fail_probes(1);
    let profiles = FakeProfiles::new();
    let coordinator = coordinator(&store, &profiles, settings());

    assert_eq!(coordinator.get_access_token().await, None);

    let signed_out = FakeStore::new(None);
    let coordinator = common::coordinator(&signed_out, &profiles, settings());
    assert_eq!(coordinator.get_access_token().await, None);
}

#[tokio::test(start_paused = true)]
async fn test_token_refresh_refetches_profile_without_loading() {
    let store = FakeStore::new(Some(session("u1", "T0")));
    let profiles = FakeProfiles::new();
    profiles.reply("T0", ProfileReply::Found(profile("u1", "Ada", 100)));
    profiles.reply("T2", ProfileReply::Found(profile("u1", "Ada", 80)));
    let coordinator = coordinator(&store, &profiles, settings());
    coordinator.start();
    coordinator.wait_until_ready().await;
    let seen = record_states(&coordinator);

    store.emit(AuthChangeEvent::TokenRefreshed, Some(session("u1", "T2")));
    let mut rx = coordinator.subscribe();
    rx.wait_for(|s| s.profile.as_ref().map(|p| p.credits) == Some(80))
        .await
        .unwrap();

    assert_eq!(coordinator.state().access_token.as_deref(), Some("T2"));
    assert_eq!(profiles.calls(), 2);
    assert!(seen.lock().unwrap().iter().all(|s| !s.loading));
    coordinator.dispose();
}

#[tokio::test(start_paused = true)]
async fn test_own_sign_in_fetches_profile_once() {
    let store = FakeStore::new(None);
    let profiles = FakeProfiles::new();
    profiles.reply("token-ada", ProfileReply::Found(profile("ada", "Ada", 100)));
    let coordinator = coordinator(&store, &profiles, settings());
    coordinator.start();
    coordinator.wait_until_ready().await;

    let state = coordinator
        .sign_in("ada@example.com", common::PASSWORD)
        .await
        .unwrap();
    assert_eq!(state.phase(), AuthPhase::UserWithProfile);

    // The store's SignedIn echo carries the cached token
    sleep(Duration::from_secs(1)).await;
    assert_eq!(profiles.calls(), 1);
    assert_eq!(coordinator.phase(), AuthPhase::UserWithProfile);
    coordinator.dispose();
}

#[tokio::test(start_paused = true)]
async fn test_sign_in_failure_carries_provider_message() {
    let store = FakeStore::new(None);
    let profiles = FakeProfiles::new();
    let coordinator = coordinator(&store, &profiles, settings());
    coordinator.start();
    coordinator.wait_until_ready().await;

    let err = coordinator
        .sign_in("ada@example.com", "wrong")
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Provider(_)));
    assert_eq!(err.to_string(), "Invalid login credentials");
    assert_eq!(coordinator.phase(), AuthPhase::NoUser);
    coordinator.dispose();
}

#[tokio::test(start_paused = true)]
async fn test_sign_up_pending_confirmation() {
    let store = FakeStore::new(None);
    let profiles = FakeProfiles::new();
    let coordinator = coordinator(&store, &profiles, settings());
    coordinator.start();
    coordinator.wait_until_ready().await;

    let outcome = coordinator
        .sign_up("confirm-me@example.com", common::PASSWORD)
        .await
        .unwrap();
    assert_eq!(outcome, SignUpOutcome::ConfirmationRequired);
    assert_eq!(coordinator.phase(), AuthPhase::NoUser);

    let outcome = coordinator
        .sign_up("newbie@example.com", common::PASSWORD)
        .await
        .unwrap();
    match outcome {
        SignUpOutcome::SignedIn(state) => assert_eq!(state.phase(), AuthPhase::UserNoProfile),
        other => panic!("unexpected outcome: {:?}", other),
    }
    coordinator.dispose();
}

#[tokio::test(start_paused = true)]
async fn test_oauth_round_trip() {
    let store = FakeStore::new(None);
    let profiles = FakeProfiles::new();
    let coordinator = coordinator(&store, &profiles, settings());
    coordinator.start();
    coordinator.wait_until_ready().await;

    let redirect = coordinator
        .sign_in_with_provider(
            summit_client::models::OAuthProvider::Github,
            "http://localhost:3000/auth/callback",
        )
        .unwrap();
    assert!(redirect.url.contains("provider=github"));

    let state = coordinator.complete_oauth("abc").await.unwrap();
    assert_eq!(state.access_token.as_deref(), Some("token-abc"));
    assert_eq!(state.user_id(), Some("oauth-user"));
    coordinator.dispose();
}

#[tokio::test(start_paused = true)]
async fn test_profile_fetch_failure_keeps_cached_profile() {
    let store = FakeStore::new(Some(session("u1", "T0")));
    let profiles = FakeProfiles::new();
    profiles.reply("T0", ProfileReply::Found(profile("u1", "Ada", 100)));
    let coordinator = coordinator(&store, &profiles, settings());
    coordinator.start();
    coordinator.wait_until_ready().await;

    profiles.reply("T0", ProfileReply::Status(500));
    let cached = coordinator.refresh_profile().await;
    assert_eq!(cached.map(|p| p.credits), Some(100));

    // A hung backend is bounded by the profile timeout
    profiles.delay(Duration::from_secs(60));
    let cached = coordinator.fetch_profile("T0").await;
    assert_eq!(cached.map(|p| p.credits), Some(100));
    assert_eq!(coordinator.phase(), AuthPhase::UserWithProfile);

    // A profile deleted server-side drops back to onboarding
    profiles.delay(Duration::ZERO);
    profiles.reply("T0", ProfileReply::Status(404));
    assert!(coordinator.refresh_profile().await.is_none());
    assert_eq!(coordinator.phase(), AuthPhase::UserNoProfile);
    coordinator.dispose();
}

#[tokio::test(start_paused = true)]
async fn test_sign_out_clears_state_even_when_provider_fails() {
    let store = FakeStore::new(Some(session("u1", "T0")));
    store.fail_sign_out();
    let profiles = FakeProfiles::new();
    profiles.reply("T0", ProfileReply::Found(profile("u1", "Ada", 100)));
    let coordinator = coordinator(&store, &profiles, settings());
    coordinator.start();
    coordinator.wait_until_ready().await;

    assert!(coordinator.sign_out().await.is_err());
    let state = coordinator.state();
    assert_eq!(state.phase(), AuthPhase::NoUser);
    assert!(state.profile.is_none());
    assert!(state.access_token.is_none());
    coordinator.dispose();
}

#[tokio::test(start_paused = true)]
async fn test_dispose_discards_in_flight_profile() {
    let store = FakeStore::new(None);
    let profiles = FakeProfiles::new();
    let coordinator = coordinator(&store, &profiles, settings());
    coordinator.start();
    coordinator.wait_until_ready().await;

    profiles.delay(Duration::from_secs(1));
    profiles.reply("T1", ProfileReply::Found(profile("u1", "Ada", 100)));
    store.emit(AuthChangeEvent::SignedIn, Some(session("u1", "T1")));
    wait_for_phase(&coordinator, AuthPhase::UserNoProfile).await;

    coordinator.dispose();
    sleep(Duration::from_secs(2)).await;
    assert!(coordinator.state().profile.is_none());

    // Events after disposal are ignored
    store.emit(AuthChangeEvent::SignedOut, None);
    sleep(Duration::from_millis(10)).await;
    assert_eq!(coordinator.state().user_id(), Some("u1"));
}

#[tokio::test(start_paused = true)]
async fn test_start_is_idempotent() {
    let store = FakeStore::new(None);
    let profiles = FakeProfiles::new();
    let coordinator = coordinator(&store, &profiles, settings());

    coordinator.start();
    coordinator.start();
    coordinator.wait_until_ready().await;

    assert_eq!(store.probes(), 1);
    coordinator.dispose();
}
