// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Leaderboard, reward catalog and credit ledger models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use super::timestamp;

/// One row of `GET /v1/leaderboard`. Ranks start at 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct LeaderboardEntry {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    pub credits: i64,
    pub rank: u32,
}

/// Reward redeemable for credits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Reward {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub planet: String,
    pub cost: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Credit ledger entry. Negative amounts are credits spent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Transaction {
    pub id: String,
    pub user_id: String,
    pub amount: i64,
    pub transaction_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, with = "timestamp")]
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub created_at: Option<DateTime<Utc>>,
}

impl Transaction {
    pub fn is_credit(&self) -> bool {
        self.amount > 0
    }
}

/// Sum of a page of ledger entries (earned, spent).
pub fn ledger_totals(transactions: &[Transaction]) -> (i64, i64) {
    transactions.iter().fold((0, 0), |(earned, spent), t| {
        if t.amount >= 0 {
            (earned.saturating_add(t.amount), spent)
        } else {
            (earned, spent.saturating_sub(t.amount))
        }
    })
}
