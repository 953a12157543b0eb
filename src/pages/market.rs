// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Leaderboard, rewards catalog and credit history.

use super::Pages;
use crate::error::PageError;
use crate::models::market::ledger_totals;
use crate::models::{LeaderboardEntry, Reward, Transaction};

/// Medal for the podium, `#n` below it.
pub fn rank_badge(rank: u32) -> String {
    match rank {
        1 => "🥇".to_string(),
        2 => "🥈".to_string(),
        3 => "🥉".to_string(),
        n => format!("#{}", n),
    }
}

pub fn render_leaderboard(entries: &[LeaderboardEntry]) -> String {
    if entries.is_empty() {
        return "No one is on the leaderboard yet.".to_string();
    }
    entries
        .iter()
        .map(|e| {
            let top = if e.rank <= 3 { "  Top contributor" } else { "" };
            format!(
                "{:>4}  {}  {} credits earned{}",
                rank_badge(e.rank),
                e.name,
                e.credits,
                top
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_rewards(rewards: &[Reward]) -> String {
    if rewards.is_empty() {
        return "No rewards available.".to_string();
    }
    rewards
        .iter()
        .map(|r| {
            let mut line = format!("{}  {} ({})  {} credits", r.id, r.name, r.planet, r.cost);
            if let Some(description) = &r.description {
                line.push_str("\n      ");
                line.push_str(description);
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_transactions(transactions: &[Transaction]) -> String {
    if transactions.is_empty() {
        return "No transactions yet.".to_string();
    }

    let mut lines: Vec<String> = transactions
        .iter()
        .map(|t| {
            let amount = if t.amount > 0 {
                format!("+{}", t.amount)
            } else {
                t.amount.to_string()
            };
            let date = t
                .created_at
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default();
            format!(
                "{:<10}  {:>7} credits  {:<12}  {}",
                date,
                amount,
                t.transaction_type,
                t.description.as_deref().unwrap_or("")
            )
        })
        .collect();

    let (earned, spent) = ledger_totals(transactions);
    lines.push(format!("Earned {} / spent {} credits", earned, spent));
    lines.join("\n")
}

impl Pages {
    pub async fn leaderboard(&self) -> Result<String, PageError> {
        let entries = self.api().get_leaderboard().await?;
        Ok(render_leaderboard(&entries))
    }

    pub async fn rewards(&self) -> Result<String, PageError> {
        let rewards = self.api().list_rewards().await?;
        Ok(render_rewards(&rewards))
    }

    pub async fn transactions(&self, limit: u32) -> Result<String, PageError> {
        let api = self.api();
        let transactions = self
            .authenticated(|token| async move { api.get_transactions(&token, limit).await })
            .await?;
        Ok(render_transactions(&transactions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rank_badges() {
        assert_eq!(rank_badge(1), "🥇");
        assert_eq!(rank_badge(3), "🥉");
        assert_eq!(rank_badge(4), "#4");
    }

    #[test]
    fn test_transactions_show_signed_amounts_and_totals() {
        let tx = |id: &str, amount: i64, kind: &str| Transaction {
            id: id.to_string(),
            user_id: "u1".to_string(),
            amount,
            transaction_type: kind.to_string(),
            description: None,
            created_at: None,
        };
        let out = render_transactions(&[tx("a", 50, "task_reward"), tx("b", -20, "task_post")]);

        assert!(out.contains("+50 credits"));
        assert!(out.contains("-20 credits"));
        assert!(out.ends_with("Earned 50 / spent 20 credits"));
        assert_eq!(render_transactions(&[]), "No transactions yet.");
    }
}
