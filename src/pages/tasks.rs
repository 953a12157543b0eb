// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Task board, task detail and lifecycle actions, posting, and the
//! "my posted" / "my claimed" lists.

use validator::Validate;

use super::Pages;
use crate::error::PageError;
use crate::models::{CreateTaskRequest, Task, TaskAction};

/// Skill value meaning "no skill filter".
pub const ALL_SKILLS: &str = "all";

/// Search and skill filter for the task board.
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    /// Case-insensitive match on title or description
    pub search: Option<String>,
    /// Exact skill; `None` or `"all"` shows every skill
    pub skill: Option<String>,
}

impl TaskFilter {
    fn skill(&self) -> Option<&str> {
        self.skill
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty() && *s != ALL_SKILLS)
    }

    pub fn matches(&self, task: &Task) -> bool {
        let search_ok = self
            .search
            .as_deref()
            .map_or(true, |query| task.matches_query(query));
        let skill_ok = self.skill().map_or(true, |skill| task.skill == skill);
        search_ok && skill_ok
    }
}

pub fn filter_tasks<'a>(tasks: &'a [Task], filter: &TaskFilter) -> Vec<&'a Task> {
    tasks.iter().filter(|t| filter.matches(t)).collect()
}

/// Distinct skills in first-seen order.
pub fn unique_skills(tasks: &[Task]) -> Vec<String> {
    let mut skills: Vec<String> = Vec::new();
    for task in tasks {
        if !skills.iter().any(|s| *s == task.skill) {
            skills.push(task.skill.clone());
        }
    }
    skills
}

fn task_line(task: &Task) -> String {
    let urgency = task
        .urgency
        .as_deref()
        .map(|u| format!(" [{}]", u))
        .unwrap_or_default();
    format!(
        "{}  {} ({}){}  {} credits  {}",
        task.id, task.title, task.skill, urgency, task.credit_reward, task.status
    )
}

/// Task board. `total` is the unfiltered count, which picks the empty text.
pub fn render_task_list(shown: &[&Task], total: usize) -> String {
    if shown.is_empty() {
        return if total == 0 {
            "No tasks available yet.".to_string()
        } else {
            "No tasks match your filters.".to_string()
        };
    }
    let mut lines: Vec<String> = shown.iter().map(|t| task_line(t)).collect();
    lines.push(format!("{} of {} tasks", shown.len(), total));
    lines.join("\n")
}

/// Full task view with the actions open to `user_id`.
pub fn render_task_detail(task: &Task, user_id: Option<&str>) -> String {
    let mut lines = vec![
        format!("{} [{}]", task.title, task.status),
        format!("Skill: {}", task.skill),
        format!("Reward: {} credits", task.credit_reward),
    ];
    if let Some(urgency) = &task.urgency {
        lines.push(format!("Urgency: {}", urgency));
    }
    if let Some(created_at) = task.created_at {
        lines.push(format!("Posted: {}", created_at.format("%Y-%m-%d %H:%M UTC")));
    }
    lines.push(String::new());
    lines.push(task.description.clone());

    let actions = task.available_actions(user_id);
    if !actions.is_empty() {
        let names: Vec<String> = actions.iter().map(|a| a.to_string()).collect();
        lines.push(String::new());
        lines.push(format!("Actions: {}", names.join(", ")));
    }
    lines.join("\n")
}

impl Pages {
    /// Public task board.
    pub async fn tasks(&self, filter: &TaskFilter) -> Result<String, PageError> {
        let tasks = self.api().list_tasks().await?;
        let shown = filter_tasks(&tasks, filter);
        Ok(render_task_list(&shown, tasks.len()))
    }

    /// Skills present on the board, for the skill filter.
    pub async fn skills(&self) -> Result<String, PageError> {
        let tasks = self.api().list_tasks().await?;
        let mut lines = vec![ALL_SKILLS.to_string()];
        lines.extend(unique_skills(&tasks));
        Ok(lines.join("\n"))
    }

    pub async fn task_detail(&self, task_id: &str) -> Result<String, PageError> {
        let task = self.api().get_task(task_id).await?;
        let state = self.coordinator().state();
        Ok(render_task_detail(&task, state.user_id()))
    }

    /// Run a lifecycle action after checking the user may take it.
    pub async fn run_task_action(
        &self,
        task_id: &str,
        action: TaskAction,
    ) -> Result<String, PageError> {
        let state = self.coordinator().state();
        if state.loading || state.user.is_none() {
            return Err(PageError::NotReady(state.phase()));
        }

        let task = self.api().get_task(task_id).await?;
        if !task.available_actions(state.user_id()).contains(&action) {
            return Err(PageError::Invalid(format!(
                "Cannot {} a task that is {}",
                action, task.status
            )));
        }

        let api = self.api();
        let updated = self
            .authenticated(|token| async move { api.apply_action(&token, task_id, action).await })
            .await?;
        tracing::info!(task_id, %action, "Task action applied");

        let mut out = action.success_message().to_string();
        if let Some(task) = updated {
            out.push_str("\n\n");
            out.push_str(&render_task_detail(&task, state.user_id()));
        }
        Ok(out)
    }

    /// Post a task. The reward must fit the user's credit balance.
    pub async fn post_task(&self, request: CreateTaskRequest) -> Result<String, PageError> {
        if request.validate().is_err() {
            return Err(PageError::Invalid(
                "Please fill in all required fields with a positive credit reward".to_string(),
            ));
        }
        if let Some(profile) = &self.coordinator().state().profile {
            if request.credit_reward > profile.credits {
                return Err(PageError::Invalid("Insufficient credits".to_string()));
            }
        }

        let api = self.api();
        let task = self
            .authenticated(|token| async move { api.create_task(&token, &request).await })
            .await?;
        tracing::info!(task_id = %task.id, reward = task.credit_reward, "Task posted");
        // The reward is escrowed; pick up the new balance.
        self.coordinator().refresh_profile().await;

        Ok(format!("Task created successfully!\n\n{}", task_line(&task)))
    }

    pub async fn my_posted(&self) -> Result<String, PageError> {
        let api = self.api();
        let tasks = self
            .authenticated(|token| async move { api.get_my_posted_tasks(&token).await })
            .await?;
        if tasks.is_empty() {
            return Ok("You have not posted any tasks yet.".to_string());
        }
        Ok(tasks.iter().map(task_line).collect::<Vec<_>>().join("\n"))
    }

    pub async fn my_claimed(&self) -> Result<String, PageError> {
        let api = self.api();
        let tasks = self
            .authenticated(|token| async move { api.get_my_claimed_tasks(&token).await })
            .await?;
        if tasks.is_empty() {
            return Ok("You have not claimed any tasks yet.".to_string());
        }
        Ok(tasks.iter().map(task_line).collect::<Vec<_>>().join("\n"))
    }
}
