//! Onboarding tasks assigned to a user.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
}

/// Current lifecycle status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
}

/// A single onboarding task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    /// The user the task is assigned to.
    pub user_id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    pub priority: TaskPriority,
    pub status: TaskStatus,
    /// Who created the task (an admin email or "system").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn new(user_id: impl Into<String>, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            title: title.into(),
            description: None,
            due_date: None,
            priority: TaskPriority::default(),
            status: TaskStatus::default(),
            assigned_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Builder: set description.
    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    /// Builder: set due date.
    pub fn with_due_date(mut self, due: NaiveDate) -> Self {
        self.due_date = Some(due);
        self
    }

    /// Builder: set priority.
    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Builder: record who assigned the task.
    pub fn assigned_by(mut self, by: impl Into<String>) -> Self {
        self.assigned_by = Some(by.into());
        self
    }
}

/// Per-status task tallies for the dashboard header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCounts {
    pub pending: usize,
    pub in_progress: usize,
    pub completed: usize,
}

impl TaskCounts {
    pub fn tally(tasks: &[Task]) -> Self {
        tasks.iter().fold(Self::default(), |mut counts, task| {
            match task.status {
                TaskStatus::Pending => counts.pending += 1,
                TaskStatus::InProgress => counts.in_progress += 1,
                TaskStatus::Completed => counts.completed += 1,
            }
            counts
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_task_defaults() {
        let task = Task::new("u1", "Sign NDA");
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.priority, TaskPriority::Medium);
        assert!(task.assigned_by.is_none());
    }

    #[test]
    fn builder_sets_fields() {
        let due = NaiveDate::from_ymd_opt(2026, 11, 1).unwrap();
        let task = Task::new("u1", "Laptop pickup")
            .with_description("IT desk, floor 2")
            .with_due_date(due)
            .with_priority(TaskPriority::High)
            .assigned_by("hr@admin.com");
        assert_eq!(task.description.as_deref(), Some("IT desk, floor 2"));
        assert_eq!(task.due_date, Some(due));
        assert_eq!(task.priority, TaskPriority::High);
        assert_eq!(task.assigned_by.as_deref(), Some("hr@admin.com"));
    }

    #[test]
    fn status_serde_is_kebab_case() {
        assert_eq!(
            serde_json::to_string(&TaskStatus::InProgress).unwrap(),
            "\"in-progress\""
        );
        let parsed: TaskStatus = serde_json::from_str("\"completed\"").unwrap();
        assert_eq!(parsed, TaskStatus::Completed);
    }

    #[test]
    fn tally_counts_each_status() {
        let mut a = Task::new("u1", "a");
        a.status = TaskStatus::InProgress;
        let mut b = Task::new("u1", "b");
        b.status = TaskStatus::Completed;
        let c = Task::new("u1", "c");
        let d = Task::new("u1", "d");

        let counts = TaskCounts::tally(&[a, b, c, d]);
        assert_eq!(
            counts,
            TaskCounts {
                pending: 2,
                in_progress: 1,
                completed: 1
            }
        );
    }
}
