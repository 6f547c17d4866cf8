//! Task, step history, and lifecycle states.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::actions::AgentAction;

/// Orchestrator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentPhase {
    Idle,
    Analyzing,
    Planning,
    Executing,
    WaitingUser,
    Paused,
    Completed,
    Failed,
}

impl AgentPhase {
    /// Phases from which a new task may start.
    pub fn accepts_new_task(&self) -> bool {
        matches!(
            self,
            AgentPhase::Idle | AgentPhase::Completed | AgentPhase::Failed
        )
    }
}

/// Lifecycle status of a [`Task`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Analyzing,
    Planning,
    Executing,
    WaitingUser,
    Paused,
    Completed,
    Failed,
}

impl From<AgentPhase> for TaskStatus {
    fn from(phase: AgentPhase) -> Self {
        match phase {
            AgentPhase::Idle => TaskStatus::Pending,
            AgentPhase::Analyzing => TaskStatus::Analyzing,
            AgentPhase::Planning => TaskStatus::Planning,
            AgentPhase::Executing => TaskStatus::Executing,
            AgentPhase::WaitingUser => TaskStatus::WaitingUser,
            AgentPhase::Paused => TaskStatus::Paused,
            AgentPhase::Completed => TaskStatus::Completed,
            AgentPhase::Failed => TaskStatus::Failed,
        }
    }
}

/// One executed action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub number: u32,
    /// Summary of the screen the action was decided on.
    pub screen_before: String,
    pub action: AgentAction,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Result of a vision pass, when the action was `describe_screen`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observation: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// How a task ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TaskOutcome {
    Completed {
        message: String,
    },
    Failed {
        reason: String,
    },
    WaitingUser {
        question: String,
        suggestions: Vec<String>,
    },
    Cancelled,
}

impl TaskOutcome {
    /// Human-readable message carried by the terminal state.
    pub fn message(&self) -> &str {
        match self {
            TaskOutcome::Completed { message } => message,
            TaskOutcome::Failed { reason } => reason,
            TaskOutcome::WaitingUser { question, .. } => question,
            TaskOutcome::Cancelled => "cancelled",
        }
    }

    /// Phase the orchestrator reports once the task has ended.
    pub fn phase(&self) -> AgentPhase {
        match self {
            TaskOutcome::Completed { .. } => AgentPhase::Completed,
            TaskOutcome::Failed { .. } => AgentPhase::Failed,
            TaskOutcome::WaitingUser { .. } => AgentPhase::WaitingUser,
            TaskOutcome::Cancelled => AgentPhase::Idle,
        }
    }
}

/// A user request and its append-only step history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub user_input: String,
    pub status: TaskStatus,
    pub step_count: u32,
    history: Vec<Step>,
    pub created_at: DateTime<Utc>,
}

impl Task {
    pub fn new(user_input: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_input: user_input.into(),
            status: TaskStatus::Pending,
            step_count: 0,
            history: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn history(&self) -> &[Step] {
        &self.history
    }

    /// Number for the next recorded step.
    pub fn next_step_number(&self) -> u32 {
        self.step_count + 1
    }

    /// Append a step. Earlier steps are never modified.
    pub fn record(&mut self, step: Step) {
        self.step_count += 1;
        self.history.push(step);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(number: u32) -> Step {
        Step {
            number,
            screen_before: "com.example (0 elements)".to_string(),
            action: AgentAction::Wait { duration_ms: 10 },
            success: true,
            error_message: None,
            observation: None,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_task_records_in_order() {
        let mut task = Task::new("open settings");
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.next_step_number(), 1);
        task.record(step(1));
        task.record(step(2));
        assert_eq!(task.step_count, 2);
        let numbers: Vec<u32> = task.history().iter().map(|s| s.number).collect();
        assert_eq!(numbers, vec![1, 2]);
    }

    #[test]
    fn test_task_ids_are_unique() {
        assert_ne!(Task::new("a").id, Task::new("a").id);
    }

    #[test]
    fn test_phase_gates_new_tasks() {
        assert!(AgentPhase::Idle.accepts_new_task());
        assert!(AgentPhase::Failed.accepts_new_task());
        assert!(!AgentPhase::Executing.accepts_new_task());
        assert!(!AgentPhase::WaitingUser.accepts_new_task());
        assert_eq!(TaskOutcome::Cancelled.phase(), AgentPhase::Idle);
    }

    #[test]
    fn test_step_serializes_without_empty_fields() {
        let json = serde_json::to_value(step(1)).unwrap();
        assert_eq!(json["action"]["kind"], "wait");
        assert!(json.get("error_message").is_none());
    }
}
