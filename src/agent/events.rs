//! Progress events broadcast by the orchestrator.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use super::task::{AgentPhase, Step, TaskOutcome};

/// Channel capacity; slow subscribers lag rather than block the loop.
pub const EVENT_CAPACITY: usize = 256;

/// Something observable happened in the agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AgentEvent {
    PhaseChanged {
        phase: AgentPhase,
    },
    TaskStarted {
        task_id: String,
        input: String,
        simple_chat: bool,
        target_app: Option<String>,
    },
    /// The model decided; `summary` renders the decision.
    Decision {
        iteration: u32,
        summary: String,
        reasoning: Option<String>,
    },
    StepRecorded {
        step: Step,
    },
    TaskFinished {
        task_id: String,
        outcome: TaskOutcome,
    },
}

/// Broadcast sender wrapper that ignores the absence of subscribers.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<AgentEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(EVENT_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AgentEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: AgentEvent) {
        // Err only means nobody is listening.
        let _ = self.tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_emit_without_subscribers_is_fine() {
        let bus = EventBus::new();
        bus.emit(AgentEvent::PhaseChanged {
            phase: AgentPhase::Idle,
        });

        let mut rx = bus.subscribe();
        bus.emit(AgentEvent::PhaseChanged {
            phase: AgentPhase::Analyzing,
        });
        assert_eq!(
            rx.recv().await.unwrap(),
            AgentEvent::PhaseChanged {
                phase: AgentPhase::Analyzing
            }
        );
    }

    #[test]
    fn test_event_serialization() {
        let json = serde_json::to_value(AgentEvent::TaskFinished {
            task_id: "t".to_string(),
            outcome: TaskOutcome::Cancelled,
        })
        .unwrap();
        assert_eq!(json["event"], "task_finished");
        assert_eq!(json["outcome"]["outcome"], "cancelled");
    }
}
