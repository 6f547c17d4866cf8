//! Agent orchestration: task lifecycle, classification, and the bounded loop.

mod classifier;
mod config;
mod control;
mod events;
mod orchestrator;
mod task;
mod transcript;

pub use classifier::{Classification, TaskClassifier};
pub use config::{AgentConfig, DEFAULT_MAX_CONSECUTIVE_FAILURES, DEFAULT_MAX_STEPS};
pub use control::{ControlHandle, ControlSignal};
pub use events::{AgentEvent, EventBus, EVENT_CAPACITY};
pub use orchestrator::{AgentError, Orchestrator, TaskReport};
pub use task::{AgentPhase, Step, Task, TaskOutcome, TaskStatus};
pub use transcript::Transcript;
