//! Bounded agent loop tying perception, decisions, and dispatch together.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::broadcast;

use super::classifier::TaskClassifier;
use super::config::AgentConfig;
use super::control::ControlHandle;
use super::events::{AgentEvent, EventBus};
use super::task::{AgentPhase, Step, Task, TaskOutcome};
use super::transcript::Transcript;
use crate::actions::{ActionDispatcher, AgentAction, ToolCatalog};
use crate::backend::BackendRegistry;
use crate::config::{chat_system_prompt, device_system_prompt, AppResolver};
use crate::model::{DecisionClient, DecisionInput, DecisionResult};
use crate::perception::{PerceptionAdapter, ScreenState};
use crate::settings::{AppSettings, SettingsError};

/// Orchestrator API misuse and setup errors.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("A task is already active (phase {0:?})")]
    TaskActive(AgentPhase),
    #[error("No task is waiting for an answer")]
    NotWaitingUser,
    #[error("Task input is empty")]
    EmptyInput,
    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),
}

/// Result of one task run.
#[derive(Debug, Clone)]
pub struct TaskReport {
    pub task: Task,
    pub outcome: TaskOutcome,
    /// Every phase the orchestrator passed through, in order.
    pub phases: Vec<AgentPhase>,
}

impl TaskReport {
    pub fn steps(&self) -> &[Step] {
        self.task.history()
    }
}

struct State {
    phase: AgentPhase,
    /// Input of the task that ended in `WaitingUser`.
    waiting_input: Option<String>,
}

/// Per-run bookkeeping.
struct Run {
    task: Task,
    phases: Vec<AgentPhase>,
    transcript: Option<Transcript>,
}

/// Drives one task at a time through the bounded perceive, decide, act loop.
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use phone_pilot::{AgentConfig, BackendRegistry, DecisionClient, ModelConfig, Orchestrator, StaticAppResolver};
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let registry = BackendRegistry::new();
///     let decisions = DecisionClient::new(ModelConfig::default());
///     let agent = Orchestrator::new(
///         registry,
///         Arc::new(StaticAppResolver::new()),
///         decisions,
///         AgentConfig::default(),
///     );
///     let report = agent.run_task("Open Settings").await?;
///     println!("{}", report.outcome.message());
///     Ok(())
/// }
/// ```
pub struct Orchestrator {
    perception: PerceptionAdapter,
    decisions: DecisionClient,
    dispatcher: ActionDispatcher,
    classifier: TaskClassifier,
    tools: ToolCatalog,
    config: AgentConfig,
    control: ControlHandle,
    events: EventBus,
    state: Mutex<State>,
}

impl Orchestrator {
    pub fn new(
        backends: BackendRegistry,
        apps: Arc<dyn AppResolver>,
        decisions: DecisionClient,
        config: AgentConfig,
    ) -> Self {
        Self {
            perception: PerceptionAdapter::new(backends.clone()),
            decisions: decisions.with_render_options(config.render_options()),
            dispatcher: ActionDispatcher::new(backends, apps.clone()),
            classifier: TaskClassifier::new(apps),
            tools: ToolCatalog::new(config.describe_tool),
            config,
            control: ControlHandle::new(),
            events: EventBus::new(),
            state: Mutex::new(State {
                phase: AgentPhase::Idle,
                waiting_input: None,
            }),
        }
    }

    /// Build from resolved settings, with the decision client they describe.
    pub fn from_settings(
        settings: &AppSettings,
        backends: BackendRegistry,
        apps: Arc<dyn AppResolver>,
    ) -> Result<Self, AgentError> {
        let decisions = DecisionClient::new(settings.to_model_config()?);
        Ok(Self::new(backends, apps, decisions, settings.to_agent_config()))
    }

    /// Share an externally created control handle.
    pub fn with_control(mut self, control: ControlHandle) -> Self {
        self.control = control;
        self
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Handle for pausing, resuming, or cancelling the active task.
    pub fn control(&self) -> ControlHandle {
        self.control.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AgentEvent> {
        self.events.subscribe()
    }

    pub fn phase(&self) -> AgentPhase {
        self.state().phase
    }

    /// Cancel the running task, or drop a pending question.
    pub fn cancel(&self) {
        self.control.cancel();
        let dropped = {
            let mut state = self.state();
            if state.phase == AgentPhase::WaitingUser {
                state.phase = AgentPhase::Idle;
                state.waiting_input = None;
                true
            } else {
                false
            }
        };
        if dropped {
            tracing::info!("pending question dropped");
            self.events.emit(AgentEvent::PhaseChanged {
                phase: AgentPhase::Idle,
            });
        }
    }

    /// Release every backend.
    pub async fn shutdown(&self) {
        self.control.cancel();
        self.dispatcher.backends().shutdown().await;
    }

    /// Run `input` as a new task until it completes, fails, asks the user, or
    /// is cancelled.
    pub async fn run_task(&self, input: &str) -> Result<TaskReport, AgentError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(AgentError::EmptyInput);
        }
        let mut run = self.begin(input)?;
        let outcome = self.drive(&mut run).await;
        Ok(self.finish(run, outcome))
    }

    /// Answer the question a `WaitingUser` task asked; the original input plus
    /// the answer runs as a new task.
    pub async fn answer(&self, answer: &str) -> Result<TaskReport, AgentError> {
        let original = {
            let mut state = self.state();
            if state.phase != AgentPhase::WaitingUser {
                return Err(AgentError::NotWaitingUser);
            }
            state.phase = AgentPhase::Idle;
            state.waiting_input.take().unwrap_or_default()
        };
        self.events.emit(AgentEvent::PhaseChanged {
            phase: AgentPhase::Idle,
        });
        tracing::info!(answer = %answer.trim(), "resuming with user answer");
        self.run_task(&format!("{}\n{}", original, answer.trim()))
            .await
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn begin(&self, input: &str) -> Result<Run, AgentError> {
        let returned_to_idle = {
            let mut state = self.state();
            if !state.phase.accepts_new_task() {
                return Err(AgentError::TaskActive(state.phase));
            }
            let was_idle = state.phase == AgentPhase::Idle;
            // Claim the orchestrator before releasing the lock.
            state.phase = AgentPhase::Analyzing;
            state.waiting_input = None;
            !was_idle
        };
        if returned_to_idle {
            self.events.emit(AgentEvent::PhaseChanged {
                phase: AgentPhase::Idle,
            });
        }
        self.control.reset();

        let task = Task::new(input);
        let transcript = self.config.transcript_dir.as_deref().and_then(|dir| {
            Transcript::create(dir, &task)
                .map_err(|e| tracing::warn!(error = %e, "transcript disabled for this task"))
                .ok()
        });
        let mut run = Run {
            task,
            phases: vec![AgentPhase::Idle],
            transcript,
        };
        self.set_phase(&mut run, AgentPhase::Analyzing);
        Ok(run)
    }

    async fn drive(&self, run: &mut Run) -> TaskOutcome {
        let classification = self.classifier.classify(&run.task.user_input);
        let backend_ready = self.dispatcher.backends().any_available().await;

        tracing::info!(
            task_id = %run.task.id,
            simple_chat = classification.simple_chat,
            target_app = classification.target_app.as_deref().unwrap_or("-"),
            backend_ready,
            "task started"
        );
        self.events.emit(AgentEvent::TaskStarted {
            task_id: run.task.id.clone(),
            input: run.task.user_input.clone(),
            simple_chat: classification.simple_chat,
            target_app: classification.target_app.clone(),
        });

        if classification.simple_chat || !backend_ready {
            if !classification.simple_chat {
                tracing::warn!("no capability backend available, answering in chat-only mode");
            }
            return self.chat(run).await;
        }

        let mut feedback = None;
        if let Some(app_name) = classification.target_app {
            self.set_phase(run, AgentPhase::Planning);
            feedback = self.prelaunch(run, app_name).await;
            if !self
                .control
                .sleep(Duration::from_millis(self.config.app_launch_settle_ms))
                .await
            {
                return TaskOutcome::Cancelled;
            }
        }

        self.device_loop(run, feedback).await
    }

    /// Single decision round with no device access.
    async fn chat(&self, run: &mut Run) -> TaskOutcome {
        self.set_phase(run, AgentPhase::Executing);
        let system_prompt = chat_system_prompt(&self.config.lang);
        let tools = ToolCatalog::terminal_only();

        let decision = self
            .decisions
            .converse(&system_prompt, &run.task.user_input, &tools)
            .await;
        self.emit_decision(1, &decision);

        if self.control.is_cancelled() {
            return TaskOutcome::Cancelled;
        }

        match decision {
            DecisionResult::TextOnly(text, _) => TaskOutcome::Completed { message: text },
            DecisionResult::ToolCall(action, _) => match action {
                AgentAction::Finished { message } => TaskOutcome::Completed { message },
                AgentAction::Failed { reason } => TaskOutcome::Failed { reason },
                AgentAction::AskUser {
                    question,
                    suggestions,
                } => TaskOutcome::WaitingUser {
                    question,
                    suggestions,
                },
                other => TaskOutcome::Failed {
                    reason: format!("{} is not allowed without a device", other.tool_name()),
                },
            },
            DecisionResult::Empty(_) => TaskOutcome::Failed {
                reason: "The model returned an empty reply".to_string(),
            },
            DecisionResult::Error(message) => TaskOutcome::Failed { reason: message },
        }
    }

    /// Launch the app named in the input before the loop. Returns a note for
    /// the first decision when the launch failed.
    async fn prelaunch(&self, run: &mut Run, app_name: String) -> Option<String> {
        let screen = ScreenState::empty("unknown");
        let action = AgentAction::OpenApp { app_name };
        let result = self.dispatcher.execute(&action, &screen).await;
        let note = (!result.success).then(|| {
            format!(
                "Opening the app failed ({}); open it yourself or navigate another way.",
                result.message
            )
        });
        let step = Step {
            number: run.task.next_step_number(),
            screen_before: screen.summary(),
            action,
            success: result.success,
            error_message: result.error_message,
            observation: None,
            timestamp: Utc::now(),
        };
        self.record(run, step);
        note
    }

    async fn device_loop(&self, run: &mut Run, mut feedback: Option<String>) -> TaskOutcome {
        self.set_phase(run, AgentPhase::Executing);
        let mut failures = 0u32;
        let mut previous_was_describe = false;

        for iteration in 1..=self.config.max_steps {
            if self.control.is_cancelled() {
                return TaskOutcome::Cancelled;
            }
            if self.control.is_paused() {
                self.set_phase(run, AgentPhase::Paused);
                tracing::info!(iteration, "paused");
                if !self.control.wait_until_running().await {
                    return TaskOutcome::Cancelled;
                }
                tracing::info!(iteration, "resumed");
                self.set_phase(run, AgentPhase::Executing);
            }

            let screen = match self.perception.capture().await {
                Ok(screen) => screen,
                Err(e) => {
                    tracing::warn!(iteration, error = %e, "perception failed, using degraded screen");
                    ScreenState::degraded()
                }
            };
            if self.control.is_cancelled() {
                return TaskOutcome::Cancelled;
            }

            let tools = if previous_was_describe {
                self.tools.without("describe_screen")
            } else {
                self.tools.clone()
            };
            let system_prompt = self.system_prompt(&screen);
            let decision = self
                .decisions
                .decide(&DecisionInput {
                    system_prompt: &system_prompt,
                    task: &run.task.user_input,
                    screen: &screen,
                    history: run.task.history(),
                    tools: &tools,
                    feedback: feedback.as_deref(),
                })
                .await;
            feedback = None;
            previous_was_describe = false;
            self.emit_decision(iteration, &decision);

            if self.control.is_cancelled() {
                return TaskOutcome::Cancelled;
            }

            let failure = match decision {
                DecisionResult::ToolCall(action, _) => match action {
                    AgentAction::Finished { message } => {
                        return TaskOutcome::Completed { message }
                    }
                    AgentAction::Failed { reason } => return TaskOutcome::Failed { reason },
                    AgentAction::AskUser {
                        question,
                        suggestions,
                    } => {
                        return TaskOutcome::WaitingUser {
                            question,
                            suggestions,
                        }
                    }
                    AgentAction::DescribeScreen { focus } => {
                        previous_was_describe = true;
                        let observed = self.observe(&screen, focus.as_deref()).await;
                        let (observation, error) = match observed {
                            Ok(text) => (Some(text), None),
                            Err(e) => (None, Some(e)),
                        };
                        let step = Step {
                            number: run.task.next_step_number(),
                            screen_before: screen.summary(),
                            action: AgentAction::DescribeScreen { focus },
                            success: error.is_none(),
                            error_message: error.clone(),
                            observation,
                            timestamp: Utc::now(),
                        };
                        self.record(run, step);
                        error
                    }
                    action => {
                        let result = self.dispatcher.execute(&action, &screen).await;
                        let step = Step {
                            number: run.task.next_step_number(),
                            screen_before: screen.summary(),
                            action,
                            success: result.success,
                            error_message: result.error_message.clone(),
                            observation: None,
                            timestamp: Utc::now(),
                        };
                        self.record(run, step);
                        (!result.success).then(|| result.message)
                    }
                },
                DecisionResult::TextOnly(text, _) => {
                    feedback = Some(
                        "You replied with text but called no tool. Act by calling exactly one \
                         tool; call finished when the task is done."
                            .to_string(),
                    );
                    Some(format!("Text reply without a tool call: {}", preview(&text)))
                }
                DecisionResult::Empty(_) => {
                    feedback =
                        Some("Your previous reply was empty. Call exactly one tool.".to_string());
                    Some("Empty model reply".to_string())
                }
                DecisionResult::Error(message) => {
                    feedback = Some(format!(
                        "Your previous decision was rejected: {}. Call exactly one valid tool.",
                        message
                    ));
                    Some(message)
                }
            };

            match failure {
                None => failures = 0,
                Some(error) => {
                    failures += 1;
                    tracing::warn!(
                        iteration,
                        failures,
                        max = self.config.max_consecutive_failures,
                        error = %error,
                        "iteration failed"
                    );
                    if failures >= self.config.max_consecutive_failures {
                        return TaskOutcome::Failed {
                            reason: format!(
                                "Stopped after {} consecutive failures: {}",
                                failures, error
                            ),
                        };
                    }
                }
            }

            if !self
                .control
                .sleep(Duration::from_millis(self.config.step_delay_ms))
                .await
            {
                return TaskOutcome::Cancelled;
            }
        }

        TaskOutcome::Failed {
            reason: format!(
                "Step budget exceeded ({} iterations without finishing)",
                self.config.max_steps
            ),
        }
    }

    fn system_prompt(&self, screen: &ScreenState) -> String {
        match &self.config.system_prompt {
            Some(prompt) => prompt.clone(),
            None => device_system_prompt(&self.config.lang, self.config.describe_tool, screen.display),
        }
    }

    /// Vision pass over the screenshot of `screen`.
    async fn observe(&self, screen: &ScreenState, focus: Option<&str>) -> Result<String, String> {
        let Some(screenshot) = &screen.screenshot else {
            return Err("No screenshot available to describe".to_string());
        };
        self.decisions
            .describe_screen(screenshot, focus)
            .await
            .map_err(|e| e.to_string())
    }

    fn set_phase(&self, run: &mut Run, phase: AgentPhase) {
        self.state().phase = phase;
        run.task.status = phase.into();
        run.phases.push(phase);
        tracing::debug!(task_id = %run.task.id, ?phase, "phase changed");
        self.events.emit(AgentEvent::PhaseChanged { phase });
    }

    fn record(&self, run: &mut Run, step: Step) {
        tracing::info!(
            step = step.number,
            action = %step.action.describe(),
            success = step.success,
            "step recorded"
        );
        if let Some(transcript) = &run.transcript {
            if let Err(e) = transcript.record_step(&step) {
                tracing::warn!(error = %e, "failed to write transcript step");
            }
        }
        self.events.emit(AgentEvent::StepRecorded { step: step.clone() });
        run.task.record(step);
    }

    fn emit_decision(&self, iteration: u32, decision: &DecisionResult) {
        let summary = match decision {
            DecisionResult::ToolCall(action, _) => action.describe(),
            DecisionResult::TextOnly(text, _) => format!("text: {}", preview(text)),
            DecisionResult::Empty(_) => "empty reply".to_string(),
            DecisionResult::Error(message) => format!("error: {}", message),
        };
        self.events.emit(AgentEvent::Decision {
            iteration,
            summary,
            reasoning: decision.reasoning().map(str::to_string),
        });
    }

    fn finish(&self, mut run: Run, outcome: TaskOutcome) -> TaskReport {
        let phase = outcome.phase();
        {
            let mut state = self.state();
            if let TaskOutcome::WaitingUser { .. } = outcome {
                state.waiting_input = Some(run.task.user_input.clone());
            }
        }
        self.set_phase(&mut run, phase);

        if let Some(transcript) = &run.transcript {
            if let Err(e) = transcript.record_outcome(&outcome, run.task.step_count) {
                tracing::warn!(error = %e, "failed to write transcript outcome");
            }
        }
        match &outcome {
            TaskOutcome::Completed { message } => {
                tracing::info!(task_id = %run.task.id, steps = run.task.step_count, %message, "task completed")
            }
            TaskOutcome::Failed { reason } => {
                tracing::warn!(task_id = %run.task.id, steps = run.task.step_count, %reason, "task failed")
            }
            TaskOutcome::WaitingUser { question, .. } => {
                tracing::info!(task_id = %run.task.id, %question, "waiting for user")
            }
            TaskOutcome::Cancelled => {
                tracing::info!(task_id = %run.task.id, steps = run.task.step_count, "task cancelled")
            }
        }
        self.events.emit(AgentEvent::TaskFinished {
            task_id: run.task.id.clone(),
            outcome: outcome.clone(),
        });

        TaskReport {
            task: run.task,
            outcome,
            phases: run.phases,
        }
    }
}

fn preview(text: &str) -> String {
    const MAX: usize = 80;
    if text.chars().count() <= MAX {
        text.to_string()
    } else {
        format!("{}...", text.chars().take(MAX).collect::<String>())
    }
}
