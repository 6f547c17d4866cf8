// Copyright 2025 Zhipu AI (Original Python implementation)
// Copyright 2025 ModerRAS (Rust implementation)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! # Phone Pilot
//!
//! Tool-calling agent that drives an Android device through a bounded
//! perceive, decide, act loop.
//!
//! Each iteration captures the screen from the least-privileged backend that
//! can read it, asks a language model (OpenAI-compatible or Anthropic) for
//! exactly one tool call, validates the call against the tool catalog, and
//! dispatches it to a capability backend. The loop ends when the model calls
//! `finished`, `failed`, or `ask_user`, after 20 iterations, or after three
//! consecutive failures.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use phone_pilot::{
//!     AdbBackend, AdbBackendConfig, AppSettings, BackendRegistry, Orchestrator,
//!     StaticAppResolver,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = AppSettings::resolve()?;
//!     let registry = BackendRegistry::new()
//!         .with_backend(Arc::new(AdbBackend::new(AdbBackendConfig::default())));
//!
//!     let agent = Orchestrator::from_settings(
//!         &settings,
//!         registry,
//!         Arc::new(StaticAppResolver::new()),
//!     )?;
//!     let report = agent.run_task("打开设置并开启蓝牙").await?;
//!
//!     println!("{:?}: {}", report.outcome.phase(), report.outcome.message());
//!     agent.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod actions;
pub mod adb;
pub mod agent;
pub mod backend;
pub mod config;
pub mod model;
pub mod perception;
pub mod settings;

pub use actions::{ActionDispatcher, AgentAction, ExecutionResult, ToolCatalog};
pub use adb::{AdbBackend, AdbBackendConfig, AdbConnection};
pub use agent::{
    AgentConfig, AgentError, AgentEvent, AgentPhase, ControlHandle, Orchestrator, Step, Task,
    TaskOutcome, TaskReport, TaskStatus,
};
pub use backend::{BackendRegistry, Capability, DeviceBackend, Privilege};
pub use config::{AppResolver, StaticAppResolver};
pub use model::{DecisionClient, DecisionResult, ModelConfig, ProviderKind};
pub use perception::{PerceptionAdapter, ScreenState, UiElement};
pub use settings::{AppSettings, SettingsError};
