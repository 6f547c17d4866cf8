//! Maps decided actions onto capability backends.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::sleep;

use super::action::{AgentAction, ScrollDirection};
use crate::backend::{BackendRegistry, Capability, DeviceBackend, TextPayload};
use crate::config::AppResolver;
use crate::perception::ScreenState;

/// Upper bound for a single `wait`.
pub const MAX_WAIT_MS: u64 = 10_000;

/// Upper bound for a press or swipe gesture.
pub const MAX_GESTURE_MS: u64 = 5_000;

/// Pause between the two taps of a double tap.
const DOUBLE_TAP_INTERVAL_MS: u64 = 100;

/// Scroll gesture duration.
const SCROLL_DURATION_MS: u64 = 400;

/// Display size assumed for scroll gestures when none is known.
const FALLBACK_DISPLAY: (u32, u32) = (1080, 2400);

/// Outcome of executing one action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl ExecutionResult {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            error_message: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            success: false,
            message: error.clone(),
            error_message: Some(error),
        }
    }
}

/// Executes device-affecting actions through the least-privileged capable backend.
///
/// Backend selection happens once per call. A failing backend is reported, not
/// retried on another one.
#[derive(Clone)]
pub struct ActionDispatcher {
    backends: BackendRegistry,
    apps: Arc<dyn AppResolver>,
}

impl ActionDispatcher {
    pub fn new(backends: BackendRegistry, apps: Arc<dyn AppResolver>) -> Self {
        Self { backends, apps }
    }

    pub fn backends(&self) -> &BackendRegistry {
        &self.backends
    }

    /// Execute `action`. `screen` bounds coordinate validation.
    pub async fn execute(&self, action: &AgentAction, screen: &ScreenState) -> ExecutionResult {
        let result = self.execute_inner(action, screen).await;
        if result.success {
            tracing::info!(action = action.tool_name(), "{}", result.message);
        } else {
            tracing::warn!(action = action.tool_name(), error = %result.message, "action failed");
        }
        result
    }

    async fn execute_inner(&self, action: &AgentAction, screen: &ScreenState) -> ExecutionResult {
        match action {
            AgentAction::Tap { x, y } => {
                let (x, y) = match validate_point(*x, *y, "tap", screen) {
                    Ok(point) => point,
                    Err(failure) => return failure,
                };
                let backend = match self.backend_for(Capability::Pointer).await {
                    Ok(b) => b,
                    Err(failure) => return failure,
                };
                report(backend.tap(x, y).await, format!("Tapped ({}, {})", x, y))
            }
            AgentAction::LongPress { x, y, duration_ms } => {
                let (x, y) = match validate_point(*x, *y, "long_press", screen) {
                    Ok(point) => point,
                    Err(failure) => return failure,
                };
                let backend = match self.backend_for(Capability::Pointer).await {
                    Ok(b) => b,
                    Err(failure) => return failure,
                };
                // Zero-length swipe held for the duration.
                let ms = (*duration_ms).min(MAX_GESTURE_MS);
                report(
                    backend.swipe(x, y, x, y, ms).await,
                    format!("Long-pressed ({}, {}) for {}ms", x, y, ms),
                )
            }
            AgentAction::DoubleTap { x, y } => {
                let (x, y) = match validate_point(*x, *y, "double_tap", screen) {
                    Ok(point) => point,
                    Err(failure) => return failure,
                };
                let backend = match self.backend_for(Capability::Pointer).await {
                    Ok(b) => b,
                    Err(failure) => return failure,
                };
                if let Err(e) = backend.tap(x, y).await {
                    return ExecutionResult::failure(e.to_string());
                }
                sleep(Duration::from_millis(DOUBLE_TAP_INTERVAL_MS)).await;
                report(backend.tap(x, y).await, format!("Double-tapped ({}, {})", x, y))
            }
            AgentAction::Swipe {
                start_x,
                start_y,
                end_x,
                end_y,
                duration_ms,
            } => {
                let (x1, y1) = match validate_point(*start_x, *start_y, "swipe start", screen) {
                    Ok(point) => point,
                    Err(failure) => return failure,
                };
                let (x2, y2) = match validate_point(*end_x, *end_y, "swipe end", screen) {
                    Ok(point) => point,
                    Err(failure) => return failure,
                };
                let backend = match self.backend_for(Capability::Pointer).await {
                    Ok(b) => b,
                    Err(failure) => return failure,
                };
                report(
                    backend.swipe(x1, y1, x2, y2, (*duration_ms).min(MAX_GESTURE_MS)).await,
                    format!("Swiped ({}, {}) -> ({}, {})", x1, y1, x2, y2),
                )
            }
            AgentAction::Scroll { direction } => {
                let backend = match self.backend_for(Capability::Pointer).await {
                    Ok(b) => b,
                    Err(failure) => return failure,
                };
                let ((x1, y1), (x2, y2)) = scroll_gesture(*direction, screen.display);
                report(
                    backend.swipe(x1, y1, x2, y2, SCROLL_DURATION_MS).await,
                    format!("Scrolled {}", direction.as_str()),
                )
            }
            AgentAction::InputText { text } => {
                let backend = match self.backend_for(Capability::Text).await {
                    Ok(b) => b,
                    Err(failure) => return failure,
                };
                report(
                    backend.input_text(&TextPayload::replace(text.clone())).await,
                    format!("Typed {} characters", text.chars().count()),
                )
            }
            AgentAction::ClearText => {
                let backend = match self.backend_for(Capability::Text).await {
                    Ok(b) => b,
                    Err(failure) => return failure,
                };
                report(
                    backend.input_text(&TextPayload::clear()).await,
                    "Cleared text field",
                )
            }
            AgentAction::PressKey { key } => {
                let backend = match self.backend_for(Capability::Keys).await {
                    Ok(b) => b,
                    Err(failure) => return failure,
                };
                report(
                    backend.press_key(*key).await,
                    format!("Pressed {}", key.as_str()),
                )
            }
            AgentAction::OpenApp { app_name } => {
                let Some(package) = self.apps.resolve(app_name) else {
                    return ExecutionResult::failure(format!("App not found: {}", app_name));
                };
                let backend = match self.backend_for(Capability::AppLifecycle).await {
                    Ok(b) => b,
                    Err(failure) => return failure,
                };
                report(
                    backend.launch(&package).await,
                    format!("Launched {} ({})", app_name, package),
                )
            }
            AgentAction::CloseApp { app_name } => {
                let Some(package) = self.apps.resolve(app_name) else {
                    return ExecutionResult::failure(format!("App not found: {}", app_name));
                };
                let backend = match self.backend_for(Capability::AppLifecycle).await {
                    Ok(b) => b,
                    Err(failure) => return failure,
                };
                report(
                    backend.force_stop(&package).await,
                    format!("Stopped {} ({})", app_name, package),
                )
            }
            AgentAction::Wait { duration_ms } => {
                let ms = (*duration_ms).min(MAX_WAIT_MS);
                sleep(Duration::from_millis(ms)).await;
                ExecutionResult::success(format!("Waited {}ms", ms))
            }
            AgentAction::DescribeScreen { .. }
            | AgentAction::Finished { .. }
            | AgentAction::Failed { .. }
            | AgentAction::AskUser { .. } => ExecutionResult::failure(format!(
                "{} is not a device action",
                action.tool_name()
            )),
        }
    }

    async fn backend_for(
        &self,
        capability: Capability,
    ) -> Result<Arc<dyn DeviceBackend>, ExecutionResult> {
        match self.backends.select(capability).await {
            Some(backend) => {
                tracing::debug!(backend = backend.name(), ?capability, "backend selected");
                Ok(backend)
            }
            None => Err(ExecutionResult::failure(format!(
                "No available backend for {:?}",
                capability
            ))),
        }
    }
}

fn report(
    result: Result<(), crate::backend::BackendError>,
    message: impl Into<String>,
) -> ExecutionResult {
    match result {
        Ok(()) => ExecutionResult::success(message),
        Err(e) => ExecutionResult::failure(e.to_string()),
    }
}

/// Reject points outside the known display. Unknown display size passes
/// non-negative points through.
fn validate_point(
    x: i32,
    y: i32,
    name: &str,
    screen: &ScreenState,
) -> Result<(i32, i32), ExecutionResult> {
    let (width, height) = match screen.display {
        Some((w, h)) => (i64::from(w), i64::from(h)),
        None => (i64::MAX, i64::MAX),
    };
    let (x64, y64) = (i64::from(x), i64::from(y));

    if x64 < 0 || x64 >= width {
        return Err(ExecutionResult::failure(format!(
            "Coordinate error for {}: X coordinate {} is out of bounds. Valid range is [0, {}). \
             Please provide coordinates within the screen area.",
            name,
            x,
            display_extent(width)
        )));
    }
    if y64 < 0 || y64 >= height {
        return Err(ExecutionResult::failure(format!(
            "Coordinate error for {}: Y coordinate {} is out of bounds. Valid range is [0, {}). \
             Please provide coordinates within the screen area.",
            name,
            y,
            display_extent(height)
        )));
    }
    Ok((x, y))
}

fn display_extent(extent: i64) -> String {
    if extent == i64::MAX {
        "unknown".to_string()
    } else {
        extent.to_string()
    }
}

/// Swipe endpoints that scroll content in `direction`.
fn scroll_gesture(
    direction: ScrollDirection,
    display: Option<(u32, u32)>,
) -> ((i32, i32), (i32, i32)) {
    let (w, h) = display.unwrap_or(FALLBACK_DISPLAY);
    let (w, h) = (w as i32, h as i32);
    let (cx, cy) = (w / 2, h / 2);
    let (near_y, far_y) = (h * 3 / 10, h * 7 / 10);
    let (near_x, far_x) = (w * 2 / 10, w * 8 / 10);

    match direction {
        // Finger moves opposite to the content being revealed.
        ScrollDirection::Down => ((cx, far_y), (cx, near_y)),
        ScrollDirection::Up => ((cx, near_y), (cx, far_y)),
        ScrollDirection::Right => ((far_x, cy), (near_x, cy)),
        ScrollDirection::Left => ((near_x, cy), (far_x, cy)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendError, KeyCode, Privilege, RawScreen};
    use crate::config::StaticAppResolver;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        name: &'static str,
        privilege: Option<Privilege>,
        calls: Mutex<Vec<String>>,
        fail: AtomicBool,
        offline: AtomicBool,
        text_only: bool,
    }

    impl Recorder {
        fn new(name: &'static str, privilege: Privilege) -> Arc<Self> {
            Arc::new(Self {
                name,
                privilege: Some(privilege),
                ..Self::default()
            })
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: String) -> Result<(), BackendError> {
            self.calls.lock().unwrap().push(call);
            if self.fail.load(Ordering::SeqCst) {
                Err(BackendError::CommandFailed("injected".to_string()))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl DeviceBackend for Recorder {
        fn name(&self) -> &str {
            self.name
        }
        fn privilege(&self) -> Privilege {
            self.privilege.unwrap_or(Privilege::Shell)
        }
        fn supports(&self, capability: Capability) -> bool {
            !self.text_only || capability == Capability::Text
        }
        async fn is_available(&self) -> bool {
            !self.offline.load(Ordering::SeqCst)
        }
        async fn read_screen(&self) -> Result<RawScreen, BackendError> {
            Ok(RawScreen::default())
        }
        async fn tap(&self, x: i32, y: i32) -> Result<(), BackendError> {
            self.record(format!("tap {} {}", x, y))
        }
        async fn swipe(
            &self,
            x1: i32,
            y1: i32,
            x2: i32,
            y2: i32,
            duration_ms: u64,
        ) -> Result<(), BackendError> {
            self.record(format!("swipe {} {} {} {} {}", x1, y1, x2, y2, duration_ms))
        }
        async fn input_text(&self, payload: &TextPayload) -> Result<(), BackendError> {
            self.record(format!("text {:?} {}", payload.mode, payload.text))
        }
        async fn press_key(&self, key: KeyCode) -> Result<(), BackendError> {
            self.record(format!("key {}", key.as_str()))
        }
        async fn launch(&self, identifier: &str) -> Result<(), BackendError> {
            self.record(format!("launch {}", identifier))
        }
        async fn force_stop(&self, identifier: &str) -> Result<(), BackendError> {
            self.record(format!("stop {}", identifier))
        }
    }

    fn dispatcher(backends: Vec<Arc<Recorder>>) -> ActionDispatcher {
        let mut registry = BackendRegistry::new();
        for backend in backends {
            registry.register(backend);
        }
        ActionDispatcher::new(registry, Arc::new(StaticAppResolver::new()))
    }

    fn screen() -> ScreenState {
        let mut state = ScreenState::empty("com.example");
        state.display = Some((1080, 2400));
        state
    }

    #[tokio::test]
    async fn test_gesture_durations_are_capped() {
        let shell = Recorder::new("shell", Privilege::Shell);
        let d = dispatcher(vec![shell.clone()]);

        let press = d
            .execute(
                &AgentAction::LongPress {
                    x: 10,
                    y: 20,
                    duration_ms: 1_000_000_000_000,
                },
                &screen(),
            )
            .await;
        assert!(press.success);
        assert!(d
            .execute(
                &AgentAction::Swipe {
                    start_x: 10,
                    start_y: 2000,
                    end_x: 10,
                    end_y: 200,
                    duration_ms: u64::MAX,
                },
                &screen(),
            )
            .await
            .success);
        assert_eq!(
            shell.calls(),
            vec![
                format!("swipe 10 20 10 20 {}", MAX_GESTURE_MS),
                format!("swipe 10 2000 10 200 {}", MAX_GESTURE_MS),
            ]
        );
    }

    #[tokio::test]
    async fn test_least_privileged_backend_is_used() {
        let shell = Recorder::new("shell", Privilege::Shell);
        let accessibility = Recorder::new("a11y", Privilege::Accessibility);
        let d = dispatcher(vec![shell.clone(), accessibility.clone()]);

        let result = d
            .execute(&AgentAction::Tap { x: 10, y: 20 }, &screen())
            .await;
        assert!(result.success);
        assert_eq!(accessibility.calls(), vec!["tap 10 20"]);
        assert!(shell.calls().is_empty());
    }

    #[tokio::test]
    async fn test_failure_is_not_retried_elsewhere() {
        let shell = Recorder::new("shell", Privilege::Shell);
        let accessibility = Recorder::new("a11y", Privilege::Accessibility);
        accessibility.fail.store(true, Ordering::SeqCst);
        let d = dispatcher(vec![shell.clone(), accessibility.clone()]);

        let result = d
            .execute(&AgentAction::Tap { x: 10, y: 20 }, &screen())
            .await;
        assert!(!result.success);
        assert!(result.error_message.unwrap().contains("injected"));
        assert_eq!(accessibility.calls().len(), 1);
        assert!(shell.calls().is_empty());
    }

    #[tokio::test]
    async fn test_unavailable_backend_is_skipped() {
        let shell = Recorder::new("shell", Privilege::Shell);
        let accessibility = Recorder::new("a11y", Privilege::Accessibility);
        accessibility.offline.store(true, Ordering::SeqCst);
        let d = dispatcher(vec![shell.clone(), accessibility.clone()]);

        assert!(
            d.execute(
                &AgentAction::PressKey {
                    key: KeyCode::Back
                },
                &screen()
            )
            .await
            .success
        );
        assert_eq!(shell.calls(), vec!["key back"]);
    }

    #[tokio::test]
    async fn test_no_backend_is_a_failed_result() {
        let d = dispatcher(vec![]);
        let result = d.execute(&AgentAction::ClearText, &screen()).await;
        assert!(!result.success);
        assert!(result.message.contains("No available backend"));
    }

    #[tokio::test]
    async fn test_out_of_bounds_coordinates_rejected() {
        let shell = Recorder::new("shell", Privilege::Shell);
        let d = dispatcher(vec![shell.clone()]);

        let result = d
            .execute(&AgentAction::Tap { x: 1080, y: 10 }, &screen())
            .await;
        assert!(!result.success);
        assert!(result.message.contains("X coordinate 1080 is out of bounds"));

        let result = d
            .execute(
                &AgentAction::Swipe {
                    start_x: 10,
                    start_y: 10,
                    end_x: 10,
                    end_y: -1,
                    duration_ms: 300,
                },
                &screen(),
            )
            .await;
        assert!(!result.success);
        assert!(shell.calls().is_empty());
    }

    #[tokio::test]
    async fn test_gesture_primitives() {
        let shell = Recorder::new("shell", Privilege::Shell);
        let d = dispatcher(vec![shell.clone()]);
        let screen = screen();

        d.execute(
            &AgentAction::LongPress {
                x: 5,
                y: 6,
                duration_ms: 900,
            },
            &screen,
        )
        .await;
        d.execute(&AgentAction::DoubleTap { x: 7, y: 8 }, &screen)
            .await;
        d.execute(
            &AgentAction::Scroll {
                direction: ScrollDirection::Down,
            },
            &screen,
        )
        .await;

        assert_eq!(
            shell.calls(),
            vec![
                "swipe 5 6 5 6 900",
                "tap 7 8",
                "tap 7 8",
                "swipe 540 1680 540 720 400",
            ]
        );
    }

    #[tokio::test]
    async fn test_text_uses_structured_payload() {
        let shell = Recorder::new("shell", Privilege::Shell);
        let d = dispatcher(vec![shell.clone()]);

        d.execute(
            &AgentAction::InputText {
                text: "it's \"quoted\"".to_string(),
            },
            &screen(),
        )
        .await;
        assert_eq!(shell.calls(), vec!["text Replace it's \"quoted\""]);
    }

    #[tokio::test]
    async fn test_app_lifecycle_resolves_names() {
        let shell = Recorder::new("shell", Privilege::Shell);
        let d = dispatcher(vec![shell.clone()]);

        assert!(
            d.execute(
                &AgentAction::OpenApp {
                    app_name: "Settings".to_string()
                },
                &screen()
            )
            .await
            .success
        );
        let missing = d
            .execute(
                &AgentAction::CloseApp {
                    app_name: "Nonexistent App".to_string(),
                },
                &screen(),
            )
            .await;
        assert!(!missing.success);
        assert_eq!(shell.calls(), vec!["launch com.android.settings"]);
    }

    #[tokio::test]
    async fn test_capability_routing() {
        let typist = Arc::new(Recorder {
            name: "ime",
            privilege: Some(Privilege::Accessibility),
            text_only: true,
            ..Recorder::default()
        });
        let shell = Recorder::new("shell", Privilege::Shell);
        let d = dispatcher(vec![typist.clone(), shell.clone()]);

        d.execute(
            &AgentAction::InputText {
                text: "hi".to_string(),
            },
            &screen(),
        )
        .await;
        d.execute(&AgentAction::Tap { x: 1, y: 1 }, &screen())
            .await;
        assert_eq!(typist.calls(), vec!["text Replace hi"]);
        assert_eq!(shell.calls(), vec!["tap 1 1"]);
    }

    #[tokio::test]
    async fn test_terminal_actions_are_not_dispatched() {
        let shell = Recorder::new("shell", Privilege::Shell);
        let d = dispatcher(vec![shell.clone()]);
        let result = d
            .execute(
                &AgentAction::Finished {
                    message: "done".to_string(),
                },
                &screen(),
            )
            .await;
        assert!(!result.success);
        assert!(shell.calls().is_empty());
    }

    #[tokio::test]
    async fn test_wait_is_capped_and_needs_no_backend() {
        let d = dispatcher(vec![]);
        let result = d
            .execute(&AgentAction::Wait { duration_ms: 5 }, &screen())
            .await;
        assert!(result.success);
        assert_eq!(result.message, "Waited 5ms");
    }
}
