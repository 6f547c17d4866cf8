//! Rendering of screen state and history into the user prompt.

use std::fmt::Write;

use crate::agent::Step;
use crate::perception::{ScreenState, UiElement};

/// Bounds applied when rendering a decision prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOptions {
    /// Elements rendered before the list is truncated with a marker.
    pub max_elements: usize,
    /// Most recent steps rendered; older ones are summarized by count.
    pub history_window: usize,
    /// Attach the screenshot to decision requests.
    pub attach_screenshot: bool,
    /// Prompt language, "cn" or "en".
    pub lang: String,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            max_elements: 80,
            history_window: 8,
            attach_screenshot: false,
            lang: "cn".to_string(),
        }
    }
}

/// Render one element as a single line.
pub fn render_element(element: &UiElement) -> String {
    let b = &element.bounds;
    let mut line = format!(
        "[{}] {} [{},{}][{},{}]",
        element.id, element.kind, b.left, b.top, b.right, b.bottom
    );
    if !element.text.is_empty() {
        let _ = write!(line, " text={:?}", element.text);
    }
    if !element.description.is_empty() && element.description != element.text {
        let _ = write!(line, " desc={:?}", element.description);
    }
    if let Some(rid) = element.resource_id.as_deref().and_then(|r| r.rsplit('/').next()) {
        let _ = write!(line, " id={}", rid);
    }
    let flags: Vec<&str> = [
        (element.clickable, "clickable"),
        (element.editable, "editable"),
        (element.scrollable, "scrollable"),
    ]
    .iter()
    .filter(|(on, _)| *on)
    .map(|(_, name)| *name)
    .collect();
    if !flags.is_empty() {
        let _ = write!(line, " ({})", flags.join(", "));
    }
    line
}

/// Render the element list. Lists longer than `max` end with a marker naming
/// how many elements were omitted.
pub fn render_elements(elements: &[UiElement], max: usize) -> String {
    if elements.is_empty() {
        return "(no elements; rely on the screenshot or describe_screen)".to_string();
    }
    let mut out = elements
        .iter()
        .take(max)
        .map(render_element)
        .collect::<Vec<_>>()
        .join("\n");
    if elements.len() > max {
        let _ = write!(out, "\n... ({} more elements omitted)", elements.len() - max);
    }
    out
}

/// Render the most recent `window` steps.
pub fn render_history(history: &[Step], window: usize) -> String {
    if history.is_empty() {
        return "(none)".to_string();
    }
    let start = history.len().saturating_sub(window);
    let mut out = String::new();
    if start > 0 {
        let _ = writeln!(out, "({} earlier steps omitted)", start);
    }
    for step in &history[start..] {
        let status = if step.success { "ok" } else { "FAILED" };
        let _ = write!(
            out,
            "{}. {} -> {}",
            step.number,
            step.action.describe(),
            status
        );
        if let Some(error) = &step.error_message {
            let _ = write!(out, ": {}", error);
        }
        if let Some(observation) = &step.observation {
            let _ = write!(out, "\n   observation: {}", observation);
        }
        out.push('\n');
    }
    out.trim_end().to_string()
}

/// Full user prompt for one decision.
pub fn render_user_prompt(
    task: &str,
    screen: &ScreenState,
    history: &[Step],
    feedback: Option<&str>,
    options: &RenderOptions,
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Task: {}", task);
    let _ = writeln!(out);
    let _ = writeln!(out, "Current screen: {}", screen.summary());
    if let Some((w, h)) = screen.display {
        let _ = writeln!(out, "Display: {}x{}", w, h);
    }
    let _ = writeln!(out, "Elements:");
    let _ = writeln!(out, "{}", render_elements(&screen.elements, options.max_elements));
    let _ = writeln!(out);
    let _ = writeln!(out, "Previous steps:");
    let _ = writeln!(out, "{}", render_history(history, options.history_window));
    if let Some(feedback) = feedback {
        let _ = writeln!(out);
        let _ = writeln!(out, "Note: {}", feedback);
    }
    out.trim_end().to_string()
}

/// User prompt for a round without device context.
pub fn render_chat_prompt(task: &str) -> String {
    format!("Task: {}", task.trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::AgentAction;
    use crate::perception::Bounds;
    use chrono::Utc;

    fn element(id: usize) -> UiElement {
        UiElement {
            id,
            kind: "Button".to_string(),
            text: format!("Item {}", id),
            description: String::new(),
            resource_id: Some("com.app:id/item".to_string()),
            bounds: Bounds::new(0, 0, 100, 50),
            clickable: true,
            editable: false,
            scrollable: false,
        }
    }

    fn step(number: u32, success: bool) -> Step {
        Step {
            number,
            screen_before: String::new(),
            action: AgentAction::Tap { x: 1, y: 2 },
            success,
            error_message: (!success).then(|| "boom".to_string()),
            observation: None,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_render_element() {
        assert_eq!(
            render_element(&element(3)),
            "[3] Button [0,0][100,50] text=\"Item 3\" id=item (clickable)"
        );
    }

    #[test]
    fn test_long_lists_are_truncated_with_marker() {
        let elements: Vec<UiElement> = (0..10).map(element).collect();
        let rendered = render_elements(&elements, 4);
        assert_eq!(rendered.lines().count(), 5);
        assert!(rendered.ends_with("... (6 more elements omitted)"));
    }

    #[test]
    fn test_empty_list_is_explicit() {
        assert!(render_elements(&[], 10).contains("no elements"));
    }

    #[test]
    fn test_history_window() {
        let history: Vec<Step> = (1..=5).map(|n| step(n, n != 5)).collect();
        let rendered = render_history(&history, 2);
        assert!(rendered.starts_with("(3 earlier steps omitted)"));
        assert!(rendered.contains("4. tap (1, 2) -> ok"));
        assert!(rendered.contains("5. tap (1, 2) -> FAILED: boom"));
        assert!(!rendered.contains("3. tap"));
    }

    #[test]
    fn test_user_prompt_includes_feedback() {
        let screen = ScreenState::empty("com.example");
        let prompt = render_user_prompt("do it", &screen, &[], Some("call a tool"), &RenderOptions::default());
        assert!(prompt.starts_with("Task: do it"));
        assert!(prompt.ends_with("Note: call a tool"));
    }

    #[test]
    fn test_chat_prompt_has_no_screen_context() {
        let prompt = render_chat_prompt("  tell me a joke ");
        assert_eq!(prompt, "Task: tell me a joke");
        assert!(!prompt.contains("describe_screen"));
    }
}
