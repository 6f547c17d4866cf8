//! Decided actions and their conversion to and from tool calls.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;

use super::catalog::{ParamType, Tool, ToolCatalog};
use crate::backend::KeyCode;
use crate::perception::ScreenState;

/// Default long-press hold time.
pub const DEFAULT_LONG_PRESS_MS: u64 = 800;

/// Default swipe duration.
pub const DEFAULT_SWIPE_MS: u64 = 300;

/// Default wait when the model omits a duration.
pub const DEFAULT_WAIT_MS: u64 = 1000;

/// Errors decoding a tool call into an [`AgentAction`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
    #[error("Malformed arguments for {tool}: {message}")]
    MalformedArguments { tool: String, message: String },
    #[error("Missing required parameter '{param}' for {tool}")]
    MissingParameter { tool: String, param: String },
    #[error("Parameter '{param}' for {tool} must be {expected}")]
    WrongType {
        tool: String,
        param: String,
        expected: &'static str,
    },
    #[error("Parameter '{param}' for {tool} must be one of [{allowed}], got '{value}'")]
    InvalidEnum {
        tool: String,
        param: String,
        value: String,
        allowed: String,
    },
    #[error("Element {0} does not exist on the current screen")]
    UnknownElement(usize),
}

/// Scroll direction, named by where the content moves into view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrollDirection {
    Up,
    Down,
    Left,
    Right,
}

impl ScrollDirection {
    pub const ALL: [ScrollDirection; 4] = [
        ScrollDirection::Up,
        ScrollDirection::Down,
        ScrollDirection::Left,
        ScrollDirection::Right,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ScrollDirection::Up => "up",
            ScrollDirection::Down => "down",
            ScrollDirection::Left => "left",
            ScrollDirection::Right => "right",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|d| d.as_str().eq_ignore_ascii_case(name.trim()))
    }
}

/// One decided action. Each variant carries only its own fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AgentAction {
    Tap {
        x: i32,
        y: i32,
    },
    LongPress {
        x: i32,
        y: i32,
        duration_ms: u64,
    },
    DoubleTap {
        x: i32,
        y: i32,
    },
    Swipe {
        start_x: i32,
        start_y: i32,
        end_x: i32,
        end_y: i32,
        duration_ms: u64,
    },
    Scroll {
        direction: ScrollDirection,
    },
    InputText {
        text: String,
    },
    ClearText,
    PressKey {
        key: KeyCode,
    },
    OpenApp {
        app_name: String,
    },
    CloseApp {
        app_name: String,
    },
    DescribeScreen {
        focus: Option<String>,
    },
    Wait {
        duration_ms: u64,
    },
    Finished {
        message: String,
    },
    Failed {
        reason: String,
    },
    AskUser {
        question: String,
        suggestions: Vec<String>,
    },
}

/// Discriminant of [`AgentAction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Tap,
    LongPress,
    DoubleTap,
    Swipe,
    Scroll,
    InputText,
    ClearText,
    PressKey,
    OpenApp,
    CloseApp,
    DescribeScreen,
    Wait,
    Finished,
    Failed,
    AskUser,
}

impl ActionKind {
    /// Tool name for this kind.
    pub fn tool_name(&self) -> &'static str {
        match self {
            ActionKind::Tap => "tap",
            ActionKind::LongPress => "long_press",
            ActionKind::DoubleTap => "double_tap",
            ActionKind::Swipe => "swipe",
            ActionKind::Scroll => "scroll",
            ActionKind::InputText => "input_text",
            ActionKind::ClearText => "clear_text",
            ActionKind::PressKey => "press_key",
            ActionKind::OpenApp => "open_app",
            ActionKind::CloseApp => "close_app",
            ActionKind::DescribeScreen => "describe_screen",
            ActionKind::Wait => "wait",
            ActionKind::Finished => "finished",
            ActionKind::Failed => "failed",
            ActionKind::AskUser => "ask_user",
        }
    }

    /// Kinds the orchestrator intercepts instead of dispatching.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ActionKind::Finished | ActionKind::Failed | ActionKind::AskUser
        )
    }
}

impl AgentAction {
    pub fn kind(&self) -> ActionKind {
        match self {
            AgentAction::Tap { .. } => ActionKind::Tap,
            AgentAction::LongPress { .. } => ActionKind::LongPress,
            AgentAction::DoubleTap { .. } => ActionKind::DoubleTap,
            AgentAction::Swipe { .. } => ActionKind::Swipe,
            AgentAction::Scroll { .. } => ActionKind::Scroll,
            AgentAction::InputText { .. } => ActionKind::InputText,
            AgentAction::ClearText => ActionKind::ClearText,
            AgentAction::PressKey { .. } => ActionKind::PressKey,
            AgentAction::OpenApp { .. } => ActionKind::OpenApp,
            AgentAction::CloseApp { .. } => ActionKind::CloseApp,
            AgentAction::DescribeScreen { .. } => ActionKind::DescribeScreen,
            AgentAction::Wait { .. } => ActionKind::Wait,
            AgentAction::Finished { .. } => ActionKind::Finished,
            AgentAction::Failed { .. } => ActionKind::Failed,
            AgentAction::AskUser { .. } => ActionKind::AskUser,
        }
    }

    pub fn tool_name(&self) -> &'static str {
        self.kind().tool_name()
    }

    /// Encode as a tool call: `(name, arguments)`.
    pub fn to_tool_call(&self) -> (&'static str, Value) {
        let args = match self {
            AgentAction::Tap { x, y } | AgentAction::DoubleTap { x, y } => json!({"x": x, "y": y}),
            AgentAction::LongPress { x, y, duration_ms } => {
                json!({"x": x, "y": y, "duration_ms": duration_ms})
            }
            AgentAction::Swipe {
                start_x,
                start_y,
                end_x,
                end_y,
                duration_ms,
            } => json!({
                "start_x": start_x,
                "start_y": start_y,
                "end_x": end_x,
                "end_y": end_y,
                "duration_ms": duration_ms,
            }),
            AgentAction::Scroll { direction } => json!({"direction": direction.as_str()}),
            AgentAction::InputText { text } => json!({"text": text}),
            AgentAction::ClearText => json!({}),
            AgentAction::PressKey { key } => json!({"key": key.as_str()}),
            AgentAction::OpenApp { app_name } | AgentAction::CloseApp { app_name } => {
                json!({"app_name": app_name})
            }
            AgentAction::DescribeScreen { focus } => match focus {
                Some(focus) => json!({"focus": focus}),
                None => json!({}),
            },
            AgentAction::Wait { duration_ms } => json!({"duration_ms": duration_ms}),
            AgentAction::Finished { message } => json!({"message": message}),
            AgentAction::Failed { reason } => json!({"reason": reason}),
            AgentAction::AskUser {
                question,
                suggestions,
            } => json!({"question": question, "suggestions": suggestions}),
        };
        (self.tool_name(), args)
    }

    /// Short human-readable rendering for history and logs.
    pub fn describe(&self) -> String {
        match self {
            AgentAction::Tap { x, y } => format!("tap ({}, {})", x, y),
            AgentAction::LongPress { x, y, duration_ms } => {
                format!("long_press ({}, {}) for {}ms", x, y, duration_ms)
            }
            AgentAction::DoubleTap { x, y } => format!("double_tap ({}, {})", x, y),
            AgentAction::Swipe {
                start_x,
                start_y,
                end_x,
                end_y,
                ..
            } => format!("swipe ({}, {}) -> ({}, {})", start_x, start_y, end_x, end_y),
            AgentAction::Scroll { direction } => format!("scroll {}", direction.as_str()),
            AgentAction::InputText { text } => format!("input_text {:?}", text),
            AgentAction::ClearText => "clear_text".to_string(),
            AgentAction::PressKey { key } => format!("press_key {}", key.as_str()),
            AgentAction::OpenApp { app_name } => format!("open_app {}", app_name),
            AgentAction::CloseApp { app_name } => format!("close_app {}", app_name),
            AgentAction::DescribeScreen { focus: Some(f) } => format!("describe_screen ({})", f),
            AgentAction::DescribeScreen { focus: None } => "describe_screen".to_string(),
            AgentAction::Wait { duration_ms } => format!("wait {}ms", duration_ms),
            AgentAction::Finished { message } => format!("finished: {}", message),
            AgentAction::Failed { reason } => format!("failed: {}", reason),
            AgentAction::AskUser { question, .. } => format!("ask_user: {}", question),
        }
    }
}

/// Decode a tool call against `catalog`.
///
/// `arguments` is the raw JSON text sent by the provider. Every required
/// parameter must be present with the declared type; `element_id` may stand in
/// for `x`/`y` on pointer tools and is resolved against `screen`.
pub fn decode_tool_call(
    catalog: &ToolCatalog,
    name: &str,
    arguments: &str,
    screen: &ScreenState,
) -> Result<AgentAction, DecodeError> {
    let tool = catalog
        .lookup(name)
        .ok_or_else(|| DecodeError::UnknownTool(name.to_string()))?;

    let trimmed = arguments.trim();
    let value: Value = if trimmed.is_empty() {
        Value::Object(Map::new())
    } else {
        serde_json::from_str(trimmed).map_err(|e| DecodeError::MalformedArguments {
            tool: tool.name.to_string(),
            message: e.to_string(),
        })?
    };
    let args = match value {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            return Err(DecodeError::MalformedArguments {
                tool: tool.name.to_string(),
                message: format!("expected a JSON object, got {}", other),
            })
        }
    };

    Args { tool, args: &args }.decode(screen)
}

struct Args<'a> {
    tool: &'a Tool,
    args: &'a Map<String, Value>,
}

impl Args<'_> {
    fn decode(&self, screen: &ScreenState) -> Result<AgentAction, DecodeError> {
        self.check_declared_types()?;

        let action = match self.tool.name {
            "tap" => {
                let (x, y) = self.point(screen)?;
                AgentAction::Tap { x, y }
            }
            "long_press" => {
                let (x, y) = self.point(screen)?;
                AgentAction::LongPress {
                    x,
                    y,
                    duration_ms: self.opt_u64("duration_ms")?.unwrap_or(DEFAULT_LONG_PRESS_MS),
                }
            }
            "double_tap" => {
                let (x, y) = self.point(screen)?;
                AgentAction::DoubleTap { x, y }
            }
            "swipe" => AgentAction::Swipe {
                start_x: self.req_i32("start_x")?,
                start_y: self.req_i32("start_y")?,
                end_x: self.req_i32("end_x")?,
                end_y: self.req_i32("end_y")?,
                duration_ms: self.opt_u64("duration_ms")?.unwrap_or(DEFAULT_SWIPE_MS),
            },
            "scroll" => {
                let raw = self.req_str("direction")?;
                AgentAction::Scroll {
                    direction: ScrollDirection::parse(&raw)
                        .ok_or_else(|| self.invalid_enum("direction", &raw))?,
                }
            }
            "input_text" => AgentAction::InputText {
                text: self.req_str("text")?,
            },
            "clear_text" => AgentAction::ClearText,
            "press_key" => {
                let raw = self.req_str("key")?;
                AgentAction::PressKey {
                    key: KeyCode::parse(&raw).ok_or_else(|| self.invalid_enum("key", &raw))?,
                }
            }
            "open_app" => AgentAction::OpenApp {
                app_name: self.req_str("app_name")?,
            },
            "close_app" => AgentAction::CloseApp {
                app_name: self.req_str("app_name")?,
            },
            "describe_screen" => AgentAction::DescribeScreen {
                focus: self.opt_str("focus")?.filter(|f| !f.trim().is_empty()),
            },
            "wait" => AgentAction::Wait {
                duration_ms: self.opt_u64("duration_ms")?.unwrap_or(DEFAULT_WAIT_MS),
            },
            "finished" => AgentAction::Finished {
                message: self.req_str("message")?,
            },
            "failed" => AgentAction::Failed {
                reason: self.req_str("reason")?,
            },
            "ask_user" => AgentAction::AskUser {
                question: self.req_str("question")?,
                suggestions: self.opt_str_list("suggestions")?.unwrap_or_default(),
            },
            other => return Err(DecodeError::UnknownTool(other.to_string())),
        };
        Ok(action)
    }

    /// Reject present parameters whose JSON type disagrees with the schema.
    fn check_declared_types(&self) -> Result<(), DecodeError> {
        for param in &self.tool.params {
            let Some(value) = self.args.get(param.name) else {
                continue;
            };
            if value.is_null() {
                continue;
            }
            let ok = match param.kind {
                ParamType::Integer => as_integer(value).is_some(),
                ParamType::String => value.is_string(),
                ParamType::Boolean => value.is_boolean(),
                ParamType::StringArray => value
                    .as_array()
                    .map(|items| items.iter().all(Value::is_string))
                    .unwrap_or(false),
            };
            if !ok {
                return Err(self.wrong_type(param.name, param.kind.expected()));
            }
            if let (Some(allowed), Some(raw)) = (&param.enum_values, value.as_str()) {
                if !allowed.iter().any(|a| a.eq_ignore_ascii_case(raw.trim())) {
                    return Err(self.invalid_enum(param.name, raw));
                }
            }
        }
        Ok(())
    }

    /// `x`/`y`, or the center of `element_id`.
    fn point(&self, screen: &ScreenState) -> Result<(i32, i32), DecodeError> {
        if let Some(id) = self.opt_u64("element_id")? {
            let id = id as usize;
            let element = screen.element(id).ok_or(DecodeError::UnknownElement(id))?;
            return Ok(element.center());
        }
        Ok((self.req_i32("x")?, self.req_i32("y")?))
    }

    fn get(&self, name: &str) -> Option<&Value> {
        self.args.get(name).filter(|v| !v.is_null())
    }

    fn missing(&self, name: &str) -> DecodeError {
        DecodeError::MissingParameter {
            tool: self.tool.name.to_string(),
            param: name.to_string(),
        }
    }

    fn wrong_type(&self, name: &str, expected: &'static str) -> DecodeError {
        DecodeError::WrongType {
            tool: self.tool.name.to_string(),
            param: name.to_string(),
            expected,
        }
    }

    fn invalid_enum(&self, name: &str, value: &str) -> DecodeError {
        let allowed = self
            .tool
            .param_spec(name)
            .and_then(|p| p.enum_values.as_ref())
            .map(|values| values.join(", "))
            .unwrap_or_default();
        DecodeError::InvalidEnum {
            tool: self.tool.name.to_string(),
            param: name.to_string(),
            value: value.to_string(),
            allowed,
        }
    }

    fn req_i32(&self, name: &str) -> Result<i32, DecodeError> {
        let value = self.get(name).ok_or_else(|| self.missing(name))?;
        as_integer(value)
            .and_then(|n| i32::try_from(n).ok())
            .ok_or_else(|| self.wrong_type(name, "an integer"))
    }

    fn opt_u64(&self, name: &str) -> Result<Option<u64>, DecodeError> {
        match self.get(name) {
            None => Ok(None),
            Some(value) => as_integer(value)
                .and_then(|n| u64::try_from(n).ok())
                .map(Some)
                .ok_or_else(|| self.wrong_type(name, "a non-negative integer")),
        }
    }

    fn req_str(&self, name: &str) -> Result<String, DecodeError> {
        self.opt_str(name)?.ok_or_else(|| self.missing(name))
    }

    fn opt_str(&self, name: &str) -> Result<Option<String>, DecodeError> {
        match self.get(name) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(_) => Err(self.wrong_type(name, "a string")),
        }
    }

    fn opt_str_list(&self, name: &str) -> Result<Option<Vec<String>>, DecodeError> {
        match self.get(name) {
            None => Ok(None),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| self.wrong_type(name, "an array of strings"))
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Some),
            Some(_) => Err(self.wrong_type(name, "an array of strings")),
        }
    }
}

/// Integers, or floats with no fractional part.
fn as_integer(value: &Value) -> Option<i64> {
    if let Some(n) = value.as_i64() {
        return Some(n);
    }
    value
        .as_f64()
        .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
        .map(|f| f as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::perception::{Bounds, UiElement};

    fn catalog() -> ToolCatalog {
        ToolCatalog::with_describe()
    }

    fn screen() -> ScreenState {
        let mut state = ScreenState::empty("com.example");
        state.elements.push(UiElement {
            id: 0,
            kind: "Button".to_string(),
            text: "OK".to_string(),
            description: String::new(),
            resource_id: None,
            bounds: Bounds::new(100, 200, 300, 400),
            clickable: true,
            editable: false,
            scrollable: false,
        });
        state
    }

    fn decode(name: &str, args: &str) -> Result<AgentAction, DecodeError> {
        decode_tool_call(&catalog(), name, args, &screen())
    }

    #[test]
    fn test_tap_missing_y_is_rejected() {
        let err = decode("tap", r#"{"x":100}"#).unwrap_err();
        assert_eq!(
            err,
            DecodeError::MissingParameter {
                tool: "tap".to_string(),
                param: "y".to_string()
            }
        );
    }

    #[test]
    fn test_malformed_json_is_rejected() {
        assert!(matches!(
            decode("tap", r#"{"x":100,"#),
            Err(DecodeError::MalformedArguments { .. })
        ));
        assert!(matches!(
            decode("tap", "[1,2]"),
            Err(DecodeError::MalformedArguments { .. })
        ));
    }

    #[test]
    fn test_unknown_tool_is_rejected() {
        assert_eq!(
            decode("teleport", "{}").unwrap_err(),
            DecodeError::UnknownTool("teleport".to_string())
        );
    }

    #[test]
    fn test_wrong_types_are_rejected() {
        assert!(matches!(
            decode("tap", r#"{"x":"100","y":5}"#),
            Err(DecodeError::WrongType { .. })
        ));
        assert!(matches!(
            decode("tap", r#"{"x":10.5,"y":5}"#),
            Err(DecodeError::WrongType { .. })
        ));
        assert!(matches!(
            decode("wait", r#"{"duration_ms":-5}"#),
            Err(DecodeError::WrongType { .. })
        ));
    }

    #[test]
    fn test_invalid_enum_is_rejected() {
        assert!(matches!(
            decode("press_key", r#"{"key":"escape"}"#),
            Err(DecodeError::InvalidEnum { .. })
        ));
        assert!(matches!(
            decode("scroll", r#"{"direction":"sideways"}"#),
            Err(DecodeError::InvalidEnum { .. })
        ));
    }

    #[test]
    fn test_integral_floats_accepted() {
        assert_eq!(
            decode("tap", r#"{"x":100.0,"y":200}"#).unwrap(),
            AgentAction::Tap { x: 100, y: 200 }
        );
    }

    #[test]
    fn test_element_id_resolves_to_center() {
        assert_eq!(
            decode("tap", r#"{"element_id":0}"#).unwrap(),
            AgentAction::Tap { x: 200, y: 300 }
        );
        assert_eq!(
            decode("long_press", r#"{"element_id":7}"#).unwrap_err(),
            DecodeError::UnknownElement(7)
        );
    }

    #[test]
    fn test_defaults_applied() {
        assert_eq!(
            decode("long_press", r#"{"x":1,"y":2}"#).unwrap(),
            AgentAction::LongPress {
                x: 1,
                y: 2,
                duration_ms: DEFAULT_LONG_PRESS_MS
            }
        );
        assert_eq!(
            decode("wait", "").unwrap(),
            AgentAction::Wait {
                duration_ms: DEFAULT_WAIT_MS
            }
        );
        assert_eq!(
            decode("ask_user", r#"{"question":"Which one?"}"#).unwrap(),
            AgentAction::AskUser {
                question: "Which one?".to_string(),
                suggestions: vec![]
            }
        );
    }

    #[test]
    fn test_round_trip_is_lossless() {
        let actions = vec![
            AgentAction::Tap { x: 10, y: 20 },
            AgentAction::LongPress {
                x: 1,
                y: 2,
                duration_ms: 1500,
            },
            AgentAction::DoubleTap { x: 3, y: 4 },
            AgentAction::Swipe {
                start_x: 500,
                start_y: 1500,
                end_x: 500,
                end_y: 300,
                duration_ms: 250,
            },
            AgentAction::Scroll {
                direction: ScrollDirection::Left,
            },
            AgentAction::InputText {
                text: "héllo \"world\" $(rm -rf)".to_string(),
            },
            AgentAction::ClearText,
            AgentAction::PressKey {
                key: KeyCode::RecentApps,
            },
            AgentAction::OpenApp {
                app_name: "Settings".to_string(),
            },
            AgentAction::CloseApp {
                app_name: "Chrome".to_string(),
            },
            AgentAction::DescribeScreen {
                focus: Some("the dialog".to_string()),
            },
            AgentAction::DescribeScreen { focus: None },
            AgentAction::Wait { duration_ms: 2000 },
            AgentAction::Finished {
                message: "done".to_string(),
            },
            AgentAction::Failed {
                reason: "blocked".to_string(),
            },
            AgentAction::AskUser {
                question: "Which account?".to_string(),
                suggestions: vec!["work".to_string(), "personal".to_string()],
            },
        ];

        for action in actions {
            let (name, args) = action.to_tool_call();
            let decoded = decode(name, &args.to_string()).unwrap();
            assert_eq!(decoded, action, "round trip failed for {}", name);
        }
    }

    #[test]
    fn test_terminal_kinds() {
        assert!(ActionKind::Finished.is_terminal());
        assert!(ActionKind::AskUser.is_terminal());
        assert!(!ActionKind::DescribeScreen.is_terminal());
        assert_eq!(ActionKind::LongPress.tool_name(), "long_press");
    }
}
