//! Static catalog of tools offered to the decision model.

use serde_json::{json, Map, Value};

use super::action::ScrollDirection;
use crate::backend::KeyCode;

/// JSON type of a tool parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    Integer,
    String,
    Boolean,
    StringArray,
}

impl ParamType {
    fn schema(&self) -> Value {
        match self {
            ParamType::Integer => json!({"type": "integer"}),
            ParamType::String => json!({"type": "string"}),
            ParamType::Boolean => json!({"type": "boolean"}),
            ParamType::StringArray => json!({"type": "array", "items": {"type": "string"}}),
        }
    }

    /// Phrase used in type errors.
    pub fn expected(&self) -> &'static str {
        match self {
            ParamType::Integer => "an integer",
            ParamType::String => "a string",
            ParamType::Boolean => "a boolean",
            ParamType::StringArray => "an array of strings",
        }
    }
}

/// One parameter of a tool.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamType,
    pub description: &'static str,
    pub enum_values: Option<Vec<&'static str>>,
}

impl ParamSpec {
    fn new(name: &'static str, kind: ParamType, description: &'static str) -> Self {
        Self {
            name,
            kind,
            description,
            enum_values: None,
        }
    }

    fn one_of(mut self, values: Vec<&'static str>) -> Self {
        self.enum_values = Some(values);
        self
    }
}

/// A named, schema-described action the model may invoke.
#[derive(Debug, Clone, PartialEq)]
pub struct Tool {
    pub name: &'static str,
    pub description: &'static str,
    pub params: Vec<ParamSpec>,
    pub required: Vec<&'static str>,
}

impl Tool {
    fn new(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            description,
            params: Vec::new(),
            required: Vec::new(),
        }
    }

    fn param(mut self, spec: ParamSpec) -> Self {
        self.params.push(spec);
        self
    }

    fn required(mut self, spec: ParamSpec) -> Self {
        self.required.push(spec.name);
        self.params.push(spec);
        self
    }

    pub fn param_spec(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }

    /// JSON Schema object describing the parameters.
    pub fn parameters_schema(&self) -> Value {
        let mut properties = Map::new();
        for param in &self.params {
            let mut schema = param.kind.schema();
            if let Value::Object(ref mut map) = schema {
                map.insert("description".to_string(), json!(param.description));
                if let Some(values) = &param.enum_values {
                    map.insert("enum".to_string(), json!(values));
                }
            }
            properties.insert(param.name.to_string(), schema);
        }
        json!({
            "type": "object",
            "properties": properties,
            "required": self.required,
        })
    }

    /// OpenAI `tools[]` entry.
    pub fn to_openai(&self) -> Value {
        json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.parameters_schema(),
            }
        })
    }

    /// Anthropic `tools[]` entry.
    pub fn to_anthropic(&self) -> Value {
        json!({
            "name": self.name,
            "description": self.description,
            "input_schema": self.parameters_schema(),
        })
    }
}

fn x() -> ParamSpec {
    ParamSpec::new(
        "x",
        ParamType::Integer,
        "Horizontal pixel coordinate. Required with y unless element_id is given.",
    )
}

fn y() -> ParamSpec {
    ParamSpec::new(
        "y",
        ParamType::Integer,
        "Vertical pixel coordinate. Required with x unless element_id is given.",
    )
}

fn element_id() -> ParamSpec {
    ParamSpec::new(
        "element_id",
        ParamType::Integer,
        "Id of an element from the current element list; used instead of x/y.",
    )
}

fn duration(description: &'static str) -> ParamSpec {
    ParamSpec::new("duration_ms", ParamType::Integer, description)
}

fn device_tools() -> Vec<Tool> {
    vec![
        Tool::new("tap", "Tap a point on the screen, given as x/y or element_id.")
            .param(x())
            .param(y())
            .param(element_id()),
        Tool::new(
            "long_press",
            "Press and hold a point on the screen, given as x/y or element_id.",
        )
        .param(x())
        .param(y())
        .param(element_id())
        .param(duration("Hold time in milliseconds. Defaults to 800.")),
        Tool::new(
            "double_tap",
            "Tap a point twice in quick succession, given as x/y or element_id.",
        )
        .param(x())
        .param(y())
        .param(element_id()),
        Tool::new("swipe", "Drag from one point to another.")
            .required(ParamSpec::new("start_x", ParamType::Integer, "Start x."))
            .required(ParamSpec::new("start_y", ParamType::Integer, "Start y."))
            .required(ParamSpec::new("end_x", ParamType::Integer, "End x."))
            .required(ParamSpec::new("end_y", ParamType::Integer, "End y."))
            .param(duration("Gesture duration in milliseconds. Defaults to 300.")),
        Tool::new(
            "scroll",
            "Scroll the screen so that content further in the given direction comes into view.",
        )
        .required(
            ParamSpec::new("direction", ParamType::String, "Scroll direction.")
                .one_of(ScrollDirection::ALL.iter().map(|d| d.as_str()).collect()),
        ),
        Tool::new(
            "input_text",
            "Type text into the focused input field, replacing its current content.",
        )
        .required(ParamSpec::new("text", ParamType::String, "Text to type.")),
        Tool::new("clear_text", "Clear the focused input field."),
        Tool::new("press_key", "Press a hardware or navigation key.").required(
            ParamSpec::new("key", ParamType::String, "Key to press.")
                .one_of(KeyCode::ALL.iter().map(|k| k.as_str()).collect()),
        ),
        Tool::new("open_app", "Launch an application by its name.").required(ParamSpec::new(
            "app_name",
            ParamType::String,
            "Human-readable app name or package name.",
        )),
        Tool::new("close_app", "Force-stop an application by its name.").required(
            ParamSpec::new(
                "app_name",
                ParamType::String,
                "Human-readable app name or package name.",
            ),
        ),
        Tool::new("wait", "Wait for the screen to settle, e.g. while content loads.")
            .param(duration("Wait time in milliseconds. Defaults to 1000.")),
    ]
}

fn describe_tool() -> Tool {
    Tool::new(
        "describe_screen",
        "Ask for a detailed visual description of the current screenshot. Use when the \
         element list is empty or insufficient. Never call this twice in a row.",
    )
    .param(ParamSpec::new(
        "focus",
        ParamType::String,
        "Optional region or question to focus the description on.",
    ))
}

fn terminal_tools() -> Vec<Tool> {
    vec![
        Tool::new("finished", "The task is complete.").required(ParamSpec::new(
            "message",
            ParamType::String,
            "Result to report to the user.",
        )),
        Tool::new("failed", "The task cannot be completed.").required(ParamSpec::new(
            "reason",
            ParamType::String,
            "Why the task cannot proceed.",
        )),
        Tool::new(
            "ask_user",
            "Stop and ask the user a question needed to continue.",
        )
        .required(ParamSpec::new(
            "question",
            ParamType::String,
            "Question for the user.",
        ))
        .param(ParamSpec::new(
            "suggestions",
            ParamType::StringArray,
            "Optional suggested answers.",
        )),
    ]
}

/// Ordered, immutable tool set.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCatalog {
    tools: Vec<Tool>,
}

impl ToolCatalog {
    /// Element-list-only catalog.
    pub fn standard() -> Self {
        let mut tools = device_tools();
        tools.extend(terminal_tools());
        Self { tools }
    }

    /// Catalog that also offers the on-demand vision pass.
    pub fn with_describe() -> Self {
        let mut tools = device_tools();
        tools.push(describe_tool());
        tools.extend(terminal_tools());
        Self { tools }
    }

    pub fn new(describe: bool) -> Self {
        if describe {
            Self::with_describe()
        } else {
            Self::standard()
        }
    }

    /// Only the terminal tools, for rounds that must not touch the device.
    pub fn terminal_only() -> Self {
        Self {
            tools: terminal_tools(),
        }
    }

    pub fn lookup(&self, name: &str) -> Option<&Tool> {
        self.tools.iter().find(|t| t.name == name)
    }

    pub fn tools(&self) -> &[Tool] {
        &self.tools
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.tools.iter().map(|t| t.name).collect()
    }

    pub fn has_describe(&self) -> bool {
        self.lookup("describe_screen").is_some()
    }

    /// Copy of this catalog without the named tool.
    pub fn without(&self, name: &str) -> Self {
        Self {
            tools: self
                .tools
                .iter()
                .filter(|t| t.name != name)
                .cloned()
                .collect(),
        }
    }

    pub fn to_openai_tools(&self) -> Vec<Value> {
        self.tools.iter().map(Tool::to_openai).collect()
    }

    pub fn to_anthropic_tools(&self) -> Vec<Value> {
        self.tools.iter().map(Tool::to_anthropic).collect()
    }
}

impl Default for ToolCatalog {
    fn default() -> Self {
        Self::standard()
    }
}
