//! Agent actions: the tool catalog, tool-call decoding, and dispatch to backends.

mod action;
mod catalog;
mod dispatcher;

pub use action::{
    decode_tool_call, ActionKind, AgentAction, DecodeError, ScrollDirection,
    DEFAULT_LONG_PRESS_MS, DEFAULT_SWIPE_MS, DEFAULT_WAIT_MS,
};
pub use catalog::{ParamSpec, ParamType, Tool, ToolCatalog};
pub use dispatcher::{ActionDispatcher, ExecutionResult, MAX_GESTURE_MS, MAX_WAIT_MS};
