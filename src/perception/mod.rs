//! Perception: normalizing raw backend screen data into a [`ScreenState`].

mod adapter;
mod types;
mod ui_tree;

pub use adapter::{PerceptionAdapter, PerceptionError};
pub use types::{Bounds, ScreenState, Screenshot, UiElement};
pub use ui_tree::{parse_ui_tree, ParsedTree, UiTreeError};
