//! Normalizer for uiautomator-style XML hierarchy dumps.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use super::types::{Bounds, UiElement};

static NODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<node\b([^>]*?)/?>").expect("node regex is valid"));

static ATTR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"([\w:-]+)="([^"]*)""#).expect("attribute regex is valid"));

static BOUNDS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[(-?\d+),(-?\d+)\]\[(-?\d+),(-?\d+)\]").expect("bounds regex is valid")
});

/// UI tree parse errors.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum UiTreeError {
    #[error("Not a UI hierarchy dump")]
    NotAHierarchy,
}

/// Result of normalizing a hierarchy dump.
#[derive(Debug, Clone, Default)]
pub struct ParsedTree {
    pub elements: Vec<UiElement>,
    /// Extent of the root node, used as display size when no screenshot exists.
    pub display: Option<(u32, u32)>,
    /// Package of the first node that declares one.
    pub package: Option<String>,
}

/// Parse a hierarchy dump into ordered [`UiElement`]s.
///
/// Only nodes that carry text, a description, or an affordance (click, edit,
/// scroll) and have a non-empty area are kept. Ids are assigned in document
/// order starting from zero.
pub fn parse_ui_tree(xml: &str) -> Result<ParsedTree, UiTreeError> {
    if !xml.contains("<hierarchy") && !xml.contains("<node") {
        return Err(UiTreeError::NotAHierarchy);
    }

    let mut parsed = ParsedTree::default();

    for node in NODE_RE.captures_iter(xml) {
        let attrs: HashMap<&str, String> = ATTR_RE
            .captures_iter(&node[1])
            .filter_map(|c| {
                let key = c.get(1)?.as_str();
                let value = c.get(2)?.as_str();
                Some((key, unescape(value)))
            })
            .collect();

        let Some(bounds) = attrs.get("bounds").and_then(|b| parse_bounds(b)) else {
            continue;
        };

        if parsed.display.is_none() && !bounds.is_empty() {
            parsed.display = Some((bounds.right.max(0) as u32, bounds.bottom.max(0) as u32));
        }
        if parsed.package.is_none() {
            parsed.package = attrs.get("package").filter(|p| !p.is_empty()).cloned();
        }

        let flag = |name: &str| attrs.get(name).map(|v| v == "true").unwrap_or(false);
        let class = attrs.get("class").map(String::as_str).unwrap_or("");
        let kind = class.rsplit('.').next().unwrap_or(class).to_string();
        let text = attrs.get("text").cloned().unwrap_or_default();
        let description = attrs.get("content-desc").cloned().unwrap_or_default();
        let clickable = flag("clickable") || flag("long-clickable");
        let editable = kind.contains("EditText") || kind.contains("AutoCompleteTextView");
        let scrollable = flag("scrollable");

        let meaningful = !text.trim().is_empty()
            || !description.trim().is_empty()
            || clickable
            || editable
            || scrollable;
        if !meaningful || bounds.is_empty() {
            continue;
        }

        let resource_id = attrs.get("resource-id").filter(|r| !r.is_empty()).cloned();
        parsed.elements.push(UiElement {
            id: parsed.elements.len(),
            kind,
            text,
            description,
            resource_id,
            bounds,
            clickable,
            editable,
            scrollable,
        });
    }

    Ok(parsed)
}

fn parse_bounds(value: &str) -> Option<Bounds> {
    let caps = BOUNDS_RE.captures(value)?;
    let n = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<i32>().ok());
    Some(Bounds::new(n(1)?, n(2)?, n(3)?, n(4)?))
}

fn unescape(value: &str) -> String {
    if !value.contains('&') {
        return value.to_string();
    }
    value
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&#10;", "\n")
        .replace("&#13;", "\r")
        .replace("&amp;", "&")
}
