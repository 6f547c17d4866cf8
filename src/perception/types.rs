//! Canonical screen snapshot types.

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle in device pixels. Always `right >= left` and `bottom >= top`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounds {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Bounds {
    /// Build bounds, swapping inverted edges.
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left: left.min(right),
            top: top.min(bottom),
            right: left.max(right),
            bottom: top.max(bottom),
        }
    }

    /// Horizontal extent, saturating at `i32::MAX`.
    pub fn width(&self) -> i32 {
        extent(self.left, self.right)
    }

    pub fn height(&self) -> i32 {
        extent(self.top, self.bottom)
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    /// Midpoint of the rectangle.
    pub fn center(&self) -> (i32, i32) {
        (
            midpoint(self.left, self.right),
            midpoint(self.top, self.bottom),
        )
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.left && x < self.right && y >= self.top && y < self.bottom
    }
}

fn extent(low: i32, high: i32) -> i32 {
    i32::try_from(i64::from(high) - i64::from(low)).unwrap_or(i32::MAX)
}

fn midpoint(low: i32, high: i32) -> i32 {
    // The mean of two i32 values always fits.
    ((i64::from(low) + i64::from(high)) / 2) as i32
}

/// One interactive or textual region on screen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiElement {
    /// Ordinal within its snapshot, in traversal order.
    pub id: usize,
    /// Short widget class, e.g. `Button`.
    pub kind: String,
    pub text: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
    pub bounds: Bounds,
    pub clickable: bool,
    pub editable: bool,
    pub scrollable: bool,
}

impl UiElement {
    pub fn center(&self) -> (i32, i32) {
        self.bounds.center()
    }

    /// Best human-readable label: text, then description, then resource id.
    pub fn label(&self) -> &str {
        if !self.text.is_empty() {
            &self.text
        } else if !self.description.is_empty() {
            &self.description
        } else {
            self.resource_id
                .as_deref()
                .and_then(|r| r.rsplit('/').next())
                .unwrap_or("")
        }
    }
}

/// Encoded screenshot plus its pixel dimensions.
#[derive(Debug, Clone, PartialEq)]
pub struct Screenshot {
    pub bytes: Arc<[u8]>,
    pub width: u32,
    pub height: u32,
    /// e.g. `image/png`.
    pub mime: &'static str,
}

impl Screenshot {
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }

    /// `data:` URL suitable for OpenAI-style image parts.
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime, self.to_base64())
    }
}

/// Normalized snapshot of the visible UI at one instant.
///
/// Produced fresh on every loop iteration and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct ScreenState {
    pub package_name: String,
    pub activity_name: Option<String>,
    /// Ordered; insertion order is traversal order.
    pub elements: Vec<UiElement>,
    pub screenshot: Option<Screenshot>,
    /// Display size in pixels, when known.
    pub display: Option<(u32, u32)>,
    pub captured_at: DateTime<Utc>,
    /// Set when perception failed and this snapshot was synthesized.
    pub degraded: bool,
}

impl ScreenState {
    /// Snapshot with no elements and no screenshot.
    pub fn empty(package_name: impl Into<String>) -> Self {
        Self {
            package_name: package_name.into(),
            activity_name: None,
            elements: Vec::new(),
            screenshot: None,
            display: None,
            captured_at: Utc::now(),
            degraded: false,
        }
    }

    /// Placeholder used when no backend could supply screen data.
    pub fn degraded() -> Self {
        Self {
            degraded: true,
            ..Self::empty("unknown")
        }
    }

    pub fn element(&self, id: usize) -> Option<&UiElement> {
        self.elements.iter().find(|e| e.id == id)
    }

    /// One-line summary recorded in step history.
    pub fn summary(&self) -> String {
        let location = match &self.activity_name {
            Some(activity) => format!("{}/{}", self.package_name, activity),
            None => self.package_name.clone(),
        };
        let mut summary = format!("{} ({} elements", location, self.elements.len());
        if self.screenshot.is_some() {
            summary.push_str(", screenshot");
        }
        if self.degraded {
            summary.push_str(", degraded");
        }
        summary.push(')');
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_normalized() {
        let b = Bounds::new(100, 200, 50, 20);
        assert_eq!(b, Bounds::new(50, 20, 100, 200));
        assert!(b.right >= b.left && b.bottom >= b.top);
    }

    #[test]
    fn test_bounds_center() {
        let b = Bounds::new(0, 0, 1080, 2400);
        assert_eq!(b.center(), (540, 1200));
        assert!(b.contains(0, 0));
        assert!(!b.contains(1080, 10));
    }

    #[test]
    fn test_bounds_extreme_edges() {
        let b = Bounds::new(-2_000_000_000, 0, 2_000_000_000, 10);
        assert_eq!(b.width(), i32::MAX);
        assert_eq!(b.height(), 10);
        assert_eq!(b.center(), (0, 5));
        assert!(!b.is_empty());

        let full = Bounds::new(i32::MIN, i32::MIN, i32::MAX, i32::MAX);
        assert_eq!(full.center(), (0, 0));
    }

    #[test]
    fn test_summary() {
        let mut state = ScreenState::empty("com.android.settings");
        state.activity_name = Some("com.android.settings.Settings".to_string());
        assert_eq!(
            state.summary(),
            "com.android.settings/com.android.settings.Settings (0 elements)"
        );
        assert!(ScreenState::degraded().summary().contains("degraded"));
    }

    #[test]
    fn test_element_label_fallbacks() {
        let mut element = UiElement {
            id: 0,
            kind: "ImageView".to_string(),
            text: String::new(),
            description: String::new(),
            resource_id: Some("com.app:id/search_icon".to_string()),
            bounds: Bounds::new(0, 0, 10, 10),
            clickable: true,
            editable: false,
            scrollable: false,
        };
        assert_eq!(element.label(), "search_icon");
        element.description = "Search".to_string();
        assert_eq!(element.label(), "Search");
    }
}
