//! Perception adapter: picks a screen-reading backend and normalizes its output.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;

use super::types::{ScreenState, Screenshot};
use super::ui_tree::parse_ui_tree;
use crate::backend::{BackendError, BackendRegistry, Capability, RawScreen};

/// Perception errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PerceptionError {
    #[error("No backend can read the screen")]
    NoBackend,
    #[error("Backend returned neither a UI tree nor a screenshot")]
    NoScreenData,
    #[error("Screen read failed: {0}")]
    Backend(#[from] BackendError),
}

/// Produces [`ScreenState`] snapshots from whichever backend can read the screen.
#[derive(Clone)]
pub struct PerceptionAdapter {
    backends: BackendRegistry,
}

impl PerceptionAdapter {
    pub fn new(backends: BackendRegistry) -> Self {
        Self { backends }
    }

    /// Capture and normalize the current screen.
    pub async fn capture(&self) -> Result<ScreenState, PerceptionError> {
        let backend = self
            .backends
            .select(Capability::ScreenRead)
            .await
            .ok_or(PerceptionError::NoBackend)?;

        let raw = backend.read_screen().await?;
        let state = normalize(raw)?;

        tracing::debug!(
            backend = backend.name(),
            package = %state.package_name,
            elements = state.elements.len(),
            screenshot = state.screenshot.is_some(),
            "screen captured"
        );
        Ok(state)
    }
}

/// Normalize raw backend output into a [`ScreenState`].
///
/// A tree that fails to parse is tolerated when a screenshot is present; the
/// result then has an empty element list.
pub fn normalize(raw: RawScreen) -> Result<ScreenState, PerceptionError> {
    if raw.is_empty() {
        return Err(PerceptionError::NoScreenData);
    }

    let mut state = ScreenState::empty(String::new());
    state.captured_at = Utc::now();

    if let Some(xml) = raw.ui_tree.as_deref() {
        match parse_ui_tree(xml) {
            Ok(parsed) => {
                state.elements = parsed.elements;
                state.display = parsed.display;
                if let Some(package) = parsed.package {
                    state.package_name = package;
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "discarding unparsable UI tree");
                if raw.screenshot.is_none() {
                    return Err(PerceptionError::NoScreenData);
                }
            }
        }
    }

    if let Some(bytes) = raw.screenshot {
        match decode_screenshot(bytes) {
            Some(shot) => {
                state.display = Some((shot.width, shot.height));
                state.screenshot = Some(shot);
            }
            None if state.elements.is_empty() && raw.ui_tree.is_none() => {
                return Err(PerceptionError::NoScreenData);
            }
            None => tracing::warn!("discarding undecodable screenshot"),
        }
    }

    if let Some(package) = raw.package {
        state.package_name = package;
    }
    if state.package_name.is_empty() {
        state.package_name = "unknown".to_string();
    }
    state.activity_name = raw.activity;

    Ok(state)
}

fn decode_screenshot(bytes: Vec<u8>) -> Option<Screenshot> {
    let format = image::guess_format(&bytes).ok()?;
    let mime = match format {
        image::ImageFormat::Png => "image/png",
        image::ImageFormat::Jpeg => "image/jpeg",
        _ => return None,
    };
    let img = match image::load_from_memory_with_format(&bytes, format) {
        Ok(img) => img,
        Err(e) => {
            tracing::error!(error = %e, "failed to parse screenshot image");
            return None;
        }
    };
    Some(Screenshot {
        width: img.width(),
        height: img.height(),
        bytes: Arc::from(bytes),
        mime,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, RgbImage};
    use std::io::Cursor;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::new(width, height));
        let mut buffer = Cursor::new(Vec::new());
        img.write_to(&mut buffer, image::ImageFormat::Png).unwrap();
        buffer.into_inner()
    }

    const TREE: &str = r#"<hierarchy><node text="OK" class="android.widget.Button" package="com.example" content-desc="" clickable="true" scrollable="false" bounds="[10,10][110,60]" /></hierarchy>"#;

    #[test]
    fn test_normalize_tree_only() {
        let state = normalize(RawScreen {
            ui_tree: Some(TREE.to_string()),
            ..RawScreen::default()
        })
        .unwrap();
        assert_eq!(state.package_name, "com.example");
        assert_eq!(state.elements.len(), 1);
        assert!(state.screenshot.is_none());
        assert!(!state.degraded);
    }

    #[test]
    fn test_normalize_screenshot_only() {
        let state = normalize(RawScreen {
            screenshot: Some(png(4, 8)),
            package: Some("com.example".to_string()),
            ..RawScreen::default()
        })
        .unwrap();
        assert!(state.elements.is_empty());
        assert_eq!(state.display, Some((4, 8)));
        assert_eq!(state.screenshot.as_ref().unwrap().mime, "image/png");
    }

    #[test]
    fn test_normalize_bad_tree_with_screenshot() {
        let state = normalize(RawScreen {
            ui_tree: Some("ERROR: null root node".to_string()),
            screenshot: Some(png(2, 2)),
            ..RawScreen::default()
        })
        .unwrap();
        assert!(state.elements.is_empty());
        assert!(state.screenshot.is_some());
        assert_eq!(state.package_name, "unknown");
    }

    #[test]
    fn test_normalize_nothing_usable() {
        assert_eq!(
            normalize(RawScreen::default()).unwrap_err(),
            PerceptionError::NoScreenData
        );
        assert_eq!(
            normalize(RawScreen {
                ui_tree: Some("garbage".to_string()),
                ..RawScreen::default()
            })
            .unwrap_err(),
            PerceptionError::NoScreenData
        );
    }

    #[tokio::test]
    async fn test_capture_without_backend() {
        let adapter = PerceptionAdapter::new(BackendRegistry::new());
        assert_eq!(adapter.capture().await.unwrap_err(), PerceptionError::NoBackend);
    }
}
