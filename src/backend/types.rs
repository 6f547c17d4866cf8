//! Backend trait and the primitive vocabulary shared by every device-control source.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors reported by a device backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("Backend {0} is not available")]
    Unavailable(String),
    #[error("Backend {backend} does not support {capability:?}")]
    Unsupported {
        backend: String,
        capability: Capability,
    },
    #[error("Command failed: {0}")]
    CommandFailed(String),
    #[error("Backend I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for BackendError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

/// Privilege level of a backend. Ordering is least-privileged first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Privilege {
    /// In-app accessibility style control.
    Accessibility,
    /// Debug-bridge shell user.
    Shell,
    /// Root shell.
    Root,
}

/// Groups of primitives a backend may offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Read the UI tree and/or a screenshot.
    ScreenRead,
    /// Pointer-down/move/up sequences (tap, swipe).
    Pointer,
    /// Text insertion into the focused field.
    Text,
    /// Key event dispatch.
    Keys,
    /// Launch and force-stop applications.
    AppLifecycle,
}

/// Key events the agent may dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyCode {
    Back,
    Home,
    Enter,
    RecentApps,
    Delete,
    VolumeUp,
    VolumeDown,
    Power,
}

impl KeyCode {
    /// All keys, in catalog order.
    pub const ALL: [KeyCode; 8] = [
        KeyCode::Back,
        KeyCode::Home,
        KeyCode::Enter,
        KeyCode::RecentApps,
        KeyCode::Delete,
        KeyCode::VolumeUp,
        KeyCode::VolumeDown,
        KeyCode::Power,
    ];

    /// Wire name used in tool schemas.
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyCode::Back => "back",
            KeyCode::Home => "home",
            KeyCode::Enter => "enter",
            KeyCode::RecentApps => "recent_apps",
            KeyCode::Delete => "delete",
            KeyCode::VolumeUp => "volume_up",
            KeyCode::VolumeDown => "volume_down",
            KeyCode::Power => "power",
        }
    }

    /// Parse a wire name.
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|k| k.as_str().eq_ignore_ascii_case(name.trim()))
    }

    /// Android key event code.
    pub fn android_keycode(&self) -> u32 {
        match self {
            KeyCode::Back => 4,
            KeyCode::Home => 3,
            KeyCode::Enter => 66,
            KeyCode::RecentApps => 187,
            KeyCode::Delete => 67,
            KeyCode::VolumeUp => 24,
            KeyCode::VolumeDown => 25,
            KeyCode::Power => 26,
        }
    }
}

/// How a text payload is applied to the focused field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextMode {
    /// Insert at the cursor.
    Append,
    /// Clear the field, then insert.
    Replace,
}

/// Structured text payload handed to a backend.
///
/// Backends receive the raw text and are responsible for transporting it
/// without shell interpretation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextPayload {
    pub text: String,
    pub mode: TextMode,
}

impl TextPayload {
    pub fn append(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            mode: TextMode::Append,
        }
    }

    pub fn replace(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            mode: TextMode::Replace,
        }
    }

    /// Payload that only clears the field.
    pub fn clear() -> Self {
        Self::replace(String::new())
    }
}

/// Whatever a backend could read from the screen, before normalization.
#[derive(Debug, Clone, Default)]
pub struct RawScreen {
    /// UI hierarchy dump (uiautomator-style XML).
    pub ui_tree: Option<String>,
    /// Encoded screenshot (PNG or JPEG).
    pub screenshot: Option<Vec<u8>>,
    pub package: Option<String>,
    pub activity: Option<String>,
}

impl RawScreen {
    pub fn is_empty(&self) -> bool {
        self.ui_tree.is_none() && self.screenshot.is_none()
    }
}

/// A device-control provider.
///
/// Availability is polled by callers immediately before use; a backend may
/// become unavailable at any point (privilege revoked, device unplugged), in
/// which case its primitives return [`BackendError`].
#[async_trait]
pub trait DeviceBackend: Send + Sync {
    /// Stable identifier used in logs and results.
    fn name(&self) -> &str;

    fn privilege(&self) -> Privilege;

    fn supports(&self, capability: Capability) -> bool;

    /// Whether the backend can currently accept calls.
    async fn is_available(&self) -> bool;

    async fn read_screen(&self) -> Result<RawScreen, BackendError>;

    async fn tap(&self, x: i32, y: i32) -> Result<(), BackendError>;

    async fn swipe(
        &self,
        x1: i32,
        y1: i32,
        x2: i32,
        y2: i32,
        duration_ms: u64,
    ) -> Result<(), BackendError>;

    async fn input_text(&self, payload: &TextPayload) -> Result<(), BackendError>;

    async fn press_key(&self, key: KeyCode) -> Result<(), BackendError>;

    async fn launch(&self, identifier: &str) -> Result<(), BackendError>;

    async fn force_stop(&self, identifier: &str) -> Result<(), BackendError>;

    /// Release any resources held by the backend.
    async fn shutdown(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_privilege_ordering() {
        assert!(Privilege::Accessibility < Privilege::Shell);
        assert!(Privilege::Shell < Privilege::Root);
    }

    #[test]
    fn test_key_code_parse() {
        assert_eq!(KeyCode::parse("BACK"), Some(KeyCode::Back));
        assert_eq!(KeyCode::parse(" recent_apps "), Some(KeyCode::RecentApps));
        assert_eq!(KeyCode::parse("menu"), None);
        assert_eq!(KeyCode::Home.android_keycode(), 3);
    }

    #[test]
    fn test_clear_payload() {
        let payload = TextPayload::clear();
        assert!(payload.text.is_empty());
        assert_eq!(payload.mode, TextMode::Replace);
    }
}
