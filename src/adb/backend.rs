//! [`DeviceBackend`] implementation over adb.

use std::time::Duration;

use async_trait::async_trait;

use super::connection::{AdbTarget, DEFAULT_COMMAND_TIMEOUT_SECS};
use super::{device, input, screenshot, ui_dump};
use crate::backend::{
    BackendError, Capability, DeviceBackend, KeyCode, Privilege, RawScreen, TextPayload,
};

/// Configuration for the adb backend.
#[derive(Debug, Clone)]
pub struct AdbBackendConfig {
    pub adb_path: String,
    /// Optional ADB device ID for multi-device setups.
    pub device_id: Option<String>,
    pub command_timeout_secs: u64,
    /// Capture the UI hierarchy on each read.
    pub capture_ui_tree: bool,
    /// Capture a screenshot on each read.
    pub capture_screenshot: bool,
}

impl Default for AdbBackendConfig {
    fn default() -> Self {
        Self {
            adb_path: "adb".to_string(),
            device_id: None,
            command_timeout_secs: DEFAULT_COMMAND_TIMEOUT_SECS,
            capture_ui_tree: true,
            capture_screenshot: true,
        }
    }
}

impl AdbBackendConfig {
    pub fn with_device_id(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }

    pub fn with_adb_path(mut self, adb_path: impl Into<String>) -> Self {
        self.adb_path = adb_path.into();
        self
    }

    pub fn with_screenshots(mut self, enabled: bool) -> Self {
        self.capture_screenshot = enabled;
        self
    }
}

/// Shell-privileged backend driving a device through adb.
pub struct AdbBackend {
    name: String,
    target: AdbTarget,
    config: AdbBackendConfig,
}

impl AdbBackend {
    pub fn new(config: AdbBackendConfig) -> Self {
        let target = AdbTarget::new(config.adb_path.clone(), config.device_id.clone())
            .with_timeout(Duration::from_secs(config.command_timeout_secs));
        let name = match &config.device_id {
            Some(id) => format!("adb:{}", id),
            None => "adb".to_string(),
        };
        Self {
            name,
            target,
            config,
        }
    }

    pub fn target(&self) -> &AdbTarget {
        &self.target
    }
}

#[async_trait]
impl DeviceBackend for AdbBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn privilege(&self) -> Privilege {
        Privilege::Shell
    }

    fn supports(&self, capability: Capability) -> bool {
        matches!(
            capability,
            Capability::ScreenRead
                | Capability::Pointer
                | Capability::Text
                | Capability::Keys
                | Capability::AppLifecycle
        )
    }

    async fn is_available(&self) -> bool {
        match self.target.run(&["get-state"]).await {
            Ok(output) => {
                output.status.success() && String::from_utf8_lossy(&output.stdout).trim() == "device"
            }
            Err(e) => {
                tracing::debug!(backend = %self.name, error = %e, "availability probe failed");
                false
            }
        }
    }

    async fn read_screen(&self) -> Result<RawScreen, BackendError> {
        let mut raw = RawScreen::default();
        let mut last_error = None;

        if self.config.capture_ui_tree {
            match ui_dump::dump_ui_tree(&self.target).await {
                Ok(xml) => raw.ui_tree = Some(xml),
                Err(e) => {
                    tracing::warn!(backend = %self.name, error = %e, "UI tree unavailable");
                    last_error = Some(e);
                }
            }
        }

        if self.config.capture_screenshot {
            match screenshot::capture_screenshot(&self.target).await {
                Ok(shot) => raw.screenshot = shot,
                Err(e) => {
                    tracing::warn!(backend = %self.name, error = %e, "screenshot unavailable");
                    last_error = Some(e);
                }
            }
        }

        match device::current_focus(&self.target).await {
            Ok(Some((package, activity))) => {
                raw.package = Some(package);
                raw.activity = Some(activity);
            }
            Ok(None) => {}
            Err(e) => tracing::debug!(backend = %self.name, error = %e, "focus query failed"),
        }

        match (raw.is_empty(), last_error) {
            (true, Some(e)) => Err(e),
            _ => Ok(raw),
        }
    }

    async fn tap(&self, x: i32, y: i32) -> Result<(), BackendError> {
        device::tap(&self.target, x, y).await
    }

    async fn swipe(
        &self,
        x1: i32,
        y1: i32,
        x2: i32,
        y2: i32,
        duration_ms: u64,
    ) -> Result<(), BackendError> {
        device::swipe(&self.target, x1, y1, x2, y2, duration_ms).await
    }

    async fn input_text(&self, payload: &TextPayload) -> Result<(), BackendError> {
        input::apply_payload(&self.target, payload).await
    }

    async fn press_key(&self, key: KeyCode) -> Result<(), BackendError> {
        device::key_event(&self.target, key).await
    }

    async fn launch(&self, identifier: &str) -> Result<(), BackendError> {
        device::launch_package(&self.target, identifier).await
    }

    async fn force_stop(&self, identifier: &str) -> Result<(), BackendError> {
        device::force_stop(&self.target, identifier).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_name_includes_device() {
        let backend = AdbBackend::new(AdbBackendConfig::default().with_device_id("emulator-5554"));
        assert_eq!(backend.name(), "adb:emulator-5554");
        assert_eq!(backend.privilege(), Privilege::Shell);
        assert!(backend.supports(Capability::Text));
    }

    #[tokio::test]
    async fn test_missing_adb_binary_is_unavailable() {
        let backend = AdbBackend::new(
            AdbBackendConfig::default().with_adb_path("/nonexistent/phone-pilot-adb"),
        );
        assert!(!backend.is_available().await);
        assert!(backend.tap(1, 1).await.is_err());
    }
}
