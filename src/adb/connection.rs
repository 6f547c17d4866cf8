//! ADB connection management for local and remote devices.

use std::process::Output;
use std::time::Duration;

use tokio::process::Command;
use tokio::time::timeout;

use crate::backend::BackendError;

/// Default timeout for a single adb invocation.
pub const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 15;

/// Type of ADB connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionType {
    Usb,
    Wifi,
    Remote,
}

/// Information about a connected device.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub device_id: String,
    pub status: String,
    pub connection_type: ConnectionType,
    pub model: Option<String>,
}

impl DeviceInfo {
    /// Whether adb reports the device as ready for commands.
    pub fn is_online(&self) -> bool {
        self.status == "device"
    }
}

/// An adb binary plus an optional device serial.
///
/// Every command is spawned with an argument vector; nothing is routed
/// through a host shell.
#[derive(Debug, Clone)]
pub struct AdbTarget {
    adb_path: String,
    device_id: Option<String>,
    command_timeout: Duration,
}

impl Default for AdbTarget {
    fn default() -> Self {
        Self {
            adb_path: "adb".to_string(),
            device_id: None,
            command_timeout: Duration::from_secs(DEFAULT_COMMAND_TIMEOUT_SECS),
        }
    }
}

impl AdbTarget {
    pub fn new(adb_path: impl Into<String>, device_id: Option<String>) -> Self {
        Self {
            adb_path: adb_path.into(),
            device_id,
            ..Self::default()
        }
    }

    /// Set the per-command timeout.
    pub fn with_timeout(mut self, command_timeout: Duration) -> Self {
        self.command_timeout = command_timeout;
        self
    }

    pub fn device_id(&self) -> Option<&str> {
        self.device_id.as_deref()
    }

    /// Base argument vector, e.g. `["-s", "emulator-5554"]`.
    pub(crate) fn prefix_args(&self) -> Vec<String> {
        match &self.device_id {
            Some(id) => vec!["-s".to_string(), id.clone()],
            None => Vec::new(),
        }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.adb_path);
        cmd.args(self.prefix_args());
        cmd.kill_on_drop(true);
        cmd
    }

    /// Run `adb [-s id] <args>` and return the raw output.
    pub async fn run(&self, args: &[&str]) -> Result<Output, BackendError> {
        let mut cmd = self.command();
        cmd.args(args);
        tracing::trace!(adb = %self.adb_path, ?args, "adb invocation");
        match timeout(self.command_timeout, cmd.output()).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(BackendError::CommandFailed(format!(
                "adb {} timed out after {}s",
                args.first().copied().unwrap_or_default(),
                self.command_timeout.as_secs()
            ))),
        }
    }

    /// Run `adb shell <args>` and fail on a non-zero exit status.
    pub async fn shell(&self, args: &[&str]) -> Result<String, BackendError> {
        let mut full = Vec::with_capacity(args.len() + 1);
        full.push("shell");
        full.extend_from_slice(args);
        let output = self.run(&full).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BackendError::CommandFailed(format!(
                "adb shell {} exited with {}: {}",
                args.join(" "),
                output.status,
                stderr.trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Run `adb exec-out <args>` and return stdout bytes.
    pub async fn exec_out(&self, args: &[&str]) -> Result<Vec<u8>, BackendError> {
        let mut full = Vec::with_capacity(args.len() + 1);
        full.push("exec-out");
        full.extend_from_slice(args);
        let output = self.run(&full).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BackendError::CommandFailed(stderr.trim().to_string()));
        }
        Ok(output.stdout)
    }
}

/// Manages ADB connections to Android devices.
///
/// Supports USB, WiFi, and remote TCP/IP connections.
pub struct AdbConnection {
    adb_path: String,
}

impl Default for AdbConnection {
    fn default() -> Self {
        Self::new()
    }
}

impl AdbConnection {
    /// Create a new ADB connection manager with default path.
    pub fn new() -> Self {
        Self {
            adb_path: "adb".to_string(),
        }
    }

    /// Create a new ADB connection manager with custom ADB path.
    pub fn with_path(adb_path: impl Into<String>) -> Self {
        Self {
            adb_path: adb_path.into(),
        }
    }

    fn target(&self) -> AdbTarget {
        AdbTarget::new(self.adb_path.clone(), None)
    }

    /// Connect to a remote device via TCP/IP ("host" or "host:port").
    pub async fn connect(&self, address: &str) -> Result<String, BackendError> {
        let address = normalize_address(address);
        let output = self.target().run(&["connect", &address]).await?;
        let combined = format!(
            "{}{}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        let lowered = combined.to_lowercase();
        if lowered.contains("connected") && !lowered.contains("cannot") {
            Ok(format!("Connected to {}", address))
        } else {
            Err(BackendError::CommandFailed(combined.trim().to_string()))
        }
    }

    /// Disconnect from a remote device. If `address` is None, disconnects all.
    pub async fn disconnect(&self, address: Option<&str>) -> Result<String, BackendError> {
        let args: Vec<&str> = match address {
            Some(addr) => vec!["disconnect", addr],
            None => vec!["disconnect"],
        };
        let output = self.target().run(&args).await?;
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// List all devices known to the adb server.
    pub async fn list_devices(&self) -> Result<Vec<DeviceInfo>, BackendError> {
        let output = self.target().run(&["devices", "-l"]).await?;
        Ok(parse_device_list(&String::from_utf8_lossy(&output.stdout)))
    }
}

fn normalize_address(address: &str) -> String {
    if address.contains(':') {
        address.to_string()
    } else {
        format!("{}:5555", address)
    }
}

/// Parse the output of `adb devices -l`.
pub(crate) fn parse_device_list(stdout: &str) -> Vec<DeviceInfo> {
    let mut devices = Vec::new();

    for line in stdout.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with("List of devices") || line.starts_with('*') {
            continue;
        }

        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 2 {
            continue;
        }

        let device_id = parts[0].to_string();
        let connection_type = if device_id.contains(':') {
            ConnectionType::Remote
        } else if parts.iter().any(|p| p.starts_with("usb:")) {
            ConnectionType::Usb
        } else {
            ConnectionType::Wifi
        };
        let model = parts
            .iter()
            .find_map(|p| p.strip_prefix("model:"))
            .map(str::to_string);

        devices.push(DeviceInfo {
            device_id,
            status: parts[1].to_string(),
            connection_type,
            model,
        });
    }

    devices
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_args() {
        assert!(AdbTarget::default().prefix_args().is_empty());
        let target = AdbTarget::new("adb", Some("device123".to_string()));
        assert_eq!(target.prefix_args(), vec!["-s", "device123"]);
    }

    #[test]
    fn test_normalize_address() {
        assert_eq!(normalize_address("192.168.1.100"), "192.168.1.100:5555");
        assert_eq!(normalize_address("10.0.0.2:5037"), "10.0.0.2:5037");
    }

    #[test]
    fn test_parse_device_list() {
        let out = "List of devices attached\n\
                   emulator-5554          device product:sdk model:Pixel_7 usb:1-1\n\
                   192.168.1.7:5555       offline model:Mi_11\n\n";
        let devices = parse_device_list(out);
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].device_id, "emulator-5554");
        assert_eq!(devices[0].connection_type, ConnectionType::Usb);
        assert_eq!(devices[0].model.as_deref(), Some("Pixel_7"));
        assert!(devices[0].is_online());
        assert_eq!(devices[1].connection_type, ConnectionType::Remote);
        assert!(!devices[1].is_online());
    }
}
