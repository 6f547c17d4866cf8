//! UI hierarchy dump through `uiautomator`.

use super::connection::AdbTarget;
use crate::backend::BackendError;

/// Transient dump location on the device.
pub const DUMP_PATH: &str = "/sdcard/phone_pilot_window_dump.xml";

/// Dump the current UI hierarchy and return the XML.
///
/// The dump file on the device is removed whether or not reading it succeeded.
pub async fn dump_ui_tree(target: &AdbTarget) -> Result<String, BackendError> {
    let result = dump_and_read(target).await;

    if let Err(e) = target.shell(&["rm", "-f", DUMP_PATH]).await {
        tracing::warn!(error = %e, path = DUMP_PATH, "failed to remove UI dump from device");
    }

    result
}

async fn dump_and_read(target: &AdbTarget) -> Result<String, BackendError> {
    let stdout = target.shell(&["uiautomator", "dump", DUMP_PATH]).await?;
    if stdout.contains("ERROR") {
        return Err(BackendError::CommandFailed(format!(
            "uiautomator dump failed: {}",
            stdout.trim()
        )));
    }

    let xml = target.shell(&["cat", DUMP_PATH]).await?;
    if !xml.contains("<hierarchy") {
        return Err(BackendError::CommandFailed(
            "UI dump did not contain a hierarchy".to_string(),
        ));
    }
    Ok(xml)
}
