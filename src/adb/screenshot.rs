//! Screenshot capture from the connected Android device.

use super::connection::AdbTarget;
use crate::backend::BackendError;

const PNG_MAGIC: &[u8; 8] = b"\x89PNG\r\n\x1a\n";

/// Whether the bytes start with the PNG signature.
pub fn is_png(data: &[u8]) -> bool {
    data.len() >= PNG_MAGIC.len() && &data[..PNG_MAGIC.len()] == PNG_MAGIC
}

/// Capture a PNG screenshot via `adb exec-out screencap -p`.
///
/// Streams straight to stdout, so nothing is written on the device.
/// Returns `Ok(None)` when the device refuses (e.g. secure/payment screens)
/// or produces something that is not a PNG.
pub async fn capture_screenshot(target: &AdbTarget) -> Result<Option<Vec<u8>>, BackendError> {
    let output = target.run(&["exec-out", "screencap", "-p"]).await?;

    let stderr = String::from_utf8_lossy(&output.stderr);
    if stderr.contains("Status: -1") || stderr.contains("Failed") || stderr.contains("error") {
        tracing::warn!(stderr = %stderr.trim(), "screenshot refused (sensitive screen?)");
        return Ok(None);
    }

    if !is_png(&output.stdout) {
        tracing::warn!(
            bytes = output.stdout.len(),
            "screenshot output is not a PNG"
        );
        return Ok(None);
    }

    Ok(Some(output.stdout))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_png() {
        assert!(is_png(b"\x89PNG\r\n\x1a\nrest"));
        assert!(!is_png(b"\x89PNG"));
        assert!(!is_png(b"GIF89a........"));
    }
}
