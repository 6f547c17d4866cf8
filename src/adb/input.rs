//! Text input through ADB Keyboard.
//!
//! Text travels to the device base64-encoded inside an intent extra, so no
//! character of the payload is ever interpreted by a shell.
//! Requires ADB Keyboard to be installed on the device.
//! See: https://github.com/senzhk/ADBKeyBoard

use base64::{engine::general_purpose::STANDARD, Engine};

use super::connection::AdbTarget;
use crate::backend::{BackendError, TextMode, TextPayload};

/// IME identifier of ADB Keyboard.
pub const ADB_KEYBOARD_IME: &str = "com.android.adbkeyboard/.AdbIME";

/// Encode text for the `ADB_INPUT_B64` broadcast.
pub fn encode_payload(text: &str) -> String {
    STANDARD.encode(text.as_bytes())
}

/// Type text into the currently focused input field.
pub async fn type_text(target: &AdbTarget, text: &str) -> Result<(), BackendError> {
    let encoded = encode_payload(text);
    target
        .shell(&["am", "broadcast", "-a", "ADB_INPUT_B64", "--es", "msg", &encoded])
        .await
        .map(|_| ())
}

/// Clear text in the currently focused input field.
pub async fn clear_text(target: &AdbTarget) -> Result<(), BackendError> {
    target
        .shell(&["am", "broadcast", "-a", "ADB_CLEAR_TEXT"])
        .await
        .map(|_| ())
}

/// Switch to ADB Keyboard if needed.
///
/// Returns the original IME identifier for later restoration.
pub async fn detect_and_set_adb_keyboard(target: &AdbTarget) -> Result<String, BackendError> {
    let current_ime = target
        .shell(&["settings", "get", "secure", "default_input_method"])
        .await?
        .trim()
        .to_string();

    if !current_ime.contains(ADB_KEYBOARD_IME) {
        target.shell(&["ime", "set", ADB_KEYBOARD_IME]).await?;
    }

    Ok(current_ime)
}

/// Restore the original keyboard IME.
pub async fn restore_keyboard(target: &AdbTarget, ime: &str) -> Result<(), BackendError> {
    if ime.is_empty() || ime == "null" || ime.contains(ADB_KEYBOARD_IME) {
        return Ok(());
    }
    target.shell(&["ime", "set", ime]).await.map(|_| ())
}

/// Apply a structured text payload: switch keyboard, optionally clear,
/// insert, and always restore the original keyboard.
pub async fn apply_payload(target: &AdbTarget, payload: &TextPayload) -> Result<(), BackendError> {
    let original_ime = detect_and_set_adb_keyboard(target).await?;

    let result = async {
        if payload.mode == TextMode::Replace {
            clear_text(target).await?;
        }
        if !payload.text.is_empty() {
            type_text(target, &payload.text).await?;
        }
        Ok::<(), BackendError>(())
    }
    .await;

    if let Err(e) = restore_keyboard(target, &original_ime).await {
        tracing::warn!(error = %e, ime = %original_ime, "failed to restore keyboard");
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_payload_is_shell_safe() {
        let encoded = encode_payload("Hello, 世界! $(rm -rf /) \"quoted\" 'single'");
        assert!(encoded
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '/' || c == '='));
        let decoded = STANDARD.decode(encoded).unwrap();
        assert_eq!(
            String::from_utf8(decoded).unwrap(),
            "Hello, 世界! $(rm -rf /) \"quoted\" 'single'"
        );
    }
}
