//! Device control primitives over `adb shell input` and the activity manager.

use once_cell::sync::Lazy;
use regex::Regex;

use super::connection::AdbTarget;
use crate::backend::{BackendError, KeyCode};

static FOCUS_RE: Lazy<Regex> = Lazy::new(|| {
    // mCurrentFocus=Window{1a2b u0 com.tencent.mm/com.tencent.mm.ui.LauncherUI}
    Regex::new(r"(?:mCurrentFocus|mFocusedApp)=.*?\s([A-Za-z0-9_.]+)/([A-Za-z0-9_.$]+)")
        .expect("focus regex is valid")
});

/// Extract `(package, activity)` from a `dumpsys window` focus line.
///
/// Activities given in short form (`.MainActivity`) are expanded with the package.
pub fn parse_focus_line(line: &str) -> Option<(String, String)> {
    let caps = FOCUS_RE.captures(line)?;
    let package = caps.get(1)?.as_str().to_string();
    let activity = caps.get(2)?.as_str();
    let activity = if activity.starts_with('.') {
        format!("{}{}", package, activity)
    } else {
        activity.to_string()
    };
    Some((package, activity))
}

/// Get the currently focused package and activity.
pub async fn current_focus(target: &AdbTarget) -> Result<Option<(String, String)>, BackendError> {
    let stdout = target.shell(&["dumpsys", "window"]).await?;
    Ok(stdout
        .lines()
        .filter(|line| line.contains("mCurrentFocus") || line.contains("mFocusedApp"))
        .find_map(parse_focus_line))
}

/// Tap at the specified coordinates.
pub async fn tap(target: &AdbTarget, x: i32, y: i32) -> Result<(), BackendError> {
    target
        .shell(&["input", "tap", &x.to_string(), &y.to_string()])
        .await
        .map(|_| ())
}

/// Swipe from start to end; a zero-length swipe is a long press.
pub async fn swipe(
    target: &AdbTarget,
    start_x: i32,
    start_y: i32,
    end_x: i32,
    end_y: i32,
    duration_ms: u64,
) -> Result<(), BackendError> {
    target
        .shell(&[
            "input",
            "swipe",
            &start_x.to_string(),
            &start_y.to_string(),
            &end_x.to_string(),
            &end_y.to_string(),
            &duration_ms.to_string(),
        ])
        .await
        .map(|_| ())
}

/// Dispatch a key event.
pub async fn key_event(target: &AdbTarget, key: KeyCode) -> Result<(), BackendError> {
    target
        .shell(&["input", "keyevent", &key.android_keycode().to_string()])
        .await
        .map(|_| ())
}

/// Launch the launcher activity of a package.
pub async fn launch_package(target: &AdbTarget, package: &str) -> Result<(), BackendError> {
    validate_package(package)?;
    let stdout = target
        .shell(&[
            "monkey",
            "-p",
            package,
            "-c",
            "android.intent.category.LAUNCHER",
            "1",
        ])
        .await?;
    if stdout.contains("No activities found") || stdout.contains("monkey aborted") {
        return Err(BackendError::CommandFailed(format!(
            "No launchable activity for {}",
            package
        )));
    }
    Ok(())
}

/// Force-stop a package.
pub async fn force_stop(target: &AdbTarget, package: &str) -> Result<(), BackendError> {
    validate_package(package)?;
    target
        .shell(&["am", "force-stop", package])
        .await
        .map(|_| ())
}

/// Package names are passed to the device shell, so only accept the
/// characters a package name can contain.
fn validate_package(package: &str) -> Result<(), BackendError> {
    let valid = !package.is_empty()
        && package
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(BackendError::CommandFailed(format!(
            "Invalid package identifier: {:?}",
            package
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_focus_line_full() {
        let line = "  mCurrentFocus=Window{4c3b2a1 u0 com.tencent.mm/com.tencent.mm.ui.LauncherUI}";
        let (pkg, act) = parse_focus_line(line).unwrap();
        assert_eq!(pkg, "com.tencent.mm");
        assert_eq!(act, "com.tencent.mm.ui.LauncherUI");
    }

    #[test]
    fn test_parse_focus_line_short_activity() {
        let line = "mFocusedApp=ActivityRecord{9f u0 com.android.settings/.Settings t12}";
        let (pkg, act) = parse_focus_line(line).unwrap();
        assert_eq!(pkg, "com.android.settings");
        assert_eq!(act, "com.android.settings.Settings");
    }

    #[test]
    fn test_parse_focus_line_none() {
        assert!(parse_focus_line("mCurrentFocus=null").is_none());
    }

    #[test]
    fn test_validate_package() {
        assert!(validate_package("com.tencent.mm").is_ok());
        assert!(validate_package("com.x; rm -rf /").is_err());
        assert!(validate_package("").is_err());
    }
}
