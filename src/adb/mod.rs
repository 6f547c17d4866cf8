//! ADB (Android Debug Bridge) capability backend.

mod backend;
mod connection;
mod device;
pub mod input;
mod screenshot;
mod ui_dump;

pub use backend::{AdbBackend, AdbBackendConfig};
pub use connection::{AdbConnection, AdbTarget, ConnectionType, DeviceInfo};
pub use device::{current_focus, parse_focus_line};
pub use screenshot::{capture_screenshot, is_png};
pub use ui_dump::dump_ui_tree;
