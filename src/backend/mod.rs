//! Capability backends: device-control providers with different privilege levels.

mod registry;
mod types;

pub use registry::BackendRegistry;
pub use types::{
    BackendError, Capability, DeviceBackend, KeyCode, Privilege, RawScreen, TextMode, TextPayload,
};
