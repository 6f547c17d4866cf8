//! Registry of device backends with least-privilege selection.

use std::sync::Arc;

use super::types::{Capability, DeviceBackend};

/// Explicitly constructed set of device backends.
///
/// The registry owns no global state; callers build it, hand it to the
/// orchestrator, and call [`BackendRegistry::shutdown`] when done.
#[derive(Clone, Default)]
pub struct BackendRegistry {
    backends: Vec<Arc<dyn DeviceBackend>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a backend.
    pub fn register(&mut self, backend: Arc<dyn DeviceBackend>) {
        tracing::debug!(
            backend = backend.name(),
            privilege = ?backend.privilege(),
            "backend registered"
        );
        self.backends.push(backend);
        self.backends.sort_by_key(|b| b.privilege());
    }

    /// Builder-style registration.
    pub fn with_backend(mut self, backend: Arc<dyn DeviceBackend>) -> Self {
        self.register(backend);
        self
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    /// Names of registered backends, least privileged first.
    pub fn names(&self) -> Vec<String> {
        self.backends.iter().map(|b| b.name().to_string()).collect()
    }

    /// Pick the least-privileged backend that supports `capability` and is
    /// available right now.
    pub async fn select(&self, capability: Capability) -> Option<Arc<dyn DeviceBackend>> {
        for backend in &self.backends {
            if !backend.supports(capability) {
                continue;
            }
            if backend.is_available().await {
                return Some(backend.clone());
            }
            tracing::debug!(
                backend = backend.name(),
                ?capability,
                "backend skipped: unavailable"
            );
        }
        None
    }

    /// Whether at least one backend is usable at this moment.
    pub async fn any_available(&self) -> bool {
        for backend in &self.backends {
            if backend.is_available().await {
                return true;
            }
        }
        false
    }

    /// Release every backend.
    pub async fn shutdown(&self) {
        for backend in &self.backends {
            backend.shutdown().await;
            tracing::debug!(backend = backend.name(), "backend released");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendError, KeyCode, Privilege, RawScreen, TextPayload};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct Fake {
        name: &'static str,
        privilege: Privilege,
        available: AtomicBool,
        caps: Vec<Capability>,
    }

    impl Fake {
        fn new(name: &'static str, privilege: Privilege, caps: Vec<Capability>) -> Arc<Self> {
            Arc::new(Self {
                name,
                privilege,
                available: AtomicBool::new(true),
                caps,
            })
        }
    }

    #[async_trait]
    impl DeviceBackend for Fake {
        fn name(&self) -> &str {
            self.name
        }
        fn privilege(&self) -> Privilege {
            self.privilege
        }
        fn supports(&self, capability: Capability) -> bool {
            self.caps.contains(&capability)
        }
        async fn is_available(&self) -> bool {
            self.available.load(Ordering::SeqCst)
        }
        async fn read_screen(&self) -> Result<RawScreen, BackendError> {
            Ok(RawScreen::default())
        }
        async fn tap(&self, _x: i32, _y: i32) -> Result<(), BackendError> {
            Ok(())
        }
        async fn swipe(&self, _: i32, _: i32, _: i32, _: i32, _: u64) -> Result<(), BackendError> {
            Ok(())
        }
        async fn input_text(&self, _payload: &TextPayload) -> Result<(), BackendError> {
            Ok(())
        }
        async fn press_key(&self, _key: KeyCode) -> Result<(), BackendError> {
            Ok(())
        }
        async fn launch(&self, _identifier: &str) -> Result<(), BackendError> {
            Ok(())
        }
        async fn force_stop(&self, _identifier: &str) -> Result<(), BackendError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_select_prefers_least_privileged() {
        let root = Fake::new("root", Privilege::Root, vec![Capability::Pointer]);
        let a11y = Fake::new("a11y", Privilege::Accessibility, vec![Capability::Pointer]);
        let registry = BackendRegistry::new()
            .with_backend(root.clone())
            .with_backend(a11y.clone());

        let chosen = registry.select(Capability::Pointer).await.unwrap();
        assert_eq!(chosen.name(), "a11y");

        a11y.available.store(false, Ordering::SeqCst);
        let chosen = registry.select(Capability::Pointer).await.unwrap();
        assert_eq!(chosen.name(), "root");
    }

    #[tokio::test]
    async fn test_select_respects_capability() {
        let shell = Fake::new("shell", Privilege::Shell, vec![Capability::Keys]);
        let registry = BackendRegistry::new().with_backend(shell);
        assert!(registry.select(Capability::Pointer).await.is_none());
        assert!(registry.select(Capability::Keys).await.is_some());
        assert!(registry.any_available().await);
    }

    #[tokio::test]
    async fn test_empty_registry() {
        let registry = BackendRegistry::new();
        assert!(registry.is_empty());
        assert!(!registry.any_available().await);
    }
}
