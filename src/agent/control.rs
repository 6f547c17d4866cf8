//! External pause, resume, and cancellation of a running task.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

/// Signal observed by the loop at iteration boundaries and suspension points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSignal {
    Run,
    Pause,
    Cancel,
}

/// Cloneable handle for steering the active task from another task or thread.
#[derive(Clone)]
pub struct ControlHandle {
    tx: Arc<watch::Sender<ControlSignal>>,
}

impl Default for ControlHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl ControlHandle {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(ControlSignal::Run);
        Self { tx: Arc::new(tx) }
    }

    /// Request cancellation. Takes effect at the next checkpoint.
    pub fn cancel(&self) {
        self.tx.send_replace(ControlSignal::Cancel);
    }

    /// Pause at the next iteration boundary. Ignored once cancelled.
    pub fn pause(&self) -> bool {
        self.tx.send_if_modified(|signal| {
            if *signal == ControlSignal::Run {
                *signal = ControlSignal::Pause;
                true
            } else {
                false
            }
        })
    }

    /// Resume a paused task.
    pub fn resume(&self) -> bool {
        self.tx.send_if_modified(|signal| {
            if *signal == ControlSignal::Pause {
                *signal = ControlSignal::Run;
                true
            } else {
                false
            }
        })
    }

    pub fn signal(&self) -> ControlSignal {
        *self.tx.borrow()
    }

    pub fn is_cancelled(&self) -> bool {
        self.signal() == ControlSignal::Cancel
    }

    pub fn is_paused(&self) -> bool {
        self.signal() == ControlSignal::Pause
    }

    /// Clear any signal left over from a previous task.
    pub(crate) fn reset(&self) {
        self.tx.send_replace(ControlSignal::Run);
    }

    /// Wait until running or cancelled. Returns `false` on cancellation.
    pub(crate) async fn wait_until_running(&self) -> bool {
        let mut rx = self.tx.subscribe();
        loop {
            match *rx.borrow_and_update() {
                ControlSignal::Run => return true,
                ControlSignal::Cancel => return false,
                ControlSignal::Pause => {}
            }
            if rx.changed().await.is_err() {
                return false;
            }
        }
    }

    /// Sleep for `duration` unless cancelled first. Returns `false` on cancellation.
    pub(crate) async fn sleep(&self, duration: Duration) -> bool {
        if duration.is_zero() {
            return !self.is_cancelled();
        }
        let mut rx = self.tx.subscribe();
        let wait_cancel = async {
            loop {
                if *rx.borrow_and_update() == ControlSignal::Cancel {
                    return;
                }
                if rx.changed().await.is_err() {
                    std::future::pending::<()>().await;
                }
            }
        };
        tokio::select! {
            _ = tokio::time::sleep(duration) => !self.is_cancelled(),
            _ = wait_cancel => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pause_resume_cancel() {
        let handle = ControlHandle::new();
        assert!(handle.pause());
        assert!(handle.is_paused());
        assert!(!handle.pause());
        assert!(handle.resume());
        assert_eq!(handle.signal(), ControlSignal::Run);

        handle.cancel();
        assert!(!handle.pause());
        assert!(!handle.resume());
        assert!(handle.is_cancelled());

        handle.reset();
        assert_eq!(handle.signal(), ControlSignal::Run);
    }

    #[tokio::test]
    async fn test_wait_until_running_unblocks_on_resume() {
        let handle = ControlHandle::new();
        handle.pause();
        let waiter = {
            let handle = handle.clone();
            tokio::spawn(async move { handle.wait_until_running().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());
        handle.resume();
        assert!(waiter.await.unwrap());
    }

    #[tokio::test]
    async fn test_wait_until_running_unblocks_on_cancel() {
        let handle = ControlHandle::new();
        handle.pause();
        let waiter = {
            let handle = handle.clone();
            tokio::spawn(async move { handle.wait_until_running().await })
        };
        handle.cancel();
        assert!(!waiter.await.unwrap());
    }

    #[tokio::test]
    async fn test_sleep_is_cut_short_by_cancel() {
        let handle = ControlHandle::new();
        let sleeper = {
            let handle = handle.clone();
            tokio::spawn(async move { handle.sleep(Duration::from_secs(30)).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.cancel();
        let finished = tokio::time::timeout(Duration::from_secs(5), sleeper).await;
        assert!(!finished.unwrap().unwrap());
    }
}
