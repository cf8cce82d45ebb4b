//! Run serialization for benchmark pipelines.
//!
//! [`RunGate`] grants exclusive execution to one benchmark run at a time. Concurrent benchmarks
//! would compete for host I/O bandwidth and CPU, so the gate trades concurrency for measurements
//! that reflect a share's isolated performance. The gate guards no data, only temporal
//! exclusivity.
//!
//! The gate is owned by the caller and cloned into every component that schedules benchmarks.
//! All clones share the same underlying lock.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{Mutex, OwnedMutexGuard};

/// Exclusive-run coordinator for benchmark pipelines.
#[derive(Clone, Debug, Default)]
pub struct RunGate {
    lock: Arc<Mutex<()>>,
}

impl RunGate {
    /// Creates a new, unheld gate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until exclusive ownership of the gate is obtained.
    ///
    /// Waiters are served in FIFO order. Ownership is returned when the [`RunPermit`] is dropped,
    /// which also happens when the holder returns early or unwinds.
    pub async fn acquire(&self) -> RunPermit {
        let guard = Arc::clone(&self.lock).lock_owned().await;
        RunPermit {
            _guard: guard,
            acquired: Instant::now(),
        }
    }

    #[cfg(test)]
    pub(crate) fn try_acquire(&self) -> Option<RunPermit> {
        let guard = Arc::clone(&self.lock).try_lock_owned().ok()?;
        Some(RunPermit {
            _guard: guard,
            acquired: Instant::now(),
        })
    }

    #[cfg(test)]
    pub(crate) fn is_busy(&self) -> bool {
        self.lock.try_lock().is_err()
    }
}

/// RAII guard for exclusive ownership of a [`RunGate`].
#[derive(Debug)]
pub struct RunPermit {
    _guard: OwnedMutexGuard<()>,
    acquired: Instant,
}

impl Drop for RunPermit {
    fn drop(&mut self) {
        tracing::trace!(held = ?self.acquired.elapsed(), "releasing run gate");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_and_release() {
        let gate = RunGate::new();
        assert!(!gate.is_busy());

        let permit = gate.try_acquire().unwrap();
        assert!(gate.is_busy());
        assert!(gate.try_acquire().is_none());

        drop(permit);
        assert!(!gate.is_busy());
        assert!(gate.try_acquire().is_some());
    }

    #[test]
    fn clones_share_the_lock() {
        let gate = RunGate::new();
        let other = gate.clone();

        let _permit = gate.try_acquire().unwrap();
        assert!(other.is_busy());
        assert!(other.try_acquire().is_none());
    }

    #[tokio::test]
    async fn acquire_waits_for_holder() {
        let gate = RunGate::new();
        let permit = gate.acquire().await;

        let mut waiting = Box::pin(gate.acquire());
        assert!(futures::poll!(&mut waiting).is_pending());

        drop(permit);
        assert!(futures::poll!(&mut waiting).is_ready());
    }

    #[tokio::test]
    async fn released_when_holder_panics() {
        let gate = RunGate::new();

        let holder = gate.clone();
        let task = tokio::spawn(async move {
            let _permit = holder.acquire().await;
            panic!("probe exploded");
        });
        assert!(task.await.is_err());

        assert!(!gate.is_busy());
    }
}
