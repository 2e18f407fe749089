use tokio::sync::{Mutex, Notify};

use crate::pool::Resettable;

/// A single-shot, pool-reusable rendezvous point. Unlike `tokio::sync::
/// oneshot`, which is consumed on first use, a `ResultSlot` can be reset and
/// handed back into a [`crate::pool::Pool`] for its next job.
pub struct ResultSlot<T> {
    state: Mutex<Option<T>>,
    notify: Notify,
}

impl<T> Default for ResultSlot<T> {
    fn default() -> Self {
        Self {
            state: Mutex::new(None),
            notify: Notify::new(),
        }
    }
}

impl<T> ResultSlot<T> {
    /// Writes the single outcome for this job. Called at most once per
    /// acquire/release cycle — the worker that owns this slot is the only
    /// writer (§4.4 step 6: "writes exactly one outcome").
    pub async fn set(&self, value: T) {
        *self.state.lock().await = Some(value);
        self.notify.notify_one();
    }

    /// Waits for and consumes the outcome. Safe to call from exactly one
    /// reader (the fallback orchestrator awaiting its submitted job).
    pub async fn wait(&self) -> T {
        loop {
            let notified = self.notify.notified();
            if let Some(value) = self.state.lock().await.take() {
                return value;
            }
            notified.await;
        }
    }
}

impl<T> Resettable for ResultSlot<T> {
    fn reset(&mut self) {
        // `&mut self` here means no concurrent waiters can observe the
        // slot mid-reset; a stray value means a job finished without a
        // reader draining it (e.g. a canceled attempt), which is fine to
        // drop silently.
        *self.state.get_mut() = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn set_then_wait_returns_value() {
        let slot: ResultSlot<u32> = ResultSlot::default();
        slot.set(7).await;
        assert_eq!(slot.wait().await, 7);
    }

    #[tokio::test]
    async fn wait_then_set_returns_value() {
        let slot = Arc::new(ResultSlot::<u32>::default());
        let reader = {
            let slot = slot.clone();
            tokio::spawn(async move { slot.wait().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        slot.set(99).await;
        assert_eq!(reader.await.unwrap(), 99);
    }

    #[tokio::test]
    async fn reset_clears_stray_value() {
        let mut slot: ResultSlot<u32> = ResultSlot::default();
        slot.set(1).await;
        slot.reset();
        assert!(slot.state.get_mut().is_none());
    }
}
