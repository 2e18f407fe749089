use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::Mutex;

/// Objects handed out by a [`Pool`] must know how to return to their zero
/// state before re-entering circulation.
pub trait Resettable {
    fn reset(&mut self);
}

/// Covers the byte-buffer and message-slice pools named in §4.1 generically.
impl<T> Resettable for Vec<T> {
    fn reset(&mut self) {
        self.clear();
    }
}

/// An unbounded best-effort cache of reset-and-reuse objects. `acquire()`
/// pops a free object or allocates a fresh one via `Default`; the returned
/// [`Pooled`] guard resets and returns the value to the pool on drop, so a
/// caller cannot forget to release and cannot double-release.
///
/// Pool exhaustion never fails the caller: an empty free list just falls
/// back to allocation (§4.1).
pub struct Pool<T: Resettable + Default + Send + 'static> {
    free: Mutex<Vec<T>>,
    acquired: AtomicU64,
    released: AtomicU64,
}

impl<T: Resettable + Default + Send + 'static> Pool<T> {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            free: Mutex::new(Vec::new()),
            acquired: AtomicU64::new(0),
            released: AtomicU64::new(0),
        })
    }

    pub async fn acquire(self: &Arc<Self>) -> Pooled<T> {
        let value = self.free.lock().await.pop().unwrap_or_default();
        self.acquired.fetch_add(1, Ordering::Relaxed);
        Pooled {
            value: Some(value),
            pool: self.clone(),
        }
    }

    async fn release(&self, mut value: T) {
        value.reset();
        self.free.lock().await.push(value);
        self.released.fetch_add(1, Ordering::Relaxed);
    }

    /// Outstanding = acquired - released; used by tests to assert pool
    /// integrity (testable property 2) and never by business logic.
    pub fn outstanding(&self) -> i64 {
        self.acquired.load(Ordering::Relaxed) as i64 - self.released.load(Ordering::Relaxed) as i64
    }

    pub fn acquired_count(&self) -> u64 {
        self.acquired.load(Ordering::Relaxed)
    }

    pub fn released_count(&self) -> u64 {
        self.released.load(Ordering::Relaxed)
    }
}

/// RAII guard around a pooled value. Dropping it resets the value and
/// returns it to the pool exactly once — ownership makes a double-release
/// a compile error rather than a runtime one.
pub struct Pooled<T: Resettable + Default + Send + 'static> {
    value: Option<T>,
    pool: Arc<Pool<T>>,
}

impl<T: Resettable + Default + Send + 'static> Deref for Pooled<T> {
    type Target = T;
    fn deref(&self) -> &T {
        self.value.as_ref().expect("pooled value taken before drop")
    }
}

impl<T: Resettable + Default + Send + 'static> DerefMut for Pooled<T> {
    fn deref_mut(&mut self) -> &mut T {
        self.value.as_mut().expect("pooled value taken before drop")
    }
}

impl<T: Resettable + Default + Send + 'static> Drop for Pooled<T> {
    fn drop(&mut self) {
        let Some(value) = self.value.take() else {
            return;
        };
        let pool = self.pool.clone();
        #[cfg(debug_assertions)]
        {
            // Runs even off a tokio runtime (e.g. plain unit tests): fall
            // back to a blocking lock rather than panicking on a missing
            // reactor, since this is a debug-only integrity check, not a
            // hot path.
            if let Ok(mut free) = pool.free.try_lock() {
                let mut v = value;
                v.reset();
                free.push(v);
                pool.released.fetch_add(1, Ordering::Relaxed);
                return;
            }
        }
        tokio::spawn(async move {
            pool.release(value).await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Buf(Vec<u8>);

    impl Resettable for Buf {
        fn reset(&mut self) {
            self.0.clear();
        }
    }

    #[tokio::test]
    async fn acquire_release_balances() {
        let pool = Pool::<Buf>::new();
        {
            let mut guard = pool.acquire().await;
            guard.0.extend_from_slice(b"hello");
        }
        tokio::task::yield_now().await;
        assert_eq!(pool.acquired_count(), 1);
        assert_eq!(pool.released_count(), 1);
        assert_eq!(pool.outstanding(), 0);
    }

    #[tokio::test]
    async fn released_object_is_reset() {
        let pool = Pool::<Buf>::new();
        {
            let mut guard = pool.acquire().await;
            guard.0.push(1);
        }
        tokio::task::yield_now().await;
        let guard = pool.acquire().await;
        assert!(guard.0.is_empty());
    }

    #[tokio::test]
    async fn many_sequential_acquires_balance() {
        let pool = Pool::<Buf>::new();
        for _ in 0..100 {
            let _guard = pool.acquire().await;
        }
        tokio::task::yield_now().await;
        assert_eq!(pool.acquired_count(), pool.released_count());
    }
}
