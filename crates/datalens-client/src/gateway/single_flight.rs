//! Single-flight operation slot.
//!
//! Collapses concurrent callers of the same operation into one underlying
//! call whose result every caller shares. Used for token refresh (parallel
//! requests observing a 401 must never trigger a second refresh, since the
//! backend invalidates a refresh token after first use) and for profile
//! fetches.

use std::future::Future;
use std::sync::Mutex;

use futures::future::{BoxFuture, FutureExt, Shared};

/// A nullable handle to the shared pending operation. New callers either
/// start the operation (slot empty) or attach to the in-flight one.
pub struct SingleFlight<T> {
    slot: Mutex<Option<Shared<BoxFuture<'static, T>>>>,
}

impl<T> SingleFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }

    /// Await the in-flight operation, starting it with `start` if none is
    /// pending. `start` is only invoked by the caller that fills the slot.
    pub async fn run<F, Fut>(&self, start: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        let shared = {
            let mut slot = self.slot.lock().expect("single-flight lock poisoned");
            match slot.as_ref() {
                Some(pending) => pending.clone(),
                None => {
                    let pending = start().boxed().shared();
                    *slot = Some(pending.clone());
                    pending
                }
            }
        };

        let result = shared.clone().await;

        // Clear the slot only if it still holds this operation; a newer
        // operation must not be evicted by a stale waiter.
        let mut slot = self.slot.lock().expect("single-flight lock poisoned");
        if slot.as_ref().is_some_and(|pending| pending.ptr_eq(&shared)) {
            *slot = None;
        }

        result
    }
}

impl<T> Default for SingleFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_concurrent_callers_share_one_call() {
        let flight = Arc::new(SingleFlight::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let spawn_caller = |flight: Arc<SingleFlight<usize>>, calls: Arc<AtomicUsize>| async move {
            flight
                .run(move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    42
                })
                .await
        };

        let (a, b, c) = tokio::join!(
            spawn_caller(flight.clone(), calls.clone()),
            spawn_caller(flight.clone(), calls.clone()),
            spawn_caller(flight.clone(), calls.clone()),
        );

        assert_eq!((a, b, c), (42, 42, 42));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_slot_clears_after_completion() {
        let flight = SingleFlight::new();
        let calls = AtomicUsize::new(0);

        for _ in 0..2 {
            flight
                .run(|| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { "done" }
                })
                .await;
        }

        // Sequential runs each start their own operation.
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
