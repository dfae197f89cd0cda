//! One-shot delayed task, cancelled on drop.

use std::time::Duration;

use tokio::task::JoinHandle;

/// Quiet period before an empty render is checked again.
pub const EMPTY_RECHECK_DELAY: Duration = Duration::from_millis(150);

/// Runs a callback once after a delay unless dropped first.
#[derive(Debug)]
pub struct DebounceTimer {
    task: JoinHandle<()>,
}

impl DebounceTimer {
    /// Schedule `fire` on the current tokio runtime.
    pub fn schedule<F>(delay: Duration, fire: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            fire();
        });
        Self { task }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for DebounceTimer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> (Arc<AtomicUsize>, impl FnOnce() + Send + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        (count, move || {
            c.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[tokio::test]
    async fn test_fires_once_after_delay() {
        let (count, fire) = counter();
        let timer = DebounceTimer::schedule(Duration::from_millis(20), fire);
        assert_eq!(count.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(timer.is_finished());
    }

    #[tokio::test]
    async fn test_drop_cancels() {
        let (count, fire) = counter();
        let timer = DebounceTimer::schedule(Duration::from_millis(20), fire);
        drop(timer);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
