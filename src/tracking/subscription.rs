use std::future::Future;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Resolves when the owning [`Subscription`] is cancelled or dropped.
pub type Cancelled = oneshot::Receiver<()>;

/// Handle to a background task. The task stops on [`Subscription::cancel`]
/// or when the handle is dropped, so a recurring callback cannot outlive
/// its owner.
#[derive(Debug)]
pub struct Subscription {
    cancel: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Subscription {
    /// Spawns `task` on the current runtime. The task should return once
    /// the `Cancelled` future resolves.
    pub fn spawn<F, Fut>(task: F) -> Self
    where
        F: FnOnce(Cancelled) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let handle = tokio::spawn(task(rx));

        Self {
            cancel: Some(tx),
            handle: Some(handle),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle
            .as_ref()
            .map(|handle| handle.is_finished())
            .unwrap_or(true)
    }

    /// Signals the task and waits for it to wind down.
    pub async fn cancel(mut self) {
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
        }

        if let Some(handle) = self.handle.take() {
            if let Err(err) = handle.await {
                if !err.is_cancelled() {
                    tracing::error!("subscription task failed: {:?}", err);
                }
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
        }

        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

#[test]
fn cancel_stops_recurring_task() {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    tokio_test::block_on(async {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = ticks.clone();

        let subscription = Subscription::spawn(move |mut cancelled| async move {
            let mut interval = tokio::time::interval(Duration::from_millis(5));
            loop {
                tokio::select! {
                    _ = &mut cancelled => break,
                    _ = interval.tick() => {
                        counter.fetch_add(1, Ordering::SeqCst);
                    }
                }
            }
        });

        tokio::time::sleep(Duration::from_millis(30)).await;
        subscription.cancel().await;

        let after_cancel = ticks.load(Ordering::SeqCst);
        assert!(after_cancel > 0);

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), after_cancel);
    });
}

#[test]
fn drop_releases_task() {
    use std::time::Duration;

    tokio_test::block_on(async {
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();

        let subscription = Subscription::spawn(move |cancelled| async move {
            let _ = cancelled.await;
            let _ = tx.send(());
        });
        drop(subscription);

        let signalled = tokio::time::timeout(Duration::from_millis(200), rx).await;
        // either the task observed cancellation or it was aborted, which drops `tx`
        assert!(signalled.is_ok());
    });
}
