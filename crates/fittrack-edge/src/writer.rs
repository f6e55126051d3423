//! Background write queue
//!
//! Cache writes computed after a response are fire-and-forget: they are
//! handed to a bounded queue drained by a single worker task, in submission
//! order. The response path never waits on them. When the queue is full the
//! write is dropped. `shutdown` closes the queue and waits until every
//! accepted write has completed.

use parking_lot::Mutex;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

type WriteTask = Pin<Box<dyn Future<Output = ()> + Send>>;

enum Job {
    Write(&'static str, WriteTask),
    Flush(oneshot::Sender<()>),
}

/// Bounded fire-and-forget task queue
pub struct BackgroundWriter {
    tx: Mutex<Option<mpsc::Sender<Job>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    accepted: AtomicU64,
    dropped: AtomicU64,
}

impl BackgroundWriter {
    /// Start the worker; must be called inside a tokio runtime
    pub fn new(capacity: usize) -> Self {
        let (tx, mut rx) = mpsc::channel::<Job>(capacity.max(1));

        let worker = tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                match job {
                    Job::Write(name, task) => {
                        task.await;
                        tracing::trace!(write = name, "background write done");
                    }
                    Job::Flush(done) => {
                        let _ = done.send(());
                    }
                }
            }
        });

        Self {
            tx: Mutex::new(Some(tx)),
            worker: Mutex::new(Some(worker)),
            accepted: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    /// Queue a write without waiting; returns false if it was dropped
    pub fn submit<F>(&self, name: &'static str, task: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let Some(tx) = self.tx.lock().clone() else {
            tracing::warn!(write = name, "write queue closed, dropping write");
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return false;
        };

        match tx.try_send(Job::Write(name, Box::pin(task))) {
            Ok(()) => {
                self.accepted.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(write = name, "write queue full, dropping write");
                self.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::warn!(write = name, "write queue closed, dropping write");
                self.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Wait until every write queued so far has completed
    pub async fn flush(&self) {
        let Some(tx) = self.tx.lock().clone() else {
            return;
        };
        let (done_tx, done_rx) = oneshot::channel();
        if tx.send(Job::Flush(done_tx)).await.is_ok() {
            let _ = done_rx.await;
        }
    }

    /// Close the queue and drain it
    pub async fn shutdown(&self) {
        drop(self.tx.lock().take());
        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                tracing::error!("write worker failed: {}", e);
            }
        }
        tracing::info!(
            accepted = self.accepted(),
            dropped = self.dropped(),
            "background writer drained"
        );
    }

    /// Writes accepted into the queue
    pub fn accepted(&self) -> u64 {
        self.accepted.load(Ordering::Relaxed)
    }

    /// Writes dropped because the queue was full or closed
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_flush_waits_for_writes() {
        let writer = BackgroundWriter::new(8);
        let hits = Arc::new(AtomicU64::new(0));

        for _ in 0..5 {
            let hits = hits.clone();
            assert!(writer.submit("test", async move {
                tokio::time::sleep(Duration::from_millis(5)).await;
                hits.fetch_add(1, Ordering::SeqCst);
            }));
        }

        writer.flush().await;
        assert_eq!(hits.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_full_queue_drops() {
        let writer = BackgroundWriter::new(1);
        let (release_tx, release_rx) = oneshot::channel::<()>();

        // Occupies the worker until released
        assert!(writer.submit("blocker", async move {
            let _ = release_rx.await;
        }));
        // Give the worker a chance to pick the blocker up
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(writer.submit("queued", async {}));
        assert!(!writer.submit("overflow", async {}));
        assert_eq!(writer.dropped(), 1);

        let _ = release_tx.send(());
        writer.flush().await;
    }

    #[tokio::test]
    async fn test_shutdown_drains_then_rejects() {
        let writer = BackgroundWriter::new(8);
        let hits = Arc::new(AtomicU64::new(0));

        let h = hits.clone();
        writer.submit("before", async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            h.fetch_add(1, Ordering::SeqCst);
        });

        writer.shutdown().await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        assert!(!writer.submit("after", async {}));
        writer.flush().await;
        assert_eq!(writer.accepted(), 1);
        assert_eq!(writer.dropped(), 1);
    }
}
