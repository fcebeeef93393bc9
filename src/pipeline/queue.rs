//! Unbounded multi-consumer work queues with in-flight accounting.
//!
//! tokio's mpsc receiver has a single owner; consumers share it through an
//! async mutex. Each queue counts items enqueued and items acknowledged by a
//! consumer, so the orchestrator can tell whether anything was left in
//! flight once the stage has been joined.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};

#[derive(Debug)]
pub struct QueueStats {
    name: &'static str,
    enqueued: AtomicUsize,
    acknowledged: AtomicUsize,
}

impl QueueStats {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn enqueued(&self) -> usize {
        self.enqueued.load(Ordering::SeqCst)
    }

    pub fn acknowledged(&self) -> usize {
        self.acknowledged.load(Ordering::SeqCst)
    }

    /// Items sent but not yet acknowledged.
    pub fn in_flight(&self) -> usize {
        self.enqueued().saturating_sub(self.acknowledged())
    }
}

pub struct QueueSender<T> {
    tx: mpsc::UnboundedSender<T>,
    stats: Arc<QueueStats>,
}

impl<T> Clone for QueueSender<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            stats: Arc::clone(&self.stats),
        }
    }
}

impl<T> QueueSender<T> {
    /// Enqueue an item. Fails, handing the item back, once every receiver
    /// is gone.
    pub fn send(&self, item: T) -> Result<(), T> {
        // Count before sending so a fast consumer never acknowledges an item
        // that is not counted yet.
        self.stats.enqueued.fetch_add(1, Ordering::SeqCst);
        self.tx.send(item).map_err(|e| {
            self.stats.enqueued.fetch_sub(1, Ordering::SeqCst);
            e.0
        })
    }
}

pub struct QueueReceiver<T> {
    rx: Arc<Mutex<mpsc::UnboundedReceiver<T>>>,
    stats: Arc<QueueStats>,
}

impl<T> Clone for QueueReceiver<T> {
    fn clone(&self) -> Self {
        Self {
            rx: Arc::clone(&self.rx),
            stats: Arc::clone(&self.stats),
        }
    }
}

impl<T> QueueReceiver<T> {
    /// Next item, or `None` once all senders are dropped and the queue is
    /// drained.
    pub async fn recv(&self) -> Option<T> {
        self.rx.lock().await.recv().await
    }

    /// Mark one received item as fully processed.
    pub fn ack(&self) {
        self.stats.acknowledged.fetch_add(1, Ordering::SeqCst);
    }

    pub fn stats(&self) -> Arc<QueueStats> {
        Arc::clone(&self.stats)
    }
}

pub fn work_queue<T>(name: &'static str) -> (QueueSender<T>, QueueReceiver<T>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let stats = Arc::new(QueueStats {
        name,
        enqueued: AtomicUsize::new(0),
        acknowledged: AtomicUsize::new(0),
    });
    (
        QueueSender {
            tx,
            stats: Arc::clone(&stats),
        },
        QueueReceiver {
            rx: Arc::new(Mutex::new(rx)),
            stats,
        },
    )
}
