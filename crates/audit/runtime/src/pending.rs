//! Pending receipt queue and the background batch roller

use std::sync::Arc;

use maple_audit_batch::{BatchEngine, BatchError, SignedRoot};
use maple_audit_types::ReceiptId;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};

/// Receipts awaiting a batch, in generation order.
///
/// Reaching `max_leaves` closes a batch immediately; [`PendingReceipts::flush`]
/// closes whatever is queued.
#[derive(Clone)]
pub struct PendingReceipts {
    engine: BatchEngine,
    max_leaves: usize,
    queue: Arc<Mutex<Vec<ReceiptId>>>,
}

impl PendingReceipts {
    pub fn new(engine: BatchEngine, max_leaves: usize) -> Self {
        Self {
            engine,
            max_leaves: max_leaves.max(1),
            queue: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub async fn len(&self) -> usize {
        self.queue.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.queue.lock().await.is_empty()
    }

    /// Queue `receipt_id`; closes a batch when the queue is full.
    pub async fn push(&self, receipt_id: ReceiptId) -> Result<Option<SignedRoot>, BatchError> {
        let mut queue = self.queue.lock().await;
        queue.push(receipt_id);
        if queue.len() < self.max_leaves {
            return Ok(None);
        }
        self.close(&mut queue).await
    }

    /// Close every queued receipt into one batch.
    pub async fn flush(&self) -> Result<Option<SignedRoot>, BatchError> {
        let mut queue = self.queue.lock().await;
        self.close(&mut queue).await
    }

    async fn close(&self, queue: &mut Vec<ReceiptId>) -> Result<Option<SignedRoot>, BatchError> {
        loop {
            if queue.is_empty() {
                return Ok(None);
            }
            match self.engine.close_batch(queue.as_slice()).await {
                Ok(root) => {
                    queue.clear();
                    return Ok(Some(root));
                }
                // Batched explicitly since it was queued: drop it and retry.
                Err(BatchError::AlreadyBatched {
                    receipt_id,
                    batch_id,
                }) => {
                    tracing::debug!(
                        receipt_id = %receipt_id,
                        batch_id = %batch_id,
                        "Dropping already batched receipt from queue"
                    );
                    queue.retain(|id| *id != receipt_id);
                }
                // Its claim can never be completed or taken over.
                Err(BatchError::IncompleteBatch {
                    receipt_id,
                    batch_id,
                }) => {
                    tracing::warn!(
                        receipt_id = %receipt_id,
                        batch_id = %batch_id,
                        "Dropping receipt with an incomplete batch claim from queue"
                    );
                    queue.retain(|id| *id != receipt_id);
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl std::fmt::Debug for PendingReceipts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingReceipts")
            .field("max_leaves", &self.max_leaves)
            .finish_non_exhaustive()
    }
}

/// Background task flushing [`PendingReceipts`] on a fixed interval.
pub struct BatchRoller {
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl BatchRoller {
    /// Spawn the roller. Must be called from within a tokio runtime.
    pub fn spawn(pending: PendingReceipts, every: Duration) -> Self {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let mut ticker = interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;

            tracing::info!(interval_secs = every.as_secs(), "Batch roller started");
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match pending.flush().await {
                            Ok(Some(root)) => tracing::debug!(
                                batch_id = %root.batch_id,
                                leaf_count = root.leaf_count,
                                "Rolled pending receipts into a batch"
                            ),
                            Ok(None) => {}
                            Err(e) => tracing::error!(error = %e, "Batch roll failed"),
                        }
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            tracing::info!("Batch roller stopped");
        });

        Self {
            shutdown_tx,
            handle,
        }
    }

    /// Signal the task and wait for it to finish its current roll.
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.handle.await {
            tracing::warn!(error = %e, "Batch roller task ended abnormally");
        }
    }
}

impl std::fmt::Debug for BatchRoller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchRoller")
            .field("finished", &self.handle.is_finished())
            .finish()
    }
}
