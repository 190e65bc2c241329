use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::{Delivery, Notifier};

/// Outcome counts of one queue's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Producer side of the delivery queue. Enqueueing never blocks.
///
/// The queue closes once every clone has been dropped.
#[derive(Clone)]
pub struct DeliveryQueue {
    tx: mpsc::UnboundedSender<Delivery>,
}

/// Handle on the task draining a [`DeliveryQueue`].
pub struct DeliveryWorker {
    handle: JoinHandle<DeliveryReport>,
}

impl DeliveryQueue {
    /// Spawn a drain task sending up to `concurrency` notifications at once.
    pub fn start(notifier: Arc<dyn Notifier>, concurrency: usize) -> (Self, DeliveryWorker) {
        let (tx, rx) = mpsc::unbounded_channel::<Delivery>();
        let concurrency = concurrency.max(1);

        let handle = tokio::spawn(async move {
            stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|d| (d, rx)) })
                .map(|delivery| {
                    let notifier = notifier.clone();
                    async move {
                        let result = delivery.send(notifier.as_ref()).await;
                        (delivery, result)
                    }
                })
                .buffer_unordered(concurrency)
                .fold(DeliveryReport::default(), |mut report, (delivery, result)| async move {
                    match result {
                        Ok(()) => {
                            tracing::debug!("Delivered {} item to {}", delivery.source, delivery.recipient);
                            report.delivered += 1;
                        }
                        Err(e) => {
                            tracing::warn!(
                                "Failed to deliver {} item to {}: {}",
                                delivery.source,
                                delivery.recipient,
                                e
                            );
                            report.failed += 1;
                        }
                    }
                    report
                })
                .await
        });

        (Self { tx }, DeliveryWorker { handle })
    }

    /// Returns false if the worker is gone and the delivery was dropped.
    pub fn enqueue(&self, delivery: Delivery) -> bool {
        match self.tx.send(delivery) {
            Ok(()) => true,
            Err(mpsc::error::SendError(delivery)) => {
                tracing::error!("Delivery queue closed, dropping message for {}", delivery.recipient);
                false
            }
        }
    }
}

impl DeliveryWorker {
    /// Wait for the queue to drain. Only completes after every
    /// [`DeliveryQueue`] clone has been dropped.
    pub async fn finish(self) -> DeliveryReport {
        match self.handle.await {
            Ok(report) => report,
            Err(e) => {
                tracing::error!("Delivery worker failed: {}", e);
                DeliveryReport::default()
            }
        }
    }
}
