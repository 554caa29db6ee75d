//! Per-connection replay of dataset rows

use crate::dataset::RowSource;
use crate::types::events::{ReplayOutcome, RowEvent};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Spawns one producer task per stream connection.
///
/// Each producer starts at row zero, sends one [`RowEvent`] per row and waits
/// `interval` between rows. It stops early once the receiving side is gone.
#[derive(Clone)]
pub struct ReplayProducer {
    source: Arc<dyn RowSource>,
    interval: Duration,
}

pub struct ReplayHandle {
    pub receiver: mpsc::Receiver<RowEvent>,
    pub task: JoinHandle<ReplayOutcome>,
}

impl ReplayProducer {
    pub fn new(source: Arc<dyn RowSource>, interval: Duration) -> Self {
        Self { source, interval }
    }

    pub fn spawn(&self, connection_id: Uuid) -> ReplayHandle {
        // Capacity 1: a row is produced only once the previous one was taken.
        let (sender, receiver) = mpsc::channel(1);
        let source = self.source.clone();
        let interval = self.interval;

        let task = tokio::spawn(async move {
            tracing::info!("📡 Replay started for connection {} ({} rows)", connection_id, source.len());
            let outcome = replay(source.as_ref(), interval, sender).await;
            match outcome {
                ReplayOutcome::Completed { sent } => {
                    tracing::info!("✅ Replay complete for connection {} after {} rows", connection_id, sent)
                }
                ReplayOutcome::Disconnected { sent } => {
                    tracing::info!("🔌 Connection {} closed after {} rows", connection_id, sent)
                }
            }
            outcome
        });

        ReplayHandle { receiver, task }
    }
}

async fn replay(
    source: &dyn RowSource,
    interval: Duration,
    sender: mpsc::Sender<RowEvent>,
) -> ReplayOutcome {
    let total = source.len();

    for index in 0..total {
        let Some(row) = source.row(index) else {
            return ReplayOutcome::Completed { sent: index };
        };
        let data = match serde_json::to_string(row) {
            Ok(data) => data,
            Err(e) => {
                tracing::error!("Row {} could not be serialized, skipping: {}", index, e);
                continue;
            }
        };

        tracing::debug!("Sending row {}/{}", index + 1, total);
        if sender.send(RowEvent::new(index, data)).await.is_err() {
            return ReplayOutcome::Disconnected { sent: index };
        }

        if index + 1 < total {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = sender.closed() => return ReplayOutcome::Disconnected { sent: index + 1 },
            }
        }
    }

    ReplayOutcome::Completed { sent: total }
}
