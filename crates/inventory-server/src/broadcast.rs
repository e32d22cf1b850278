use std::time::Duration;

use inventory_core::model::TransactionId;
use tokio::sync::broadcast;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BroadcastError {
    #[error("no listeners for replication signal")]
    NoListeners,

    #[error("timed out waiting for transaction {0} to replicate")]
    Timeout(String),

    #[error("replication broadcast closed")]
    Closed,
}

/// In-process notification that a transaction's changes reached the
/// relations backend.
#[derive(Debug, Clone)]
pub struct ReplicationBroadcast {
    sender: broadcast::Sender<TransactionId>,
}

impl ReplicationBroadcast {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Returns the number of listeners notified.
    pub fn signal(&self, tx_id: &TransactionId) -> Result<usize, BroadcastError> {
        self.sender
            .send(tx_id.clone())
            .map_err(|_| BroadcastError::NoListeners)
    }

    /// Listeners only observe signals sent after they subscribed, so writers
    /// subscribe before committing.
    pub fn listen(&self) -> ReplicationListener {
        ReplicationListener {
            receiver: self.sender.subscribe(),
        }
    }

    pub fn listener_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[derive(Debug)]
pub struct ReplicationListener {
    receiver: broadcast::Receiver<TransactionId>,
}

impl ReplicationListener {
    pub async fn wait_for(
        mut self,
        tx_id: &TransactionId,
        timeout: Duration,
    ) -> Result<(), BroadcastError> {
        let wait = async {
            loop {
                match self.receiver.recv().await {
                    Ok(signalled) if signalled == *tx_id => return Ok(()),
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "replication listener lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => return Err(BroadcastError::Closed),
                }
            }
        };

        tokio::time::timeout(timeout, wait)
            .await
            .map_err(|_| BroadcastError::Timeout(tx_id.to_string()))?
    }
}
