use inventory_core::consistency::ConsistencyToken;
use inventory_core::model::{ReporterResourceKey, ResourceId, TransactionId};

pub fn audit_tuples_replicated(
    key: &ReporterResourceKey,
    tx_id: &TransactionId,
    create_count: usize,
    delete_count: usize,
    token: &ConsistencyToken,
) {
    tracing::info!(
        target: "audit",
        event = "tuples_replicated",
        key = %key,
        tx_id = %tx_id,
        create_count = create_count,
        delete_count = delete_count,
        consistency_token = token.as_str(),
        "relation tuples replicated"
    );
}

/// The lock token itself is a credential and is never logged.
pub fn audit_lock_acquired(lock_id: &str) {
    tracing::info!(
        target: "audit",
        event = "lock_acquired",
        lock_id = lock_id,
        "fencing lock acquired"
    );
}

pub fn audit_fencing_failed(lock_id: &str, key: &ReporterResourceKey, tx_id: &TransactionId) {
    tracing::warn!(
        target: "audit",
        event = "fencing_failed",
        lock_id = lock_id,
        key = %key,
        tx_id = %tx_id,
        "write rejected by fencing check"
    );
}

pub fn audit_consistency_token_persisted(
    resource_id: &ResourceId,
    key: &ReporterResourceKey,
    token: &ConsistencyToken,
) {
    tracing::info!(
        target: "audit",
        event = "consistency_token_persisted",
        resource_id = %resource_id,
        key = %key,
        consistency_token = token.as_str(),
        "consistency token persisted"
    );
}
