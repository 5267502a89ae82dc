use std::collections::{HashMap, HashSet};

use photosync_core::StorageObject;

use super::snapshot::{Snapshot, hashes_match};
use super::store::{AssetRecord, SyncStatus};

#[derive(Debug, Clone)]
pub struct ConflictCandidate {
    pub object: StorageObject,
    pub record: AssetRecord,
    pub storage_snapshot: Snapshot,
    pub record_snapshot: Snapshot,
}

#[derive(Debug, Clone)]
pub struct StatusReconciliation {
    pub object: StorageObject,
    pub record: AssetRecord,
    pub storage_snapshot: Snapshot,
}

#[derive(Debug, Default)]
pub struct DiffResult {
    pub missing_in_db: Vec<StorageObject>,
    pub orphan_in_db: Vec<AssetRecord>,
    pub conflict_candidates: Vec<ConflictCandidate>,
    pub status_reconciliations: Vec<StatusReconciliation>,
    /// Keys present on both sides with matching hashes and a `synced` record.
    pub matched: usize,
}

/// Partitions the full listing against the full record set. Storage-side
/// buckets keep listing order, record-side buckets keep record-set order.
/// Records marked database-only are exempt from the orphan check but still
/// compared by hash when their key is present.
pub fn classify(
    objects: &[StorageObject],
    records: &[AssetRecord],
) -> Result<DiffResult, time::error::Format> {
    let by_key: HashMap<&str, &AssetRecord> = records
        .iter()
        .map(|record| (record.storage_key.as_str(), record))
        .collect();
    let object_keys: HashSet<&str> = objects.iter().map(|object| object.key.as_str()).collect();

    let mut result = DiffResult::default();

    for object in objects {
        let Some(record) = by_key.get(object.key.as_str()) else {
            result.missing_in_db.push(object.clone());
            continue;
        };

        let storage_snapshot = Snapshot::from_object(object)?;
        let record_snapshot = record.snapshot();
        let storage_hash = storage_snapshot.metadata_hash.as_deref();
        let record_hash = record_snapshot.metadata_hash.as_deref();
        if storage_hash.is_some() != record_hash.is_some() {
            tracing::debug!(
                key = %object.key,
                "one side has no comparable metadata, treating as matching"
            );
        }

        if !hashes_match(storage_hash, record_hash) {
            result.conflict_candidates.push(ConflictCandidate {
                object: object.clone(),
                record: (*record).clone(),
                storage_snapshot,
                record_snapshot,
            });
        } else if record.sync_status != SyncStatus::Synced {
            result.status_reconciliations.push(StatusReconciliation {
                object: object.clone(),
                record: (*record).clone(),
                storage_snapshot,
            });
        } else {
            result.matched += 1;
        }
    }

    for record in records {
        if record.is_database_only() {
            continue;
        }
        if !object_keys.contains(record.storage_key.as_str()) {
            result.orphan_in_db.push(record.clone());
        }
    }

    Ok(result)
}
