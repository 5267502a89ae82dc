#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use photosync_core::{
    ExtractorError, ManifestExtractor, ProviderError, StorageObject, StorageProvider,
    key_extension,
};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use super::action::{
    ActionSnapshots, DataSyncAction, DataSyncResult, ResolutionStrategy, SyncActionType,
    SyncSummary,
};
use super::diff::classify;
use super::progress::{NullProgress, ProgressSink, RunTotals, StageStatus, SyncEvent, SyncStage};
use super::snapshot::Snapshot;
use super::store::{AssetStore, AssetUpsert, ConflictPayload, StoreError, SyncStatus};

const PHOTO_EXTENSIONS: [&str; 7] = ["jpg", "jpeg", "png", "gif", "webp", "heic", "heif"];
const VIDEO_EXTENSIONS: [&str; 3] = ["mov", "mp4", "m4v"];

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),
    #[error("time format error: {0}")]
    TimeFormat(#[from] time::error::Format),
    #[error("conflict {0} not found")]
    ConflictNotFound(i64),
    #[error("record {id} is not in conflict (status: {status})")]
    NotInConflict { id: i64, status: String },
    #[error("conflict {0} has no stored payload")]
    MissingConflictPayload(i64),
    #[error("object no longer exists in storage: {0}")]
    ObjectVanished(String),
    #[error("metadata extraction failed for {key}: {source}")]
    Extraction { key: String, source: ExtractorError },
}

#[derive(Clone, Default)]
pub struct RunOptions {
    pub dry_run: bool,
    pub cancel: CancellationToken,
}

pub struct SyncEngine {
    store: AssetStore,
    provider: Arc<dyn StorageProvider>,
    extractor: Arc<dyn ManifestExtractor>,
}

impl SyncEngine {
    pub fn new(
        store: AssetStore,
        provider: Arc<dyn StorageProvider>,
        extractor: Arc<dyn ManifestExtractor>,
    ) -> Self {
        Self {
            store,
            provider,
            extractor,
        }
    }

    pub async fn run(
        &self,
        tenant_id: &str,
        options: &RunOptions,
    ) -> Result<DataSyncResult, EngineError> {
        self.run_with_progress(tenant_id, options, &NullProgress)
            .await
    }

    pub async fn run_with_progress(
        &self,
        tenant_id: &str,
        options: &RunOptions,
        progress: &dyn ProgressSink,
    ) -> Result<DataSyncResult, EngineError> {
        match self.run_inner(tenant_id, options, progress).await {
            Ok(result) => {
                progress.emit(&SyncEvent::Complete {
                    result: result.clone(),
                });
                Ok(result)
            }
            Err(err) => {
                progress.emit(&SyncEvent::Error {
                    message: err.to_string(),
                });
                Err(err)
            }
        }
    }

    async fn run_inner(
        &self,
        tenant_id: &str,
        options: &RunOptions,
        progress: &dyn ProgressSink,
    ) -> Result<DataSyncResult, EngineError> {
        tracing::info!(
            tenant_id = %tenant_id,
            provider = self.provider.name(),
            dry_run = options.dry_run,
            "starting reconciliation run"
        );

        let objects = self.provider.list_objects().await?;
        let records = self.store.list_by_tenant(tenant_id).await?;
        let diff = classify(&objects, &records)?;

        let mut summary = SyncSummary {
            storage_objects: objects.len(),
            database_records: records.len(),
            skipped: diff.matched,
            ..Default::default()
        };
        let totals = RunTotals {
            missing_in_db: diff.missing_in_db.len(),
            orphan_in_db: diff.orphan_in_db.len(),
            conflict_candidates: diff.conflict_candidates.len(),
            status_reconciliations: diff.status_reconciliations.len(),
        };
        progress.emit(&SyncEvent::Start {
            summary,
            totals,
            dry_run: options.dry_run,
        });

        let mut actions: Vec<DataSyncAction> = Vec::new();

        if !diff.missing_in_db.is_empty() {
            let total = diff.missing_in_db.len();
            progress.emit(&SyncEvent::Stage {
                stage: SyncStage::Insert,
                status: StageStatus::Start,
                processed: 0,
                total,
                summary,
            });
            // The companion listing is taken at most once per run, and never
            // under dry-run.
            let mut companions: Option<HashMap<String, StorageObject>> = None;
            for (index, object) in diff.missing_in_db.iter().enumerate() {
                if options.cancel.is_cancelled() {
                    tracing::info!(
                        tenant_id = %tenant_id,
                        actions = actions.len(),
                        "cancellation requested, returning partial result"
                    );
                    return Ok(DataSyncResult { summary, actions });
                }

                let action = if options.dry_run {
                    summary.inserted += 1;
                    DataSyncAction {
                        kind: SyncActionType::Insert,
                        storage_key: object.key.clone(),
                        photo_id: Some(photo_id_for_key(&object.key)),
                        applied: false,
                        reason: None,
                        resolution: None,
                        snapshots: ActionSnapshots {
                            before: None,
                            after: Some(Snapshot::from_object(object)?),
                        },
                    }
                } else {
                    if companions.is_none() {
                        companions = Some(companion_map(&self.provider.list_objects().await?));
                    }
                    let companion = companions
                        .as_ref()
                        .and_then(|map| companion_for(&object.key, map));
                    self.insert_object(tenant_id, object, companion, &mut summary)
                        .await?
                };
                progress.emit(&SyncEvent::Action {
                    stage: SyncStage::Insert,
                    index,
                    total,
                    action: action.clone(),
                    summary,
                });
                actions.push(action);
            }
            progress.emit(&SyncEvent::Stage {
                stage: SyncStage::Insert,
                status: StageStatus::Complete,
                processed: total,
                total,
                summary,
            });
        }

        if !diff.orphan_in_db.is_empty() {
            let total = diff.orphan_in_db.len();
            progress.emit(&SyncEvent::Stage {
                stage: SyncStage::Orphan,
                status: StageStatus::Start,
                processed: 0,
                total,
                summary,
            });
            for (index, record) in diff.orphan_in_db.iter().enumerate() {
                if options.cancel.is_cancelled() {
                    return Ok(DataSyncResult { summary, actions });
                }

                let payload = ConflictPayload::MissingInStorage {
                    record_snapshot: record.snapshot(),
                };
                if !options.dry_run {
                    self.store
                        .mark_conflict(tenant_id, record.id, &payload)
                        .await?;
                }
                summary.conflicts += 1;
                let action = DataSyncAction {
                    kind: SyncActionType::Conflict,
                    storage_key: record.storage_key.clone(),
                    photo_id: Some(record.photo_id.clone()),
                    applied: !options.dry_run,
                    reason: Some(payload.reason().to_string()),
                    resolution: None,
                    snapshots: ActionSnapshots {
                        before: Some(record.snapshot()),
                        after: None,
                    },
                };
                progress.emit(&SyncEvent::Action {
                    stage: SyncStage::Orphan,
                    index,
                    total,
                    action: action.clone(),
                    summary,
                });
                actions.push(action);
            }
            progress.emit(&SyncEvent::Stage {
                stage: SyncStage::Orphan,
                status: StageStatus::Complete,
                processed: total,
                total,
                summary,
            });
        }

        if !diff.conflict_candidates.is_empty() {
            let total = diff.conflict_candidates.len();
            progress.emit(&SyncEvent::Stage {
                stage: SyncStage::MetadataConflict,
                status: StageStatus::Start,
                processed: 0,
                total,
                summary,
            });
            for (index, candidate) in diff.conflict_candidates.iter().enumerate() {
                if options.cancel.is_cancelled() {
                    return Ok(DataSyncResult { summary, actions });
                }

                let payload = ConflictPayload::MetadataMismatch {
                    storage_snapshot: candidate.storage_snapshot.clone(),
                    record_snapshot: candidate.record_snapshot.clone(),
                };
                if !options.dry_run {
                    self.store
                        .mark_conflict(tenant_id, candidate.record.id, &payload)
                        .await?;
                }
                summary.conflicts += 1;
                let action = DataSyncAction {
                    kind: SyncActionType::Conflict,
                    storage_key: candidate.record.storage_key.clone(),
                    photo_id: Some(candidate.record.photo_id.clone()),
                    applied: !options.dry_run,
                    reason: Some(payload.reason().to_string()),
                    resolution: None,
                    snapshots: ActionSnapshots {
                        before: Some(candidate.record_snapshot.clone()),
                        after: Some(candidate.storage_snapshot.clone()),
                    },
                };
                progress.emit(&SyncEvent::Action {
                    stage: SyncStage::MetadataConflict,
                    index,
                    total,
                    action: action.clone(),
                    summary,
                });
                actions.push(action);
            }
            progress.emit(&SyncEvent::Stage {
                stage: SyncStage::MetadataConflict,
                status: StageStatus::Complete,
                processed: total,
                total,
                summary,
            });
        }

        if !diff.status_reconciliations.is_empty() {
            let total = diff.status_reconciliations.len();
            progress.emit(&SyncEvent::Stage {
                stage: SyncStage::StatusReconciliation,
                status: StageStatus::Start,
                processed: 0,
                total,
                summary,
            });
            for (index, item) in diff.status_reconciliations.iter().enumerate() {
                if options.cancel.is_cancelled() {
                    return Ok(DataSyncResult { summary, actions });
                }

                if !options.dry_run {
                    self.store
                        .mark_synced(tenant_id, item.record.id, &item.storage_snapshot)
                        .await?;
                }
                summary.updated += 1;
                let action = DataSyncAction {
                    kind: SyncActionType::Update,
                    storage_key: item.record.storage_key.clone(),
                    photo_id: Some(item.record.photo_id.clone()),
                    applied: !options.dry_run,
                    reason: None,
                    resolution: None,
                    snapshots: ActionSnapshots {
                        before: Some(item.record.snapshot()),
                        after: Some(item.storage_snapshot.clone()),
                    },
                };
                progress.emit(&SyncEvent::Action {
                    stage: SyncStage::StatusReconciliation,
                    index,
                    total,
                    action: action.clone(),
                    summary,
                });
                actions.push(action);
            }
            progress.emit(&SyncEvent::Stage {
                stage: SyncStage::StatusReconciliation,
                status: StageStatus::Complete,
                processed: total,
                total,
                summary,
            });
        }

        tracing::info!(
            tenant_id = %tenant_id,
            inserted = summary.inserted,
            updated = summary.updated,
            conflicts = summary.conflicts,
            skipped = summary.skipped,
            "reconciliation run finished"
        );
        Ok(DataSyncResult { summary, actions })
    }

    async fn insert_object(
        &self,
        tenant_id: &str,
        object: &StorageObject,
        companion: Option<&StorageObject>,
        summary: &mut SyncSummary,
    ) -> Result<DataSyncAction, EngineError> {
        let storage_snapshot = Snapshot::from_object(object)?;
        match self
            .extractor
            .extract(object, companion, self.provider.as_ref())
            .await
        {
            Ok(manifest) => {
                let record = self
                    .store
                    .upsert(&AssetUpsert {
                        tenant_id: tenant_id.to_string(),
                        photo_id: photo_id_for_key(&object.key),
                        storage_key: object.key.clone(),
                        storage_provider: self.provider.name().to_string(),
                        size: storage_snapshot.size,
                        etag: storage_snapshot.etag.clone(),
                        last_modified: storage_snapshot.last_modified.clone(),
                        metadata_hash: storage_snapshot.metadata_hash.clone(),
                        manifest_version: Some(manifest.version),
                        manifest: Some(manifest.data),
                    })
                    .await?;
                summary.inserted += 1;
                Ok(DataSyncAction {
                    kind: SyncActionType::Insert,
                    storage_key: object.key.clone(),
                    photo_id: Some(record.photo_id),
                    applied: true,
                    reason: None,
                    resolution: None,
                    snapshots: ActionSnapshots {
                        before: None,
                        after: Some(storage_snapshot),
                    },
                })
            }
            // One bad object must not block the rest of the batch.
            Err(err) => {
                tracing::warn!(
                    tenant_id = %tenant_id,
                    key = %object.key,
                    error = %err,
                    "metadata extraction failed, continuing"
                );
                summary.conflicts += 1;
                Ok(DataSyncAction {
                    kind: SyncActionType::Conflict,
                    storage_key: object.key.clone(),
                    photo_id: Some(photo_id_for_key(&object.key)),
                    applied: false,
                    reason: Some(format!("metadata extraction failed: {err}")),
                    resolution: None,
                    snapshots: ActionSnapshots {
                        before: None,
                        after: Some(storage_snapshot),
                    },
                })
            }
        }
    }
}

fn photo_id_for_key(key: &str) -> String {
    let name = key.rsplit('/').next().unwrap_or(key);
    match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem.to_string(),
        _ => name.to_string(),
    }
}

fn key_stem(key: &str) -> String {
    let (dir, name) = match key.rsplit_once('/') {
        Some((dir, name)) => (Some(dir), name),
        None => (None, key),
    };
    let stem = match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => name,
    };
    match dir {
        Some(dir) => format!("{dir}/{stem}"),
        None => stem.to_string(),
    }
}

fn has_extension_in(key: &str, extensions: &[&str]) -> bool {
    key_extension(key).is_some_and(|ext| extensions.contains(&ext.as_str()))
}

fn companion_map(objects: &[StorageObject]) -> HashMap<String, StorageObject> {
    let mut map = HashMap::new();
    for object in objects {
        if has_extension_in(&object.key, &VIDEO_EXTENSIONS) {
            map.insert(key_stem(&object.key), object.clone());
        }
    }
    map
}

fn companion_for<'a>(
    key: &str,
    companions: &'a HashMap<String, StorageObject>,
) -> Option<&'a StorageObject> {
    if !has_extension_in(key, &PHOTO_EXTENSIONS) {
        return None;
    }
    companions.get(&key_stem(key))
}

include!("engine_resolve.rs");

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
