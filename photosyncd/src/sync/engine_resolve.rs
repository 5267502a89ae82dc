impl SyncEngine {
    /// Applies an operator-chosen strategy to one flagged conflict. The
    /// record must exist and still be in conflict; the status check doubles
    /// as an optimistic guard against concurrent resolution.
    pub async fn resolve_conflict(
        &self,
        tenant_id: &str,
        conflict_id: i64,
        strategy: ResolutionStrategy,
        dry_run: bool,
    ) -> Result<DataSyncAction, EngineError> {
        let record = self
            .store
            .get_by_id(tenant_id, conflict_id)
            .await?
            .ok_or(EngineError::ConflictNotFound(conflict_id))?;
        if record.sync_status != SyncStatus::Conflict {
            return Err(EngineError::NotInConflict {
                id: conflict_id,
                status: record.sync_status.to_string(),
            });
        }
        let payload = record
            .conflict_payload
            .clone()
            .ok_or(EngineError::MissingConflictPayload(conflict_id))?;

        tracing::info!(
            tenant_id = %tenant_id,
            conflict_id,
            strategy = strategy.as_str(),
            reason = payload.reason(),
            dry_run,
            "resolving conflict"
        );

        match (strategy, payload) {
            // Storage is authoritative and has nothing, so the record goes.
            (
                ResolutionStrategy::PreferStorage,
                ConflictPayload::MissingInStorage { record_snapshot },
            ) => {
                if !dry_run {
                    self.store.delete_by_id(tenant_id, record.id).await?;
                }
                Ok(DataSyncAction {
                    kind: SyncActionType::Delete,
                    storage_key: record.storage_key,
                    photo_id: Some(record.photo_id),
                    applied: !dry_run,
                    reason: Some("missing-in-storage".to_string()),
                    resolution: Some(strategy),
                    snapshots: ActionSnapshots {
                        before: Some(record_snapshot),
                        after: None,
                    },
                })
            }
            // Re-run the insert path against the live object. Extraction
            // failures are not downgraded here: the operator asked for
            // storage's version and must hear that it cannot be produced.
            (
                ResolutionStrategy::PreferStorage,
                ConflictPayload::MetadataMismatch {
                    storage_snapshot,
                    record_snapshot,
                },
            ) => {
                if dry_run {
                    return Ok(DataSyncAction {
                        kind: SyncActionType::Update,
                        storage_key: record.storage_key,
                        photo_id: Some(record.photo_id),
                        applied: false,
                        reason: Some("metadata-mismatch".to_string()),
                        resolution: Some(strategy),
                        snapshots: ActionSnapshots {
                            before: Some(record_snapshot),
                            after: Some(storage_snapshot),
                        },
                    });
                }

                let objects = self.provider.list_objects().await?;
                let object = objects
                    .iter()
                    .find(|object| object.key == record.storage_key)
                    .ok_or_else(|| EngineError::ObjectVanished(record.storage_key.clone()))?;
                let companions = companion_map(&objects);
                let companion = companion_for(&object.key, &companions);
                let manifest = self
                    .extractor
                    .extract(object, companion, self.provider.as_ref())
                    .await
                    .map_err(|source| EngineError::Extraction {
                        key: object.key.clone(),
                        source,
                    })?;
                let live_snapshot = Snapshot::from_object(object)?;
                let updated = self
                    .store
                    .upsert(&AssetUpsert {
                        tenant_id: tenant_id.to_string(),
                        photo_id: photo_id_for_key(&object.key),
                        storage_key: object.key.clone(),
                        storage_provider: self.provider.name().to_string(),
                        size: live_snapshot.size,
                        etag: live_snapshot.etag.clone(),
                        last_modified: live_snapshot.last_modified.clone(),
                        metadata_hash: live_snapshot.metadata_hash.clone(),
                        manifest_version: Some(manifest.version),
                        manifest: Some(manifest.data),
                    })
                    .await?;
                Ok(DataSyncAction {
                    kind: SyncActionType::Update,
                    storage_key: updated.storage_key,
                    photo_id: Some(updated.photo_id),
                    applied: true,
                    reason: Some("metadata-mismatch".to_string()),
                    resolution: Some(strategy),
                    snapshots: ActionSnapshots {
                        before: Some(record_snapshot),
                        after: Some(live_snapshot),
                    },
                })
            }
            // Keep the record but freeze it out of future presence checks.
            (
                ResolutionStrategy::PreferDatabase,
                ConflictPayload::MissingInStorage { record_snapshot },
            ) => {
                if !dry_run {
                    self.store.mark_database_only(tenant_id, record.id).await?;
                }
                Ok(DataSyncAction {
                    kind: SyncActionType::Update,
                    storage_key: record.storage_key,
                    photo_id: Some(record.photo_id),
                    applied: !dry_run,
                    reason: Some("missing-in-storage".to_string()),
                    resolution: Some(strategy),
                    snapshots: ActionSnapshots {
                        before: Some(record_snapshot),
                        after: None,
                    },
                })
            }
            // Adopt the snapshot captured at detection time, from the stored
            // payload rather than a re-fetch, and stop flagging the record.
            (
                ResolutionStrategy::PreferDatabase,
                ConflictPayload::MetadataMismatch {
                    storage_snapshot,
                    record_snapshot,
                },
            ) => {
                if !dry_run {
                    self.store
                        .mark_synced(tenant_id, record.id, &storage_snapshot)
                        .await?;
                }
                Ok(DataSyncAction {
                    kind: SyncActionType::Update,
                    storage_key: record.storage_key,
                    photo_id: Some(record.photo_id),
                    applied: !dry_run,
                    reason: Some("metadata-mismatch".to_string()),
                    resolution: Some(strategy),
                    snapshots: ActionSnapshots {
                        before: Some(record_snapshot),
                        after: Some(storage_snapshot),
                    },
                })
            }
        }
    }
}
