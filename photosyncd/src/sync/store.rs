#![allow(dead_code)]

use std::{fs, path::PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::{Row, SqlitePool, sqlite::SqliteConnectOptions, sqlite::SqliteRow};
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use super::snapshot::Snapshot;

/// Sentinel provider marker exempting a record from storage-presence checks.
pub const DATABASE_ONLY_PROVIDER: &str = "database-only";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("payload encoding error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("time format error: {0}")]
    TimeFormat(#[from] time::error::Format),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("XDG data directory is unavailable")]
    MissingDataDir,
    #[error("invalid sync status: {0}")]
    InvalidStatus(String),
    #[error("asset not found after upsert")]
    MissingAsset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    Pending,
    Synced,
    Conflict,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Pending => "pending",
            SyncStatus::Synced => "synced",
            SyncStatus::Conflict => "conflict",
        }
    }

    fn parse(value: &str) -> Result<Self, StoreError> {
        match value {
            "pending" => Ok(SyncStatus::Pending),
            "synced" => Ok(SyncStatus::Synced),
            "conflict" => Ok(SyncStatus::Conflict),
            other => Err(StoreError::InvalidStatus(other.to_string())),
        }
    }
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stored verbatim on the record while it is in conflict, and read back by
/// the resolver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ConflictPayload {
    MissingInStorage {
        record_snapshot: Snapshot,
    },
    MetadataMismatch {
        storage_snapshot: Snapshot,
        record_snapshot: Snapshot,
    },
}

impl ConflictPayload {
    pub fn reason(&self) -> &'static str {
        match self {
            ConflictPayload::MissingInStorage { .. } => "missing-in-storage",
            ConflictPayload::MetadataMismatch { .. } => "metadata-mismatch",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssetRecord {
    pub id: i64,
    pub tenant_id: String,
    pub photo_id: String,
    pub storage_key: String,
    pub storage_provider: String,
    pub size: Option<i64>,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    pub metadata_hash: Option<String>,
    pub manifest_version: Option<i64>,
    pub manifest: Option<JsonValue>,
    pub sync_status: SyncStatus,
    pub conflict_reason: Option<String>,
    pub conflict_payload: Option<ConflictPayload>,
    pub synced_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl AssetRecord {
    /// Rebuilds the comparable snapshot from the stored fields, so a record
    /// and a live listing entry hash through the same code path.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot::compute(self.size, self.etag.as_deref(), self.last_modified.as_deref())
    }

    pub fn is_database_only(&self) -> bool {
        self.storage_provider == DATABASE_ONLY_PROVIDER
    }
}

#[derive(Debug, Clone)]
pub struct AssetUpsert {
    pub tenant_id: String,
    pub photo_id: String,
    pub storage_key: String,
    pub storage_provider: String,
    pub size: Option<i64>,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    pub metadata_hash: Option<String>,
    pub manifest_version: Option<i64>,
    pub manifest: Option<JsonValue>,
}

/// Shape of one conflict row as exposed to operators.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictView {
    pub id: i64,
    pub storage_key: String,
    pub photo_id: String,
    pub reason: Option<String>,
    pub payload: Option<ConflictPayload>,
    pub manifest_version: Option<i64>,
    pub manifest: Option<JsonValue>,
    pub storage_provider: String,
    pub synced_at: Option<String>,
    pub updated_at: String,
}

impl ConflictView {
    pub fn from_record(record: AssetRecord) -> Self {
        Self {
            id: record.id,
            storage_key: record.storage_key,
            photo_id: record.photo_id,
            reason: record.conflict_reason,
            payload: record.conflict_payload,
            manifest_version: record.manifest_version,
            manifest: record.manifest,
            storage_provider: record.storage_provider,
            synced_at: record.synced_at,
            updated_at: record.updated_at,
        }
    }
}

pub struct AssetStore {
    pool: SqlitePool,
}

impl AssetStore {
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn new(database_url: &str) -> Result<Self, StoreError> {
        let pool = SqlitePool::connect(database_url).await?;
        let store = Self { pool };
        store.init().await?;
        Ok(store)
    }

    pub async fn new_default() -> Result<Self, StoreError> {
        let db_path = default_db_path()?;
        if let Some(parent) = db_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(options).await?;
        let store = Self { pool };
        store.init().await?;
        Ok(store)
    }

    pub async fn init(&self) -> Result<(), StoreError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS assets (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                tenant_id TEXT NOT NULL,
                photo_id TEXT NOT NULL,
                storage_key TEXT NOT NULL,
                storage_provider TEXT NOT NULL,
                size INTEGER,
                etag TEXT,
                last_modified TEXT,
                metadata_hash TEXT,
                manifest_version INTEGER,
                manifest TEXT,
                sync_status TEXT NOT NULL DEFAULT 'pending',
                conflict_reason TEXT,
                conflict_payload TEXT,
                synced_at TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE(tenant_id, storage_key)
            );",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_assets_tenant_status
             ON assets(tenant_id, sync_status);",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Insert-or-update on the compound key. Two writers racing on the same
    /// key converge to one row instead of hitting a duplicate-key error.
    /// Lands the row in `synced` with conflict fields cleared; `created_at`
    /// is kept from the first insert.
    pub async fn upsert(&self, asset: &AssetUpsert) -> Result<AssetRecord, StoreError> {
        let manifest = asset
            .manifest
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let now = now_rfc3339()?;
        sqlx::query(
            "INSERT INTO assets (
                tenant_id, photo_id, storage_key, storage_provider,
                size, etag, last_modified, metadata_hash,
                manifest_version, manifest,
                sync_status, conflict_reason, conflict_payload,
                synced_at, created_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 'synced', NULL, NULL, ?11, ?11, ?11)
            ON CONFLICT(tenant_id, storage_key) DO UPDATE SET
                photo_id = excluded.photo_id,
                storage_provider = excluded.storage_provider,
                size = excluded.size,
                etag = excluded.etag,
                last_modified = excluded.last_modified,
                metadata_hash = excluded.metadata_hash,
                manifest_version = excluded.manifest_version,
                manifest = excluded.manifest,
                sync_status = 'synced',
                conflict_reason = NULL,
                conflict_payload = NULL,
                synced_at = excluded.synced_at,
                updated_at = excluded.updated_at;",
        )
        .bind(&asset.tenant_id)
        .bind(&asset.photo_id)
        .bind(&asset.storage_key)
        .bind(&asset.storage_provider)
        .bind(asset.size)
        .bind(&asset.etag)
        .bind(&asset.last_modified)
        .bind(&asset.metadata_hash)
        .bind(asset.manifest_version)
        .bind(manifest)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        self.get_by_key(&asset.tenant_id, &asset.storage_key)
            .await?
            .ok_or(StoreError::MissingAsset)
    }

    pub async fn get_by_id(
        &self,
        tenant_id: &str,
        id: i64,
    ) -> Result<Option<AssetRecord>, StoreError> {
        let row = sqlx::query(
            "SELECT id, tenant_id, photo_id, storage_key, storage_provider, size, etag, last_modified, metadata_hash, manifest_version, manifest, sync_status, conflict_reason, conflict_payload, synced_at, created_at, updated_at
             FROM assets WHERE tenant_id = ?1 AND id = ?2",
        )
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| row_to_record(&row)).transpose()
    }

    pub async fn get_by_key(
        &self,
        tenant_id: &str,
        storage_key: &str,
    ) -> Result<Option<AssetRecord>, StoreError> {
        let row = sqlx::query(
            "SELECT id, tenant_id, photo_id, storage_key, storage_provider, size, etag, last_modified, metadata_hash, manifest_version, manifest, sync_status, conflict_reason, conflict_payload, synced_at, created_at, updated_at
             FROM assets WHERE tenant_id = ?1 AND storage_key = ?2",
        )
        .bind(tenant_id)
        .bind(storage_key)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| row_to_record(&row)).transpose()
    }

    pub async fn list_by_tenant(&self, tenant_id: &str) -> Result<Vec<AssetRecord>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, tenant_id, photo_id, storage_key, storage_provider, size, etag, last_modified, metadata_hash, manifest_version, manifest, sync_status, conflict_reason, conflict_payload, synced_at, created_at, updated_at
             FROM assets WHERE tenant_id = ?1 ORDER BY storage_key ASC",
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_record).collect()
    }

    pub async fn list_conflicts(&self, tenant_id: &str) -> Result<Vec<AssetRecord>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, tenant_id, photo_id, storage_key, storage_provider, size, etag, last_modified, metadata_hash, manifest_version, manifest, sync_status, conflict_reason, conflict_payload, synced_at, created_at, updated_at
             FROM assets WHERE tenant_id = ?1 AND sync_status = 'conflict' ORDER BY id ASC",
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_record).collect()
    }

    pub async fn mark_conflict(
        &self,
        tenant_id: &str,
        id: i64,
        payload: &ConflictPayload,
    ) -> Result<(), StoreError> {
        let now = now_rfc3339()?;
        sqlx::query(
            "UPDATE assets SET
                sync_status = 'conflict',
                conflict_reason = ?1,
                conflict_payload = ?2,
                updated_at = ?3
             WHERE tenant_id = ?4 AND id = ?5",
        )
        .bind(payload.reason())
        .bind(serde_json::to_string(payload)?)
        .bind(&now)
        .bind(tenant_id)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn mark_synced(
        &self,
        tenant_id: &str,
        id: i64,
        snapshot: &Snapshot,
    ) -> Result<(), StoreError> {
        let now = now_rfc3339()?;
        sqlx::query(
            "UPDATE assets SET
                size = ?1,
                etag = ?2,
                last_modified = ?3,
                metadata_hash = ?4,
                sync_status = 'synced',
                conflict_reason = NULL,
                conflict_payload = NULL,
                synced_at = ?5,
                updated_at = ?5
             WHERE tenant_id = ?6 AND id = ?7",
        )
        .bind(snapshot.size)
        .bind(&snapshot.etag)
        .bind(&snapshot.last_modified)
        .bind(&snapshot.metadata_hash)
        .bind(&now)
        .bind(tenant_id)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn mark_database_only(&self, tenant_id: &str, id: i64) -> Result<(), StoreError> {
        let now = now_rfc3339()?;
        sqlx::query(
            "UPDATE assets SET
                storage_provider = ?1,
                sync_status = 'synced',
                conflict_reason = NULL,
                conflict_payload = NULL,
                synced_at = ?2,
                updated_at = ?2
             WHERE tenant_id = ?3 AND id = ?4",
        )
        .bind(DATABASE_ONLY_PROVIDER)
        .bind(&now)
        .bind(tenant_id)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn delete_by_id(&self, tenant_id: &str, id: i64) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM assets WHERE tenant_id = ?1 AND id = ?2")
            .bind(tenant_id)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

fn row_to_record(row: &SqliteRow) -> Result<AssetRecord, StoreError> {
    let sync_status: String = row.try_get("sync_status")?;
    let manifest: Option<String> = row.try_get("manifest")?;
    let conflict_payload: Option<String> = row.try_get("conflict_payload")?;
    Ok(AssetRecord {
        id: row.try_get("id")?,
        tenant_id: row.try_get("tenant_id")?,
        photo_id: row.try_get("photo_id")?,
        storage_key: row.try_get("storage_key")?,
        storage_provider: row.try_get("storage_provider")?,
        size: row.try_get("size")?,
        etag: row.try_get("etag")?,
        last_modified: row.try_get("last_modified")?,
        metadata_hash: row.try_get("metadata_hash")?,
        manifest_version: row.try_get("manifest_version")?,
        manifest: manifest.map(|raw| serde_json::from_str(&raw)).transpose()?,
        sync_status: SyncStatus::parse(&sync_status)?,
        conflict_reason: row.try_get("conflict_reason")?,
        conflict_payload: conflict_payload
            .map(|raw| serde_json::from_str(&raw))
            .transpose()?,
        synced_at: row.try_get("synced_at")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

pub(crate) fn now_rfc3339() -> Result<String, time::error::Format> {
    OffsetDateTime::now_utc().format(&Rfc3339)
}

fn default_db_path() -> Result<PathBuf, StoreError> {
    let mut path = dirs::data_dir().ok_or(StoreError::MissingDataDir)?;
    path.push("photosync");
    path.push("assets.db");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn make_store() -> AssetStore {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        let store = AssetStore::from_pool(pool);
        store.init().await.unwrap();
        store
    }

    fn sample_upsert(key: &str) -> AssetUpsert {
        let snapshot = Snapshot::compute(Some(100), Some("abc"), Some("2024-01-01T00:00:00Z"));
        AssetUpsert {
            tenant_id: "tenant-a".into(),
            photo_id: "img-0001".into(),
            storage_key: key.into(),
            storage_provider: "local".into(),
            size: snapshot.size,
            etag: snapshot.etag,
            last_modified: snapshot.last_modified,
            metadata_hash: snapshot.metadata_hash,
            manifest_version: Some(1),
            manifest: Some(serde_json::json!({ "fileName": "img-0001.jpg" })),
        }
    }

    #[tokio::test]
    async fn upsert_and_fetch_roundtrip() {
        let store = make_store().await;

        let inserted = store.upsert(&sample_upsert("2024/img-0001.jpg")).await.unwrap();
        let fetched = store
            .get_by_key("tenant-a", "2024/img-0001.jpg")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(inserted, fetched);
        assert_eq!(fetched.sync_status, SyncStatus::Synced);
        assert!(fetched.synced_at.is_some());
        assert_eq!(
            fetched.metadata_hash,
            Snapshot::compute(Some(100), Some("abc"), Some("2024-01-01T00:00:00Z")).metadata_hash
        );
        assert_eq!(
            fetched.manifest,
            Some(serde_json::json!({ "fileName": "img-0001.jpg" }))
        );
    }

    #[tokio::test]
    async fn upsert_updates_in_place_on_the_same_key() {
        let store = make_store().await;

        let first = store.upsert(&sample_upsert("2024/img-0001.jpg")).await.unwrap();
        let mut changed = sample_upsert("2024/img-0001.jpg");
        changed.size = Some(200);
        let second = store.upsert(&changed).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.size, Some(200));
        assert_eq!(second.created_at, first.created_at);
        assert_eq!(store.list_by_tenant("tenant-a").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn upsert_clears_a_prior_conflict() {
        let store = make_store().await;
        let record = store.upsert(&sample_upsert("2024/img-0001.jpg")).await.unwrap();
        let payload = ConflictPayload::MissingInStorage {
            record_snapshot: record.snapshot(),
        };
        store
            .mark_conflict("tenant-a", record.id, &payload)
            .await
            .unwrap();

        let healed = store.upsert(&sample_upsert("2024/img-0001.jpg")).await.unwrap();

        assert_eq!(healed.sync_status, SyncStatus::Synced);
        assert!(healed.conflict_reason.is_none());
        assert!(healed.conflict_payload.is_none());
    }

    #[tokio::test]
    async fn mark_conflict_stores_reason_and_payload() {
        let store = make_store().await;
        let record = store.upsert(&sample_upsert("2024/img-0001.jpg")).await.unwrap();
        let payload = ConflictPayload::MetadataMismatch {
            storage_snapshot: Snapshot::compute(Some(200), Some("def"), None),
            record_snapshot: record.snapshot(),
        };

        store
            .mark_conflict("tenant-a", record.id, &payload)
            .await
            .unwrap();
        let flagged = store
            .get_by_id("tenant-a", record.id)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(flagged.sync_status, SyncStatus::Conflict);
        assert_eq!(flagged.conflict_reason.as_deref(), Some("metadata-mismatch"));
        assert_eq!(flagged.conflict_payload, Some(payload));
    }

    #[tokio::test]
    async fn mark_synced_adopts_snapshot_and_clears_conflict() {
        let store = make_store().await;
        let record = store.upsert(&sample_upsert("2024/img-0001.jpg")).await.unwrap();
        let payload = ConflictPayload::MissingInStorage {
            record_snapshot: record.snapshot(),
        };
        store
            .mark_conflict("tenant-a", record.id, &payload)
            .await
            .unwrap();

        let snapshot = Snapshot::compute(Some(300), Some("xyz"), Some("2024-02-01T00:00:00Z"));
        store
            .mark_synced("tenant-a", record.id, &snapshot)
            .await
            .unwrap();
        let healed = store
            .get_by_id("tenant-a", record.id)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(healed.sync_status, SyncStatus::Synced);
        assert_eq!(healed.size, Some(300));
        assert_eq!(healed.etag.as_deref(), Some("xyz"));
        assert_eq!(healed.metadata_hash, snapshot.metadata_hash);
        assert!(healed.conflict_payload.is_none());
    }

    #[tokio::test]
    async fn mark_database_only_sets_sentinel_provider() {
        let store = make_store().await;
        let record = store.upsert(&sample_upsert("2024/img-0001.jpg")).await.unwrap();

        store
            .mark_database_only("tenant-a", record.id)
            .await
            .unwrap();
        let frozen = store
            .get_by_id("tenant-a", record.id)
            .await
            .unwrap()
            .unwrap();

        assert!(frozen.is_database_only());
        assert_eq!(frozen.sync_status, SyncStatus::Synced);
    }

    #[tokio::test]
    async fn delete_by_id_removes_the_row() {
        let store = make_store().await;
        let record = store.upsert(&sample_upsert("2024/img-0001.jpg")).await.unwrap();

        store.delete_by_id("tenant-a", record.id).await.unwrap();

        assert!(
            store
                .get_by_id("tenant-a", record.id)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn list_conflicts_returns_only_conflicted_rows_in_id_order() {
        let store = make_store().await;
        let first = store.upsert(&sample_upsert("2024/a.jpg")).await.unwrap();
        let second = store.upsert(&sample_upsert("2024/b.jpg")).await.unwrap();
        store.upsert(&sample_upsert("2024/c.jpg")).await.unwrap();
        for record in [&first, &second] {
            let payload = ConflictPayload::MissingInStorage {
                record_snapshot: record.snapshot(),
            };
            store
                .mark_conflict("tenant-a", record.id, &payload)
                .await
                .unwrap();
        }

        let conflicts = store.list_conflicts("tenant-a").await.unwrap();

        assert_eq!(conflicts.len(), 2);
        assert_eq!(conflicts[0].id, first.id);
        assert_eq!(conflicts[1].id, second.id);
        let view = ConflictView::from_record(conflicts[0].clone());
        assert_eq!(view.reason.as_deref(), Some("missing-in-storage"));
        assert!(view.payload.is_some());
    }

    #[tokio::test]
    async fn rows_are_scoped_to_their_tenant() {
        let store = make_store().await;
        store.upsert(&sample_upsert("shared.jpg")).await.unwrap();
        let mut other = sample_upsert("shared.jpg");
        other.tenant_id = "tenant-b".into();
        other.size = Some(999);
        let other_record = store.upsert(&other).await.unwrap();

        let tenant_a = store.list_by_tenant("tenant-a").await.unwrap();
        let tenant_b = store.list_by_tenant("tenant-b").await.unwrap();

        assert_eq!(tenant_a.len(), 1);
        assert_eq!(tenant_b.len(), 1);
        assert_ne!(tenant_a[0].id, tenant_b[0].id);
        assert_eq!(tenant_b[0].size, Some(999));

        store.delete_by_id("tenant-a", other_record.id).await.unwrap();
        assert!(
            store
                .get_by_id("tenant-b", other_record.id)
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn unknown_status_value_is_rejected() {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        let store = AssetStore::from_pool(pool.clone());
        store.init().await.unwrap();
        let record = store.upsert(&sample_upsert("2024/img-0001.jpg")).await.unwrap();
        sqlx::query("UPDATE assets SET sync_status = 'bogus' WHERE id = ?1")
            .bind(record.id)
            .execute(&pool)
            .await
            .unwrap();

        let err = store.get_by_id("tenant-a", record.id).await.unwrap_err();

        assert!(matches!(err, StoreError::InvalidStatus(value) if value == "bogus"));
    }
}
