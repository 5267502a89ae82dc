use serde::{Deserialize, Serialize};

use super::snapshot::Snapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncActionType {
    Insert,
    Update,
    Delete,
    Conflict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResolutionStrategy {
    PreferStorage,
    PreferDatabase,
}

impl ResolutionStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionStrategy::PreferStorage => "prefer-storage",
            ResolutionStrategy::PreferDatabase => "prefer-database",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "prefer-storage" => Some(ResolutionStrategy::PreferStorage),
            "prefer-database" => Some(ResolutionStrategy::PreferDatabase),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionSnapshots {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before: Option<Snapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after: Option<Snapshot>,
}

impl ActionSnapshots {
    pub fn is_empty(&self) -> bool {
        self.before.is_none() && self.after.is_none()
    }
}

/// One immutable per-item outcome of a run or a resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSyncAction {
    #[serde(rename = "type")]
    pub kind: SyncActionType,
    pub storage_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo_id: Option<String>,
    pub applied: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<ResolutionStrategy>,
    #[serde(default, skip_serializing_if = "ActionSnapshots::is_empty")]
    pub snapshots: ActionSnapshots,
}

/// Aggregate counters, consistent with the action list. Under a dry run the
/// counters reflect would-be effects even though every `applied` is false.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSummary {
    pub storage_objects: usize,
    pub database_records: usize,
    pub inserted: usize,
    pub updated: usize,
    pub deleted: usize,
    pub conflicts: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSyncResult {
    pub summary: SyncSummary,
    pub actions: Vec<DataSyncAction>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_serializes_with_wire_field_names() {
        let action = DataSyncAction {
            kind: SyncActionType::Conflict,
            storage_key: "2024/img.jpg".into(),
            photo_id: Some("img".into()),
            applied: true,
            reason: Some("metadata-mismatch".into()),
            resolution: None,
            snapshots: ActionSnapshots {
                before: Some(Snapshot::compute(Some(1), Some("a"), None)),
                after: Some(Snapshot::compute(Some(2), Some("b"), None)),
            },
        };

        let value = serde_json::to_value(&action).unwrap();

        assert_eq!(value["type"], "conflict");
        assert_eq!(value["storageKey"], "2024/img.jpg");
        assert_eq!(value["photoId"], "img");
        assert_eq!(value["reason"], "metadata-mismatch");
        assert!(value.get("resolution").is_none());
        assert_eq!(value["snapshots"]["before"]["size"], 1);
        assert_eq!(value["snapshots"]["after"]["etag"], "b");
    }

    #[test]
    fn empty_snapshots_are_omitted() {
        let action = DataSyncAction {
            kind: SyncActionType::Delete,
            storage_key: "a.jpg".into(),
            photo_id: None,
            applied: false,
            reason: None,
            resolution: Some(ResolutionStrategy::PreferStorage),
            snapshots: ActionSnapshots::default(),
        };

        let value = serde_json::to_value(&action).unwrap();

        assert_eq!(value["type"], "delete");
        assert_eq!(value["resolution"], "prefer-storage");
        assert!(value.get("snapshots").is_none());
        assert!(value.get("photoId").is_none());
    }

    #[test]
    fn strategy_parses_kebab_case() {
        assert_eq!(
            ResolutionStrategy::parse("prefer-storage"),
            Some(ResolutionStrategy::PreferStorage)
        );
        assert_eq!(
            ResolutionStrategy::parse("prefer-database"),
            Some(ResolutionStrategy::PreferDatabase)
        );
        assert_eq!(ResolutionStrategy::parse("prefer-cloud"), None);
        assert_eq!(
            ResolutionStrategy::PreferDatabase.as_str(),
            "prefer-database"
        );
    }
}
