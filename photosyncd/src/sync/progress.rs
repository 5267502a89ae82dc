use serde::Serialize;

use super::action::{DataSyncAction, DataSyncResult, SyncSummary};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SyncStage {
    Insert,
    Orphan,
    MetadataConflict,
    StatusReconciliation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum StageStatus {
    Start,
    Complete,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunTotals {
    pub missing_in_db: usize,
    pub orphan_in_db: usize,
    pub conflict_candidates: usize,
    pub status_reconciliations: usize,
}

/// Progress stream contract. `Complete` is the authoritative terminal event;
/// consumers may ignore everything else.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum SyncEvent {
    Start {
        summary: SyncSummary,
        totals: RunTotals,
        dry_run: bool,
    },
    Stage {
        stage: SyncStage,
        status: StageStatus,
        processed: usize,
        total: usize,
        summary: SyncSummary,
    },
    Action {
        stage: SyncStage,
        index: usize,
        total: usize,
        action: DataSyncAction,
        summary: SyncSummary,
    },
    Complete {
        result: DataSyncResult,
    },
    Error {
        message: String,
    },
}

/// Called synchronously at stage and action boundaries. Transports (SSE,
/// polling, a terminal spinner) wrap this from the outside.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: &SyncEvent);
}

/// Sink that drops every event.
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn emit(&self, _event: &SyncEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_event_serializes_with_kind_tag() {
        let event = SyncEvent::Start {
            summary: SyncSummary::default(),
            totals: RunTotals {
                missing_in_db: 3,
                ..Default::default()
            },
            dry_run: true,
        };

        let value = serde_json::to_value(&event).unwrap();

        assert_eq!(value["kind"], "start");
        assert_eq!(value["dryRun"], true);
        assert_eq!(value["totals"]["missingInDb"], 3);
    }

    #[test]
    fn stage_names_use_camel_case() {
        let event = SyncEvent::Stage {
            stage: SyncStage::StatusReconciliation,
            status: StageStatus::Complete,
            processed: 2,
            total: 2,
            summary: SyncSummary::default(),
        };

        let value = serde_json::to_value(&event).unwrap();

        assert_eq!(value["kind"], "stage");
        assert_eq!(value["stage"], "statusReconciliation");
        assert_eq!(value["status"], "complete");
    }
}
