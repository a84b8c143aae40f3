use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::condition::Condition;
use crate::engine::{BackupSpec as EngineBackupSpec, BackupStatus as EngineBackupStatus};

/// `NonAdminBackup.oadp.openshift.io/v1alpha1` — tenant-facing request for a
/// namespace-confined backup (spec.md §3 "Tenant object").
#[derive(CustomResource, Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "oadp.openshift.io",
    version = "v1alpha1",
    kind = "NonAdminBackup",
    plural = "nonadminbackups",
    namespaced,
    status = "NonAdminBackupStatus",
    shortname = "nab"
)]
#[serde(rename_all = "camelCase")]
pub struct NonAdminBackupSpec {
    /// The tenant-authored engine backup specification. Namespace-confining
    /// fields (`includedNamespaces`, exclusion lists) are enforced over this
    /// value, never trusted verbatim (spec.md I7).
    pub backup_spec: Option<EngineBackupSpec>,
    /// Tenant-authored storage location name, resolved against
    /// `NonAdminBackupStorageLocation` objects in the tenant's own namespace.
    pub backup_storage_location: Option<String>,
    /// Request to permanently delete the backed-up data (spec.md §4.5
    /// "graceful-delete path").
    #[serde(default)]
    pub delete_backup: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NonAdminBackupStatus {
    pub phase: Option<Phase>,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    pub velero_backup: Option<VeleroBackupRef>,
    pub velero_delete_backup_request: Option<VeleroDeleteBackupRequestRef>,
    pub queue_info: Option<QueueInfo>,
    pub file_system_pod_volume_backups: Option<PodVolumeBackupCounters>,
    pub data_mover_data_uploads: Option<DataUploadCounters>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum Phase {
    New,
    BackingOff,
    Created,
    Deleting,
}

impl Phase {
    /// I5: the only edges the phase DAG allows.
    pub fn can_transition_to(self, next: Phase) -> bool {
        use Phase::*;
        matches!(
            (self, next),
            (New, BackingOff)
                | (New, Created)
                | (Created, Deleting)
                | (BackingOff, Deleting)
                | (New, New)
                | (BackingOff, BackingOff)
                | (Created, Created)
                | (Deleting, Deleting)
        )
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VeleroBackupRef {
    pub nac_uuid: String,
    pub namespace: String,
    pub name: String,
    #[serde(default)]
    pub spec: Option<EngineBackupSpec>,
    #[serde(default)]
    pub status: Option<EngineBackupStatus>,
}

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VeleroDeleteBackupRequestRef {
    pub nac_uuid: String,
    pub namespace: String,
    pub name: String,
    #[serde(default)]
    pub status: Option<crate::engine::DeleteBackupRequestStatus>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct QueueInfo {
    pub estimated_queue_position: i64,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PodVolumeBackupCounters {
    pub total: i64,
    pub new: i64,
    pub in_progress: i64,
    pub failed: i64,
    pub completed: i64,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DataUploadCounters {
    pub total: i64,
    pub new: i64,
    pub accepted: i64,
    pub prepared: i64,
    pub in_progress: i64,
    pub canceling: i64,
    pub canceled: i64,
    pub failed: i64,
    pub completed: i64,
}
