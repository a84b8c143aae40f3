use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::condition::Condition;
use crate::engine::BackupStorageLocationSpec as EngineBslSpec;

/// `NonAdminBackupStorageLocation.oadp.openshift.io/v1alpha1` — tenant
/// request to promote a storage location into a real engine object other
/// tenant kinds in the same namespace can then reference by name (spec.md
/// §4.2 "Validate that a tenant-named storage location exists").
#[derive(CustomResource, Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "oadp.openshift.io",
    version = "v1alpha1",
    kind = "NonAdminBackupStorageLocation",
    plural = "nonadminbackupstoragelocations",
    namespaced,
    status = "NonAdminBackupStorageLocationStatus",
    shortname = "nabsl"
)]
#[serde(rename_all = "camelCase")]
pub struct NonAdminBackupStorageLocationSpec {
    pub backup_storage_location_spec: EngineBslSpec,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NonAdminBackupStorageLocationStatus {
    /// Reflects the promoted engine BSL's own availability phase, not a
    /// reconciliation phase (spec.md SPEC_FULL §3: this kind has no
    /// finalizer-gated delete protocol).
    pub phase: Option<BslPhase>,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    pub velero_backup_storage_location: Option<VeleroBslRef>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum BslPhase {
    Available,
    Unavailable,
}

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VeleroBslRef {
    pub nac_uuid: String,
    pub namespace: String,
    pub name: String,
}
