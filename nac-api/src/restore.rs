use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::condition::Condition;
use crate::engine::{RestoreSpec as EngineRestoreSpec, RestoreStatus as EngineRestoreStatus};

/// `NonAdminRestore.oadp.openshift.io/v1alpha1` (spec.md §3, structural
/// variant of `NonAdminBackup`).
#[derive(CustomResource, Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "oadp.openshift.io",
    version = "v1alpha1",
    kind = "NonAdminRestore",
    plural = "nonadminrestores",
    namespaced,
    status = "NonAdminRestoreStatus",
    shortname = "nar"
)]
#[serde(rename_all = "camelCase")]
pub struct NonAdminRestoreSpec {
    pub restore_spec: Option<EngineRestoreSpec>,
    /// Name of the `NonAdminBackup` this restore targets, within the same
    /// tenant namespace.
    pub backup_name: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NonAdminRestoreStatus {
    pub phase: Option<super::backup::Phase>,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    pub velero_restore: Option<VeleroRestoreRef>,
}

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VeleroRestoreRef {
    pub nac_uuid: String,
    pub namespace: String,
    pub name: String,
    #[serde(default)]
    pub spec: Option<EngineRestoreSpec>,
    #[serde(default)]
    pub status: Option<EngineRestoreStatus>,
}
