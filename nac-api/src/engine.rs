//! Local mirrors of the backup engine's resource kinds (spec.md §6 "Engine
//! resources (consumed)"). The engine has no published Rust client crate, so
//! these types are defined the same way the teacher defines its own
//! `Cluster` CRD: hand-written `kube::CustomResource` structs against the
//! engine's known wire shape, kept deliberately narrow to the fields this
//! system actually reads or writes.

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// `Backup.velero.io/v1`
#[derive(CustomResource, Debug, Clone, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "velero.io",
    version = "v1",
    kind = "Backup",
    plural = "backups",
    namespaced,
    status = "BackupStatus"
)]
pub struct BackupSpec {
    #[serde(default, rename = "includedNamespaces")]
    pub included_namespaces: Vec<String>,
    #[serde(default, rename = "excludedNamespaces")]
    pub excluded_namespaces: Vec<String>,
    #[serde(default, rename = "includedResources")]
    pub included_resources: Vec<String>,
    #[serde(default, rename = "excludedResources")]
    pub excluded_resources: Vec<String>,
    #[serde(default, rename = "includedClusterScopedResources")]
    pub included_cluster_scoped_resources: Vec<String>,
    #[serde(default, rename = "excludedClusterScopedResources")]
    pub excluded_cluster_scoped_resources: Vec<String>,
    #[serde(default, rename = "includedNamespaceScopedResources")]
    pub included_namespace_scoped_resources: Vec<String>,
    #[serde(default, rename = "excludedNamespaceScopedResources")]
    pub excluded_namespace_scoped_resources: Vec<String>,
    #[serde(default, rename = "storageLocation")]
    pub storage_location: String,
    #[serde(default)]
    pub ttl: Option<String>,
    #[serde(default, rename = "snapshotVolumes")]
    pub snapshot_volumes: Option<bool>,
    #[serde(default, rename = "defaultVolumesToFsBackup")]
    pub default_volumes_to_fs_backup: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct BackupStatus {
    #[serde(default)]
    pub phase: Option<String>,
    #[serde(default)]
    pub errors: Option<i32>,
    #[serde(default)]
    pub warnings: Option<i32>,
    #[serde(default, rename = "startTimestamp")]
    pub start_timestamp: Option<Time>,
    #[serde(default, rename = "completionTimestamp")]
    pub completion_timestamp: Option<Time>,
}

impl BackupStatus {
    /// Terminal engine backup phases — used by queue position computation
    /// (spec.md §4.4) to decide whether a backup still occupies the queue.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.phase.as_deref(),
            Some("Completed")
                | Some("Failed")
                | Some("PartiallyFailed")
                | Some("FailedValidation")
        )
    }
}

/// `Restore.velero.io/v1`
#[derive(CustomResource, Debug, Clone, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "velero.io",
    version = "v1",
    kind = "Restore",
    plural = "restores",
    namespaced,
    status = "RestoreStatus"
)]
pub struct RestoreSpec {
    #[serde(rename = "backupName")]
    pub backup_name: String,
    #[serde(default, rename = "includedNamespaces")]
    pub included_namespaces: Vec<String>,
    #[serde(default, rename = "excludedNamespaces")]
    pub excluded_namespaces: Vec<String>,
    #[serde(default, rename = "restorePVs")]
    pub restore_pvs: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct RestoreStatus {
    #[serde(default)]
    pub phase: Option<String>,
    #[serde(default)]
    pub warnings: Option<i32>,
    #[serde(default)]
    pub errors: Option<i32>,
}

/// `BackupStorageLocation.velero.io/v1`
#[derive(CustomResource, Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "velero.io",
    version = "v1",
    kind = "BackupStorageLocation",
    plural = "backupstoragelocations",
    namespaced,
    status = "BackupStorageLocationStatus"
)]
pub struct BackupStorageLocationSpec {
    pub provider: String,
    #[serde(default)]
    pub credential: Option<String>,
    #[serde(default, rename = "objectStorage")]
    pub object_storage: Option<ObjectStorageLocation>,
}

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct ObjectStorageLocation {
    pub bucket: String,
    #[serde(default)]
    pub prefix: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct BackupStorageLocationStatus {
    #[serde(default)]
    pub phase: Option<String>,
}

impl BackupStorageLocationStatus {
    pub fn is_available(&self) -> bool {
        self.phase.as_deref() == Some("Available")
    }
}

/// `DeleteBackupRequest.velero.io/v1`
#[derive(CustomResource, Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "velero.io",
    version = "v1",
    kind = "DeleteBackupRequest",
    plural = "deletebackuprequests",
    namespaced,
    status = "DeleteBackupRequestStatus"
)]
pub struct DeleteBackupRequestSpec {
    #[serde(rename = "backupName")]
    pub backup_name: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct DeleteBackupRequestStatus {
    #[serde(default)]
    pub phase: Option<String>,
    #[serde(default)]
    pub errors: Vec<String>,
}

/// `DownloadRequest.velero.io/v1`
#[derive(CustomResource, Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "velero.io",
    version = "v1",
    kind = "DownloadRequest",
    plural = "downloadrequests",
    namespaced,
    status = "DownloadRequestStatus"
)]
pub struct DownloadRequestSpec {
    pub target: DownloadTarget,
}

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct DownloadTarget {
    pub kind: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct DownloadRequestStatus {
    #[serde(default, rename = "downloadURL")]
    pub download_url: Option<String>,
    #[serde(default)]
    pub expiration: Option<Time>,
}

/// `PodVolumeBackup.velero.io/v1` — read-only, aggregated into
/// `fileSystemPodVolumeBackups` counters (spec.md §4.4).
#[derive(CustomResource, Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "velero.io",
    version = "v1",
    kind = "PodVolumeBackup",
    plural = "podvolumebackups",
    namespaced,
    status = "PodVolumeBackupStatus"
)]
pub struct PodVolumeBackupSpec {
    #[serde(default, rename = "backupStorageLocation")]
    pub backup_storage_location: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct PodVolumeBackupStatus {
    #[serde(default)]
    pub phase: Option<String>,
}

/// `DataUpload.velero.io/v2alpha1` — read-only, aggregated into
/// `dataMoverDataUploads` counters (spec.md §4.4).
#[derive(CustomResource, Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "velero.io",
    version = "v2alpha1",
    kind = "DataUpload",
    plural = "datauploads",
    namespaced,
    status = "DataUploadStatus"
)]
pub struct DataUploadSpec {
    #[serde(default, rename = "backupStorageLocation")]
    pub backup_storage_location: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct DataUploadStatus {
    #[serde(default)]
    pub phase: Option<String>,
}

/// Origin annotations recorded on every engine object this system creates
/// (spec.md §3 "I3", §6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    pub namespace: String,
    pub name: String,
    pub uid: String,
}

pub fn origin_annotations(origin: &Origin) -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();
    map.insert(
        crate::consts::ANNOTATION_ORIGIN_NAMESPACE.to_owned(),
        origin.namespace.clone(),
    );
    map.insert(
        crate::consts::ANNOTATION_ORIGIN_NAME.to_owned(),
        origin.name.clone(),
    );
    map.insert(
        crate::consts::ANNOTATION_ORIGIN_UID.to_owned(),
        origin.uid.clone(),
    );
    map
}
