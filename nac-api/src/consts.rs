//! Wire-level constants: labels, annotations, finalizers, condition vocabulary.
//!
//! These are the string contract between the tenant-facing reconcilers and
//! the engine objects they create (spec.md §6 "Required labels on engine
//! objects it creates").

/// Label carrying the primary binding key: the NACUUID.
pub const LABEL_NAC_ORIGIN_UUID: &str = "openshift.io/nac-origin-uuid";
/// Marker label identifying an engine object as managed by this system.
pub const LABEL_NAC_MANAGED: &str = "openshift.io/nac-managed";
/// Value stamped into [`LABEL_NAC_MANAGED`].
pub const LABEL_NAC_MANAGED_VALUE: &str = "true";
/// Label an engine `PodVolumeBackup`/`DataUpload` carries pointing at the
/// engine `Backup` name that spawned it.
pub const LABEL_ENGINE_BACKUP_NAME: &str = "velero.io/backup-name";

/// Annotation recording the tenant object's namespace.
pub const ANNOTATION_ORIGIN_NAMESPACE: &str = "openshift.io/origin-namespace";
/// Annotation recording the tenant object's name.
pub const ANNOTATION_ORIGIN_NAME: &str = "openshift.io/origin-name";
/// Annotation recording the tenant object's UID.
pub const ANNOTATION_ORIGIN_UID: &str = "openshift.io/origin-uid";

/// Label a tenant object may carry to request sync-import of a pre-existing
/// engine object (spec.md §4.1, §4.5 "sync-import path").
pub const LABEL_SYNC_UUID: &str = "openshift.io/nac-sync-uuid";

/// Single finalizer guarding tenant-object deletion (spec.md §3 "Finalizer",
/// I4).
pub const FINALIZER_NAME: &str = "openshift.io/nac-finalizer";

/// Condition types recognized on tenant status (spec.md §3).
pub mod condition_type {
    pub const ACCEPTED: &str = "Accepted";
    pub const QUEUED: &str = "Queued";
    pub const DELETING: &str = "Deleting";
}

/// Condition reasons used across the state machine (spec.md §4.5, §8).
pub mod reason {
    pub const INVALID_BACKUP_SPEC: &str = "InvalidBackupSpec";
    pub const INVALID_RESTORE_SPEC: &str = "InvalidRestoreSpec";
    pub const BACKUP_SCHEDULED: &str = "BackupScheduled";
    pub const RESTORE_SCHEDULED: &str = "RestoreScheduled";
    pub const DELETION_PENDING: &str = "DeletionPending";
    pub const ENGINE_OBJECT_GONE: &str = "EngineObjectGone";
    pub const AMBIGUOUS_BINDING: &str = "AmbiguousBinding";
    pub const FOREIGN_ENGINE_OBJECT: &str = "ForeignEngineObject";
    pub const SYNC_TARGET_MISSING: &str = "SyncTargetMissing";
}

/// Resources this system excludes from every engine backup it creates, so
/// that a tenant backup never captures the control-plane's own objects
/// (spec.md §4.2 "Resource-exclusion policy").
pub const NAC_INTERNAL_EXCLUDED_RESOURCES: &[&str] = &[
    "nonadminbackups.oadp.openshift.io",
    "nonadminrestores.oadp.openshift.io",
    "nonadminbackupstoragelocations.oadp.openshift.io",
    "nonadmindownloadrequests.oadp.openshift.io",
];
