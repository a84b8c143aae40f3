//! Manager wiring (spec.md §4.7): one controller per tenant kind, sharing a
//! single [`Context`].

pub mod backup;
pub mod bsl;
pub mod download_request;
pub mod restore;

use kube::Client;
use nac_api::engine::BackupSpec as EngineBackupSpec;

/// Field manager used for every server-side apply this operator performs,
/// in the idiom of the teacher's `FIELD_MANAGER` constant.
pub const FIELD_MANAGER: &str = "non-admin-controller";

/// Context shared by all four tenant-kind controllers.
#[derive(Clone)]
pub struct Context {
    pub client: Client,
    pub operator_namespace: String,
    /// Loaded once at startup (spec.md §6 "One optional").
    pub enforced_backup_spec: Option<EngineBackupSpec>,
}

impl Context {
    pub fn new(
        client: Client,
        operator_namespace: String,
        enforced_backup_spec: Option<EngineBackupSpec>,
    ) -> Self {
        Self {
            client,
            operator_namespace,
            enforced_backup_spec,
        }
    }
}
