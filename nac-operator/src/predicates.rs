//! Event filtering (spec.md §4.6). The pure half lives here; the I/O half
//! (turning a key into a workqueue enqueue) lives in the `.watches()` wiring
//! in `controller::backup`.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

use nac_api::consts::{LABEL_ENGINE_BACKUP_NAME, LABEL_NAC_MANAGED, LABEL_NAC_MANAGED_VALUE};

/// Engine-object events only matter when they carry the non-admin marker
/// label (spec.md §4.6).
pub fn is_non_admin_managed(meta: &ObjectMeta) -> bool {
    meta.labels
        .as_ref()
        .and_then(|l| l.get(LABEL_NAC_MANAGED))
        .map(|v| v == LABEL_NAC_MANAGED_VALUE)
        .unwrap_or(false)
}

/// Reads the `backupName` label a child workload resource (`PodVolumeBackup`,
/// `DataUpload`) carries, pointing at the engine `Backup` name (which is a
/// UUID, and therefore already a valid label value — see
/// [`crate::sanitize`] for why that's not true of every label value this
/// system handles) that spawned it.
pub fn child_backup_name(meta: &ObjectMeta) -> Option<&str> {
    meta.labels.as_ref()?.get(LABEL_ENGINE_BACKUP_NAME).map(String::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn meta_with_labels(labels: &[(&str, &str)]) -> ObjectMeta {
        let mut map = BTreeMap::new();
        for (k, v) in labels {
            map.insert((*k).to_owned(), (*v).to_owned());
        }
        ObjectMeta {
            labels: Some(map),
            ..ObjectMeta::default()
        }
    }

    #[test]
    fn unmanaged_object_is_not_an_event_source() {
        let meta = ObjectMeta::default();
        assert!(!is_non_admin_managed(&meta));
    }

    #[test]
    fn managed_object_is_an_event_source() {
        let meta = meta_with_labels(&[(LABEL_NAC_MANAGED, LABEL_NAC_MANAGED_VALUE)]);
        assert!(is_non_admin_managed(&meta));
    }

    #[test]
    fn child_backup_name_reads_label() {
        let meta = meta_with_labels(&[(LABEL_ENGINE_BACKUP_NAME, "uuid-1")]);
        assert_eq!(child_backup_name(&meta), Some("uuid-1"));
        assert_eq!(child_backup_name(&ObjectMeta::default()), None);
    }
}
