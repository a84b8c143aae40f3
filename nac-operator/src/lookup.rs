//! Engine-side lookup by UUID (spec.md §4.3).

use kube::api::{Api, ListParams};
use kube::{Resource, ResourceExt};
use serde::de::DeserializeOwned;
use std::fmt::Debug;

use crate::error::Error;
use crate::naming::uuid_label_selector;

/// Pure selection rule over an already-fetched list: 0 matches is fine
/// (nothing bound yet), 1 match is the binding, more than 1 is an I1
/// violation that must never be auto-repaired.
pub fn select_unique<T: Clone + ResourceExt>(items: Vec<T>, uuid: &str) -> Result<Option<T>, Error> {
    match items.len() {
        0 => Ok(None),
        1 => Ok(items.into_iter().next()),
        count => Err(Error::AmbiguousBinding {
            uuid: uuid.to_owned(),
            count,
        }),
    }
}

/// Lists engine objects of kind `T` in the operator namespace by UUID label
/// and applies [`select_unique`] (spec.md §4.3 `findByUUID`).
pub async fn find_by_uuid<T>(api: &Api<T>, uuid: &str) -> Result<Option<T>, Error>
where
    T: Clone
        + Debug
        + DeserializeOwned
        + Resource
        + ResourceExt
        + serde::Serialize
        + 'static,
{
    let lp = ListParams::default().labels(&uuid_label_selector(uuid));
    let list = api.list(&lp).await?;
    select_unique(list.items, uuid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use nac_api::engine::Backup;

    fn backup_named(name: &str) -> Backup {
        Backup {
            metadata: ObjectMeta {
                name: Some(name.to_owned()),
                ..ObjectMeta::default()
            },
            spec: nac_api::engine::BackupSpec {
                included_namespaces: Vec::new(),
                excluded_namespaces: Vec::new(),
                included_resources: Vec::new(),
                excluded_resources: Vec::new(),
                included_cluster_scoped_resources: Vec::new(),
                excluded_cluster_scoped_resources: Vec::new(),
                included_namespace_scoped_resources: Vec::new(),
                excluded_namespace_scoped_resources: Vec::new(),
                storage_location: String::new(),
                ttl: None,
                snapshot_volumes: None,
                default_volumes_to_fs_backup: None,
            },
            status: None,
        }
    }

    #[test]
    fn zero_matches_is_not_an_error() {
        let result = select_unique::<Backup>(Vec::new(), "uuid-1").unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn one_match_is_the_binding() {
        let result = select_unique(vec![backup_named("uuid-1")], "uuid-1").unwrap();
        assert_eq!(result.unwrap().metadata.name.as_deref(), Some("uuid-1"));
    }

    #[test]
    fn multiple_matches_is_ambiguous_binding() {
        let err = select_unique(
            vec![backup_named("uuid-1"), backup_named("uuid-1-dup")],
            "uuid-1",
        )
        .unwrap_err();
        assert!(matches!(err, Error::AmbiguousBinding { count: 2, .. }));
        assert!(err.is_terminal());
    }
}
