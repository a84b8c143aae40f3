//! Naming & labeling (spec.md §4.1). Pure functions only — no API calls —
//! so the binding rules are testable without a cluster.

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use nac_api::consts::{
    ANNOTATION_ORIGIN_NAME, ANNOTATION_ORIGIN_NAMESPACE, ANNOTATION_ORIGIN_UID,
    LABEL_NAC_MANAGED, LABEL_NAC_MANAGED_VALUE, LABEL_NAC_ORIGIN_UUID, LABEL_SYNC_UUID,
};
use nac_api::engine::Origin;
use uuid::Uuid;

/// A freshly minted NACUUID, used verbatim unless the tenant object opts
/// into sync-import.
pub fn generate_uuid() -> String {
    Uuid::new_v4().to_string()
}

/// If the tenant object carries a non-empty sync label, its value is used as
/// the UUID instead of minting a new one (spec.md §4.1).
pub fn sync_uuid(labels: &BTreeMap<String, String>) -> Option<&str> {
    labels
        .get(LABEL_SYNC_UUID)
        .map(String::as_str)
        .filter(|v| !v.is_empty())
}

/// Labels stamped onto every engine object this system creates (spec.md §6).
pub fn engine_labels(uuid: &str) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    labels.insert(LABEL_NAC_ORIGIN_UUID.to_owned(), uuid.to_owned());
    labels.insert(
        LABEL_NAC_MANAGED.to_owned(),
        LABEL_NAC_MANAGED_VALUE.to_owned(),
    );
    labels
}

/// Full metadata (name, namespace, labels, annotations) for a new engine
/// object bound to `origin` (spec.md I2, I3).
pub fn engine_object_metadata(operator_namespace: &str, uuid: &str, origin: &Origin) -> ObjectMeta {
    ObjectMeta {
        name: Some(uuid.to_owned()),
        namespace: Some(operator_namespace.to_owned()),
        labels: Some(engine_labels(uuid)),
        annotations: Some(nac_api::engine::origin_annotations(origin)),
        ..ObjectMeta::default()
    }
}

/// Label selector string matching exactly one UUID (spec.md §4.3).
pub fn uuid_label_selector(uuid: &str) -> String {
    format!("{LABEL_NAC_ORIGIN_UUID}={uuid}")
}

/// Label selector string matching every engine object this system manages,
/// regardless of UUID (spec.md §4.6 "carry the non-admin marker label").
pub fn managed_label_selector() -> String {
    format!("{LABEL_NAC_MANAGED}={LABEL_NAC_MANAGED_VALUE}")
}

/// Reads the origin annotation triple off an engine object's metadata. Used
/// by event fan-in handlers and by I3 verification; absent or partial
/// annotations are treated as "no origin", never guessed from names (spec.md
/// §9 "Event fan-in").
pub fn read_origin(meta: &ObjectMeta) -> Option<Origin> {
    let annotations = meta.annotations.as_ref()?;
    Some(Origin {
        namespace: annotations.get(ANNOTATION_ORIGIN_NAMESPACE)?.clone(),
        name: annotations.get(ANNOTATION_ORIGIN_NAME)?.clone(),
        uid: annotations.get(ANNOTATION_ORIGIN_UID)?.clone(),
    })
}

/// I3: an engine object is foreign unless its recorded origin namespace
/// matches the tenant namespace doing the reconciling.
pub fn origin_matches(meta: &ObjectMeta, tenant_namespace: &str) -> bool {
    read_origin(meta).is_some_and(|origin| origin.namespace == tenant_namespace)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels_with(key: &str, value: &str) -> BTreeMap<String, String> {
        let mut m = BTreeMap::new();
        m.insert(key.to_owned(), value.to_owned());
        m
    }

    #[test]
    fn sync_uuid_requires_non_empty_value() {
        assert_eq!(sync_uuid(&BTreeMap::new()), None);
        assert_eq!(sync_uuid(&labels_with(LABEL_SYNC_UUID, "")), None);
        assert_eq!(
            sync_uuid(&labels_with(LABEL_SYNC_UUID, "abc-123")),
            Some("abc-123")
        );
    }

    #[test]
    fn generated_uuids_are_unique() {
        assert_ne!(generate_uuid(), generate_uuid());
    }

    #[test]
    fn engine_metadata_carries_uuid_as_name() {
        let origin = Origin {
            namespace: "team-a".to_owned(),
            name: "db".to_owned(),
            uid: "uid-1".to_owned(),
        };
        let meta = engine_object_metadata("openshift-adp", "uuid-1", &origin);
        assert_eq!(meta.name.as_deref(), Some("uuid-1"));
        assert_eq!(meta.namespace.as_deref(), Some("openshift-adp"));
        assert_eq!(
            meta.labels.as_ref().unwrap().get(LABEL_NAC_ORIGIN_UUID),
            Some(&"uuid-1".to_owned())
        );
    }

    #[test]
    fn origin_roundtrips_through_annotations() {
        let origin = Origin {
            namespace: "team-a".to_owned(),
            name: "db".to_owned(),
            uid: "uid-1".to_owned(),
        };
        let meta = engine_object_metadata("openshift-adp", "uuid-1", &origin);
        assert_eq!(read_origin(&meta), Some(origin.clone()));
        assert!(origin_matches(&meta, "team-a"));
        assert!(!origin_matches(&meta, "team-b"));
    }

    #[test]
    fn missing_annotations_are_not_a_match() {
        let meta = ObjectMeta::default();
        assert_eq!(read_origin(&meta), None);
        assert!(!origin_matches(&meta, "team-a"));
    }
}
