//! Spec validation & enforcement (spec.md §4.2).

use async_trait::async_trait;
use nac_api::bsl::NonAdminBackupStorageLocationStatus;
use nac_api::consts::NAC_INTERNAL_EXCLUDED_RESOURCES;
use nac_api::engine::BackupSpec as EngineBackupSpec;

use crate::error::Error;

/// Injected so `validate_and_enforce` stays testable without a live API
/// server; the controller supplies an implementation backed by
/// `kube::Api<NonAdminBackupStorageLocation>`.
#[async_trait]
pub trait StorageLocationLookup: Sync {
    /// Looks up a `NonAdminBackupStorageLocation` by name in `namespace`.
    /// Returns its promoted status, or `None` if no such object exists.
    async fn lookup(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<NonAdminBackupStorageLocationStatus>, Error>;
}

/// Rejects a tenant backup spec that names a namespace other than its own
/// (spec.md §4.2 "Reject tenant specs naming namespaces other than the
/// tenant's own").
pub fn reject_foreign_namespaces(
    spec: &EngineBackupSpec,
    tenant_namespace: &str,
) -> Result<(), Error> {
    let foreign = spec
        .included_namespaces
        .iter()
        .find(|ns| ns.as_str() != tenant_namespace && ns.as_str() != "*");
    if let Some(ns) = foreign {
        return Err(Error::terminal(
            nac_api::consts::reason::INVALID_BACKUP_SPEC,
            format!(
                "backupSpec.includedNamespaces references namespace \"{ns}\", \
                 only \"{tenant_namespace}\" is permitted"
            ),
        ));
    }
    Ok(())
}

/// I7: unconditionally confines the engine spec to exactly the tenant's own
/// namespace, regardless of what the tenant (validly) asked for.
pub fn confine_namespaces(spec: &mut EngineBackupSpec, tenant_namespace: &str) {
    spec.included_namespaces = vec![tenant_namespace.to_owned()];
    spec.excluded_namespaces.clear();
}

/// I6: merge admin-enforced fields into the tenant spec wherever the admin
/// field is non-default and the tenant's corresponding field is default.
/// Never overwrites a tenant-set value.
pub fn merge_enforced(tenant: &mut EngineBackupSpec, enforced: &EngineBackupSpec) {
    if tenant.storage_location.is_empty() && !enforced.storage_location.is_empty() {
        tenant.storage_location = enforced.storage_location.clone();
    }
    if tenant.ttl.is_none() {
        if let Some(ttl) = enforced.ttl.clone() {
            tenant.ttl = Some(ttl);
        }
    }
    if tenant.snapshot_volumes.is_none() {
        tenant.snapshot_volumes = enforced.snapshot_volumes;
    }
    if tenant.default_volumes_to_fs_backup.is_none() {
        tenant.default_volumes_to_fs_backup = enforced.default_volumes_to_fs_backup;
    }
    if tenant.included_resources.is_empty() {
        tenant.included_resources = enforced.included_resources.clone();
    }
}

/// Resource-exclusion policy (I7 enforcement, spec.md §4.2): always append
/// the NAC-internal resources to exclusion lists, preferring the scoped
/// vectors when any scoped filter is already in play, otherwise the legacy
/// unified vector.
pub fn apply_resource_exclusion_policy(spec: &mut EngineBackupSpec) {
    let scoped_in_use = !spec.included_cluster_scoped_resources.is_empty()
        || !spec.excluded_cluster_scoped_resources.is_empty()
        || !spec.included_namespace_scoped_resources.is_empty()
        || !spec.excluded_namespace_scoped_resources.is_empty();

    let target = if scoped_in_use {
        &mut spec.excluded_namespace_scoped_resources
    } else {
        &mut spec.excluded_resources
    };

    for resource in NAC_INTERNAL_EXCLUDED_RESOURCES {
        if !target.iter().any(|r| r == resource) {
            target.push((*resource).to_owned());
        }
    }
}

/// Confirms the tenant-named storage location exists and has been promoted
/// to a real engine location, and returns the *engine object's own name*
/// (spec.md §4.2) — never the tenant-chosen name, since the engine object is
/// always named after its own minted UUID, not the `NonAdminBackupStorageLocation`
/// it was promoted from.
pub async fn validate_storage_location(
    lookup: &dyn StorageLocationLookup,
    tenant_namespace: &str,
    storage_location_name: &str,
) -> Result<String, Error> {
    match lookup.lookup(tenant_namespace, storage_location_name).await? {
        Some(status) if status.phase == Some(nac_api::bsl::BslPhase::Available) => status
            .velero_backup_storage_location
            .map(|v| v.name)
            .ok_or(Error::MissingField(".status.veleroBackupStorageLocation.name")),
        Some(_) => Err(Error::terminal(
            nac_api::consts::reason::INVALID_BACKUP_SPEC,
            format!(
                "storage location \"{storage_location_name}\" exists but is not yet available"
            ),
        )),
        None => Err(Error::terminal(
            nac_api::consts::reason::INVALID_BACKUP_SPEC,
            format!(
                "no NonAdminBackupStorageLocation named \"{storage_location_name}\" in namespace \"{tenant_namespace}\""
            ),
        )),
    }
}

/// Runs the full validate+enforce pipeline in the order spec.md §4.2
/// describes it, mutating `tenant_spec` in place.
pub fn validate_and_enforce(
    tenant_spec: &mut EngineBackupSpec,
    enforced_spec: Option<&EngineBackupSpec>,
    tenant_namespace: &str,
) -> Result<(), Error> {
    reject_foreign_namespaces(tenant_spec, tenant_namespace)?;
    if let Some(enforced) = enforced_spec {
        merge_enforced(tenant_spec, enforced);
    }
    confine_namespaces(tenant_spec, tenant_namespace);
    apply_resource_exclusion_policy(tenant_spec);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> EngineBackupSpec {
        EngineBackupSpec {
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
        }
    }

    #[test]
    fn rejects_foreign_namespace() {
        let mut s = spec();
        s.included_namespaces = vec!["team-b".to_owned()];
        let err = reject_foreign_namespaces(&s, "team-a").unwrap_err();
        assert!(err.is_terminal());
    }

    #[test]
    fn confinement_overwrites_regardless_of_tenant_input() {
        let mut s = spec();
        s.included_namespaces = vec!["team-a".to_owned()];
        s.excluded_namespaces = vec!["other".to_owned()];
        confine_namespaces(&mut s, "team-a");
        assert_eq!(s.included_namespaces, vec!["team-a".to_owned()]);
        assert!(s.excluded_namespaces.is_empty());
    }

    #[test]
    fn enforced_ttl_applies_only_when_tenant_omits_it() {
        let mut tenant = spec();
        let mut enforced = spec();
        enforced.ttl = Some("72h".to_owned());

        merge_enforced(&mut tenant, &enforced);
        assert_eq!(tenant.ttl.as_deref(), Some("72h"));

        let mut tenant_with_ttl = spec();
        tenant_with_ttl.ttl = Some("1h".to_owned());
        merge_enforced(&mut tenant_with_ttl, &enforced);
        assert_eq!(tenant_with_ttl.ttl.as_deref(), Some("1h"));
    }

    #[test]
    fn exclusion_policy_prefers_scoped_vector_when_in_use() {
        let mut s = spec();
        s.excluded_cluster_scoped_resources = vec!["secrets".to_owned()];
        apply_resource_exclusion_policy(&mut s);
        assert!(s.excluded_resources.is_empty());
        for r in NAC_INTERNAL_EXCLUDED_RESOURCES {
            assert!(s.excluded_namespace_scoped_resources.contains(&r.to_string()));
        }
    }

    #[test]
    fn exclusion_policy_falls_back_to_legacy_vector() {
        let mut s = spec();
        apply_resource_exclusion_policy(&mut s);
        assert!(s.excluded_namespace_scoped_resources.is_empty());
        for r in NAC_INTERNAL_EXCLUDED_RESOURCES {
            assert!(s.excluded_resources.contains(&r.to_string()));
        }
    }

    #[test]
    fn exclusion_policy_is_idempotent() {
        let mut s = spec();
        apply_resource_exclusion_policy(&mut s);
        let first_len = s.excluded_resources.len();
        apply_resource_exclusion_policy(&mut s);
        assert_eq!(s.excluded_resources.len(), first_len);
    }

    struct FakeLookup(Option<NonAdminBackupStorageLocationStatus>);

    #[async_trait]
    impl StorageLocationLookup for FakeLookup {
        async fn lookup(
            &self,
            _namespace: &str,
            _name: &str,
        ) -> Result<Option<NonAdminBackupStorageLocationStatus>, Error> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn missing_storage_location_is_terminal() {
        let lookup = FakeLookup(None);
        let err = validate_storage_location(&lookup, "team-a", "ghost")
            .await
            .unwrap_err();
        assert!(err.is_terminal());
    }

    #[tokio::test]
    async fn unpromoted_storage_location_is_terminal() {
        let lookup = FakeLookup(Some(NonAdminBackupStorageLocationStatus {
            phase: Some(nac_api::bsl::BslPhase::Unavailable),
            ..Default::default()
        }));
        let err = validate_storage_location(&lookup, "team-a", "slow")
            .await
            .unwrap_err();
        assert!(err.is_terminal());
    }

    #[tokio::test]
    async fn available_storage_location_resolves_to_engine_name() {
        let lookup = FakeLookup(Some(NonAdminBackupStorageLocationStatus {
            phase: Some(nac_api::bsl::BslPhase::Available),
            velero_backup_storage_location: Some(nac_api::bsl::VeleroBslRef {
                nac_uuid: "uuid-1".to_owned(),
                namespace: "openshift-adp".to_owned(),
                name: "uuid-1".to_owned(),
            }),
            ..Default::default()
        }));
        let resolved = validate_storage_location(&lookup, "team-a", "fast")
            .await
            .unwrap();
        assert_eq!(resolved, "uuid-1");
    }

    #[tokio::test]
    async fn available_storage_location_without_engine_ref_is_a_missing_field() {
        let lookup = FakeLookup(Some(NonAdminBackupStorageLocationStatus {
            phase: Some(nac_api::bsl::BslPhase::Available),
            ..Default::default()
        }));
        let err = validate_storage_location(&lookup, "team-a", "fast")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MissingField(_)));
    }
}
