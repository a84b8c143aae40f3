//! `NonAdminBackup` reconciler (spec.md §4.5) — the core state machine this
//! system exists to run. The other three tenant kinds are thinner
//! structural variants of this same shape (spec.md §9 "Polymorphism over
//! tenant kinds": duplicated per kind rather than factored, as the spec
//! permits).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use kube::api::{Api, DeleteParams, ListParams, Patch, PatchParams};
use kube::runtime::controller::{Action, Controller};
use kube::runtime::reflector::{self, ObjectRef, Store};
use kube::runtime::watcher;
use kube::{Resource, ResourceExt};
use serde_json::json;
use tracing::{debug, info, warn};

use nac_api::backup::{
    NonAdminBackup, NonAdminBackupStatus, Phase, VeleroBackupRef, VeleroDeleteBackupRequestRef,
};
use nac_api::bsl::NonAdminBackupStorageLocation;
use nac_api::condition::{condition_is_true, set_condition, ConditionStatus};
use nac_api::consts::{condition_type, reason, FINALIZER_NAME, LABEL_ENGINE_BACKUP_NAME};
use nac_api::engine::{
    Backup, BackupSpec as EngineBackupSpec, BackupStatus as EngineBackupStatus, DataUpload,
    DeleteBackupRequest, DeleteBackupRequestSpec, Origin, PodVolumeBackup,
};
use nac_api::restore::NonAdminRestore;

use crate::controller::{Context, FIELD_MANAGER};
use crate::error::{error_policy, Error};
use crate::naming;
use crate::predicates;
use crate::sanitize::sanitize_label_value;
use crate::status;
use crate::validation::{self, StorageLocationLookup};

/// Runs the `NonAdminBackup` controller to completion (spec.md §4.7).
///
/// A second, independent reflector of `NonAdminBackup` is kept purely so the
/// engine-side watch mappers below can answer "which tenant keys exist right
/// now" synchronously, without a live API call inside a `watches` callback
/// (spec.md §9 "Event fan-in"; there is no ownerReference to ride on across
/// namespaces, so `.owns()` does not apply here).
pub async fn run(ctx: Arc<Context>) {
    let backups: Api<NonAdminBackup> = Api::all(ctx.client.clone());
    let engine_backups: Api<Backup> = Api::namespaced(ctx.client.clone(), &ctx.operator_namespace);
    let pod_volume_backups: Api<PodVolumeBackup> =
        Api::namespaced(ctx.client.clone(), &ctx.operator_namespace);
    let data_uploads: Api<DataUpload> = Api::namespaced(ctx.client.clone(), &ctx.operator_namespace);

    let (store, writer) = reflector::store::<NonAdminBackup>();
    let keyed_watch = reflector::reflector(writer, watcher::watcher(backups.clone(), watcher::Config::default()));
    tokio::spawn(async move {
        futures::pin_mut!(keyed_watch);
        while keyed_watch.next().await.is_some() {}
    });

    Controller::new(backups, watcher::Config::default())
        .watches(engine_backups, watcher::Config::default(), {
            let store = store.clone();
            move |obj| queue_affecting_keys(&store, &obj)
        })
        .watches(pod_volume_backups, watcher::Config::default(), {
            let store = store.clone();
            move |obj| child_to_tenant_key(&store, &obj.metadata)
        })
        .watches(data_uploads, watcher::Config::default(), {
            let store = store.clone();
            move |obj| child_to_tenant_key(&store, &obj.metadata)
        })
        .shutdown_on_signal()
        .run(reconcile, error_policy, ctx)
        .for_each(|res| async move {
            if let Err(err) = res {
                warn!("non-admin-backup reconcile failed: {err}");
            }
        })
        .await;
}

/// Any create/delete/update of an engine `Backup` can shift every tenant
/// object's queue position (spec.md §4.6 "Queue-position-affecting events");
/// this fans out to every currently known tenant key rather than trying to
/// compute which ones actually moved.
fn queue_affecting_keys(store: &Store<NonAdminBackup>, obj: &Backup) -> Vec<ObjectRef<NonAdminBackup>> {
    if !predicates::is_non_admin_managed(&obj.metadata) {
        return Vec::new();
    }
    store.state().iter().map(|nab| ObjectRef::from_obj(nab.as_ref())).collect()
}

/// Maps a child workload resource (`PodVolumeBackup`/`DataUpload`) back to
/// the single tenant object whose `nacUUID` matches its `backupName` label
/// (spec.md §4.6 "Child-resource events").
fn child_to_tenant_key(
    store: &Store<NonAdminBackup>,
    meta: &k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta,
) -> Vec<ObjectRef<NonAdminBackup>> {
    let Some(uuid) = predicates::child_backup_name(meta) else {
        return Vec::new();
    };
    store
        .state()
        .iter()
        .find(|nab| {
            nab.status
                .as_ref()
                .and_then(|s| s.velero_backup.as_ref())
                .map(|v| &v.nac_uuid == uuid)
                .unwrap_or(false)
        })
        .map(|nab| vec![ObjectRef::from_obj(nab.as_ref())])
        .unwrap_or_default()
}

/// I5: writes `next` only if the current phase's DAG allows it, otherwise
/// leaves the phase untouched rather than corrupting the transition history.
fn set_phase(status: &mut NonAdminBackupStatus, next: Phase) {
    let allowed = status.phase.map(|current| current.can_transition_to(next)).unwrap_or(true);
    if allowed {
        status.phase = Some(next);
    }
}

fn id(nab: &NonAdminBackup) -> Result<(String, String), Error> {
    let namespace = nab
        .metadata
        .namespace
        .clone()
        .ok_or(Error::MissingField(".metadata.namespace"))?;
    let name = nab
        .metadata
        .name
        .clone()
        .ok_or(Error::MissingField(".metadata.name"))?;
    Ok((namespace, name))
}

struct BslApiLookup {
    api: Api<NonAdminBackupStorageLocation>,
}

#[async_trait]
impl StorageLocationLookup for BslApiLookup {
    async fn lookup(
        &self,
        _namespace: &str,
        name: &str,
    ) -> Result<Option<nac_api::bsl::NonAdminBackupStorageLocationStatus>, Error> {
        match self.api.get_opt(name).await? {
            Some(obj) => Ok(obj.status),
            None => Ok(None),
        }
    }
}

#[tracing::instrument(skip(nab, ctx), fields(name = %nab.name_any(), namespace = ?nab.namespace()))]
async fn reconcile(nab: Arc<NonAdminBackup>, ctx: Arc<Context>) -> Result<Action, Error> {
    debug!("reconciling NonAdminBackup");
    if nab.spec.delete_backup {
        graceful_delete(&nab, &ctx).await
    } else if nab.meta().deletion_timestamp.is_some() {
        direct_delete(&nab, &ctx).await
    } else {
        let sync_uuid = nab
            .metadata
            .labels
            .as_ref()
            .and_then(naming::sync_uuid)
            .map(str::to_owned);
        create_or_update(&nab, &ctx, sync_uuid).await
    }
}

/// Create/update path and sync-import path (spec.md §4.5): identical except
/// step 5's behavior when no engine object is found, selected by whether
/// `sync_uuid` is `Some`.
async fn create_or_update(
    nab: &NonAdminBackup,
    ctx: &Context,
    sync_uuid: Option<String>,
) -> Result<Action, Error> {
    let (ns, name) = id(nab)?;
    let api: Api<NonAdminBackup> = Api::namespaced(ctx.client.clone(), &ns);

    // Step 1: initialize phase.
    if nab.status.as_ref().and_then(|s| s.phase).is_none() {
        patch_status(&api, &name, |status| {
            set_phase(status, Phase::New);
        })
        .await?;
    }

    // Step 2: validate & enforce.
    let mut engine_spec = nab.spec.backup_spec.clone().unwrap_or_default();
    if let Some(storage_location) = &nab.spec.backup_storage_location {
        let lookup = BslApiLookup {
            api: Api::namespaced(ctx.client.clone(), &ns),
        };
        match validation::validate_storage_location(&lookup, &ns, storage_location).await {
            Ok(resolved_name) => engine_spec.storage_location = resolved_name,
            Err(err) => return fail_invalid_spec(&api, &name, &err).await,
        }
    }
    if let Err(err) =
        validation::validate_and_enforce(&mut engine_spec, ctx.enforced_backup_spec.as_ref(), &ns)
    {
        return fail_invalid_spec(&api, &name, &err).await;
    }

    // Step 3: assign UUID (re-fetch first — spec.md §9 "Re-fetch before UUID
    // stamp").
    let current = api.get(&name).await?;
    let uuid = match sync_uuid.clone() {
        Some(uuid) => uuid,
        None => match current.status.as_ref().and_then(|s| s.velero_backup.as_ref()) {
            Some(existing) => existing.nac_uuid.clone(),
            None => {
                let uuid = naming::generate_uuid();
                patch_status(&api, &name, |status| {
                    status.velero_backup = Some(VeleroBackupRef {
                        nac_uuid: uuid.clone(),
                        namespace: ctx.operator_namespace.clone(),
                        name: uuid.clone(),
                        spec: None,
                        status: None,
                    });
                })
                .await?;
                uuid
            }
        },
    };

    // Step 4: ensure finalizer (I4: added before the engine object exists).
    ensure_finalizer(&api, &name, &current).await?;

    // Step 5: create or adopt the engine object.
    let engine_api: Api<Backup> = Api::namespaced(ctx.client.clone(), &ctx.operator_namespace);
    let existing = match crate::lookup::find_by_uuid(&engine_api, &uuid).await {
        Ok(existing) => existing,
        Err(Error::AmbiguousBinding { uuid, count }) => {
            return fail_terminal(
                &api,
                &name,
                reason::AMBIGUOUS_BINDING,
                format!("{count} engine Backup objects carry uuid \"{uuid}\""),
            )
            .await;
        }
        Err(err) => return Err(err),
    };
    let engine_backup = match existing {
        None => {
            let was_created = current
                .status
                .as_ref()
                .map(|s| condition_is_true(&s.conditions, condition_type::QUEUED))
                .unwrap_or(false);
            if was_created {
                return fail_terminal(
                    &api,
                    &name,
                    reason::ENGINE_OBJECT_GONE,
                    "the backing engine Backup has been deleted outside this system; \
                     create a new NonAdminBackup to request another backup"
                        .to_owned(),
                )
                .await;
            }
            if sync_uuid.is_some() {
                return fail_terminal(
                    &api,
                    &name,
                    reason::SYNC_TARGET_MISSING,
                    format!("no engine Backup found with uuid \"{uuid}\" to sync-import"),
                )
                .await;
            }
            let origin = Origin {
                namespace: ns.clone(),
                name: name.clone(),
                uid: current.metadata.uid.clone().unwrap_or_default(),
            };
            create_engine_backup(&engine_api, &ctx.operator_namespace, &uuid, &origin, engine_spec).await?
        }
        Some(found) => {
            if !naming::origin_matches(&found.metadata, &ns) {
                return fail_terminal(
                    &api,
                    &name,
                    reason::FOREIGN_ENGINE_OBJECT,
                    format!("engine Backup \"{uuid}\" is not owned by namespace \"{ns}\""),
                )
                .await;
            }
            found
        }
    };

    // Step 6: project status.
    project_status(&api, ctx, &name, &uuid, &engine_backup).await?;

    Ok(Action::requeue(Duration::from_secs(5 * 60)))
}

async fn create_engine_backup(
    engine_api: &Api<Backup>,
    operator_namespace: &str,
    uuid: &str,
    origin: &Origin,
    spec: EngineBackupSpec,
) -> Result<Backup, Error> {
    let backup = Backup {
        metadata: naming::engine_object_metadata(operator_namespace, uuid, origin),
        spec,
        status: None,
    };
    let created = engine_api
        .patch(uuid, &PatchParams::apply(FIELD_MANAGER).force(), &Patch::Apply(backup))
        .await?;
    Ok(created)
}

async fn project_status(
    api: &Api<NonAdminBackup>,
    ctx: &Context,
    name: &str,
    uuid: &str,
    engine_backup: &Backup,
) -> Result<(), Error> {
    let queue_position = match list_siblings_for_queue(ctx, uuid).await {
        Ok(position) => Some(position),
        Err(err) => {
            // Informational failure (spec.md §7): logged, status update
            // proceeds without this field.
            warn!("queue position lookup failed: {err}");
            None
        }
    };

    let engine_name = engine_backup.name_any();
    let pvb_counters = match list_pod_volume_backup_phases(ctx, &engine_name).await {
        Ok(phases) => Some(status::aggregate_pod_volume_backups(&phases)),
        Err(err) => {
            warn!("pod volume backup aggregation failed: {err}");
            None
        }
    };
    let du_counters = match list_data_upload_phases(ctx, &engine_name).await {
        Ok(phases) => Some(status::aggregate_data_uploads(&phases)),
        Err(err) => {
            warn!("data upload aggregation failed: {err}");
            None
        }
    };

    patch_status(api, name, |status| {
        set_phase(status, Phase::Created);
        set_condition(
            &mut status.conditions,
            condition_type::QUEUED,
            ConditionStatus::True,
            reason::BACKUP_SCHEDULED,
            "the engine Backup has been created and is being tracked",
        );
        let previous = status.velero_backup.clone();
        let new_ref = VeleroBackupRef {
            nac_uuid: uuid.to_owned(),
            namespace: ctx.operator_namespace.clone(),
            name: engine_name.clone(),
            spec: Some(engine_backup.spec.clone()),
            status: engine_backup.status.clone(),
        };
        // spec.md §4.4: skip the write entirely when nothing would change.
        if previous.as_ref() != Some(&new_ref) {
            status.velero_backup = Some(new_ref);
        }
        if let Some(position) = queue_position {
            status.queue_info = Some(nac_api::backup::QueueInfo {
                estimated_queue_position: position,
            });
        }
        if let Some(counters) = pvb_counters {
            status.file_system_pod_volume_backups = Some(counters);
        }
        if let Some(counters) = du_counters {
            status.data_mover_data_uploads = Some(counters);
        }
    })
    .await?;
    Ok(())
}

async fn list_siblings_for_queue(ctx: &Context, uuid: &str) -> Result<i64, Error> {
    let engine_api: Api<Backup> = Api::namespaced(ctx.client.clone(), &ctx.operator_namespace);
    let this = engine_api.get(uuid).await?;
    let this_creation = this
        .meta()
        .creation_timestamp
        .as_ref()
        .map(|t| t.0)
        .ok_or(Error::MissingField(".metadata.creationTimestamp"))?;
    let all = engine_api
        .list(&ListParams::default().labels(&naming::managed_label_selector()))
        .await?;
    let siblings: Vec<(chrono::DateTime<chrono::Utc>, EngineBackupStatus)> = all
        .items
        .into_iter()
        .filter_map(|item| {
            let created = item.meta().creation_timestamp.as_ref()?.0;
            let status = item.status.clone().unwrap_or_default();
            Some((created, status))
        })
        .collect();
    Ok(status::compute_queue_position(this_creation, &siblings))
}

async fn list_pod_volume_backup_phases(ctx: &Context, engine_backup_name: &str) -> Result<Vec<Option<String>>, Error> {
    let api: Api<PodVolumeBackup> = Api::namespaced(ctx.client.clone(), &ctx.operator_namespace);
    let selector = format!(
        "{LABEL_ENGINE_BACKUP_NAME}={}",
        sanitize_label_value(engine_backup_name)
    );
    let list = api.list(&ListParams::default().labels(&selector)).await?;
    Ok(list.items.into_iter().map(|i| i.status.and_then(|s| s.phase)).collect())
}

async fn list_data_upload_phases(ctx: &Context, engine_backup_name: &str) -> Result<Vec<Option<String>>, Error> {
    let api: Api<DataUpload> = Api::namespaced(ctx.client.clone(), &ctx.operator_namespace);
    let selector = format!(
        "{LABEL_ENGINE_BACKUP_NAME}={}",
        sanitize_label_value(engine_backup_name)
    );
    let list = api.list(&ListParams::default().labels(&selector)).await?;
    Ok(list.items.into_iter().map(|i| i.status.and_then(|s| s.phase)).collect())
}

/// Graceful-delete path (spec.md §4.5): tenant requested permanent removal
/// of the backed-up data.
async fn graceful_delete(nab: &NonAdminBackup, ctx: &Context) -> Result<Action, Error> {
    let (ns, name) = id(nab)?;
    let api: Api<NonAdminBackup> = Api::namespaced(ctx.client.clone(), &ns);

    patch_status(&api, &name, |status| {
        set_phase(status, Phase::Deleting);
        set_condition(
            &mut status.conditions,
            condition_type::DELETING,
            ConditionStatus::True,
            reason::DELETION_PENDING,
            "permanently deleting backed-up data",
        );
    })
    .await?;

    if nab.meta().deletion_timestamp.is_none() {
        api.delete(&name, &DeleteParams::default()).await?;
        return Ok(Action::requeue(Duration::from_secs(1)));
    }

    let restores: Api<NonAdminRestore> = Api::namespaced(ctx.client.clone(), &ns);
    delete_dependent_restores(&restores, &name).await?;

    let uuid = match nab.status.as_ref().and_then(|s| s.velero_backup.as_ref()) {
        Some(v) => v.nac_uuid.clone(),
        None => {
            remove_finalizer(&api, &name, nab).await?;
            return Ok(Action::await_change());
        }
    };

    let engine_api: Api<Backup> = Api::namespaced(ctx.client.clone(), &ctx.operator_namespace);
    if crate::lookup::find_by_uuid(&engine_api, &uuid).await?.is_none() {
        remove_finalizer(&api, &name, nab).await?;
        return Ok(Action::await_change());
    }

    if nab
        .status
        .as_ref()
        .and_then(|s| s.velero_delete_backup_request.as_ref())
        .is_none()
    {
        create_delete_backup_request(&api, &ctx.client, &name, &ctx.operator_namespace, &uuid).await?;
    }

    Ok(Action::requeue(Duration::from_secs(30)))
}

async fn delete_dependent_restores(restores: &Api<NonAdminRestore>, backup_name: &str) -> Result<(), Error> {
    let list = restores.list(&ListParams::default()).await?;
    for restore in list.items {
        if restore.spec.backup_name == backup_name {
            if let Some(name) = restore.metadata.name.clone() {
                restores.delete(&name, &DeleteParams::default()).await?;
            }
        }
    }
    Ok(())
}

async fn create_delete_backup_request(
    api: &Api<NonAdminBackup>,
    client: &kube::Client,
    name: &str,
    operator_namespace: &str,
    uuid: &str,
) -> Result<(), Error> {
    let dbr_api: Api<DeleteBackupRequest> = Api::namespaced(client.clone(), operator_namespace);

    let mut generated_name = format!("{uuid}-");
    let mut attempts = 0;
    let created = loop {
        let candidate = DeleteBackupRequest {
            metadata: k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta {
                generate_name: Some(generated_name.clone()),
                namespace: Some(operator_namespace.to_owned()),
                labels: Some(naming::engine_labels(uuid)),
                ..Default::default()
            },
            spec: DeleteBackupRequestSpec {
                backup_name: uuid.to_owned(),
            },
            status: None,
        };
        match dbr_api.create(&kube::api::PostParams::default(), &candidate).await {
            Ok(created) => break created,
            Err(kube::Error::Api(err)) if err.code == 409 && attempts < 5 => {
                attempts += 1;
                generated_name = format!("{uuid}-retry-{attempts}-");
                continue;
            }
            Err(err) => return Err(err.into()),
        }
    };

    patch_status(api, name, |status| {
        status.velero_delete_backup_request = Some(VeleroDeleteBackupRequestRef {
            nac_uuid: uuid.to_owned(),
            namespace: operator_namespace.to_owned(),
            name: created.name_any(),
            status: None,
        });
    })
    .await
    .map(|_| ())
}

/// Direct-delete path (spec.md §4.5): `kubectl delete` without
/// `deleteBackup=true`; stored data must survive.
async fn direct_delete(nab: &NonAdminBackup, ctx: &Context) -> Result<Action, Error> {
    let (ns, name) = id(nab)?;
    let api: Api<NonAdminBackup> = Api::namespaced(ctx.client.clone(), &ns);

    patch_status(&api, &name, |status| {
        set_phase(status, Phase::Deleting);
        set_condition(
            &mut status.conditions,
            condition_type::DELETING,
            ConditionStatus::True,
            reason::DELETION_PENDING,
            "the backed-up data is retained; set deleteBackup=true to remove it permanently",
        );
    })
    .await?;

    let uuid = match nab.status.as_ref().and_then(|s| s.velero_backup.as_ref()) {
        Some(v) => v.nac_uuid.clone(),
        None => {
            remove_finalizer(&api, &name, nab).await?;
            return Ok(Action::await_change());
        }
    };

    if let Some(dbr) = nab
        .status
        .as_ref()
        .and_then(|s| s.velero_delete_backup_request.as_ref())
    {
        let dbr_api: Api<DeleteBackupRequest> = Api::namespaced(ctx.client.clone(), &ctx.operator_namespace);
        let _ = dbr_api.delete(&dbr.name, &DeleteParams::default()).await;
    }

    let engine_api: Api<Backup> = Api::namespaced(ctx.client.clone(), &ctx.operator_namespace);
    match crate::lookup::find_by_uuid(&engine_api, &uuid).await? {
        None => {
            remove_finalizer(&api, &name, nab).await?;
            Ok(Action::await_change())
        }
        Some(engine_backup) => {
            // A direct Delete on the engine Backup is metadata-only; the
            // engine does not treat it as a request to erase stored data.
            engine_api
                .delete(&engine_backup.name_any(), &DeleteParams::default())
                .await?;
            Ok(Action::requeue(Duration::from_secs(15)))
        }
    }
}

async fn ensure_finalizer(api: &Api<NonAdminBackup>, name: &str, current: &NonAdminBackup) -> Result<(), Error> {
    if current.metadata.finalizers.iter().flatten().any(|f| f == FINALIZER_NAME) {
        return Ok(());
    }
    let mut finalizers = current.metadata.finalizers.clone().unwrap_or_default();
    finalizers.push(FINALIZER_NAME.to_owned());
    api.patch(
        name,
        &PatchParams::default(),
        &Patch::Merge(json!({ "metadata": { "finalizers": finalizers } })),
    )
    .await?;
    Ok(())
}

async fn remove_finalizer(api: &Api<NonAdminBackup>, name: &str, current: &NonAdminBackup) -> Result<(), Error> {
    let finalizers: Vec<String> = current
        .metadata
        .finalizers
        .clone()
        .unwrap_or_default()
        .into_iter()
        .filter(|f| f != FINALIZER_NAME)
        .collect();
    api.patch(
        name,
        &PatchParams::default(),
        &Patch::Merge(json!({ "metadata": { "finalizers": finalizers } })),
    )
    .await?;
    Ok(())
}

async fn patch_status<F>(api: &Api<NonAdminBackup>, name: &str, mutate: F) -> Result<NonAdminBackup, Error>
where
    F: FnOnce(&mut NonAdminBackupStatus),
{
    let current = api.get_status(name).await?;
    let mut new_status = current.status.clone().unwrap_or_default();
    mutate(&mut new_status);
    if current.status.as_ref() == Some(&new_status) {
        return Ok(current);
    }
    let patched = api
        .patch_status(
            name,
            &PatchParams::default(),
            &Patch::Merge(json!({ "status": new_status })),
        )
        .await?;
    Ok(patched)
}

async fn fail_invalid_spec(api: &Api<NonAdminBackup>, name: &str, err: &Error) -> Result<Action, Error> {
    fail_terminal(api, name, reason::INVALID_BACKUP_SPEC, err.to_string()).await
}

async fn fail_terminal(
    api: &Api<NonAdminBackup>,
    name: &str,
    reason: &'static str,
    message: String,
) -> Result<Action, Error> {
    patch_status(api, name, |status| {
        set_phase(status, Phase::BackingOff);
        set_condition(
            &mut status.conditions,
            condition_type::ACCEPTED,
            ConditionStatus::False,
            reason,
            &message,
        );
    })
    .await?;
    info!(%reason, %message, "NonAdminBackup reconciliation failed terminally");
    Err(Error::terminal(reason, message))
}
