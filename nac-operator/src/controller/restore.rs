//! `NonAdminRestore` reconciler — a structural variant of
//! [`crate::controller::backup`] (spec.md §9 "Polymorphism over tenant
//! kinds"). No queue position, no volume/data-mover aggregation, and the
//! "backup" it restores from must already exist and be in terminal phase
//! `Created` before a sync can begin.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use kube::api::{Api, Patch, PatchParams};
use kube::runtime::controller::{Action, Controller};
use kube::runtime::watcher;
use kube::{Resource, ResourceExt};
use serde_json::json;
use tracing::{debug, warn};

use nac_api::backup::{NonAdminBackup, Phase};
use nac_api::condition::{set_condition, ConditionStatus};
use nac_api::consts::{condition_type, reason, FINALIZER_NAME};
use nac_api::engine::{Origin, Restore};
use nac_api::restore::{NonAdminRestore, NonAdminRestoreStatus, VeleroRestoreRef};

use crate::controller::{Context, FIELD_MANAGER};
use crate::error::{error_policy, Error};
use crate::naming;

pub async fn run(ctx: Arc<Context>) {
    let restores: Api<NonAdminRestore> = Api::all(ctx.client.clone());
    Controller::new(restores, watcher::Config::default())
        .shutdown_on_signal()
        .run(reconcile, error_policy, ctx)
        .for_each(|res| async move {
            if let Err(err) = res {
                warn!("non-admin-restore reconcile failed: {err}");
            }
        })
        .await;
}

fn id(nar: &NonAdminRestore) -> Result<(String, String), Error> {
    let namespace = nar
        .metadata
        .namespace
        .clone()
        .ok_or(Error::MissingField(".metadata.namespace"))?;
    let name = nar
        .metadata
        .name
        .clone()
        .ok_or(Error::MissingField(".metadata.name"))?;
    Ok((namespace, name))
}

fn set_phase(status: &mut NonAdminRestoreStatus, next: Phase) {
    let allowed = status.phase.map(|current| current.can_transition_to(next)).unwrap_or(true);
    if allowed {
        status.phase = Some(next);
    }
}

#[tracing::instrument(skip(nar, ctx), fields(name = %nar.name_any(), namespace = ?nar.namespace()))]
async fn reconcile(nar: Arc<NonAdminRestore>, ctx: Arc<Context>) -> Result<Action, Error> {
    debug!("reconciling NonAdminRestore");
    if nar.meta().deletion_timestamp.is_some() {
        finalize_delete(&nar, &ctx).await
    } else {
        create_or_update(&nar, &ctx).await
    }
}

async fn create_or_update(nar: &NonAdminRestore, ctx: &Context) -> Result<Action, Error> {
    let (ns, name) = id(nar)?;
    let api: Api<NonAdminRestore> = Api::namespaced(ctx.client.clone(), &ns);

    if nar.status.as_ref().and_then(|s| s.phase).is_none() {
        patch_status(&api, &name, |status| set_phase(status, Phase::New)).await?;
    }

    // The backup it targets must live in the same namespace and already be
    // bound to an engine Backup.
    let backups: Api<NonAdminBackup> = Api::namespaced(ctx.client.clone(), &ns);
    let target = match backups.get_opt(&nar.spec.backup_name).await? {
        Some(b) => b,
        None => {
            return fail_terminal(
                &api,
                &name,
                reason::INVALID_RESTORE_SPEC,
                format!("no NonAdminBackup named \"{}\" in this namespace", nar.spec.backup_name),
            )
            .await;
        }
    };
    let backup_uuid = match target.status.as_ref().and_then(|s| s.velero_backup.as_ref()) {
        Some(v) => v.nac_uuid.clone(),
        None => {
            return fail_terminal(
                &api,
                &name,
                reason::INVALID_RESTORE_SPEC,
                format!("NonAdminBackup \"{}\" has no backing engine Backup yet", nar.spec.backup_name),
            )
            .await;
        }
    };

    let current = api.get(&name).await?;
    let uuid = match current.status.as_ref().and_then(|s| s.velero_restore.as_ref()) {
        Some(existing) => existing.nac_uuid.clone(),
        None => {
            let uuid = naming::generate_uuid();
            patch_status(&api, &name, |status| {
                status.velero_restore = Some(VeleroRestoreRef {
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
    };

    if !current.metadata.finalizers.iter().flatten().any(|f| f == FINALIZER_NAME) {
        let mut finalizers = current.metadata.finalizers.clone().unwrap_or_default();
        finalizers.push(FINALIZER_NAME.to_owned());
        api.patch(
            &name,
            &PatchParams::default(),
            &Patch::Merge(json!({ "metadata": { "finalizers": finalizers } })),
        )
        .await?;
    }

    let engine_api: Api<Restore> = Api::namespaced(ctx.client.clone(), &ctx.operator_namespace);
    let existing = match crate::lookup::find_by_uuid(&engine_api, &uuid).await {
        Ok(existing) => existing,
        Err(Error::AmbiguousBinding { uuid, count }) => {
            return fail_terminal(
                &api,
                &name,
                reason::AMBIGUOUS_BINDING,
                format!("{count} engine Restore objects carry uuid \"{uuid}\""),
            )
            .await;
        }
        Err(err) => return Err(err),
    };
    let engine_restore = match existing {
        Some(found) => {
            if !naming::origin_matches(&found.metadata, &ns) {
                return fail_terminal(
                    &api,
                    &name,
                    reason::FOREIGN_ENGINE_OBJECT,
                    format!("engine Restore \"{uuid}\" is not owned by namespace \"{ns}\""),
                )
                .await;
            }
            found
        }
        None => {
            let mut spec = nar.spec.restore_spec.clone().unwrap_or_default();
            spec.backup_name = backup_uuid;
            let origin = Origin {
                namespace: ns.clone(),
                name: name.clone(),
                uid: current.metadata.uid.clone().unwrap_or_default(),
            };
            let restore = Restore {
                metadata: naming::engine_object_metadata(&ctx.operator_namespace, &uuid, &origin),
                spec,
                status: None,
            };
            engine_api
                .patch(&uuid, &PatchParams::apply(FIELD_MANAGER).force(), &Patch::Apply(restore))
                .await?
        }
    };

    patch_status(&api, &name, |status| {
        set_phase(status, Phase::Created);
        set_condition(
            &mut status.conditions,
            condition_type::QUEUED,
            ConditionStatus::True,
            reason::RESTORE_SCHEDULED,
            "the engine Restore has been created and is being tracked",
        );
        status.velero_restore = Some(VeleroRestoreRef {
            nac_uuid: uuid.clone(),
            namespace: ctx.operator_namespace.clone(),
            name: engine_restore.name_any(),
            spec: Some(engine_restore.spec.clone()),
            status: engine_restore.status.clone(),
        });
    })
    .await?;

    Ok(Action::requeue(Duration::from_secs(5 * 60)))
}

async fn finalize_delete(nar: &NonAdminRestore, ctx: &Context) -> Result<Action, Error> {
    let (ns, name) = id(nar)?;
    let api: Api<NonAdminRestore> = Api::namespaced(ctx.client.clone(), &ns);

    // Restores have no destructive-delete flag (SPEC_FULL.md §3): the engine
    // Restore is always left in place for its history, only the finalizer is
    // released.
    let current = nar.clone();
    let finalizers: Vec<String> = current
        .metadata
        .finalizers
        .clone()
        .unwrap_or_default()
        .into_iter()
        .filter(|f| f != FINALIZER_NAME)
        .collect();
    api.patch(
        &name,
        &PatchParams::default(),
        &Patch::Merge(json!({ "metadata": { "finalizers": finalizers } })),
    )
    .await?;
    Ok(Action::await_change())
}

async fn patch_status<F>(api: &Api<NonAdminRestore>, name: &str, mutate: F) -> Result<NonAdminRestore, Error>
where
    F: FnOnce(&mut NonAdminRestoreStatus),
{
    let current = api.get_status(name).await?;
    let mut new_status = current.status.clone().unwrap_or_default();
    mutate(&mut new_status);
    if current.status.as_ref() == Some(&new_status) {
        return Ok(current);
    }
    let patched = api
        .patch_status(name, &PatchParams::default(), &Patch::Merge(json!({ "status": new_status })))
        .await?;
    Ok(patched)
}

async fn fail_terminal(
    api: &Api<NonAdminRestore>,
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
    Err(Error::terminal(reason, message))
}
