//! `NonAdminBackupStorageLocation` reconciler — promotes a tenant-authored
//! location spec into a real engine `BackupStorageLocation` and reflects its
//! availability back (SPEC_FULL.md §3). No finalizer-gated delete protocol:
//! deleting the tenant object deletes the engine object directly, since a
//! storage location holds no data of its own.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use kube::api::{Api, DeleteParams, Patch, PatchParams};
use kube::runtime::controller::{Action, Controller};
use kube::runtime::watcher;
use kube::{Resource, ResourceExt};
use serde_json::json;
use tracing::{debug, warn};

use nac_api::bsl::{BslPhase, NonAdminBackupStorageLocation, NonAdminBackupStorageLocationStatus, VeleroBslRef};
use nac_api::condition::{set_condition, ConditionStatus};
use nac_api::consts::{condition_type, reason};
use nac_api::engine::{BackupStorageLocation, Origin};

use crate::controller::{Context, FIELD_MANAGER};
use crate::error::{error_policy, Error};
use crate::naming;

pub async fn run(ctx: Arc<Context>) {
    let locations: Api<NonAdminBackupStorageLocation> = Api::all(ctx.client.clone());
    Controller::new(locations, watcher::Config::default())
        .shutdown_on_signal()
        .run(reconcile, error_policy, ctx)
        .for_each(|res| async move {
            if let Err(err) = res {
                warn!("non-admin-bsl reconcile failed: {err}");
            }
        })
        .await;
}

fn id(nabsl: &NonAdminBackupStorageLocation) -> Result<(String, String), Error> {
    let namespace = nabsl
        .metadata
        .namespace
        .clone()
        .ok_or(Error::MissingField(".metadata.namespace"))?;
    let name = nabsl
        .metadata
        .name
        .clone()
        .ok_or(Error::MissingField(".metadata.name"))?;
    Ok((namespace, name))
}

#[tracing::instrument(skip(nabsl, ctx), fields(name = %nabsl.name_any(), namespace = ?nabsl.namespace()))]
async fn reconcile(nabsl: Arc<NonAdminBackupStorageLocation>, ctx: Arc<Context>) -> Result<Action, Error> {
    debug!("reconciling NonAdminBackupStorageLocation");
    let (ns, name) = id(&nabsl)?;
    let api: Api<NonAdminBackupStorageLocation> = Api::namespaced(ctx.client.clone(), &ns);

    if nabsl.meta().deletion_timestamp.is_some() {
        if let Some(existing) = nabsl.status.as_ref().and_then(|s| s.velero_backup_storage_location.as_ref()) {
            let engine_api: Api<BackupStorageLocation> = Api::namespaced(ctx.client.clone(), &ctx.operator_namespace);
            let _ = engine_api.delete(&existing.name, &DeleteParams::default()).await;
        }
        return Ok(Action::await_change());
    }

    let current = api.get(&name).await?;
    let uuid = match current.status.as_ref().and_then(|s| s.velero_backup_storage_location.as_ref()) {
        Some(existing) => existing.nac_uuid.clone(),
        None => naming::generate_uuid(),
    };

    let engine_api: Api<BackupStorageLocation> = Api::namespaced(ctx.client.clone(), &ctx.operator_namespace);
    let existing = match crate::lookup::find_by_uuid(&engine_api, &uuid).await {
        Ok(existing) => existing,
        Err(Error::AmbiguousBinding { uuid, count }) => {
            return fail(
                &api,
                &name,
                reason::AMBIGUOUS_BINDING,
                format!("{count} engine BackupStorageLocation objects carry uuid \"{uuid}\""),
            )
            .await;
        }
        Err(err) => return Err(err),
    };
    if let Some(existing) = existing {
        if !naming::origin_matches(&existing.metadata, &ns) {
            return fail(
                &api,
                &name,
                reason::FOREIGN_ENGINE_OBJECT,
                format!("engine BackupStorageLocation \"{uuid}\" is not owned by namespace \"{ns}\""),
            )
            .await;
        }
    } else {
        let origin = Origin {
            namespace: ns.clone(),
            name: name.clone(),
            uid: current.metadata.uid.clone().unwrap_or_default(),
        };
        let engine_bsl = BackupStorageLocation {
            metadata: naming::engine_object_metadata(&ctx.operator_namespace, &uuid, &origin),
            spec: nabsl.spec.backup_storage_location_spec.clone(),
            status: None,
        };
        engine_api
            .patch(&uuid, &PatchParams::apply(FIELD_MANAGER).force(), &Patch::Apply(engine_bsl))
            .await?;
    }

    let engine_bsl = engine_api.get(&uuid).await?;
    let phase = if engine_bsl.status.as_ref().map(|s| s.is_available()).unwrap_or(false) {
        BslPhase::Available
    } else {
        BslPhase::Unavailable
    };

    patch_status(&api, &name, |status| {
        status.phase = Some(phase);
        set_condition(
            &mut status.conditions,
            condition_type::ACCEPTED,
            ConditionStatus::True,
            reason::BACKUP_SCHEDULED,
            "the engine BackupStorageLocation is being tracked",
        );
        status.velero_backup_storage_location = Some(VeleroBslRef {
            nac_uuid: uuid.clone(),
            namespace: ctx.operator_namespace.clone(),
            name: engine_bsl.name_any(),
        });
    })
    .await?;

    Ok(Action::requeue(Duration::from_secs(60)))
}

async fn patch_status<F>(
    api: &Api<NonAdminBackupStorageLocation>,
    name: &str,
    mutate: F,
) -> Result<NonAdminBackupStorageLocation, Error>
where
    F: FnOnce(&mut NonAdminBackupStorageLocationStatus),
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

async fn fail(
    api: &Api<NonAdminBackupStorageLocation>,
    name: &str,
    reason: &'static str,
    message: String,
) -> Result<Action, Error> {
    patch_status(api, name, |status| {
        status.phase = Some(BslPhase::Unavailable);
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
