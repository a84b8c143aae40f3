//! `NonAdminDownloadRequest` reconciler — the simplest of the four: no
//! finalizer, no delete path, just translate-and-mirror-back until the
//! engine fills in a URL (SPEC_FULL.md §3).

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use kube::api::{Api, Patch, PatchParams};
use kube::runtime::controller::{Action, Controller};
use kube::runtime::watcher;
use kube::ResourceExt;
use serde_json::json;
use tracing::{debug, warn};

use nac_api::condition::{set_condition, ConditionStatus};
use nac_api::consts::{condition_type, reason};
use nac_api::download_request::{
    NonAdminDownloadRequest, NonAdminDownloadRequestStatus, VeleroDownloadRequestRef,
};
use nac_api::engine::{DownloadRequest, DownloadRequestSpec, Origin};

use crate::controller::{Context, FIELD_MANAGER};
use crate::error::{error_policy, Error};
use crate::naming;

pub async fn run(ctx: Arc<Context>) {
    let requests: Api<NonAdminDownloadRequest> = Api::all(ctx.client.clone());
    Controller::new(requests, watcher::Config::default())
        .shutdown_on_signal()
        .run(reconcile, error_policy, ctx)
        .for_each(|res| async move {
            if let Err(err) = res {
                warn!("non-admin-download-request reconcile failed: {err}");
            }
        })
        .await;
}

fn id(nadr: &NonAdminDownloadRequest) -> Result<(String, String), Error> {
    let namespace = nadr
        .metadata
        .namespace
        .clone()
        .ok_or(Error::MissingField(".metadata.namespace"))?;
    let name = nadr
        .metadata
        .name
        .clone()
        .ok_or(Error::MissingField(".metadata.name"))?;
    Ok((namespace, name))
}

#[tracing::instrument(skip(nadr, ctx), fields(name = %nadr.name_any(), namespace = ?nadr.namespace()))]
async fn reconcile(nadr: Arc<NonAdminDownloadRequest>, ctx: Arc<Context>) -> Result<Action, Error> {
    debug!("reconciling NonAdminDownloadRequest");
    let (ns, name) = id(&nadr)?;
    let api: Api<NonAdminDownloadRequest> = Api::namespaced(ctx.client.clone(), &ns);

    if nadr
        .status
        .as_ref()
        .and_then(|s| s.download_url.as_ref())
        .is_some()
    {
        // Already resolved; the engine GCs the request itself.
        return Ok(Action::await_change());
    }

    let current = api.get(&name).await?;
    let uuid = match current.status.as_ref().and_then(|s| s.velero_download_request.as_ref()) {
        Some(existing) => existing.nac_uuid.clone(),
        None => naming::generate_uuid(),
    };

    let engine_api: Api<DownloadRequest> = Api::namespaced(ctx.client.clone(), &ctx.operator_namespace);
    let existing = match crate::lookup::find_by_uuid(&engine_api, &uuid).await {
        Ok(existing) => existing,
        Err(Error::AmbiguousBinding { uuid, count }) => {
            return fail_terminal(
                &api,
                &name,
                reason::AMBIGUOUS_BINDING,
                format!("{count} engine DownloadRequest objects carry uuid \"{uuid}\""),
            )
            .await;
        }
        Err(err) => return Err(err),
    };
    let engine_request = match existing {
        Some(found) => found,
        None => {
            let origin = Origin {
                namespace: ns.clone(),
                name: name.clone(),
                uid: current.metadata.uid.clone().unwrap_or_default(),
            };
            let request = DownloadRequest {
                metadata: naming::engine_object_metadata(&ctx.operator_namespace, &uuid, &origin),
                spec: DownloadRequestSpec {
                    target: nadr.spec.target.clone(),
                },
                status: None,
            };
            engine_api
                .patch(&uuid, &PatchParams::apply(FIELD_MANAGER).force(), &Patch::Apply(request))
                .await?
        }
    };

    let download_url = engine_request.status.as_ref().and_then(|s| s.download_url.clone());

    patch_status(&api, &name, |status| {
        status.velero_download_request = Some(VeleroDownloadRequestRef {
            nac_uuid: uuid.clone(),
            namespace: ctx.operator_namespace.clone(),
            name: engine_request.name_any(),
        });
        status.download_url = download_url.clone();
    })
    .await?;

    if engine_request.status.as_ref().and_then(|s| s.download_url.as_ref()).is_some() {
        Ok(Action::await_change())
    } else {
        Ok(Action::requeue(Duration::from_secs(10)))
    }
}

async fn patch_status<F>(
    api: &Api<NonAdminDownloadRequest>,
    name: &str,
    mutate: F,
) -> Result<NonAdminDownloadRequest, Error>
where
    F: FnOnce(&mut NonAdminDownloadRequestStatus),
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
    api: &Api<NonAdminDownloadRequest>,
    name: &str,
    reason: &'static str,
    message: String,
) -> Result<Action, Error> {
    patch_status(api, name, |status| {
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
