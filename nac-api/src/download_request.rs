use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::condition::Condition;
use crate::engine::DownloadTarget;

/// `NonAdminDownloadRequest.oadp.openshift.io/v1alpha1` — short-lived,
/// finalizer-free tenant request for a pre-signed download URL (spec.md
/// SPEC_FULL §3: the engine GCs these itself after a TTL).
#[derive(CustomResource, Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "oadp.openshift.io",
    version = "v1alpha1",
    kind = "NonAdminDownloadRequest",
    plural = "nonadmindownloadrequests",
    namespaced,
    status = "NonAdminDownloadRequestStatus",
    shortname = "nadr"
)]
#[serde(rename_all = "camelCase")]
pub struct NonAdminDownloadRequestSpec {
    pub target: DownloadTarget,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NonAdminDownloadRequestStatus {
    pub velero_download_request: Option<VeleroDownloadRequestRef>,
    pub download_url: Option<String>,
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VeleroDownloadRequestRef {
    pub nac_uuid: String,
    pub namespace: String,
    pub name: String,
}
