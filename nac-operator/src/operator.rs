use std::sync::Arc;

use anyhow::{Context as _, Result};
use axum::routing::get;
use axum::Router;
use futures::FutureExt;
use kube::Client;
use tokio::signal;
use tracing::{debug, info};

use nac_api::engine::BackupSpec as EngineBackupSpec;

use crate::config::Config;
use crate::controller::{self, Context};

/// Non-admin controller process (SPEC_FULL.md §4.9).
#[derive(Debug)]
pub struct Operator {
    config: Config,
}

impl Operator {
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Runs the four tenant-kind controllers and the health server until a
    /// shutdown signal is received.
    pub async fn run(&self) -> Result<()> {
        let client = Client::try_default()
            .await
            .context("failed to build kube client from in-cluster or kubeconfig context")?;

        let enforced_backup_spec = match &self.config.enforced_backup_spec_path {
            Some(path) => {
                debug!(%path, "loading enforced backup spec");
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read enforced backup spec at {path}"))?;
                let spec: EngineBackupSpec = serde_json::from_str(&raw)
                    .with_context(|| format!("failed to parse enforced backup spec at {path}"))?;
                Some(spec)
            }
            None => None,
        };

        let ctx = Arc::new(Context::new(
            client,
            self.config.operator_namespace.clone(),
            enforced_backup_spec,
        ));

        let health_addr = self.config.health_listen_addr.clone();
        let _health_handle = tokio::spawn(Self::health_server(health_addr));

        info!("non-admin controller starting");
        tokio::join!(
            controller::backup::run(Arc::clone(&ctx)),
            controller::restore::run(Arc::clone(&ctx)),
            controller::bsl::run(Arc::clone(&ctx)),
            controller::download_request::run(ctx),
        );
        Ok(())
    }

    /// Minimal liveness/readiness server (spec.md's external-collaborators
    /// section treats metrics scraping as out of scope; this exposes only
    /// what a kubelet probe needs).
    async fn health_server(listen_addr: String) -> Result<()> {
        let app = Router::new()
            .route("/healthz", get(|| async { "ok" }))
            .route("/readyz", get(|| async { "ok" }));

        let addr = listen_addr
            .parse()
            .with_context(|| format!("invalid health listen address {listen_addr}"))?;
        axum::Server::bind(&addr)
            .serve(app.into_make_service())
            .with_graceful_shutdown(signal::ctrl_c().map(|_| ()))
            .await
            .context("health server failed")?;
        Ok(())
    }
}
