use clap::Parser;

/// Non-admin controller config (SPEC_FULL.md §4.9).
#[derive(Debug, Parser)]
#[non_exhaustive]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Namespace where engine objects (Backup, Restore, BackupStorageLocation,
    /// DownloadRequest, and their children) live. Tenant objects may live in
    /// any namespace; this one is cluster-scoped administrative territory.
    #[arg(long, env = "OPERATOR_NAMESPACE")]
    pub operator_namespace: String,
    /// Optional path to a JSON-encoded engine `BackupSpec` whose non-default
    /// fields are merged into every tenant backup spec before validation
    /// (spec.md §4.2 "One optional, cluster-scoped admin policy").
    #[arg(long, env = "ENFORCED_BACKUP_SPEC_PATH")]
    pub enforced_backup_spec_path: Option<String>,
    /// Address the health/readiness HTTP server binds to.
    #[arg(long, env = "HEALTH_LISTEN_ADDR", default_value = "0.0.0.0:8081")]
    pub health_listen_addr: String,
}
