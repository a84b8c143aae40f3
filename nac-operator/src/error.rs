use std::time::Duration;

use kube::runtime::controller::Action;

/// How long a terminal error is parked before the next reconciliation is
/// even attempted again. `Action` has no "never" value, so this stands in
/// for "don't auto-repair" (spec.md §4.3, §7) without blocking the
/// workqueue forever.
const TERMINAL_BACKOFF: Duration = Duration::from_secs(24 * 60 * 60);
const TRANSIENT_BACKOFF: Duration = Duration::from_secs(15);

/// All possible errors a reconciler step can return.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Kubernetes API error; always transient unless the caller wraps it.
    #[error("kubernetes api error")]
    Kube(#[from] kube::Error),
    /// A required field was missing from an otherwise well-formed object.
    #[error("missing field {0}")]
    MissingField(&'static str),
    /// Terminal failure: the condition and reason have already been written
    /// to status by the step that raised this (spec.md §7 "Propagation
    /// policy").
    #[error("{reason}: {message}")]
    Terminal { reason: &'static str, message: String },
    /// More than one engine object carries the same UUID label (spec.md
    /// §4.3 I1, `AmbiguousBinding`).
    #[error("ambiguous binding: {count} engine objects carry uuid {uuid}")]
    AmbiguousBinding { uuid: String, count: usize },
}

impl Error {
    pub fn terminal(reason: &'static str, message: impl Into<String>) -> Self {
        Error::Terminal {
            reason,
            message: message.into(),
        }
    }

    /// Terminal errors suppress automatic retry (spec.md §7); everything
    /// else gets the controller runtime's usual exponential backoff.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Error::Terminal { .. } | Error::AmbiguousBinding { .. }
        )
    }
}

pub fn error_policy<K>(_object: std::sync::Arc<K>, error: &Error, _ctx: std::sync::Arc<crate::controller::Context>) -> Action {
    if error.is_terminal() {
        Action::requeue(TERMINAL_BACKOFF)
    } else {
        Action::requeue(TRANSIENT_BACKOFF)
    }
}
