//! Status projection (spec.md §4.4): mirroring, queue position, and child
//! workload aggregation. All pure functions over already-fetched data so
//! they can be exercised without a live cluster.

use chrono::{DateTime, Utc};
use nac_api::backup::{DataUploadCounters, PodVolumeBackupCounters};
use nac_api::engine::{BackupSpec, BackupStatus};

/// Counts engine backups in the operator namespace created before `this`
/// that have not reached a terminal phase, then adds one (spec.md §4.4
/// "Queue position").
pub fn compute_queue_position(
    this_creation: DateTime<Utc>,
    siblings: &[(DateTime<Utc>, BackupStatus)],
) -> i64 {
    let ahead = siblings
        .iter()
        .filter(|(created, status)| *created < this_creation && !status.is_terminal())
        .count();
    ahead as i64 + 1
}

/// Tallies phase counters for engine `PodVolumeBackup` objects belonging to
/// this backup (spec.md §4.4 "Volume-backup aggregation").
pub fn aggregate_pod_volume_backups(phases: &[Option<String>]) -> PodVolumeBackupCounters {
    let mut counters = PodVolumeBackupCounters::default();
    counters.total = phases.len() as i64;
    for phase in phases {
        match phase.as_deref() {
            Some("New") => counters.new += 1,
            Some("InProgress") => counters.in_progress += 1,
            Some("Failed") => counters.failed += 1,
            Some("Completed") => counters.completed += 1,
            _ => {}
        }
    }
    counters
}

/// Tallies phase counters for engine `DataUpload` objects belonging to this
/// backup (spec.md §4.4 "Data-upload aggregation").
pub fn aggregate_data_uploads(phases: &[Option<String>]) -> DataUploadCounters {
    let mut counters = DataUploadCounters::default();
    counters.total = phases.len() as i64;
    for phase in phases {
        match phase.as_deref() {
            Some("New") => counters.new += 1,
            Some("Accepted") => counters.accepted += 1,
            Some("Prepared") => counters.prepared += 1,
            Some("InProgress") => counters.in_progress += 1,
            Some("Canceling") => counters.canceling += 1,
            Some("Canceled") => counters.canceled += 1,
            Some("Failed") => counters.failed += 1,
            Some("Completed") => counters.completed += 1,
            _ => {}
        }
    }
    counters
}

/// Structural comparison used to avoid update storms (spec.md §4.4
/// "compute equality with a structural compare"). `PartialEq` on the engine
/// mirror types already performs this; this wrapper exists so call sites
/// read as intent rather than a bare `!=`.
pub fn mirror_changed(previous: Option<&BackupSpec>, current: &BackupSpec) -> bool {
    previous != Some(current)
}

pub fn status_mirror_changed(previous: Option<&BackupStatus>, current: &BackupStatus) -> bool {
    previous != Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn status(phase: &str) -> BackupStatus {
        BackupStatus {
            phase: Some(phase.to_owned()),
            ..Default::default()
        }
    }

    #[test]
    fn queue_position_counts_only_earlier_non_terminal_siblings() {
        let siblings = vec![
            (at(0), status("InProgress")),  // earlier, not terminal -> counts
            (at(1), status("Completed")),   // earlier, terminal -> does not count
            (at(10), status("InProgress")), // later -> does not count
        ];
        assert_eq!(compute_queue_position(at(5), &siblings), 2);
    }

    #[test]
    fn first_in_queue_is_position_one() {
        assert_eq!(compute_queue_position(at(0), &[]), 1);
    }

    #[test]
    fn pod_volume_backup_counters_tally_each_phase() {
        let phases = vec![
            Some("New".to_owned()),
            Some("InProgress".to_owned()),
            Some("InProgress".to_owned()),
            Some("Failed".to_owned()),
            Some("Completed".to_owned()),
            None,
        ];
        let counters = aggregate_pod_volume_backups(&phases);
        assert_eq!(counters.total, 6);
        assert_eq!(counters.new, 1);
        assert_eq!(counters.in_progress, 2);
        assert_eq!(counters.failed, 1);
        assert_eq!(counters.completed, 1);
    }

    #[test]
    fn data_upload_counters_tally_each_phase() {
        let phases = vec![
            Some("Accepted".to_owned()),
            Some("Prepared".to_owned()),
            Some("Canceling".to_owned()),
            Some("Canceled".to_owned()),
        ];
        let counters = aggregate_data_uploads(&phases);
        assert_eq!(counters.total, 4);
        assert_eq!(counters.accepted, 1);
        assert_eq!(counters.prepared, 1);
        assert_eq!(counters.canceling, 1);
        assert_eq!(counters.canceled, 1);
    }

    #[test]
    fn unchanged_mirror_is_detected() {
        let s = status("Completed");
        assert!(!status_mirror_changed(Some(&s), &s));
        assert!(status_mirror_changed(Some(&status("New")), &s));
        assert!(status_mirror_changed(None, &s));
    }
}
