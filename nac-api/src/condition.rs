use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A single `(type, status, reason, message, lastTransitionTime)` entry,
/// keyed by `type_` (spec.md §3 "conditions: set of ... keyed by type").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Condition {
    #[serde(rename = "type")]
    pub type_: String,
    pub status: ConditionStatus,
    pub reason: String,
    pub message: String,
    #[serde(rename = "lastTransitionTime")]
    pub last_transition_time: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

/// Insert or update a condition by type. Returns `true` if the set actually
/// changed, so callers can skip a status `Update` call when nothing moved
/// (spec.md §4.4 "skipped if nothing changed").
///
/// `lastTransitionTime` only advances when `status` itself flips; a reason
/// or message edit on an already-true condition does not reset the clock.
pub fn set_condition(
    conditions: &mut Vec<Condition>,
    type_: &str,
    status: ConditionStatus,
    reason: &str,
    message: &str,
) -> bool {
    set_condition_at(conditions, type_, status, reason, message, Utc::now())
}

pub(crate) fn set_condition_at(
    conditions: &mut Vec<Condition>,
    type_: &str,
    status: ConditionStatus,
    reason: &str,
    message: &str,
    now: DateTime<Utc>,
) -> bool {
    if let Some(existing) = conditions.iter_mut().find(|c| c.type_ == type_) {
        let status_changed = existing.status != status;
        let unchanged =
            !status_changed && existing.reason == reason && existing.message == message;
        if unchanged {
            return false;
        }
        existing.status = status;
        existing.reason = reason.to_owned();
        existing.message = message.to_owned();
        if status_changed {
            existing.last_transition_time = now.to_rfc3339();
        }
        true
    } else {
        conditions.push(Condition {
            type_: type_.to_owned(),
            status,
            reason: reason.to_owned(),
            message: message.to_owned(),
            last_transition_time: now.to_rfc3339(),
        });
        true
    }
}

pub fn find_condition<'a>(conditions: &'a [Condition], type_: &str) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.type_ == type_)
}

pub fn condition_is_true(conditions: &[Condition], type_: &str) -> bool {
    matches!(
        find_condition(conditions, type_),
        Some(Condition {
            status: ConditionStatus::True,
            ..
        })
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn inserts_new_condition() {
        let mut conditions = Vec::new();
        let changed = set_condition_at(
            &mut conditions,
            "Accepted",
            ConditionStatus::True,
            "Valid",
            "ok",
            at(0),
        );
        assert!(changed);
        assert_eq!(conditions.len(), 1);
        assert!(condition_is_true(&conditions, "Accepted"));
    }

    #[test]
    fn no_write_when_unchanged() {
        let mut conditions = Vec::new();
        set_condition_at(
            &mut conditions,
            "Queued",
            ConditionStatus::True,
            "BackupScheduled",
            "msg",
            at(0),
        );
        let changed = set_condition_at(
            &mut conditions,
            "Queued",
            ConditionStatus::True,
            "BackupScheduled",
            "msg",
            at(10),
        );
        assert!(!changed);
        assert_eq!(conditions[0].last_transition_time, at(0).to_rfc3339());
    }

    #[test]
    fn transition_time_advances_only_on_status_flip() {
        let mut conditions = Vec::new();
        set_condition_at(
            &mut conditions,
            "Accepted",
            ConditionStatus::False,
            "InvalidBackupSpec",
            "bad",
            at(0),
        );
        // message-only edit on the same status must not bump the clock
        set_condition_at(
            &mut conditions,
            "Accepted",
            ConditionStatus::False,
            "InvalidBackupSpec",
            "bad again",
            at(5),
        );
        assert_eq!(conditions[0].last_transition_time, at(0).to_rfc3339());

        set_condition_at(
            &mut conditions,
            "Accepted",
            ConditionStatus::True,
            "Valid",
            "ok",
            at(10),
        );
        assert_eq!(conditions[0].last_transition_time, at(10).to_rfc3339());
    }
}
