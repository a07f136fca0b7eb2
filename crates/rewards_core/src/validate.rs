//! Per-record schema, timestamp, and identity validation.

use chrono::{DateTime, Utc};
use rewards_codec::timestamp::{parse_timestamp, TimestampError};
use rewards_ids::HashedHistoryId;
use rewards_protocol::record::{
    DecisionRecord, EventRecord, RecordKind, RewardsRecord, ValidatedRecord, COUNT_KEY,
    HISTORY_ID_KEY, MESSAGE_ID_KEY, MODEL_KEY, PROPERTIES_KEY, REWARDS_KEY, REWARD_KEY_KEY,
    TIMESTAMP_KEY, TYPE_KEY, VALUE_KEY,
};
use serde_json::Value;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("missing or non-string message_id")]
    MissingMessageId,
    #[error("missing timestamp")]
    MissingTimestamp,
    #[error("unparseable timestamp: {0}")]
    UnparseableTimestamp(String),
    #[error("missing or non-string type")]
    MissingType,
    #[error("unknown record type: {0}")]
    UnknownType(String),
    #[error("missing or non-string history_id")]
    MissingHistoryId,
    #[error("decision missing non-empty model")]
    InvalidModel,
    #[error("decision count is not a positive integer")]
    InvalidCount,
    #[error("history_id does not match the file group's identity")]
    IdentityMismatch,
}

impl From<TimestampError> for ValidationError {
    fn from(err: TimestampError) -> Self {
        match err {
            TimestampError::Missing => ValidationError::MissingTimestamp,
            TimestampError::Unparseable(raw) => ValidationError::UnparseableTimestamp(raw),
        }
    }
}

/// Tracks the identity latched for one file group: the first validated
/// record's raw `history_id` establishes it; every later record must match
/// the same raw value (cheaper than re-hashing every record).
#[derive(Debug)]
pub struct GroupIdentity {
    expected_hashed: HashedHistoryId,
    latched_raw: Option<String>,
}

impl GroupIdentity {
    pub fn new(expected_hashed: HashedHistoryId) -> Self {
        Self {
            expected_hashed,
            latched_raw: None,
        }
    }

    pub fn latched_history_id(&self) -> Option<&str> {
        self.latched_raw.as_deref()
    }

    fn accept(&mut self, history_id: &str) -> bool {
        if let Some(latched) = &self.latched_raw {
            return latched == history_id;
        }
        if self.expected_hashed.verify(history_id) {
            self.latched_raw = Some(history_id.to_string());
            true
        } else {
            false
        }
    }
}

/// Default reward-key bucket name used when a decision or rewards record omits one.
pub fn default_reward_key() -> &'static str {
    rewards_protocol::record::DEFAULT_REWARD_KEY
}

/// Validate one raw JSON record against an in-progress group identity.
/// `source_file` is only consulted for `decision` records, so their rewarded
/// projection can be written back to the right mirrored output file.
pub fn validate_record(
    raw: &Value,
    identity: &mut GroupIdentity,
    default_reward_key: &str,
    source_file: &Path,
) -> Result<ValidatedRecord, ValidationError> {
    let object = raw.as_object();

    let message_id = object
        .and_then(|o| o.get(MESSAGE_ID_KEY))
        .and_then(Value::as_str)
        .ok_or(ValidationError::MissingMessageId)?
        .to_string();

    let timestamp_raw = object
        .and_then(|o| o.get(TIMESTAMP_KEY))
        .and_then(Value::as_str)
        .ok_or(ValidationError::MissingTimestamp)?;
    let timestamp: DateTime<Utc> = parse_timestamp(timestamp_raw)?;

    let type_raw = object
        .and_then(|o| o.get(TYPE_KEY))
        .and_then(Value::as_str)
        .ok_or(ValidationError::MissingType)?;
    let kind = RecordKind::from_wire(type_raw)
        .ok_or_else(|| ValidationError::UnknownType(type_raw.to_string()))?;

    let history_id = object
        .and_then(|o| o.get(HISTORY_ID_KEY))
        .and_then(Value::as_str)
        .ok_or(ValidationError::MissingHistoryId)?
        .to_string();

    if !identity.accept(&history_id) {
        return Err(ValidationError::IdentityMismatch);
    }

    match kind {
        RecordKind::Decision => {
            let model = object
                .and_then(|o| o.get(MODEL_KEY))
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .ok_or(ValidationError::InvalidModel)?
                .to_string();
            let count = object
                .and_then(|o| o.get(COUNT_KEY))
                .and_then(strict_positive_integer)
                .ok_or(ValidationError::InvalidCount)?;
            let reward_key = object
                .and_then(|o| o.get(REWARD_KEY_KEY))
                .and_then(Value::as_str)
                .unwrap_or(default_reward_key)
                .to_string();

            Ok(ValidatedRecord::Decision(DecisionRecord {
                message_id,
                timestamp,
                history_id,
                reward_key,
                model,
                count,
                payload: object.cloned().unwrap_or_default(),
                source_file: source_file.to_path_buf(),
            }))
        }
        RecordKind::Rewards => {
            let rewards = object
                .and_then(|o| o.get(REWARDS_KEY))
                .and_then(Value::as_object)
                .map(|map| {
                    map.iter()
                        .filter_map(|(k, v)| v.as_f64().map(|value| (k.clone(), value)))
                        .collect()
                })
                .unwrap_or_default();

            Ok(ValidatedRecord::Rewards(RewardsRecord {
                message_id,
                timestamp,
                history_id,
                rewards,
            }))
        }
        RecordKind::Event => {
            let value = object
                .and_then(|o| o.get(PROPERTIES_KEY))
                .and_then(Value::as_object)
                .and_then(|props| props.get(VALUE_KEY))
                .and_then(Value::as_f64);

            Ok(ValidatedRecord::Event(EventRecord {
                message_id,
                timestamp,
                history_id,
                value,
            }))
        }
    }
}

/// `count` must be a strict positive integer: not a float, not a numeric string.
fn strict_positive_integer(value: &Value) -> Option<u64> {
    let n = value.as_u64()?;
    if value.is_u64() && n > 0 {
        Some(n)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn identity_for(raw_history_id: &str) -> GroupIdentity {
        GroupIdentity::new(HashedHistoryId::from_raw(raw_history_id))
    }

    #[test]
    fn accepts_well_formed_decision() {
        let mut identity = identity_for("user-1");
        let raw = json!({
            "message_id": "m1",
            "timestamp": "2020-01-01T00:00:00Z",
            "type": "decision",
            "history_id": "user-1",
            "model": "songs",
            "count": 3
        });
        let record = validate_record(&raw, &mut identity, "rewards", Path::new("x.jsonl.gz")).unwrap();
        match record {
            ValidatedRecord::Decision(d) => {
                assert_eq!(d.model, "songs");
                assert_eq!(d.count, 3);
                assert_eq!(d.reward_key, "rewards");
            }
            _ => panic!("expected decision"),
        }
    }

    #[test]
    fn rejects_float_count() {
        let mut identity = identity_for("user-1");
        let raw = json!({
            "message_id": "m1",
            "timestamp": "2020-01-01T00:00:00Z",
            "type": "decision",
            "history_id": "user-1",
            "model": "songs",
            "count": 3.5
        });
        assert_eq!(
            validate_record(&raw, &mut identity, "rewards", Path::new("x.jsonl.gz")),
            Err(ValidationError::InvalidCount)
        );
    }

    #[test]
    fn rejects_zero_count() {
        let mut identity = identity_for("user-1");
        let raw = json!({
            "message_id": "m1",
            "timestamp": "2020-01-01T00:00:00Z",
            "type": "decision",
            "history_id": "user-1",
            "model": "songs",
            "count": 0
        });
        assert_eq!(
            validate_record(&raw, &mut identity, "rewards", Path::new("x.jsonl.gz")),
            Err(ValidationError::InvalidCount)
        );
    }

    #[test]
    fn rejects_empty_model() {
        let mut identity = identity_for("user-1");
        let raw = json!({
            "message_id": "m1",
            "timestamp": "2020-01-01T00:00:00Z",
            "type": "decision",
            "history_id": "user-1",
            "model": "",
            "count": 1
        });
        assert_eq!(
            validate_record(&raw, &mut identity, "rewards", Path::new("x.jsonl.gz")),
            Err(ValidationError::InvalidModel)
        );
    }

    #[test]
    fn first_record_latches_identity_then_rejects_mismatches() {
        let mut identity = identity_for("user-1");
        let first = json!({
            "message_id": "m1",
            "timestamp": "2020-01-01T00:00:00Z",
            "type": "event",
            "history_id": "user-1"
        });
        validate_record(&first, &mut identity, "rewards", Path::new("x.jsonl.gz")).unwrap();

        let second = json!({
            "message_id": "m2",
            "timestamp": "2020-01-01T00:00:01Z",
            "type": "event",
            "history_id": "user-2"
        });
        assert_eq!(
            validate_record(&second, &mut identity, "rewards", Path::new("x.jsonl.gz")),
            Err(ValidationError::IdentityMismatch)
        );
    }

    #[test]
    fn event_without_value_passes_through_as_none() {
        // Defaulting DEFAULT_EVENT_VALUE happens in the reward engine, not here.
        let mut identity = identity_for("user-1");
        let raw = json!({
            "message_id": "m1",
            "timestamp": "2020-01-01T00:00:00Z",
            "type": "event",
            "history_id": "user-1"
        });
        let record = validate_record(&raw, &mut identity, "rewards", Path::new("x.jsonl.gz")).unwrap();
        match record {
            ValidatedRecord::Event(e) => assert_eq!(e.value, None),
            _ => panic!("expected event"),
        }
    }

    #[test]
    fn event_with_value_is_kept() {
        let mut identity = identity_for("user-1");
        let raw = json!({
            "message_id": "m1",
            "timestamp": "2020-01-01T00:00:00Z",
            "type": "event",
            "history_id": "user-1",
            "properties": {"value": 4.5}
        });
        let record = validate_record(&raw, &mut identity, "rewards", Path::new("x.jsonl.gz")).unwrap();
        match record {
            ValidatedRecord::Event(e) => assert_eq!(e.value, Some(4.5)),
            _ => panic!("expected event"),
        }
    }

    #[test]
    fn unknown_type_is_rejected() {
        let mut identity = identity_for("user-1");
        let raw = json!({
            "message_id": "m1",
            "timestamp": "2020-01-01T00:00:00Z",
            "type": "bogus",
            "history_id": "user-1"
        });
        assert!(matches!(
            validate_record(&raw, &mut identity, "rewards", Path::new("x.jsonl.gz")),
            Err(ValidationError::UnknownType(_))
        ));
    }

    #[test]
    fn missing_timestamp_is_rejected() {
        let mut identity = identity_for("user-1");
        let raw = json!({
            "message_id": "m1",
            "type": "event",
            "history_id": "user-1"
        });
        assert_eq!(
            validate_record(&raw, &mut identity, "rewards", Path::new("x.jsonl.gz")),
            Err(ValidationError::MissingTimestamp)
        );
    }
}
