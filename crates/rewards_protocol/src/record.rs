//! Record payload types (the wire format's canonical shapes).

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::path::PathBuf;

pub const MESSAGE_ID_KEY: &str = "message_id";
pub const TIMESTAMP_KEY: &str = "timestamp";
pub const TYPE_KEY: &str = "type";
pub const HISTORY_ID_KEY: &str = "history_id";
pub const MODEL_KEY: &str = "model";
pub const COUNT_KEY: &str = "count";
pub const REWARD_KEY_KEY: &str = "reward_key";
pub const REWARDS_KEY: &str = "rewards";
pub const PROPERTIES_KEY: &str = "properties";
pub const VALUE_KEY: &str = "value";
pub const REWARD_OUTPUT_KEY: &str = "reward";

pub const DEFAULT_REWARD_KEY: &str = "rewards";

/// The type tag of an input record, lifted from the untyped JSON `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Decision,
    Rewards,
    Event,
}

impl RecordKind {
    pub fn from_wire(value: &str) -> Option<Self> {
        match value {
            "decision" => Some(RecordKind::Decision),
            "rewards" | "reward" => Some(RecordKind::Rewards),
            "event" => Some(RecordKind::Event),
            _ => None,
        }
    }
}

/// A `decision` record that survived validation. `payload` is the original
/// JSON object; `reward` is injected into a clone of it at emission time.
#[derive(Debug, Clone)]
pub struct DecisionRecord {
    pub message_id: String,
    pub timestamp: DateTime<Utc>,
    pub history_id: String,
    pub reward_key: String,
    pub model: String,
    pub count: u64,
    pub payload: Map<String, Value>,
    /// The input file this record was read from, so the emitted
    /// [`RewardedDecision`] can be written back to its mirrored output file
    /// even though rewards are computed across every file in the identity's
    /// group.
    pub source_file: PathBuf,
}

/// A `rewards` record that survived validation.
#[derive(Debug, Clone)]
pub struct RewardsRecord {
    pub message_id: String,
    pub timestamp: DateTime<Utc>,
    pub history_id: String,
    pub rewards: Vec<(String, f64)>,
}

/// An `event` record that survived validation.
#[derive(Debug, Clone)]
pub struct EventRecord {
    pub message_id: String,
    pub timestamp: DateTime<Utc>,
    pub history_id: String,
    pub value: Option<f64>,
}

/// A single record, once it has passed schema/identity validation.
#[derive(Debug, Clone)]
pub enum ValidatedRecord {
    Decision(DecisionRecord),
    Rewards(RewardsRecord),
    Event(EventRecord),
}

impl ValidatedRecord {
    pub fn message_id(&self) -> &str {
        match self {
            ValidatedRecord::Decision(r) => &r.message_id,
            ValidatedRecord::Rewards(r) => &r.message_id,
            ValidatedRecord::Event(r) => &r.message_id,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            ValidatedRecord::Decision(r) => r.timestamp,
            ValidatedRecord::Rewards(r) => r.timestamp,
            ValidatedRecord::Event(r) => r.timestamp,
        }
    }

    pub fn history_id(&self) -> &str {
        match self {
            ValidatedRecord::Decision(r) => &r.history_id,
            ValidatedRecord::Rewards(r) => &r.history_id,
            ValidatedRecord::Event(r) => &r.history_id,
        }
    }
}

/// A decision record projected to the output shape: the original fields plus
/// an injected `reward`.
#[derive(Debug, Clone)]
pub struct RewardedDecision {
    pub payload: Map<String, Value>,
    pub source_file: PathBuf,
}

impl RewardedDecision {
    pub fn new(mut payload: Map<String, Value>, reward: f64, source_file: PathBuf) -> Self {
        payload.insert(REWARD_OUTPUT_KEY.to_string(), json_number(reward));
        Self { payload, source_file }
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.payload)
    }
}

fn json_number(value: f64) -> Value {
    serde_json::Number::from_f64(value)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}
