//! The sliding-window reward-assignment join.
//!
//! Live decision listeners are kept per reward-key bucket as a deque of
//! indices into an arena of in-progress decisions (the "ring or deque of
//! indices" design note): expiry pops from the front, contributions are
//! applied to whatever remains. A second, append-only list per bucket
//! records arrival order so every decision -- expired or still live -- can
//! be emitted once, in the order its bucket first saw it.

use chrono::{DateTime, Utc};
use rewards_protocol::config::EngineConfig;
use rewards_protocol::record::RewardedDecision;
use rewards_protocol::ValidatedRecord;
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;

struct DecisionSlot {
    payload: serde_json::Map<String, serde_json::Value>,
    timestamp: DateTime<Utc>,
    reward: f64,
    source_file: PathBuf,
}

#[derive(Default)]
struct Bucket {
    live: VecDeque<usize>,
    arrival: Vec<usize>,
}

/// Apply the sliding-window join to a chronologically sorted list of
/// validated records for one identity, returning every decision once with
/// its accumulated reward.
///
/// Pure function of `(records, config)`: no wall-clock reads, so the same
/// input always produces the same output.
pub fn assign_rewards(records: Vec<ValidatedRecord>, config: &EngineConfig) -> Vec<RewardedDecision> {
    let window = chrono::Duration::from_std(config.reward_window)
        .unwrap_or_else(|_| chrono::Duration::zero());

    let mut decisions: Vec<DecisionSlot> = Vec::new();
    let mut buckets: HashMap<String, Bucket> = HashMap::new();
    let mut bucket_order: Vec<String> = Vec::new();

    for record in records {
        match record {
            ValidatedRecord::Decision(d) => {
                let idx = decisions.len();
                decisions.push(DecisionSlot {
                    payload: d.payload,
                    timestamp: d.timestamp,
                    reward: 0.0,
                    source_file: d.source_file,
                });

                let bucket = buckets.entry(d.reward_key.clone()).or_insert_with(|| {
                    bucket_order.push(d.reward_key.clone());
                    Bucket::default()
                });
                bucket.live.push_back(idx);
                bucket.arrival.push(idx);
            }
            ValidatedRecord::Rewards(r) => {
                for (key, value) in r.rewards {
                    if let Some(bucket) = buckets.get_mut(&key) {
                        apply_contribution(bucket, &mut decisions, r.timestamp, value, window);
                    }
                }
            }
            ValidatedRecord::Event(e) => {
                let value = e.value.unwrap_or(config.default_event_value);
                for bucket in buckets.values_mut() {
                    apply_contribution(bucket, &mut decisions, e.timestamp, value, window);
                }
            }
        }
    }

    let mut output = Vec::with_capacity(decisions.len());
    for key in bucket_order {
        let bucket = buckets.remove(&key).expect("bucket_order mirrors buckets");
        for idx in bucket.arrival {
            let slot = &decisions[idx];
            output.push(RewardedDecision::new(
                slot.payload.clone(),
                slot.reward,
                slot.source_file.clone(),
            ));
        }
    }
    output
}

/// Expire listeners whose window has closed, then add `value` to every
/// survivor whose window strictly contains `current_ts` -- i.e. every
/// listener enrolled strictly before `current_ts` (sorted input guarantees
/// no listener is enrolled after it) and not yet expired.
fn apply_contribution(
    bucket: &mut Bucket,
    decisions: &mut [DecisionSlot],
    current_ts: DateTime<Utc>,
    value: f64,
    window: chrono::Duration,
) {
    while let Some(&front_idx) = bucket.live.front() {
        if decisions[front_idx].timestamp + window < current_ts {
            bucket.live.pop_front();
        } else {
            break;
        }
    }

    for &idx in &bucket.live {
        let listener_ts = decisions[idx].timestamp;
        if current_ts > listener_ts {
            decisions[idx].reward += value;
        }
    }
}
