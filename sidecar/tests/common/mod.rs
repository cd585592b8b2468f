// Common test utilities
#![allow(dead_code)]

use anti_replay_sidecar::{
    AntiReplayValidator, GateState, ManualClock, RequestFields, SharedState, SWEEP_INTERVAL,
};
use std::sync::Arc;

/// Fixed "now" used by tests driving a manual clock
pub const NOW: i64 = 1_700_000_000;

/// Build a correctly signed request body
pub fn signed_payload(timestamp: i64, nonce: &str, extra: &[(&str, &str)]) -> Vec<u8> {
    let ts = timestamp.to_string();
    let mut fields: RequestFields = extra.iter().copied().collect();
    fields.insert("timestamp", ts);
    fields.insert("nonce", nonce);
    fields.signed().to_payload()
}

/// Validator on a manual clock set to [`NOW`]
pub fn manual_validator(time_span: i64) -> (AntiReplayValidator, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(NOW));
    let validator = AntiReplayValidator::with_options(time_span, clock.clone(), SWEEP_INTERVAL);
    (validator, clock)
}

/// Gate state forwarding to `upstream_url`
pub fn test_state(upstream_url: &str, max_body_bytes: usize) -> SharedState {
    let (validator, _) = manual_validator(900);
    Arc::new(GateState::new(validator, upstream_url.to_string(), max_body_bytes))
}
