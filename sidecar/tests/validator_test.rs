//! Concurrency and expiry behavior of the validator under real tasks

mod common;

use anti_replay_sidecar::{AntiReplayValidator, RejectReason, SystemClock, Verdict};
use common::{manual_validator, signed_payload, NOW};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_distinct_nonces_all_accepted() {
    let (validator, _) = manual_validator(900);
    let validator = Arc::new(validator);

    let mut handles = Vec::new();
    for i in 0..200 {
        let validator = validator.clone();
        handles.push(tokio::spawn(async move {
            let nonce = format!("nonce-{}", i);
            validator.validate(&signed_payload(NOW, &nonce, &[("seq", "1")]))
        }));
    }

    for handle in handles {
        assert_eq!(handle.await.unwrap(), Verdict::Accept);
    }
    assert_eq!(validator.nonces().len(), 200);

    validator.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_same_nonce_accepted_once() {
    let (validator, _) = manual_validator(900);
    let validator = Arc::new(validator);
    let payload = Arc::new(signed_payload(NOW, "shared-nonce", &[]));

    let mut handles = Vec::new();
    for _ in 0..64 {
        let validator = validator.clone();
        let payload = payload.clone();
        handles.push(tokio::spawn(async move { validator.validate(&payload) }));
    }

    let mut accepted = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Verdict::Accept => accepted += 1,
            verdict => assert_eq!(verdict, Verdict::Reject(RejectReason::NonceReplayed)),
        }
    }
    assert_eq!(accepted, 1);

    validator.shutdown().await;
}

#[tokio::test]
async fn nonce_reusable_after_window_and_sweep() {
    let (validator, clock) = {
        let clock = Arc::new(anti_replay_sidecar::ManualClock::new(NOW));
        let validator =
            AntiReplayValidator::with_options(60, clock.clone(), Duration::from_millis(10));
        (validator, clock)
    };

    assert_eq!(validator.validate(&signed_payload(NOW, "n-1", &[])), Verdict::Accept);

    // Still inside the window: replay.
    clock.advance(60);
    let later = NOW + 60;
    assert_eq!(
        validator.validate(&signed_payload(later, "n-1", &[])),
        Verdict::Reject(RejectReason::NonceReplayed)
    );

    // Past the window, once a sweep has run the nonce is free again.
    clock.advance(1);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!validator.nonces().exists("n-1"));
    assert_eq!(
        validator.validate(&signed_payload(NOW + 61, "n-1", &[])),
        Verdict::Accept
    );

    validator.shutdown().await;
}

#[tokio::test]
async fn system_clock_validator_accepts_current_requests() {
    use anti_replay_sidecar::Clock;

    let validator = AntiReplayValidator::new(900);
    let now = SystemClock.now_secs();

    assert_eq!(validator.validate(&signed_payload(now, "live-1", &[])), Verdict::Accept);
    assert_eq!(
        validator.validate(&signed_payload(now - 3_600, "live-2", &[])),
        Verdict::Reject(RejectReason::TimestampOutOfWindow)
    );

    validator.shutdown().await;
}
