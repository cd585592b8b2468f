//! Anti-replay validation pipeline
//!
//! Checks run in a fixed order and stop at the first failure:
//! timestamp window, nonce freshness, signature.

use crate::canonical::{sign_digest, RequestFields};
use crate::clock::{Clock, SystemClock};
use crate::nonce_set::{Sweeper, TtlNonceSet, SWEEP_INTERVAL};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

/// Default replay window (15 minutes)
pub const DEFAULT_TIME_SPAN_SECS: i64 = 15 * 60;

/// Why a request was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectReason {
    MalformedPayload,
    TimestampOutOfWindow,
    NonceReplayed,
    SignatureMismatch,
}

impl RejectReason {
    /// HTTP status reported to the caller
    pub fn status_code(&self) -> u16 {
        match self {
            RejectReason::MalformedPayload => 400,
            RejectReason::TimestampOutOfWindow
            | RejectReason::NonceReplayed
            | RejectReason::SignatureMismatch => 403,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::MalformedPayload => "malformed_payload",
            RejectReason::TimestampOutOfWindow => "timestamp_out_of_window",
            RejectReason::NonceReplayed => "nonce_replayed",
            RejectReason::SignatureMismatch => "signature_mismatch",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one validation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    Reject(RejectReason),
}

impl Verdict {
    pub fn is_accept(&self) -> bool {
        matches!(self, Verdict::Accept)
    }

    /// `None` on accept, the mapped status code on reject
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Verdict::Accept => None,
            Verdict::Reject(reason) => Some(reason.status_code()),
        }
    }

    pub fn into_result(self) -> Result<(), RejectReason> {
        match self {
            Verdict::Accept => Ok(()),
            Verdict::Reject(reason) => Err(reason),
        }
    }
}

/// Validator owning the nonce set and its sweep task
///
/// Construction spawns the sweeper, so it must happen inside a tokio runtime.
/// Call [`AntiReplayValidator::shutdown`] before dropping to join the sweep.
pub struct AntiReplayValidator {
    time_span: i64,
    nonces: TtlNonceSet,
    clock: Arc<dyn Clock>,
    sweeper: Mutex<Option<Sweeper>>,
}

impl AntiReplayValidator {
    pub fn new(time_span: i64) -> Self {
        Self::with_options(time_span, Arc::new(SystemClock), SWEEP_INTERVAL)
    }

    pub fn with_options(time_span: i64, clock: Arc<dyn Clock>, sweep_interval: Duration) -> Self {
        let nonces = TtlNonceSet::with_clock(time_span, clock.clone());
        let sweeper = nonces.spawn_sweeper(sweep_interval);

        Self {
            time_span,
            nonces,
            clock,
            sweeper: Mutex::new(Some(sweeper)),
        }
    }

    pub fn time_span(&self) -> i64 {
        self.time_span
    }

    pub fn nonces(&self) -> &TtlNonceSet {
        &self.nonces
    }

    /// Validate one raw request payload
    pub fn validate(&self, payload: &[u8]) -> Verdict {
        let fields = match RequestFields::decode(payload) {
            Ok(fields) => fields,
            Err(e) => {
                debug!(error = %e, "Request payload is not a flat object of strings");
                return Verdict::Reject(RejectReason::MalformedPayload);
            }
        };

        let timestamp = fields.timestamp();
        let now = self.clock.now_secs();
        if timestamp < now.saturating_sub(self.time_span)
            || timestamp > now.saturating_add(self.time_span)
        {
            debug!(timestamp, now, time_span = self.time_span, "Timestamp outside replay window");
            return Verdict::Reject(RejectReason::TimestampOutOfWindow);
        }

        // The nonce stays consumed even if the signature check below fails.
        if self.nonces.check_and_insert(fields.nonce()) {
            debug!(nonce = fields.nonce(), "Nonce already seen or empty");
            return Verdict::Reject(RejectReason::NonceReplayed);
        }

        let canonical = fields.canonical_string();
        debug!(canonical = %canonical, "Canonical signing string");

        if fields.sign() != sign_digest(&canonical) {
            return Verdict::Reject(RejectReason::SignatureMismatch);
        }

        Verdict::Accept
    }

    /// Stop the sweep task and wait for it to exit
    ///
    /// Safe to call more than once; later calls return immediately.
    pub async fn shutdown(&self) {
        let sweeper = self.sweeper.lock().await.take();
        if let Some(sweeper) = sweeper {
            sweeper.shutdown().await;
        }
    }
}
