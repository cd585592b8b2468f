pub mod canonical;
pub mod clock;
pub mod config;
pub mod error;
pub mod gate;
pub mod nonce_set;
pub mod proxy;
pub mod state;
pub mod validator;

pub use canonical::{sign_digest, RequestFields, NONCE_FIELD, SIGN_FIELD, TIMESTAMP_FIELD};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{CliArgs, Config, DEFAULT_MAX_BODY_BYTES};
pub use error::GateError;
pub use gate::{anti_replay_guard, router};
pub use nonce_set::{Sweeper, TtlNonceSet, SWEEP_INTERVAL};
pub use proxy::{HttpProxy, Proxy};
pub use state::{GateState, SharedState};
pub use validator::{AntiReplayValidator, RejectReason, Verdict, DEFAULT_TIME_SPAN_SECS};
