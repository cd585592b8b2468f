use crate::config::Config;
use crate::proxy::HttpProxy;
use crate::validator::AntiReplayValidator;
use std::sync::Arc;

/// State shared by every request handler
///
/// The validator's nonce set is the only mutable part and carries its own
/// lock, so the state itself needs none.
pub struct GateState {
    pub validator: AntiReplayValidator,
    pub proxy: HttpProxy,
    pub upstream_url: String,
    pub max_body_bytes: usize,
}

/// Shared state for use across async tasks
pub type SharedState = Arc<GateState>;

impl GateState {
    pub fn new(validator: AntiReplayValidator, upstream_url: String, max_body_bytes: usize) -> Self {
        Self {
            validator,
            proxy: HttpProxy::new(),
            upstream_url,
            max_body_bytes,
        }
    }

    /// Build state from loaded configuration; spawns the nonce sweeper
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            AntiReplayValidator::new(config.timespan_secs),
            config.upstream_url.clone(),
            config.max_body_bytes,
        )
    }
}
