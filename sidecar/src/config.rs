use crate::error::GateError;
use crate::validator::DEFAULT_TIME_SPAN_SECS;
use clap::Parser;
use serde::Deserialize;
use std::env;
use std::path::PathBuf;

/// Default limit for buffered request bodies (1 MiB)
pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

/// Configuration loaded from CLI args, environment variables, and/or config files
///
/// Config precedence: CLI args > env vars > config file > defaults
#[derive(Debug, Clone)]
pub struct Config {
    /// Replay window in seconds
    pub timespan_secs: i64,
    pub upstream_url: String,
    pub listen_addr: String,
    pub max_body_bytes: usize,
    pub log_level: String,
    /// Diagnostics collected while loading, logged once tracing is up
    pub warnings: Vec<String>,
}

/// CLI arguments structure for clap
#[derive(Debug, Default, Parser)]
#[command(name = "anti-replay-sidecar")]
#[command(about = "Anti-replay sidecar - rejects stale, replayed or tampered signed requests")]
pub struct CliArgs {
    /// Path to configuration file (TOML or YAML)
    #[arg(long)]
    pub config_file: Option<PathBuf>,

    /// Replay window in seconds (overrides env/config)
    #[arg(long)]
    pub timespan: Option<String>,

    /// Upstream API base URL (overrides env/config)
    #[arg(long)]
    pub upstream_url: Option<String>,

    /// Address to listen on, e.g. 0.0.0.0:3000 (overrides env/config)
    #[arg(long)]
    pub listen_addr: Option<String>,

    /// Maximum request body size in bytes (overrides env/config)
    #[arg(long)]
    pub max_body_bytes: Option<usize>,

    /// Logging level: trace, debug, info, warn, error (overrides env/config)
    #[arg(long)]
    pub log_level: Option<String>,
}

/// Config file structure (deserialized from TOML/YAML)
#[derive(Debug, Deserialize, Clone)]
struct ConfigFile {
    gate: Option<GateConfig>,
    logging: Option<LoggingConfig>,
}

#[derive(Debug, Deserialize, Clone)]
struct GateConfig {
    timespan: Option<String>,
    upstream_url: Option<String>,
    listen_addr: Option<String>,
    max_body_bytes: Option<usize>,
}

#[derive(Debug, Deserialize, Clone)]
struct LoggingConfig {
    level: Option<String>,
}

/// Intermediate structure for env var config (all optional for precedence)
struct EnvConfig {
    timespan: Option<String>,
    upstream_url: Option<String>,
    listen_addr: Option<String>,
    max_body_bytes: Option<usize>,
    log_level: Option<String>,
}

impl Config {
    /// Load configuration with precedence: CLI args > env vars > config file > defaults
    ///
    /// A missing, unparseable or non-positive timespan falls back to the
    /// default and leaves a diagnostic in [`Config::warnings`].
    pub fn load(cli_args: &CliArgs) -> Result<Config, GateError> {
        // Load .env file if present (doesn't override existing env vars)
        dotenv::dotenv().ok();

        let file_config = match &cli_args.config_file {
            Some(path) => Some(Self::load_from_file(path)?),
            None => None,
        };
        let file_gate = file_config.as_ref().and_then(|f| f.gate.as_ref());

        let env_config = Self::load_from_env();

        let mut warnings = Vec::new();

        let raw_timespan = cli_args
            .timespan
            .as_ref()
            .or(env_config.timespan.as_ref())
            .or_else(|| file_gate?.timespan.as_ref());
        let timespan_secs = match resolve_timespan(raw_timespan.map(String::as_str)) {
            Ok(secs) => secs,
            Err(warning) => {
                warnings.push(warning);
                DEFAULT_TIME_SPAN_SECS
            }
        };

        let upstream_url = cli_args
            .upstream_url
            .clone()
            .or(env_config.upstream_url)
            .or_else(|| file_gate?.upstream_url.clone())
            .unwrap_or_else(|| "http://localhost:8080".to_string());

        let listen_addr = cli_args
            .listen_addr
            .clone()
            .or(env_config.listen_addr)
            .or_else(|| file_gate?.listen_addr.clone())
            .unwrap_or_else(|| "0.0.0.0:3000".to_string());

        let max_body_bytes = cli_args
            .max_body_bytes
            .or(env_config.max_body_bytes)
            .or_else(|| file_gate?.max_body_bytes)
            .unwrap_or(DEFAULT_MAX_BODY_BYTES);

        let log_level = cli_args
            .log_level
            .clone()
            .or(env_config.log_level)
            .or_else(|| file_config.as_ref()?.logging.as_ref()?.level.clone())
            .unwrap_or_else(|| "info".to_string());

        Ok(Config {
            timespan_secs,
            upstream_url: upstream_url.trim_end_matches('/').to_string(),
            listen_addr,
            max_body_bytes,
            log_level,
            warnings,
        })
    }

    /// Load configuration from file (TOML or YAML)
    fn load_from_file(path: &PathBuf) -> Result<ConfigFile, GateError> {
        use config::Config as ConfigBuilder;

        if !path.exists() {
            return Err(GateError::ConfigError(format!(
                "Config file not found: {}",
                path.display()
            )));
        }

        // Unknown extensions are read as TOML
        let format = match path.extension().and_then(|s| s.to_str()) {
            Some("yaml") | Some("yml") => config::FileFormat::Yaml,
            _ => config::FileFormat::Toml,
        };

        ConfigBuilder::builder()
            .add_source(config::File::from(path.as_path()).format(format))
            .build()
            .map_err(|e| GateError::ConfigError(format!("Failed to load config file: {}", e)))?
            .try_deserialize()
            .map_err(|e| GateError::ConfigError(format!("Failed to parse config file: {}", e)))
    }

    fn load_from_env() -> EnvConfig {
        EnvConfig {
            timespan: env::var("ANTI_REPLAY_TIMESPAN").ok(),
            upstream_url: env::var("ANTI_REPLAY_UPSTREAM_URL").ok(),
            listen_addr: env::var("ANTI_REPLAY_LISTEN_ADDR").ok(),
            max_body_bytes: env::var("ANTI_REPLAY_MAX_BODY_BYTES")
                .ok()
                .and_then(|v| v.parse::<usize>().ok()),
            log_level: env::var("ANTI_REPLAY_LOG_LEVEL").ok(),
        }
    }
}

/// Parse the `timespan` option, returning a diagnostic when the default must apply
fn resolve_timespan(raw: Option<&str>) -> Result<i64, String> {
    let raw = raw.ok_or_else(|| "the argument 'timespan' is missing, using the default".to_string())?;
    match raw.trim().parse::<i64>() {
        Ok(secs) if secs > 0 => Ok(secs),
        _ => Err(format!(
            "failed to parse value {:?} for 'timespan', using the default",
            raw
        )),
    }
}
