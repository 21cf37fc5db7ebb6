//! Configuration file management.
//!
//! A single TOML document read once at startup. `[network]`, `[accounts]`
//! and `[source]` are required; every other section falls back to defaults.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use pusher_delivery::DeliveryConfig;
use pusher_policy::PolicyConfig;
use pusher_types::Commitment;
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;

use crate::error::PusherError;

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "PUSHER_CONFIG";

/// Config file used when neither an argument nor [`CONFIG_ENV`] is given.
pub const DEFAULT_CONFIG_FILE: &str = "pusher.toml";

/// How long to idle before exiting when the config file is missing.
pub const MISSING_CONFIG_WAIT: Duration = Duration::from_secs(10);

/// Complete pusher configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PusherConfig {
    /// RPC endpoint settings.
    pub network: NetworkConfig,
    /// Program and signer settings.
    pub accounts: AccountsConfig,
    /// Where prices come from.
    pub source: SourceConfig,
    /// Decision policy thresholds.
    #[serde(default)]
    pub feed: FeedConfig,
    /// Transaction delivery timing.
    #[serde(default)]
    pub delivery: DeliverySettings,
    /// Process-level settings.
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

/// RPC endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// JSON-RPC endpoint URL.
    pub rpc_url: String,
    /// Commitment level that counts as confirmed.
    #[serde(default)]
    pub commitment: Commitment,
    /// Timeout for individual RPC requests.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

/// Program and signer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountsConfig {
    /// Base58 id of the oracle program.
    pub program_id: String,
    /// Keypair file paying transaction fees.
    pub payer_keypair: PathBuf,
    /// Keypair file of the oracle data account. The program requires the
    /// data account to sign its own updates.
    pub oracle_keypair: PathBuf,
}

/// Decision policy configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Deviation gate in percent.
    #[serde(default = "default_update_threshold")]
    pub update_threshold: f64,
    /// Freshness floor.
    #[serde(default = "default_update_interval_ms")]
    pub update_interval_ms: u64,
    /// Inactivity window. 0 disables the inactivity rule.
    #[serde(default)]
    pub inactive_duration_ms: u64,
    /// Time between ticks.
    #[serde(default = "default_fetch_interval_ms")]
    pub fetch_interval_ms: u64,
    /// Confidence interval published with every price.
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub min_threshold: Option<f64>,
    #[serde(default)]
    pub max_threshold: Option<f64>,
    #[serde(default)]
    pub allow_negative_spread: bool,
}

/// Delivery timing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliverySettings {
    #[serde(default = "default_deadline_ms")]
    pub deadline_ms: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Must be shorter than `poll_interval_ms`.
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
    #[serde(default = "default_rebroadcast_interval_ms")]
    pub rebroadcast_interval_ms: u64,
    #[serde(default = "default_max_rebroadcasts")]
    pub max_rebroadcasts: u32,
}

/// Observation source configuration, tagged by `kind`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceConfig {
    /// Constant price or bid/ask pair.
    Fixed {
        #[serde(default)]
        price: Option<f64>,
        #[serde(default)]
        bid: Option<f64>,
        #[serde(default)]
        ask: Option<f64>,
    },
    /// JSON document fetched over HTTP.
    Http {
        url: String,
        /// JSON pointer to a single reference price.
        #[serde(default)]
        price_pointer: Option<String>,
        /// JSON pointer to the bid (requires `ask_pointer`).
        #[serde(default)]
        bid_pointer: Option<String>,
        /// JSON pointer to the ask (requires `bid_pointer`).
        #[serde(default)]
        ask_pointer: Option<String>,
        #[serde(default = "default_http_timeout_ms")]
        timeout_ms: u64,
    },
}

/// Process-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Delay before rebuilding the session after a tick error.
    #[serde(default = "default_reconnect_backoff_ms")]
    pub reconnect_backoff_ms: u64,
    /// Log level: "trace" | "debug" | "info" | "warn" | "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// Default value functions

fn default_request_timeout_ms() -> u64 {
    30_000
}

fn default_update_threshold() -> f64 {
    pusher_policy::config::DEFAULT_UPDATE_THRESHOLD
}

fn default_update_interval_ms() -> u64 {
    60_000
}

fn default_fetch_interval_ms() -> u64 {
    1_000
}

fn default_deadline_ms() -> u64 {
    120_000
}

fn default_poll_interval_ms() -> u64 {
    1_000
}

fn default_probe_timeout_ms() -> u64 {
    500
}

fn default_rebroadcast_interval_ms() -> u64 {
    5_000
}

fn default_max_rebroadcasts() -> u32 {
    40
}

fn default_http_timeout_ms() -> u64 {
    10_000
}

fn default_reconnect_backoff_ms() -> u64 {
    10_000
}

/// Log level used until a config file has been read.
pub fn default_log_level() -> String {
    "info".to_string()
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            update_threshold: default_update_threshold(),
            update_interval_ms: default_update_interval_ms(),
            inactive_duration_ms: 0,
            fetch_interval_ms: default_fetch_interval_ms(),
            confidence: 0.0,
            min_threshold: None,
            max_threshold: None,
            allow_negative_spread: false,
        }
    }
}

impl Default for DeliverySettings {
    fn default() -> Self {
        Self {
            deadline_ms: default_deadline_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            probe_timeout_ms: default_probe_timeout_ms(),
            rebroadcast_interval_ms: default_rebroadcast_interval_ms(),
            max_rebroadcasts: default_max_rebroadcasts(),
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            reconnect_backoff_ms: default_reconnect_backoff_ms(),
            log_level: default_log_level(),
        }
    }
}

impl PusherConfig {
    /// Read the config file at `path`.
    ///
    /// Returns `Ok(None)` if the file does not exist.
    pub fn load(path: &Path) -> Result<Option<Self>, PusherError> {
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| PusherError::Config(format!("reading {}: {e}", path.display())))?;
        Self::parse(&content).map(Some)
    }

    /// Parse a TOML document.
    pub fn parse(content: &str) -> Result<Self, PusherError> {
        toml::from_str(content).map_err(|e| PusherError::Config(e.to_string()))
    }

    /// Check every startup invariant.
    ///
    /// # Errors
    ///
    /// Returns a fatal [`PusherError`] describing the first violation.
    pub fn validate(&self) -> Result<(), PusherError> {
        self.policy().validate()?;
        self.delivery().validate()?;
        self.program_id()?;
        if self.feed.fetch_interval_ms == 0 {
            return Err(PusherError::Config("fetch_interval_ms must be nonzero".into()));
        }
        if !self.feed.confidence.is_finite() || self.feed.confidence < 0.0 {
            return Err(PusherError::Config(format!(
                "confidence must be a non-negative number, got {}",
                self.feed.confidence
            )));
        }
        if self.network.rpc_url.is_empty() {
            return Err(PusherError::Config("rpc_url is empty".into()));
        }
        Ok(())
    }

    /// Thresholds for the decision policy.
    pub fn policy(&self) -> PolicyConfig {
        PolicyConfig {
            update_threshold: self.feed.update_threshold,
            update_interval: Duration::from_millis(self.feed.update_interval_ms),
            inactive_duration: Duration::from_millis(self.feed.inactive_duration_ms),
            min_threshold: self.feed.min_threshold,
            max_threshold: self.feed.max_threshold,
            allow_negative_spread: self.feed.allow_negative_spread,
        }
    }

    /// Timing for the delivery protocol.
    pub fn delivery(&self) -> DeliveryConfig {
        DeliveryConfig {
            deadline: Duration::from_millis(self.delivery.deadline_ms),
            poll_interval: Duration::from_millis(self.delivery.poll_interval_ms),
            probe_timeout: Duration::from_millis(self.delivery.probe_timeout_ms),
            rebroadcast_interval: Duration::from_millis(self.delivery.rebroadcast_interval_ms),
            max_rebroadcasts: self.delivery.max_rebroadcasts,
            commitment: self.network.commitment,
        }
    }

    pub fn program_id(&self) -> Result<Pubkey, PusherError> {
        Pubkey::from_str(&self.accounts.program_id).map_err(|e| {
            PusherError::Config(format!("invalid program_id {:?}: {e}", self.accounts.program_id))
        })
    }

    pub fn fetch_interval(&self) -> Duration {
        Duration::from_millis(self.feed.fetch_interval_ms)
    }

    pub fn reconnect_backoff(&self) -> Duration {
        Duration::from_millis(self.runtime.reconnect_backoff_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.network.request_timeout_ms)
    }
}

/// Resolve the config file path: explicit argument, then [`CONFIG_ENV`],
/// then [`DEFAULT_CONFIG_FILE`] in the working directory.
pub fn config_path(arg: Option<String>) -> PathBuf {
    if let Some(path) = arg {
        return PathBuf::from(path);
    }
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        return PathBuf::from(path);
    }
    PathBuf::from(DEFAULT_CONFIG_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [network]
        rpc_url = "http://127.0.0.1:8899"

        [accounts]
        program_id = "8BR3zs8zSXetpnDjCtHWnkpSkNSydWb3PTTDuVKku2uu"
        payer_keypair = "/etc/pusher/payer.json"
        oracle_keypair = "/etc/pusher/oracle.json"

        [source]
        kind = "fixed"
        price = 1.0
    "#;

    #[test]
    fn test_minimal_config_defaults() {
        let config = PusherConfig::parse(MINIMAL).expect("parse");
        assert_eq!(config.network.commitment, Commitment::Confirmed);
        assert_eq!(config.feed.update_interval_ms, 60_000);
        assert_eq!(config.feed.inactive_duration_ms, 0);
        assert_eq!(config.delivery.deadline_ms, 120_000);
        assert_eq!(config.delivery.max_rebroadcasts, 40);
        assert_eq!(config.runtime.reconnect_backoff_ms, 10_000);
        assert_eq!(config.runtime.log_level, "info");
        config.validate().expect("valid");
    }

    #[test]
    fn test_delivery_mapping() {
        let config = PusherConfig::parse(MINIMAL).expect("parse");
        let delivery = config.delivery();
        assert_eq!(delivery, DeliveryConfig::default());
    }

    #[test]
    fn test_inactive_window_must_exceed_update_interval() {
        let doc = format!(
            "{MINIMAL}\n[feed]\nupdate_interval_ms = 1000\ninactive_duration_ms = 500\n"
        );
        let config = PusherConfig::parse(&doc).expect("parse");
        let err = config.validate().expect_err("should refuse to start");
        assert!(err.is_fatal());
        assert!(err.to_string().contains("must exceed update interval"));
    }

    #[test]
    fn test_bad_program_id_rejected() {
        let doc = MINIMAL.replace("8BR3zs8zSXetpnDjCtHWnkpSkNSydWb3PTTDuVKku2uu", "not-a-key");
        let config = PusherConfig::parse(&doc).expect("parse");
        assert!(matches!(config.validate(), Err(PusherError::Config(_))));
    }

    #[test]
    fn test_probe_timeout_must_be_shorter_than_poll() {
        let doc = format!("{MINIMAL}\n[delivery]\npoll_interval_ms = 500\nprobe_timeout_ms = 500\n");
        let config = PusherConfig::parse(&doc).expect("parse");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_http_source_parses() {
        let doc = MINIMAL.replace(
            "kind = \"fixed\"\n        price = 1.0",
            "kind = \"http\"\n        url = \"https://example.test/quote\"\n        bid_pointer = \"/bid\"\n        ask_pointer = \"/ask\"",
        );
        let config = PusherConfig::parse(&doc).expect("parse");
        match config.source {
            SourceConfig::Http {
                bid_pointer,
                timeout_ms,
                ..
            } => {
                assert_eq!(bid_pointer.as_deref(), Some("/bid"));
                assert_eq!(timeout_ms, 10_000);
            }
            other => unreachable!("unexpected source {other:?}"),
        }
    }

    #[test]
    fn test_example_config_is_valid() {
        let config = PusherConfig::parse(include_str!("../../../pusher.example.toml"))
            .expect("example parses");
        config.validate().expect("example validates");
        assert_eq!(config.policy().inactive_duration, Duration::from_secs(300));
    }

    #[test]
    fn test_runtime_section_has_no_missing_file_setting() {
        // The wait applies before any file is read, so it cannot be configured.
        let runtime = toml::to_string(&RuntimeConfig::default()).expect("serialize");
        assert!(!runtime.contains("missing_config"));
        assert_eq!(MISSING_CONFIG_WAIT, Duration::from_secs(10));
    }

    #[test]
    fn test_missing_section_is_error() {
        let err = PusherConfig::parse("[network]\nrpc_url = \"x\"\n").expect_err("incomplete");
        assert!(err.is_fatal());
    }

    #[test]
    fn test_missing_file_is_none() {
        let loaded = PusherConfig::load(Path::new("/nonexistent/pusher.toml")).expect("load");
        assert!(loaded.is_none());
    }

    #[test]
    fn test_config_path_prefers_argument() {
        assert_eq!(
            config_path(Some("/tmp/a.toml".into())),
            PathBuf::from("/tmp/a.toml")
        );
    }
}
