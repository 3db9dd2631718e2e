//! Runtime configuration
//!
//! Resolved once at startup: compiled-in defaults, then an optional YAML/JSON
//! file, then the environment tuning knobs. Components receive the resolved
//! values by value and never read the environment themselves.

use crate::{PodnsError, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use tracing::warn;

pub const SYNC_INTERVAL_ENV: &str = "KUBELET_STATUS_SYNC_INTERVAL";
pub const RECORD_TTL_ENV: &str = "LOCAL_CLUSTER_DNS_RECORD_TTL";
pub const NO_MATCH_ENV: &str = "LOCAL_CLUSTER_DNS_NO_MATCH";
pub const INSTANCE_ID_ENV: &str = "INSTANCE_ID";

pub const DEFAULT_SYNC_INTERVAL_SECS: u64 = 10;
pub const DEFAULT_RECORD_TTL_SECS: u32 = 30;

/// What an in-scope query with no matching pod gets back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoMatchPolicy {
    /// NOERROR with an empty answer section
    #[default]
    Empty,
    /// NXDOMAIN with an empty answer section
    NxDomain,
}

impl std::str::FromStr for NoMatchPolicy {
    type Err = PodnsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "empty" => Ok(NoMatchPolicy::Empty),
            "nxdomain" => Ok(NoMatchPolicy::NxDomain),
            other => Err(PodnsError::ConfigError(format!(
                "unknown no-match policy '{}', expected 'empty' or 'nxdomain'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KubeletConfig {
    pub service_addr: String,
    pub pods_api: String,
    pub healthz_api: String,
    pub timeout_secs: u64,
}

impl Default for KubeletConfig {
    fn default() -> Self {
        Self {
            service_addr: "https://localhost:10250".to_string(),
            pods_api: "/pods".to_string(),
            healthz_api: "/healthz".to_string(),
            timeout_secs: 10,
        }
    }
}

impl KubeletConfig {
    pub fn pods_url(&self) -> String {
        format!("{}{}", self.service_addr, self.pods_api)
    }

    pub fn healthz_url(&self) -> String {
        format!("{}{}", self.service_addr, self.healthz_api)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DnsConfig {
    pub bind_addr: SocketAddr,
    /// Resolver that receives queries outside `cluster.local.`
    pub upstream: Option<SocketAddr>,
    pub forward_timeout_ms: u64,
}

impl Default for DnsConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 53)),
            upstream: None,
            forward_timeout_ms: 2000,
        }
    }
}

impl DnsConfig {
    pub fn forward_timeout(&self) -> Duration {
        Duration::from_millis(self.forward_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `tracing` filter directive, e.g. `info` or `podns=debug`
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sync_interval_secs: u64,
    pub record_ttl: u32,
    pub no_match: NoMatchPolicy,
    pub instance_id: Option<String>,
    pub kubelet: KubeletConfig,
    pub dns: DnsConfig,
    pub log: LogConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sync_interval_secs: DEFAULT_SYNC_INTERVAL_SECS,
            record_ttl: DEFAULT_RECORD_TTL_SECS,
            no_match: NoMatchPolicy::default(),
            instance_id: None,
            kubelet: KubeletConfig::default(),
            dns: DnsConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl Config {
    /// Defaults, overlaid by the file at `path` when one is given.
    ///
    /// Environment tuning is applied separately with [`Config::with_process_env`]
    /// so that the log level from the file is in effect when it runs.
    pub fn from_path(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::from_file(p),
            None => Ok(Self::default()),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        serde_yaml::from_str(&raw).map_err(|e| PodnsError::ConfigFileError {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }

    /// Apply environment overrides read through `lookup`.
    ///
    /// Malformed values are logged and ignored; the current value stays.
    pub fn with_env<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        self.sync_interval_secs =
            positive_int(&lookup, SYNC_INTERVAL_ENV).unwrap_or(self.sync_interval_secs);
        // TTL 0 is legal and means "do not cache"
        self.record_ttl = int(&lookup, RECORD_TTL_ENV).unwrap_or(self.record_ttl);

        if let Some(raw) = lookup(NO_MATCH_ENV) {
            match raw.parse() {
                Ok(policy) => self.no_match = policy,
                Err(e) => warn!(env_var = NO_MATCH_ENV, error = %e, "Ignoring no-match policy"),
            }
        }

        if let Some(id) = lookup(INSTANCE_ID_ENV) {
            let id = id.trim().to_lowercase();
            if !id.is_empty() {
                self.instance_id = Some(id);
            }
        }

        self
    }

    pub fn with_process_env(self) -> Self {
        self.with_env(|key| std::env::var(key).ok())
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs)
    }
}

fn int<F, T>(lookup: &F, key: &str) -> Option<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(e) => {
            warn!(
                env_var = key,
                value = %raw,
                error = %e,
                "Value is not an integer, using default"
            );
            None
        }
    }
}

/// Like [`int`], but zero is rejected as well
fn positive_int<F, T>(lookup: &F, key: &str) -> Option<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr + PartialOrd + Default,
    T::Err: std::fmt::Display,
{
    match int::<F, T>(lookup, key)? {
        v if v > T::default() => Some(v),
        _ => {
            warn!(env_var = key, "Value must be positive, using default");
            None
        }
    }
}
