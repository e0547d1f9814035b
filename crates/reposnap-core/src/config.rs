//! Daemon settings
//!
//! Everything is read once at startup from `REPOSNAP_*` environment
//! variables. Missing or invalid values are startup-fatal.

use crate::error::ConfigError;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Bearer credential
pub const ENV_TOKEN: &str = "REPOSNAP_TOKEN";
/// Root holding the `T-<n>` generations and the fingerprint store
pub const ENV_BACKUP_ROOT: &str = "REPOSNAP_BACKUP_ROOT";
/// Parent directory for per-cycle staging directories
pub const ENV_SCRATCH_ROOT: &str = "REPOSNAP_SCRATCH_ROOT";
/// Seconds to sleep between cycles
pub const ENV_POLL_INTERVAL: &str = "REPOSNAP_POLL_INTERVAL_SECS";
/// Highest generation index kept
pub const ENV_RETENTION_LIMIT: &str = "REPOSNAP_RETENTION_LIMIT";
/// Retries after the first failed export attempt
pub const ENV_MAX_RETRIES: &str = "REPOSNAP_MAX_RETRIES";
/// Seconds between export attempts
pub const ENV_RETRY_DELAY: &str = "REPOSNAP_RETRY_DELAY_SECS";
/// Concurrent exports per cycle
pub const ENV_EXPORT_CONCURRENCY: &str = "REPOSNAP_EXPORT_CONCURRENCY";
/// Remote API base URL
pub const ENV_API_URL: &str = "REPOSNAP_API_URL";
/// Host used to build clone URLs
pub const ENV_GIT_HOST: &str = "REPOSNAP_GIT_HOST";

/// Fingerprint store file name under the backup root
pub const FINGERPRINT_FILE_NAME: &str = "fingerprints.json";

/// Default retries after the first attempt
pub const DEFAULT_MAX_RETRIES: u32 = 10;
/// Default delay between attempts
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(10);
/// Default remote API
pub const DEFAULT_API_URL: &str = "https://api.github.com";
/// Default clone host
pub const DEFAULT_GIT_HOST: &str = "github.com";

/// Secret token; never printed
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wrap a token
    #[inline]
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token, for request headers and clone URLs only
    #[inline]
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// Fixed-delay retry bound for one repository export.
///
/// An export is attempted once, then retried up to `max_retries` times,
/// sleeping `delay` before every retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Sleep before each retry
    pub delay: Duration,
}

impl RetryPolicy {
    /// Create a policy
    #[inline]
    #[must_use]
    pub fn new(max_retries: u32, delay: Duration) -> Self {
        Self { max_retries, delay }
    }

    /// Upper bound on archiver invocations for one repository
    #[inline]
    #[must_use]
    pub fn total_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY)
    }
}

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Settings {
    /// Bearer credential for the API and clone URLs
    pub token: Credential,
    /// Generation root
    pub backup_root: PathBuf,
    /// Staging parent
    pub scratch_root: PathBuf,
    /// Sleep between cycles
    pub poll_interval: Duration,
    /// Highest retained generation index
    pub retention_limit: u32,
    /// Per-repository retry bound
    pub retry: RetryPolicy,
    /// Concurrent exports (1 = sequential)
    pub export_concurrency: usize,
    /// Remote API base URL
    pub api_url: String,
    /// Clone host
    pub git_host: String,
}

impl Settings {
    /// Create settings with defaults for the optional values
    #[must_use]
    pub fn new(
        token: Credential,
        backup_root: impl Into<PathBuf>,
        scratch_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            token,
            backup_root: backup_root.into(),
            scratch_root: scratch_root.into(),
            poll_interval: Duration::from_secs(12 * 60 * 60),
            retention_limit: 30,
            retry: RetryPolicy::default(),
            export_concurrency: 1,
            api_url: DEFAULT_API_URL.to_string(),
            git_host: DEFAULT_GIT_HOST.to_string(),
        }
    }

    /// With retention limit
    #[inline]
    #[must_use]
    pub fn with_retention_limit(mut self, limit: u32) -> Self {
        self.retention_limit = limit;
        self
    }

    /// With retry policy
    #[inline]
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// With export concurrency
    #[inline]
    #[must_use]
    pub fn with_export_concurrency(mut self, concurrency: usize) -> Self {
        self.export_concurrency = concurrency.max(1);
        self
    }

    /// With poll interval
    #[inline]
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Read settings from the process environment
    ///
    /// # Errors
    /// `ConfigError` naming the first missing or invalid variable
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through `lookup` (the environment, or a map in tests)
    ///
    /// # Errors
    /// `ConfigError` naming the first missing or invalid variable
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let token = required(&lookup, ENV_TOKEN)?;
        let backup_root = PathBuf::from(required(&lookup, ENV_BACKUP_ROOT)?);
        let scratch_root = PathBuf::from(required(&lookup, ENV_SCRATCH_ROOT)?);

        let poll_secs: u64 = parse(ENV_POLL_INTERVAL, &required(&lookup, ENV_POLL_INTERVAL)?)?;
        if poll_secs == 0 {
            return Err(ConfigError::invalid(ENV_POLL_INTERVAL, "0", "must be greater than zero"));
        }

        let retention_raw = required(&lookup, ENV_RETENTION_LIMIT)?;
        let retention_limit: u32 = parse(ENV_RETENTION_LIMIT, &retention_raw)?;
        if retention_limit == 0 {
            return Err(ConfigError::invalid(
                ENV_RETENTION_LIMIT,
                retention_raw,
                "must keep at least one previous generation",
            ));
        }

        let max_retries = optional(&lookup, ENV_MAX_RETRIES)
            .map(|raw| parse(ENV_MAX_RETRIES, &raw))
            .transpose()?
            .unwrap_or(DEFAULT_MAX_RETRIES);
        let delay = optional(&lookup, ENV_RETRY_DELAY)
            .map(|raw| parse::<u64>(ENV_RETRY_DELAY, &raw).map(Duration::from_secs))
            .transpose()?
            .unwrap_or(DEFAULT_RETRY_DELAY);

        let export_concurrency = match optional(&lookup, ENV_EXPORT_CONCURRENCY) {
            Some(raw) => {
                let value: usize = parse(ENV_EXPORT_CONCURRENCY, &raw)?;
                if value == 0 {
                    return Err(ConfigError::invalid(ENV_EXPORT_CONCURRENCY, raw, "must be at least 1"));
                }
                value
            }
            None => 1,
        };

        let api_url = optional(&lookup, ENV_API_URL)
            .unwrap_or_else(|| DEFAULT_API_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        if !(api_url.starts_with("http://") || api_url.starts_with("https://")) {
            return Err(ConfigError::invalid(ENV_API_URL, api_url, "must be an http(s) URL"));
        }
        let git_host = optional(&lookup, ENV_GIT_HOST).unwrap_or_else(|| DEFAULT_GIT_HOST.to_string());

        Ok(Self {
            token: Credential::new(token),
            backup_root,
            scratch_root,
            poll_interval: Duration::from_secs(poll_secs),
            retention_limit,
            retry: RetryPolicy::new(max_retries, delay),
            export_concurrency,
            api_url,
            git_host,
        })
    }

    /// Create the backup and scratch roots and check both are writable
    ///
    /// # Errors
    /// `ConfigError::Unwritable` for the first directory that fails
    pub fn prepare_directories(&self) -> Result<(), ConfigError> {
        ensure_writable(&self.backup_root)?;
        ensure_writable(&self.scratch_root)
    }

    /// Location of the fingerprint store
    #[inline]
    #[must_use]
    pub fn fingerprint_store_path(&self) -> PathBuf {
        self.backup_root.join(FINGERPRINT_FILE_NAME)
    }
}

fn required<F>(lookup: &F, var: &'static str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    optional(lookup, var).ok_or(ConfigError::Missing { var })
}

fn optional<F>(lookup: &F, var: &'static str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(var)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse<T>(var: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    raw.parse()
        .map_err(|e: T::Err| ConfigError::invalid(var, raw, e.to_string()))
}

fn ensure_writable(dir: &Path) -> Result<(), ConfigError> {
    let unwritable = |source| ConfigError::Unwritable {
        path: dir.to_path_buf(),
        source,
    };
    std::fs::create_dir_all(dir).map_err(unwritable)?;
    // The probe file is removed when dropped.
    tempfile::Builder::new()
        .prefix(".reposnap-probe-")
        .tempfile_in(dir)
        .map(drop)
        .map_err(unwritable)
}
