//! Configuration types for the tail engine
//!
//! Mirrors the recognized options of the original capped-collection tail
//! input: a collection name, exactly one connection target (host/port or
//! full URL), a label source (`tag` or `tag_key`), an optional time field,
//! and an optional checkpoint location.
//!
//! All cross-field rules are enforced once by [`TailConfig::validate`];
//! the derived views ([`ConnectionTarget`], [`LabelSource`]) are built at
//! construction time so the engine never branches on raw option pairs.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Reserved label used when a configured `tag_key` is absent from a record
/// and no static `tag` is available to fall back on
pub const MISSING_TAG_LABEL: &str = "missing_tag";

/// Default source port
fn default_port() -> u16 {
    27017
}

/// Default idle poll interval in seconds
fn default_wait_time() -> u64 {
    1
}

// ============================================================================
// TailConfig
// ============================================================================

/// Complete configuration for a tail run, loaded from YAML or JSON
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TailConfig {
    /// Capped collection to tail (required)
    pub collection: String,

    /// Source host (mutually exclusive with `url`)
    #[serde(default)]
    pub host: Option<String>,

    /// Source port (only meaningful with `host`)
    #[serde(default = "default_port")]
    pub port: u16,

    /// Full connection URL (mutually exclusive with `host`)
    #[serde(default)]
    pub url: Option<String>,

    /// Idle poll interval in seconds
    #[serde(default = "default_wait_time")]
    pub wait_time: u64,

    /// Static routing label
    #[serde(default)]
    pub tag: Option<String>,

    /// Record field to extract the routing label from
    #[serde(default)]
    pub tag_key: Option<String>,

    /// Record field to extract the event timestamp from; absent means
    /// "time of processing"
    #[serde(default)]
    pub time_key: Option<String>,

    /// File holding the last processed record id; absent disables
    /// persistence and every run starts from the live tail
    #[serde(default)]
    pub checkpoint_location: Option<PathBuf>,

    /// Enable encrypted transport
    #[serde(default)]
    pub ssl: bool,

    /// Credentials (optional)
    #[serde(default)]
    pub user: Option<String>,

    /// Credentials (optional)
    #[serde(default)]
    pub password: Option<String>,

    /// Backoff applied between cursor reopen attempts
    #[serde(default)]
    pub backoff: BackoffConfig,
}

impl TailConfig {
    /// Build a minimal config for the given collection with a host/port
    /// target and a static tag. Mostly useful in tests and examples.
    pub fn new(collection: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            host: Some("localhost".to_string()),
            port: default_port(),
            url: None,
            wait_time: default_wait_time(),
            tag: Some(tag.into()),
            tag_key: None,
            time_key: None,
            checkpoint_location: None,
            ssl: false,
            user: None,
            password: None,
            backoff: BackoffConfig::default(),
        }
    }

    /// Load a config from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse a config from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Enforce cross-field configuration rules.
    ///
    /// Fatal at startup: a run that passed validation can still fail
    /// against the live source, but it can never be mis-assembled.
    pub fn validate(&self) -> Result<()> {
        if self.collection.is_empty() {
            return Err(Error::missing_field("collection"));
        }

        if self.tag.is_none() && self.tag_key.is_none() {
            return Err(Error::config(
                "'tag' or 'tag_key' option is required on tail input",
            ));
        }

        match (&self.host, &self.url) {
            (Some(_), Some(_)) => {
                return Err(Error::config("Both 'host' and 'url' can not be set"));
            }
            (None, None) => {
                return Err(Error::config("One of 'host' or 'url' must be specified"));
            }
            _ => {}
        }

        if let Some(url) = &self.url {
            Url::parse(url)?;
        }

        Ok(())
    }

    /// The validated connection target
    pub fn connection_target(&self) -> Result<ConnectionTarget> {
        match (&self.host, &self.url) {
            (Some(host), None) => Ok(ConnectionTarget::HostPort {
                host: host.clone(),
                port: self.port,
            }),
            (None, Some(url)) => Ok(ConnectionTarget::Uri {
                url: Url::parse(url)?,
            }),
            _ => Err(Error::config("One of 'host' or 'url' must be specified")),
        }
    }

    /// The validated label source
    pub fn label_source(&self) -> Result<LabelSource> {
        if let Some(key) = &self.tag_key {
            return Ok(LabelSource::Field {
                key: key.clone(),
                fallback: self
                    .tag
                    .clone()
                    .unwrap_or_else(|| MISSING_TAG_LABEL.to_string()),
            });
        }
        if let Some(tag) = &self.tag {
            return Ok(LabelSource::Static(tag.clone()));
        }
        Err(Error::config(
            "'tag' or 'tag_key' option is required on tail input",
        ))
    }

    /// Idle poll interval
    pub fn wait_time(&self) -> Duration {
        Duration::from_secs(self.wait_time)
    }

    /// Whether checkpoint persistence is enabled
    pub fn is_persistent(&self) -> bool {
        self.checkpoint_location.is_some()
    }

    /// Render the connection target for error messages
    pub fn node_string(&self) -> String {
        match (&self.host, &self.url) {
            (Some(host), _) => format!("{host}:{}", self.port),
            (None, Some(url)) => url.clone(),
            (None, None) => "<unconfigured>".to_string(),
        }
    }
}

// ============================================================================
// ConnectionTarget
// ============================================================================

/// Where the source lives: either a host/port pair or a full URL.
///
/// Built once at construction so the rest of the crate never re-checks
/// which of the two raw options was set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionTarget {
    /// Direct host and port
    HostPort {
        /// Hostname
        host: String,
        /// Port
        port: u16,
    },
    /// Full connection URL
    Uri {
        /// Parsed URL
        url: Url,
    },
}

// ============================================================================
// LabelSource
// ============================================================================

/// Where the routing label for each emission comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelSource {
    /// Statically configured label
    Static(String),
    /// Extracted (and removed) from a record field
    Field {
        /// Field to extract
        key: String,
        /// Label used when the field is absent
        fallback: String,
    },
}

// ============================================================================
// BackoffConfig
// ============================================================================

/// Exponential backoff between cursor reopen attempts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackoffConfig {
    /// Initial delay in milliseconds
    #[serde(default = "default_initial_ms")]
    pub initial_ms: u64,

    /// Maximum delay in milliseconds
    #[serde(default = "default_max_ms")]
    pub max_ms: u64,

    /// Multiplier applied after each failed reopen
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_ms: default_initial_ms(),
            max_ms: default_max_ms(),
            multiplier: default_multiplier(),
        }
    }
}

fn default_initial_ms() -> u64 {
    100
}

fn default_max_ms() -> u64 {
    60000
}

fn default_multiplier() -> f64 {
    2.0
}
