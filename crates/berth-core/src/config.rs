//! Provisioner configuration.
//!
//! Two parts:
//! - [`ProvisionerConfig`]: how instances are named and created. Loadable from TOML.
//! - [`EngineEnv`]: values taken from the process environment and passed through
//!   to the engine container. Resolved once, at the process boundary.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;

use crate::domain::DEFAULT_INSTANCE_PREFIX;
use crate::ports::EnvVar;

/// Where the engine keeps its state inside the container.
pub const DEFAULT_STATE_DIR: &str = "/var/lib/berth";

pub const SERVICES_DNS_ENV: &str = "_EXPERIMENTAL_BERTH_SERVICES_DNS";

/// Cloud token variable. Takes precedence over [`LEGACY_CLOUD_TOKEN_ENV`].
pub const CLOUD_TOKEN_ENV: &str = "BERTH_CLOUD_TOKEN";

// TODO: stop reading the legacy name once engines older than the rename are unsupported
pub const LEGACY_CLOUD_TOKEN_ENV: &str = "_EXPERIMENTAL_BERTH_CACHESERVICE_TOKEN";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("reading config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("instance prefix must not be empty")]
    EmptyPrefix,

    #[error("state dir {0:?} must be an absolute path")]
    RelativeStateDir(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisionerConfig {
    /// Prefix shared by every managed instance.
    pub instance_prefix: String,

    /// Anonymous volume mounted for engine state.
    pub state_dir: String,

    /// `--restart` policy for created instances.
    pub restart_policy: Option<String>,

    pub privileged: bool,

    /// Arguments passed to the engine entrypoint.
    pub engine_args: Vec<String>,

    /// Upper bound for a whole provisioning call.
    pub deadline_secs: Option<u64>,
}

impl Default for ProvisionerConfig {
    fn default() -> Self {
        Self {
            instance_prefix: DEFAULT_INSTANCE_PREFIX.to_string(),
            state_dir: DEFAULT_STATE_DIR.to_string(),
            restart_policy: Some("always".to_string()),
            privileged: true,
            engine_args: vec!["--debug".to_string()],
            deadline_secs: None,
        }
    }
}

impl ProvisionerConfig {
    /// Load from a TOML file, or defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&contents).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn from_toml(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.instance_prefix.is_empty() {
            return Err(ConfigError::EmptyPrefix);
        }
        if !self.state_dir.starts_with('/') {
            return Err(ConfigError::RelativeStateDir(self.state_dir.clone()));
        }
        Ok(())
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_secs.map(Duration::from_secs)
    }
}

/// Cloud token together with the variable name it was found under.
#[derive(Clone, PartialEq, Eq)]
pub struct CloudToken {
    pub var: &'static str,
    pub value: String,
}

impl fmt::Debug for CloudToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloudToken")
            .field("var", &self.var)
            .field("value", &"[REDACTED]")
            .finish()
    }
}

/// Environment passed through to a newly created engine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineEnv {
    pub services_dns: Option<String>,
    pub cloud_token: Option<CloudToken>,
}

impl EngineEnv {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve using `lookup` (an env reader). The token is looked up under
    /// [`CLOUD_TOKEN_ENV`] first and [`LEGACY_CLOUD_TOKEN_ENV`] second, and
    /// is forwarded under whichever name it was found.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let cloud_token = [CLOUD_TOKEN_ENV, LEGACY_CLOUD_TOKEN_ENV]
            .into_iter()
            .find_map(|var| lookup(var).map(|value| CloudToken { var, value }));
        Self {
            services_dns: lookup(SERVICES_DNS_ENV),
            cloud_token,
        }
    }

    pub fn container_env(&self) -> Vec<EnvVar> {
        let mut env = Vec::new();
        if let Some(value) = &self.services_dns {
            env.push(EnvVar::new(SERVICES_DNS_ENV, value.clone()));
        }
        if let Some(token) = &self.cloud_token {
            env.push(EnvVar::new(token.var, token.value.clone()));
        }
        env
    }
}
