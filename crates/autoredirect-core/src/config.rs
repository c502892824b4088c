//! Process-wide redirection configuration.
//!
//! Built once at startup, from code or from a TOML file, and shared by
//! reference afterwards. Nothing mutates it after [`RedirectConfigBuilder::build`].
//!
//! ```toml
//! encryption_key = "…"          # required in production
//! debug = false                 # echo decoded descriptors in hidden fields
//! xhtml = true                  # self-closing void elements
//! default_target = "/"
//! legacy_zero_iv = false        # true keeps the fixed-IV wire format
//! exclusions = ["/login/login_form", { pattern = "^/logout" }]
//! ```

use crate::envelope::{Envelope, EnvelopeKey, IvMode};
use crate::error::{RedirectError, Result};
use crate::exclusion::ExclusionRule;
use serde::Deserialize;
use std::path::Path;
use tracing::warn;

/// Secret used when none is configured. Tokens sealed with it are forgeable
/// by anyone who has read this source.
pub const INSECURE_DEFAULT_KEY: &str = "e1cd3bf04d0a24b2a9760d95221c3dee";

/// Environment variable that overrides the configured secret.
pub const ENV_ENCRYPTION_KEY: &str = "AUTOREDIRECT_ENCRYPTION_KEY";

/// Landing location used when no redirection information is available.
pub const DEFAULT_TARGET: &str = "/";

#[derive(Debug, Clone)]
pub struct RedirectConfig {
    envelope: Envelope,
    debug: bool,
    xhtml: bool,
    default_target: String,
    exclusions: Option<ExclusionRule>,
    uses_default_key: bool,
}

impl RedirectConfig {
    pub fn builder() -> RedirectConfigBuilder {
        RedirectConfigBuilder::default()
    }

    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    /// Whether hidden fields carry a readable echo of their descriptor.
    pub fn debug(&self) -> bool {
        self.debug
    }

    /// Whether void elements are written self-closing.
    pub fn xhtml(&self) -> bool {
        self.xhtml
    }

    pub fn default_target(&self) -> &str {
        &self.default_target
    }

    /// Globally excluded destinations, if any were configured.
    pub fn exclusions(&self) -> Option<&ExclusionRule> {
        self.exclusions.as_ref()
    }

    pub fn uses_default_key(&self) -> bool {
        self.uses_default_key
    }

    /// Parse a TOML document. Does not consult the environment.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let file: ConfigFile =
            toml::from_str(text).map_err(|e| RedirectError::Config(e.to_string()))?;
        file.into_builder()?.build_checked()
    }

    /// Load from an optional TOML file, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|e| {
                    RedirectError::Config(format!("failed to read {}: {e}", path.display()))
                })?;
                let file: ConfigFile = toml::from_str(&text).map_err(|e| {
                    RedirectError::Config(format!("invalid toml at {}: {e}", path.display()))
                })?;
                file.into_builder()?
            }
            None => RedirectConfigBuilder::default(),
        };
        if let Ok(secret) = std::env::var(ENV_ENCRYPTION_KEY) {
            builder = builder.encryption_key(secret);
        }
        builder.build_checked()
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    #[serde(default)]
    encryption_key: Option<String>,
    #[serde(default = "default_true")]
    debug: bool,
    #[serde(default = "default_true")]
    xhtml: bool,
    #[serde(default)]
    default_target: Option<String>,
    #[serde(default)]
    legacy_zero_iv: bool,
    #[serde(default)]
    exclusions: Option<toml::Value>,
}

fn default_true() -> bool {
    true
}

impl ConfigFile {
    fn into_builder(self) -> Result<RedirectConfigBuilder> {
        let mut builder = RedirectConfigBuilder::default()
            .debug(self.debug)
            .xhtml(self.xhtml)
            .legacy_zero_iv(self.legacy_zero_iv);
        if let Some(secret) = self.encryption_key {
            builder = builder.encryption_key(secret);
        }
        if let Some(target) = self.default_target {
            builder = builder.default_target(target);
        }
        if let Some(rules) = self.exclusions {
            builder = builder.exclusions(ExclusionRule::from_toml(&rules)?);
        }
        Ok(builder)
    }
}

#[derive(Debug, Clone)]
pub struct RedirectConfigBuilder {
    encryption_key: Option<String>,
    debug: bool,
    xhtml: bool,
    default_target: String,
    legacy_zero_iv: bool,
    exclusions: Option<ExclusionRule>,
}

impl Default for RedirectConfigBuilder {
    fn default() -> Self {
        Self {
            encryption_key: None,
            debug: true,
            xhtml: true,
            default_target: DEFAULT_TARGET.to_string(),
            legacy_zero_iv: false,
            exclusions: None,
        }
    }
}

impl RedirectConfigBuilder {
    pub fn encryption_key(mut self, secret: impl Into<String>) -> Self {
        self.encryption_key = Some(secret.into());
        self
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn xhtml(mut self, xhtml: bool) -> Self {
        self.xhtml = xhtml;
        self
    }

    pub fn default_target(mut self, target: impl Into<String>) -> Self {
        self.default_target = target.into();
        self
    }

    pub fn legacy_zero_iv(mut self, legacy: bool) -> Self {
        self.legacy_zero_iv = legacy;
        self
    }

    pub fn exclusions(mut self, rule: ExclusionRule) -> Self {
        self.exclusions = Some(rule);
        self
    }

    /// Finish the configuration. Falls back to [`INSECURE_DEFAULT_KEY`]
    /// with a warning when no secret was given.
    pub fn build(self) -> RedirectConfig {
        let secret = self.encryption_key.as_deref().unwrap_or(INSECURE_DEFAULT_KEY);
        let uses_default_key = secret == INSECURE_DEFAULT_KEY;
        if uses_default_key {
            warn!(
                "auto-redirection is using the built-in encryption key; set {ENV_ENCRYPTION_KEY} or `encryption_key`"
            );
        }
        let iv_mode = if self.legacy_zero_iv {
            IvMode::Zero
        } else {
            IvMode::Random
        };
        RedirectConfig {
            envelope: Envelope::new(EnvelopeKey::derive(secret), iv_mode),
            debug: self.debug,
            xhtml: self.xhtml,
            default_target: self.default_target,
            exclusions: self.exclusions,
            uses_default_key,
        }
    }

    fn build_checked(self) -> Result<RedirectConfig> {
        if self.encryption_key.as_deref() == Some("") {
            return Err(RedirectError::Config(
                "encryption_key must not be empty".to_string(),
            ));
        }
        if !self.default_target.starts_with('/') && !self.default_target.contains("://") {
            return Err(RedirectError::Config(format!(
                "default_target must be a path or absolute URL, got {:?}",
                self.default_target
            )));
        }
        Ok(self.build())
    }
}
