//! Driver configuration: layered files, inline YAML and environment overrides.
//!
//! Later sources override earlier ones and `HTMLDRIVER__*` variables are
//! applied last (`HTMLDRIVER__DRIVER__MAX_REDIRECTS=3` sets
//! `driver.max_redirects`). Any string may reference environment variables
//! as `$VAR` or `${VAR}`; a variable whose value holds another reference is
//! expanded again, a bounded number of times.
use std::path::{Path, PathBuf};

use config::{Config, ConfigBuilder, ConfigError, Environment, File, FileFormat, builder::DefaultState};
use htmldriver_common::DriverSettings;
use serde::Deserialize;
use serde_json::Value;

const ENV_PREFIX: &str = "HTMLDRIVER";
const MAX_EXPANSION_ROUNDS: usize = 8;

/// Contents of `htmldriver.yaml`.
#[derive(Debug, Default, Deserialize)]
pub struct HtmlDriverConfig {
    pub version: Option<String>,
    #[serde(default)]
    pub driver: DriverSettings,
}

/// `<config dir>/htmldriver/htmldriver.yaml`, when the platform has a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    Some(dirs::config_dir()?.join("htmldriver").join("htmldriver.yaml"))
}

pub struct DriverConfigLoader {
    sources: ConfigBuilder<DefaultState>,
    env_overrides: bool,
}

impl Default for DriverConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DriverConfigLoader {
    /// Loader with environment overrides and no files.
    ///
    /// ```
    /// use htmldriver_config::DriverConfigLoader;
    ///
    /// let config = DriverConfigLoader::new()
    ///     .with_yaml_str("version: '1'\ndriver:\n  max_redirects: 4")
    ///     .load()
    ///     .expect("valid config");
    ///
    /// assert_eq!(config.version.as_deref(), Some("1"));
    /// assert_eq!(config.driver.max_redirects, 4);
    /// ```
    pub fn new() -> Self {
        Self {
            sources: Config::builder(),
            env_overrides: true,
        }
    }

    /// Skip `HTMLDRIVER__*` overrides.
    pub fn without_env(mut self) -> Self {
        self.env_overrides = false;
        self
    }

    /// Required file; the format follows the extension.
    pub fn with_file(self, path: impl AsRef<Path>) -> Self {
        self.add_file(path.as_ref(), true)
    }

    /// File that is skipped when it does not exist.
    pub fn with_optional_file(self, path: impl AsRef<Path>) -> Self {
        self.add_file(path.as_ref(), false)
    }

    /// The per-user file from [`default_config_path`], if present.
    pub fn with_user_file(self) -> Self {
        match default_config_path() {
            Some(path) => self.with_optional_file(path),
            None => self,
        }
    }

    /// Inline YAML.
    ///
    /// ```
    /// use htmldriver_config::DriverConfigLoader;
    ///
    /// let cfg = DriverConfigLoader::new()
    ///     .with_yaml_str(
    ///         r#"
    /// driver:
    ///   user_agent: "integration-suite"
    ///   timeouts:
    ///     page_load_ms: 2500
    /// "#,
    ///     )
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(cfg.driver.user_agent, "integration-suite");
    /// assert_eq!(cfg.driver.timeouts.page_load_ms, 2500);
    /// assert_eq!(cfg.driver.max_redirects, 20);
    /// ```
    pub fn with_yaml_str(mut self, yaml: &str) -> Self {
        self.sources = self
            .sources
            .add_source(File::from_str(yaml, FileFormat::Yaml));
        self
    }

    fn add_file(mut self, path: &Path, required: bool) -> Self {
        self.sources = self.sources.add_source(File::from(path).required(required));
        self
    }

    /// Merge every source, expand placeholders and build the typed config.
    pub fn load(self) -> Result<HtmlDriverConfig, ConfigError> {
        let mut sources = self.sources;
        if self.env_overrides {
            sources = sources.add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            );
        }
        let merged: Value = sources.build()?.try_deserialize()?;
        let config: HtmlDriverConfig = serde_json::from_value(expand_placeholders(merged))
            .map_err(|e| ConfigError::Message(format!("invalid driver configuration: {e}")))?;

        tracing::debug!(
            target: "config",
            version = ?config.version,
            user_agent = %config.driver.user_agent,
            max_redirects = config.driver.max_redirects,
            page_load_ms = config.driver.timeouts.page_load_ms,
            "config.loaded"
        );
        Ok(config)
    }
}

fn expand_placeholders(value: Value) -> Value {
    match value {
        Value::String(s) if s.contains('$') => Value::String(expand_str(s)),
        Value::Array(items) => Value::Array(items.into_iter().map(expand_placeholders).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, expand_placeholders(v)))
                .collect(),
        ),
        other => other,
    }
}

/// Expand until nothing changes; unknown variables stay as written.
fn expand_str(mut current: String) -> String {
    for _ in 0..MAX_EXPANSION_ROUNDS {
        let next = match shellexpand::env(&current) {
            Ok(expanded) if expanded != current => expanded.into_owned(),
            _ => return current,
        };
        current = next;
    }
    current
}
