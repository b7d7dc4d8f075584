//! Loader for `gist.yaml` with environment overlays.
//!
//! Sources are merged in order, later ones winning:
//!
//! 1. `~/.config/gist/gist.yaml` (optional)
//! 2. `./gist.yaml` (optional) or an explicit `--config` file (required)
//! 3. `GIST__SECTION__KEY` environment variables
//!
//! String values may reference environment variables as `${VAR}` or `$VAR`;
//! references are expanded recursively after merging. Every section is
//! optional and falls back to its defaults.
use config::{Config, ConfigError, Environment, File};
use gist_common::observability::LogFormat;
use gist_drivers::{DriverOptions, StealthProfile};
use gist_llm::config::LlmConfig;
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;

const MAXIMUM_ENV_EXPANSION_DEPTH: usize = 8;
const CONFIG_FILE_NAME: &str = "gist.yaml";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct GistConfig {
    pub llm: LlmConfig,
    pub browser: BrowserConfig,
    pub scheduler: SchedulerSettings,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub webdriver_url: String,
    pub headless: bool,
    pub stealth: StealthProfile,
    pub navigation_timeout_ms: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        let driver = DriverOptions::default();
        Self {
            webdriver_url: driver.webdriver_url,
            headless: driver.headless,
            stealth: driver.stealth,
            navigation_timeout_ms: 60_000,
        }
    }
}

impl BrowserConfig {
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }

    pub fn driver_options(&self) -> DriverOptions {
        DriverOptions {
            webdriver_url: self.webdriver_url.clone(),
            headless: self.headless,
            stealth: self.stealth.clone(),
            navigation_timeout: self.navigation_timeout(),
        }
    }
}

/// Bounds on concurrent language-model calls.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SchedulerSettings {
    pub max_concurrent: usize,
    pub min_delay_ms: u64,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            max_concurrent: 2,
            min_delay_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub dir: Option<PathBuf>,
    pub format: LogFormat,
    pub stderr: bool,
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: None,
            format: LogFormat::Text,
            stderr: false,
            filter: "info".to_string(),
        }
    }
}

/// Per-user config file location, if the platform has one.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("gist").join(CONFIG_FILE_NAME))
}

fn expand_env_in_value(v: &mut Value) {
    match v {
        Value::String(s) => {
            if s.contains('$') {
                let mut cur = std::mem::take(s);
                for _ in 0..MAXIMUM_ENV_EXPANSION_DEPTH {
                    let expanded = match shellexpand::env(&cur) {
                        Ok(cow) => cow.into_owned(),
                        Err(_) => cur.clone(),
                    };
                    if expanded == cur {
                        break;
                    }
                    cur = expanded;
                }
                *s = cur;
            }
        }
        Value::Array(arr) => arr.iter_mut().for_each(expand_env_in_value),
        Value::Object(obj) => obj.values_mut().for_each(expand_env_in_value),
        _ => {}
    }
}

/// Builder hides the `config` crate wiring (YAML + env overrides).
pub struct GistConfigLoader {
    builder: config::ConfigBuilder<config::builder::DefaultState>,
    env_prefix: String,
}

impl Default for GistConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl GistConfigLoader {
    /// An empty loader; environment overrides are applied last by [`GistConfigLoader::load`].
    ///
    /// ```
    /// use gist_config::GistConfigLoader;
    ///
    /// let config = GistConfigLoader::new().load().expect("defaults");
    /// assert_eq!(config.scheduler.max_concurrent, 2);
    /// assert_eq!(config.browser.navigation_timeout_ms, 60_000);
    /// ```
    pub fn new() -> Self {
        Self {
            builder: Config::builder(),
            env_prefix: "GIST".to_string(),
        }
    }

    /// Use another environment prefix (tests isolate themselves this way).
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// The user file and `./gist.yaml`, both optional.
    pub fn with_default_files(mut self) -> Self {
        if let Some(path) = user_config_path() {
            self.builder = self.builder.add_source(File::from(path).required(false));
        }
        self.builder = self
            .builder
            .add_source(File::from(Path::new(CONFIG_FILE_NAME)).required(false));
        self
    }

    /// Attach a YAML/TOML/JSON file that must exist; format is inferred by suffix.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(true));
        self
    }

    /// Merge an inline YAML snippet.
    ///
    /// ```
    /// use gist_config::GistConfigLoader;
    /// use gist_llm::config::LlmConfig;
    ///
    /// let cfg = GistConfigLoader::new()
    ///     .with_yaml_str(
    ///         r#"
    /// llm:
    ///   provider: ollama
    ///   model: "mistral:7b"
    /// browser:
    ///   headless: false
    /// "#,
    ///     )
    ///     .load()
    ///     .unwrap();
    ///
    /// assert!(matches!(&cfg.llm, LlmConfig::Ollama { model, .. } if model == "mistral:7b"));
    /// assert!(!cfg.browser.headless);
    /// assert_eq!(cfg.browser.webdriver_url, "http://localhost:9515");
    /// ```
    pub fn with_yaml_str(mut self, yaml: &str) -> Self {
        self.builder = self
            .builder
            .add_source(File::from_str(yaml, config::FileFormat::Yaml));
        self
    }

    /// Merge all sources, expand `${VAR}` references and deserialize.
    pub fn load(self) -> Result<GistConfig, ConfigError> {
        let cfg = self
            .builder
            .add_source(
                Environment::with_prefix(&self.env_prefix)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut v: Value = cfg.try_deserialize()?;
        expand_env_in_value(&mut v);

        serde_json::from_value(v).map_err(|e| ConfigError::Message(e.to_string()))
    }
}
