//! Loader for structify configuration with file + environment overlays.
//!
//! Sources merge in the order they are added, later ones winning:
//! optional config file(s) (YAML/TOML/JSON by suffix), inline YAML snippets,
//! then `STRUCTIFY__`-prefixed environment variables where `__` separates
//! path segments (`STRUCTIFY__LLM__API_KEY` → `llm.api_key`). After merging,
//! `${VAR}` placeholders in string values are expanded from the process
//! environment. Every field has a default, so an empty source set is valid.
//!
//! ```yaml
//! llm:
//!   api_key: "${OPENAI_API_KEY}"
//!   model: gpt-3.5-turbo-1106
//! extraction:
//!   max_input_chars: 16000
//!   max_attempts: 3
//! tags:
//!   wanted: [h1, h2, h3, span, p]
//!   include_links: false
//! fetch:
//!   webdriver_url: http://localhost:9515
//! logging:
//!   format: json
//! ```
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use structify_common::observability::LogFormat;
use structify_common::{DEFAULT_USER_AGENT, LlmConfig};

const MAXIMUM_ENV_EXPANSION_DEPTH: usize = 8;

pub const DEFAULT_MAX_INPUT_CHARS: usize = 16_000;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_TEMPERATURE: f32 = 0.125;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StructifyConfig {
    pub llm: LlmConfig,
    pub extraction: ExtractionConfig,
    pub tags: TagConfig,
    pub fetch: FetchConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Character budget for normalized page text sent to the model.
    pub max_input_chars: usize,
    pub max_attempts: u32,
    pub temperature: f32,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            max_input_chars: DEFAULT_MAX_INPUT_CHARS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

/// Tag whitelist overrides. `None` keeps the normalizer defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TagConfig {
    pub wanted: Option<Vec<String>>,
    pub unwanted: Option<Vec<String>>,
    pub include_links: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub user_agent: String,
    pub timeout_secs: u64,
    pub webdriver_url: String,
    pub headless: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout_secs: 30,
            webdriver_url: "http://localhost:9515".to_string(),
            headless: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub format: LogFormat,
    pub dir: Option<PathBuf>,
    pub stderr: bool,
}

impl StructifyConfig {
    /// Reject values no run could succeed with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.extraction.max_attempts == 0 {
            return Err(ConfigError::Message(
                "extraction.max_attempts must be at least 1".into(),
            ));
        }
        if self.extraction.max_input_chars == 0 {
            return Err(ConfigError::Message(
                "extraction.max_input_chars must be positive".into(),
            ));
        }
        if !(0.0..=2.0).contains(&self.extraction.temperature) {
            return Err(ConfigError::Message(format!(
                "extraction.temperature {} is outside 0.0..=2.0",
                self.extraction.temperature
            )));
        }
        if self.fetch.timeout_secs == 0 {
            return Err(ConfigError::Message("fetch.timeout_secs must be positive".into()));
        }
        Ok(())
    }
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

/// Builder hides the `config` crate wiring (files + env overrides).
pub struct StructifyConfigLoader {
    builder: config::ConfigBuilder<config::builder::DefaultState>,
    env: bool,
}

impl Default for StructifyConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl StructifyConfigLoader {
    /// Start empty; `STRUCTIFY__` environment overrides are applied last on `load`.
    ///
    /// ```
    /// use structify_config::StructifyConfigLoader;
    ///
    /// let config = StructifyConfigLoader::new()
    ///     .with_yaml_str("extraction:\n  max_input_chars: 500")
    ///     .load()
    ///     .expect("valid config");
    ///
    /// assert_eq!(config.extraction.max_input_chars, 500);
    /// assert_eq!(config.extraction.max_attempts, 3);
    /// assert_eq!(config.llm.model, "gpt-3.5-turbo-1106");
    /// ```
    pub fn new() -> Self {
        Self {
            builder: Config::builder(),
            env: true,
        }
    }

    /// Skip the environment overlay.
    pub fn without_env(mut self) -> Self {
        self.env = false;
        self
    }

    /// Attach a YAML/TOML/JSON file; the `config` crate infers format by suffix.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(true));
        self
    }

    /// Like [`with_file`](Self::with_file) but a missing file is skipped.
    pub fn with_optional_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(false));
        self
    }

    /// Merge an inline YAML snippet.
    ///
    /// ```
    /// use structify_config::StructifyConfigLoader;
    ///
    /// let cfg = StructifyConfigLoader::new()
    ///     .without_env()
    ///     .with_yaml_str(
    ///         r#"
    /// tags:
    ///   wanted: [h1, p]
    ///   include_links: true
    /// "#,
    ///     )
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(cfg.tags.wanted.as_deref(), Some(&["h1".to_string(), "p".to_string()][..]));
    /// assert!(cfg.tags.include_links);
    /// ```
    pub fn with_yaml_str(mut self, yaml: &str) -> Self {
        self.builder = self
            .builder
            .add_source(File::from_str(yaml, config::FileFormat::Yaml));
        self
    }

    /// Consume the builder and deserialize the merged sources into strongly typed config.
    ///
    /// ```
    /// use structify_config::StructifyConfigLoader;
    ///
    /// unsafe { std::env::set_var("STRUCTIFY_DOC_KEY", "injected-from-env"); }
    ///
    /// let config = StructifyConfigLoader::new()
    ///     .with_yaml_str(r#"
    /// llm:
    ///   api_key: "${STRUCTIFY_DOC_KEY}"
    /// "#)
    ///     .load()
    ///     .expect("valid configuration");
    ///
    /// assert_eq!(config.llm.api_key, "injected-from-env");
    /// assert_eq!(config.llm.base_url, "https://api.openai.com/v1/");
    ///
    /// unsafe { std::env::remove_var("STRUCTIFY_DOC_KEY"); }
    /// ```
    pub fn load(self) -> Result<StructifyConfig, ConfigError> {
        let mut builder = self.builder;
        if self.env {
            builder = builder.add_source(
                Environment::with_prefix("STRUCTIFY")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("tags.wanted")
                    .with_list_parse_key("tags.unwanted"),
            );
        }
        let cfg = builder.build()?;

        let mut v: Value = cfg.try_deserialize()?;
        expand_env_in_value(&mut v);

        // Round-trip through `Config` so env strings still coerce into numbers and bools.
        let typed: StructifyConfig = Config::try_from(&v)?.try_deserialize()?;
        typed.validate()?;
        Ok(typed)
    }
}
