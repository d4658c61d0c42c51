//! Loader for inet configuration with YAML + environment overlays.
//!
//! Every section of `inet.yaml` is optional:
//!
//! ```yaml
//! version: "1"
//! scraper:
//!   about: true
//!   twitter_handles: true
//!   resolve_relative: false
//!   max_concurrency: 4
//!   timeout_secs: 30
//!   max_redirects: 30
//!   about_selector: { css: "a[href]", text: { needle: "about", from: "ABOUT", to: "about" } }
//! logging: { format: json, stderr: true, filter: "inet=debug", dir: "~/logs/inet" }
//! sources:
//!   epo: { key: "${OPS_KEY}", secret: "${OPS_SECRET}" }
//!   companies_house: { api_key: "${CH_API_KEY}", min_interval_ms: 500 }
//! ```
//!
//! Precedence, lowest first: files and inline snippets in the order they were
//! added, then `INET_`-prefixed environment variables (`__` separates nested
//! keys, e.g. `INET_SCRAPER__MAX_CONCURRENCY=8`). `${VAR}` placeholders are
//! expanded after merging, so they work in both files and overrides.
use config::{Config, Environment, File};
pub use config::ConfigError;
use inet_common::observability::LogFormat;
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};

const MAXIMUM_ENV_EXPANSION_DEPTH: usize = 8;
const ENV_PREFIX: &str = "INET";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct InetConfig {
    pub version: Option<String>,
    pub scraper: ScraperSettings,
    pub logging: LoggingSettings,
    pub sources: SourcesConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScraperSettings {
    pub about: bool,
    pub twitter_handles: bool,
    pub resolve_relative: bool,
    pub max_concurrency: usize,
    pub timeout_secs: u64,
    pub max_redirects: usize,
    pub user_agent: Option<String>,
    pub about_selector: Option<SelectorSpec>,
    pub twitter_selector: Option<SelectorSpec>,
}

impl Default for ScraperSettings {
    fn default() -> Self {
        Self {
            about: true,
            twitter_handles: true,
            resolve_relative: false,
            max_concurrency: 4,
            timeout_secs: 30,
            max_redirects: 30,
            user_agent: None,
            about_selector: None,
            twitter_selector: None,
        }
    }
}

/// A link selector as written in config: CSS, attribute, optional text test.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SelectorSpec {
    pub css: String,
    #[serde(default = "default_attr")]
    pub attr: String,
    #[serde(default)]
    pub text: Option<TextSpec>,
}

/// `contains(translate(text, from, to), needle)`, or a case-insensitive
/// `contains` when `ignore_case` is set.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TextSpec {
    pub needle: String,
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub to: String,
    #[serde(default)]
    pub ignore_case: bool,
}

fn default_attr() -> String {
    "href".into()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub format: LogFormat,
    pub stderr: bool,
    pub filter: String,
    pub dir: Option<String>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            format: LogFormat::Text,
            stderr: false,
            filter: "info".into(),
            dir: None,
        }
    }
}

impl LoggingSettings {
    /// `dir` with a leading `~` expanded.
    pub fn log_dir(&self) -> Option<PathBuf> {
        self.dir
            .as_deref()
            .filter(|d| !d.trim().is_empty())
            .map(|d| PathBuf::from(shellexpand::tilde(d).into_owned()))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    pub epo: Option<EpoSettings>,
    pub companies_house: Option<CompaniesHouseSettings>,
}

/// EPO Open Patent Services consumer credentials.
#[derive(Debug, Clone, Deserialize)]
pub struct EpoSettings {
    pub key: String,
    pub secret: String,
    #[serde(default = "default_true")]
    pub cache: bool,
    #[serde(default = "default_epo_interval")]
    pub min_interval_ms: u64,
    #[serde(default)]
    pub base_url: Option<String>,
}

impl EpoSettings {
    /// Key and secret, unless either is blank or an unexpanded placeholder.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        (is_set(&self.key) && is_set(&self.secret)).then(|| (self.key.as_str(), self.secret.as_str()))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompaniesHouseSettings {
    pub api_key: String,
    #[serde(default = "default_true")]
    pub cache: bool,
    #[serde(default = "default_ch_interval")]
    pub min_interval_ms: u64,
    #[serde(default)]
    pub base_url: Option<String>,
}

impl CompaniesHouseSettings {
    pub fn api_key(&self) -> Option<&str> {
        is_set(&self.api_key).then_some(self.api_key.as_str())
    }
}

fn default_true() -> bool {
    true
}
fn default_epo_interval() -> u64 {
    1000
}
fn default_ch_interval() -> u64 {
    500
}

/// A value left as `${VAR}` means the variable was never exported.
fn is_set(v: &str) -> bool {
    !v.trim().is_empty() && !v.contains("${")
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
pub struct InetConfigLoader {
    builder: config::ConfigBuilder<config::builder::DefaultState>,
    env_prefix: String,
}

impl Default for InetConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl InetConfigLoader {
    /// Start with no files and `INET_` env overrides.
    ///
    /// ```
    /// use inet_config::InetConfigLoader;
    ///
    /// let config = InetConfigLoader::new()
    ///     .with_yaml_str("version: '1'\nscraper:\n  max_concurrency: 2")
    ///     .load()
    ///     .expect("valid config");
    ///
    /// assert_eq!(config.version.as_deref(), Some("1"));
    /// assert_eq!(config.scraper.max_concurrency, 2);
    /// assert!(config.scraper.about);
    /// assert!(config.sources.epo.is_none());
    /// ```
    pub fn new() -> Self {
        Self::with_env_prefix(ENV_PREFIX)
    }

    /// Same as [`InetConfigLoader::new`] with another variable prefix.
    pub fn with_env_prefix(prefix: &str) -> Self {
        Self {
            builder: Config::builder(),
            env_prefix: prefix.to_string(),
        }
    }

    /// Attach a YAML/TOML/JSON file; the `config` crate infers format by suffix.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(true));
        self
    }

    /// Like [`InetConfigLoader::with_file`], but a missing file is skipped so
    /// deployments can rely on environment variables alone.
    pub fn with_optional_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(false));
        self
    }

    /// Allow tests/CLI to merge inline YAML snippets.
    ///
    /// ```
    /// use inet_config::InetConfigLoader;
    ///
    /// let cfg = InetConfigLoader::new()
    ///     .with_yaml_str(
    ///         r#"
    /// scraper:
    ///   about_selector:
    ///     css: "nav a"
    ///     text: { needle: "team", ignore_case: true }
    /// sources:
    ///   companies_house:
    ///     api_key: "example"
    /// "#,
    ///     )
    ///     .load()
    ///     .unwrap();
    ///
    /// let about = cfg.scraper.about_selector.unwrap();
    /// assert_eq!(about.attr, "href");
    /// assert!(about.text.unwrap().ignore_case);
    /// let ch = cfg.sources.companies_house.unwrap();
    /// assert_eq!(ch.api_key(), Some("example"));
    /// assert_eq!(ch.min_interval_ms, 500);
    /// ```
    pub fn with_yaml_str(mut self, yaml: &str) -> Self {
        self.builder = self
            .builder
            .add_source(File::from_str(yaml, config::FileFormat::Yaml));
        self
    }

    /// Consume the builder and deserialize the merged sources into strongly typed config.
    pub fn load(self) -> Result<InetConfig, ConfigError> {
        let cfg = self
            .builder
            .add_source(
                Environment::with_prefix(&self.env_prefix)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut v: Value = cfg.try_deserialize()?;
        expand_env_in_value(&mut v);

        serde_json::from_value(v).map_err(|e| ConfigError::Message(e.to_string()))
    }
}
