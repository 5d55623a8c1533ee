//! Loader for newsrant configuration with YAML + environment overlays.
//!
//! Sources are merged in this order, later ones winning:
//!
//! 1. YAML/TOML/JSON files attached with [`NewsrantConfigLoader::with_file`] or
//!    [`NewsrantConfigLoader::with_optional_file`], then inline snippets
//! 2. `NEWSRANT__SECTION__KEY` environment variables
//!    (e.g. `NEWSRANT__MONITOR__POLL_INTERVAL_SECS=300`)
//!
//! After merging, every string value has `${VAR}` / `$VAR` placeholders expanded
//! from the process environment, so secrets can stay out of the YAML file.
use config::{Config, ConfigError, Environment, File};
use serde_json::Value;
use std::path::Path;

mod settings;

pub use settings::{
    DEFAULT_HOMEPAGE, DEFAULT_OLLAMA_MODEL, DEFAULT_USER_AGENT, LlmConfig, LoggingSettings,
    MonitorSettings, NewsrantConfig, PostSettings, SourceSettings, TwitterCredentials,
    TwitterSettings,
};

const MAXIMUM_ENV_EXPANSION_DEPTH: usize = 8;
const ENV_PREFIX: &str = "NEWSRANT";

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

/// Reject values the monitor cannot run with.
fn validate(cfg: &NewsrantConfig) -> Result<(), ConfigError> {
    if cfg.monitor.poll_interval_secs == 0 {
        return Err(ConfigError::Message(
            "monitor.poll_interval_secs must be greater than zero".into(),
        ));
    }
    if cfg.monitor.seen_ttl_hours == 0 {
        return Err(ConfigError::Message(
            "monitor.seen_ttl_hours must be greater than zero".into(),
        ));
    }
    if cfg.source.max_articles == 0 {
        return Err(ConfigError::Message(
            "source.max_articles must be greater than zero".into(),
        ));
    }
    match url::Url::parse(&cfg.source.homepage) {
        Ok(u) if matches!(u.scheme(), "http" | "https") => {}
        Ok(u) => {
            return Err(ConfigError::Message(format!(
                "source.homepage must be http(s), got scheme {}",
                u.scheme()
            )));
        }
        Err(e) => {
            return Err(ConfigError::Message(format!(
                "source.homepage is not a valid URL ({}): {e}",
                cfg.source.homepage
            )));
        }
    }
    let frame = cfg.post.prefix.chars().count() + cfg.post.suffix.chars().count();
    if frame >= cfg.post.max_chars {
        return Err(ConfigError::Message(format!(
            "post prefix + suffix ({frame} chars) leave no room within post.max_chars ({})",
            cfg.post.max_chars
        )));
    }
    Ok(())
}

/// Builder hides the `config` crate wiring (files + env overrides).
pub struct NewsrantConfigLoader {
    builder: config::ConfigBuilder<config::builder::DefaultState>,
}

impl Default for NewsrantConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl NewsrantConfigLoader {
    /// Start with no files; `NEWSRANT__` env overrides are applied at [`load`](Self::load).
    ///
    /// ```
    /// use newsrant_config::NewsrantConfigLoader;
    ///
    /// let config = NewsrantConfigLoader::new()
    ///     .with_yaml_str("version: '1'")
    ///     .load()
    ///     .expect("valid config");
    ///
    /// assert_eq!(config.version.as_deref(), Some("1"));
    /// assert_eq!(config.monitor.poll_interval_secs, 600);
    /// ```
    pub fn new() -> Self {
        Self {
            builder: Config::builder(),
        }
    }

    /// Attach a YAML/TOML/JSON file that must exist; format is inferred by suffix.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(true));
        self
    }

    /// Attach a file that may be absent, so headless deployments can rely purely on
    /// environment variables.
    pub fn with_optional_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(false));
        self
    }

    /// Allow tests/CLI to merge inline YAML snippets.
    ///
    /// ```
    /// use newsrant_config::{LlmConfig, NewsrantConfigLoader};
    ///
    /// let cfg = NewsrantConfigLoader::new()
    ///     .with_yaml_str(
    ///         r#"
    /// llm:
    ///   provider: ollama
    ///   model: llama3.2:3b
    /// "#,
    ///     )
    ///     .load()
    ///     .unwrap();
    ///
    /// let LlmConfig::Ollama { model, endpoint, .. } = &cfg.llm;
    /// assert_eq!(model, "llama3.2:3b");
    /// assert_eq!(endpoint, "http://127.0.0.1:11434");
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
    /// use newsrant_config::NewsrantConfigLoader;
    ///
    /// unsafe { std::env::set_var("DOC_X_TOKEN", "injected-from-env"); }
    ///
    /// let config = NewsrantConfigLoader::new()
    ///     .with_yaml_str(r#"
    /// twitter:
    ///   api_key: ck
    ///   api_secret: cs
    ///   access_token: "${DOC_X_TOKEN}"
    ///   access_token_secret: ts
    /// "#)
    ///     .load()
    ///     .expect("valid configuration");
    ///
    /// let creds = config.twitter.credentials().expect("all four set");
    /// assert_eq!(creds.access_token, "injected-from-env");
    ///
    /// unsafe { std::env::remove_var("DOC_X_TOKEN"); }
    /// ```
    pub fn load(self) -> Result<NewsrantConfig, ConfigError> {
        let cfg = self
            .builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut v: Value = cfg.try_deserialize()?;
        expand_env_in_value(&mut v);

        let typed: NewsrantConfig =
            serde_json::from_value(v).map_err(|e| ConfigError::Message(e.to_string()))?;

        validate(&typed)?;
        Ok(typed)
    }
}
