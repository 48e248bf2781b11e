//! Configuration loading from marquee.toml.

use std::path::Path;
use std::time::Duration;

use runtime::{AnthropicBackend, GeminiBackend, OrchestratorConfig, Provider};
use serde::Deserialize;
use tmdb::TmdbConfig;

/// Default configuration file, relative to the working directory.
pub const CONFIG_FILE: &str = "marquee.toml";

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub model: ModelConfig,

    #[serde(default)]
    pub tmdb: TmdbSection,

    #[serde(default)]
    pub orchestrator: OrchestratorSection,
}

/// Which model provider to talk to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Gemini,
    Anthropic,
}

impl ProviderKind {
    fn default_model(self) -> &'static str {
        match self {
            Self::Gemini => "gemini-1.5-flash",
            Self::Anthropic => "claude-sonnet-4-20250514",
        }
    }

    fn api_key_var(self) -> &'static str {
        match self {
            Self::Gemini => "GEMINI_API_KEY",
            Self::Anthropic => "ANTHROPIC_API_KEY",
        }
    }
}

/// Model provider configuration.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelConfig {
    #[serde(default)]
    pub provider: ProviderKind,

    /// Model name; provider default when unset.
    pub model: Option<String>,

    /// Falls back to the provider's environment variable.
    pub api_key: Option<String>,

    pub base_url: Option<String>,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// System prompt; a movie-assistant prompt when unset.
    pub system: Option<String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            model: None,
            api_key: None,
            base_url: None,
            max_tokens: default_max_tokens(),
            system: None,
        }
    }
}

/// TMDB configuration.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TmdbSection {
    /// Falls back to `TMDB_API_KEY`.
    pub api_key: Option<String>,

    #[serde(default = "default_tmdb_url")]
    pub base_url: String,

    #[serde(default = "default_tmdb_timeout")]
    pub timeout_secs: u64,
}

impl Default for TmdbSection {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_tmdb_url(),
            timeout_secs: default_tmdb_timeout(),
        }
    }
}

/// Orchestration limits.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrchestratorSection {
    #[serde(default = "default_model_timeout")]
    pub model_timeout_secs: u64,

    #[serde(default = "default_tool_timeout")]
    pub tool_timeout_secs: u64,

    #[serde(default = "default_parallel")]
    pub parallel_tools: bool,
}

impl Default for OrchestratorSection {
    fn default() -> Self {
        Self {
            model_timeout_secs: default_model_timeout(),
            tool_timeout_secs: default_tool_timeout(),
            parallel_tools: default_parallel(),
        }
    }
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_tmdb_url() -> String {
    tmdb::DEFAULT_BASE_URL.to_string()
}

fn default_tmdb_timeout() -> u64 {
    tmdb::DEFAULT_TIMEOUT.as_secs()
}

fn default_model_timeout() -> u64 {
    60
}

fn default_tool_timeout() -> u64 {
    15
}

fn default_parallel() -> bool {
    true
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Load `path` if given, otherwise the default file when it exists.
    ///
    /// An explicit path that does not exist is an error; a missing default
    /// file yields the defaults.
    pub fn discover(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None if Path::new(CONFIG_FILE).exists() => Self::load(CONFIG_FILE),
            None => Ok(Self::default()),
        }
    }

    /// Parse configuration from TOML string.
    pub fn parse(toml: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Timeouts must be positive; a zero timeout fails every call.
    fn validate(&self) -> Result<(), ConfigError> {
        let timeouts = [
            ("orchestrator.model_timeout_secs", self.orchestrator.model_timeout_secs),
            ("orchestrator.tool_timeout_secs", self.orchestrator.tool_timeout_secs),
            ("tmdb.timeout_secs", self.tmdb.timeout_secs),
        ];
        match timeouts.into_iter().find(|(_, secs)| *secs == 0) {
            Some((key, _)) => Err(ConfigError::Invalid(format!("{key} must be greater than 0"))),
            None => Ok(()),
        }
    }

    /// Build the model backend, reading the key from the environment when
    /// the file has none.
    pub fn backend(&self, system: &str) -> Result<Provider, ConfigError> {
        self.backend_with(system, |var| std::env::var(var).ok())
    }

    fn backend_with(
        &self,
        system: &str,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Provider, ConfigError> {
        let model = &self.model;
        let kind = model.provider;
        let api_key = resolve_key(model.api_key.as_deref(), kind.api_key_var(), &env)?;
        let name = model.model.as_deref().unwrap_or(kind.default_model());
        let system = model.system.as_deref().unwrap_or(system);

        let provider = match kind {
            ProviderKind::Gemini => {
                let mut builder = GeminiBackend::builder(api_key, name)
                    .max_tokens(model.max_tokens)
                    .system(system);
                if let Some(url) = &model.base_url {
                    builder = builder.base_url(url);
                }
                builder.build().into()
            }
            ProviderKind::Anthropic => {
                let mut builder = AnthropicBackend::builder(api_key, name)
                    .max_tokens(model.max_tokens)
                    .system(system);
                if let Some(url) = &model.base_url {
                    builder = builder.base_url(url);
                }
                builder.build().into()
            }
        };
        Ok(provider)
    }

    /// TMDB client settings, reading the key from the environment when the
    /// file has none.
    pub fn tmdb(&self) -> Result<TmdbConfig, ConfigError> {
        self.tmdb_with(|var| std::env::var(var).ok())
    }

    fn tmdb_with(&self, env: impl Fn(&str) -> Option<String>) -> Result<TmdbConfig, ConfigError> {
        let api_key = resolve_key(self.tmdb.api_key.as_deref(), "TMDB_API_KEY", &env)?;
        Ok(TmdbConfig {
            api_key,
            base_url: self.tmdb.base_url.clone(),
            timeout: Duration::from_secs(self.tmdb.timeout_secs),
        })
    }

    pub fn orchestrator(&self) -> OrchestratorConfig {
        let section = &self.orchestrator;
        OrchestratorConfig {
            model_timeout: Duration::from_secs(section.model_timeout_secs),
            tool_timeout: Duration::from_secs(section.tool_timeout_secs),
            parallel_tools: section.parallel_tools,
        }
    }
}

fn resolve_key(
    configured: Option<&str>,
    var: &'static str,
    env: impl Fn(&str) -> Option<String>,
) -> Result<String, ConfigError> {
    configured
        .map(str::to_string)
        .or_else(|| env(var))
        .filter(|key| !key.trim().is_empty())
        .ok_or(ConfigError::MissingKey(var))
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("api key not configured: set it in marquee.toml or export {0}")]
    MissingKey(&'static str),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn empty_file_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.model.provider, ProviderKind::Gemini);
        assert_eq!(config.model.max_tokens, 1024);
        assert_eq!(config.tmdb.base_url, "https://api.themoviedb.org/3");

        let orchestrator = config.orchestrator();
        assert_eq!(orchestrator.model_timeout, Duration::from_secs(60));
        assert_eq!(orchestrator.tool_timeout, Duration::from_secs(15));
        assert!(orchestrator.parallel_tools);
    }

    #[test]
    fn parses_all_sections() {
        let config = Config::parse(
            r#"
            [model]
            provider = "anthropic"
            model = "claude-3-5-haiku-latest"
            api_key = "sk-ant"
            max_tokens = 512

            [tmdb]
            api_key = "tmdb"
            timeout_secs = 3

            [orchestrator]
            tool_timeout_secs = 5
            parallel_tools = false
            "#,
        )
        .unwrap();

        assert_eq!(config.model.provider, ProviderKind::Anthropic);
        assert_eq!(config.model.max_tokens, 512);
        assert_eq!(config.tmdb.timeout_secs, 3);
        assert!(!config.orchestrator.parallel_tools);

        let provider = config.backend_with("system", no_env).unwrap();
        assert_eq!(provider.to_string(), "anthropic(claude-3-5-haiku-latest)");
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = Config::parse("[model]\nprovidr = \"gemini\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));

        let err = Config::parse("[model]\nprovider = \"openai\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn keys_fall_back_to_environment() {
        let config = Config::default();
        let env = |var: &str| match var {
            "GEMINI_API_KEY" => Some("AIza".to_string()),
            "TMDB_API_KEY" => Some("tmdb".to_string()),
            _ => None,
        };

        let provider = config.backend_with("system", env).unwrap();
        assert_eq!(provider.to_string(), "gemini(gemini-1.5-flash)");
        assert_eq!(config.tmdb_with(env).unwrap().api_key, "tmdb");
    }

    #[test]
    fn file_key_wins_over_environment() {
        let config = Config::parse("[tmdb]\napi_key = \"from-file\"").unwrap();
        let env = |_: &str| Some("from-env".to_string());
        assert_eq!(config.tmdb_with(env).unwrap().api_key, "from-file");
    }

    #[test]
    fn missing_keys_are_errors() {
        let config = Config::default();
        assert!(matches!(
            config.backend_with("system", no_env),
            Err(ConfigError::MissingKey("GEMINI_API_KEY"))
        ));
        assert!(matches!(
            config.tmdb_with(no_env),
            Err(ConfigError::MissingKey("TMDB_API_KEY"))
        ));

        let blank = Config::parse("[tmdb]\napi_key = \"  \"").unwrap();
        assert!(blank.tmdb_with(no_env).is_err());
    }

    #[test]
    fn zero_timeouts_are_rejected() {
        for (section, key) in [
            ("orchestrator", "tool_timeout_secs"),
            ("orchestrator", "model_timeout_secs"),
            ("tmdb", "timeout_secs"),
        ] {
            let err = Config::parse(&format!("[{section}]\n{key} = 0")).unwrap_err();
            assert_eq!(
                err.to_string(),
                format!("invalid config: {section}.{key} must be greater than 0")
            );
        }

        assert!(Config::parse("[orchestrator]\ntool_timeout_secs = 1").is_ok());
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let err = Config::discover(Some(Path::new("/nonexistent/marquee.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
