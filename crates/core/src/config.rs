use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub provider: ProviderConfig,
    pub session: SessionConfig,
    pub server: ServerConfig,
    pub limits: LimitsConfig,
    pub cache: CacheConfig,
    pub logging: LoggingConfig,
}

/// Upstream LLM provider (auth endpoint + chat completions).
#[derive(Clone, Debug)]
pub struct ProviderConfig {
    pub auth_url: String,
    pub api_base: String,
    pub scope: String,
    pub model: String,
    pub auth_key: SecretString,
    pub request_timeout_secs: u64,
    /// How long an acquired bearer token is trusted. Kept shorter than the
    /// provider's ~30 minute lifetime to avoid edge-of-expiry failures.
    pub token_cache_secs: u64,
}

#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub jwt_secret: SecretString,
    pub access_ttl_secs: u64,
    pub refresh_ttl_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
}

#[derive(Clone, Debug)]
pub struct LimitsConfig {
    pub board_per_minute: u32,
    pub agent_per_minute: u32,
    pub summary_per_minute: u32,
    pub board_concurrency: usize,
}

#[derive(Clone, Debug)]
pub struct CacheConfig {
    pub max_items: usize,
    pub trim_to: usize,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub provider_auth_key: Option<String>,
    pub provider_auth_url: Option<String>,
    pub provider_api_base: Option<String>,
    pub provider_model: Option<String>,
    pub jwt_secret: Option<String>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            provider: ProviderConfig {
                auth_url: "https://ngw.devices.sberbank.ru:9443/api/v2/oauth".to_string(),
                api_base: "https://gigachat.devices.sberbank.ru".to_string(),
                scope: "GIGACHAT_API_PERS".to_string(),
                model: "GigaChat-2".to_string(),
                auth_key: String::new().into(),
                request_timeout_secs: 60,
                token_cache_secs: 25 * 60,
            },
            session: SessionConfig {
                jwt_secret: String::new().into(),
                access_ttl_secs: 900,
                refresh_ttl_secs: 30 * 24 * 60 * 60,
            },
            server: ServerConfig { bind_address: "0.0.0.0".to_string(), port: 8000 },
            limits: LimitsConfig {
                board_per_minute: 10,
                agent_per_minute: 20,
                summary_per_minute: 10,
                board_concurrency: 3,
            },
            cache: CacheConfig { max_items: 1000, trim_to: 500 },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("boardroom.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(provider) = patch.provider {
            if let Some(auth_url) = provider.auth_url {
                self.provider.auth_url = auth_url;
            }
            if let Some(api_base) = provider.api_base {
                self.provider.api_base = api_base;
            }
            if let Some(scope) = provider.scope {
                self.provider.scope = scope;
            }
            if let Some(model) = provider.model {
                self.provider.model = model;
            }
            if let Some(auth_key) = provider.auth_key {
                self.provider.auth_key = secret_value(auth_key);
            }
            if let Some(request_timeout_secs) = provider.request_timeout_secs {
                self.provider.request_timeout_secs = request_timeout_secs;
            }
            if let Some(token_cache_secs) = provider.token_cache_secs {
                self.provider.token_cache_secs = token_cache_secs;
            }
        }

        if let Some(session) = patch.session {
            if let Some(jwt_secret) = session.jwt_secret {
                self.session.jwt_secret = secret_value(jwt_secret);
            }
            if let Some(access_ttl_secs) = session.access_ttl_secs {
                self.session.access_ttl_secs = access_ttl_secs;
            }
            if let Some(refresh_ttl_secs) = session.refresh_ttl_secs {
                self.session.refresh_ttl_secs = refresh_ttl_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
        }

        if let Some(limits) = patch.limits {
            if let Some(board_per_minute) = limits.board_per_minute {
                self.limits.board_per_minute = board_per_minute;
            }
            if let Some(agent_per_minute) = limits.agent_per_minute {
                self.limits.agent_per_minute = agent_per_minute;
            }
            if let Some(summary_per_minute) = limits.summary_per_minute {
                self.limits.summary_per_minute = summary_per_minute;
            }
            if let Some(board_concurrency) = limits.board_concurrency {
                self.limits.board_concurrency = board_concurrency;
            }
        }

        if let Some(cache) = patch.cache {
            if let Some(max_items) = cache.max_items {
                self.cache.max_items = max_items;
            }
            if let Some(trim_to) = cache.trim_to {
                self.cache.trim_to = trim_to;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("BOARDROOM_PROVIDER_AUTH_KEY") {
            self.provider.auth_key = secret_value(value);
        }
        if let Some(value) = read_env("BOARDROOM_PROVIDER_AUTH_URL") {
            self.provider.auth_url = value;
        }
        if let Some(value) = read_env("BOARDROOM_PROVIDER_API_BASE") {
            self.provider.api_base = value;
        }
        if let Some(value) = read_env("BOARDROOM_PROVIDER_SCOPE") {
            self.provider.scope = value;
        }
        if let Some(value) = read_env("BOARDROOM_PROVIDER_MODEL") {
            self.provider.model = value;
        }
        if let Some(value) = read_env("BOARDROOM_PROVIDER_TIMEOUT_SECS") {
            self.provider.request_timeout_secs =
                parse_u64("BOARDROOM_PROVIDER_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("BOARDROOM_PROVIDER_TOKEN_CACHE_SECS") {
            self.provider.token_cache_secs =
                parse_u64("BOARDROOM_PROVIDER_TOKEN_CACHE_SECS", &value)?;
        }

        if let Some(value) = read_env("BOARDROOM_JWT_SECRET") {
            self.session.jwt_secret = secret_value(value);
        }
        if let Some(value) = read_env("BOARDROOM_ACCESS_TTL_SECS") {
            self.session.access_ttl_secs = parse_u64("BOARDROOM_ACCESS_TTL_SECS", &value)?;
        }
        if let Some(value) = read_env("BOARDROOM_REFRESH_TTL_SECS") {
            self.session.refresh_ttl_secs = parse_u64("BOARDROOM_REFRESH_TTL_SECS", &value)?;
        }

        if let Some(value) = read_env("BOARDROOM_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("BOARDROOM_SERVER_PORT") {
            self.server.port = parse_u16("BOARDROOM_SERVER_PORT", &value)?;
        }

        let log_level =
            read_env("BOARDROOM_LOGGING_LEVEL").or_else(|| read_env("BOARDROOM_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("BOARDROOM_LOGGING_FORMAT").or_else(|| read_env("BOARDROOM_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(provider_auth_key) = overrides.provider_auth_key {
            self.provider.auth_key = secret_value(provider_auth_key);
        }
        if let Some(provider_auth_url) = overrides.provider_auth_url {
            self.provider.auth_url = provider_auth_url;
        }
        if let Some(provider_api_base) = overrides.provider_api_base {
            self.provider.api_base = provider_api_base;
        }
        if let Some(provider_model) = overrides.provider_model {
            self.provider.model = provider_model;
        }
        if let Some(jwt_secret) = overrides.jwt_secret {
            self.session.jwt_secret = secret_value(jwt_secret);
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_provider(&self.provider)?;
        validate_session(&self.session)?;
        validate_limits(&self.limits)?;
        validate_cache(&self.cache)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("boardroom.toml"), PathBuf::from("config/boardroom.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_provider(provider: &ProviderConfig) -> Result<(), ConfigError> {
    if provider.auth_key.expose_secret().is_empty() {
        return Err(ConfigError::Validation(
            "provider.auth_key is required. Set BOARDROOM_PROVIDER_AUTH_KEY before starting"
                .to_string(),
        ));
    }
    if !provider.auth_url.starts_with("http") {
        return Err(ConfigError::Validation("provider.auth_url must be an http(s) URL".to_string()));
    }
    if !provider.api_base.starts_with("http") {
        return Err(ConfigError::Validation("provider.api_base must be an http(s) URL".to_string()));
    }
    if provider.request_timeout_secs == 0 || provider.request_timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "provider.request_timeout_secs must be in range 1..=300".to_string(),
        ));
    }
    if provider.token_cache_secs == 0 {
        return Err(ConfigError::Validation(
            "provider.token_cache_secs must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

fn validate_session(session: &SessionConfig) -> Result<(), ConfigError> {
    if session.jwt_secret.expose_secret().len() < 32 {
        return Err(ConfigError::Validation(
            "session.jwt_secret must be at least 32 bytes. Set BOARDROOM_JWT_SECRET \
             (generate one with `openssl rand -base64 32`)"
                .to_string(),
        ));
    }
    if session.access_ttl_secs == 0 {
        return Err(ConfigError::Validation(
            "session.access_ttl_secs must be greater than zero".to_string(),
        ));
    }
    if session.refresh_ttl_secs <= session.access_ttl_secs {
        return Err(ConfigError::Validation(
            "session.refresh_ttl_secs must exceed session.access_ttl_secs".to_string(),
        ));
    }
    Ok(())
}

fn validate_limits(limits: &LimitsConfig) -> Result<(), ConfigError> {
    if limits.board_per_minute == 0 || limits.agent_per_minute == 0 || limits.summary_per_minute == 0
    {
        return Err(ConfigError::Validation(
            "limits.*_per_minute values must be greater than zero".to_string(),
        ));
    }
    if limits.board_concurrency == 0 {
        return Err(ConfigError::Validation(
            "limits.board_concurrency must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

fn validate_cache(cache: &CacheConfig) -> Result<(), ConfigError> {
    if cache.max_items == 0 {
        return Err(ConfigError::Validation(
            "cache.max_items must be greater than zero".to_string(),
        ));
    }
    if cache.trim_to >= cache.max_items {
        return Err(ConfigError::Validation(
            "cache.trim_to must be smaller than cache.max_items".to_string(),
        ));
    }
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        other => Err(ConfigError::Validation(format!(
            "unsupported logging.level `{other}` (expected trace|debug|info|warn|error)"
        ))),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value
        .parse::<u64>()
        .map_err(|_| ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() })
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value
        .parse::<u16>()
        .map_err(|_| ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    provider: Option<ProviderPatch>,
    session: Option<SessionPatch>,
    server: Option<ServerPatch>,
    limits: Option<LimitsPatch>,
    cache: Option<CachePatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct ProviderPatch {
    auth_url: Option<String>,
    api_base: Option<String>,
    scope: Option<String>,
    model: Option<String>,
    auth_key: Option<String>,
    request_timeout_secs: Option<u64>,
    token_cache_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct SessionPatch {
    jwt_secret: Option<String>,
    access_ttl_secs: Option<u64>,
    refresh_ttl_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
struct LimitsPatch {
    board_per_minute: Option<u32>,
    agent_per_minute: Option<u32>,
    summary_per_minute: Option<u32>,
    board_concurrency: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct CachePatch {
    max_items: Option<usize>,
    trim_to: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
