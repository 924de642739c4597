use std::sync::Arc;

use boardroom_agent::{Board, Compressor, LlmClient};
use boardroom_auth::SessionTokens;
use boardroom_core::config::{AppConfig, ConfigError, LoadOptions};
use thiserror::Error;
use tracing::info;

use crate::limiter::ApiLimiter;
use crate::routes::therapy::TherapyStore;

/// Shared state handed to every route handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub sessions: SessionTokens,
    pub board: Arc<Board>,
    pub limiter: Arc<ApiLimiter>,
    pub therapy: Arc<TherapyStore>,
}

pub struct Application {
    pub config: Arc<AppConfig>,
    pub state: AppState,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    Ok(bootstrap_with_config(config))
}

pub fn bootstrap_with_config(config: AppConfig) -> Application {
    info!(
        event_name = "system.bootstrap.start",
        model = %config.provider.model,
        "starting application bootstrap"
    );

    let sessions = SessionTokens::new(&config.session);
    let backend = Arc::new(LlmClient::new(config.provider.clone()));
    let compressor = Arc::new(Compressor::new(backend.clone(), &config.cache));
    let board = Arc::new(Board::new(backend, compressor, config.limits.board_concurrency));
    let limiter = Arc::new(ApiLimiter::new(&config.limits));

    let config = Arc::new(config);
    let state = AppState {
        config: Arc::clone(&config),
        sessions,
        board,
        limiter,
        therapy: Arc::new(TherapyStore::default()),
    };

    info!(event_name = "system.bootstrap.ready", "application bootstrap complete");
    Application { config, state }
}

#[cfg(test)]
mod tests {
    use boardroom_core::config::{ConfigOverrides, LoadOptions};

    use super::bootstrap;

    #[test]
    fn bootstrap_fails_fast_without_provider_credentials() {
        let result = bootstrap(LoadOptions {
            config_path: Some("/nonexistent/boardroom.toml".into()),
            overrides: ConfigOverrides {
                jwt_secret: Some("0123456789abcdef0123456789abcdef".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        });

        let message = result.err().expect("error").to_string();
        assert!(message.contains("provider.auth_key"));
    }

    #[test]
    fn bootstrap_succeeds_with_required_overrides() {
        let app = bootstrap(LoadOptions {
            config_path: Some("/nonexistent/boardroom.toml".into()),
            overrides: ConfigOverrides {
                provider_auth_key: Some("basic-credential".to_string()),
                jwt_secret: Some("0123456789abcdef0123456789abcdef".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .expect("bootstrap should succeed with valid overrides");

        assert_eq!(app.config.server.port, 8000);
        assert_eq!(app.state.sessions.access_ttl_secs(), 900);
    }
}
