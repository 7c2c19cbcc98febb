use std::sync::Arc;

use crate::core::config::AppConfig;
use crate::core::shared::utils::DbPool;
use crate::llm::{LLMProvider, OpenAIClient};
use crate::security::jwt::JwtManager;

/// Shared state handed to every handler.
pub struct AppState {
    pub config: AppConfig,
    pub conn: DbPool,
    pub jwt_manager: Arc<JwtManager>,
    /// `None` when no generative API is configured.
    pub llm_provider: Option<Arc<dyn LLMProvider>>,
}

impl AppState {
    pub fn new(config: AppConfig, conn: DbPool) -> Self {
        let jwt_manager = Arc::new(JwtManager::new(&config.auth));
        let llm_provider = if config.llm.is_configured() {
            match OpenAIClient::from_config(&config.llm) {
                Ok(client) => Some(Arc::new(client) as Arc<dyn LLMProvider>),
                Err(e) => {
                    log::warn!("LLM provider disabled: {}", e);
                    None
                }
            }
        } else {
            None
        };

        Self {
            config,
            conn,
            jwt_manager,
            llm_provider,
        }
    }

    pub fn with_llm_provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.llm_provider = Some(provider);
        self
    }
}

impl Clone for AppState {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            conn: self.conn.clone(),
            jwt_manager: Arc::clone(&self.jwt_manager),
            llm_provider: self.llm_provider.clone(),
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("server", &self.config.server)
            .field("llm_enabled", &self.llm_provider.is_some())
            .finish()
    }
}
