use std::sync::Arc;

use concierge_agent::{build_executor, ConversationService};
use concierge_core::config::AppConfig;
use concierge_store::{InMemorySessionStore, SessionSweeper};
use tracing::{error, info};

pub struct Application {
    pub config: AppConfig,
    pub service: ConversationService,
    pub sweeper: SessionSweeper,
}

/// Builds the store, sweeper and conversation service. An executor that fails to
/// build leaves the service in degraded mode instead of aborting startup.
pub async fn bootstrap_with_config(config: AppConfig) -> Application {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );
    let store = Arc::new(InMemorySessionStore::new(config.sessions.clone()));
    let sweeper = SessionSweeper::spawn(store.clone(), config.sessions.sweep_interval());
    info!(
        event_name = "system.bootstrap.store_ready",
        correlation_id = "bootstrap",
        ttl_secs = config.sessions.ttl_secs,
        max_total = config.sessions.max_total,
        max_per_client = config.sessions.max_per_client,
        sweep_interval_secs = config.sessions.sweep_interval_secs,
        "session store and sweeper started"
    );

    let executor = match build_executor(&config) {
        Ok(executor) => Some(Arc::new(executor)),
        Err(build_error) => {
            error!(
                event_name = "system.bootstrap.executor_unavailable",
                correlation_id = "bootstrap",
                error = %build_error,
                "turn executor failed to build; chat will answer in degraded mode"
            );
            None
        }
    };

    Application { service: ConversationService::new(store, executor), sweeper, config }
}

#[cfg(test)]
mod tests {
    use concierge_core::config::{AppConfig, LlmProvider};

    use crate::bootstrap::bootstrap_with_config;

    #[tokio::test]
    async fn default_config_bootstraps_with_an_executor() {
        let app = bootstrap_with_config(AppConfig::default()).await;

        assert!(app.service.executor_available());
        assert_eq!(app.service.list_sessions().await.len(), 0);
        app.sweeper.shutdown().await;
    }

    #[tokio::test]
    async fn executor_failure_degrades_instead_of_aborting() {
        let mut config = AppConfig::default();
        config.llm.provider = LlmProvider::Anthropic;

        let app = bootstrap_with_config(config).await;

        assert!(!app.service.executor_available());
        app.sweeper.shutdown().await;
    }
}
