use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use concierge_core::config::{AppConfig, LlmProvider};

use crate::conversation::KeywordIntentExtractor;
use crate::fixtures::FixtureCatalog;
use crate::llm::{AnthropicClient, LlmIntentExtractor};
use crate::runtime::{ExecutorSettings, TurnExecutor};
use crate::tools::{Collaborators, IntentExtractor};

#[derive(Debug, Error)]
pub enum AssemblyError {
    #[error("intent extractor `{provider}` could not be built: {source:#}")]
    Extractor {
        provider: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

/// Wires the configured extractor and the fixture catalog into a turn executor.
pub fn build_executor(config: &AppConfig) -> Result<TurnExecutor, AssemblyError> {
    let extractor = build_extractor(config)?;
    let extractor_name = extractor.name();
    let catalog = Arc::new(FixtureCatalog::new());
    let executor = TurnExecutor::new(
        Collaborators::from_backend(extractor, catalog),
        ExecutorSettings::from(&config.workflow),
    );

    info!(
        event_name = "system.executor.ready",
        extractor = extractor_name,
        variant = ?config.workflow.variant,
        "turn executor assembled"
    );
    Ok(executor)
}

fn build_extractor(config: &AppConfig) -> Result<Arc<dyn IntentExtractor>, AssemblyError> {
    match config.llm.provider {
        LlmProvider::Heuristic => Ok(Arc::new(KeywordIntentExtractor::new())),
        LlmProvider::Anthropic => {
            let client = AnthropicClient::from_config(&config.llm)
                .map_err(|source| AssemblyError::Extractor { provider: "anthropic", source })?;
            Ok(Arc::new(LlmIntentExtractor::new(client)))
        }
    }
}

#[cfg(test)]
mod tests {
    use secrecy::SecretString;

    use concierge_core::config::{AppConfig, LlmProvider};

    use super::{build_executor, AssemblyError};

    #[test]
    fn heuristic_provider_uses_keyword_extractor() {
        let executor = build_executor(&AppConfig::default()).expect("default config assembles");
        assert_eq!(executor.extractor_name(), "keyword");
    }

    #[test]
    fn anthropic_provider_uses_llm_extractor() {
        let mut config = AppConfig::default();
        config.llm.provider = LlmProvider::Anthropic;
        config.llm.api_key = Some(SecretString::from("sk-test".to_string()));

        let executor = build_executor(&config).expect("anthropic config assembles");
        assert_eq!(executor.extractor_name(), "llm");
    }

    #[test]
    fn anthropic_provider_without_key_fails() {
        let mut config = AppConfig::default();
        config.llm.provider = LlmProvider::Anthropic;

        let error = build_executor(&config).err().expect("missing key is rejected");
        assert!(matches!(error, AssemblyError::Extractor { provider: "anthropic", .. }));
        assert!(error.to_string().contains("llm.api_key"));
    }
}
