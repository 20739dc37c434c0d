use std::sync::Arc;

use anyhow::{Context, Result};
use concierge_agent::service::TurnRequest;
use concierge_agent::{build_executor, ConversationService};
use concierge_core::config::{AppConfig, LoadOptions};
use concierge_core::domain::intent::ActionTag;
use concierge_core::domain::session::SessionId;
use concierge_store::InMemorySessionStore;
use serde::Serialize;

use crate::commands::CommandResult;

const CONFIG_FAILURE_EXIT_CODE: u8 = 2;
const RUNTIME_FAILURE_EXIT_CODE: u8 = 4;

#[derive(Debug, Serialize)]
struct TurnLine {
    turn: usize,
    session_id: String,
    response: String,
    actions_taken: Vec<ActionTag>,
}

/// Runs every message as a turn of one in-process session and prints one JSON line
/// per turn.
pub fn run(user_id: &str, messages: &[String]) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "chat",
                "config_validation",
                error.to_string(),
                CONFIG_FAILURE_EXIT_CODE,
            );
        }
    };

    match converse(&config, user_id, messages) {
        Ok(lines) => CommandResult { exit_code: 0, output: lines.join("\n") },
        Err(error) => CommandResult::failure(
            "chat",
            "runtime",
            format!("{error:#}"),
            RUNTIME_FAILURE_EXIT_CODE,
        ),
    }
}

pub fn converse(config: &AppConfig, user_id: &str, messages: &[String]) -> Result<Vec<String>> {
    // Executor build failures degrade exactly as the server does.
    let executor = build_executor(config).ok().map(Arc::new);
    let store = Arc::new(InMemorySessionStore::new(config.sessions.clone()));
    let service = ConversationService::new(store, executor);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to initialize async runtime")?;

    runtime.block_on(async {
        let mut session_id: Option<SessionId> = None;
        let mut lines = Vec::with_capacity(messages.len());
        for (index, message) in messages.iter().enumerate() {
            let response = service
                .handle_turn(TurnRequest {
                    message: message.clone(),
                    user_id: user_id.to_string(),
                    session_id: session_id.clone(),
                    client_identity: Some(user_id.to_string()),
                    ..TurnRequest::default()
                })
                .await;
            session_id = Some(response.session_id.clone());

            let line = TurnLine {
                turn: index + 1,
                session_id: response.session_id.0,
                response: response.reply,
                actions_taken: response.actions_taken,
            };
            lines.push(serde_json::to_string(&line).context("failed to encode turn output")?);
        }
        Ok(lines)
    })
}
