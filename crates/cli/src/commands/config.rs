use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use concierge_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

struct Field {
    key: &'static str,
    value: String,
    env_keys: &'static [&'static str],
}

impl Field {
    fn new(key: &'static str, value: impl ToString, env_keys: &'static [&'static str]) -> Self {
        Self { key, value: value.to_string(), env_keys }
    }
}

pub fn run() -> String {
    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => render(&config),
        Err(error) => format!("config validation failed: {error}"),
    }
}

/// Effective values with the layer each one came from. Secrets are redacted.
pub fn render(config: &AppConfig) -> String {
    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines =
        vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in fields(config) {
        let source = field_source(
            field.key,
            field.env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(format!("- {} = {} (source: {source})", field.key, field.value));
    }
    lines.join("\n")
}

fn fields(config: &AppConfig) -> Vec<Field> {
    let sessions = &config.sessions;
    let workflow = &config.workflow;
    let llm = &config.llm;
    let api_key = llm
        .api_key
        .as_ref()
        .map(|key| redact_token(key.expose_secret()))
        .unwrap_or_else(|| "<unset>".to_string());

    vec![
        Field::new("sessions.ttl_secs", sessions.ttl_secs, &["CONCIERGE_SESSIONS_TTL_SECS"]),
        Field::new("sessions.max_total", sessions.max_total, &["CONCIERGE_SESSIONS_MAX_TOTAL"]),
        Field::new(
            "sessions.max_per_client",
            sessions.max_per_client,
            &["CONCIERGE_SESSIONS_MAX_PER_CLIENT"],
        ),
        Field::new(
            "sessions.max_messages",
            sessions.max_messages,
            &["CONCIERGE_SESSIONS_MAX_MESSAGES"],
        ),
        Field::new(
            "sessions.sweep_interval_secs",
            sessions.sweep_interval_secs,
            &["CONCIERGE_SESSIONS_SWEEP_INTERVAL_SECS"],
        ),
        Field::new(
            "sessions.unknown_session",
            format!("{:?}", sessions.unknown_session),
            &["CONCIERGE_SESSIONS_UNKNOWN_SESSION"],
        ),
        Field::new(
            "workflow.variant",
            format!("{:?}", workflow.variant),
            &["CONCIERGE_WORKFLOW_VARIANT"],
        ),
        Field::new(
            "workflow.collaborator_timeout_secs",
            workflow.collaborator_timeout_secs,
            &["CONCIERGE_WORKFLOW_COLLABORATOR_TIMEOUT_SECS"],
        ),
        Field::new(
            "workflow.max_candidate_slots",
            workflow.max_candidate_slots,
            &["CONCIERGE_WORKFLOW_MAX_CANDIDATE_SLOTS"],
        ),
        Field::new(
            "workflow.customer_name",
            &workflow.customer.name,
            &["CONCIERGE_WORKFLOW_CUSTOMER_NAME"],
        ),
        Field::new(
            "workflow.customer_email",
            &workflow.customer.email,
            &["CONCIERGE_WORKFLOW_CUSTOMER_EMAIL"],
        ),
        Field::new("llm.provider", format!("{:?}", llm.provider), &["CONCIERGE_LLM_PROVIDER"]),
        Field::new("llm.api_key", api_key, &["CONCIERGE_LLM_API_KEY"]),
        Field::new("llm.base_url", &llm.base_url, &["CONCIERGE_LLM_BASE_URL"]),
        Field::new("llm.model", &llm.model, &["CONCIERGE_LLM_MODEL"]),
        Field::new("llm.timeout_secs", llm.timeout_secs, &["CONCIERGE_LLM_TIMEOUT_SECS"]),
        Field::new("llm.temperature", llm.temperature, &["CONCIERGE_LLM_TEMPERATURE"]),
        Field::new(
            "server.bind_address",
            &config.server.bind_address,
            &["CONCIERGE_SERVER_BIND_ADDRESS"],
        ),
        Field::new("server.port", config.server.port, &["CONCIERGE_SERVER_PORT"]),
        Field::new(
            "server.graceful_shutdown_secs",
            config.server.graceful_shutdown_secs,
            &["CONCIERGE_SERVER_GRACEFUL_SHUTDOWN_SECS"],
        ),
        Field::new(
            "logging.level",
            &config.logging.level,
            &["CONCIERGE_LOGGING_LEVEL", "CONCIERGE_LOG_LEVEL"],
        ),
        Field::new(
            "logging.format",
            format!("{:?}", config.logging.format),
            &["CONCIERGE_LOGGING_FORMAT", "CONCIERGE_LOG_FORMAT"],
        ),
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    ["concierge.toml", "config/concierge.toml"].into_iter().map(PathBuf::from).find(|p| p.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(**key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('-') {
        return format!("{prefix}-***");
    }

    "<redacted>".to_string()
}
