use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::booking::CustomerProfile;
use crate::flows::PipelineVariant;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub sessions: SessionConfig,
    pub workflow: WorkflowConfig,
    pub llm: LlmConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    pub ttl_secs: u64,
    pub max_total: usize,
    pub max_per_client: usize,
    pub max_messages: usize,
    pub sweep_interval_secs: u64,
    pub unknown_session: UnknownSessionPolicy,
}

impl SessionConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 3_600,
            max_total: 1_000,
            max_per_client: 20,
            max_messages: 100,
            sweep_interval_secs: 300,
            unknown_session: UnknownSessionPolicy::Create,
        }
    }
}

/// What appending to a session id the store has never seen (or already evicted) does.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownSessionPolicy {
    Create,
    Reject,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkflowConfig {
    pub variant: PipelineVariant,
    pub collaborator_timeout_secs: u64,
    pub max_candidate_slots: usize,
    pub customer: CustomerProfile,
}

impl WorkflowConfig {
    pub fn collaborator_timeout(&self) -> Duration {
        Duration::from_secs(self.collaborator_timeout_secs)
    }
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            variant: PipelineVariant::Simple,
            collaborator_timeout_secs: 10,
            max_candidate_slots: 3,
            customer: CustomerProfile {
                name: "User Name".to_string(),
                email: "user@example.com".to_string(),
                phone: "+33600000000".to_string(),
            },
        }
    }
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub api_key: Option<SecretString>,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
    pub temperature: f32,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    Heuristic,
    Anthropic,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub log_level: Option<String>,
    pub llm_provider: Option<LlmProvider>,
    pub llm_api_key: Option<String>,
    pub llm_base_url: Option<String>,
    pub workflow_variant: Option<PipelineVariant>,
    pub session_ttl_secs: Option<u64>,
    pub max_sessions_total: Option<usize>,
    pub max_sessions_per_client: Option<usize>,
    pub unknown_session: Option<UnknownSessionPolicy>,
    pub server_port: Option<u16>,
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
            sessions: SessionConfig::default(),
            workflow: WorkflowConfig::default(),
            llm: LlmConfig {
                provider: LlmProvider::Heuristic,
                api_key: None,
                base_url: "https://api.anthropic.com".to_string(),
                model: "claude-3-haiku-20240307".to_string(),
                timeout_secs: 15,
                temperature: 0.3,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8000,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "heuristic" => Ok(Self::Heuristic),
            "anthropic" => Ok(Self::Anthropic),
            other => Err(ConfigError::Validation(format!(
                "unsupported llm provider `{other}` (expected heuristic|anthropic)"
            ))),
        }
    }
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

impl std::str::FromStr for UnknownSessionPolicy {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "create" => Ok(Self::Create),
            "reject" => Ok(Self::Reject),
            other => Err(ConfigError::Validation(format!(
                "unsupported unknown-session policy `{other}` (expected create|reject)"
            ))),
        }
    }
}

impl std::str::FromStr for PipelineVariant {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "simple" => Ok(Self::Simple),
            "calendar_aware" | "calendar-aware" => Ok(Self::CalendarAware),
            other => Err(ConfigError::Validation(format!(
                "unsupported workflow variant `{other}` (expected simple|calendar_aware)"
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
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("concierge.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(sessions) = patch.sessions {
            if let Some(ttl_secs) = sessions.ttl_secs {
                self.sessions.ttl_secs = ttl_secs;
            }
            if let Some(max_total) = sessions.max_total {
                self.sessions.max_total = max_total;
            }
            if let Some(max_per_client) = sessions.max_per_client {
                self.sessions.max_per_client = max_per_client;
            }
            if let Some(max_messages) = sessions.max_messages {
                self.sessions.max_messages = max_messages;
            }
            if let Some(sweep_interval_secs) = sessions.sweep_interval_secs {
                self.sessions.sweep_interval_secs = sweep_interval_secs;
            }
            if let Some(unknown_session) = sessions.unknown_session {
                self.sessions.unknown_session = unknown_session;
            }
        }

        if let Some(workflow) = patch.workflow {
            if let Some(variant) = workflow.variant {
                self.workflow.variant = variant;
            }
            if let Some(timeout_secs) = workflow.collaborator_timeout_secs {
                self.workflow.collaborator_timeout_secs = timeout_secs;
            }
            if let Some(max_candidate_slots) = workflow.max_candidate_slots {
                self.workflow.max_candidate_slots = max_candidate_slots;
            }
            if let Some(name) = workflow.customer_name {
                self.workflow.customer.name = name;
            }
            if let Some(email) = workflow.customer_email {
                self.workflow.customer.email = email;
            }
            if let Some(phone) = workflow.customer_phone {
                self.workflow.customer.phone = phone;
            }
        }

        if let Some(llm) = patch.llm {
            if let Some(provider) = llm.provider {
                self.llm.provider = provider;
            }
            if let Some(llm_api_key_value) = llm.api_key {
                self.llm.api_key = Some(secret_value(llm_api_key_value));
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = base_url;
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
            if let Some(temperature) = llm.temperature {
                self.llm.temperature = temperature;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
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
        if let Some(value) = read_env("CONCIERGE_SESSIONS_TTL_SECS") {
            self.sessions.ttl_secs = parse_u64("CONCIERGE_SESSIONS_TTL_SECS", &value)?;
        }
        if let Some(value) = read_env("CONCIERGE_SESSIONS_MAX_TOTAL") {
            self.sessions.max_total = parse_usize("CONCIERGE_SESSIONS_MAX_TOTAL", &value)?;
        }
        if let Some(value) = read_env("CONCIERGE_SESSIONS_MAX_PER_CLIENT") {
            self.sessions.max_per_client =
                parse_usize("CONCIERGE_SESSIONS_MAX_PER_CLIENT", &value)?;
        }
        if let Some(value) = read_env("CONCIERGE_SESSIONS_MAX_MESSAGES") {
            self.sessions.max_messages = parse_usize("CONCIERGE_SESSIONS_MAX_MESSAGES", &value)?;
        }
        if let Some(value) = read_env("CONCIERGE_SESSIONS_SWEEP_INTERVAL_SECS") {
            self.sessions.sweep_interval_secs =
                parse_u64("CONCIERGE_SESSIONS_SWEEP_INTERVAL_SECS", &value)?;
        }
        if let Some(value) = read_env("CONCIERGE_SESSIONS_UNKNOWN_SESSION") {
            self.sessions.unknown_session = value.parse()?;
        }

        if let Some(value) = read_env("CONCIERGE_WORKFLOW_VARIANT") {
            self.workflow.variant = value.parse()?;
        }
        if let Some(value) = read_env("CONCIERGE_WORKFLOW_COLLABORATOR_TIMEOUT_SECS") {
            self.workflow.collaborator_timeout_secs =
                parse_u64("CONCIERGE_WORKFLOW_COLLABORATOR_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("CONCIERGE_WORKFLOW_MAX_CANDIDATE_SLOTS") {
            self.workflow.max_candidate_slots =
                parse_usize("CONCIERGE_WORKFLOW_MAX_CANDIDATE_SLOTS", &value)?;
        }
        if let Some(value) = read_env("CONCIERGE_WORKFLOW_CUSTOMER_NAME") {
            self.workflow.customer.name = value;
        }
        if let Some(value) = read_env("CONCIERGE_WORKFLOW_CUSTOMER_EMAIL") {
            self.workflow.customer.email = value;
        }
        if let Some(value) = read_env("CONCIERGE_WORKFLOW_CUSTOMER_PHONE") {
            self.workflow.customer.phone = value;
        }

        if let Some(value) = read_env("CONCIERGE_LLM_PROVIDER") {
            self.llm.provider = value.parse()?;
        }
        if let Some(value) = read_env("CONCIERGE_LLM_API_KEY") {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("CONCIERGE_LLM_BASE_URL") {
            self.llm.base_url = value;
        }
        if let Some(value) = read_env("CONCIERGE_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("CONCIERGE_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("CONCIERGE_LLM_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("CONCIERGE_LLM_TEMPERATURE") {
            self.llm.temperature = parse_f32("CONCIERGE_LLM_TEMPERATURE", &value)?;
        }

        if let Some(value) = read_env("CONCIERGE_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("CONCIERGE_SERVER_PORT") {
            self.server.port = parse_u16("CONCIERGE_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("CONCIERGE_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("CONCIERGE_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level =
            read_env("CONCIERGE_LOGGING_LEVEL").or_else(|| read_env("CONCIERGE_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("CONCIERGE_LOGGING_FORMAT").or_else(|| read_env("CONCIERGE_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(llm_provider) = overrides.llm_provider {
            self.llm.provider = llm_provider;
        }
        if let Some(llm_api_key) = overrides.llm_api_key {
            self.llm.api_key = Some(secret_value(llm_api_key));
        }
        if let Some(llm_base_url) = overrides.llm_base_url {
            self.llm.base_url = llm_base_url;
        }
        if let Some(variant) = overrides.workflow_variant {
            self.workflow.variant = variant;
        }
        if let Some(ttl_secs) = overrides.session_ttl_secs {
            self.sessions.ttl_secs = ttl_secs;
        }
        if let Some(max_total) = overrides.max_sessions_total {
            self.sessions.max_total = max_total;
        }
        if let Some(max_per_client) = overrides.max_sessions_per_client {
            self.sessions.max_per_client = max_per_client;
        }
        if let Some(unknown_session) = overrides.unknown_session {
            self.sessions.unknown_session = unknown_session;
        }
        if let Some(port) = overrides.server_port {
            self.server.port = port;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_sessions(&self.sessions)?;
        validate_workflow(&self.workflow)?;
        validate_llm(&self.llm)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("concierge.toml"), PathBuf::from("config/concierge.toml")]
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

fn validate_sessions(sessions: &SessionConfig) -> Result<(), ConfigError> {
    if sessions.ttl_secs == 0 {
        return Err(ConfigError::Validation(
            "sessions.ttl_secs must be greater than zero".to_string(),
        ));
    }
    if sessions.max_total == 0 {
        return Err(ConfigError::Validation(
            "sessions.max_total must be greater than zero".to_string(),
        ));
    }
    if sessions.max_per_client == 0 || sessions.max_per_client > sessions.max_total {
        return Err(ConfigError::Validation(
            "sessions.max_per_client must be in range 1..=sessions.max_total".to_string(),
        ));
    }
    if sessions.max_messages == 0 {
        return Err(ConfigError::Validation(
            "sessions.max_messages must be greater than zero".to_string(),
        ));
    }
    if sessions.sweep_interval_secs == 0 {
        return Err(ConfigError::Validation(
            "sessions.sweep_interval_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_workflow(workflow: &WorkflowConfig) -> Result<(), ConfigError> {
    if workflow.collaborator_timeout_secs == 0 || workflow.collaborator_timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "workflow.collaborator_timeout_secs must be in range 1..=300".to_string(),
        ));
    }
    if workflow.max_candidate_slots == 0 {
        return Err(ConfigError::Validation(
            "workflow.max_candidate_slots must be greater than zero".to_string(),
        ));
    }
    if !workflow.customer.email.contains('@') {
        return Err(ConfigError::Validation(
            "workflow.customer_email must be an email address".to_string(),
        ));
    }

    Ok(())
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }
    if !(0.0..=1.0).contains(&llm.temperature) {
        return Err(ConfigError::Validation(
            "llm.temperature must be in range 0.0..=1.0".to_string(),
        ));
    }

    if llm.provider == LlmProvider::Anthropic {
        let missing = llm
            .api_key
            .as_ref()
            .map(|value| value.expose_secret().trim().is_empty())
            .unwrap_or(true);
        if missing {
            return Err(ConfigError::Validation(
                "llm.api_key is required for the anthropic provider".to_string(),
            ));
        }
        if !llm.base_url.starts_with("http://") && !llm.base_url.starts_with("https://") {
            return Err(ConfigError::Validation(
                "llm.base_url must start with http:// or https://".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn invalid_override(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() }
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| invalid_override(key, value))
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| invalid_override(key, value))
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.parse::<usize>().map_err(|_| invalid_override(key, value))
}

fn parse_f32(key: &str, value: &str) -> Result<f32, ConfigError> {
    value.parse::<f32>().map_err(|_| invalid_override(key, value))
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    sessions: Option<SessionsPatch>,
    workflow: Option<WorkflowPatch>,
    llm: Option<LlmPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct SessionsPatch {
    ttl_secs: Option<u64>,
    max_total: Option<usize>,
    max_per_client: Option<usize>,
    max_messages: Option<usize>,
    sweep_interval_secs: Option<u64>,
    unknown_session: Option<UnknownSessionPolicy>,
}

#[derive(Debug, Default, Deserialize)]
struct WorkflowPatch {
    variant: Option<PipelineVariant>,
    collaborator_timeout_secs: Option<u64>,
    max_candidate_slots: Option<usize>,
    customer_name: Option<String>,
    customer_email: Option<String>,
    customer_phone: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    provider: Option<LlmProvider>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
    temperature: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{
        AppConfig, ConfigError, ConfigOverrides, LlmProvider, LoadOptions, LogFormat,
        UnknownSessionPolicy,
    };
    use crate::flows::PipelineVariant;

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn defaults_are_valid_without_any_configuration() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let config = AppConfig::load(LoadOptions::default())
            .map_err(|err| format!("config load failed: {err}"))?;

        ensure(config.llm.provider == LlmProvider::Heuristic, "default provider is heuristic")?;
        ensure(config.workflow.variant == PipelineVariant::Simple, "default variant is simple")?;
        ensure(config.workflow.max_candidate_slots == 3, "default candidate slots is three")?;
        ensure(
            config.sessions.unknown_session == UnknownSessionPolicy::Create,
            "unknown sessions are created by default",
        )
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_CONCIERGE_LLM_KEY", "sk-from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("concierge.toml");
            fs::write(
                &path,
                r#"
[llm]
provider = "anthropic"
api_key = "${TEST_CONCIERGE_LLM_KEY}"

[sessions]
max_total = 50
max_per_client = 5
unknown_session = "reject"

[workflow]
variant = "calendar_aware"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.llm.api_key.as_ref().map(|key| key.expose_secret() == "sk-from-env")
                    == Some(true),
                "api key should be loaded from environment",
            )?;
            ensure(config.sessions.max_total == 50, "max_total should come from the file")?;
            ensure(
                config.sessions.unknown_session == UnknownSessionPolicy::Reject,
                "unknown session policy should come from the file",
            )?;
            ensure(
                config.workflow.variant == PipelineVariant::CalendarAware,
                "workflow variant should come from the file",
            )?;
            Ok(())
        })();

        clear_vars(&["TEST_CONCIERGE_LLM_KEY"]);
        result
    }

    #[test]
    fn logging_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("CONCIERGE_LOG_LEVEL", "warn");
        env::set_var("CONCIERGE_LOG_FORMAT", "pretty");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.logging.level == "warn", "warning log level should be set from env var")?;
            ensure(
                matches!(config.logging.format, LogFormat::Pretty),
                "pretty logging format should be set from env var",
            )?;
            Ok(())
        })();

        clear_vars(&["CONCIERGE_LOG_LEVEL", "CONCIERGE_LOG_FORMAT"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("CONCIERGE_SESSIONS_TTL_SECS", "900");
        env::set_var("CONCIERGE_SERVER_PORT", "9100");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("concierge.toml");
            fs::write(
                &path,
                r#"
[sessions]
ttl_secs = 60
max_messages = 10

[server]
port = 9000

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    server_port: Some(9200),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.sessions.max_messages == 10, "file value should beat the default")?;
            ensure(config.sessions.ttl_secs == 900, "env value should beat the file")?;
            ensure(config.server.port == 9200, "override should beat env")?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            Ok(())
        })();

        clear_vars(&["CONCIERGE_SESSIONS_TTL_SECS", "CONCIERGE_SERVER_PORT"]);
        result
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("CONCIERGE_LLM_PROVIDER", "anthropic");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("llm.api_key")
            );
            ensure(has_message, "validation failure should mention llm.api_key")
        })();

        clear_vars(&["CONCIERGE_LLM_PROVIDER"]);
        result
    }

    #[test]
    fn per_client_cap_cannot_exceed_total_cap() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let error = AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                max_sessions_total: Some(5),
                max_sessions_per_client: Some(6),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .err()
        .ok_or_else(|| "expected validation failure".to_string())?;

        ensure(
            matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("max_per_client")
            ),
            "validation failure should mention max_per_client",
        )
    }

    #[test]
    fn invalid_numeric_env_override_is_reported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("CONCIERGE_SESSIONS_MAX_TOTAL", "lots");

        let result = match AppConfig::load(LoadOptions::default()) {
            Err(ConfigError::InvalidEnvOverride { key, .. }) => ensure(
                key == "CONCIERGE_SESSIONS_MAX_TOTAL",
                "error should name the offending variable",
            ),
            _ => Err("expected invalid env override error".to_string()),
        };

        clear_vars(&["CONCIERGE_SESSIONS_MAX_TOTAL"]);
        result
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("CONCIERGE_LLM_PROVIDER", "anthropic");
        env::set_var("CONCIERGE_LLM_API_KEY", "sk-ant-secret-value");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(!debug.contains("sk-ant-secret-value"), "debug output should not contain key")?;
            ensure(
                matches!(config.logging.format, LogFormat::Compact),
                "default logging format should be compact",
            )?;
            Ok(())
        })();

        clear_vars(&["CONCIERGE_LLM_PROVIDER", "CONCIERGE_LLM_API_KEY"]);
        result
    }
}
