use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;
use voxray_core::llm_client::CompletionSettings;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// How replies to overlapping prompts on one connection are ordered.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TurnOrdering {
    /// Every prompt is answered as soon as its completion returns. A fast
    /// second reply can overtake a slow first one.
    #[default]
    Concurrent,
    /// Prompts are answered one at a time in arrival order.
    Serialized,
}

impl FromStr for TurnOrdering {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "concurrent" => Ok(Self::Concurrent),
            "serialized" => Ok(Self::Serialized),
            other => Err(format!(
                "'{}' is not one of 'concurrent', 'serialized'",
                other
            )),
        }
    }
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub openai_api_key: String,
    pub openai_api_base: String,
    pub completion: CompletionSettings,
    pub completion_timeout: Option<Duration>,
    pub action_url: String,
    pub stream_url: String,
    pub welcome_greeting: String,
    pub turn_ordering: TurnOrdering,
    pub log_level: Level,
    pub prompts_path: PathBuf,
}

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_ACTION_URL: &str = "https://app.alodev.org/action-webhook";
pub const DEFAULT_STREAM_URL: &str = "wss://voxray.alodev.org/websocket";
pub const DEFAULT_WELCOME_GREETING: &str = "Hi! Ask me anything!";
pub const DEFAULT_OPENAI_API_BASE: &str = "https://api.openai.com/v1";

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let openai_api_key = std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingVar("OPENAI_API_KEY".to_string()))?;

        let bind_address = match std::env::var("BIND_ADDRESS") {
            Ok(addr) => addr
                .parse::<SocketAddr>()
                .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?,
            Err(_) => {
                let port: u16 = parse_var("PORT", DEFAULT_PORT)?;
                SocketAddr::from(([0, 0, 0, 0], port))
            }
        };

        let openai_api_base = std::env::var("OPENAI_API_BASE")
            .unwrap_or_else(|_| DEFAULT_OPENAI_API_BASE.to_string());

        let defaults = CompletionSettings::default();
        let completion = CompletionSettings {
            model: std::env::var("CHAT_MODEL").unwrap_or(defaults.model),
            max_tokens: parse_var("COMPLETION_MAX_TOKENS", defaults.max_tokens)?,
            temperature: parse_var("COMPLETION_TEMPERATURE", defaults.temperature)?,
        };

        let completion_timeout = match std::env::var("COMPLETION_TIMEOUT_SECS") {
            Ok(raw) => Some(Duration::from_secs(raw.parse::<u64>().map_err(|e| {
                ConfigError::InvalidValue("COMPLETION_TIMEOUT_SECS".to_string(), e.to_string())
            })?)),
            Err(_) => None,
        };

        let action_url =
            std::env::var("ACTION_URL").unwrap_or_else(|_| DEFAULT_ACTION_URL.to_string());
        let stream_url = normalize_stream_url(
            &std::env::var("VOXRAY_URL").unwrap_or_else(|_| DEFAULT_STREAM_URL.to_string()),
        );
        let welcome_greeting = std::env::var("WELCOME_GREETING")
            .unwrap_or_else(|_| DEFAULT_WELCOME_GREETING.to_string());

        let turn_ordering = parse_var("TURN_ORDERING", TurnOrdering::default())?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let prompts_path = std::env::var("PROMPTS_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./prompts"));

        Ok(Self {
            bind_address,
            openai_api_key,
            openai_api_base,
            completion,
            completion_timeout,
            action_url,
            stream_url,
            welcome_greeting,
            turn_ordering,
            log_level,
            prompts_path,
        })
    }
}

/// Reads `name` and parses it, falling back to `default` when unset.
fn parse_var<T>(name: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}

/// The platform needs a full WebSocket URL; a bare host/path gets `wss://`.
fn normalize_stream_url(raw: &str) -> String {
    if raw.contains("://") {
        raw.to_string()
    } else {
        format!("wss://{}", raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;
    use tracing::Level;

    fn clear_env_vars() {
        unsafe {
            for var in [
                "BIND_ADDRESS",
                "PORT",
                "OPENAI_API_KEY",
                "OPENAI_API_BASE",
                "CHAT_MODEL",
                "COMPLETION_MAX_TOKENS",
                "COMPLETION_TEMPERATURE",
                "COMPLETION_TIMEOUT_SECS",
                "ACTION_URL",
                "VOXRAY_URL",
                "WELCOME_GREETING",
                "TURN_ORDERING",
                "RUST_LOG",
                "PROMPTS_PATH",
            ] {
                env::remove_var(var);
            }
        }
    }

    fn set_minimal_env() {
        unsafe {
            env::set_var("OPENAI_API_KEY", "test-openai-key");
        }
    }

    #[test]
    fn test_config_error_display() {
        let missing_var = ConfigError::MissingVar("TEST_VAR".to_string());
        assert_eq!(
            format!("{}", missing_var),
            "Missing environment variable: TEST_VAR"
        );

        let invalid_value =
            ConfigError::InvalidValue("TEST_VAR".to_string(), "bad_value".to_string());
        assert_eq!(
            format!("{}", invalid_value),
            "Invalid value for environment variable TEST_VAR: bad_value"
        );
    }

    #[test]
    fn test_turn_ordering_parsing() {
        assert_eq!("concurrent".parse::<TurnOrdering>(), Ok(TurnOrdering::Concurrent));
        assert_eq!("Serialized".parse::<TurnOrdering>(), Ok(TurnOrdering::Serialized));
        assert!("fifo".parse::<TurnOrdering>().is_err());
        assert_eq!(TurnOrdering::default(), TurnOrdering::Concurrent);
    }

    #[test]
    fn test_normalize_stream_url() {
        assert_eq!(
            normalize_stream_url("voxray.example.com/websocket"),
            "wss://voxray.example.com/websocket"
        );
        assert_eq!(
            normalize_stream_url("wss://voxray.example.com/websocket"),
            "wss://voxray.example.com/websocket"
        );
        assert_eq!(
            normalize_stream_url("ws://localhost:8080/websocket"),
            "ws://localhost:8080/websocket"
        );
    }

    #[test]
    #[serial]
    fn test_config_from_env_minimal() {
        clear_env_vars();
        set_minimal_env();

        let config = Config::from_env().expect("Config should load successfully");

        assert_eq!(config.bind_address.to_string(), "0.0.0.0:8080");
        assert_eq!(config.openai_api_key, "test-openai-key");
        assert_eq!(config.openai_api_base, DEFAULT_OPENAI_API_BASE);
        assert_eq!(config.completion, CompletionSettings::default());
        assert_eq!(config.completion_timeout, None);
        assert_eq!(config.action_url, DEFAULT_ACTION_URL);
        assert_eq!(config.stream_url, DEFAULT_STREAM_URL);
        assert_eq!(config.welcome_greeting, DEFAULT_WELCOME_GREETING);
        assert_eq!(config.turn_ordering, TurnOrdering::Concurrent);
        assert_eq!(config.log_level, Level::INFO);
        assert_eq!(config.prompts_path, PathBuf::from("./prompts"));
    }

    #[test]
    #[serial]
    fn test_config_from_env_custom_values() {
        clear_env_vars();
        unsafe {
            env::set_var("OPENAI_API_KEY", "custom-openai-key");
            env::set_var("PORT", "9090");
            env::set_var("OPENAI_API_BASE", "http://localhost:4000/v1");
            env::set_var("CHAT_MODEL", "gpt-4o-mini");
            env::set_var("COMPLETION_MAX_TOKENS", "64");
            env::set_var("COMPLETION_TEMPERATURE", "0.2");
            env::set_var("COMPLETION_TIMEOUT_SECS", "7");
            env::set_var("ACTION_URL", "https://example.com/action");
            env::set_var("VOXRAY_URL", "relay.example.com/websocket");
            env::set_var("WELCOME_GREETING", "Hello from the test suite");
            env::set_var("TURN_ORDERING", "serialized");
            env::set_var("RUST_LOG", "debug");
            env::set_var("PROMPTS_PATH", "/custom/prompts");
        }

        let config = Config::from_env().expect("Config should load successfully");

        assert_eq!(config.bind_address.to_string(), "0.0.0.0:9090");
        assert_eq!(config.openai_api_base, "http://localhost:4000/v1");
        assert_eq!(config.completion.model, "gpt-4o-mini");
        assert_eq!(config.completion.max_tokens, 64);
        assert!((config.completion.temperature - 0.2).abs() < f32::EPSILON);
        assert_eq!(config.completion_timeout, Some(Duration::from_secs(7)));
        assert_eq!(config.action_url, "https://example.com/action");
        assert_eq!(config.stream_url, "wss://relay.example.com/websocket");
        assert_eq!(config.welcome_greeting, "Hello from the test suite");
        assert_eq!(config.turn_ordering, TurnOrdering::Serialized);
        assert_eq!(config.log_level, Level::DEBUG);
        assert_eq!(config.prompts_path, PathBuf::from("/custom/prompts"));
    }

    #[test]
    #[serial]
    fn test_bind_address_overrides_port() {
        clear_env_vars();
        set_minimal_env();
        unsafe {
            env::set_var("PORT", "9090");
            env::set_var("BIND_ADDRESS", "127.0.0.1:3000");
        }

        let config = Config::from_env().expect("Config should load successfully");
        assert_eq!(config.bind_address.to_string(), "127.0.0.1:3000");
    }

    #[test]
    #[serial]
    fn test_config_missing_openai_key() {
        clear_env_vars();

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::MissingVar(var) => assert_eq!(var, "OPENAI_API_KEY"),
            _ => panic!("Expected MissingVar for OPENAI_API_KEY"),
        }
    }

    #[test]
    #[serial]
    fn test_config_blank_openai_key_is_missing() {
        clear_env_vars();
        unsafe {
            env::set_var("OPENAI_API_KEY", "   ");
        }

        assert!(matches!(
            Config::from_env().unwrap_err(),
            ConfigError::MissingVar(_)
        ));
    }

    #[test]
    #[serial]
    fn test_config_invalid_port() {
        clear_env_vars();
        set_minimal_env();
        unsafe {
            env::set_var("PORT", "not-a-port");
        }

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::InvalidValue(var, _) => assert_eq!(var, "PORT"),
            _ => panic!("Expected InvalidValue for PORT"),
        }
    }

    #[test]
    #[serial]
    fn test_config_invalid_turn_ordering() {
        clear_env_vars();
        set_minimal_env();
        unsafe {
            env::set_var("TURN_ORDERING", "random");
        }

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::InvalidValue(var, _) => assert_eq!(var, "TURN_ORDERING"),
            _ => panic!("Expected InvalidValue for TURN_ORDERING"),
        }
    }

    #[test]
    #[serial]
    fn test_config_invalid_log_level() {
        clear_env_vars();
        set_minimal_env();
        unsafe {
            env::set_var("RUST_LOG", "not-a-level");
        }

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::InvalidValue(var, _) => assert_eq!(var, "RUST_LOG"),
            _ => panic!("Expected InvalidValue for RUST_LOG"),
        }
    }
}
