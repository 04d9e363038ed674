use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cart::OrderLimits;
use crate::session::SessionPolicy;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub limits: LimitsConfig,
    pub menu: MenuConfig,
    pub notifications: NotificationsConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LimitsConfig {
    pub max_quantity: u32,
    pub max_batch_size: usize,
    pub max_cart_items: usize,
    pub rate_limit_calls: usize,
    pub rate_limit_window_secs: u64,
    pub session_ttl_secs: u64,
}

impl LimitsConfig {
    pub fn order_limits(&self) -> OrderLimits {
        OrderLimits {
            max_quantity: self.max_quantity,
            max_batch_size: self.max_batch_size,
            max_cart_items: self.max_cart_items,
        }
    }

    pub fn session_policy(&self) -> SessionPolicy {
        SessionPolicy {
            rate_limit_calls: self.rate_limit_calls,
            rate_limit_window: Duration::from_secs(self.rate_limit_window_secs),
            idle_ttl: Duration::from_secs(self.session_ttl_secs),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct MenuConfig {
    /// Menu TOML to load; the embedded reference menu is used when unset.
    pub path: Option<PathBuf>,
}

#[derive(Clone, Debug)]
pub struct NotificationsConfig {
    pub enabled: bool,
    pub endpoint: Option<String>,
    pub api_token: Option<SecretString>,
    pub sender: String,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
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
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub server_port: Option<u16>,
    pub menu_path: Option<PathBuf>,
    pub notifications_enabled: Option<bool>,
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
            database: DatabaseConfig {
                url: "sqlite://orderline.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            limits: LimitsConfig {
                max_quantity: 50,
                max_batch_size: 10,
                max_cart_items: 30,
                rate_limit_calls: 60,
                rate_limit_window_secs: 60,
                session_ttl_secs: 1800,
            },
            menu: MenuConfig::default(),
            notifications: NotificationsConfig {
                enabled: false,
                endpoint: None,
                api_token: None,
                sender: "Orderline".to_string(),
            },
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
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("orderline.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
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

        if let Some(limits) = patch.limits {
            if let Some(max_quantity) = limits.max_quantity {
                self.limits.max_quantity = max_quantity;
            }
            if let Some(max_batch_size) = limits.max_batch_size {
                self.limits.max_batch_size = max_batch_size;
            }
            if let Some(max_cart_items) = limits.max_cart_items {
                self.limits.max_cart_items = max_cart_items;
            }
            if let Some(rate_limit_calls) = limits.rate_limit_calls {
                self.limits.rate_limit_calls = rate_limit_calls;
            }
            if let Some(rate_limit_window_secs) = limits.rate_limit_window_secs {
                self.limits.rate_limit_window_secs = rate_limit_window_secs;
            }
            if let Some(session_ttl_secs) = limits.session_ttl_secs {
                self.limits.session_ttl_secs = session_ttl_secs;
            }
        }

        if let Some(menu) = patch.menu {
            if let Some(path) = menu.path {
                self.menu.path = Some(path);
            }
        }

        if let Some(notifications) = patch.notifications {
            if let Some(enabled) = notifications.enabled {
                self.notifications.enabled = enabled;
            }
            if let Some(endpoint) = notifications.endpoint {
                self.notifications.endpoint = Some(endpoint);
            }
            if let Some(api_token_value) = notifications.api_token {
                self.notifications.api_token = Some(secret_value(api_token_value));
            }
            if let Some(sender) = notifications.sender {
                self.notifications.sender = sender;
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
        if let Some(value) = read_env("ORDERLINE_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("ORDERLINE_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_env("ORDERLINE_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("ORDERLINE_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_env("ORDERLINE_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("ORDERLINE_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("ORDERLINE_SERVER_PORT").or_else(|| read_env("PORT")) {
            self.server.port = parse_env("ORDERLINE_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("ORDERLINE_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_env("ORDERLINE_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        if let Some(value) = read_env("ORDERLINE_LIMITS_MAX_QUANTITY") {
            self.limits.max_quantity = parse_env("ORDERLINE_LIMITS_MAX_QUANTITY", &value)?;
        }
        if let Some(value) = read_env("ORDERLINE_LIMITS_MAX_BATCH_SIZE") {
            self.limits.max_batch_size = parse_env("ORDERLINE_LIMITS_MAX_BATCH_SIZE", &value)?;
        }
        if let Some(value) = read_env("ORDERLINE_LIMITS_MAX_CART_ITEMS") {
            self.limits.max_cart_items = parse_env("ORDERLINE_LIMITS_MAX_CART_ITEMS", &value)?;
        }
        if let Some(value) = read_env("ORDERLINE_LIMITS_RATE_LIMIT_CALLS") {
            self.limits.rate_limit_calls = parse_env("ORDERLINE_LIMITS_RATE_LIMIT_CALLS", &value)?;
        }
        if let Some(value) = read_env("ORDERLINE_LIMITS_RATE_LIMIT_WINDOW_SECS") {
            self.limits.rate_limit_window_secs =
                parse_env("ORDERLINE_LIMITS_RATE_LIMIT_WINDOW_SECS", &value)?;
        }
        if let Some(value) = read_env("ORDERLINE_LIMITS_SESSION_TTL_SECS") {
            self.limits.session_ttl_secs = parse_env("ORDERLINE_LIMITS_SESSION_TTL_SECS", &value)?;
        }

        if let Some(value) = read_env("ORDERLINE_MENU_PATH") {
            self.menu.path = Some(PathBuf::from(value));
        }

        if let Some(value) = read_env("ORDERLINE_NOTIFICATIONS_ENABLED") {
            self.notifications.enabled = parse_env("ORDERLINE_NOTIFICATIONS_ENABLED", &value)?;
        }
        if let Some(value) = read_env("ORDERLINE_NOTIFICATIONS_ENDPOINT") {
            self.notifications.endpoint = Some(value);
        }
        if let Some(value) = read_env("ORDERLINE_NOTIFICATIONS_API_TOKEN") {
            self.notifications.api_token = Some(secret_value(value));
        }
        if let Some(value) = read_env("ORDERLINE_NOTIFICATIONS_SENDER") {
            self.notifications.sender = value;
        }

        let log_level = read_env("ORDERLINE_LOGGING_LEVEL").or_else(|| read_env("ORDERLINE_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("ORDERLINE_LOGGING_FORMAT").or_else(|| read_env("ORDERLINE_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(port) = overrides.server_port {
            self.server.port = port;
        }
        if let Some(menu_path) = overrides.menu_path {
            self.menu.path = Some(menu_path);
        }
        if let Some(enabled) = overrides.notifications_enabled {
            self.notifications.enabled = enabled;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_server(&self.server)?;
        validate_limits(&self.limits)?;
        validate_notifications(&self.notifications)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("orderline.toml"), PathBuf::from("config/orderline.toml")]
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

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.bind_address.trim().is_empty() {
        return Err(ConfigError::Validation("server.bind_address must not be empty".to_string()));
    }

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

fn validate_limits(limits: &LimitsConfig) -> Result<(), ConfigError> {
    let checks = [
        ("limits.max_quantity", limits.max_quantity as u64),
        ("limits.max_batch_size", limits.max_batch_size as u64),
        ("limits.max_cart_items", limits.max_cart_items as u64),
        ("limits.rate_limit_calls", limits.rate_limit_calls as u64),
        ("limits.rate_limit_window_secs", limits.rate_limit_window_secs),
        ("limits.session_ttl_secs", limits.session_ttl_secs),
    ];
    if let Some((name, _)) = checks.iter().find(|(_, value)| *value == 0) {
        return Err(ConfigError::Validation(format!("{name} must be greater than zero")));
    }

    if limits.max_batch_size > limits.max_cart_items {
        return Err(ConfigError::Validation(
            "limits.max_batch_size cannot exceed limits.max_cart_items".to_string(),
        ));
    }

    Ok(())
}

fn validate_notifications(notifications: &NotificationsConfig) -> Result<(), ConfigError> {
    if let Some(endpoint) = &notifications.endpoint {
        if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
            return Err(ConfigError::Validation(
                "notifications.endpoint must start with http:// or https://".to_string(),
            ));
        }
    }

    if notifications.enabled {
        if notifications.endpoint.is_none() {
            return Err(ConfigError::Validation(
                "notifications.enabled is true but notifications.endpoint is not set".to_string(),
            ));
        }
        let missing_token = notifications
            .api_token
            .as_ref()
            .map(|value| value.expose_secret().trim().is_empty())
            .unwrap_or(true);
        if missing_token {
            return Err(ConfigError::Validation(
                "notifications.api_token is required when notifications are enabled".to_string(),
            ));
        }
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

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse::<T>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    server: Option<ServerPatch>,
    limits: Option<LimitsPatch>,
    menu: Option<MenuPatch>,
    notifications: Option<NotificationsPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LimitsPatch {
    max_quantity: Option<u32>,
    max_batch_size: Option<usize>,
    max_cart_items: Option<usize>,
    rate_limit_calls: Option<usize>,
    rate_limit_window_secs: Option<u64>,
    session_ttl_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct MenuPatch {
    path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct NotificationsPatch {
    enabled: Option<bool>,
    endpoint: Option<String>,
    api_token: Option<String>,
    sender: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
