use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use orderline_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

/// Key path, value, and the env vars that can set it (first match wins).
type Field = (&'static str, String, &'static [&'static str]);

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for (key, value, env_keys) in fields(&config) {
        let source = field_source(key, env_keys, config_file_doc.as_ref(), config_file_path.as_deref());
        lines.push(render_line(key, &value, source));
    }

    lines.join("\n")
}

fn fields(config: &AppConfig) -> Vec<Field> {
    let api_token = match &config.notifications.api_token {
        Some(token) => redact_token(token.expose_secret()),
        None => "<unset>".to_string(),
    };
    let menu_path = config
        .menu
        .path
        .as_ref()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "<built-in reference menu>".to_string());

    vec![
        ("database.url", config.database.url.clone(), &["ORDERLINE_DATABASE_URL"]),
        (
            "database.max_connections",
            config.database.max_connections.to_string(),
            &["ORDERLINE_DATABASE_MAX_CONNECTIONS"],
        ),
        ("database.timeout_secs", config.database.timeout_secs.to_string(), &["ORDERLINE_DATABASE_TIMEOUT_SECS"]),
        ("server.bind_address", config.server.bind_address.clone(), &["ORDERLINE_SERVER_BIND_ADDRESS"]),
        ("server.port", config.server.port.to_string(), &["ORDERLINE_SERVER_PORT", "PORT"]),
        (
            "server.graceful_shutdown_secs",
            config.server.graceful_shutdown_secs.to_string(),
            &["ORDERLINE_SERVER_GRACEFUL_SHUTDOWN_SECS"],
        ),
        ("limits.max_quantity", config.limits.max_quantity.to_string(), &["ORDERLINE_LIMITS_MAX_QUANTITY"]),
        ("limits.max_batch_size", config.limits.max_batch_size.to_string(), &["ORDERLINE_LIMITS_MAX_BATCH_SIZE"]),
        ("limits.max_cart_items", config.limits.max_cart_items.to_string(), &["ORDERLINE_LIMITS_MAX_CART_ITEMS"]),
        (
            "limits.rate_limit_calls",
            config.limits.rate_limit_calls.to_string(),
            &["ORDERLINE_LIMITS_RATE_LIMIT_CALLS"],
        ),
        (
            "limits.rate_limit_window_secs",
            config.limits.rate_limit_window_secs.to_string(),
            &["ORDERLINE_LIMITS_RATE_LIMIT_WINDOW_SECS"],
        ),
        (
            "limits.session_ttl_secs",
            config.limits.session_ttl_secs.to_string(),
            &["ORDERLINE_LIMITS_SESSION_TTL_SECS"],
        ),
        ("menu.path", menu_path, &["ORDERLINE_MENU_PATH"]),
        (
            "notifications.enabled",
            config.notifications.enabled.to_string(),
            &["ORDERLINE_NOTIFICATIONS_ENABLED"],
        ),
        (
            "notifications.endpoint",
            config.notifications.endpoint.clone().unwrap_or_else(|| "<unset>".to_string()),
            &["ORDERLINE_NOTIFICATIONS_ENDPOINT"],
        ),
        ("notifications.api_token", api_token, &["ORDERLINE_NOTIFICATIONS_API_TOKEN"]),
        ("notifications.sender", config.notifications.sender.clone(), &["ORDERLINE_NOTIFICATIONS_SENDER"]),
        ("logging.level", config.logging.level.clone(), &["ORDERLINE_LOGGING_LEVEL", "ORDERLINE_LOG_LEVEL"]),
        (
            "logging.format",
            format!("{:?}", config.logging.format),
            &["ORDERLINE_LOGGING_FORMAT", "ORDERLINE_LOG_FORMAT"],
        ),
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    ["orderline.toml", "config/orderline.toml"].into_iter().map(PathBuf::from).find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let raw = fs::read_to_string(path?).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
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

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

/// Keeps at most the first four characters of a token.
fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }
    let visible: String = trimmed.chars().take(4).collect();
    if trimmed.chars().count() <= 8 {
        return "<redacted>".to_string();
    }
    format!("{visible}***")
}
