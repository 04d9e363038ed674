pub mod config;
pub mod doctor;
pub mod migrate;
pub mod parse;
pub mod quote;

use std::sync::Arc;

use orderline_core::config::{AppConfig, LoadOptions};
use orderline_core::engine::OrderEngine;
use orderline_core::menu::{MenuCatalog, MenuError};
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        Self::success_with_data(command, message, None)
    }

    pub fn success_with_data(command: &str, message: impl Into<String>, data: Option<Value>) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
            data,
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn failure(command: &str, error_class: &str, message: impl Into<String>, exit_code: u8) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
            data: None,
        };
        Self { exit_code, output: serialize_payload(payload) }
    }
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

/// The configured menu file, or the built-in reference menu.
pub fn load_catalog(config: &AppConfig) -> Result<MenuCatalog, MenuError> {
    match &config.menu.path {
        Some(path) => MenuCatalog::load(path),
        None => MenuCatalog::reference(),
    }
}

/// Loads config and menu into an engine, or the failure to report.
fn engine_for(command: &str) -> Result<OrderEngine, CommandResult> {
    let config = AppConfig::load(LoadOptions::default()).map_err(|error| {
        CommandResult::failure(command, "config_validation", format!("configuration issue: {error}"), 2)
    })?;
    let catalog = load_catalog(&config)
        .map_err(|error| CommandResult::failure(command, "menu", format!("menu issue: {error}"), 3))?;
    Ok(OrderEngine::new(Arc::new(catalog), config.limits.order_limits()))
}
