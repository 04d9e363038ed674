use orderline_core::cart::missing_fields;
use orderline_core::errors::{ErrorKind, OrderError};
use orderline_core::session::OrderSession;
use serde_json::{json, Value};

use crate::commands::{engine_for, CommandResult};

pub(crate) fn error_class(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::Validation => "validation",
        ErrorKind::NotFound => "not_found",
        ErrorKind::State => "state",
        ErrorKind::LimitExceeded => "limit_exceeded",
        ErrorKind::System => "system",
    }
}

pub fn run(phrase: &str) -> CommandResult {
    let engine = match engine_for("parse") {
        Ok(engine) => engine,
        Err(failure) => return failure,
    };

    match describe(&engine, phrase) {
        Ok((message, data)) => CommandResult::success_with_data("parse", message, Some(data)),
        Err(error) => CommandResult::failure("parse", error_class(error.kind()), error.user_message(), 1),
    }
}

/// The parsed draft, plus its name and price when nothing is missing.
fn describe(engine: &orderline_core::engine::OrderEngine, phrase: &str) -> Result<(String, Value), OrderError> {
    let draft = engine.parse(phrase)?;
    let missing = missing_fields(engine.catalog(), &draft)?;

    if !missing.is_empty() {
        let message = format!("{} still needs {}", draft.category, missing.join(", "));
        return Ok((message, json!({ "draft": draft, "missing": missing })));
    }

    let mut scratch = OrderSession::default();
    let added = engine.quick_add(&mut scratch, phrase)?;
    let message = format!("{} x {} at ${} each", added.item.quantity(), added.item.name, added.item.unit_price);
    Ok((message, json!({ "draft": draft, "missing": missing, "item": added.item })))
}
