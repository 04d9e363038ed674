use anyhow::{Context, Result};
use orderline_core::engine::OrderEngine;
use orderline_core::pricing::CartPricing;
use orderline_core::session::OrderSession;
use serde_json::json;

use crate::commands::{engine_for, CommandResult};

pub fn run(phrases: &[String]) -> CommandResult {
    let engine = match engine_for("quote") {
        Ok(engine) => engine,
        Err(failure) => return failure,
    };

    match price_phrases(&engine, phrases) {
        Ok(pricing) => {
            let discount = pricing.discount_total();
            let message = if discount.is_zero() {
                format!("total ${}", pricing.total)
            } else {
                format!("total ${} (combo savings ${discount})", pricing.total)
            };
            let data = json!({
                "lineItems": pricing.line_items,
                "combos": pricing.combos,
                "subtotal": pricing.subtotal,
                "discount": discount,
                "total": pricing.total,
            });
            CommandResult::success_with_data("quote", message, Some(data))
        }
        Err(error) => CommandResult::failure("quote", "order", format!("{error:#}"), 1),
    }
}

fn price_phrases(engine: &OrderEngine, phrases: &[String]) -> Result<CartPricing> {
    let mut session = OrderSession::default();
    for phrase in phrases {
        engine.quick_add(&mut session, phrase).with_context(|| format!("could not add `{phrase}`"))?;
    }
    Ok(engine.price_cart(&mut session)?)
}
