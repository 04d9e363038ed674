use async_trait::async_trait;
use serde_json::{json, Value};

use orderline_core::errors::ApplicationError;
use orderline_core::session::SessionKey;

use super::{to_json, Tool, ToolContext};
use crate::args::ToolArgs;

const NAME_KEYS: &[&str] = &["customerName", "customer_name", "name", "customer"];
const NOTE_KEYS: &[&str] = &["notes", "specialInstructions", "special_instructions", "instructions"];

/// Places the order held in the caller's cart.
pub struct CreateOrder;

#[async_trait]
impl Tool for CreateOrder {
    fn name(&self) -> &'static str {
        "createOrder"
    }

    async fn execute(
        &self,
        ctx: &ToolContext,
        session: &SessionKey,
        args: &ToolArgs,
    ) -> Result<Value, ApplicationError> {
        let customer_name = args.require_text(NAME_KEYS, "customerName")?;
        let notes = args.text(NOTE_KEYS);

        let placed = ctx
            .orders
            .place_order(&ctx.engine, &ctx.sessions, session, &customer_name, notes)
            .await?;

        let mut result = to_json(&placed)?;
        if let Value::Object(fields) = &mut result {
            fields.insert(
                "message".to_string(),
                json!(format!(
                    "Thanks {customer_name}, your order number is {} and the total is ${}",
                    placed.reference, placed.total
                )),
            );
        }
        Ok(result)
    }
}
