use std::collections::HashMap;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::Serialize;
use tera::{Context, Tera};

use orderline_core::domain::order::Order;

use crate::notify::NotifyError;

const RECEIPT_TEMPLATE: &str = "receipt.txt.tera";

/// Formats a decimal (number or decimal string) as dollars and cents.
/// Usage: `amount | money`
fn tera_money_filter(
    value: &tera::Value,
    _args: &HashMap<String, tera::Value>,
) -> tera::Result<tera::Value> {
    let amount = match value {
        tera::Value::String(text) => Decimal::from_str(text)
            .map_err(|error| tera::Error::msg(format!("money filter: `{text}` ({error})")))?,
        tera::Value::Number(number) => Decimal::from_str(&number.to_string())
            .map_err(|error| tera::Error::msg(format!("money filter: `{number}` ({error})")))?,
        tera::Value::Null => Decimal::ZERO,
        _ => return Err(tera::Error::msg("money filter expects a number")),
    };
    Ok(tera::Value::String(format!("${:.2}", amount.round_dp(2))))
}

#[derive(Serialize)]
struct ReceiptLine<'a> {
    quantity: u32,
    name: &'a str,
    total: String,
}

/// Renders the order confirmation text sent to the caller.
#[derive(Clone, Debug)]
pub struct ReceiptRenderer {
    tera: Tera,
}

impl ReceiptRenderer {
    pub fn embedded() -> Result<Self, NotifyError> {
        let mut tera = Tera::default();
        tera.register_filter("money", tera_money_filter);
        tera.add_raw_template(RECEIPT_TEMPLATE, include_str!("../templates/receipt.txt.tera"))
            .map_err(|error| NotifyError::Template(error.to_string()))?;
        Ok(Self { tera })
    }

    pub fn render(&self, business: &str, order: &Order) -> Result<String, NotifyError> {
        let lines: Vec<ReceiptLine<'_>> = order
            .lines
            .iter()
            .map(|line| ReceiptLine {
                quantity: line.item.quantity(),
                name: &line.item.name,
                total: line.line_total.to_string(),
            })
            .collect();

        let mut context = Context::new();
        context.insert("business", business);
        context.insert("customer_name", &order.customer_name);
        context.insert("reference", &order.id.reference());
        context.insert("lines", &lines);
        context.insert("notes", &order.notes);
        context.insert("total", &order.total.to_string());

        self.tera
            .render(RECEIPT_TEMPLATE, &context)
            .map(|text| text.trim_end().to_string())
            .map_err(|error| NotifyError::Template(error.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use orderline_core::domain::order::{Order, OrderId};

    use super::ReceiptRenderer;

    #[test]
    fn receipt_lists_lines_and_total() {
        let renderer = ReceiptRenderer::embedded().expect("template loads");
        let order = Order {
            id: OrderId("ab12cd34-0000".to_string()),
            caller_phone: "+61412345678".to_string(),
            customer_name: "Alex".to_string(),
            notes: Some("no napkins".to_string()),
            lines: Vec::new(),
            subtotal: Decimal::new(2200, 2),
            total: Decimal::new(2200, 2),
            created_at: Utc::now(),
        };

        let text = renderer.render("Golden Grill Kebabs", &order).expect("rendered");
        assert!(text.starts_with("Golden Grill Kebabs: thanks Alex! Order #AB12CD"));
        assert!(text.contains("Notes: no napkins"));
        assert!(text.ends_with("Total $22.00"));
    }
}
