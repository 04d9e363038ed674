use std::collections::BTreeMap;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{error, info};

use orderline_core::domain::item::CartItem;
use orderline_core::engine::OrderEngine;
use orderline_core::errors::{ApplicationError, ErrorKind, OrderError};
use orderline_core::pricing::CartPricing;
use orderline_core::session::{OrderSession, SessionKey, SessionStore};

use crate::args::ToolArgs;
use crate::orders::OrderService;

pub mod builder;
pub mod cart;
pub mod info;
pub mod order;

/// Everything a tool may touch while handling a call.
pub struct ToolContext {
    pub engine: OrderEngine,
    pub sessions: SessionStore,
    pub orders: OrderService,
}

impl ToolContext {
    pub fn new(engine: OrderEngine, sessions: SessionStore, orders: OrderService) -> Self {
        Self { engine, sessions, orders }
    }

    /// Runs `f` on the caller's session. The call has already been admitted
    /// by the registry, so this does not count against the rate limit.
    pub fn session<T, F>(&self, key: &SessionKey, f: F) -> Result<T, ApplicationError>
    where
        F: FnOnce(&mut OrderSession) -> Result<T, OrderError>,
    {
        self.sessions.with_session_unmetered(key, f).map_err(ApplicationError::from)
    }
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;

    /// Returns the operation-specific result fields as a JSON object.
    async fn execute(
        &self,
        ctx: &ToolContext,
        session: &SessionKey,
        args: &ToolArgs,
    ) -> Result<Value, ApplicationError>;
}

/// The record returned to the voice platform for every call.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ToolResult {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(rename = "errorKind", skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(flatten)]
    pub data: Map<String, Value>,
}

impl ToolResult {
    pub fn success(data: Value) -> Self {
        let data = match data {
            Value::Object(fields) => fields,
            Value::Null => Map::new(),
            other => {
                let mut fields = Map::new();
                fields.insert("result".to_string(), other);
                fields
            }
        };
        Self { ok: true, error: None, error_kind: None, data }
    }

    pub fn failure(message: impl Into<String>, kind: ErrorKind) -> Self {
        Self { ok: false, error: Some(message.into()), error_kind: Some(kind), data: Map::new() }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| {
            serde_json::json!({ "ok": self.ok, "error": self.error })
        })
    }
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<&'static str, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn register<T>(&mut self, tool: T)
    where
        T: Tool + 'static,
    {
        self.tools.insert(tool.name(), Box::new(tool));
    }

    /// A registry holding every order tool.
    pub fn with_default_tools() -> Self {
        let mut registry = Self::default();
        registry.register(builder::QuickAddItem);
        registry.register(builder::StartItemConfiguration);
        registry.register(builder::SetItemProperty);
        registry.register(builder::AddItemToCart);
        registry.register(builder::CancelItemConfiguration);
        registry.register(cart::EditCartItem);
        registry.register(cart::RemoveCartItem);
        registry.register(cart::ClearCart);
        registry.register(cart::ConvertItemsToMeals);
        registry.register(cart::AddMultipleItems);
        registry.register(cart::PriceCart);
        registry.register(cart::GetCartState);
        registry.register(info::GetMenu);
        registry.register(info::GetBusinessInfo);
        registry.register(order::CreateOrder);
        registry
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.tools.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Runs one tool call. Every outcome, including unknown tools and
    /// internal faults, comes back as a [`ToolResult`].
    pub async fn dispatch(
        &self,
        ctx: &ToolContext,
        session: &SessionKey,
        name: &str,
        raw_args: &Value,
        correlation_id: &str,
    ) -> ToolResult {
        let Some(tool) = self.tools.get(name) else {
            info!(
                event_name = "order.tool.unknown",
                tool = name,
                session = %session,
                correlation_id,
                "unknown tool requested"
            );
            return ToolResult::failure(format!("unknown tool `{name}`"), ErrorKind::NotFound);
        };

        match run(tool.as_ref(), ctx, session, raw_args).await {
            Ok(data) => {
                info!(
                    event_name = "order.tool.completed",
                    tool = name,
                    session = %session,
                    correlation_id,
                    "tool call completed"
                );
                ToolResult::success(data)
            }
            Err(failure) => reject(name, session, correlation_id, failure),
        }
    }
}

pub(crate) fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<Value, ApplicationError> {
    serde_json::to_value(value)
        .map_err(|source| OrderError::Internal(format!("result encoding failed: {source}")).into())
}

/// A cart entry as shown to the voice agent, with its position. Priced views
/// also carry the line total after any combo saving folded into the line.
#[derive(Serialize)]
pub(crate) struct CartLineView<'a> {
    pub index: usize,
    #[serde(flatten)]
    pub item: &'a CartItem,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_total: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub combo_discount: Option<Decimal>,
}

pub(crate) fn cart_lines(items: &[CartItem]) -> Vec<CartLineView<'_>> {
    items
        .iter()
        .enumerate()
        .map(|(index, item)| CartLineView { index, item, line_total: None, combo_discount: None })
        .collect()
}

pub(crate) fn priced_cart_lines<'a>(items: &'a [CartItem], pricing: &CartPricing) -> Vec<CartLineView<'a>> {
    items
        .iter()
        .zip(&pricing.line_items)
        .enumerate()
        .map(|(index, (item, line))| CartLineView {
            index,
            item,
            line_total: Some(line.line_total),
            combo_discount: Some(line.combo_discount),
        })
        .collect()
}

async fn run(
    tool: &dyn Tool,
    ctx: &ToolContext,
    session: &SessionKey,
    raw_args: &Value,
) -> Result<Value, ApplicationError> {
    ctx.sessions.admit(session)?;
    let args = ToolArgs::from_value(raw_args)?;
    tool.execute(ctx, session, &args).await
}

fn reject(tool: &str, session: &SessionKey, correlation_id: &str, failure: ApplicationError) -> ToolResult {
    let kind = match &failure {
        ApplicationError::Order(order_error) => order_error.kind(),
        _ => ErrorKind::System,
    };

    if kind == ErrorKind::System {
        error!(
            event_name = "order.tool.failed",
            tool,
            session = %session,
            correlation_id,
            error = %failure,
            "tool call failed unexpectedly"
        );
    } else {
        info!(
            event_name = "order.tool.rejected",
            tool,
            session = %session,
            correlation_id,
            error_kind = ?kind,
            error = %failure,
            "tool call rejected"
        );
    }

    let message = failure.into_interface(correlation_id).user_message();
    ToolResult::failure(message, kind)
}


#[cfg(test)]
mod tests {
    use serde_json::json;

    use orderline_core::errors::ErrorKind;
    use orderline_core::session::{SessionPolicy, SessionStore};

    use super::test_support::Harness;
    use super::ToolResult;

    #[test]
    fn registry_holds_every_tool_once() {
        let harness = Harness::new();
        let names: Vec<&str> = harness.registry.names().collect();
        assert_eq!(names.len(), 15);
        for expected in [
            "quickAddItem",
            "startItemConfiguration",
            "setItemProperty",
            "addItemToCart",
            "cancelItemConfiguration",
            "editCartItem",
            "removeCartItem",
            "clearCart",
            "convertItemsToMeals",
            "addMultipleItems",
            "priceCart",
            "getCartState",
            "getMenu",
            "getBusinessInfo",
            "createOrder",
        ] {
            assert!(names.contains(&expected), "missing {expected}");
        }
    }

    #[tokio::test]
    async fn unknown_tools_and_bad_arguments_fail_softly() {
        let harness = Harness::new();

        let unknown = harness.call("orderPizza", json!({})).await;
        assert_eq!(unknown.error_kind, Some(ErrorKind::NotFound));

        let garbled = harness.call("quickAddItem", json!("{not json")).await;
        assert!(!garbled.ok);
        assert_eq!(garbled.error_kind, Some(ErrorKind::Validation));
    }

    #[tokio::test]
    async fn rate_limited_calls_report_limit_exceeded() {
        let mut harness = Harness::new();
        harness.ctx.sessions =
            SessionStore::new(SessionPolicy { rate_limit_calls: 2, ..SessionPolicy::default() });

        assert!(harness.call("getCartState", json!({})).await.ok);
        assert!(harness.call("getCartState", json!({})).await.ok);
        let limited = harness.call("quickAddItem", json!({ "description": "small chips" })).await;

        assert_eq!(limited.error_kind, Some(ErrorKind::LimitExceeded));
        assert!(harness.ctx.sessions.snapshot(&harness.caller).map(|s| s.cart.is_empty()).unwrap_or(false));
    }

    #[test]
    fn results_serialize_flat_with_camel_case_error_kind() {
        let failure = ToolResult::failure("the cart is empty", ErrorKind::State).to_value();
        assert_eq!(failure, json!({ "ok": false, "error": "the cart is empty", "errorKind": "state" }));

        let success = ToolResult::success(json!({ "removedCount": 2 })).to_value();
        assert_eq!(success, json!({ "ok": true, "removedCount": 2 }));
    }
}
