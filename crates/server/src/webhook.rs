//! Voice platform webhook.
//!
//! The platform posts one envelope per event. `tool-calls` envelopes carry one
//! or more named tool invocations for the caller; they are dispatched in order
//! and answered with a `results` envelope keyed by tool call id. An
//! `end-of-call-report` drops the caller's session. Other event types are
//! acknowledged and ignored.

use std::sync::Arc;

use axum::{
    extract::State,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use orderline_agent::{ToolContext, ToolRegistry};
use orderline_core::session::SessionKey;

#[derive(Clone)]
pub struct WebhookState {
    registry: Arc<ToolRegistry>,
    context: Arc<ToolContext>,
}

impl WebhookState {
    pub fn new(registry: Arc<ToolRegistry>, context: Arc<ToolContext>) -> Self {
        Self { registry, context }
    }
}

#[derive(Debug, Deserialize)]
pub struct WebhookEnvelope {
    pub message: PlatformMessage,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum PlatformMessage {
    ToolCalls {
        #[serde(default, rename = "toolCallList", alias = "toolCalls")]
        tool_calls: Vec<ToolCall>,
        #[serde(default)]
        call: Option<CallInfo>,
        #[serde(default)]
        customer: Option<Customer>,
    },
    EndOfCallReport {
        #[serde(default)]
        call: Option<CallInfo>,
        #[serde(default)]
        customer: Option<Customer>,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
pub struct ToolCall {
    #[serde(default)]
    pub id: Option<String>,
    pub function: FunctionCall,
}

#[derive(Debug, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

#[derive(Debug, Default, Deserialize)]
pub struct CallInfo {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub customer: Option<Customer>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Customer {
    #[serde(default)]
    pub number: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallResult {
    pub tool_call_id: String,
    pub result: Value,
}

#[derive(Debug, Serialize)]
pub struct ResultsEnvelope {
    pub results: Vec<ToolCallResult>,
}

pub fn router(state: WebhookState) -> Router {
    Router::new().route("/webhook", post(handle_webhook)).with_state(state)
}

/// The caller's phone number, from the message or the call record. Calls
/// without a usable number are keyed by the platform call id.
pub fn session_key(call: Option<&CallInfo>, customer: Option<&Customer>) -> SessionKey {
    let number = customer
        .and_then(|customer| customer.number.as_deref())
        .or_else(|| call.and_then(|call| call.customer.as_ref()).and_then(|customer| customer.number.as_deref()));

    if let Some(key) = number.and_then(|raw| SessionKey::from_phone(raw).ok()) {
        return key;
    }

    let call_id = call
        .and_then(|call| call.id.clone())
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    SessionKey::anonymous(&call_id)
}

pub async fn handle_webhook(
    State(state): State<WebhookState>,
    Json(envelope): Json<WebhookEnvelope>,
) -> Response {
    match envelope.message {
        PlatformMessage::ToolCalls { tool_calls, call, customer } => {
            let session = session_key(call.as_ref(), customer.as_ref());
            let results = dispatch_all(&state, &session, tool_calls).await;
            Json(ResultsEnvelope { results }).into_response()
        }
        PlatformMessage::EndOfCallReport { call, customer } => {
            let session = session_key(call.as_ref(), customer.as_ref());
            let ended = state.context.sessions.end_session(&session);
            info!(event_name = "order.session.ended", session = %session, ended, "call ended");
            Json(json!({ "ok": true, "sessionEnded": ended })).into_response()
        }
        PlatformMessage::Other => {
            debug!(event_name = "system.webhook.ignored", "ignoring platform message");
            Json(json!({ "ok": true })).into_response()
        }
    }
}

async fn dispatch_all(state: &WebhookState, session: &SessionKey, calls: Vec<ToolCall>) -> Vec<ToolCallResult> {
    let mut results = Vec::with_capacity(calls.len());
    for call in calls {
        let tool_call_id = call.id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let result = state
            .registry
            .dispatch(&state.context, session, &call.function.name, &call.function.arguments, &tool_call_id)
            .await;
        results.push(ToolCallResult { tool_call_id, result: result.to_value() });
    }
    results
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::Router;
    use serde_json::{json, Value};
    use tower::util::ServiceExt;

    use orderline_agent::ToolRegistry;
    use orderline_core::session::{SessionKey, SessionPolicy};

    use super::{router, session_key, CallInfo, Customer, WebhookState};
    use crate::bootstrap::test_support;

    fn app(policy: SessionPolicy) -> (Router, WebhookState) {
        let state = WebhookState::new(Arc::new(ToolRegistry::with_default_tools()), test_support::context(policy));
        (router(state.clone()), state)
    }

    async fn post(app: &Router, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri("/webhook")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request");
        let response = app.clone().oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.expect("body");
        (status, serde_json::from_slice(&bytes).unwrap_or(json!({})))
    }

    fn tool_calls(number: &str, calls: Value) -> Value {
        json!({
            "message": {
                "type": "tool-calls",
                "call": { "id": "call-1", "customer": { "number": number } },
                "toolCallList": calls,
            }
        })
    }

    #[tokio::test]
    async fn tool_calls_are_answered_in_order_by_call_id() {
        let (app, _state) = app(SessionPolicy::default());

        let (status, body) = post(
            &app,
            tool_calls(
                "0412 345 678",
                json!([
                    { "id": "tc-1", "function": { "name": "quickAddItem", "arguments": { "description": "small lamb kebab" } } },
                    { "id": "tc-2", "function": { "name": "quickAddItem", "arguments": "{\"description\": \"large chips\"}" } },
                    { "id": "tc-3", "function": { "name": "priceCart", "arguments": {} } },
                ]),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["results"][0]["toolCallId"], json!("tc-1"));
        assert_eq!(body["results"][1]["result"]["ok"], json!(true));
        assert_eq!(body["results"][2]["toolCallId"], json!("tc-3"));
        assert_eq!(body["results"][2]["result"]["total"], json!("20.00"));
    }

    #[tokio::test]
    async fn failures_come_back_as_results_not_http_errors() {
        let (app, _state) = app(SessionPolicy::default());

        let (status, body) = post(
            &app,
            tool_calls(
                "0412 345 678",
                json!([
                    { "id": "tc-1", "function": { "name": "removeCartItem", "arguments": { "index": 4 } } },
                    { "id": "tc-2", "function": { "name": "bookTable", "arguments": {} } },
                ]),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["results"][0]["result"]["ok"], json!(false));
        assert_eq!(body["results"][0]["result"]["errorKind"], json!("state"));
        assert_eq!(body["results"][1]["result"]["errorKind"], json!("not_found"));
    }

    #[tokio::test]
    async fn end_of_call_report_drops_the_session() {
        let (app, state) = app(SessionPolicy::default());
        let caller = SessionKey::from_phone("0412 345 678").expect("phone");

        post(
            &app,
            tool_calls(
                "0412 345 678",
                json!([{ "id": "tc-1", "function": { "name": "quickAddItem", "arguments": { "description": "can of coke" } } }]),
            ),
        )
        .await;
        assert!(state.context.sessions.snapshot(&caller).is_some());

        let (status, body) = post(
            &app,
            json!({ "message": { "type": "end-of-call-report", "call": { "id": "call-1", "customer": { "number": "0412 345 678" } } } }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["sessionEnded"], json!(true));
        assert!(state.context.sessions.snapshot(&caller).is_none());
    }

    #[tokio::test]
    async fn unrelated_events_are_acknowledged() {
        let (app, _state) = app(SessionPolicy::default());
        let (status, body) = post(&app, json!({ "message": { "type": "status-update", "status": "ringing" } })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "ok": true }));
    }

    #[tokio::test]
    async fn rate_limited_callers_get_a_limit_result() {
        let (app, _state) = app(SessionPolicy { rate_limit_calls: 1, ..SessionPolicy::default() });
        let calls = json!([
            { "id": "tc-1", "function": { "name": "getCartState", "arguments": {} } },
            { "id": "tc-2", "function": { "name": "getCartState", "arguments": {} } },
        ]);

        let (_, body) = post(&app, tool_calls("0412 345 678", calls)).await;

        assert_eq!(body["results"][0]["result"]["ok"], json!(true));
        assert_eq!(body["results"][1]["result"]["errorKind"], json!("limit_exceeded"));
    }

    #[test]
    fn callers_without_a_number_are_keyed_by_call() {
        let call = CallInfo { id: Some("call-9".to_string()), customer: None };
        let key = session_key(Some(&call), None);
        assert!(key.is_anonymous());
        assert_eq!(key, SessionKey::anonymous("call-9"));

        let withheld = Customer { number: Some("anonymous".to_string()) };
        assert!(session_key(Some(&call), Some(&withheld)).is_anonymous());

        let known = Customer { number: Some("+61 412 345 678".to_string()) };
        assert_eq!(session_key(None, Some(&known)).as_str(), "+61412345678");
    }
}
