use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{error, info, warn};

use orderline_core::domain::order::{Order, OrderId};
use orderline_core::engine::OrderEngine;
use orderline_core::errors::{ApplicationError, OrderError};
use orderline_core::session::{SessionKey, SessionStore};
use orderline_db::OrderRepository;

use crate::notify::Notifier;
use crate::receipt::ReceiptRenderer;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacedOrder {
    pub order_id: String,
    pub reference: String,
    pub item_count: u32,
    pub total: Decimal,
}

/// Turns a session cart into a stored order and confirms it to the caller.
pub struct OrderService {
    repository: Arc<dyn OrderRepository>,
    notifier: Arc<dyn Notifier>,
    receipts: ReceiptRenderer,
}

impl OrderService {
    pub fn new(
        repository: Arc<dyn OrderRepository>,
        notifier: Arc<dyn Notifier>,
        receipts: ReceiptRenderer,
    ) -> Self {
        Self { repository, notifier, receipts }
    }

    /// Prices and saves the caller's cart, then clears it. The cart is left
    /// untouched when saving fails. The confirmation message is sent in the
    /// background and its failure never fails the order.
    pub async fn place_order(
        &self,
        engine: &OrderEngine,
        sessions: &SessionStore,
        key: &SessionKey,
        customer_name: &str,
        notes: Option<String>,
    ) -> Result<PlacedOrder, ApplicationError> {
        let order = sessions.with_session_unmetered(key, |session| {
            if session.cart.is_empty() {
                return Err(OrderError::EmptyCart);
            }
            let pricing = engine.price_cart(session)?;
            Ok(Order::from_cart(
                OrderId::generate(),
                key,
                customer_name,
                notes,
                session.cart.items(),
                &pricing,
                Utc::now(),
            ))
        })?;

        let order_id = self.repository.save(order.clone()).await.map_err(|source| {
            error!(
                event_name = "order.create.persist_failed",
                session = %key,
                order_id = %order.id.0,
                error = %source,
                "order could not be saved"
            );
            ApplicationError::Persistence(source.to_string())
        })?;

        sessions.with_session_unmetered(key, |session| {
            engine.clear_cart(session);
            engine.cancel_configuration(session);
            Ok(())
        })?;

        info!(
            event_name = "order.create.completed",
            session = %key,
            order_id = %order_id.0,
            total = %order.total,
            "order created"
        );

        self.send_confirmation(engine.catalog().business().name.as_str(), key, &order);

        Ok(PlacedOrder {
            reference: order_id.reference(),
            order_id: order_id.0,
            item_count: order.item_count(),
            total: order.total,
        })
    }

    fn send_confirmation(&self, business: &str, key: &SessionKey, order: &Order) {
        if key.is_anonymous() {
            return;
        }
        let message = match self.receipts.render(business, order) {
            Ok(message) => message,
            Err(source) => {
                warn!(event_name = "notification.receipt.render_failed", error = %source, "receipt not rendered");
                return;
            }
        };

        let notifier = Arc::clone(&self.notifier);
        let phone = key.as_str().to_string();
        let order_id = order.id.0.clone();
        tokio::spawn(async move {
            if let Err(source) = notifier.send(&phone, &message).await {
                warn!(
                    event_name = "notification.receipt.failed",
                    order_id = %order_id,
                    error = %source,
                    "order confirmation was not delivered"
                );
            }
        });
    }
}
