use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{sqlite::SqliteRow, Row};
use tracing::info;

use orderline_core::domain::item::CartItem;
use orderline_core::domain::order::{Order, OrderId, OrderLine};

use super::{OrderRepository, RepositoryError};
use crate::DbPool;

pub struct SqlOrderRepository {
    pool: DbPool,
}

impl SqlOrderRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn load_lines(&self, order_id: &str) -> Result<Vec<OrderLine>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT position, line_total, details_json
             FROM order_items
             WHERE order_id = ?
             ORDER BY position ASC",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(line_from_row).collect()
    }

    async fn hydrate(&self, row: SqliteRow) -> Result<Order, RepositoryError> {
        let id: String = row.try_get("id")?;
        let lines = self.load_lines(&id).await?;
        Ok(Order {
            id: OrderId(id),
            caller_phone: row.try_get("caller_phone")?,
            customer_name: row.try_get("customer_name")?,
            notes: row.try_get("notes")?,
            lines,
            subtotal: parse_decimal("subtotal", row.try_get("subtotal")?)?,
            total: parse_decimal("total", row.try_get("total")?)?,
            created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
        })
    }
}

#[async_trait::async_trait]
impl OrderRepository for SqlOrderRepository {
    async fn save(&self, order: Order) -> Result<OrderId, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO orders (
                id,
                reference,
                caller_phone,
                customer_name,
                notes,
                subtotal,
                total,
                created_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                customer_name = excluded.customer_name,
                notes = excluded.notes,
                subtotal = excluded.subtotal,
                total = excluded.total",
        )
        .bind(&order.id.0)
        .bind(order.id.reference())
        .bind(&order.caller_phone)
        .bind(&order.customer_name)
        .bind(order.notes.as_deref())
        .bind(order.subtotal.to_string())
        .bind(order.total.to_string())
        .bind(order.created_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM order_items WHERE order_id = ?")
            .bind(&order.id.0)
            .execute(&mut *tx)
            .await?;

        for (position, line) in order.lines.iter().enumerate() {
            let details_json = serde_json::to_string(&line.item)
                .map_err(|error| RepositoryError::Decode(format!("order item encoding: {error}")))?;

            sqlx::query(
                "INSERT INTO order_items (
                    order_id,
                    position,
                    name,
                    category,
                    quantity,
                    unit_price,
                    line_total,
                    details_json
                 ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&order.id.0)
            .bind(position as i64)
            .bind(&line.item.name)
            .bind(line.item.category())
            .bind(i64::from(line.item.quantity()))
            .bind(line.item.unit_price.to_string())
            .bind(line.line_total.to_string())
            .bind(details_json)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        info!(
            event_name = "persistence.order.saved",
            order_id = %order.id.0,
            lines = order.lines.len(),
            total = %order.total,
            "order saved"
        );
        Ok(order.id)
    }

    async fn find_by_id(&self, id: &OrderId) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, caller_phone, customer_name, notes, subtotal, total, created_at
             FROM orders
             WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => self.hydrate(row).await.map(Some),
            None => Ok(None),
        }
    }

    async fn list_for_caller(
        &self,
        caller_phone: &str,
        limit: u32,
    ) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, caller_phone, customer_name, notes, subtotal, total, created_at
             FROM orders
             WHERE caller_phone = ?
             ORDER BY created_at DESC
             LIMIT ?",
        )
        .bind(caller_phone)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        let mut orders = Vec::with_capacity(rows.len());
        for row in rows {
            orders.push(self.hydrate(row).await?);
        }
        Ok(orders)
    }
}

fn line_from_row(row: SqliteRow) -> Result<OrderLine, RepositoryError> {
    let details_json: String = row.try_get("details_json")?;
    let item: CartItem = serde_json::from_str(&details_json).map_err(|error| {
        RepositoryError::Decode(format!("invalid order item json: {error}"))
    })?;
    Ok(OrderLine { item, line_total: parse_decimal("line_total", row.try_get("line_total")?)? })
}

fn parse_decimal(column: &str, value: String) -> Result<Decimal, RepositoryError> {
    Decimal::from_str(&value).map_err(|error| {
        RepositoryError::Decode(format!("invalid decimal in `{column}`: `{value}` ({error})"))
    })
}

fn parse_timestamp(column: &str, value: String) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(&value).map(|timestamp| timestamp.with_timezone(&Utc)).map_err(
        |error| {
            RepositoryError::Decode(format!("invalid timestamp in `{column}`: `{value}` ({error})"))
        },
    )
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{DateTime, Utc};
    use rust_decimal::Decimal;

    use orderline_core::cart::OrderLimits;
    use orderline_core::domain::order::{Order, OrderId};
    use orderline_core::engine::OrderEngine;
    use orderline_core::menu::MenuCatalog;
    use orderline_core::session::{OrderSession, SessionKey};

    use super::SqlOrderRepository;
    use crate::migrations;
    use crate::repositories::OrderRepository;
    use crate::{connect_with_settings, DbPool};

    #[tokio::test]
    async fn sql_order_repo_round_trip_keeps_lines_and_totals() {
        let pool = setup_pool().await;
        let repo = SqlOrderRepository::new(pool.clone());
        let order = sample_order("order-001", "2026-10-18T19:30:00Z");

        let saved_id = repo.save(order.clone()).await.expect("save order");
        assert_eq!(saved_id, order.id);

        let found = repo.find_by_id(&order.id).await.expect("find order");
        assert_eq!(found, Some(order.clone()));

        let reference: String = sqlx::query_scalar("SELECT reference FROM orders WHERE id = ?")
            .bind(&order.id.0)
            .fetch_one(&pool)
            .await
            .expect("load reference");
        assert_eq!(reference, order.id.reference());

        pool.close().await;
    }

    #[tokio::test]
    async fn sql_order_repo_resave_replaces_lines() {
        let pool = setup_pool().await;
        let repo = SqlOrderRepository::new(pool.clone());
        let mut order = sample_order("order-002", "2026-10-18T19:30:00Z");
        repo.save(order.clone()).await.expect("save order");

        order.lines.truncate(1);
        order.customer_name = "Sam".to_string();
        repo.save(order.clone()).await.expect("resave order");

        let found = repo.find_by_id(&order.id).await.expect("find order").expect("order exists");
        assert_eq!(found.lines.len(), 1);
        assert_eq!(found.customer_name, "Sam");

        pool.close().await;
    }

    #[tokio::test]
    async fn sql_order_repo_lists_caller_orders_newest_first() {
        let pool = setup_pool().await;
        let repo = SqlOrderRepository::new(pool.clone());
        repo.save(sample_order("order-old", "2026-10-17T12:00:00Z")).await.expect("save old");
        repo.save(sample_order("order-new", "2026-10-18T12:00:00Z")).await.expect("save new");

        let orders = repo.list_for_caller("+61412345678", 10).await.expect("list orders");
        let ids: Vec<&str> = orders.iter().map(|order| order.id.0.as_str()).collect();
        assert_eq!(ids, vec!["order-new", "order-old"]);

        assert!(repo.list_for_caller("+61400000000", 10).await.expect("list").is_empty());
        assert_eq!(repo.find_by_id(&OrderId("missing".to_string())).await.expect("find"), None);

        pool.close().await;
    }

    async fn setup_pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect test pool");
        migrations::run_pending(&pool).await.expect("run migrations");
        pool
    }

    fn sample_order(id: &str, created_at: &str) -> Order {
        let engine = OrderEngine::new(
            Arc::new(MenuCatalog::reference().expect("menu")),
            OrderLimits::default(),
        );
        let mut session = OrderSession::default();
        engine.quick_add(&mut session, "large lamb kebab meal").expect("kebab");
        engine.quick_add(&mut session, "2 cans of coke").expect("drinks");
        let pricing = engine.price_cart(&mut session).expect("priced");
        assert!(pricing.total > Decimal::ZERO);

        Order::from_cart(
            OrderId(id.to_string()),
            &SessionKey::from_phone("0412 345 678").expect("phone"),
            "Alex",
            Some("extra napkins".to_string()),
            session.cart.items(),
            &pricing,
            parse_ts(created_at),
        )
    }

    fn parse_ts(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value).expect("valid rfc3339").with_timezone(&Utc)
    }
}
