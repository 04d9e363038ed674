use std::collections::HashMap;

use tokio::sync::RwLock;

use orderline_core::domain::order::{Order, OrderId};

use super::{OrderRepository, RepositoryError};

#[derive(Default)]
pub struct InMemoryOrderRepository {
    orders: RwLock<HashMap<String, Order>>,
}

impl InMemoryOrderRepository {
    pub async fn len(&self) -> usize {
        self.orders.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.orders.read().await.is_empty()
    }
}

#[async_trait::async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn save(&self, order: Order) -> Result<OrderId, RepositoryError> {
        let mut orders = self.orders.write().await;
        let id = order.id.clone();
        orders.insert(id.0.clone(), order);
        Ok(id)
    }

    async fn find_by_id(&self, id: &OrderId) -> Result<Option<Order>, RepositoryError> {
        let orders = self.orders.read().await;
        Ok(orders.get(&id.0).cloned())
    }

    async fn list_for_caller(
        &self,
        caller_phone: &str,
        limit: u32,
    ) -> Result<Vec<Order>, RepositoryError> {
        let orders = self.orders.read().await;
        let mut matching: Vec<Order> =
            orders.values().filter(|order| order.caller_phone == caller_phone).cloned().collect();
        matching.sort_by(|left, right| right.created_at.cmp(&left.created_at));
        matching.truncate(limit as usize);
        Ok(matching)
    }
}
