use async_trait::async_trait;
use thiserror::Error;

use orderline_core::domain::order::{Order, OrderId};

pub mod memory;
pub mod order;

pub use memory::InMemoryOrderRepository;
pub use order::SqlOrderRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Storage for completed orders.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn save(&self, order: Order) -> Result<OrderId, RepositoryError>;
    async fn find_by_id(&self, id: &OrderId) -> Result<Option<Order>, RepositoryError>;
    /// Most recent orders for a caller, newest first.
    async fn list_for_caller(
        &self,
        caller_phone: &str,
        limit: u32,
    ) -> Result<Vec<Order>, RepositoryError>;
}
