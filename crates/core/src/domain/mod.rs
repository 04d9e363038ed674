pub mod fields;
pub mod item;
pub mod order;

pub use fields::{FieldChanges, FieldValue, ItemField};
pub use item::{CartItem, ItemDraft};
pub use order::{Order, OrderId, OrderLine};
