//! Voice-agent tool layer.
//!
//! The voice platform calls named tools with loosely shaped JSON arguments.
//! This crate decodes those arguments, runs the matching order operation
//! against the caller's session and returns a flat result record. Placing an
//! order persists it through `orderline-db` and sends a text confirmation.
//!
//! Tools never decide prices or menu rules; those come from `orderline-core`.

pub mod args;
pub mod notify;
pub mod orders;
pub mod receipt;
pub mod tools;

pub use args::{normalize_changes, EditPayload, ToolArgs};
pub use notify::{notifier_from_config, HttpNotifier, LogNotifier, Notifier, NotifyError};
pub use orders::{OrderService, PlacedOrder};
pub use receipt::ReceiptRenderer;
pub use tools::{Tool, ToolContext, ToolRegistry, ToolResult};
