pub mod cart;
pub mod config;
pub mod domain;
pub mod engine;
pub mod errors;
pub mod menu;
pub mod parser;
pub mod pricing;
pub mod session;

pub use cart::{
    BatchItem, BatchItemResult, BatchOutcome, BuilderState, Cart, ConvertOutcome, ItemBuilder,
    MealOptions, OrderLimits,
};
pub use domain::fields::{FieldChanges, FieldValue, ItemField};
pub use domain::item::{CartItem, ItemDraft};
pub use domain::order::{Order, OrderId, OrderLine};
pub use engine::{AddedItem, OrderEngine};
pub use errors::{ApplicationError, ErrorKind, InterfaceError, OrderError};
pub use menu::{BusinessProfile, Category, ComboMatch, ComboRule, MenuCatalog, MenuError};
pub use parser::TextParser;
pub use pricing::{
    AppliedCombo, CartPricing, DeterministicPricingEngine, PricedLine, PricingEngine,
};
pub use session::{OrderSession, RateLimiter, SessionKey, SessionPolicy, SessionStore};
