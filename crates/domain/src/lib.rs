pub mod entities;
pub mod item_query_builder;
pub mod repositories;

pub use entities::*;
pub use item_query_builder::*;
pub use marketplace_errors::{MarketplaceError, MarketplaceResult};
pub use repositories::*;
