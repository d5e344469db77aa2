//! Domain model: catalog resolution, orders, best-seller ranking
pub mod best_sellers;
pub mod cart;
pub mod catalog;
pub mod events;
pub mod order;
pub mod product;

pub use catalog::{Catalog, CatalogError, Quote, Selection, StockError};
pub use order::{Order, OrderError, OrderItem, OrderStatus};
pub use product::Product;
