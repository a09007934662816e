pub mod item;

pub use item::{CatalogItem, Gate, ItemId, NewCatalogItem};
