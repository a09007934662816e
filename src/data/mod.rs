pub mod catalog;

pub use catalog::{default_catalog, load_catalog, CatalogDataError, CatalogFile};
