// Library surface for the storefront binary and integration tests
pub mod account;
pub mod catalog;
pub mod config;
pub mod data;
pub mod payment;
pub mod progression;
pub mod store;
pub mod storefront;

// The two progression entry points and the service most callers need
pub use crate::progression::{annotate, apply_purchase, CatalogListing, Progression};
pub use crate::storefront::{Storefront, StorefrontError};
