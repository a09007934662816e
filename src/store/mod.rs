pub mod memory;
pub mod repository;
pub mod sqlite;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::account::UserId;
use crate::catalog::{CatalogItem, Gate};
use crate::payment::OrderLine;
use crate::progression::JourneyRecord;

pub use memory::MemoryStore;
pub use repository::StoreRepository;
pub use sqlite::SqliteStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("{0}")]
    InvalidData(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CartItemId(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub i64);

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub cart_id: CartItemId,
    pub added_at: DateTime<Utc>,
    pub item: CatalogItem,
}

pub const ORDER_STATUS_COMPLETED: &str = "completed";

#[derive(Debug, Clone, PartialEq)]
pub struct NewOrder {
    pub user_id: UserId,
    pub total_amount: i64,
    pub payment_method: String,
    pub payment_reference: String,
    pub customer_email: String,
    pub customer_name: String,
    pub lines: Vec<OrderLine>,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub status: String,
    pub total_amount: i64,
    pub payment_method: String,
    pub payment_status: String,
    pub payment_reference: String,
    pub customer_email: String,
    pub customer_name: String,
    pub lines: Vec<OrderLine>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Order {
    fn completed(id: OrderId, new: &NewOrder) -> Self {
        Self {
            id,
            user_id: new.user_id,
            status: ORDER_STATUS_COMPLETED.to_string(),
            total_amount: new.total_amount,
            payment_method: new.payment_method.clone(),
            payment_status: ORDER_STATUS_COMPLETED.to_string(),
            payment_reference: new.payment_reference.clone(),
            customer_email: new.customer_email.clone(),
            customer_name: new.customer_name.clone(),
            lines: new.lines.clone(),
            created_at: new.completed_at,
            completed_at: Some(new.completed_at),
        }
    }
}

/// Everything a confirmed payment writes. Stores apply it all or nothing.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutCommit {
    pub user_id: UserId,
    pub new_highest_gate: Gate,
    pub insight_delta: u32,
    pub journey: Vec<JourneyRecord>,
    pub order: NewOrder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub users: i64,
    pub artworks: i64,
    pub orders: i64,
}
