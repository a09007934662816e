pub mod simulated;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::account::UserId;
use crate::catalog::{CatalogItem, Gate, ItemId};

pub use simulated::{Settlement, SimulatedPayments};

pub const DEFAULT_CURRENCY: &str = "usd";

/// One purchased item as remembered by the payment provider and the order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub id: ItemId,
    pub title: String,
    pub price: i64,
    #[serde(default)]
    pub gate: Option<Gate>,
}

impl From<&CatalogItem> for OrderLine {
    fn from(item: &CatalogItem) -> Self {
        Self {
            id: item.id,
            title: item.title.clone(),
            price: item.price,
            gate: item.gate,
        }
    }
}

#[derive(Debug, Clone)]
pub struct IntentRequest {
    pub user_id: UserId,
    pub currency: String,
    pub lines: Vec<OrderLine>,
}

impl IntentRequest {
    pub fn amount(&self) -> i64 {
        self.lines.iter().map(|line| line.price).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntent {
    pub reference: String,
    pub client_secret: String,
    pub amount: i64,
    pub currency: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    RequiresPayment,
    Succeeded,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentStatus::RequiresPayment => "requires_payment",
            PaymentStatus::Succeeded => "succeeded",
            PaymentStatus::Failed => "failed",
        }
    }
}

/// What the provider reports back for a payment reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentConfirmation {
    pub reference: String,
    pub status: PaymentStatus,
    pub amount: i64,
    pub user_id: UserId,
    pub lines: Vec<OrderLine>,
}

impl PaymentConfirmation {
    pub fn succeeded(&self) -> bool {
        self.status == PaymentStatus::Succeeded
    }

    pub fn purchased_gates(&self) -> Vec<Option<Gate>> {
        self.lines.iter().map(|line| line.gate).collect()
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PaymentError {
    #[error("No items provided")]
    EmptyIntent,
    #[error("unknown payment reference {0}")]
    UnknownReference(String),
    #[error("payment provider error: {0}")]
    Provider(String),
}

/// The external collector of money. Confirmation may be asked for repeatedly.
pub trait PaymentProcessor {
    fn name(&self) -> &str;
    fn create_intent(&mut self, request: IntentRequest) -> Result<PaymentIntent, PaymentError>;
    fn confirm(&self, reference: &str) -> Result<PaymentConfirmation, PaymentError>;
}
