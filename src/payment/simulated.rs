use std::collections::HashMap;

use tracing::debug;
use uuid::Uuid;

use crate::payment::{
    IntentRequest, PaymentConfirmation, PaymentError, PaymentIntent, PaymentProcessor,
    PaymentStatus,
};

/// How the in-process provider settles new intents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    /// Intents succeed as soon as they are created.
    Immediate,
    /// Intents wait for `settle`.
    Manual,
}

#[derive(Debug, Clone)]
struct SimulatedIntent {
    request: IntentRequest,
    amount: i64,
    status: PaymentStatus,
}

/// Stand-in for a card processor, holding intents in memory.
#[derive(Debug)]
pub struct SimulatedPayments {
    settlement: Settlement,
    intents: HashMap<String, SimulatedIntent>,
}

impl SimulatedPayments {
    pub fn new(settlement: Settlement) -> Self {
        Self {
            settlement,
            intents: HashMap::new(),
        }
    }

    /// Reports the provider-side outcome for a pending intent.
    pub fn settle(&mut self, reference: &str, succeeded: bool) -> Result<(), PaymentError> {
        let intent = self
            .intents
            .get_mut(reference)
            .ok_or_else(|| PaymentError::UnknownReference(reference.to_string()))?;
        intent.status = if succeeded {
            PaymentStatus::Succeeded
        } else {
            PaymentStatus::Failed
        };
        debug!(reference, status = intent.status.as_str(), "simulated payment settled");
        Ok(())
    }

    pub fn pending(&self) -> Vec<String> {
        let mut refs: Vec<String> = self
            .intents
            .iter()
            .filter(|(_, intent)| intent.status == PaymentStatus::RequiresPayment)
            .map(|(reference, _)| reference.clone())
            .collect();
        refs.sort();
        refs
    }
}

impl Default for SimulatedPayments {
    fn default() -> Self {
        Self::new(Settlement::Immediate)
    }
}

impl PaymentProcessor for SimulatedPayments {
    fn name(&self) -> &str {
        "simulated"
    }

    fn create_intent(&mut self, request: IntentRequest) -> Result<PaymentIntent, PaymentError> {
        if request.lines.is_empty() {
            return Err(PaymentError::EmptyIntent);
        }
        let reference = format!("pi_{}", Uuid::new_v4().simple());
        let client_secret = format!("{}_secret_{}", reference, Uuid::new_v4().simple());
        let amount = request.amount();
        let status = match self.settlement {
            Settlement::Immediate => PaymentStatus::Succeeded,
            Settlement::Manual => PaymentStatus::RequiresPayment,
        };
        let intent = PaymentIntent {
            reference: reference.clone(),
            client_secret,
            amount,
            currency: request.currency.clone(),
        };
        self.intents.insert(
            reference,
            SimulatedIntent {
                request,
                amount,
                status,
            },
        );
        Ok(intent)
    }

    fn confirm(&self, reference: &str) -> Result<PaymentConfirmation, PaymentError> {
        let intent = self
            .intents
            .get(reference)
            .ok_or_else(|| PaymentError::UnknownReference(reference.to_string()))?;
        Ok(PaymentConfirmation {
            reference: reference.to_string(),
            status: intent.status,
            amount: intent.amount,
            user_id: intent.request.user_id,
            lines: intent.request.lines.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::UserId;
    use crate::catalog::{Gate, ItemId};
    use crate::payment::{OrderLine, DEFAULT_CURRENCY};

    fn request() -> IntentRequest {
        IntentRequest {
            user_id: UserId(1),
            currency: DEFAULT_CURRENCY.to_string(),
            lines: vec![
                OrderLine {
                    id: ItemId(1),
                    title: "a".to_string(),
                    price: 1500,
                    gate: Some(Gate(1)),
                },
                OrderLine {
                    id: ItemId(2),
                    title: "b".to_string(),
                    price: 500,
                    gate: None,
                },
            ],
        }
    }

    #[test]
    fn manual_intents_wait_for_settlement() {
        let mut payments = SimulatedPayments::new(Settlement::Manual);
        let intent = payments.create_intent(request()).unwrap();
        assert_eq!(intent.amount, 2000);
        assert!(!payments.confirm(&intent.reference).unwrap().succeeded());
        assert_eq!(payments.pending(), vec![intent.reference.clone()]);

        payments.settle(&intent.reference, true).unwrap();
        let confirmation = payments.confirm(&intent.reference).unwrap();
        assert!(confirmation.succeeded());
        assert_eq!(confirmation.purchased_gates(), vec![Some(Gate(1)), None]);
    }

    #[test]
    fn empty_intents_are_refused() {
        let mut payments = SimulatedPayments::default();
        let mut req = request();
        req.lines.clear();
        assert_eq!(payments.create_intent(req), Err(PaymentError::EmptyIntent));
    }

    #[test]
    fn unknown_reference() {
        let payments = SimulatedPayments::default();
        assert!(matches!(
            payments.confirm("pi_missing"),
            Err(PaymentError::UnknownReference(_))
        ));
    }
}
