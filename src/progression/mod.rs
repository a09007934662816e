//! Gate progression: which catalog items a user may buy, and how a paid
//! order moves that user's frontier forward.
//!
//! Both entry points are pure. Persisting the outcome (frontier, journey
//! records, cart clear, order) as one unit is the caller's job.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::account::UserId;
use crate::catalog::{CatalogItem, Gate};

/// Per-user unlock state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Progression {
    pub highest_gate_unlocked: Gate,
    pub total_insights: u32,
}

impl Default for Progression {
    fn default() -> Self {
        Self {
            highest_gate_unlocked: Gate::FIRST,
            total_insights: 0,
        }
    }
}

/// "User U unlocked gate G at time T". At most one per (user, gate).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JourneyRecord {
    pub user_id: UserId,
    pub gate: Gate,
    pub unlocked_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogListing {
    #[serde(flatten)]
    pub item: CatalogItem,
    pub unlocked: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PurchaseOutcome {
    pub progression: Progression,
    /// Distinct purchased gates, ascending. Stores insert these if absent.
    pub journey: Vec<JourneyRecord>,
    pub insight_delta: u32,
}

impl PurchaseOutcome {
    pub fn is_noop(&self) -> bool {
        self.journey.is_empty()
    }
}

/// Marks each item unlocked when its gate is at or below the frontier.
/// Pass `Gate::MAX` for anonymous browsing.
pub fn annotate(catalog: &[CatalogItem], highest_gate_unlocked: Gate) -> Vec<CatalogListing> {
    catalog
        .iter()
        .map(|item| CatalogListing {
            unlocked: item.is_unlocked_for(highest_gate_unlocked),
            item: item.clone(),
        })
        .collect()
}

/// Completing gate G opens everything through G + 1. Items without a gate
/// do not take part; a purchase with no gated items changes nothing.
pub fn apply_purchase(
    user_id: UserId,
    current: &Progression,
    purchased_gates: &[Option<Gate>],
    at: DateTime<Utc>,
) -> PurchaseOutcome {
    let gates: BTreeSet<Gate> = purchased_gates.iter().flatten().copied().collect();
    let Some(max_purchased) = gates.last().copied() else {
        return PurchaseOutcome {
            progression: *current,
            journey: Vec::new(),
            insight_delta: 0,
        };
    };

    let insight_delta = gates.len() as u32;
    let progression = Progression {
        highest_gate_unlocked: current.highest_gate_unlocked.max(max_purchased.next()),
        total_insights: current.total_insights.saturating_add(insight_delta),
    };
    let journey = gates
        .into_iter()
        .map(|gate| JourneyRecord {
            user_id,
            gate,
            unlocked_at: at,
        })
        .collect();

    PurchaseOutcome {
        progression,
        journey,
        insight_delta,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ItemId, NewCatalogItem};
    use std::collections::BTreeMap;

    fn item(id: i64, gate: Option<u32>) -> CatalogItem {
        NewCatalogItem {
            title: format!("item {id}"),
            artist: "artist".to_string(),
            price: 1000,
            category: "c".to_string(),
            gate: gate.map(Gate),
            gate_title: None,
            image: String::new(),
            description: String::new(),
            philosophical_context: None,
            tags: Vec::new(),
            emotions: Vec::new(),
            likes: 0,
            views: 0,
            trending: false,
            unlock_requirement: gate.map(Gate),
        }
        .with_id(ItemId(id))
    }

    fn at(highest: u32) -> Progression {
        Progression {
            highest_gate_unlocked: Gate(highest),
            total_insights: 0,
        }
    }

    #[test]
    fn annotate_compares_gate_with_frontier() {
        let catalog: Vec<CatalogItem> = (1..=14).map(|g| item(g as i64, Some(g))).collect();
        for highest in [1, 3, 14] {
            for listing in annotate(&catalog, Gate(highest)) {
                let gate = listing.item.gate.unwrap();
                assert_eq!(listing.unlocked, gate <= Gate(highest));
            }
        }
    }

    #[test]
    fn annotate_ignores_a_mismatched_requirement() {
        let mut lenient = item(1, Some(5));
        lenient.unlock_requirement = Some(Gate(2));
        let listing = &annotate(&[lenient], Gate(2))[0];
        assert!(!listing.unlocked);
    }

    #[test]
    fn anonymous_view_unlocks_everything() {
        let catalog = vec![item(1, Some(1)), item(2, Some(14)), item(3, None)];
        assert!(annotate(&catalog, Gate::MAX).iter().all(|l| l.unlocked));
    }

    #[test]
    fn gateless_items_are_always_open() {
        let catalog = vec![item(1, None)];
        assert!(annotate(&catalog, Gate::FIRST)[0].unlocked);
    }

    #[test]
    fn empty_purchase_is_a_noop() {
        let current = at(4);
        let outcome = apply_purchase(UserId(1), &current, &[], Utc::now());
        assert!(outcome.is_noop());
        assert_eq!(outcome.progression, current);
        assert_eq!(outcome.insight_delta, 0);

        let gateless = apply_purchase(UserId(1), &current, &[None, None], Utc::now());
        assert!(gateless.is_noop());
        assert_eq!(gateless.progression, current);
    }

    #[test]
    fn completing_gate_opens_the_next() {
        let outcome = apply_purchase(UserId(1), &at(1), &[Some(Gate(1))], Utc::now());
        assert_eq!(outcome.progression.highest_gate_unlocked, Gate(2));
        assert_eq!(outcome.progression.total_insights, 1);
    }

    #[test]
    fn rebuying_an_owned_gate_does_not_move_frontier() {
        let outcome = apply_purchase(UserId(1), &at(3), &[Some(Gate(2))], Utc::now());
        assert_eq!(outcome.progression.highest_gate_unlocked, Gate(3));
        assert_eq!(outcome.journey.len(), 1);
    }

    #[test]
    fn purchase_ahead_of_frontier_jumps() {
        let outcome = apply_purchase(UserId(1), &at(5), &[Some(Gate(7))], Utc::now());
        assert_eq!(outcome.progression.highest_gate_unlocked, Gate(8));
    }

    #[test]
    fn duplicate_gates_count_once() {
        let outcome = apply_purchase(
            UserId(1),
            &at(1),
            &[Some(Gate(2)), Some(Gate(1)), Some(Gate(2)), None],
            Utc::now(),
        );
        let gates: Vec<Gate> = outcome.journey.iter().map(|r| r.gate).collect();
        assert_eq!(gates, vec![Gate(1), Gate(2)]);
        assert_eq!(outcome.insight_delta, 2);
        assert_eq!(outcome.progression.highest_gate_unlocked, Gate(3));
    }

    #[test]
    fn repeated_purchase_yields_one_record_per_gate() {
        let mut journal: BTreeMap<(UserId, Gate), JourneyRecord> = BTreeMap::new();
        let mut state = Progression::default();
        for _ in 0..2 {
            let outcome = apply_purchase(UserId(9), &state, &[Some(Gate(1))], Utc::now());
            for record in outcome.journey {
                journal.entry((record.user_id, record.gate)).or_insert(record);
            }
            state = outcome.progression;
        }
        assert_eq!(journal.len(), 1);
        assert_eq!(state.highest_gate_unlocked, Gate(2));
    }

    #[test]
    fn frontier_never_decreases() {
        let purchases: [&[Option<Gate>]; 7] = [
            &[Some(Gate(1))],
            &[Some(Gate(6))],
            &[Some(Gate(2))],
            &[],
            &[None],
            &[Some(Gate(3)), Some(Gate(4))],
            &[Some(Gate(14))],
        ];
        let mut state = Progression::default();
        for purchase in purchases {
            let next = apply_purchase(UserId(1), &state, purchase, Utc::now()).progression;
            assert!(next.highest_gate_unlocked >= state.highest_gate_unlocked);
            assert!(next.total_insights >= state.total_insights);
            state = next;
        }
        assert_eq!(state.highest_gate_unlocked, Gate(15));
    }
}
