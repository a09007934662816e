use std::collections::{BTreeMap, HashMap};

use chrono::Utc;

use crate::account::{NewUser, User, UserId, DEFAULT_SPIRITUAL_LEVEL};
use crate::catalog::{CatalogItem, Gate, ItemId, NewCatalogItem};
use crate::progression::{JourneyRecord, Progression};
use crate::store::{
    CartItemId, CartLine, CheckoutCommit, NewOrder, Order, OrderId, StoreError, StoreRepository,
    StoreStats,
};

#[derive(Debug, Clone)]
struct CartRow {
    id: CartItemId,
    user_id: UserId,
    item_id: ItemId,
    added_at: chrono::DateTime<Utc>,
}

/// Process-local store for the demo variant and tests. Owned by whoever
/// injects it; there is no shared global state.
#[derive(Debug, Default)]
pub struct MemoryStore {
    items: BTreeMap<ItemId, CatalogItem>,
    users: BTreeMap<UserId, User>,
    journey: BTreeMap<(UserId, Gate), JourneyRecord>,
    cart: Vec<CartRow>,
    orders: Vec<Order>,
    orders_by_payment: HashMap<String, OrderId>,
    next_item: i64,
    next_user: i64,
    next_cart: i64,
    next_order: i64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn bump(counter: &mut i64) -> i64 {
        *counter += 1;
        *counter
    }

    fn user_mut(&mut self, id: UserId) -> Result<&mut User, StoreError> {
        self.users
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("user {}", id)))
    }

    fn ensure_new_payment(&self, reference: &str) -> Result<(), StoreError> {
        if self.orders_by_payment.contains_key(reference) {
            return Err(StoreError::Conflict(format!(
                "order already recorded for payment {}",
                reference
            )));
        }
        Ok(())
    }
}

impl StoreRepository for MemoryStore {
    fn seed_catalog(&mut self, items: &[NewCatalogItem]) -> Result<usize, StoreError> {
        if !self.items.is_empty() {
            return Ok(0);
        }
        for item in items {
            let id = ItemId(Self::bump(&mut self.next_item));
            self.items.insert(id, item.clone().with_id(id));
        }
        Ok(items.len())
    }

    fn list_items(&self) -> Result<Vec<CatalogItem>, StoreError> {
        let mut items: Vec<CatalogItem> = self.items.values().cloned().collect();
        items.sort_by_key(|item| (item.gate.is_none(), item.gate, item.id));
        Ok(items)
    }

    fn get_item(&self, id: ItemId) -> Result<Option<CatalogItem>, StoreError> {
        Ok(self.items.get(&id).cloned())
    }

    fn record_item_view(&mut self, id: ItemId) -> Result<Option<CatalogItem>, StoreError> {
        Ok(self.items.get_mut(&id).map(|item| {
            item.views += 1;
            item.clone()
        }))
    }

    fn user_exists(&self, email: &str, username: &str) -> Result<bool, StoreError> {
        Ok(self
            .users
            .values()
            .any(|user| user.email == email || user.username == username))
    }

    fn create_user(&mut self, user: &NewUser) -> Result<User, StoreError> {
        if self.user_exists(&user.email, &user.username)? {
            return Err(StoreError::Conflict("User already exists".to_string()));
        }
        let id = UserId(Self::bump(&mut self.next_user));
        let created = User {
            id,
            email: user.email.clone(),
            username: user.username.clone(),
            name: user.name.clone(),
            password_hash: user.password_hash.clone(),
            spiritual_level: DEFAULT_SPIRITUAL_LEVEL.to_string(),
            contemplation_streak: 0,
            progression: Progression::default(),
            created_at: Utc::now(),
        };
        self.users.insert(id, created.clone());
        Ok(created)
    }

    fn get_user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        Ok(self.users.get(&id).cloned())
    }

    fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self.users.values().find(|user| user.email == email).cloned())
    }

    fn update_user_progression(
        &mut self,
        id: UserId,
        new_highest: Gate,
        insight_delta: u32,
    ) -> Result<(), StoreError> {
        let progression = &mut self.user_mut(id)?.progression;
        progression.highest_gate_unlocked = progression.highest_gate_unlocked.max(new_highest);
        progression.total_insights = progression.total_insights.saturating_add(insight_delta);
        Ok(())
    }

    fn insert_journey_record_if_absent(
        &mut self,
        record: &JourneyRecord,
    ) -> Result<bool, StoreError> {
        let key = (record.user_id, record.gate);
        if self.journey.contains_key(&key) {
            return Ok(false);
        }
        self.journey.insert(key, record.clone());
        Ok(true)
    }

    fn journey(&self, user_id: UserId) -> Result<Vec<JourneyRecord>, StoreError> {
        Ok(self
            .journey
            .range((user_id, Gate(0))..=(user_id, Gate::MAX))
            .map(|(_, record)| record.clone())
            .collect())
    }

    fn add_cart_item(
        &mut self,
        user_id: UserId,
        item_id: ItemId,
    ) -> Result<Option<CartLine>, StoreError> {
        let Some(item) = self.items.get(&item_id).cloned() else {
            return Err(StoreError::NotFound(format!("artwork {}", item_id)));
        };
        if self
            .cart
            .iter()
            .any(|row| row.user_id == user_id && row.item_id == item_id)
        {
            return Ok(None);
        }
        let row = CartRow {
            id: CartItemId(Self::bump(&mut self.next_cart)),
            user_id,
            item_id,
            added_at: Utc::now(),
        };
        let line = CartLine {
            cart_id: row.id,
            added_at: row.added_at,
            item,
        };
        self.cart.push(row);
        Ok(Some(line))
    }

    fn cart(&self, user_id: UserId) -> Result<Vec<CartLine>, StoreError> {
        let mut lines: Vec<CartLine> = self
            .cart
            .iter()
            .filter(|row| row.user_id == user_id)
            .filter_map(|row| {
                self.items.get(&row.item_id).map(|item| CartLine {
                    cart_id: row.id,
                    added_at: row.added_at,
                    item: item.clone(),
                })
            })
            .collect();
        lines.sort_by(|a, b| (b.added_at, b.cart_id).cmp(&(a.added_at, a.cart_id)));
        Ok(lines)
    }

    fn remove_cart_item(
        &mut self,
        user_id: UserId,
        cart_id: CartItemId,
    ) -> Result<bool, StoreError> {
        let before = self.cart.len();
        self.cart
            .retain(|row| !(row.id == cart_id && row.user_id == user_id));
        Ok(self.cart.len() < before)
    }

    fn clear_cart(&mut self, user_id: UserId) -> Result<usize, StoreError> {
        let before = self.cart.len();
        self.cart.retain(|row| row.user_id != user_id);
        Ok(before - self.cart.len())
    }

    fn insert_order(&mut self, order: &NewOrder) -> Result<Order, StoreError> {
        self.ensure_new_payment(&order.payment_reference)?;
        let id = OrderId(Self::bump(&mut self.next_order));
        let stored = Order::completed(id, order);
        self.orders_by_payment
            .insert(order.payment_reference.clone(), id);
        self.orders.push(stored.clone());
        Ok(stored)
    }

    fn order_by_payment(&self, reference: &str) -> Result<Option<Order>, StoreError> {
        let Some(id) = self.orders_by_payment.get(reference) else {
            return Ok(None);
        };
        Ok(self.orders.iter().find(|order| order.id == *id).cloned())
    }

    fn orders(&self, user_id: UserId) -> Result<Vec<Order>, StoreError> {
        Ok(self
            .orders
            .iter()
            .rev()
            .filter(|order| order.user_id == user_id)
            .cloned()
            .collect())
    }

    fn commit_checkout(&mut self, commit: &CheckoutCommit) -> Result<Order, StoreError> {
        // Every fallible check runs before the first write.
        if !self.users.contains_key(&commit.user_id) {
            return Err(StoreError::NotFound(format!("user {}", commit.user_id)));
        }
        self.ensure_new_payment(&commit.order.payment_reference)?;

        self.update_user_progression(
            commit.user_id,
            commit.new_highest_gate,
            commit.insight_delta,
        )?;
        for record in &commit.journey {
            self.insert_journey_record_if_absent(record)?;
        }
        self.clear_cart(commit.user_id)?;
        self.insert_order(&commit.order)
    }

    fn stats(&self) -> Result<StoreStats, StoreError> {
        Ok(StoreStats {
            users: self.users.len() as i64,
            artworks: self.items.len() as i64,
            orders: self.orders.len() as i64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::catalog::default_catalog;

    fn store_with_user() -> (MemoryStore, User) {
        let mut store = MemoryStore::new();
        store
            .seed_catalog(&default_catalog().unwrap().items)
            .unwrap();
        let user = store
            .create_user(&NewUser {
                email: "ada@example.com".to_string(),
                username: "ada".to_string(),
                name: "Ada".to_string(),
                password_hash: "hash".to_string(),
            })
            .unwrap();
        (store, user)
    }

    #[test]
    fn journey_is_scoped_per_user() {
        let (mut store, user) = store_with_user();
        for (user_id, gate) in [(user.id, 1), (UserId(99), 1), (user.id, 2), (user.id, 2)] {
            store
                .insert_journey_record_if_absent(&JourneyRecord {
                    user_id,
                    gate: Gate(gate),
                    unlocked_at: Utc::now(),
                })
                .unwrap();
        }
        let gates: Vec<Gate> = store
            .journey(user.id)
            .unwrap()
            .into_iter()
            .map(|record| record.gate)
            .collect();
        assert_eq!(gates, vec![Gate(1), Gate(2)]);
    }

    #[test]
    fn rejected_checkout_writes_nothing() {
        let (mut store, user) = store_with_user();
        store.add_cart_item(user.id, ItemId(1)).unwrap();
        let now = Utc::now();
        let order = NewOrder {
            user_id: user.id,
            total_amount: 10,
            payment_method: "simulated".to_string(),
            payment_reference: "pi_dup".to_string(),
            customer_email: user.email.clone(),
            customer_name: user.username.clone(),
            lines: Vec::new(),
            completed_at: now,
        };
        store.insert_order(&order).unwrap();

        let err = store
            .commit_checkout(&CheckoutCommit {
                user_id: user.id,
                new_highest_gate: Gate(2),
                insight_delta: 1,
                journey: vec![JourneyRecord {
                    user_id: user.id,
                    gate: Gate(1),
                    unlocked_at: now,
                }],
                order,
            })
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        let user = store.get_user(user.id).unwrap().unwrap();
        assert_eq!(user.highest_gate_unlocked(), Gate::FIRST);
        assert_eq!(store.cart(user.id).unwrap().len(), 1);
        assert!(store.journey(user.id).unwrap().is_empty());
    }

    #[test]
    fn listing_puts_gateless_items_last() {
        let (store, _) = store_with_user();
        let items = store.list_items().unwrap();
        assert_eq!(items.first().and_then(|item| item.gate), Some(Gate(1)));
        assert!(items.last().unwrap().gate.is_none());
    }
}
