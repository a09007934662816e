use crate::account::{NewUser, User, UserId};
use crate::catalog::{CatalogItem, Gate, ItemId, NewCatalogItem};
use crate::progression::JourneyRecord;
use crate::store::{
    CartItemId, CartLine, CheckoutCommit, NewOrder, Order, StoreError, StoreStats,
};

/// Durable tables behind the storefront: users, items, cart, orders and the
/// journey log.
///
/// Progression writes are monotone: `update_user_progression` keeps the
/// larger of the stored and the offered frontier, so racing checkouts
/// cannot move a user backwards.
pub trait StoreRepository {
    /// Inserts `items` only when the catalog is empty. Returns how many were added.
    fn seed_catalog(&mut self, items: &[NewCatalogItem]) -> Result<usize, StoreError>;
    /// Ordered by gate, gateless items last.
    fn list_items(&self) -> Result<Vec<CatalogItem>, StoreError>;
    fn get_item(&self, id: ItemId) -> Result<Option<CatalogItem>, StoreError>;
    /// Bumps the view counter and returns the updated item.
    fn record_item_view(&mut self, id: ItemId) -> Result<Option<CatalogItem>, StoreError>;

    fn user_exists(&self, email: &str, username: &str) -> Result<bool, StoreError>;
    fn create_user(&mut self, user: &NewUser) -> Result<User, StoreError>;
    fn get_user(&self, id: UserId) -> Result<Option<User>, StoreError>;
    fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    fn update_user_progression(
        &mut self,
        id: UserId,
        new_highest: Gate,
        insight_delta: u32,
    ) -> Result<(), StoreError>;

    /// Returns `false` when the (user, gate) record already exists.
    fn insert_journey_record_if_absent(
        &mut self,
        record: &JourneyRecord,
    ) -> Result<bool, StoreError>;
    fn journey(&self, user_id: UserId) -> Result<Vec<JourneyRecord>, StoreError>;

    /// `None` when the item is already in the user's cart.
    fn add_cart_item(
        &mut self,
        user_id: UserId,
        item_id: ItemId,
    ) -> Result<Option<CartLine>, StoreError>;
    /// Newest first.
    fn cart(&self, user_id: UserId) -> Result<Vec<CartLine>, StoreError>;
    fn remove_cart_item(
        &mut self,
        user_id: UserId,
        cart_id: CartItemId,
    ) -> Result<bool, StoreError>;
    fn clear_cart(&mut self, user_id: UserId) -> Result<usize, StoreError>;

    fn insert_order(&mut self, order: &NewOrder) -> Result<Order, StoreError>;
    fn order_by_payment(&self, reference: &str) -> Result<Option<Order>, StoreError>;
    /// Newest first.
    fn orders(&self, user_id: UserId) -> Result<Vec<Order>, StoreError>;

    /// Progression update, journey inserts, cart clear and order insert as
    /// one unit. On error nothing has been written.
    fn commit_checkout(&mut self, commit: &CheckoutCommit) -> Result<Order, StoreError>;

    fn stats(&self) -> Result<StoreStats, StoreError>;
}
