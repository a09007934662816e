//! The shopper-facing service: accounts, gated catalog, cart, payment and
//! checkout over injected collaborators.

pub mod error;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::account::{
    hash_password, validate_registration, verify_password, AuthError, AuthService, NewUser,
    PublicProfile, Registration, User,
};
use crate::catalog::{CatalogItem, Gate, ItemId, NewCatalogItem};
use crate::payment::{
    IntentRequest, OrderLine, PaymentIntent, PaymentProcessor, DEFAULT_CURRENCY,
};
use crate::progression::{annotate, apply_purchase, CatalogListing, JourneyRecord};
use crate::store::{
    CartItemId, CartLine, CheckoutCommit, NewOrder, Order, StoreError, StoreRepository,
};

pub use error::StorefrontError;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub user: PublicProfile,
    pub access_token: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkout {
    pub order: Order,
    pub user: PublicProfile,
    /// True when the payment had already been turned into an order earlier.
    pub replayed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
    pub database: &'static str,
    pub users: i64,
    pub artworks: i64,
    pub orders: i64,
}

pub struct Storefront<P: PaymentProcessor> {
    store: Box<dyn StoreRepository>,
    auth: Box<dyn AuthService>,
    payments: P,
}

impl<P: PaymentProcessor> Storefront<P> {
    pub fn new(store: Box<dyn StoreRepository>, auth: Box<dyn AuthService>, payments: P) -> Self {
        Self {
            store,
            auth,
            payments,
        }
    }

    pub fn payments(&self) -> &P {
        &self.payments
    }

    pub fn payments_mut(&mut self) -> &mut P {
        &mut self.payments
    }

    pub fn seed_catalog(&mut self, items: &[NewCatalogItem]) -> Result<usize, StorefrontError> {
        let added = self.store.seed_catalog(items)?;
        if added > 0 {
            info!(added, "catalog seeded");
        }
        Ok(added)
    }

    pub fn register(&mut self, registration: Registration) -> Result<Session, StorefrontError> {
        validate_registration(&registration).map_err(StorefrontError::InvalidInput)?;
        let email = registration.email.trim();
        let username = registration.username.trim();

        if self.store.user_exists(email, username)? {
            return Err(StorefrontError::Conflict("User already exists".to_string()));
        }

        let password_hash = hash_password(&registration.password)?;
        let user = self.store.create_user(&NewUser {
            email: email.to_string(),
            username: username.to_string(),
            name: registration.name.trim().to_string(),
            password_hash,
        })?;
        info!(user_id = %user.id, username = %user.username, "registered user");
        self.session_for(&user)
    }

    pub fn login(&self, email: &str, password: &str) -> Result<Session, StorefrontError> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return Err(StorefrontError::InvalidInput(
                "Email and password are required".to_string(),
            ));
        }
        let Some(user) = self.store.find_user_by_email(email)? else {
            debug!(email, "login for unknown email");
            return Err(StorefrontError::InvalidCredentials);
        };
        let matches = verify_password(password, &user.password_hash).map_err(|err| {
            warn!(user_id = %user.id, error = %err, "stored password hash rejected");
            err
        })?;
        if !matches {
            warn!(user_id = %user.id, "login with wrong password");
            return Err(StorefrontError::InvalidCredentials);
        }
        self.session_for(&user)
    }

    pub fn profile(&self, token: &str) -> Result<PublicProfile, StorefrontError> {
        Ok(self.authenticate(token)?.profile())
    }

    /// Without a token every item is shown unlocked; with one, items past
    /// the user's frontier are marked locked.
    pub fn catalog(&self, token: Option<&str>) -> Result<Vec<CatalogListing>, StorefrontError> {
        let highest = match token {
            Some(token) => self.authenticate(token)?.highest_gate_unlocked(),
            None => Gate::MAX,
        };
        let items = self.store.list_items()?;
        Ok(annotate(&items, highest))
    }

    pub fn item(&mut self, id: ItemId) -> Result<CatalogItem, StorefrontError> {
        self.store
            .record_item_view(id)?
            .ok_or_else(|| StorefrontError::NotFound(format!("artwork {}", id)))
    }

    pub fn add_to_cart(&mut self, token: &str, item_id: ItemId) -> Result<CartLine, StorefrontError> {
        let user = self.authenticate(token)?;
        let item = self
            .store
            .get_item(item_id)?
            .ok_or_else(|| StorefrontError::NotFound(format!("artwork {}", item_id)))?;
        if !item.is_unlocked_for(user.highest_gate_unlocked()) {
            return Err(StorefrontError::Locked {
                required: item.gate.unwrap_or(Gate::FIRST),
                highest: user.highest_gate_unlocked(),
            });
        }
        self.store
            .add_cart_item(user.id, item_id)?
            .ok_or_else(|| StorefrontError::Conflict("Item already in cart".to_string()))
    }

    pub fn cart(&self, token: &str) -> Result<Vec<CartLine>, StorefrontError> {
        let user = self.authenticate(token)?;
        Ok(self.store.cart(user.id)?)
    }

    /// Removing a line that is not there is not an error.
    pub fn remove_from_cart(
        &mut self,
        token: &str,
        cart_id: CartItemId,
    ) -> Result<bool, StorefrontError> {
        let user = self.authenticate(token)?;
        Ok(self.store.remove_cart_item(user.id, cart_id)?)
    }

    /// Opens a payment for everything currently in the cart.
    pub fn create_payment(&mut self, token: &str) -> Result<PaymentIntent, StorefrontError> {
        let user = self.authenticate(token)?;
        let lines: Vec<OrderLine> = self
            .store
            .cart(user.id)?
            .iter()
            .map(|line| OrderLine::from(&line.item))
            .collect();
        if lines.is_empty() {
            return Err(StorefrontError::InvalidInput("No items provided".to_string()));
        }
        let intent = self.payments.create_intent(IntentRequest {
            user_id: user.id,
            currency: DEFAULT_CURRENCY.to_string(),
            lines,
        })?;
        info!(
            user_id = %user.id,
            reference = %intent.reference,
            amount = intent.amount,
            "payment intent created"
        );
        Ok(intent)
    }

    /// Turns a succeeded payment into an order and advances the buyer's
    /// progression. Confirming the same payment again returns the existing
    /// order without writing anything.
    pub fn confirm_payment(
        &mut self,
        token: &str,
        reference: &str,
    ) -> Result<Checkout, StorefrontError> {
        let user = self.authenticate(token)?;
        let confirmation = self.payments.confirm(reference)?;
        if confirmation.user_id != user.id {
            warn!(user_id = %user.id, reference, "payment belongs to another user");
            return Err(StorefrontError::Forbidden(
                "payment belongs to another account".to_string(),
            ));
        }
        if !confirmation.succeeded() {
            warn!(
                user_id = %user.id,
                reference,
                status = confirmation.status.as_str(),
                "payment not completed"
            );
            return Err(StorefrontError::PaymentNotCompleted);
        }
        if let Some(order) = self.store.order_by_payment(reference)? {
            return self.replayed(&user, order);
        }

        let now = Utc::now();
        let outcome = apply_purchase(
            user.id,
            &user.progression,
            &confirmation.purchased_gates(),
            now,
        );
        let commit = CheckoutCommit {
            user_id: user.id,
            new_highest_gate: outcome.progression.highest_gate_unlocked,
            insight_delta: outcome.insight_delta,
            journey: outcome.journey,
            order: NewOrder {
                user_id: user.id,
                total_amount: confirmation.amount,
                payment_method: self.payments.name().to_string(),
                payment_reference: confirmation.reference.clone(),
                customer_email: user.email.clone(),
                customer_name: user.username.clone(),
                lines: confirmation.lines,
                completed_at: now,
            },
        };

        let order = match self.store.commit_checkout(&commit) {
            Ok(order) => order,
            Err(StoreError::Conflict(_)) => {
                // A concurrent confirmation won; report its order.
                let order = self.store.order_by_payment(reference)?.ok_or_else(|| {
                    StorefrontError::NotFound(format!("order for payment {}", reference))
                })?;
                return self.replayed(&user, order);
            }
            Err(err) => return Err(err.into()),
        };

        let user = self.reload(&user)?;
        info!(
            user_id = %user.id,
            order_id = order.id.0,
            highest_gate = %user.highest_gate_unlocked(),
            "checkout committed"
        );
        Ok(Checkout {
            order,
            user: user.profile(),
            replayed: false,
        })
    }

    pub fn orders(&self, token: &str) -> Result<Vec<Order>, StorefrontError> {
        let user = self.authenticate(token)?;
        Ok(self.store.orders(user.id)?)
    }

    pub fn journey(&self, token: &str) -> Result<Vec<JourneyRecord>, StorefrontError> {
        let user = self.authenticate(token)?;
        Ok(self.store.journey(user.id)?)
    }

    pub fn health(&self) -> Result<HealthReport, StorefrontError> {
        let stats = self.store.stats()?;
        Ok(HealthReport {
            status: "healthy",
            timestamp: Utc::now(),
            database: "connected",
            users: stats.users,
            artworks: stats.artworks,
            orders: stats.orders,
        })
    }

    fn session_for(&self, user: &User) -> Result<Session, StorefrontError> {
        Ok(Session {
            user: user.profile(),
            access_token: self.auth.issue(user)?,
        })
    }

    fn authenticate(&self, token: &str) -> Result<User, StorefrontError> {
        let who = self.auth.verify(token)?;
        self.store
            .get_user(who.user_id)?
            .ok_or(StorefrontError::Unauthorized(AuthError::InvalidToken))
    }

    fn reload(&self, user: &User) -> Result<User, StorefrontError> {
        self.store
            .get_user(user.id)?
            .ok_or_else(|| StorefrontError::NotFound(format!("user {}", user.id)))
    }

    fn replayed(&self, user: &User, order: Order) -> Result<Checkout, StorefrontError> {
        debug!(user_id = %user.id, order_id = order.id.0, "payment already fulfilled");
        Ok(Checkout {
            order,
            user: self.reload(user)?.profile(),
            replayed: true,
        })
    }
}
