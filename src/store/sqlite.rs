use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row, TransactionBehavior};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::account::{NewUser, User, UserId, DEFAULT_SPIRITUAL_LEVEL};
use crate::catalog::{CatalogItem, Gate, ItemId, NewCatalogItem};
use crate::progression::{JourneyRecord, Progression};
use crate::store::{
    CartItemId, CartLine, CheckoutCommit, NewOrder, Order, OrderId, StoreError, StoreRepository,
    StoreStats,
};

const MARKET_SCHEMA_VERSION: i64 = 1;

const MARKET_DB_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS market_meta (
  id INTEGER PRIMARY KEY CHECK (id = 1),
  schema_version INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS users (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  email TEXT NOT NULL UNIQUE,
  username TEXT NOT NULL UNIQUE,
  name TEXT NOT NULL,
  password_hash TEXT NOT NULL,
  spiritual_level TEXT NOT NULL,
  contemplation_streak INTEGER NOT NULL DEFAULT 0,
  total_insights INTEGER NOT NULL DEFAULT 0,
  highest_gate_unlocked INTEGER NOT NULL DEFAULT 1,
  created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS artworks (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  title TEXT NOT NULL,
  artist TEXT NOT NULL,
  price INTEGER NOT NULL,
  category TEXT NOT NULL,
  gate INTEGER,
  gate_title TEXT,
  image TEXT NOT NULL,
  description TEXT NOT NULL,
  philosophical_context TEXT,
  tags TEXT NOT NULL,
  emotions TEXT NOT NULL,
  likes INTEGER NOT NULL DEFAULT 0,
  views INTEGER NOT NULL DEFAULT 0,
  trending INTEGER NOT NULL DEFAULT 0,
  unlock_requirement INTEGER
);

CREATE TABLE IF NOT EXISTS journey_records (
  user_id INTEGER NOT NULL,
  gate INTEGER NOT NULL,
  unlocked_at TEXT NOT NULL,
  PRIMARY KEY (user_id, gate)
);

CREATE TABLE IF NOT EXISTS cart_items (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  user_id INTEGER NOT NULL,
  artwork_id INTEGER NOT NULL,
  created_at TEXT NOT NULL,
  UNIQUE (user_id, artwork_id)
);

CREATE TABLE IF NOT EXISTS orders (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  user_id INTEGER NOT NULL,
  status TEXT NOT NULL,
  total_amount INTEGER NOT NULL,
  payment_method TEXT NOT NULL,
  payment_status TEXT NOT NULL,
  payment_id TEXT NOT NULL UNIQUE,
  customer_email TEXT NOT NULL,
  customer_name TEXT NOT NULL,
  items TEXT NOT NULL,
  created_at TEXT NOT NULL,
  completed_at TEXT
);
"#;

const ARTWORK_COLUMNS: &str = "a.id, a.title, a.artist, a.price, a.category, a.gate, a.gate_title, \
     a.image, a.description, a.philosophical_context, a.tags, a.emotions, a.likes, a.views, \
     a.trending, a.unlock_requirement";

const USER_COLUMNS: &str = "id, email, username, name, password_hash, spiritual_level, \
     contemplation_streak, total_insights, highest_gate_unlocked, created_at";

const ORDER_COLUMNS: &str = "id, user_id, status, total_amount, payment_method, payment_status, \
     payment_id, customer_email, customer_name, items, created_at, completed_at";

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        let mut store = Self { conn };
        store.conn.execute_batch(MARKET_DB_SCHEMA)?;
        store.ensure_market_meta()?;
        Ok(store)
    }

    fn ensure_market_meta(&mut self) -> Result<(), StoreError> {
        let version = self
            .conn
            .query_row(
                "SELECT schema_version FROM market_meta WHERE id = 1",
                [],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;

        match version {
            Some(MARKET_SCHEMA_VERSION) => Ok(()),
            Some(other) => Err(StoreError::InvalidData(format!(
                "market_meta version mismatch (schema {}, expected {})",
                other, MARKET_SCHEMA_VERSION
            ))),
            None => {
                self.conn.execute(
                    "INSERT INTO market_meta (id, schema_version) VALUES (1, ?1)",
                    params![MARKET_SCHEMA_VERSION],
                )?;
                Ok(())
            }
        }
    }
}

impl StoreRepository for SqliteStore {
    fn seed_catalog(&mut self, items: &[NewCatalogItem]) -> Result<usize, StoreError> {
        let tx = self.conn.transaction()?;
        if count_rows(&tx, "artworks")? > 0 {
            return Ok(0);
        }
        for item in items {
            tx.execute(
                "INSERT INTO artworks (title, artist, price, category, gate, gate_title, image, description, philosophical_context, tags, emotions, likes, views, trending, unlock_requirement) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
                params![
                    item.title,
                    item.artist,
                    item.price,
                    item.category,
                    item.gate.map(|gate| gate.0),
                    item.gate_title,
                    item.image,
                    item.description,
                    item.philosophical_context,
                    serde_json::to_string(&item.tags)?,
                    serde_json::to_string(&item.emotions)?,
                    item.likes,
                    item.views,
                    item.trending,
                    item.unlock_requirement.map(|gate| gate.0),
                ],
            )?;
        }
        tx.commit()?;
        debug!(count = items.len(), "seeded catalog");
        Ok(items.len())
    }

    fn list_items(&self) -> Result<Vec<CatalogItem>, StoreError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ARTWORK_COLUMNS} FROM artworks a ORDER BY a.gate IS NULL, a.gate, a.id"
        ))?;
        let rows = stmt.query_map([], |row| artwork_from_row(row, 0))?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn get_item(&self, id: ItemId) -> Result<Option<CatalogItem>, StoreError> {
        get_item(&self.conn, id)
    }

    fn record_item_view(&mut self, id: ItemId) -> Result<Option<CatalogItem>, StoreError> {
        self.conn.execute(
            "UPDATE artworks SET views = views + 1 WHERE id = ?1",
            params![id.0],
        )?;
        get_item(&self.conn, id)
    }

    fn user_exists(&self, email: &str, username: &str) -> Result<bool, StoreError> {
        let found = self
            .conn
            .query_row(
                "SELECT id FROM users WHERE email = ?1 OR username = ?2",
                params![email, username],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn create_user(&mut self, user: &NewUser) -> Result<User, StoreError> {
        let inserted = self.conn.execute(
            "INSERT INTO users (email, username, name, password_hash, spiritual_level, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                user.email,
                user.username,
                user.name,
                user.password_hash,
                DEFAULT_SPIRITUAL_LEVEL,
                Utc::now(),
            ],
        );
        inserted.map_err(|err| conflict_or(err, "User already exists"))?;
        let id = UserId(self.conn.last_insert_rowid());
        get_user(&self.conn, id)?.ok_or_else(|| StoreError::NotFound(format!("user {}", id)))
    }

    fn get_user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        get_user(&self.conn, id)
    }

    fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
                params![email],
                user_from_row,
            )
            .optional()?)
    }

    fn update_user_progression(
        &mut self,
        id: UserId,
        new_highest: Gate,
        insight_delta: u32,
    ) -> Result<(), StoreError> {
        update_user_progression(&self.conn, id, new_highest, insight_delta)
    }

    fn insert_journey_record_if_absent(
        &mut self,
        record: &JourneyRecord,
    ) -> Result<bool, StoreError> {
        insert_journey_record_if_absent(&self.conn, record)
    }

    fn journey(&self, user_id: UserId) -> Result<Vec<JourneyRecord>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT user_id, gate, unlocked_at FROM journey_records WHERE user_id = ?1 ORDER BY gate",
        )?;
        let rows = stmt.query_map(params![user_id.0], |row| {
            Ok(JourneyRecord {
                user_id: UserId(row.get(0)?),
                gate: Gate(row.get(1)?),
                unlocked_at: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn add_cart_item(
        &mut self,
        user_id: UserId,
        item_id: ItemId,
    ) -> Result<Option<CartLine>, StoreError> {
        let Some(item) = get_item(&self.conn, item_id)? else {
            return Err(StoreError::NotFound(format!("artwork {}", item_id)));
        };
        let added_at = Utc::now();
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO cart_items (user_id, artwork_id, created_at) VALUES (?1, ?2, ?3)",
            params![user_id.0, item_id.0, added_at],
        )?;
        if inserted == 0 {
            return Ok(None);
        }
        Ok(Some(CartLine {
            cart_id: CartItemId(self.conn.last_insert_rowid()),
            added_at,
            item,
        }))
    }

    fn cart(&self, user_id: UserId) -> Result<Vec<CartLine>, StoreError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ARTWORK_COLUMNS}, c.id, c.created_at \
             FROM cart_items c JOIN artworks a ON c.artwork_id = a.id \
             WHERE c.user_id = ?1 ORDER BY c.created_at DESC, c.id DESC"
        ))?;
        let rows = stmt.query_map(params![user_id.0], |row| {
            Ok(CartLine {
                item: artwork_from_row(row, 0)?,
                cart_id: CartItemId(row.get(16)?),
                added_at: row.get(17)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn remove_cart_item(
        &mut self,
        user_id: UserId,
        cart_id: CartItemId,
    ) -> Result<bool, StoreError> {
        let removed = self.conn.execute(
            "DELETE FROM cart_items WHERE id = ?1 AND user_id = ?2",
            params![cart_id.0, user_id.0],
        )?;
        Ok(removed > 0)
    }

    fn clear_cart(&mut self, user_id: UserId) -> Result<usize, StoreError> {
        clear_cart(&self.conn, user_id)
    }

    fn insert_order(&mut self, order: &NewOrder) -> Result<Order, StoreError> {
        insert_order(&self.conn, order)
    }

    fn order_by_payment(&self, reference: &str) -> Result<Option<Order>, StoreError> {
        let raw = self
            .conn
            .query_row(
                &format!("SELECT {ORDER_COLUMNS} FROM orders WHERE payment_id = ?1"),
                params![reference],
                order_from_row,
            )
            .optional()?;
        Ok(raw)
    }

    fn orders(&self, user_id: UserId) -> Result<Vec<Order>, StoreError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = ?1 ORDER BY created_at DESC, id DESC"
        ))?;
        let rows = stmt.query_map(params![user_id.0], order_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn commit_checkout(&mut self, commit: &CheckoutCommit) -> Result<Order, StoreError> {
        // Write lock taken at BEGIN; concurrent checkouts run one at a time.
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        update_user_progression(
            &tx,
            commit.user_id,
            commit.new_highest_gate,
            commit.insight_delta,
        )?;
        for record in &commit.journey {
            insert_journey_record_if_absent(&tx, record)?;
        }
        clear_cart(&tx, commit.user_id)?;
        let order = insert_order(&tx, &commit.order)?;

        tx.commit()?;
        Ok(order)
    }

    fn stats(&self) -> Result<StoreStats, StoreError> {
        Ok(StoreStats {
            users: count_rows(&self.conn, "users")?,
            artworks: count_rows(&self.conn, "artworks")?,
            orders: count_rows(&self.conn, "orders")?,
        })
    }
}

fn count_rows(conn: &Connection, table: &str) -> Result<i64, StoreError> {
    Ok(conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
        row.get(0)
    })?)
}

fn conflict_or(err: rusqlite::Error, message: &str) -> StoreError {
    match &err {
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.code == ErrorCode::ConstraintViolation =>
        {
            StoreError::Conflict(message.to_string())
        }
        _ => StoreError::Sqlite(err),
    }
}

fn get_item(conn: &Connection, id: ItemId) -> Result<Option<CatalogItem>, StoreError> {
    Ok(conn
        .query_row(
            &format!("SELECT {ARTWORK_COLUMNS} FROM artworks a WHERE a.id = ?1"),
            params![id.0],
            |row| artwork_from_row(row, 0),
        )
        .optional()?)
}

fn get_user(conn: &Connection, id: UserId) -> Result<Option<User>, StoreError> {
    Ok(conn
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
            params![id.0],
            user_from_row,
        )
        .optional()?)
}

fn update_user_progression(
    conn: &Connection,
    id: UserId,
    new_highest: Gate,
    insight_delta: u32,
) -> Result<(), StoreError> {
    let updated = conn.execute(
        "UPDATE users SET highest_gate_unlocked = MAX(highest_gate_unlocked, ?2), total_insights = total_insights + ?3 WHERE id = ?1",
        params![id.0, new_highest.0, insight_delta],
    )?;
    if updated == 0 {
        return Err(StoreError::NotFound(format!("user {}", id)));
    }
    Ok(())
}

fn insert_journey_record_if_absent(
    conn: &Connection,
    record: &JourneyRecord,
) -> Result<bool, StoreError> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO journey_records (user_id, gate, unlocked_at) VALUES (?1, ?2, ?3)",
        params![record.user_id.0, record.gate.0, record.unlocked_at],
    )?;
    Ok(inserted > 0)
}

fn clear_cart(conn: &Connection, user_id: UserId) -> Result<usize, StoreError> {
    Ok(conn.execute(
        "DELETE FROM cart_items WHERE user_id = ?1",
        params![user_id.0],
    )?)
}

fn insert_order(conn: &Connection, order: &NewOrder) -> Result<Order, StoreError> {
    let inserted = conn.execute(
        "INSERT INTO orders (user_id, status, total_amount, payment_method, payment_status, payment_id, customer_email, customer_name, items, created_at, completed_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            order.user_id.0,
            crate::store::ORDER_STATUS_COMPLETED,
            order.total_amount,
            order.payment_method,
            crate::store::ORDER_STATUS_COMPLETED,
            order.payment_reference,
            order.customer_email,
            order.customer_name,
            serde_json::to_string(&order.lines)?,
            order.completed_at,
            order.completed_at,
        ],
    );
    inserted.map_err(|err| {
        conflict_or(
            err,
            &format!("order already recorded for payment {}", order.payment_reference),
        )
    })?;
    Ok(Order::completed(OrderId(conn.last_insert_rowid()), order))
}

fn json_column<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err)))
}

fn artwork_from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<CatalogItem> {
    Ok(CatalogItem {
        id: ItemId(row.get(offset)?),
        title: row.get(offset + 1)?,
        artist: row.get(offset + 2)?,
        price: row.get(offset + 3)?,
        category: row.get(offset + 4)?,
        gate: row.get::<_, Option<u32>>(offset + 5)?.map(Gate),
        gate_title: row.get(offset + 6)?,
        image: row.get(offset + 7)?,
        description: row.get(offset + 8)?,
        philosophical_context: row.get(offset + 9)?,
        tags: json_column(row, offset + 10)?,
        emotions: json_column(row, offset + 11)?,
        likes: row.get(offset + 12)?,
        views: row.get(offset + 13)?,
        trending: row.get(offset + 14)?,
        unlock_requirement: row.get::<_, Option<u32>>(offset + 15)?.map(Gate),
    })
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: UserId(row.get(0)?),
        email: row.get(1)?,
        username: row.get(2)?,
        name: row.get(3)?,
        password_hash: row.get(4)?,
        spiritual_level: row.get(5)?,
        contemplation_streak: row.get(6)?,
        progression: Progression {
            total_insights: row.get(7)?,
            highest_gate_unlocked: Gate(row.get(8)?),
        },
        created_at: row.get(9)?,
    })
}

fn order_from_row(row: &Row<'_>) -> rusqlite::Result<Order> {
    Ok(Order {
        id: OrderId(row.get(0)?),
        user_id: UserId(row.get(1)?),
        status: row.get(2)?,
        total_amount: row.get(3)?,
        payment_method: row.get(4)?,
        payment_status: row.get(5)?,
        payment_reference: row.get(6)?,
        customer_email: row.get(7)?,
        customer_name: row.get(8)?,
        lines: json_column(row, 9)?,
        created_at: row.get::<_, DateTime<Utc>>(10)?,
        completed_at: row.get(11)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::catalog::default_catalog;
    use crate::payment::OrderLine;

    fn seeded() -> SqliteStore {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let catalog = default_catalog().unwrap();
        assert_eq!(store.seed_catalog(&catalog.items).unwrap(), catalog.items.len());
        store
    }

    fn new_user(store: &mut SqliteStore, name: &str) -> User {
        store
            .create_user(&NewUser {
                email: format!("{name}@example.com"),
                username: name.to_string(),
                name: name.to_string(),
                password_hash: "hash".to_string(),
            })
            .unwrap()
    }

    fn commit_for(user: &User, reference: &str, gate: u32) -> CheckoutCommit {
        let now = Utc::now();
        CheckoutCommit {
            user_id: user.id,
            new_highest_gate: Gate(gate + 1),
            insight_delta: 1,
            journey: vec![JourneyRecord {
                user_id: user.id,
                gate: Gate(gate),
                unlocked_at: now,
            }],
            order: NewOrder {
                user_id: user.id,
                total_amount: 100,
                payment_method: "simulated".to_string(),
                payment_reference: reference.to_string(),
                customer_email: user.email.clone(),
                customer_name: user.username.clone(),
                lines: vec![OrderLine {
                    id: ItemId(gate as i64),
                    title: "t".to_string(),
                    price: 100,
                    gate: Some(Gate(gate)),
                }],
                completed_at: now,
            },
        }
    }

    #[test]
    fn seeding_is_one_shot_and_ordered_by_gate() {
        let mut store = seeded();
        let catalog = default_catalog().unwrap();
        assert_eq!(store.seed_catalog(&catalog.items).unwrap(), 0);

        let items = store.list_items().unwrap();
        assert_eq!(items.len(), catalog.items.len());
        assert_eq!(items[0].gate, Some(Gate(1)));
        assert_eq!(items[13].gate, Some(Gate(14)));
        assert!(items[14..].iter().all(|item| item.gate.is_none()));
        assert!(!items[0].tags.is_empty());
    }

    #[test]
    fn new_users_start_at_gate_one() {
        let mut store = seeded();
        let user = new_user(&mut store, "ada");
        assert_eq!(user.highest_gate_unlocked(), Gate::FIRST);
        assert_eq!(user.progression.total_insights, 0);
        assert_eq!(user.spiritual_level, DEFAULT_SPIRITUAL_LEVEL);
        assert!(store.user_exists("ada@example.com", "nobody").unwrap());
        assert!(store.user_exists("x@example.com", "ada").unwrap());
    }

    #[test]
    fn duplicate_users_conflict() {
        let mut store = seeded();
        new_user(&mut store, "ada");
        let err = store
            .create_user(&NewUser {
                email: "ada@example.com".to_string(),
                username: "other".to_string(),
                name: "x".to_string(),
                password_hash: "h".to_string(),
            })
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[test]
    fn progression_update_never_lowers_frontier() {
        let mut store = seeded();
        let user = new_user(&mut store, "ada");
        store.update_user_progression(user.id, Gate(5), 1).unwrap();
        store.update_user_progression(user.id, Gate(3), 1).unwrap();
        let user = store.get_user(user.id).unwrap().unwrap();
        assert_eq!(user.highest_gate_unlocked(), Gate(5));
        assert_eq!(user.progression.total_insights, 2);
    }

    #[test]
    fn journey_insert_is_set_semantics() {
        let mut store = seeded();
        let user = new_user(&mut store, "ada");
        let record = JourneyRecord {
            user_id: user.id,
            gate: Gate(1),
            unlocked_at: Utc::now(),
        };
        assert!(store.insert_journey_record_if_absent(&record).unwrap());
        assert!(!store.insert_journey_record_if_absent(&record).unwrap());
        assert_eq!(store.journey(user.id).unwrap().len(), 1);
    }

    #[test]
    fn cart_rejects_duplicates_and_unknown_items() {
        let mut store = seeded();
        let user = new_user(&mut store, "ada");
        assert!(store.add_cart_item(user.id, ItemId(1)).unwrap().is_some());
        assert!(store.add_cart_item(user.id, ItemId(1)).unwrap().is_none());
        assert!(matches!(
            store.add_cart_item(user.id, ItemId(999)),
            Err(StoreError::NotFound(_))
        ));
        let line = store.add_cart_item(user.id, ItemId(15)).unwrap().unwrap();
        let cart = store.cart(user.id).unwrap();
        assert_eq!(cart.len(), 2);
        assert_eq!(cart[0].cart_id, line.cart_id);

        assert!(store.remove_cart_item(user.id, line.cart_id).unwrap());
        assert!(!store.remove_cart_item(user.id, line.cart_id).unwrap());
    }

    #[test]
    fn item_views_increment() {
        let mut store = seeded();
        let before = store.get_item(ItemId(1)).unwrap().unwrap().views;
        let after = store.record_item_view(ItemId(1)).unwrap().unwrap().views;
        assert_eq!(after, before + 1);
        assert!(store.record_item_view(ItemId(404)).unwrap().is_none());
    }

    #[test]
    fn checkout_commits_everything() {
        let mut store = seeded();
        let user = new_user(&mut store, "ada");
        store.add_cart_item(user.id, ItemId(1)).unwrap();

        let order = store.commit_checkout(&commit_for(&user, "pi_1", 1)).unwrap();
        assert_eq!(order.status, "completed");
        assert_eq!(order.lines.len(), 1);

        let user = store.get_user(user.id).unwrap().unwrap();
        assert_eq!(user.highest_gate_unlocked(), Gate(2));
        assert!(store.cart(user.id).unwrap().is_empty());
        assert_eq!(store.journey(user.id).unwrap().len(), 1);
        assert_eq!(store.orders(user.id).unwrap(), vec![order.clone()]);
        assert_eq!(store.order_by_payment("pi_1").unwrap(), Some(order));
    }

    #[test]
    fn failed_checkout_leaves_no_trace() {
        let mut store = seeded();
        let user = new_user(&mut store, "ada");
        store.commit_checkout(&commit_for(&user, "pi_1", 1)).unwrap();
        store.add_cart_item(user.id, ItemId(2)).unwrap();

        // Reusing the payment reference violates the unique order constraint
        // after the progression and cart writes have run.
        let err = store
            .commit_checkout(&commit_for(&user, "pi_1", 2))
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        let user = store.get_user(user.id).unwrap().unwrap();
        assert_eq!(user.highest_gate_unlocked(), Gate(2));
        assert_eq!(user.progression.total_insights, 1);
        assert_eq!(store.cart(user.id).unwrap().len(), 1);
        assert_eq!(store.journey(user.id).unwrap().len(), 1);
        assert_eq!(store.stats().unwrap().orders, 1);
    }

    #[test]
    fn unknown_user_checkout_is_not_found() {
        let mut store = seeded();
        let mut ghost = new_user(&mut store, "ada");
        ghost.id = UserId(77);
        let err = store.commit_checkout(&commit_for(&ghost, "pi_x", 1)).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
        assert_eq!(store.stats().unwrap().orders, 0);
    }

    #[test]
    fn data_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("market.db");
        let user_id = {
            let mut store = SqliteStore::open(&path).unwrap();
            store
                .seed_catalog(&default_catalog().unwrap().items)
                .unwrap();
            let user = new_user(&mut store, "ada");
            store.commit_checkout(&commit_for(&user, "pi_1", 3)).unwrap();
            user.id
        };

        let store = SqliteStore::open(&path).unwrap();
        let user = store.get_user(user_id).unwrap().unwrap();
        assert_eq!(user.highest_gate_unlocked(), Gate(4));
        assert_eq!(store.orders(user_id).unwrap().len(), 1);
        assert_eq!(store.stats().unwrap().users, 1);
    }
}
