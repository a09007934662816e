use std::fmt;

use serde::{Deserialize, Serialize};

/// A tier in the catalog's linear unlock ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Gate(pub u32);

impl Gate {
    /// Every new account starts with this gate unlocked.
    pub const FIRST: Gate = Gate(1);
    /// Sentinel for anonymous browsing: everything compares as unlocked.
    pub const MAX: Gate = Gate(u32::MAX);

    pub fn next(self) -> Gate {
        Gate(self.0.saturating_add(1))
    }
}

impl Default for Gate {
    fn default() -> Self {
        Gate::FIRST
    }
}

impl fmt::Display for Gate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Gate::MAX {
            write!(f, "all")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub i64);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Catalog entry as authored in the catalog file, before the store assigns an id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCatalogItem {
    pub title: String,
    pub artist: String,
    /// Price in cents.
    pub price: i64,
    pub category: String,
    #[serde(default)]
    pub gate: Option<Gate>,
    #[serde(default)]
    pub gate_title: Option<String>,
    pub image: String,
    pub description: String,
    #[serde(default)]
    pub philosophical_context: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub emotions: Vec<String>,
    #[serde(default)]
    pub likes: i64,
    #[serde(default)]
    pub views: i64,
    #[serde(default)]
    pub trending: bool,
    #[serde(default)]
    pub unlock_requirement: Option<Gate>,
}

impl NewCatalogItem {
    pub fn with_id(self, id: ItemId) -> CatalogItem {
        CatalogItem {
            id,
            title: self.title,
            artist: self.artist,
            price: self.price,
            category: self.category,
            gate: self.gate,
            gate_title: self.gate_title,
            image: self.image,
            description: self.description,
            philosophical_context: self.philosophical_context,
            tags: self.tags,
            emotions: self.emotions,
            likes: self.likes,
            views: self.views,
            trending: self.trending,
            unlock_requirement: self.unlock_requirement,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogItem {
    pub id: ItemId,
    pub title: String,
    pub artist: String,
    pub price: i64,
    pub category: String,
    pub gate: Option<Gate>,
    pub gate_title: Option<String>,
    pub image: String,
    pub description: String,
    pub philosophical_context: Option<String>,
    pub tags: Vec<String>,
    pub emotions: Vec<String>,
    pub likes: i64,
    pub views: i64,
    pub trending: bool,
    pub unlock_requirement: Option<Gate>,
}

impl CatalogItem {
    /// Open when the item's gate is at or below the frontier. Items without
    /// a gate sit outside the progression and are always open.
    pub fn is_unlocked_for(&self, highest_gate_unlocked: Gate) -> bool {
        self.gate.map_or(true, |gate| gate <= highest_gate_unlocked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_gate_saturates_at_sentinel() {
        assert_eq!(Gate(3).next(), Gate(4));
        assert_eq!(Gate::MAX.next(), Gate::MAX);
    }

    #[test]
    fn lock_state_follows_own_gate() {
        let entry: NewCatalogItem = serde_json::from_str(
            r#"{"title":"t","artist":"a","price":100,"category":"c","gate":5,
                "unlock_requirement":2,"image":"i","description":"d"}"#,
        )
        .unwrap();
        let item = entry.with_id(ItemId(1));
        assert!(!item.is_unlocked_for(Gate(2)));
        assert!(!item.is_unlocked_for(Gate(4)));
        assert!(item.is_unlocked_for(Gate(5)));
    }
}
