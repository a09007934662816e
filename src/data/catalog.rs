use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::NewCatalogItem;

pub const CATALOG_SCHEMA_VERSION: u32 = 1;

const DEFAULT_CATALOG_JSON: &str = include_str!("../../assets/data/catalog.json");

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogFile {
    pub schema_version: u32,
    pub items: Vec<NewCatalogItem>,
}

#[derive(Debug, Error)]
pub enum CatalogDataError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Json {
        path: String,
        source: serde_json::Error,
    },
    #[error("{0}")]
    Validation(String),
}

pub fn load_catalog(path: impl AsRef<Path>) -> Result<CatalogFile, CatalogDataError> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path).map_err(|source| CatalogDataError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_catalog(&raw, &path.display().to_string())
}

/// The fourteen-gate catalog shipped with the binary.
pub fn default_catalog() -> Result<CatalogFile, CatalogDataError> {
    parse_catalog(DEFAULT_CATALOG_JSON, "<embedded catalog>")
}

fn parse_catalog(raw: &str, origin: &str) -> Result<CatalogFile, CatalogDataError> {
    let catalog: CatalogFile =
        serde_json::from_str(raw).map_err(|source| CatalogDataError::Json {
            path: origin.to_string(),
            source,
        })?;
    catalog.validate()?;
    Ok(catalog)
}

impl CatalogFile {
    pub fn validate(&self) -> Result<(), CatalogDataError> {
        if self.schema_version != CATALOG_SCHEMA_VERSION {
            return Err(CatalogDataError::Validation(format!(
                "unsupported catalog schema_version {} (expected {})",
                self.schema_version, CATALOG_SCHEMA_VERSION
            )));
        }
        let mut keys = HashSet::new();
        for item in &self.items {
            if item.title.trim().is_empty() {
                return Err(CatalogDataError::Validation(
                    "catalog item title cannot be empty".to_string(),
                ));
            }
            if !keys.insert((item.title.as_str(), item.artist.as_str())) {
                return Err(CatalogDataError::Validation(format!(
                    "duplicate catalog item {} by {}",
                    item.title, item.artist
                )));
            }
            if item.price < 0 {
                return Err(CatalogDataError::Validation(format!(
                    "item {} has negative price",
                    item.title
                )));
            }
            if item.gate.is_some_and(|gate| gate.0 == 0) {
                return Err(CatalogDataError::Validation(format!(
                    "item {} has gate 0; gates start at 1",
                    item.title
                )));
            }
            match (item.unlock_requirement, item.gate) {
                (Some(required), Some(gate)) if required != gate => {
                    return Err(CatalogDataError::Validation(format!(
                        "item {} requires gate {} but sits at gate {}",
                        item.title, required, gate
                    )));
                }
                (Some(required), None) => {
                    return Err(CatalogDataError::Validation(format!(
                        "item {} requires gate {} but has no gate",
                        item.title, required
                    )));
                }
                _ => {}
            }
        }
        Ok(())
    }
}
