//! Product catalog with an offline cache.
//!
//! The catalog (code -> description/location) is fetched from the server at
//! startup and written to the local `catalog_cache` table; when the server is
//! unreachable the last cached copy is used instead. The scanning logic never
//! mutates it.

use std::collections::HashMap;
use std::time::Duration;

use rusqlite::params;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::db::DbState;

const CACHE_KEY: &str = "products";
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// One sellable/pickable product. Immutable within a session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Product {
    pub code: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub location: String,
}

/// Insertion-ordered product collection keyed by code.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    products: Vec<Product>,
    by_code: HashMap<String, usize>,
}

impl Catalog {
    pub fn from_products(products: Vec<Product>) -> Self {
        let mut by_code = HashMap::with_capacity(products.len());
        for (i, p) in products.iter().enumerate() {
            // First occurrence wins for duplicate codes
            by_code.entry(p.code.clone()).or_insert(i);
        }
        Catalog { products, by_code }
    }

    pub fn get(&self, code: &str) -> Option<&Product> {
        self.by_code.get(code).map(|&i| &self.products[i])
    }

    pub fn contains(&self, code: &str) -> bool {
        self.by_code.contains_key(code)
    }

    /// Display name for a code: catalog description, or the raw code when the
    /// catalog has no entry (or an empty description).
    pub fn describe<'a>(&'a self, code: &'a str) -> &'a str {
        match self.get(code) {
            Some(p) if !p.description.is_empty() => p.description.as_str(),
            _ => code,
        }
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Product> {
        self.products.iter()
    }
}

/// Catalog load failures.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("product catalog unavailable: server unreachable and no cached copy")]
    Unavailable,
    #[error("catalog cache error: {0}")]
    Cache(String),
}

// ---------------------------------------------------------------------------
// Cache readers/writers
// ---------------------------------------------------------------------------

/// Read the cached product list. Returns an empty list on miss or error.
pub fn read_cache(db: &DbState) -> Vec<Product> {
    let conn = match db.conn.lock() {
        Ok(c) => c,
        Err(e) => {
            error!("catalog cache lock failed: {e}");
            return vec![];
        }
    };

    let json_str: Option<String> = conn
        .query_row(
            "SELECT data FROM catalog_cache WHERE cache_key = ?1",
            params![CACHE_KEY],
            |row| row.get(0),
        )
        .ok();

    match json_str {
        Some(s) => match serde_json::from_str::<Vec<Product>>(&s) {
            Ok(products) => products,
            Err(e) => {
                error!("catalog_cache JSON parse error: {e}");
                vec![]
            }
        },
        None => vec![],
    }
}

/// Upsert the fetched product list into the cache.
pub fn write_cache(db: &DbState, products: &[Product]) -> Result<(), CatalogError> {
    let json_str =
        serde_json::to_string(products).map_err(|e| CatalogError::Cache(e.to_string()))?;

    let conn = db
        .conn
        .lock()
        .map_err(|e| CatalogError::Cache(e.to_string()))?;
    conn.execute(
        "INSERT INTO catalog_cache (id, cache_key, data, updated_at)
         VALUES (lower(hex(randomblob(16))), ?1, ?2, datetime('now'))
         ON CONFLICT(cache_key) DO UPDATE SET
            data = excluded.data,
            updated_at = excluded.updated_at",
        params![CACHE_KEY, json_str],
    )
    .map_err(|e| CatalogError::Cache(format!("upsert catalog_cache: {e}")))?;

    Ok(())
}

// ---------------------------------------------------------------------------
// Load (server first, cache fallback)
// ---------------------------------------------------------------------------

/// Fetch the product list from `GET {base}/orderpiqr/products`.
async fn fetch_remote(server_url: &str) -> Result<Vec<Product>, String> {
    let url = format!("{server_url}/orderpiqr/products");

    let client = reqwest::Client::builder()
        .timeout(FETCH_TIMEOUT)
        .build()
        .map_err(|e| format!("Failed to create HTTP client: {e}"))?;

    let resp = client
        .get(&url)
        .send()
        .await
        .map_err(|e| format!("Cannot reach server at {url}: {e}"))?;

    let status = resp.status();
    if !status.is_success() {
        return Err(format!("Catalog fetch failed (HTTP {})", status.as_u16()));
    }

    resp.json::<Vec<Product>>()
        .await
        .map_err(|e| format!("Invalid catalog JSON: {e}"))
}

/// Load the catalog: server when reachable (persisting the fresh copy),
/// otherwise the last cached copy. An empty result from both sources is
/// `CatalogError::Unavailable`.
pub async fn load(db: &DbState, server_url: &str) -> Result<Catalog, CatalogError> {
    match fetch_remote(server_url).await {
        Ok(products) => {
            info!(count = products.len(), "catalog fetched from server");
            if let Err(e) = write_cache(db, &products) {
                // Fresh data is still usable even if the cache write fails
                warn!(error = %e, "failed to persist catalog cache");
            }
            let catalog = Catalog::from_products(products);
            if catalog.is_empty() {
                return Err(CatalogError::Unavailable);
            }
            Ok(catalog)
        }
        Err(fetch_err) => {
            warn!(error = %fetch_err, "catalog fetch failed, falling back to cache");
            let cached = read_cache(db);
            if cached.is_empty() {
                return Err(CatalogError::Unavailable);
            }
            info!(count = cached.len(), "catalog loaded from offline cache");
            Ok(Catalog::from_products(cached))
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use rusqlite::Connection;

    fn test_db() -> DbState {
        let conn = Connection::open_in_memory().expect("open in-memory db");
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;
             PRAGMA synchronous = NORMAL;",
        )
        .expect("pragma setup");
        db::run_migrations_for_test(&conn);
        DbState {
            conn: std::sync::Mutex::new(conn),
            db_path: std::path::PathBuf::from(":memory:"),
        }
    }

    fn sample_products() -> Vec<Product> {
        vec![
            Product {
                code: "SKU1".into(),
                description: "Blue widget".into(),
                location: "A-2".into(),
            },
            Product {
                code: "SKU2".into(),
                description: String::new(),
                location: "A-10".into(),
            },
        ]
    }

    #[test]
    fn test_catalog_lookup() {
        let cat = Catalog::from_products(sample_products());
        assert_eq!(cat.len(), 2);
        assert!(cat.contains("SKU1"));
        assert!(!cat.contains("SKU9"));
        assert_eq!(cat.get("SKU1").unwrap().location, "A-2");
    }

    #[test]
    fn test_describe_falls_back_to_code() {
        let cat = Catalog::from_products(sample_products());
        assert_eq!(cat.describe("SKU1"), "Blue widget");
        // Empty description and unknown code both fall back to the raw code
        assert_eq!(cat.describe("SKU2"), "SKU2");
        assert_eq!(cat.describe("SKU9"), "SKU9");
    }

    #[test]
    fn test_cache_roundtrip() {
        let db = test_db();
        assert!(read_cache(&db).is_empty());

        let products = sample_products();
        write_cache(&db, &products).expect("write cache");
        assert_eq!(read_cache(&db), products);

        // Overwrite with a smaller list
        write_cache(&db, &products[..1]).expect("rewrite cache");
        assert_eq!(read_cache(&db).len(), 1);
    }

    #[tokio::test]
    async fn test_load_falls_back_to_cache_when_offline() {
        let db = test_db();
        write_cache(&db, &sample_products()).expect("seed cache");

        // Unroutable port: the fetch fails fast and the cache wins
        let catalog = load(&db, "http://127.0.0.1:1").await.expect("cached load");
        assert_eq!(catalog.len(), 2);
    }

    #[tokio::test]
    async fn test_load_unavailable_without_cache() {
        let db = test_db();
        let result = load(&db, "http://127.0.0.1:1").await;
        assert!(matches!(result, Err(CatalogError::Unavailable)));
    }

    #[test]
    fn test_product_json_shape() {
        let p: Product =
            serde_json::from_str(r#"{"code":"SKU1","description":"Widget","location":"A-1"}"#)
                .expect("parse product");
        assert_eq!(p.code, "SKU1");

        // Missing optional fields default to empty
        let p: Product = serde_json::from_str(r#"{"code":"SKU2"}"#).expect("parse minimal");
        assert_eq!(p.description, "");
        assert_eq!(p.location, "");
    }
}
