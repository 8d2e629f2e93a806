//! Persistence gateway: idempotent component/price upserts on SQLite
//!
//! Every record is written as one transaction holding two upserts, the
//! component keyed by `id` and its price keyed by `(component_id, vendor_id)`.
//! Rows are never deleted here; a product that disappears from a retailer
//! keeps its last known state.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::{Row, Sqlite, SqlitePool, migrate::MigrateDatabase};
use tokio::sync::OnceCell;
use tracing::info;

use crate::models::{Component, Price, Vendor};

/// Columns the current record shape needs, with defaults safe for existing rows
const COMPONENT_COLUMNS: &[(&str, &str)] = &[
    ("name_localized", "TEXT"),
    ("brand", "TEXT NOT NULL DEFAULT 'N/A'"),
    ("socket", "TEXT"),
    ("chipset", "TEXT"),
    ("memory_type", "TEXT"),
    ("form_factor", "TEXT"),
    ("power_consumption", "INTEGER"),
    ("specifications", "TEXT NOT NULL DEFAULT '{}'"),
    ("images", "TEXT NOT NULL DEFAULT '[]'"),
    ("last_updated", "TEXT"),
];

const PRICE_COLUMNS: &[(&str, &str)] = &[
    ("price", "INTEGER NOT NULL DEFAULT 0"),
    ("in_stock", "BOOLEAN NOT NULL DEFAULT 0"),
    ("url", "TEXT"),
    ("last_updated", "TEXT"),
];

pub struct Database {
    pool: SqlitePool,
    schema_checked: Arc<OnceCell<()>>,
}

impl Database {
    /// Open the destination database and apply migrations
    ///
    /// Failing here is fatal for the run: nothing has been fetched yet.
    pub async fn connect(db_url: &str) -> Result<Self> {
        let in_memory = db_url.contains(":memory:");

        // Create database file if it doesn't exist
        if !in_memory && !Sqlite::database_exists(db_url).await.unwrap_or(false) {
            info!("Creating database file");
            Sqlite::create_database(db_url).await?;
        }

        // An in-memory database lives and dies with its single connection
        let options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };

        let pool = options
            .connect(db_url)
            .await
            .context("Failed to connect to the destination database")?;

        Self::from_pool(pool).await
    }

    /// Wrap an open pool and run migrations on it
    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations").run(&pool).await?;

        info!("Database initialized successfully");
        Ok(Self {
            pool,
            schema_checked: Arc::new(OnceCell::new()),
        })
    }

    /// Add any column the record shape needs but an older table lacks
    ///
    /// Runs at most once per handle; a table that is already current is left untouched.
    pub async fn ensure_schema(&self) -> Result<()> {
        self.schema_checked
            .get_or_try_init(|| async {
                self.add_missing_columns("components", COMPONENT_COLUMNS).await?;
                self.add_missing_columns("prices", PRICE_COLUMNS).await?;
                Ok::<(), anyhow::Error>(())
            })
            .await?;

        Ok(())
    }

    async fn add_missing_columns(&self, table: &str, columns: &[(&str, &str)]) -> Result<usize> {
        let existing: HashSet<String> = sqlx::query_scalar("SELECT name FROM pragma_table_info(?)")
            .bind(table)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .collect();

        let mut added = 0;
        for (column, definition) in columns {
            if existing.contains(*column) {
                continue;
            }

            let alter = format!("ALTER TABLE {table} ADD COLUMN {column} {definition}");
            sqlx::query(&alter)
                .execute(&self.pool)
                .await
                .with_context(|| format!("Failed to add column {table}.{column}"))?;

            info!("Added missing column '{}' to table '{}'", column, table);
            added += 1;
        }

        Ok(added)
    }

    /// Insert or refresh a component and its vendor price as one unit
    ///
    /// The component row is overwritten with the latest scrape; the price row
    /// only has its price, stock, URL and timestamp replaced. If either
    /// statement fails, neither is kept.
    pub async fn upsert(&self, component: &Component, price: &Price) -> Result<()> {
        self.ensure_schema().await?;

        let specifications = serde_json::to_string(&component.specifications)?;
        let images = serde_json::to_string(&component.images)?;

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r"
            INSERT INTO components (
                id, name, name_localized, category, brand, socket, chipset,
                memory_type, form_factor, power_consumption, specifications,
                images, last_updated
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (id) DO UPDATE SET
                name = excluded.name,
                name_localized = excluded.name_localized,
                category = excluded.category,
                brand = excluded.brand,
                socket = excluded.socket,
                chipset = excluded.chipset,
                memory_type = excluded.memory_type,
                form_factor = excluded.form_factor,
                power_consumption = excluded.power_consumption,
                specifications = excluded.specifications,
                images = excluded.images,
                last_updated = excluded.last_updated
            ",
        )
        .bind(&component.id)
        .bind(&component.name)
        .bind(&component.name_localized)
        .bind(&component.category)
        .bind(&component.brand)
        .bind(&component.socket)
        .bind(&component.chipset)
        .bind(&component.memory_type)
        .bind(&component.form_factor)
        .bind(component.power_consumption_watts)
        .bind(&specifications)
        .bind(&images)
        .bind(component.last_updated)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("Failed to upsert component {}", component.id))?;

        sqlx::query(
            r"
            INSERT INTO prices (component_id, vendor_id, price, in_stock, url, last_updated)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT (component_id, vendor_id) DO UPDATE SET
                price = excluded.price,
                in_stock = excluded.in_stock,
                url = excluded.url,
                last_updated = excluded.last_updated
            ",
        )
        .bind(&price.component_id)
        .bind(&price.vendor_id)
        .bind(price.price)
        .bind(price.in_stock)
        .bind(&price.source_url)
        .bind(price.last_updated)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("Failed to upsert price {}/{}", price.component_id, price.vendor_id))?;

        tx.commit().await?;
        Ok(())
    }

    pub async fn get_vendor(&self, id: &str) -> Result<Option<Vendor>> {
        let row = sqlx::query("SELECT id, name FROM vendors WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| Vendor {
            id: row.get("id"),
            name: row.get("name"),
        }))
    }

    pub async fn get_component(&self, id: &str) -> Result<Option<Component>> {
        let row = sqlx::query(
            r"
            SELECT id, name, name_localized, category, brand, socket, chipset,
                   memory_type, form_factor, power_consumption, specifications,
                   images, last_updated
            FROM components WHERE id = ?
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(component_from_row).transpose()
    }

    pub async fn get_price(&self, component_id: &str, vendor_id: &str) -> Result<Option<Price>> {
        let row = sqlx::query(
            r"
            SELECT component_id, vendor_id, price, in_stock, url, last_updated
            FROM prices WHERE component_id = ? AND vendor_id = ?
            ",
        )
        .bind(component_id)
        .bind(vendor_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| Price {
            component_id: row.get("component_id"),
            vendor_id: row.get("vendor_id"),
            price: row.get("price"),
            in_stock: row.get("in_stock"),
            source_url: row.get("url"),
            last_updated: row.get("last_updated"),
        }))
    }

    pub async fn component_count(&self) -> Result<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM components")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn price_count(&self) -> Result<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM prices")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

fn component_from_row(row: &SqliteRow) -> Result<Component> {
    let specifications: String = row.get("specifications");
    let images: String = row.get("images");
    let last_updated: Option<DateTime<Utc>> = row.try_get("last_updated")?;

    Ok(Component {
        id: row.get("id"),
        name: row.get("name"),
        name_localized: row.get("name_localized"),
        category: row.get("category"),
        brand: row.get("brand"),
        socket: row.get("socket"),
        chipset: row.get("chipset"),
        memory_type: row.get("memory_type"),
        form_factor: row.get("form_factor"),
        power_consumption_watts: row.get("power_consumption"),
        specifications: serde_json::from_str(&specifications)?,
        images: serde_json::from_str(&images)?,
        last_updated: last_updated.unwrap_or_else(Utc::now),
    })
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            schema_checked: Arc::clone(&self.schema_checked),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::TimeZone;

    use super::*;

    fn timestamp(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, hour, 0, 0).unwrap()
    }

    fn records(price: i64, in_stock: bool, at: DateTime<Utc>) -> (Component, Price) {
        let component = Component {
            id: "processor-amd-ryzen-5-5600x".to_string(),
            name: "AMD Ryzen 5 5600X".to_string(),
            name_localized: None,
            category: "processor".to_string(),
            brand: "AMD".to_string(),
            socket: Some("AM4".to_string()),
            chipset: None,
            memory_type: Some("DDR4".to_string()),
            form_factor: None,
            power_consumption_watts: Some(65),
            specifications: BTreeMap::from([("cache".to_string(), "32MB".to_string())]),
            images: vec!["https://shop.test/img/r5.jpg".to_string()],
            last_updated: at,
        };
        let price = Price {
            component_id: component.id.clone(),
            vendor_id: "startech".to_string(),
            price,
            in_stock,
            source_url: "https://shop.test/amd-ryzen-5-5600x".to_string(),
            last_updated: at,
        };
        (component, price)
    }

    #[tokio::test]
    async fn upsert_twice_is_idempotent() {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        let (component, price) = records(18500, true, timestamp(8));

        db.upsert(&component, &price).await.unwrap();
        db.upsert(&component, &price).await.unwrap();

        assert_eq!(db.component_count().await.unwrap(), 1);
        assert_eq!(db.price_count().await.unwrap(), 1);
        assert_eq!(db.get_component(&component.id).await.unwrap(), Some(component.clone()));
        assert_eq!(db.get_price(&component.id, "startech").await.unwrap(), Some(price));
    }

    #[tokio::test]
    async fn rescrape_overwrites_mutable_fields() {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        let (component, price) = records(18500, true, timestamp(8));
        db.upsert(&component, &price).await.unwrap();

        let (mut renamed, cheaper) = records(17900, false, timestamp(20));
        renamed.name = "AMD Ryzen 5 5600X (Tray)".to_string();
        renamed.power_consumption_watts = None;
        db.upsert(&renamed, &cheaper).await.unwrap();

        let stored = db.get_component(&component.id).await.unwrap().unwrap();
        assert_eq!(stored.name, "AMD Ryzen 5 5600X (Tray)");
        assert_eq!(stored.power_consumption_watts, None);
        assert_eq!(stored.last_updated, timestamp(20));

        let stored_price = db.get_price(&component.id, "startech").await.unwrap().unwrap();
        assert_eq!(stored_price.price, 17900);
        assert!(!stored_price.in_stock);
        assert_eq!(db.component_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn one_component_can_carry_prices_from_several_vendors() {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        let (component, startech) = records(18500, true, timestamp(8));
        let techland = Price {
            vendor_id: "techland".to_string(),
            price: 18200,
            ..startech.clone()
        };

        db.upsert(&component, &startech).await.unwrap();
        db.upsert(&component, &techland).await.unwrap();

        assert_eq!(db.component_count().await.unwrap(), 1);
        assert_eq!(db.price_count().await.unwrap(), 2);
        assert_eq!(db.get_price(&component.id, "techland").await.unwrap().unwrap().price, 18200);
    }

    #[tokio::test]
    async fn failed_price_rolls_back_component() {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        let (component, mut price) = records(18500, true, timestamp(8));
        // the price must reference the component's own id
        price.component_id = "missing-component".to_string();

        assert!(db.upsert(&component, &price).await.is_err());
        assert_eq!(db.get_component(&component.id).await.unwrap(), None);
        assert_eq!(db.component_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn legacy_table_gains_missing_columns_once() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::query(
            "CREATE TABLE components (id TEXT PRIMARY KEY, name TEXT NOT NULL, category TEXT NOT NULL, last_updated TEXT)",
        )
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query("INSERT INTO components (id, name, category) VALUES ('ram-old', 'Old RAM', 'ram')")
            .execute(&pool)
            .await
            .unwrap();

        let db = Database::from_pool(pool).await.unwrap();
        db.ensure_schema().await.unwrap();

        assert_eq!(db.add_missing_columns("components", COMPONENT_COLUMNS).await.unwrap(), 0);
        assert_eq!(db.add_missing_columns("prices", PRICE_COLUMNS).await.unwrap(), 0);

        let old = db.get_component("ram-old").await.unwrap().unwrap();
        assert_eq!(old.brand, "N/A");
        assert_eq!(old.power_consumption_watts, None);
        assert!(old.specifications.is_empty());

        let (component, price) = records(18500, true, timestamp(8));
        db.upsert(&component, &price).await.unwrap();
        assert_eq!(
            db.get_component(&component.id).await.unwrap().unwrap().power_consumption_watts,
            Some(65)
        );
    }

    #[tokio::test]
    async fn seeded_vendors_are_available() {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        let vendor = db.get_vendor("startech").await.unwrap().unwrap();
        assert_eq!(vendor.name, "StarTech");
        assert_eq!(db.get_vendor("nowhere").await.unwrap(), None);
    }
}
