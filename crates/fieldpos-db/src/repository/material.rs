//! # Material Repository
//!
//! Database operations for raw materials.
//!
//! Balances live in `materials.stock` but are only ever changed through
//! [`crate::repository::ledger::StockLedger`]; this repository covers
//! catalog reads/writes and the value snapshots recipe resolution needs.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteConnection;
use sqlx::{FromRow, SqlitePool};
use tracing::debug;

use fieldpos_core::Material;

use crate::error::DbResult;
use crate::repository::{parse_decimal, parse_unit};

/// Row shape for the `materials` table.
#[derive(Debug, FromRow)]
pub(crate) struct MaterialRow {
    id: String,
    name: String,
    unit: String,
    stock: String,
    price: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl MaterialRow {
    pub(crate) fn into_material(self) -> DbResult<Material> {
        Ok(Material {
            unit: parse_unit("Material", &self.id, &self.unit)?,
            stock: parse_decimal("Material", &self.id, "stock", &self.stock)?,
            price: parse_decimal("Material", &self.id, "price", &self.price)?,
            id: self.id,
            name: self.name,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const SELECT_MATERIAL: &str =
    "SELECT id, name, unit, stock, price, created_at, updated_at FROM materials";

/// Repository for material catalog operations.
#[derive(Debug, Clone)]
pub struct MaterialRepository {
    pool: SqlitePool,
}

impl MaterialRepository {
    /// Creates a new MaterialRepository on the read pool.
    pub fn new(pool: SqlitePool) -> Self {
        MaterialRepository { pool }
    }

    /// Lists all materials ordered by name.
    pub async fn list(&self) -> DbResult<Vec<Material>> {
        let rows = sqlx::query_as::<_, MaterialRow>(&format!("{SELECT_MATERIAL} ORDER BY name"))
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(MaterialRow::into_material).collect()
    }

    /// Gets a material by id.
    pub async fn get(&self, id: &str) -> DbResult<Option<Material>> {
        let row = sqlx::query_as::<_, MaterialRow>(&format!("{SELECT_MATERIAL} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(MaterialRow::into_material).transpose()
    }

    // -------------------------------------------------------------------------
    // Transaction-scoped operations
    // -------------------------------------------------------------------------

    /// Gets a material inside an atomic unit.
    pub async fn get_in_tx(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Material>> {
        let row = sqlx::query_as::<_, MaterialRow>(&format!("{SELECT_MATERIAL} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(conn)
            .await?;
        row.map(MaterialRow::into_material).transpose()
    }

    /// Looks a material up by its unique name.
    pub async fn get_by_name(
        conn: &mut SqliteConnection,
        name: &str,
    ) -> DbResult<Option<Material>> {
        let row = sqlx::query_as::<_, MaterialRow>(&format!("{SELECT_MATERIAL} WHERE name = ?1"))
            .bind(name)
            .fetch_optional(conn)
            .await?;
        row.map(MaterialRow::into_material).transpose()
    }

    /// Loads a value snapshot of the given materials, keyed by id.
    ///
    /// This is the well-defined read set recipe resolution works against;
    /// missing ids are simply absent from the map and surface as
    /// `NotFound` during resolution.
    pub async fn snapshot(
        conn: &mut SqliteConnection,
        ids: &[String],
    ) -> DbResult<HashMap<String, Material>> {
        let mut snapshot = HashMap::with_capacity(ids.len());
        for id in ids {
            if snapshot.contains_key(id) {
                continue;
            }
            if let Some(material) = Self::get_in_tx(&mut *conn, id).await? {
                snapshot.insert(material.id.clone(), material);
            }
        }
        Ok(snapshot)
    }

    /// Inserts a material row.
    pub async fn insert(conn: &mut SqliteConnection, material: &Material) -> DbResult<()> {
        debug!(id = %material.id, name = %material.name, "Inserting material");

        sqlx::query(
            r#"
            INSERT INTO materials (id, name, unit, stock, price, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&material.id)
        .bind(&material.name)
        .bind(material.unit.as_str())
        .bind(material.stock.to_string())
        .bind(material.price.to_string())
        .bind(material.created_at)
        .bind(material.updated_at)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// Updates the unit price (restocks re-price the material).
    pub async fn set_price(
        conn: &mut SqliteConnection,
        id: &str,
        price: Decimal,
    ) -> DbResult<()> {
        sqlx::query("UPDATE materials SET price = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(price.to_string())
            .bind(Utc::now())
            .execute(conn)
            .await?;
        Ok(())
    }
}
