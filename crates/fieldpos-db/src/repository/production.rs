//! # Production Repository
//!
//! Database operations for manufacturing run records.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteConnection;
use sqlx::{FromRow, SqlitePool};
use tracing::debug;

use fieldpos_core::{MaterialUse, Production};

use crate::error::DbResult;
use crate::repository::{parse_decimal, parse_unit};

#[derive(Debug, FromRow)]
struct ProductionRow {
    id: String,
    product_id: String,
    quantity: String,
    revenue: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct UsedMaterialRow {
    material_id: String,
    amount: String,
    unit: String,
}

/// Repository for production records.
#[derive(Debug, Clone)]
pub struct ProductionRepository {
    pool: SqlitePool,
}

impl ProductionRepository {
    /// Creates a new ProductionRepository on the read pool.
    pub fn new(pool: SqlitePool) -> Self {
        ProductionRepository { pool }
    }

    /// Lists all production records, newest first.
    pub async fn list(&self) -> DbResult<Vec<Production>> {
        let rows = sqlx::query_as::<_, ProductionRow>(
            "SELECT id, product_id, quantity, revenue, created_at FROM productions \
             ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut productions = Vec::with_capacity(rows.len());
        for row in rows {
            let used_rows = sqlx::query_as::<_, UsedMaterialRow>(
                "SELECT material_id, amount, unit FROM production_materials \
                 WHERE production_id = ?1 ORDER BY position",
            )
            .bind(&row.id)
            .fetch_all(&self.pool)
            .await?;

            let mut used_materials = Vec::with_capacity(used_rows.len());
            for used in used_rows {
                used_materials.push(MaterialUse {
                    amount: parse_decimal("ProductionMaterial", &row.id, "amount", &used.amount)?,
                    unit: parse_unit("ProductionMaterial", &row.id, &used.unit)?,
                    material_id: used.material_id,
                });
            }

            productions.push(Production {
                quantity: parse_decimal("Production", &row.id, "quantity", &row.quantity)?,
                revenue: parse_decimal("Production", &row.id, "revenue", &row.revenue)?,
                id: row.id,
                product_id: row.product_id,
                used_materials,
                created_at: row.created_at,
            });
        }
        Ok(productions)
    }

    /// Inserts a production record with its consumed materials.
    pub async fn insert(conn: &mut SqliteConnection, production: &Production) -> DbResult<()> {
        debug!(
            id = %production.id,
            product_id = %production.product_id,
            quantity = %production.quantity,
            "Inserting production record"
        );

        sqlx::query(
            "INSERT INTO productions (id, product_id, quantity, revenue, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&production.id)
        .bind(&production.product_id)
        .bind(production.quantity.to_string())
        .bind(production.revenue.to_string())
        .bind(production.created_at)
        .execute(&mut *conn)
        .await?;

        for (position, used) in production.used_materials.iter().enumerate() {
            sqlx::query(
                "INSERT INTO production_materials (production_id, position, material_id, amount, unit) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )
            .bind(&production.id)
            .bind(position as i64)
            .bind(&used.material_id)
            .bind(used.amount.to_string())
            .bind(used.unit.as_str())
            .execute(&mut *conn)
            .await?;
        }

        Ok(())
    }
}
