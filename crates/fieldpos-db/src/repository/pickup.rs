//! # Pickup Repository
//!
//! Database operations for reservations.
//!
//! Pickups are immutable after create except for the single
//! active→completed status flip applied by return processing; they are
//! never deleted.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteConnection;
use sqlx::{FromRow, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use fieldpos_core::{
    MaterialUse, Pickup, PickupMaterialLine, PickupProductLine, PickupStatus,
};

use crate::error::{DbError, DbResult};
use crate::repository::{parse_decimal, parse_unit};

#[derive(Debug, FromRow)]
struct PickupRow {
    id: String,
    user_id: String,
    created_at: DateTime<Utc>,
    note: Option<String>,
    cash_float: String,
    status: String,
}

#[derive(Debug, FromRow)]
struct MaterialLineRow {
    material_id: String,
    quantity: String,
}

#[derive(Debug, FromRow)]
struct ProductLineRow {
    id: String,
    product_id: String,
    quantity: String,
}

#[derive(Debug, FromRow)]
struct MaterialUseRow {
    material_id: String,
    amount: String,
    unit: String,
}

const SELECT_PICKUP: &str =
    "SELECT id, user_id, created_at, note, cash_float, status FROM pickups";

/// Repository for pickup (reservation) operations.
#[derive(Debug, Clone)]
pub struct PickupRepository {
    pool: SqlitePool,
}

impl PickupRepository {
    /// Creates a new PickupRepository on the read pool.
    pub fn new(pool: SqlitePool) -> Self {
        PickupRepository { pool }
    }

    /// Gets a pickup with all of its lines.
    pub async fn get(&self, id: &str) -> DbResult<Option<Pickup>> {
        let mut conn = self.pool.acquire().await?;
        Self::get_in_tx(&mut conn, id).await
    }

    /// Lists a user's pickups, newest first.
    pub async fn list_for_user(&self, user_id: &str) -> DbResult<Vec<Pickup>> {
        let rows = sqlx::query_as::<_, PickupRow>(&format!(
            "{SELECT_PICKUP} WHERE user_id = ?1 ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let mut conn = self.pool.acquire().await?;
        let mut pickups = Vec::with_capacity(rows.len());
        for row in rows {
            pickups.push(Self::assemble(&mut conn, row).await?);
        }
        Ok(pickups)
    }

    // -------------------------------------------------------------------------
    // Transaction-scoped operations
    // -------------------------------------------------------------------------

    /// Gets a pickup inside an atomic unit.
    pub async fn get_in_tx(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Pickup>> {
        let row = sqlx::query_as::<_, PickupRow>(&format!("{SELECT_PICKUP} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

        match row {
            Some(row) => Ok(Some(Self::assemble(conn, row).await?)),
            None => Ok(None),
        }
    }

    /// Loads all of a user's `active` pickups with their lines.
    pub async fn active_for_user(
        conn: &mut SqliteConnection,
        user_id: &str,
    ) -> DbResult<Vec<Pickup>> {
        let rows = sqlx::query_as::<_, PickupRow>(&format!(
            "{SELECT_PICKUP} WHERE user_id = ?1 AND status = 'active' ORDER BY created_at"
        ))
        .bind(user_id)
        .fetch_all(&mut *conn)
        .await?;

        let mut pickups = Vec::with_capacity(rows.len());
        for row in rows {
            pickups.push(Self::assemble(conn, row).await?);
        }
        Ok(pickups)
    }

    /// Marks every `active` pickup of the user `completed`. Returns how
    /// many were closed.
    pub async fn complete_active_for_user(
        conn: &mut SqliteConnection,
        user_id: &str,
    ) -> DbResult<u64> {
        let result = sqlx::query(
            "UPDATE pickups SET status = 'completed' WHERE user_id = ?1 AND status = 'active'",
        )
        .bind(user_id)
        .execute(conn)
        .await?;

        debug!(user_id = %user_id, closed = result.rows_affected(), "Completed pickups");
        Ok(result.rows_affected())
    }

    /// Inserts a pickup with all of its lines.
    pub async fn insert(conn: &mut SqliteConnection, pickup: &Pickup) -> DbResult<()> {
        debug!(id = %pickup.id, user_id = %pickup.user_id, "Inserting pickup");

        sqlx::query(
            r#"
            INSERT INTO pickups (id, user_id, created_at, note, cash_float, status)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&pickup.id)
        .bind(&pickup.user_id)
        .bind(pickup.created_at)
        .bind(&pickup.note)
        .bind(pickup.cash_float.to_string())
        .bind(pickup.status.as_str())
        .execute(&mut *conn)
        .await?;

        for (position, line) in pickup.direct_materials.iter().enumerate() {
            sqlx::query(
                "INSERT INTO pickup_material_lines (pickup_id, position, material_id, quantity) \
                 VALUES (?1, ?2, ?3, ?4)",
            )
            .bind(&pickup.id)
            .bind(position as i64)
            .bind(&line.material_id)
            .bind(line.quantity.to_string())
            .execute(&mut *conn)
            .await?;
        }

        for (position, line) in pickup.product_items.iter().enumerate() {
            let line_id = Uuid::new_v4().to_string();
            sqlx::query(
                "INSERT INTO pickup_product_lines (id, pickup_id, position, product_id, quantity) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )
            .bind(&line_id)
            .bind(&pickup.id)
            .bind(position as i64)
            .bind(&line.product_id)
            .bind(line.quantity.to_string())
            .execute(&mut *conn)
            .await?;

            for (use_position, used) in line.materials_used.iter().enumerate() {
                sqlx::query(
                    "INSERT INTO pickup_materials_used (line_id, position, material_id, amount, unit) \
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                )
                .bind(&line_id)
                .bind(use_position as i64)
                .bind(&used.material_id)
                .bind(used.amount.to_string())
                .bind(used.unit.as_str())
                .execute(&mut *conn)
                .await?;
            }
        }

        Ok(())
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    async fn assemble(conn: &mut SqliteConnection, row: PickupRow) -> DbResult<Pickup> {
        let status = match row.status.as_str() {
            "active" => PickupStatus::Active,
            "completed" => PickupStatus::Completed,
            other => {
                return Err(DbError::Corrupt {
                    entity: "Pickup".to_string(),
                    id: row.id.clone(),
                    field: "status".to_string(),
                    value: other.to_string(),
                })
            }
        };

        let material_rows = sqlx::query_as::<_, MaterialLineRow>(
            "SELECT material_id, quantity FROM pickup_material_lines \
             WHERE pickup_id = ?1 ORDER BY position",
        )
        .bind(&row.id)
        .fetch_all(&mut *conn)
        .await?;

        let mut direct_materials = Vec::with_capacity(material_rows.len());
        for line in material_rows {
            direct_materials.push(PickupMaterialLine {
                quantity: parse_decimal("PickupMaterialLine", &row.id, "quantity", &line.quantity)?,
                material_id: line.material_id,
            });
        }

        let product_rows = sqlx::query_as::<_, ProductLineRow>(
            "SELECT id, product_id, quantity FROM pickup_product_lines \
             WHERE pickup_id = ?1 ORDER BY position",
        )
        .bind(&row.id)
        .fetch_all(&mut *conn)
        .await?;

        let mut product_items = Vec::with_capacity(product_rows.len());
        for line in product_rows {
            let use_rows = sqlx::query_as::<_, MaterialUseRow>(
                "SELECT material_id, amount, unit FROM pickup_materials_used \
                 WHERE line_id = ?1 ORDER BY position",
            )
            .bind(&line.id)
            .fetch_all(&mut *conn)
            .await?;

            let mut materials_used = Vec::with_capacity(use_rows.len());
            for used in use_rows {
                materials_used.push(MaterialUse {
                    amount: parse_decimal("PickupMaterialUse", &line.id, "amount", &used.amount)?,
                    unit: parse_unit("PickupMaterialUse", &line.id, &used.unit)?,
                    material_id: used.material_id,
                });
            }

            product_items.push(PickupProductLine {
                quantity: parse_decimal("PickupProductLine", &line.id, "quantity", &line.quantity)?,
                product_id: line.product_id,
                materials_used,
            });
        }

        Ok(Pickup {
            cash_float: parse_decimal("Pickup", &row.id, "cash_float", &row.cash_float)?,
            id: row.id,
            user_id: row.user_id,
            created_at: row.created_at,
            note: row.note,
            direct_materials,
            product_items,
            status,
        })
    }
}
