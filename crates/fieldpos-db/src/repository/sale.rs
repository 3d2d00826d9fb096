//! # Final Sale & Return Repositories
//!
//! Database operations for the two immutable closing records of the
//! lifecycle: the final sale a finalization produces and the return that
//! reconciles the reservation set.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteConnection;
use sqlx::{FromRow, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use fieldpos_core::{FinalSale, MaterialUse, ReturnLine, SaleLine, StockReturn};

use crate::error::DbResult;
use crate::repository::{parse_decimal, parse_subject_kind, parse_unit};

// =============================================================================
// Final Sales
// =============================================================================

#[derive(Debug, FromRow)]
struct FinalSaleRow {
    id: String,
    user_id: String,
    total: String,
    expense: String,
    expense_note: Option<String>,
    completed_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct SaleLineRow {
    product_id: String,
    quantity: String,
    price: String,
}

#[derive(Debug, FromRow)]
struct SalePickupRow {
    pickup_id: String,
}

/// Repository for final sale records.
#[derive(Debug, Clone)]
pub struct FinalSaleRepository {
    pool: SqlitePool,
}

impl FinalSaleRepository {
    /// Creates a new FinalSaleRepository on the read pool.
    pub fn new(pool: SqlitePool) -> Self {
        FinalSaleRepository { pool }
    }

    /// Gets a final sale with its lines and pickup references.
    pub async fn get(&self, id: &str) -> DbResult<Option<FinalSale>> {
        let row = sqlx::query_as::<_, FinalSaleRow>(
            "SELECT id, user_id, total, expense, expense_note, completed_at \
             FROM final_sales WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let row = match row {
            Some(row) => row,
            None => return Ok(None),
        };

        let pickup_rows = sqlx::query_as::<_, SalePickupRow>(
            "SELECT pickup_id FROM final_sale_pickups WHERE sale_id = ?1",
        )
        .bind(&row.id)
        .fetch_all(&self.pool)
        .await?;

        let line_rows = sqlx::query_as::<_, SaleLineRow>(
            "SELECT product_id, quantity, price FROM final_sale_lines \
             WHERE sale_id = ?1 ORDER BY position",
        )
        .bind(&row.id)
        .fetch_all(&self.pool)
        .await?;

        let mut items = Vec::with_capacity(line_rows.len());
        for line in line_rows {
            items.push(SaleLine {
                quantity: parse_decimal("SaleLine", &row.id, "quantity", &line.quantity)?,
                price: parse_decimal("SaleLine", &row.id, "price", &line.price)?,
                product_id: line.product_id,
            });
        }

        Ok(Some(FinalSale {
            total: parse_decimal("FinalSale", &row.id, "total", &row.total)?,
            expense: parse_decimal("FinalSale", &row.id, "expense", &row.expense)?,
            id: row.id,
            user_id: row.user_id,
            pickup_ids: pickup_rows.into_iter().map(|p| p.pickup_id).collect(),
            items,
            expense_note: row.expense_note,
            completed_at: row.completed_at,
        }))
    }

    /// Inserts a final sale with its lines and pickup references.
    pub async fn insert(conn: &mut SqliteConnection, sale: &FinalSale) -> DbResult<()> {
        debug!(id = %sale.id, user_id = %sale.user_id, total = %sale.total, "Inserting final sale");

        sqlx::query(
            r#"
            INSERT INTO final_sales (id, user_id, total, expense, expense_note, completed_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&sale.id)
        .bind(&sale.user_id)
        .bind(sale.total.to_string())
        .bind(sale.expense.to_string())
        .bind(&sale.expense_note)
        .bind(sale.completed_at)
        .execute(&mut *conn)
        .await?;

        for pickup_id in &sale.pickup_ids {
            sqlx::query("INSERT INTO final_sale_pickups (sale_id, pickup_id) VALUES (?1, ?2)")
                .bind(&sale.id)
                .bind(pickup_id)
                .execute(&mut *conn)
                .await?;
        }

        for (position, line) in sale.items.iter().enumerate() {
            sqlx::query(
                "INSERT INTO final_sale_lines (sale_id, position, product_id, quantity, price) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )
            .bind(&sale.id)
            .bind(position as i64)
            .bind(&line.product_id)
            .bind(line.quantity.to_string())
            .bind(line.price.to_string())
            .execute(&mut *conn)
            .await?;
        }

        Ok(())
    }

    /// Whether a final sale exists, checked inside an atomic unit.
    pub async fn exists_in_tx(conn: &mut SqliteConnection, id: &str) -> DbResult<bool> {
        let row: Option<(String,)> = sqlx::query_as("SELECT id FROM final_sales WHERE id = ?1")
            .bind(id)
            .fetch_optional(conn)
            .await?;
        Ok(row.is_some())
    }
}

// =============================================================================
// Returns
// =============================================================================

#[derive(Debug, FromRow)]
struct ReturnRow {
    id: String,
    user_id: String,
    final_sale_id: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct ReturnLineRow {
    id: String,
    subject_kind: String,
    subject_id: String,
    quantity: String,
}

#[derive(Debug, FromRow)]
struct RestoredRow {
    material_id: String,
    amount: String,
    unit: String,
}

/// Repository for return records.
#[derive(Debug, Clone)]
pub struct ReturnRepository {
    pool: SqlitePool,
}

impl ReturnRepository {
    /// Creates a new ReturnRepository on the read pool.
    pub fn new(pool: SqlitePool) -> Self {
        ReturnRepository { pool }
    }

    /// Gets a return with its lines.
    pub async fn get(&self, id: &str) -> DbResult<Option<StockReturn>> {
        let row = sqlx::query_as::<_, ReturnRow>(
            "SELECT id, user_id, final_sale_id, created_at FROM returns WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let row = match row {
            Some(row) => row,
            None => return Ok(None),
        };

        let line_rows = sqlx::query_as::<_, ReturnLineRow>(
            "SELECT id, subject_kind, subject_id, quantity FROM return_lines \
             WHERE return_id = ?1 ORDER BY position",
        )
        .bind(&row.id)
        .fetch_all(&self.pool)
        .await?;

        let mut lines = Vec::with_capacity(line_rows.len());
        for line in line_rows {
            let restored_rows = sqlx::query_as::<_, RestoredRow>(
                "SELECT material_id, amount, unit FROM return_materials_restored \
                 WHERE line_id = ?1 ORDER BY position",
            )
            .bind(&line.id)
            .fetch_all(&self.pool)
            .await?;

            let mut materials_restored = Vec::with_capacity(restored_rows.len());
            for restored in restored_rows {
                materials_restored.push(MaterialUse {
                    amount: parse_decimal("ReturnRestored", &line.id, "amount", &restored.amount)?,
                    unit: parse_unit("ReturnRestored", &line.id, &restored.unit)?,
                    material_id: restored.material_id,
                });
            }

            lines.push(ReturnLine {
                subject_kind: parse_subject_kind("ReturnLine", &line.id, &line.subject_kind)?,
                quantity: parse_decimal("ReturnLine", &line.id, "quantity", &line.quantity)?,
                subject_id: line.subject_id,
                materials_restored,
            });
        }

        Ok(Some(StockReturn {
            id: row.id,
            user_id: row.user_id,
            final_sale_id: row.final_sale_id,
            lines,
            created_at: row.created_at,
        }))
    }

    /// Inserts a return with its lines.
    pub async fn insert(conn: &mut SqliteConnection, ret: &StockReturn) -> DbResult<()> {
        debug!(id = %ret.id, user_id = %ret.user_id, "Inserting return");

        sqlx::query(
            "INSERT INTO returns (id, user_id, final_sale_id, created_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(&ret.id)
        .bind(&ret.user_id)
        .bind(&ret.final_sale_id)
        .bind(ret.created_at)
        .execute(&mut *conn)
        .await?;

        for (position, line) in ret.lines.iter().enumerate() {
            let line_id = Uuid::new_v4().to_string();
            sqlx::query(
                "INSERT INTO return_lines (id, return_id, position, subject_kind, subject_id, quantity) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )
            .bind(&line_id)
            .bind(&ret.id)
            .bind(position as i64)
            .bind(line.subject_kind.as_str())
            .bind(&line.subject_id)
            .bind(line.quantity.to_string())
            .execute(&mut *conn)
            .await?;

            for (restored_position, restored) in line.materials_restored.iter().enumerate() {
                sqlx::query(
                    "INSERT INTO return_materials_restored (line_id, position, material_id, amount, unit) \
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                )
                .bind(&line_id)
                .bind(restored_position as i64)
                .bind(&restored.material_id)
                .bind(restored.amount.to_string())
                .bind(restored.unit.as_str())
                .execute(&mut *conn)
                .await?;
            }
        }

        Ok(())
    }
}
