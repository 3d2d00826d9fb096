//! # Cart Repository
//!
//! Database operations for temp sales (carts).
//!
//! Carts are the one mutable aggregate: lines are fully replaced on every
//! update, and finalization deletes the cart outright (no archive).

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteConnection;
use sqlx::{FromRow, SqlitePool};
use tracing::debug;

use fieldpos_core::{Cart, CartLine};

use crate::error::DbResult;
use crate::repository::parse_decimal;

#[derive(Debug, FromRow)]
struct CartRow {
    id: String,
    user_id: String,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct CartLineRow {
    product_id: String,
    quantity: String,
}

#[derive(Debug, FromRow)]
struct CartPickupRow {
    pickup_id: String,
}

/// Repository for cart (temp sale) operations.
#[derive(Debug, Clone)]
pub struct CartRepository {
    pool: SqlitePool,
}

impl CartRepository {
    /// Creates a new CartRepository on the read pool.
    pub fn new(pool: SqlitePool) -> Self {
        CartRepository { pool }
    }

    /// Gets a cart with its lines and pickup references.
    pub async fn get(&self, id: &str) -> DbResult<Option<Cart>> {
        let mut conn = self.pool.acquire().await?;
        Self::get_in_tx(&mut conn, id).await
    }

    /// Lists a user's open carts.
    pub async fn list_for_user(&self, user_id: &str) -> DbResult<Vec<Cart>> {
        let rows = sqlx::query_as::<_, CartRow>(
            "SELECT id, user_id, updated_at FROM carts WHERE user_id = ?1 ORDER BY updated_at",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let mut conn = self.pool.acquire().await?;
        let mut carts = Vec::with_capacity(rows.len());
        for row in rows {
            carts.push(Self::assemble(&mut conn, row).await?);
        }
        Ok(carts)
    }

    // -------------------------------------------------------------------------
    // Transaction-scoped operations
    // -------------------------------------------------------------------------

    /// Gets a cart inside an atomic unit.
    pub async fn get_in_tx(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Cart>> {
        let row = sqlx::query_as::<_, CartRow>(
            "SELECT id, user_id, updated_at FROM carts WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        match row {
            Some(row) => Ok(Some(Self::assemble(conn, row).await?)),
            None => Ok(None),
        }
    }

    /// Loads the subset of `cart_ids` that exist and belong to `user_id`.
    /// Repeated ids load once; each cart contributes a single time.
    pub async fn load_for_user(
        conn: &mut SqliteConnection,
        cart_ids: &[String],
        user_id: &str,
    ) -> DbResult<Vec<Cart>> {
        let mut carts: Vec<Cart> = Vec::with_capacity(cart_ids.len());
        for id in cart_ids {
            if carts.iter().any(|c| &c.id == id) {
                continue;
            }
            if let Some(cart) = Self::get_in_tx(&mut *conn, id).await? {
                if cart.user_id == user_id {
                    carts.push(cart);
                }
            }
        }
        Ok(carts)
    }

    /// Inserts a cart with its lines and pickup references.
    pub async fn insert(conn: &mut SqliteConnection, cart: &Cart) -> DbResult<()> {
        debug!(id = %cart.id, user_id = %cart.user_id, "Inserting cart");

        sqlx::query("INSERT INTO carts (id, user_id, updated_at) VALUES (?1, ?2, ?3)")
            .bind(&cart.id)
            .bind(&cart.user_id)
            .bind(cart.updated_at)
            .execute(&mut *conn)
            .await?;

        for pickup_id in &cart.pickup_ids {
            sqlx::query("INSERT INTO cart_pickups (cart_id, pickup_id) VALUES (?1, ?2)")
                .bind(&cart.id)
                .bind(pickup_id)
                .execute(&mut *conn)
                .await?;
        }

        Self::insert_lines(conn, &cart.id, &cart.items).await
    }

    /// Fully overwrites a cart's lines (never merges). Returns `false` if
    /// the cart does not exist.
    pub async fn replace_items(
        conn: &mut SqliteConnection,
        cart_id: &str,
        items: &[CartLine],
        updated_at: DateTime<Utc>,
    ) -> DbResult<bool> {
        let result = sqlx::query("UPDATE carts SET updated_at = ?2 WHERE id = ?1")
            .bind(cart_id)
            .bind(updated_at)
            .execute(&mut *conn)
            .await?;

        if result.rows_affected() == 0 {
            return Ok(false);
        }

        sqlx::query("DELETE FROM cart_lines WHERE cart_id = ?1")
            .bind(cart_id)
            .execute(&mut *conn)
            .await?;

        Self::insert_lines(conn, cart_id, items).await?;
        Ok(true)
    }

    /// Deletes carts (lines and pickup references included) after they
    /// have been merged into a final sale.
    pub async fn delete_many(conn: &mut SqliteConnection, cart_ids: &[String]) -> DbResult<()> {
        for id in cart_ids {
            sqlx::query("DELETE FROM cart_lines WHERE cart_id = ?1")
                .bind(id)
                .execute(&mut *conn)
                .await?;
            sqlx::query("DELETE FROM cart_pickups WHERE cart_id = ?1")
                .bind(id)
                .execute(&mut *conn)
                .await?;
            sqlx::query("DELETE FROM carts WHERE id = ?1")
                .bind(id)
                .execute(&mut *conn)
                .await?;
        }
        debug!(count = cart_ids.len(), "Deleted finalized carts");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    async fn insert_lines(
        conn: &mut SqliteConnection,
        cart_id: &str,
        items: &[CartLine],
    ) -> DbResult<()> {
        for (position, line) in items.iter().enumerate() {
            sqlx::query(
                "INSERT INTO cart_lines (cart_id, position, product_id, quantity) \
                 VALUES (?1, ?2, ?3, ?4)",
            )
            .bind(cart_id)
            .bind(position as i64)
            .bind(&line.product_id)
            .bind(line.quantity.to_string())
            .execute(&mut *conn)
            .await?;
        }
        Ok(())
    }

    async fn assemble(conn: &mut SqliteConnection, row: CartRow) -> DbResult<Cart> {
        let pickup_rows = sqlx::query_as::<_, CartPickupRow>(
            "SELECT pickup_id FROM cart_pickups WHERE cart_id = ?1",
        )
        .bind(&row.id)
        .fetch_all(&mut *conn)
        .await?;

        let line_rows = sqlx::query_as::<_, CartLineRow>(
            "SELECT product_id, quantity FROM cart_lines WHERE cart_id = ?1 ORDER BY position",
        )
        .bind(&row.id)
        .fetch_all(&mut *conn)
        .await?;

        let mut items = Vec::with_capacity(line_rows.len());
        for line in line_rows {
            items.push(CartLine {
                quantity: parse_decimal("CartLine", &row.id, "quantity", &line.quantity)?,
                product_id: line.product_id,
            });
        }

        Ok(Cart {
            id: row.id,
            user_id: row.user_id,
            pickup_ids: pickup_rows.into_iter().map(|p| p.pickup_id).collect(),
            items,
            updated_at: row.updated_at,
        })
    }
}
