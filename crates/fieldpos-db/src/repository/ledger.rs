//! # Stock Ledger
//!
//! The single owner of every balance change. Each call debits or credits
//! one subject and appends exactly one movement record; the append-only
//! movement history is the audit trail the balances must always reconcile
//! against.
//!
//! ## The Invariant
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │  For any material or product, after every operation:                 │
//! │                                                                      │
//! │      current stock == Σ(IN quantities) − Σ(OUT quantities)           │
//! │      current stock >= 0                                              │
//! │                                                                      │
//! │  Enforced by:                                                        │
//! │  1. Balance update + movement insert in the SAME statement pair,     │
//! │     inside the caller's transaction                                  │
//! │  2. Check-then-act runs on the single writer connection, so no       │
//! │     other unit can interleave between the read and the write         │
//! │  3. Any failure aborts the whole unit via transaction rollback       │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Write operations take the caller's `&mut SqliteConnection` (the atomic
//! unit's transaction); they never open their own.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteConnection;
use sqlx::{FromRow, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use fieldpos_core::{Movement, MovementDirection, StockError, SubjectKind};

use crate::error::DbResult;
use crate::repository::parse_decimal;

#[derive(Debug, FromRow)]
struct BalanceRow {
    id: String,
    name: String,
    stock: String,
}

#[derive(Debug, FromRow)]
struct MovementRow {
    id: String,
    subject_kind: String,
    subject_id: String,
    direction: String,
    quantity: String,
    price: Option<String>,
    note: String,
    date: DateTime<Utc>,
}

impl MovementRow {
    fn into_movement(self) -> DbResult<Movement> {
        let quantity = parse_decimal("Movement", &self.id, "quantity", &self.quantity)?;
        let price = match &self.price {
            Some(p) => Some(parse_decimal("Movement", &self.id, "price", p)?),
            None => None,
        };
        let subject_kind = crate::repository::parse_subject_kind("Movement", &self.id, &self.subject_kind)?;
        let direction = match self.direction.as_str() {
            "IN" => MovementDirection::In,
            "OUT" => MovementDirection::Out,
            other => {
                return Err(crate::error::DbError::Corrupt {
                    entity: "Movement".to_string(),
                    id: self.id.clone(),
                    field: "direction".to_string(),
                    value: other.to_string(),
                })
            }
        };
        Ok(Movement {
            id: self.id,
            subject_kind,
            subject_id: self.subject_id,
            direction,
            quantity,
            price,
            note: self.note,
            date: self.date,
        })
    }
}

fn balance_table(kind: SubjectKind) -> &'static str {
    match kind {
        SubjectKind::Material => "materials",
        SubjectKind::Product => "products",
    }
}

/// The stock ledger: balance reads plus the only two balance mutations in
/// the system.
#[derive(Debug, Clone)]
pub struct StockLedger {
    pool: SqlitePool,
}

impl StockLedger {
    /// Creates a new StockLedger on the read pool.
    pub fn new(pool: SqlitePool) -> Self {
        StockLedger { pool }
    }

    /// All movements for a subject, oldest first.
    pub async fn movements_for(
        &self,
        kind: SubjectKind,
        subject_id: &str,
    ) -> DbResult<Vec<Movement>> {
        let rows = sqlx::query_as::<_, MovementRow>(
            r#"
            SELECT id, subject_kind, subject_id, direction, quantity, price, note, date
            FROM movements
            WHERE subject_kind = ?1 AND subject_id = ?2
            ORDER BY date, id
            "#,
        )
        .bind(kind.as_str())
        .bind(subject_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(MovementRow::into_movement).collect()
    }

    /// Σ(IN) − Σ(OUT) over a subject's movements. Reconciliation read: the
    /// result must always equal the stored balance.
    pub async fn movement_balance(&self, kind: SubjectKind, subject_id: &str) -> DbResult<Decimal> {
        let movements = self.movements_for(kind, subject_id).await?;
        Ok(movements.iter().fold(Decimal::ZERO, |acc, m| match m.direction {
            MovementDirection::In => acc + m.quantity,
            MovementDirection::Out => acc - m.quantity,
        }))
    }

    // -------------------------------------------------------------------------
    // Transaction-scoped mutations
    // -------------------------------------------------------------------------

    /// Debits `quantity` from a subject's balance and appends one OUT
    /// movement. Returns the new balance.
    ///
    /// ## Errors
    /// - [`StockError::InvalidQuantity`] if `quantity <= 0`
    /// - [`StockError::NotFound`] if the subject doesn't exist
    /// - [`StockError::InsufficientStock`] if `quantity` exceeds the balance,
    ///   naming the subject and the shortfall amounts
    pub async fn debit(
        conn: &mut SqliteConnection,
        kind: SubjectKind,
        subject_id: &str,
        quantity: Decimal,
        note: &str,
    ) -> DbResult<Decimal> {
        let (name, balance) = Self::load_balance(&mut *conn, kind, subject_id, quantity).await?;

        if balance < quantity {
            return Err(StockError::InsufficientStock {
                name,
                available: balance,
                requested: quantity,
            }
            .into());
        }

        let new_balance = balance - quantity;
        Self::store_balance(&mut *conn, kind, subject_id, new_balance).await?;
        Self::append_movement(
            &mut *conn,
            kind,
            subject_id,
            MovementDirection::Out,
            quantity,
            None,
            note,
        )
        .await?;

        debug!(subject = %name, %quantity, %new_balance, "Debit");
        Ok(new_balance)
    }

    /// Credits `quantity` to a subject's balance and appends one IN
    /// movement (carrying `price` when the credit is a priced restock).
    /// Returns the new balance.
    ///
    /// ## Errors
    /// - [`StockError::InvalidQuantity`] if `quantity <= 0`
    /// - [`StockError::NotFound`] if the subject doesn't exist
    pub async fn credit(
        conn: &mut SqliteConnection,
        kind: SubjectKind,
        subject_id: &str,
        quantity: Decimal,
        price: Option<Decimal>,
        note: &str,
    ) -> DbResult<Decimal> {
        let (name, balance) = Self::load_balance(&mut *conn, kind, subject_id, quantity).await?;

        let new_balance = balance + quantity;
        Self::store_balance(&mut *conn, kind, subject_id, new_balance).await?;
        Self::append_movement(
            &mut *conn,
            kind,
            subject_id,
            MovementDirection::In,
            quantity,
            price,
            note,
        )
        .await?;

        debug!(subject = %name, %quantity, %new_balance, "Credit");
        Ok(new_balance)
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    async fn load_balance(
        conn: &mut SqliteConnection,
        kind: SubjectKind,
        subject_id: &str,
        quantity: Decimal,
    ) -> DbResult<(String, Decimal)> {
        if quantity <= Decimal::ZERO {
            return Err(StockError::InvalidQuantity {
                subject: subject_id.to_string(),
                quantity,
            }
            .into());
        }

        let row = sqlx::query_as::<_, BalanceRow>(&format!(
            "SELECT id, name, stock FROM {} WHERE id = ?1",
            balance_table(kind)
        ))
        .bind(subject_id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| {
            StockError::NotFound {
                entity: match kind {
                    SubjectKind::Material => "Material".to_string(),
                    SubjectKind::Product => "Product".to_string(),
                },
                id: subject_id.to_string(),
            }
        })?;

        let balance = parse_decimal(balance_table(kind), &row.id, "stock", &row.stock)?;
        Ok((row.name, balance))
    }

    async fn store_balance(
        conn: &mut SqliteConnection,
        kind: SubjectKind,
        subject_id: &str,
        balance: Decimal,
    ) -> DbResult<()> {
        sqlx::query(&format!(
            "UPDATE {} SET stock = ?2, updated_at = ?3 WHERE id = ?1",
            balance_table(kind)
        ))
        .bind(subject_id)
        .bind(balance.to_string())
        .bind(Utc::now())
        .execute(conn)
        .await?;
        Ok(())
    }

    async fn append_movement(
        conn: &mut SqliteConnection,
        kind: SubjectKind,
        subject_id: &str,
        direction: MovementDirection,
        quantity: Decimal,
        price: Option<Decimal>,
        note: &str,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO movements (id, subject_kind, subject_id, direction, quantity, price, note, date)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(kind.as_str())
        .bind(subject_id)
        .bind(direction.as_str())
        .bind(quantity.to_string())
        .bind(price.map(|p| p.to_string()))
        .bind(note)
        .bind(Utc::now())
        .execute(conn)
        .await?;
        Ok(())
    }
}
