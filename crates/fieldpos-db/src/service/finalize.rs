//! # Finalization Engine
//!
//! Merges a user's carts into one immutable final sale.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │  carts {A:2}, {A:3, B:1}   ──►   sale lines {A:5, B:1}               │
//! │                                                                      │
//! │  price    snapshot of each product's selling price at finalize time  │
//! │  total    Σ(quantity × price)                                        │
//! │  pickups  deduplicated union of the carts' pickup references         │
//! │  carts    deleted in the same unit (not archived)                    │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! No stock moves here: the goods already left the ledger at pickup time.

use std::collections::HashMap;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::info;
use uuid::Uuid;

use fieldpos_core::{Cart, FinalSale, FinalizeRequest, SaleLine, StockError};

use crate::error::{DbError, DbResult};
use crate::pool::Database;
use crate::repository::cart::CartRepository;
use crate::repository::product::ProductRepository;
use crate::repository::sale::FinalSaleRepository;

/// Service that commits carts into final sales.
#[derive(Debug, Clone)]
pub struct FinalizationEngine {
    db: Database,
}

impl FinalizationEngine {
    pub fn new(db: Database) -> Self {
        FinalizationEngine { db }
    }

    /// Merges the given carts (which must belong to `user_id`) into one
    /// final sale, then deletes them.
    ///
    /// ## Errors
    /// - [`StockError::Validation`] on a bad request (incl. a positive
    ///   expense without a note)
    /// - [`StockError::NotFound`] if none of the carts exist for the user,
    ///   or a cart references an unknown product
    pub async fn finalize(&self, req: FinalizeRequest) -> DbResult<FinalSale> {
        req.validate()?;

        let mut tx = self.db.begin_write().await?;

        let carts = CartRepository::load_for_user(&mut tx, &req.cart_ids, req.user_id.trim())
            .await?;
        if carts.is_empty() {
            return Err(StockError::NotFound {
                entity: "Cart".to_string(),
                id: req.cart_ids.join(", "),
            }
            .into());
        }

        let (aggregated, pickup_ids) = Self::aggregate(&carts);

        let mut items = Vec::with_capacity(aggregated.len());
        let mut total = Decimal::ZERO;
        for (product_id, quantity) in aggregated {
            let product = ProductRepository::get_in_tx(&mut tx, &product_id)
                .await?
                .ok_or_else(|| DbError::not_found("Product", &product_id))?;
            total += quantity * product.selling_price;
            items.push(SaleLine {
                product_id,
                quantity,
                price: product.selling_price,
            });
        }

        let sale = FinalSale {
            id: Uuid::new_v4().to_string(),
            user_id: req.user_id.trim().to_string(),
            pickup_ids,
            items,
            total,
            expense: req.expense,
            expense_note: req.expense_note.clone(),
            completed_at: Utc::now(),
        };
        FinalSaleRepository::insert(&mut tx, &sale).await?;

        let merged: Vec<String> = carts.iter().map(|c| c.id.clone()).collect();
        CartRepository::delete_many(&mut tx, &merged).await?;

        tx.commit().await?;
        info!(
            id = %sale.id,
            user_id = %sale.user_id,
            carts = merged.len(),
            total = %sale.total,
            "Sale finalized"
        );
        Ok(sale)
    }

    /// Sums line quantities per product (first-seen order) and collects the
    /// deduplicated union of pickup references.
    fn aggregate(carts: &[Cart]) -> (Vec<(String, Decimal)>, Vec<String>) {
        let mut order: Vec<String> = Vec::new();
        let mut quantities: HashMap<String, Decimal> = HashMap::new();
        let mut pickup_ids: Vec<String> = Vec::new();

        for cart in carts {
            for line in &cart.items {
                if !quantities.contains_key(&line.product_id) {
                    order.push(line.product_id.clone());
                }
                *quantities.entry(line.product_id.clone()).or_insert(Decimal::ZERO) +=
                    line.quantity;
            }
            for pickup_id in &cart.pickup_ids {
                if !pickup_ids.contains(pickup_id) {
                    pickup_ids.push(pickup_id.clone());
                }
            }
        }

        let aggregated = order
            .into_iter()
            .map(|id| {
                let quantity = quantities.get(&id).copied().unwrap_or(Decimal::ZERO);
                (id, quantity)
            })
            .collect();
        (aggregated, pickup_ids)
    }
}
