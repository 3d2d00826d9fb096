//! # Sales Cart Store
//!
//! Carts record sale intent while the seller is still in the field; they
//! never touch stock. Quantities are deliberately not checked against the
//! pickups here - the session is still open and lines will be rewritten.

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use fieldpos_core::{Cart, CartLine, CreateCartRequest, ReplaceCartItemsRequest, StockError};

use crate::error::{DbError, DbResult};
use crate::pool::Database;
use crate::repository::cart::CartRepository;

/// Service for cart (temp sale) operations.
#[derive(Debug, Clone)]
pub struct SalesCartStore {
    db: Database,
}

impl SalesCartStore {
    pub fn new(db: Database) -> Self {
        SalesCartStore { db }
    }

    /// Opens a cart of proposed sale lines against one or more pickups.
    ///
    /// ## Errors
    /// - [`StockError::Validation`] on a bad request
    pub async fn create_cart(&self, req: CreateCartRequest) -> DbResult<Cart> {
        req.validate()?;

        let cart = Cart {
            id: Uuid::new_v4().to_string(),
            user_id: req.user_id.trim().to_string(),
            pickup_ids: req.pickup_ids.clone(),
            items: req
                .items
                .iter()
                .map(|l| CartLine {
                    product_id: l.product_id.clone(),
                    quantity: l.quantity,
                })
                .collect(),
            updated_at: Utc::now(),
        };

        let mut tx = self.db.begin_write().await?;
        CartRepository::insert(&mut tx, &cart).await?;
        tx.commit().await?;

        info!(id = %cart.id, user_id = %cart.user_id, lines = cart.items.len(), "Cart created");
        Ok(cart)
    }

    /// Fully overwrites a cart's line items (never merges with the old
    /// ones) and returns the updated cart.
    ///
    /// ## Errors
    /// - [`StockError::Validation`] on a bad request
    /// - [`StockError::NotFound`] if the cart doesn't exist
    pub async fn replace_cart_items(&self, req: ReplaceCartItemsRequest) -> DbResult<Cart> {
        req.validate()?;

        let items: Vec<CartLine> = req
            .items
            .iter()
            .map(|l| CartLine {
                product_id: l.product_id.clone(),
                quantity: l.quantity,
            })
            .collect();

        let mut tx = self.db.begin_write().await?;

        let updated_at = Utc::now();
        if !CartRepository::replace_items(&mut tx, &req.cart_id, &items, updated_at).await? {
            return Err(StockError::NotFound {
                entity: "Cart".to_string(),
                id: req.cart_id.clone(),
            }
            .into());
        }

        let cart = CartRepository::get_in_tx(&mut tx, &req.cart_id)
            .await?
            .ok_or_else(|| DbError::not_found("Cart", &req.cart_id))?;

        tx.commit().await?;
        info!(id = %cart.id, lines = cart.items.len(), "Cart items replaced");
        Ok(cart)
    }
}
