//! # Reservation Manager
//!
//! Turns a pickup request into an `active` reservation, debiting stock for
//! every line in one atomic unit.
//!
//! ## What gets debited
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │  direct material line        ──► debit that material                 │
//! │  product line, produced      ──► debit the product's own balance     │
//! │  product line, on demand     ──► debit each recipe material and      │
//! │                                  record the amounts as materials_used│
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A shortfall anywhere aborts the whole unit: no partial reservation ever
//! reaches the database, and no pickup record is written.

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use fieldpos_core::{
    resolve_consumption, CreatePickupRequest, Pickup, PickupMaterialLine, PickupProductLine,
    PickupStatus, SubjectKind,
};

use crate::error::{DbError, DbResult};
use crate::pool::Database;
use crate::repository::ledger::StockLedger;
use crate::repository::material::MaterialRepository;
use crate::repository::pickup::PickupRepository;
use crate::repository::product::ProductRepository;

const DEFAULT_PICKUP_NOTE: &str = "Stock pickup";

/// Service for creating reservations.
#[derive(Debug, Clone)]
pub struct ReservationManager {
    db: Database,
}

impl ReservationManager {
    pub fn new(db: Database) -> Self {
        ReservationManager { db }
    }

    /// Reserves the requested lines all-or-nothing and records an `active`
    /// pickup for the user.
    ///
    /// ## Errors
    /// - [`StockError::Validation`] on a bad request (no lines, bad
    ///   quantities, negative cash float)
    /// - [`StockError::NotFound`] for an unknown material or product
    /// - [`StockError::InsufficientStock`] naming the first short subject;
    ///   every debit made so far is rolled back
    ///
    /// [`StockError::Validation`]: fieldpos_core::StockError::Validation
    /// [`StockError::NotFound`]: fieldpos_core::StockError::NotFound
    /// [`StockError::InsufficientStock`]: fieldpos_core::StockError::InsufficientStock
    pub async fn create_pickup(&self, req: CreatePickupRequest) -> DbResult<Pickup> {
        req.validate()?;

        let note = req
            .note
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(DEFAULT_PICKUP_NOTE);

        let mut tx = self.db.begin_write().await?;

        let mut direct_materials = Vec::with_capacity(req.direct_materials.len());
        for line in &req.direct_materials {
            StockLedger::debit(
                &mut tx,
                SubjectKind::Material,
                &line.material_id,
                line.quantity,
                note,
            )
            .await?;
            direct_materials.push(PickupMaterialLine {
                material_id: line.material_id.clone(),
                quantity: line.quantity,
            });
        }

        let mut product_items = Vec::with_capacity(req.product_items.len());
        for line in &req.product_items {
            let product = ProductRepository::get_in_tx(&mut tx, &line.product_id)
                .await?
                .ok_or_else(|| DbError::not_found("Product", &line.product_id))?;

            let materials_used = if product.produced {
                // Stocked goods come off the product's own balance.
                StockLedger::debit(
                    &mut tx,
                    SubjectKind::Product,
                    &product.id,
                    line.quantity,
                    note,
                )
                .await?;
                Vec::new()
            } else {
                // On-demand goods consume their recipe materials instead.
                let material_ids: Vec<String> =
                    product.recipe.iter().map(|l| l.material_id.clone()).collect();
                let materials = MaterialRepository::snapshot(&mut tx, &material_ids).await?;
                let draws = resolve_consumption(&product, line.quantity, &materials)?;

                let assembly_note = format!("Assembled {} x {}", line.quantity, product.name);
                for draw in &draws {
                    StockLedger::debit(
                        &mut tx,
                        SubjectKind::Material,
                        &draw.material.id,
                        draw.amount,
                        &assembly_note,
                    )
                    .await?;
                }
                draws.iter().map(|d| d.to_use()).collect()
            };

            product_items.push(PickupProductLine {
                product_id: product.id,
                quantity: line.quantity,
                materials_used,
            });
        }

        let pickup = Pickup {
            id: Uuid::new_v4().to_string(),
            user_id: req.user_id.trim().to_string(),
            created_at: Utc::now(),
            note: req.note.clone(),
            cash_float: req.cash_float,
            direct_materials,
            product_items,
            status: PickupStatus::Active,
        };
        PickupRepository::insert(&mut tx, &pickup).await?;

        tx.commit().await?;
        info!(
            id = %pickup.id,
            user_id = %pickup.user_id,
            materials = pickup.direct_materials.len(),
            products = pickup.product_items.len(),
            "Pickup created"
        );
        Ok(pickup)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use crate::test_support::{open_temp_db, seed_material, seed_product};
    use fieldpos_core::{MaterialLineInput, ProductLineInput, StockError, StockUnit};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn material_pickup(user_id: &str, material_id: &str, quantity: Decimal) -> CreatePickupRequest {
        CreatePickupRequest {
            user_id: user_id.to_string(),
            direct_materials: vec![MaterialLineInput {
                material_id: material_id.to_string(),
                quantity,
            }],
            product_items: vec![],
            cash_float: Decimal::ZERO,
            note: None,
        }
    }

    #[tokio::test]
    async fn test_on_demand_product_consumes_materials() {
        let db = open_temp_db().await;
        let milk = seed_material(&db, "Milk", StockUnit::VolumeLarge, dec!(1), dec!(18000)).await;
        let latte = seed_product(
            &db,
            "Latte",
            vec![(milk.id.clone(), dec!(200))],
            false,
            dec!(15000),
        )
        .await;

        let pickup = db
            .reservations()
            .create_pickup(CreatePickupRequest {
                user_id: "u1".to_string(),
                direct_materials: vec![],
                product_items: vec![ProductLineInput {
                    product_id: latte.id.clone(),
                    quantity: dec!(2),
                }],
                cash_float: dec!(50000),
                note: None,
            })
            .await
            .unwrap();

        assert_eq!(pickup.status, PickupStatus::Active);
        assert_eq!(pickup.product_items[0].materials_used.len(), 1);
        assert_eq!(pickup.product_items[0].materials_used[0].amount, dec!(0.4));

        // The milk moved; the product balance never did.
        let milk_after = db.materials().get(&milk.id).await.unwrap().unwrap();
        assert_eq!(milk_after.stock, dec!(0.6));
        let latte_after = db.products().get(&latte.id).await.unwrap().unwrap();
        assert_eq!(latte_after.stock, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_produced_product_comes_off_its_own_balance() {
        let db = open_temp_db().await;
        let milk = seed_material(&db, "Milk", StockUnit::VolumeLarge, dec!(10), dec!(18000)).await;
        let bottled = seed_product(
            &db,
            "Bottled Coffee",
            vec![(milk.id.clone(), dec!(100))],
            true,
            dec!(20000),
        )
        .await;
        db.production()
            .produce(fieldpos_core::ProduceRequest {
                product_id: bottled.id.clone(),
                quantity: dec!(5),
            })
            .await
            .unwrap();

        let pickup = db
            .reservations()
            .create_pickup(CreatePickupRequest {
                user_id: "u1".to_string(),
                direct_materials: vec![],
                product_items: vec![ProductLineInput {
                    product_id: bottled.id.clone(),
                    quantity: dec!(3),
                }],
                cash_float: Decimal::ZERO,
                note: Some("morning route".to_string()),
            })
            .await
            .unwrap();

        assert!(pickup.product_items[0].materials_used.is_empty());
        let after = db.products().get(&bottled.id).await.unwrap().unwrap();
        assert_eq!(after.stock, dec!(2));
    }

    #[tokio::test]
    async fn test_shortfall_mid_pickup_leaves_nothing_behind() {
        let db = open_temp_db().await;
        let sugar = seed_material(&db, "Sugar", StockUnit::MassLarge, dec!(10), dec!(14000)).await;
        let salt = seed_material(&db, "Salt", StockUnit::MassLarge, dec!(1), dec!(8000)).await;

        let err = db
            .reservations()
            .create_pickup(CreatePickupRequest {
                user_id: "u1".to_string(),
                direct_materials: vec![
                    MaterialLineInput {
                        material_id: sugar.id.clone(),
                        quantity: dec!(5),
                    },
                    MaterialLineInput {
                        material_id: salt.id.clone(),
                        quantity: dec!(5),
                    },
                ],
                product_items: vec![],
                cash_float: Decimal::ZERO,
                note: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Stock(StockError::InsufficientStock { .. })
        ));

        // The sugar debit rolled back and no pickup record exists.
        let sugar_after = db.materials().get(&sugar.id).await.unwrap().unwrap();
        assert_eq!(sugar_after.stock, dec!(10));
        assert!(db.pickups().list_for_user("u1").await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_concurrent_pickups_settle_deterministically() {
        let db = open_temp_db().await;
        let sugar = seed_material(&db, "Sugar", StockUnit::MassLarge, dec!(10), dec!(14000)).await;

        let db_a = db.clone();
        let db_b = db.clone();
        let id_a = sugar.id.clone();
        let id_b = sugar.id.clone();
        let a = tokio::spawn(async move {
            db_a.reservations()
                .create_pickup(material_pickup("user-a", &id_a, dec!(6)))
                .await
        });
        let b = tokio::spawn(async move {
            db_b.reservations()
                .create_pickup(material_pickup("user-b", &id_b, dec!(6)))
                .await
        });

        let results = [a.await.unwrap(), b.await.unwrap()];
        let oks = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(oks, 1, "exactly one pickup wins the race");
        let loser = results.iter().find(|r| r.is_err()).unwrap();
        assert!(matches!(
            loser.as_ref().unwrap_err(),
            DbError::Stock(StockError::InsufficientStock { .. })
        ));

        let after = db.materials().get(&sugar.id).await.unwrap().unwrap();
        assert_eq!(after.stock, dec!(4));
    }
}
