//! # Return Processor
//!
//! The closing transaction of a reservation set. Everything the user's
//! `active` pickups took is summed into "taken" totals; each returned line
//! must fit inside them, and whatever fits is credited back to stock.
//! The same unit then flips every active pickup to `completed`, so a
//! second return for the session finds nothing left to close.
//!
//! Produced products are credited back onto their own balance. On-demand
//! products were never stocked, so their return restores the constituent
//! materials pro-rata from the `materials_used` recorded at pickup time.

use std::collections::HashMap;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::info;
use uuid::Uuid;

use fieldpos_core::{
    CreateReturnRequest, MaterialUse, Pickup, ReturnLine, StockError, StockReturn, SubjectKind,
};

use crate::error::{DbError, DbResult};
use crate::pool::Database;
use crate::repository::ledger::StockLedger;
use crate::repository::material::MaterialRepository;
use crate::repository::pickup::PickupRepository;
use crate::repository::product::ProductRepository;
use crate::repository::sale::{FinalSaleRepository, ReturnRepository};

/// Per-product totals across the user's active pickups.
#[derive(Debug, Default)]
struct TakenProduct {
    quantity: Decimal,
    materials_used: Vec<MaterialUse>,
}

impl TakenProduct {
    fn add_use(&mut self, used: &MaterialUse) {
        if let Some(existing) = self
            .materials_used
            .iter_mut()
            .find(|m| m.material_id == used.material_id)
        {
            existing.amount += used.amount;
        } else {
            self.materials_used.push(used.clone());
        }
    }
}

/// Service for return processing.
#[derive(Debug, Clone)]
pub struct ReturnProcessor {
    db: Database,
}

impl ReturnProcessor {
    pub fn new(db: Database) -> Self {
        ReturnProcessor { db }
    }

    /// Records the return that closes the user's active reservation set.
    ///
    /// Each returned quantity is capped at what the active pickups
    /// actually took; within the cap, materials and produced products are
    /// credited straight back, and on-demand products restore their
    /// recorded material draws pro-rata. Every active pickup of the user
    /// is marked `completed` in the same unit.
    ///
    /// ## Errors
    /// - [`StockError::Validation`] on a bad request
    /// - [`StockError::NotFound`] for an unknown final sale, material or
    ///   product
    /// - [`StockError::NoActiveReservation`] if the user has no active
    ///   pickups
    /// - [`StockError::ExcessiveReturn`] if a line exceeds what remains of
    ///   its subject's taken total (lines for the same subject share one
    ///   cap); no stock moves and no pickup is completed in that case
    pub async fn create_return(&self, req: CreateReturnRequest) -> DbResult<StockReturn> {
        req.validate()?;

        let user_id = req.user_id.trim();
        let mut tx = self.db.begin_write().await?;

        if !FinalSaleRepository::exists_in_tx(&mut tx, &req.final_sale_id).await? {
            return Err(DbError::not_found("FinalSale", &req.final_sale_id));
        }

        let pickups = PickupRepository::active_for_user(&mut tx, user_id).await?;
        if pickups.is_empty() {
            return Err(StockError::NoActiveReservation {
                user_id: user_id.to_string(),
            }
            .into());
        }

        let (material_taken, product_taken) = Self::taken_totals(&pickups);

        // The caps deplete as lines are processed, so duplicate lines for
        // the same subject share one cap instead of each passing alone.
        let mut material_remaining = material_taken;
        let mut product_remaining: HashMap<String, Decimal> = product_taken
            .iter()
            .map(|(id, taken)| (id.clone(), taken.quantity))
            .collect();

        let mut lines = Vec::with_capacity(req.direct_materials.len() + req.product_items.len());

        for line in &req.direct_materials {
            let material = MaterialRepository::get_in_tx(&mut tx, &line.material_id)
                .await?
                .ok_or_else(|| DbError::not_found("Material", &line.material_id))?;

            let remaining = material_remaining
                .entry(material.id.clone())
                .or_insert(Decimal::ZERO);
            if line.quantity > *remaining {
                return Err(StockError::ExcessiveReturn {
                    name: material.name,
                    max_returnable: *remaining,
                    requested: line.quantity,
                }
                .into());
            }
            *remaining -= line.quantity;

            StockLedger::credit(
                &mut tx,
                SubjectKind::Material,
                &material.id,
                line.quantity,
                None,
                "Returned",
            )
            .await?;
            lines.push(ReturnLine {
                subject_kind: SubjectKind::Material,
                subject_id: material.id,
                quantity: line.quantity,
                materials_restored: Vec::new(),
            });
        }

        for line in &req.product_items {
            let product = ProductRepository::get_in_tx(&mut tx, &line.product_id)
                .await?
                .ok_or_else(|| DbError::not_found("Product", &line.product_id))?;

            let remaining = product_remaining
                .entry(product.id.clone())
                .or_insert(Decimal::ZERO);
            if line.quantity > *remaining {
                return Err(StockError::ExcessiveReturn {
                    name: product.name,
                    max_returnable: *remaining,
                    requested: line.quantity,
                }
                .into());
            }
            *remaining -= line.quantity;

            let materials_restored = if product.produced {
                StockLedger::credit(
                    &mut tx,
                    SubjectKind::Product,
                    &product.id,
                    line.quantity,
                    None,
                    "Returned",
                )
                .await?;
                Vec::new()
            } else {
                // The cap check passed, so the product was taken and the
                // division below is against a positive quantity.
                let taken = product_taken
                    .get(&product.id)
                    .ok_or_else(|| DbError::not_found("Product", &product.id))?;
                let note = format!("Returned {} x {}", line.quantity, product.name);
                let mut restored = Vec::with_capacity(taken.materials_used.len());
                for used in &taken.materials_used {
                    let amount = used.amount * line.quantity / taken.quantity;
                    StockLedger::credit(
                        &mut tx,
                        SubjectKind::Material,
                        &used.material_id,
                        amount,
                        None,
                        &note,
                    )
                    .await?;
                    restored.push(MaterialUse {
                        material_id: used.material_id.clone(),
                        amount,
                        unit: used.unit,
                    });
                }
                restored
            };

            lines.push(ReturnLine {
                subject_kind: SubjectKind::Product,
                subject_id: product.id,
                quantity: line.quantity,
                materials_restored,
            });
        }

        let ret = StockReturn {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            final_sale_id: req.final_sale_id.clone(),
            lines,
            created_at: Utc::now(),
        };
        ReturnRepository::insert(&mut tx, &ret).await?;

        let closed = PickupRepository::complete_active_for_user(&mut tx, user_id).await?;

        tx.commit().await?;
        info!(
            id = %ret.id,
            user_id = %ret.user_id,
            lines = ret.lines.len(),
            pickups_closed = closed,
            "Return processed"
        );
        Ok(ret)
    }

    /// Sums what the active pickups took: per-material direct quantities
    /// and per-product quantities with their merged material draws.
    fn taken_totals(
        pickups: &[Pickup],
    ) -> (HashMap<String, Decimal>, HashMap<String, TakenProduct>) {
        let mut material_taken: HashMap<String, Decimal> = HashMap::new();
        let mut product_taken: HashMap<String, TakenProduct> = HashMap::new();

        for pickup in pickups {
            for line in &pickup.direct_materials {
                *material_taken
                    .entry(line.material_id.clone())
                    .or_insert(Decimal::ZERO) += line.quantity;
            }
            for line in &pickup.product_items {
                let taken = product_taken.entry(line.product_id.clone()).or_default();
                taken.quantity += line.quantity;
                for used in &line.materials_used {
                    taken.add_use(used);
                }
            }
        }

        (material_taken, product_taken)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldpos_core::{PickupMaterialLine, PickupProductLine, PickupStatus, StockUnit};
    use rust_decimal_macros::dec;

    fn pickup(materials: &[(&str, Decimal)], products: &[PickupProductLine]) -> Pickup {
        Pickup {
            id: Uuid::new_v4().to_string(),
            user_id: "u1".to_string(),
            created_at: Utc::now(),
            note: None,
            cash_float: Decimal::ZERO,
            direct_materials: materials
                .iter()
                .map(|(id, q)| PickupMaterialLine {
                    material_id: id.to_string(),
                    quantity: *q,
                })
                .collect(),
            product_items: products.to_vec(),
            status: PickupStatus::Active,
        }
    }

    #[tokio::test]
    async fn test_return_restores_stock_and_completes_pickups() {
        use crate::test_support::{open_temp_db, seed_material};
        use fieldpos_core::{
            CreateCartRequest, CreatePickupRequest, FinalizeRequest, MaterialLineInput,
            PickupStatus, StockUnit,
        };
        use rust_decimal_macros::dec;

        let db = open_temp_db().await;
        let sugar = seed_material(&db, "Sugar", StockUnit::MassLarge, dec!(10), dec!(14000)).await;

        let pickup = db
            .reservations()
            .create_pickup(CreatePickupRequest {
                user_id: "u1".to_string(),
                direct_materials: vec![MaterialLineInput {
                    material_id: sugar.id.clone(),
                    quantity: dec!(6),
                }],
                product_items: vec![],
                cash_float: Decimal::ZERO,
                note: None,
            })
            .await
            .unwrap();

        let cart = db
            .sales_carts()
            .create_cart(CreateCartRequest {
                user_id: "u1".to_string(),
                pickup_ids: vec![pickup.id.clone()],
                items: vec![],
            })
            .await
            .unwrap();
        let sale = db
            .finalization()
            .finalize(FinalizeRequest {
                user_id: "u1".to_string(),
                cart_ids: vec![cart.id],
                expense: Decimal::ZERO,
                expense_note: None,
            })
            .await
            .unwrap();

        let ret = db
            .returns()
            .create_return(CreateReturnRequest {
                user_id: "u1".to_string(),
                final_sale_id: sale.id,
                direct_materials: vec![MaterialLineInput {
                    material_id: sugar.id.clone(),
                    quantity: dec!(4),
                }],
                product_items: vec![],
            })
            .await
            .unwrap();
        assert_eq!(ret.lines.len(), 1);

        // 10 taken down to 4, then 4 back: 8 on hand, and it reconciles.
        let after = db.materials().get(&sugar.id).await.unwrap().unwrap();
        assert_eq!(after.stock, dec!(8));
        assert_eq!(
            db.ledger()
                .movement_balance(SubjectKind::Material, &sugar.id)
                .await
                .unwrap(),
            dec!(8)
        );

        let closed = db.pickups().get(&pickup.id).await.unwrap().unwrap();
        assert_eq!(closed.status, PickupStatus::Completed);

        // The session is closed: a second return finds nothing active.
        let err = db
            .returns()
            .create_return(CreateReturnRequest {
                user_id: "u1".to_string(),
                final_sale_id: ret.final_sale_id,
                direct_materials: vec![],
                product_items: vec![],
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Stock(StockError::NoActiveReservation { .. })
        ));
    }

    #[tokio::test]
    async fn test_duplicate_return_lines_share_one_cap() {
        use crate::test_support::{open_temp_db, seed_material};
        use fieldpos_core::{
            CreateCartRequest, CreatePickupRequest, FinalizeRequest, MaterialLineInput, StockUnit,
        };
        use rust_decimal_macros::dec;

        let db = open_temp_db().await;
        let sugar = seed_material(&db, "Sugar", StockUnit::MassLarge, dec!(10), dec!(14000)).await;
        let pickup = db
            .reservations()
            .create_pickup(CreatePickupRequest {
                user_id: "u1".to_string(),
                direct_materials: vec![MaterialLineInput {
                    material_id: sugar.id.clone(),
                    quantity: dec!(6),
                }],
                product_items: vec![],
                cash_float: Decimal::ZERO,
                note: None,
            })
            .await
            .unwrap();
        let cart = db
            .sales_carts()
            .create_cart(CreateCartRequest {
                user_id: "u1".to_string(),
                pickup_ids: vec![pickup.id.clone()],
                items: vec![],
            })
            .await
            .unwrap();
        let sale = db
            .finalization()
            .finalize(FinalizeRequest {
                user_id: "u1".to_string(),
                cart_ids: vec![cart.id],
                expense: Decimal::ZERO,
                expense_note: None,
            })
            .await
            .unwrap();

        // Two lines of 4 against 6 taken: the second only has 2 left.
        let err = db
            .returns()
            .create_return(CreateReturnRequest {
                user_id: "u1".to_string(),
                final_sale_id: sale.id,
                direct_materials: vec![
                    MaterialLineInput {
                        material_id: sugar.id.clone(),
                        quantity: dec!(4),
                    },
                    MaterialLineInput {
                        material_id: sugar.id.clone(),
                        quantity: dec!(4),
                    },
                ],
                product_items: vec![],
            })
            .await
            .unwrap_err();
        match err {
            DbError::Stock(StockError::ExcessiveReturn {
                max_returnable,
                requested,
                ..
            }) => {
                assert_eq!(max_returnable, dec!(2));
                assert_eq!(requested, dec!(4));
            }
            other => panic!("unexpected error: {other}"),
        }

        // The first line's credit rolled back with the rest.
        let after = db.materials().get(&sugar.id).await.unwrap().unwrap();
        assert_eq!(after.stock, dec!(4));
    }

    #[tokio::test]
    async fn test_excessive_return_changes_nothing() {
        use crate::test_support::{open_temp_db, seed_material};
        use fieldpos_core::{
            CreateCartRequest, CreatePickupRequest, FinalizeRequest, MaterialLineInput,
            PickupStatus, StockUnit,
        };
        use rust_decimal_macros::dec;

        let db = open_temp_db().await;
        let sugar = seed_material(&db, "Sugar", StockUnit::MassLarge, dec!(10), dec!(14000)).await;
        let pickup = db
            .reservations()
            .create_pickup(CreatePickupRequest {
                user_id: "u1".to_string(),
                direct_materials: vec![MaterialLineInput {
                    material_id: sugar.id.clone(),
                    quantity: dec!(6),
                }],
                product_items: vec![],
                cash_float: Decimal::ZERO,
                note: None,
            })
            .await
            .unwrap();
        let cart = db
            .sales_carts()
            .create_cart(CreateCartRequest {
                user_id: "u1".to_string(),
                pickup_ids: vec![pickup.id.clone()],
                items: vec![],
            })
            .await
            .unwrap();
        let sale = db
            .finalization()
            .finalize(FinalizeRequest {
                user_id: "u1".to_string(),
                cart_ids: vec![cart.id],
                expense: Decimal::ZERO,
                expense_note: None,
            })
            .await
            .unwrap();

        let err = db
            .returns()
            .create_return(CreateReturnRequest {
                user_id: "u1".to_string(),
                final_sale_id: sale.id,
                direct_materials: vec![MaterialLineInput {
                    material_id: sugar.id.clone(),
                    quantity: dec!(7),
                }],
                product_items: vec![],
            })
            .await
            .unwrap_err();
        match err {
            DbError::Stock(StockError::ExcessiveReturn {
                max_returnable,
                requested,
                ..
            }) => {
                assert_eq!(max_returnable, dec!(6));
                assert_eq!(requested, dec!(7));
            }
            other => panic!("unexpected error: {other}"),
        }

        // Stock untouched and the pickup still open for a correct return.
        let after = db.materials().get(&sugar.id).await.unwrap().unwrap();
        assert_eq!(after.stock, dec!(4));
        let still_open = db.pickups().get(&pickup.id).await.unwrap().unwrap();
        assert_eq!(still_open.status, PickupStatus::Active);
    }

    #[tokio::test]
    async fn test_on_demand_product_return_restores_materials_pro_rata() {
        use crate::test_support::{open_temp_db, seed_material, seed_product};
        use fieldpos_core::{
            CreateCartRequest, CreatePickupRequest, FinalizeRequest, ProductLineInput, StockUnit,
        };
        use rust_decimal_macros::dec;

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
                    quantity: dec!(4),
                }],
                cash_float: Decimal::ZERO,
                note: None,
            })
            .await
            .unwrap();
        let cart = db
            .sales_carts()
            .create_cart(CreateCartRequest {
                user_id: "u1".to_string(),
                pickup_ids: vec![pickup.id.clone()],
                items: vec![ProductLineInput {
                    product_id: latte.id.clone(),
                    quantity: dec!(3),
                }],
            })
            .await
            .unwrap();
        let sale = db
            .finalization()
            .finalize(FinalizeRequest {
                user_id: "u1".to_string(),
                cart_ids: vec![cart.id],
                expense: Decimal::ZERO,
                expense_note: None,
            })
            .await
            .unwrap();

        // One of four lattes comes back: a quarter of the 0.8 l draw.
        let ret = db
            .returns()
            .create_return(CreateReturnRequest {
                user_id: "u1".to_string(),
                final_sale_id: sale.id,
                direct_materials: vec![],
                product_items: vec![ProductLineInput {
                    product_id: latte.id.clone(),
                    quantity: dec!(1),
                }],
            })
            .await
            .unwrap();

        assert_eq!(ret.lines.len(), 1);
        assert_eq!(ret.lines[0].materials_restored.len(), 1);
        assert_eq!(ret.lines[0].materials_restored[0].amount, dec!(0.2));

        // 1 − 0.8 + 0.2 litres of milk; the product balance never moved.
        let milk_after = db.materials().get(&milk.id).await.unwrap().unwrap();
        assert_eq!(milk_after.stock, dec!(0.4));
        let latte_after = db.products().get(&latte.id).await.unwrap().unwrap();
        assert_eq!(latte_after.stock, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_return_requires_existing_final_sale() {
        use crate::test_support::open_temp_db;

        let db = open_temp_db().await;
        let err = db
            .returns()
            .create_return(CreateReturnRequest {
                user_id: "u1".to_string(),
                final_sale_id: "missing".to_string(),
                direct_materials: vec![],
                product_items: vec![],
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Stock(StockError::NotFound { .. })));
    }

    #[test]
    fn test_taken_totals_sum_across_pickups() {
        let pickups = vec![
            pickup(&[("sugar", dec!(2))], &[]),
            pickup(
                &[("sugar", dec!(3))],
                &[PickupProductLine {
                    product_id: "latte".to_string(),
                    quantity: dec!(4),
                    materials_used: vec![MaterialUse {
                        material_id: "milk".to_string(),
                        amount: dec!(0.8),
                        unit: StockUnit::VolumeLarge,
                    }],
                }],
            ),
            pickup(
                &[],
                &[PickupProductLine {
                    product_id: "latte".to_string(),
                    quantity: dec!(2),
                    materials_used: vec![MaterialUse {
                        material_id: "milk".to_string(),
                        amount: dec!(0.4),
                        unit: StockUnit::VolumeLarge,
                    }],
                }],
            ),
        ];

        let (material_taken, product_taken) = ReturnProcessor::taken_totals(&pickups);

        assert_eq!(material_taken.get("sugar"), Some(&dec!(5)));
        let latte = product_taken.get("latte").unwrap();
        assert_eq!(latte.quantity, dec!(6));
        assert_eq!(latte.materials_used.len(), 1);
        assert_eq!(latte.materials_used[0].amount, dec!(1.2));
    }
}
