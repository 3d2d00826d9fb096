//! # Production Processor
//!
//! One manufacturing run: resolve the recipe against a snapshot of its
//! materials, debit every consumed material, credit the product's balance,
//! and record the run. All inside one atomic unit, so a shortfall on the
//! last material rolls back the debits on the first.

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use fieldpos_core::{resolve_consumption, ProduceRequest, Production, SubjectKind};

use crate::error::{DbError, DbResult};
use crate::pool::Database;
use crate::repository::ledger::StockLedger;
use crate::repository::material::MaterialRepository;
use crate::repository::product::ProductRepository;
use crate::repository::production::ProductionRepository;

/// Service for manufacturing runs.
#[derive(Debug, Clone)]
pub struct ProductionProcessor {
    db: Database,
}

impl ProductionProcessor {
    pub fn new(db: Database) -> Self {
        ProductionProcessor { db }
    }

    /// Manufactures `quantity` units of a product.
    ///
    /// Debits every recipe material (converted to its stock unit), credits
    /// the product's own balance by `quantity`, and records the run with
    /// the consumed amounts and the revenue valuation (`quantity` times the
    /// selling price at call time).
    ///
    /// ## Errors
    /// - [`StockError::Validation`] on a bad request
    /// - [`StockError::NotFound`] for an unknown product or recipe material
    /// - [`StockError::InsufficientStock`] naming the first short material;
    ///   no stock moves in that case
    ///
    /// [`StockError::Validation`]: fieldpos_core::StockError::Validation
    /// [`StockError::NotFound`]: fieldpos_core::StockError::NotFound
    /// [`StockError::InsufficientStock`]: fieldpos_core::StockError::InsufficientStock
    pub async fn produce(&self, req: ProduceRequest) -> DbResult<Production> {
        req.validate()?;

        let mut tx = self.db.begin_write().await?;

        let product = ProductRepository::get_in_tx(&mut tx, &req.product_id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", &req.product_id))?;

        let material_ids: Vec<String> =
            product.recipe.iter().map(|l| l.material_id.clone()).collect();
        let materials = MaterialRepository::snapshot(&mut tx, &material_ids).await?;
        let draws = resolve_consumption(&product, req.quantity, &materials)?;

        let note = format!("Production of {} x {}", req.quantity, product.name);
        for draw in &draws {
            StockLedger::debit(
                &mut tx,
                SubjectKind::Material,
                &draw.material.id,
                draw.amount,
                &note,
            )
            .await?;
        }

        StockLedger::credit(
            &mut tx,
            SubjectKind::Product,
            &product.id,
            req.quantity,
            None,
            "Production output",
        )
        .await?;

        let production = Production {
            id: Uuid::new_v4().to_string(),
            product_id: product.id.clone(),
            quantity: req.quantity,
            used_materials: draws.iter().map(|d| d.to_use()).collect(),
            revenue: req.quantity * product.selling_price,
            created_at: Utc::now(),
        };
        ProductionRepository::insert(&mut tx, &production).await?;

        tx.commit().await?;
        info!(
            product = %product.name,
            quantity = %production.quantity,
            revenue = %production.revenue,
            "Production run committed"
        );
        Ok(production)
    }

    /// All production runs, newest first.
    pub async fn history(&self) -> DbResult<Vec<Production>> {
        ProductionRepository::new(self.db.reader().clone()).list().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{open_temp_db, seed_material, seed_product};
    use fieldpos_core::{StockError, StockUnit};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_produce_converts_recipe_amounts_to_stock_units() {
        let db = open_temp_db().await;
        // 1 litre of milk on hand; the recipe asks for 200 ml per latte.
        let milk = seed_material(&db, "Milk", StockUnit::VolumeLarge, dec!(1), dec!(18000)).await;
        let latte = seed_product(
            &db,
            "Latte",
            vec![(milk.id.clone(), dec!(200))],
            true,
            dec!(15000),
        )
        .await;

        let run = db
            .production()
            .produce(ProduceRequest {
                product_id: latte.id.clone(),
                quantity: dec!(2),
            })
            .await
            .unwrap();

        assert_eq!(run.used_materials.len(), 1);
        assert_eq!(run.used_materials[0].amount, dec!(0.4));
        assert_eq!(run.used_materials[0].unit, StockUnit::VolumeLarge);
        assert_eq!(run.revenue, dec!(30000));

        let milk_after = db.materials().get(&milk.id).await.unwrap().unwrap();
        assert_eq!(milk_after.stock, dec!(0.6));
        let latte_after = db.products().get(&latte.id).await.unwrap().unwrap();
        assert_eq!(latte_after.stock, dec!(2));

        // Both balances reconcile against their movement histories.
        let ledger = db.ledger();
        assert_eq!(
            ledger
                .movement_balance(SubjectKind::Material, &milk.id)
                .await
                .unwrap(),
            dec!(0.6)
        );
        assert_eq!(
            ledger
                .movement_balance(SubjectKind::Product, &latte.id)
                .await
                .unwrap(),
            dec!(2)
        );
    }

    #[tokio::test]
    async fn test_shortfall_rolls_back_every_debit() {
        let db = open_temp_db().await;
        let milk = seed_material(&db, "Milk", StockUnit::VolumeLarge, dec!(10), dec!(18000)).await;
        let syrup = seed_material(&db, "Syrup", StockUnit::VolumeSmall, dec!(10), dec!(500)).await;
        // 10 units would need 100 ml of syrup but only 10 ml exist; milk is
        // debited first and must come back.
        let latte = seed_product(
            &db,
            "Latte",
            vec![(milk.id.clone(), dec!(200)), (syrup.id.clone(), dec!(10))],
            true,
            dec!(15000),
        )
        .await;

        let err = db
            .production()
            .produce(ProduceRequest {
                product_id: latte.id.clone(),
                quantity: dec!(10),
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Stock(StockError::InsufficientStock { .. })
        ));

        let milk_after = db.materials().get(&milk.id).await.unwrap().unwrap();
        assert_eq!(milk_after.stock, dec!(10));
        let latte_after = db.products().get(&latte.id).await.unwrap().unwrap();
        assert_eq!(latte_after.stock, Decimal::ZERO);
        assert!(db.production().history().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_product_is_not_found() {
        let db = open_temp_db().await;
        let err = db
            .production()
            .produce(ProduceRequest {
                product_id: "missing".to_string(),
                quantity: dec!(1),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Stock(StockError::NotFound { .. })));
    }
}
