//! # Catalog Service
//!
//! Material and product registration, restocking, and the read-side stock
//! snapshot. Opening stock is never written directly into the balance
//! column: it enters through the ledger like every other quantity, so the
//! movement history reconciles from day one.

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::info;
use uuid::Uuid;

use fieldpos_core::{
    CreateMaterialRequest, CreateProductRequest, Material, Movement, Product, RecipeLine,
    RestockMaterialRequest, StockError, StockSnapshot, SubjectKind,
};

use crate::error::{DbError, DbResult};
use crate::pool::Database;
use crate::repository::ledger::StockLedger;
use crate::repository::material::MaterialRepository;
use crate::repository::product::ProductRepository;

/// Service for material/product registration and stock inspection.
#[derive(Debug, Clone)]
pub struct CatalogService {
    db: Database,
}

impl CatalogService {
    pub fn new(db: Database) -> Self {
        CatalogService { db }
    }

    /// Registers a new material. When `initial_stock > 0` the opening
    /// balance is credited through the ledger as an `Initial stock`
    /// movement carrying the unit price.
    ///
    /// ## Errors
    /// - [`StockError::Validation`] on a bad request
    /// - [`StockError::DuplicateName`] if the name is taken
    pub async fn create_material(&self, req: CreateMaterialRequest) -> DbResult<Material> {
        req.validate()?;

        let mut tx = self.db.begin_write().await?;

        if MaterialRepository::get_by_name(&mut tx, req.name.trim())
            .await?
            .is_some()
        {
            return Err(StockError::DuplicateName {
                entity: "Material".to_string(),
                name: req.name.trim().to_string(),
            }
            .into());
        }

        let now = Utc::now();
        let mut material = Material {
            id: Uuid::new_v4().to_string(),
            name: req.name.trim().to_string(),
            unit: req.unit,
            stock: Decimal::ZERO,
            price: req.price,
            created_at: now,
            updated_at: now,
        };
        MaterialRepository::insert(&mut tx, &material).await?;

        if req.initial_stock > Decimal::ZERO {
            material.stock = StockLedger::credit(
                &mut tx,
                SubjectKind::Material,
                &material.id,
                req.initial_stock,
                Some(req.price),
                "Initial stock",
            )
            .await?;
        }

        tx.commit().await?;
        info!(id = %material.id, name = %material.name, "Material created");
        Ok(material)
    }

    /// Adds stock to an existing material and re-prices it to the new
    /// purchase price.
    ///
    /// ## Errors
    /// - [`StockError::Validation`] on a bad request
    /// - [`StockError::NotFound`] if the material doesn't exist
    pub async fn restock_material(&self, req: RestockMaterialRequest) -> DbResult<Material> {
        req.validate()?;

        let mut tx = self.db.begin_write().await?;

        let mut material = MaterialRepository::get_in_tx(&mut tx, &req.material_id)
            .await?
            .ok_or_else(|| DbError::not_found("Material", &req.material_id))?;

        MaterialRepository::set_price(&mut tx, &material.id, req.price).await?;
        material.price = req.price;
        material.stock = StockLedger::credit(
            &mut tx,
            SubjectKind::Material,
            &material.id,
            req.quantity,
            Some(req.price),
            req.note.as_deref().unwrap_or("Restock"),
        )
        .await?;

        tx.commit().await?;
        info!(id = %material.id, name = %material.name, quantity = %req.quantity, "Material restocked");
        Ok(material)
    }

    /// Registers a new product with its recipe. Every referenced material
    /// must already exist.
    ///
    /// ## Errors
    /// - [`StockError::Validation`] on a bad request
    /// - [`StockError::DuplicateName`] if the name is taken
    /// - [`StockError::NotFound`] for an unknown recipe material
    pub async fn create_product(&self, req: CreateProductRequest) -> DbResult<Product> {
        req.validate()?;

        let mut tx = self.db.begin_write().await?;

        if ProductRepository::get_by_name(&mut tx, req.name.trim())
            .await?
            .is_some()
        {
            return Err(StockError::DuplicateName {
                entity: "Product".to_string(),
                name: req.name.trim().to_string(),
            }
            .into());
        }

        let mut recipe = Vec::with_capacity(req.recipe.len());
        for line in &req.recipe {
            if MaterialRepository::get_in_tx(&mut tx, &line.material_id)
                .await?
                .is_none()
            {
                return Err(DbError::not_found("Material", &line.material_id));
            }
            recipe.push(RecipeLine {
                material_id: line.material_id.clone(),
                amount_per_unit: line.amount_per_unit,
            });
        }

        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4().to_string(),
            name: req.name.trim().to_string(),
            category: req.category,
            recipe,
            produced: req.produced,
            stock: Decimal::ZERO,
            selling_price: req.selling_price,
            created_at: now,
            updated_at: now,
        };
        ProductRepository::insert(&mut tx, &product).await?;

        tx.commit().await?;
        info!(id = %product.id, name = %product.name, "Product created");
        Ok(product)
    }

    /// Point-in-time view of every material and product balance.
    pub async fn stock_snapshot(&self) -> DbResult<StockSnapshot> {
        Ok(StockSnapshot {
            materials: self.db.materials().list().await?,
            products: self.db.products().list().await?,
        })
    }

    /// A subject's full movement history, oldest first.
    pub async fn movement_history(
        &self,
        kind: SubjectKind,
        subject_id: &str,
    ) -> DbResult<Vec<Movement>> {
        self.db.ledger().movements_for(kind, subject_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{open_temp_db, seed_material};
    use fieldpos_core::{MovementDirection, StockUnit};
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_initial_stock_enters_through_the_ledger() {
        let db = open_temp_db().await;
        let material =
            seed_material(&db, "Sugar", StockUnit::MassLarge, dec!(10), dec!(14000)).await;

        assert_eq!(material.stock, dec!(10));

        let history = db
            .catalog()
            .movement_history(SubjectKind::Material, &material.id)
            .await
            .unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].direction, MovementDirection::In);
        assert_eq!(history[0].quantity, dec!(10));
        assert_eq!(history[0].price, Some(dec!(14000)));
        assert_eq!(history[0].note, "Initial stock");
    }

    #[tokio::test]
    async fn test_zero_opening_stock_writes_no_movement() {
        let db = open_temp_db().await;
        let material =
            seed_material(&db, "Cups", StockUnit::Count, Decimal::ZERO, dec!(500)).await;

        assert_eq!(material.stock, Decimal::ZERO);
        let history = db
            .catalog()
            .movement_history(SubjectKind::Material, &material.id)
            .await
            .unwrap();
        assert!(history.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_material_name_is_rejected() {
        let db = open_temp_db().await;
        seed_material(&db, "Milk", StockUnit::VolumeLarge, dec!(1), dec!(18000)).await;

        let err = db
            .catalog()
            .create_material(CreateMaterialRequest {
                name: "Milk".to_string(),
                unit: StockUnit::VolumeLarge,
                initial_stock: Decimal::ZERO,
                price: dec!(20000),
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Stock(StockError::DuplicateName { .. })
        ));
    }

    #[tokio::test]
    async fn test_restock_credits_and_reprices() {
        let db = open_temp_db().await;
        let material =
            seed_material(&db, "Sugar", StockUnit::MassLarge, dec!(4), dec!(14000)).await;

        let updated = db
            .catalog()
            .restock_material(RestockMaterialRequest {
                material_id: material.id.clone(),
                quantity: dec!(6),
                price: dec!(15000),
                note: None,
            })
            .await
            .unwrap();

        assert_eq!(updated.stock, dec!(10));
        assert_eq!(updated.price, dec!(15000));

        // Stored balance reconciles with the movement history.
        let balance = db
            .ledger()
            .movement_balance(SubjectKind::Material, &material.id)
            .await
            .unwrap();
        assert_eq!(balance, dec!(10));
    }

    #[tokio::test]
    async fn test_product_recipe_must_reference_known_materials() {
        let db = open_temp_db().await;
        let err = db
            .catalog()
            .create_product(CreateProductRequest {
                name: "Latte".to_string(),
                category: fieldpos_core::ProductCategory::Beverage,
                recipe: vec![fieldpos_core::RecipeLineInput {
                    material_id: "no-such-material".to_string(),
                    amount_per_unit: dec!(200),
                }],
                produced: false,
                selling_price: dec!(15000),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Stock(StockError::NotFound { .. })));
    }
}
