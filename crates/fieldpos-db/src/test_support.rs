//! Shared helpers for service tests: a throwaway on-disk database (the
//! writer and reader pools must see the same file, so `:memory:` is out)
//! and seed shortcuts through the public services.

use rust_decimal::Decimal;
use uuid::Uuid;

use fieldpos_core::{
    CreateMaterialRequest, CreateProductRequest, Material, Product, ProductCategory,
    RecipeLineInput, StockUnit,
};

use crate::pool::{Database, DbConfig};

pub(crate) async fn open_temp_db() -> Database {
    let path = std::env::temp_dir().join(format!("fieldpos-test-{}.db", Uuid::new_v4()));
    Database::new(DbConfig::new(path))
        .await
        .expect("temp database should open")
}

pub(crate) async fn seed_material(
    db: &Database,
    name: &str,
    unit: StockUnit,
    initial_stock: Decimal,
    price: Decimal,
) -> Material {
    db.catalog()
        .create_material(CreateMaterialRequest {
            name: name.to_string(),
            unit,
            initial_stock,
            price,
        })
        .await
        .expect("seed material")
}

pub(crate) async fn seed_product(
    db: &Database,
    name: &str,
    recipe: Vec<(String, Decimal)>,
    produced: bool,
    selling_price: Decimal,
) -> Product {
    db.catalog()
        .create_product(CreateProductRequest {
            name: name.to_string(),
            category: ProductCategory::Beverage,
            recipe: recipe
                .into_iter()
                .map(|(material_id, amount_per_unit)| RecipeLineInput {
                    material_id,
                    amount_per_unit,
                })
                .collect(),
            produced,
            selling_price,
        })
        .await
        .expect("seed product")
}
