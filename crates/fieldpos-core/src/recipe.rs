//! # Recipe Resolution
//!
//! Computes the per-material consumption of producing/assembling a product.
//!
//! ## How Resolution Works
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │  resolve_consumption(product, quantity, materials)                   │
//! │                                                                      │
//! │  Product "Iced Coffee", quantity = 3                                 │
//! │  recipe: [ {Milk, 200}, {Coffee, 15}, {Cup, 1} ]                     │
//! │                                                                      │
//! │  Milk   unit = l    200 × 3 = 600 ml  ──► 0.6 l                      │
//! │  Coffee unit = g    15  × 3 = 45 g    ──► 45 g                       │
//! │  Cup    unit = pcs  1   × 3 = 3 pcs   ──► 3 pcs                      │
//! │                                                                      │
//! │  => [ MaterialDraw(Milk, 0.6), (Coffee, 45), (Cup, 3) ]              │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Pure computation: the caller supplies value snapshots of the referenced
//! materials (one well-defined read set per atomic unit), and no stock is
//! touched here.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{StockError, StockResult};
use crate::types::{Material, MaterialUse, Product};
use crate::units::recipe_amount_in_stock_unit;

// =============================================================================
// Material Draw
// =============================================================================

/// The amount of one material a production/assembly run will consume,
/// expressed in the material's own stock unit, paired with a snapshot of
/// the material at resolution time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterialDraw {
    /// Value snapshot of the material (balance as of resolution).
    pub material: Material,
    /// Total amount to consume, in `material.unit`.
    pub amount: Decimal,
}

impl MaterialDraw {
    /// Converts the draw into the persisted `materials_used` form.
    pub fn to_use(&self) -> MaterialUse {
        MaterialUse {
            material_id: self.material.id.clone(),
            amount: self.amount,
            unit: self.material.unit,
        }
    }
}

// =============================================================================
// Resolution
// =============================================================================

/// Resolves the material consumption of `quantity` units of `product`.
///
/// `materials` is a read-through snapshot keyed by material id; every
/// recipe line must resolve against it.
///
/// ## Errors
/// - [`StockError::NotFound`] if a recipe line references a material that
///   is not in the snapshot.
///
/// ## Guarantees
/// - Pure: no side effects, deterministic for the same snapshot.
/// - Output preserves recipe line order.
pub fn resolve_consumption(
    product: &Product,
    quantity: Decimal,
    materials: &HashMap<String, Material>,
) -> StockResult<Vec<MaterialDraw>> {
    let mut draws = Vec::with_capacity(product.recipe.len());

    for line in &product.recipe {
        let material = materials
            .get(&line.material_id)
            .ok_or_else(|| StockError::NotFound {
                entity: "Material".to_string(),
                id: line.material_id.clone(),
            })?;

        let per_unit = recipe_amount_in_stock_unit(line.amount_per_unit, material.unit);

        draws.push(MaterialDraw {
            material: material.clone(),
            amount: per_unit * quantity,
        });
    }

    Ok(draws)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ProductCategory, RecipeLine};
    use crate::units::StockUnit;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn material(id: &str, name: &str, unit: StockUnit, stock: Decimal) -> Material {
        let now = Utc::now();
        Material {
            id: id.to_string(),
            name: name.to_string(),
            unit,
            stock,
            price: dec!(1000),
            created_at: now,
            updated_at: now,
        }
    }

    fn product(recipe: Vec<RecipeLine>) -> Product {
        let now = Utc::now();
        Product {
            id: "p1".to_string(),
            name: "Iced Coffee".to_string(),
            category: ProductCategory::Beverage,
            recipe,
            produced: false,
            stock: Decimal::ZERO,
            selling_price: dec!(15000),
            created_at: now,
            updated_at: now,
        }
    }

    fn snapshot(materials: Vec<Material>) -> HashMap<String, Material> {
        materials.into_iter().map(|m| (m.id.clone(), m)).collect()
    }

    #[test]
    fn test_large_unit_material_is_converted() {
        // Milk stocked in liters, recipe says 200 (ml) per unit.
        let materials = snapshot(vec![material("m1", "Milk", StockUnit::VolumeLarge, dec!(3))]);
        let product = product(vec![RecipeLine {
            material_id: "m1".to_string(),
            amount_per_unit: dec!(200),
        }]);

        let draws = resolve_consumption(&product, dec!(1), &materials).unwrap();
        assert_eq!(draws.len(), 1);
        assert_eq!(draws[0].amount, dec!(0.2));
    }

    #[test]
    fn test_mixed_recipe_scales_with_quantity() {
        let materials = snapshot(vec![
            material("m1", "Milk", StockUnit::VolumeLarge, dec!(3)),
            material("m2", "Coffee", StockUnit::MassSmall, dec!(500)),
            material("m3", "Cup", StockUnit::Count, dec!(100)),
        ]);
        let product = product(vec![
            RecipeLine {
                material_id: "m1".to_string(),
                amount_per_unit: dec!(200),
            },
            RecipeLine {
                material_id: "m2".to_string(),
                amount_per_unit: dec!(15),
            },
            RecipeLine {
                material_id: "m3".to_string(),
                amount_per_unit: dec!(1),
            },
        ]);

        let draws = resolve_consumption(&product, dec!(3), &materials).unwrap();
        assert_eq!(draws[0].amount, dec!(0.6));
        assert_eq!(draws[1].amount, dec!(45));
        assert_eq!(draws[2].amount, dec!(3));
        // Order follows the recipe.
        assert_eq!(draws[0].material.name, "Milk");
        assert_eq!(draws[2].material.name, "Cup");
    }

    #[test]
    fn test_unknown_material_fails() {
        let materials = snapshot(vec![]);
        let product = product(vec![RecipeLine {
            material_id: "missing".to_string(),
            amount_per_unit: dec!(10),
        }]);

        let err = resolve_consumption(&product, dec!(1), &materials).unwrap_err();
        assert!(matches!(err, StockError::NotFound { entity, .. } if entity == "Material"));
    }

    #[test]
    fn test_resolution_has_no_side_effects() {
        let materials = snapshot(vec![material("m1", "Milk", StockUnit::VolumeLarge, dec!(3))]);
        let product = product(vec![RecipeLine {
            material_id: "m1".to_string(),
            amount_per_unit: dec!(200),
        }]);

        resolve_consumption(&product, dec!(5), &materials).unwrap();
        assert_eq!(materials.get("m1").unwrap().stock, dec!(3));
    }
}
