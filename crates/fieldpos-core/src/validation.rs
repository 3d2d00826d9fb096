//! # Request Validation
//!
//! Typed request structs for every mutating operation, validated before any
//! mutation begins. The request-routing layer deserializes straight into
//! these; nothing duck-typed survives past this boundary.
//!
//! ## Validation Strategy
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │  Layer 1: Deserialization (serde)  - shape and types                 │
//! │  Layer 2: THIS MODULE              - business preconditions          │
//! │  Layer 3: Transactional services   - stock sufficiency, existence    │
//! │  Layer 4: Database                 - UNIQUE / NOT NULL constraints   │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{StockResult, ValidationError};
use crate::types::ProductCategory;
use crate::units::StockUnit;

/// Maximum length for names and notes.
pub const MAX_NAME_LEN: usize = 200;

// =============================================================================
// Shared Line Inputs
// =============================================================================

/// A requested material quantity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterialLineInput {
    pub material_id: String,
    pub quantity: Decimal,
}

/// A requested product quantity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductLineInput {
    pub product_id: String,
    pub quantity: Decimal,
}

/// A recipe line on product creation; `amount_per_unit` in the material's
/// smallest unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeLineInput {
    pub material_id: String,
    pub amount_per_unit: Decimal,
}

// =============================================================================
// Helpers
// =============================================================================

fn require_name(field: &str, value: &str) -> StockResult<()> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        }
        .into());
    }
    if value.len() > MAX_NAME_LEN {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_NAME_LEN,
        }
        .into());
    }
    Ok(())
}

fn require_positive(field: &str, value: Decimal) -> StockResult<()> {
    if value <= Decimal::ZERO {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        }
        .into());
    }
    Ok(())
}

fn require_non_negative(field: &str, value: Decimal) -> StockResult<()> {
    if value < Decimal::ZERO {
        return Err(ValidationError::MustNotBeNegative {
            field: field.to_string(),
        }
        .into());
    }
    Ok(())
}

fn require_positive_material_lines(lines: &[MaterialLineInput]) -> StockResult<()> {
    for line in lines {
        require_positive("material line quantity", line.quantity)?;
    }
    Ok(())
}

fn require_positive_product_lines(lines: &[ProductLineInput]) -> StockResult<()> {
    for line in lines {
        require_positive("product line quantity", line.quantity)?;
    }
    Ok(())
}

// =============================================================================
// Catalog Requests
// =============================================================================

/// Register a new material with its opening stock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateMaterialRequest {
    pub name: String,
    pub unit: StockUnit,
    pub initial_stock: Decimal,
    pub price: Decimal,
}

impl CreateMaterialRequest {
    pub fn validate(&self) -> StockResult<()> {
        require_name("name", &self.name)?;
        require_non_negative("initial_stock", self.initial_stock)?;
        require_positive("price", self.price)
    }
}

/// Add stock to an existing material.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestockMaterialRequest {
    pub material_id: String,
    pub quantity: Decimal,
    /// New unit price for the restocked material.
    pub price: Decimal,
    pub note: Option<String>,
}

impl RestockMaterialRequest {
    pub fn validate(&self) -> StockResult<()> {
        require_positive("quantity", self.quantity)?;
        require_positive("price", self.price)
    }
}

/// Register a new product and its recipe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    pub category: ProductCategory,
    pub recipe: Vec<RecipeLineInput>,
    /// Whether the product is manufactured ahead of time and stocked.
    pub produced: bool,
    pub selling_price: Decimal,
}

impl CreateProductRequest {
    pub fn validate(&self) -> StockResult<()> {
        require_name("name", &self.name)?;
        require_positive("selling_price", self.selling_price)?;
        if self.recipe.is_empty() {
            return Err(ValidationError::Required {
                field: "recipe".to_string(),
            }
            .into());
        }
        for line in &self.recipe {
            require_positive("amount_per_unit", line.amount_per_unit)?;
        }
        Ok(())
    }
}

// =============================================================================
// Production Request
// =============================================================================

/// Manufacture `quantity` units of a produced product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProduceRequest {
    pub product_id: String,
    pub quantity: Decimal,
}

impl ProduceRequest {
    pub fn validate(&self) -> StockResult<()> {
        require_positive("quantity", self.quantity)
    }
}

// =============================================================================
// Reservation Request
// =============================================================================

/// Reserve materials and products for field sale (all-or-nothing).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePickupRequest {
    pub user_id: String,
    pub direct_materials: Vec<MaterialLineInput>,
    pub product_items: Vec<ProductLineInput>,
    pub cash_float: Decimal,
    pub note: Option<String>,
}

impl CreatePickupRequest {
    pub fn validate(&self) -> StockResult<()> {
        require_name("user_id", &self.user_id)?;
        if self.direct_materials.is_empty() && self.product_items.is_empty() {
            return Err(ValidationError::Required {
                field: "direct_materials or product_items".to_string(),
            }
            .into());
        }
        require_positive_material_lines(&self.direct_materials)?;
        require_positive_product_lines(&self.product_items)?;
        require_non_negative("cash_float", self.cash_float)
    }
}

// =============================================================================
// Cart Requests
// =============================================================================

/// Open a cart of proposed sale lines against one or more pickups.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCartRequest {
    pub user_id: String,
    pub pickup_ids: Vec<String>,
    pub items: Vec<ProductLineInput>,
}

impl CreateCartRequest {
    pub fn validate(&self) -> StockResult<()> {
        require_name("user_id", &self.user_id)?;
        if self.pickup_ids.is_empty() {
            return Err(ValidationError::Required {
                field: "pickup_ids".to_string(),
            }
            .into());
        }
        // Quantities must be positive, but are deliberately NOT checked
        // against the pickup here; the user may be mid-session.
        require_positive_product_lines(&self.items)
    }
}

/// Fully overwrite a cart's line items.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplaceCartItemsRequest {
    pub cart_id: String,
    pub items: Vec<ProductLineInput>,
}

impl ReplaceCartItemsRequest {
    pub fn validate(&self) -> StockResult<()> {
        require_positive_product_lines(&self.items)
    }
}

// =============================================================================
// Finalization Request
// =============================================================================

/// Merge carts into one immutable final sale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalizeRequest {
    pub user_id: String,
    pub cart_ids: Vec<String>,
    pub expense: Decimal,
    pub expense_note: Option<String>,
}

impl FinalizeRequest {
    pub fn validate(&self) -> StockResult<()> {
        require_name("user_id", &self.user_id)?;
        if self.cart_ids.is_empty() {
            return Err(ValidationError::Required {
                field: "cart_ids".to_string(),
            }
            .into());
        }
        require_non_negative("expense", self.expense)?;
        // An expense without a note is unauditable.
        if self.expense > Decimal::ZERO
            && self
                .expense_note
                .as_deref()
                .map_or(true, |n| n.trim().is_empty())
        {
            return Err(ValidationError::Required {
                field: "expense_note".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

// =============================================================================
// Return Request
// =============================================================================

/// Return unsold materials/products against the user's open reservations.
///
/// Empty line lists are allowed: everything taken was sold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateReturnRequest {
    pub user_id: String,
    pub final_sale_id: String,
    pub direct_materials: Vec<MaterialLineInput>,
    pub product_items: Vec<ProductLineInput>,
}

impl CreateReturnRequest {
    pub fn validate(&self) -> StockResult<()> {
        require_name("user_id", &self.user_id)?;
        require_name("final_sale_id", &self.final_sale_id)?;
        require_positive_material_lines(&self.direct_materials)?;
        require_positive_product_lines(&self.product_items)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StockError;
    use rust_decimal_macros::dec;

    #[test]
    fn test_pickup_requires_at_least_one_line() {
        let req = CreatePickupRequest {
            user_id: "u1".to_string(),
            direct_materials: vec![],
            product_items: vec![],
            cash_float: Decimal::ZERO,
            note: None,
        };
        assert!(matches!(
            req.validate().unwrap_err(),
            StockError::Validation(ValidationError::Required { .. })
        ));
    }

    #[test]
    fn test_pickup_rejects_non_positive_quantity() {
        let req = CreatePickupRequest {
            user_id: "u1".to_string(),
            direct_materials: vec![MaterialLineInput {
                material_id: "m1".to_string(),
                quantity: dec!(0),
            }],
            product_items: vec![],
            cash_float: Decimal::ZERO,
            note: None,
        };
        assert!(matches!(
            req.validate().unwrap_err(),
            StockError::Validation(ValidationError::MustBePositive { .. })
        ));
    }

    #[test]
    fn test_finalize_expense_requires_note() {
        let mut req = FinalizeRequest {
            user_id: "u1".to_string(),
            cart_ids: vec!["c1".to_string()],
            expense: dec!(5000),
            expense_note: None,
        };
        assert!(req.validate().is_err());

        req.expense_note = Some("  ".to_string());
        assert!(req.validate().is_err());

        req.expense_note = Some("fuel".to_string());
        assert!(req.validate().is_ok());

        // Zero expense needs no note.
        req.expense = Decimal::ZERO;
        req.expense_note = None;
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_return_allows_empty_lines() {
        let req = CreateReturnRequest {
            user_id: "u1".to_string(),
            final_sale_id: "fs1".to_string(),
            direct_materials: vec![],
            product_items: vec![],
        };
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_create_material_allows_zero_opening_stock() {
        let req = CreateMaterialRequest {
            name: "Milk".to_string(),
            unit: StockUnit::VolumeLarge,
            initial_stock: Decimal::ZERO,
            price: dec!(18000),
        };
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_create_product_requires_recipe() {
        let req = CreateProductRequest {
            name: "Iced Coffee".to_string(),
            category: ProductCategory::Beverage,
            recipe: vec![],
            produced: false,
            selling_price: dec!(15000),
        };
        assert!(req.validate().is_err());
    }
}
