//! # Domain Types
//!
//! Core domain types used throughout FieldPOS.
//!
//! ## Lifecycle the types describe
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                 Stock Ledger & Reservation Lifecycle                 │
//! │                                                                      │
//! │  Material ──(recipe)──► Product                                      │
//! │      │                     │                                         │
//! │      │   produce()         │  debit materials, credit product        │
//! │      ▼                     ▼                                         │
//! │  ┌─────────────────────────────────┐                                 │
//! │  │ Movement (append-only ledger)   │  balance == Σ IN − Σ OUT        │
//! │  └─────────────────────────────────┘                                 │
//! │      │  create_pickup()                                              │
//! │      ▼                                                               │
//! │  Pickup (active) ──► Cart (mutable intent) ──► FinalSale (immutable) │
//! │      │                                                               │
//! │      │  create_return()                                              │
//! │      ▼                                                               │
//! │  Return + Pickup (completed)                                         │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Ownership
//! Material/Product balances are exclusively owned by the stock ledger and
//! only ever change through movements. Pickup/Cart/FinalSale/Return own
//! their line-item lists; cross references are by id only, never embedded
//! mutable state.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::units::StockUnit;

// =============================================================================
// Ledger Subjects & Directions
// =============================================================================

/// What kind of entity a movement is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectKind {
    Material,
    Product,
}

impl SubjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubjectKind::Material => "material",
            SubjectKind::Product => "product",
        }
    }
}

/// Direction of a stock movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MovementDirection {
    /// Stock increased (restock, production output, return).
    In,
    /// Stock decreased (production input, pickup; OUT is also how a field
    /// sale manifests - whatever is taken and not returned was sold).
    Out,
}

impl MovementDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementDirection::In => "IN",
            MovementDirection::Out => "OUT",
        }
    }
}

// =============================================================================
// Material
// =============================================================================

/// A raw material consumed by recipes or taken directly on pickups.
///
/// `stock` is mutated only through ledger movements; never directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Material {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Unique business name ("Milk", "Sugar", ...).
    pub name: String,

    /// The unit the stock balance is expressed in.
    pub unit: StockUnit,

    /// Current stock balance in `unit`. Never negative.
    pub stock: Decimal,

    /// Unit price of the most recent restock.
    pub price: Decimal,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Product
// =============================================================================

/// Reporting class a product belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductCategory {
    Food,
    Beverage,
}

impl ProductCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductCategory::Food => "food",
            ProductCategory::Beverage => "beverage",
        }
    }
}

/// One line of a product's recipe.
///
/// `amount_per_unit` is expressed in the *smallest* unit of the referenced
/// material's unit family (g, ml, or pcs) - see [`crate::units`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeLine {
    pub material_id: String,
    pub amount_per_unit: Decimal,
}

/// A finished good.
///
/// `produced` distinguishes goods that are manufactured ahead of time and
/// stocked (pickup debits the product's own balance) from goods assembled
/// on demand from their recipe (pickup debits the constituent materials).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Unique business name.
    pub name: String,

    /// Reporting category.
    pub category: ProductCategory,

    /// Ordered recipe lines.
    pub recipe: Vec<RecipeLine>,

    /// Whether the product is manufactured and stocked.
    pub produced: bool,

    /// Current stock balance. Only meaningful when `produced`.
    pub stock: Decimal,

    /// Current selling price per unit.
    pub selling_price: Decimal,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Movement (ledger entry)
// =============================================================================

/// One immutable, append-only stock movement.
///
/// Invariant: for any subject, `current stock == Σ IN − Σ OUT` over all of
/// its movements, after every operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Movement {
    pub id: String,
    pub subject_kind: SubjectKind,
    pub subject_id: String,
    pub direction: MovementDirection,
    pub quantity: Decimal,
    /// Unit price, recorded for IN movements that carry one (restocks).
    pub price: Option<Decimal>,
    pub note: String,
    pub date: DateTime<Utc>,
}

// =============================================================================
// Pickup (reservation)
// =============================================================================

/// Status of a pickup. Only ever transitions Active → Completed, and only
/// through return processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PickupStatus {
    Active,
    Completed,
}

impl PickupStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PickupStatus::Active => "active",
            PickupStatus::Completed => "completed",
        }
    }
}

/// A material drawn while producing/assembling a product, recorded in the
/// material's stock unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialUse {
    pub material_id: String,
    pub amount: Decimal,
    pub unit: StockUnit,
}

/// A direct material line on a pickup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PickupMaterialLine {
    pub material_id: String,
    pub quantity: Decimal,
}

/// A product line on a pickup. For recipe-assembled products,
/// `materials_used` records exactly which material amounts were consumed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PickupProductLine {
    pub product_id: String,
    pub quantity: Decimal,
    pub materials_used: Vec<MaterialUse>,
}

/// A reservation of goods taken into the field for sale.
///
/// Created `active` by the reservation manager, completed only by return
/// processing, never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pickup {
    pub id: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub note: Option<String>,
    /// Cash float handed over with the goods.
    pub cash_float: Decimal,
    pub direct_materials: Vec<PickupMaterialLine>,
    pub product_items: Vec<PickupProductLine>,
    pub status: PickupStatus,
}

// =============================================================================
// Cart (temp sale)
// =============================================================================

/// One proposed sale line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: String,
    pub quantity: Decimal,
}

/// Mutable, not-yet-committed sale lines against one or more pickups.
///
/// Carts never move stock; they only record intent. Deleted (not archived)
/// when finalized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cart {
    pub id: String,
    pub user_id: String,
    pub pickup_ids: Vec<String>,
    pub items: Vec<CartLine>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Final Sale
// =============================================================================

/// One aggregated line of a final sale. `price` is the product's selling
/// price snapshotted at finalize time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleLine {
    pub product_id: String,
    pub quantity: Decimal,
    pub price: Decimal,
}

/// The immutable record of a committed sale, aggregated from one or more
/// carts. Later price changes never retroactively affect it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalSale {
    pub id: String,
    pub user_id: String,
    /// Union of the pickups that funded the merged carts.
    pub pickup_ids: Vec<String>,
    pub items: Vec<SaleLine>,
    /// Σ(quantity × price) over `items`.
    pub total: Decimal,
    /// Declared expense amount; requires `expense_note` when positive.
    pub expense: Decimal,
    pub expense_note: Option<String>,
    pub completed_at: DateTime<Utc>,
}

// =============================================================================
// Return
// =============================================================================

/// One returned material or product line. For recipe-assembled products,
/// `materials_restored` records the material amounts credited back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnLine {
    pub subject_kind: SubjectKind,
    pub subject_id: String,
    pub quantity: Decimal,
    pub materials_restored: Vec<MaterialUse>,
}

/// The closing transaction of a reservation set: reconciles what was taken
/// against what was sold/returned and credits stock back. Applying it is
/// the only way a pickup becomes `completed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockReturn {
    pub id: String,
    pub user_id: String,
    pub final_sale_id: String,
    pub lines: Vec<ReturnLine>,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Production
// =============================================================================

/// Record of a manufacturing run: materials consumed, product credited.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Production {
    pub id: String,
    pub product_id: String,
    pub quantity: Decimal,
    pub used_materials: Vec<MaterialUse>,
    /// quantity × selling price at call time.
    pub revenue: Decimal,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Stock Snapshot
// =============================================================================

/// Point-in-time view of every balance, for the reservation UI and for
/// reconciliation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockSnapshot {
    pub materials: Vec<Material>,
    pub products: Vec<Product>,
}
