//! # fieldpos-core: Pure Business Logic for FieldPOS
//!
//! This crate is the **heart** of FieldPOS: a small manufacturing/retail
//! operation where raw materials are consumed to produce finished goods,
//! goods are reserved ("picked up") for field sale, sales are staged and
//! finalized, and unsold stock is returned.
//!
//! ## Architecture Position
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                       FieldPOS Architecture                          │
//! │                                                                      │
//! │  ┌────────────────────────────────────────────────────────────────┐ │
//! │  │            Request routing layer (external, out of scope)      │ │
//! │  └──────────────────────────────┬─────────────────────────────────┘ │
//! │                                 │                                    │
//! │  ┌──────────────────────────────▼─────────────────────────────────┐ │
//! │  │              ★ fieldpos-core (THIS CRATE) ★                    │ │
//! │  │                                                                │ │
//! │  │  ┌──────────┐  ┌──────────┐  ┌──────────┐  ┌──────────────┐   │ │
//! │  │  │  types   │  │  units   │  │  recipe  │  │  validation  │   │ │
//! │  │  │ Material │  │StockUnit │  │ resolve_ │  │   typed      │   │ │
//! │  │  │ Pickup   │  │ kg↔g     │  │consumption│ │  requests    │   │ │
//! │  │  └──────────┘  └──────────┘  └──────────┘  └──────────────┘   │ │
//! │  │                                                                │ │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │ │
//! │  └──────────────────────────────┬─────────────────────────────────┘ │
//! │                                 │                                    │
//! │  ┌──────────────────────────────▼─────────────────────────────────┐ │
//! │  │               fieldpos-db (Stock Ledger & Services)            │ │
//! │  │        SQLite movements, reservations, transactional scope     │ │
//! │  └────────────────────────────────────────────────────────────────┘ │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Material, Product, Pickup, Cart, FinalSale, ...)
//! - [`units`] - Stock unit enumeration and recipe unit conversion
//! - [`recipe`] - Recipe resolution into per-material consumption
//! - [`validation`] - Typed request structs validated before any mutation
//! - [`error`] - Domain error taxonomy
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: Every function is deterministic - same input = same output
//! 2. **No I/O**: Database, network, file system access is FORBIDDEN here
//! 3. **Exact Decimals**: All quantities and prices are `rust_decimal::Decimal`
//! 4. **Explicit Errors**: All errors are typed, never strings or panics

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod recipe;
pub mod types;
pub mod units;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{StockError, StockResult, ValidationError};
pub use recipe::{resolve_consumption, MaterialDraw};
pub use types::*;
pub use units::{recipe_amount_in_stock_unit, StockUnit, LARGE_TO_SMALL};
pub use validation::{
    CreateCartRequest, CreateMaterialRequest, CreatePickupRequest, CreateProductRequest,
    CreateReturnRequest, FinalizeRequest, MaterialLineInput, ProduceRequest, ProductLineInput,
    RecipeLineInput, ReplaceCartItemsRequest, RestockMaterialRequest, MAX_NAME_LEN,
};
