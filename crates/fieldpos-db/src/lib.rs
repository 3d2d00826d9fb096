//! # FieldPOS Database
//!
//! SQLite persistence and the transactional services that drive the stock
//! ledger and reservation lifecycle.
//!
//! ## Architecture
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                          fieldpos-db                                 │
//! │                                                                      │
//! │  ┌────────────────────┐      ┌─────────────────────────────────┐     │
//! │  │  service/          │      │  repository/                    │     │
//! │  │  one atomic unit   │ ───► │  row mapping, SQL, and the      │     │
//! │  │  per operation     │      │  stock ledger                   │     │
//! │  └────────────────────┘      └─────────────────────────────────┘     │
//! │            │                            │                            │
//! │            ▼                            ▼                            │
//! │  ┌────────────────────────────────────────────────────────────┐      │
//! │  │  pool: reader pool (N) + single writer connection, WAL     │      │
//! │  └────────────────────────────────────────────────────────────┘      │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Domain types, recipe resolution and request validation live in
//! [`fieldpos_core`]; this crate owns everything that touches SQLite.

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod service;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use repository::cart::CartRepository;
pub use repository::ledger::StockLedger;
pub use repository::material::MaterialRepository;
pub use repository::pickup::PickupRepository;
pub use repository::product::ProductRepository;
pub use repository::production::ProductionRepository;
pub use repository::sale::{FinalSaleRepository, ReturnRepository};
pub use service::cart::SalesCartStore;
pub use service::catalog::CatalogService;
pub use service::finalize::FinalizationEngine;
pub use service::production::ProductionProcessor;
pub use service::reservation::ReservationManager;
pub use service::returns::ReturnProcessor;
