//! # Transactional Services
//!
//! One service per operation family of the core. Every mutating method:
//!
//! 1. Validates its typed request (zero side effects on failure)
//! 2. Begins one atomic unit on the writer connection
//! 3. Threads the transaction handle through every repository/ledger call
//! 4. Commits - or rolls back everything on the first error
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │  CatalogService        create/restock materials, products, snapshot │
//! │  ProductionProcessor   materials ──► product stock (manufacturing)   │
//! │  ReservationManager    stock ──► active Pickup (all-or-nothing)      │
//! │  SalesCartStore        mutable sale intent, no stock moves           │
//! │  FinalizationEngine    carts ──► immutable FinalSale                 │
//! │  ReturnProcessor       returned stock ──► credits, Pickups completed │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```

pub mod cart;
pub mod catalog;
pub mod finalize;
pub mod production;
pub mod reservation;
pub mod returns;
