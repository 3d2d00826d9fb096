//! # Repository Layer
//!
//! One repository per aggregate. Methods that must run inside an atomic
//! unit are associated functions taking `&mut SqliteConnection` - the
//! explicit transaction handle threaded through the unit. Instance methods
//! run on the read pool.
//!
//! ## Decimal storage
//! Quantities and prices are persisted as TEXT-encoded `rust_decimal`
//! values; all arithmetic and comparison happens in Rust inside the
//! serialized write transaction, never in SQL.

pub mod cart;
pub mod ledger;
pub mod material;
pub mod pickup;
pub mod product;
pub mod production;
pub mod sale;

use rust_decimal::Decimal;
use std::str::FromStr;

use fieldpos_core::{StockUnit, SubjectKind};

use crate::error::{DbError, DbResult};

/// Parses a TEXT-encoded decimal column, reporting the row it came from.
pub(crate) fn parse_decimal(entity: &str, id: &str, field: &str, value: &str) -> DbResult<Decimal> {
    Decimal::from_str(value).map_err(|_| DbError::Corrupt {
        entity: entity.to_string(),
        id: id.to_string(),
        field: field.to_string(),
        value: value.to_string(),
    })
}

/// Parses a stored stock unit symbol.
pub(crate) fn parse_unit(entity: &str, id: &str, value: &str) -> DbResult<StockUnit> {
    StockUnit::parse(value).map_err(|_| DbError::Corrupt {
        entity: entity.to_string(),
        id: id.to_string(),
        field: "unit".to_string(),
        value: value.to_string(),
    })
}

/// Parses a stored subject kind.
pub(crate) fn parse_subject_kind(entity: &str, id: &str, value: &str) -> DbResult<SubjectKind> {
    match value {
        "material" => Ok(SubjectKind::Material),
        "product" => Ok(SubjectKind::Product),
        other => Err(DbError::Corrupt {
            entity: entity.to_string(),
            id: id.to_string(),
            field: "subject_kind".to_string(),
            value: other.to_string(),
        }),
    }
}
