//! # Stock Units
//!
//! The fixed stock unit enumeration and the recipe→stock unit conversion.
//!
//! ## Why Conversion Exists
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │  Recipes are written in the SMALLEST unit of a family.               │
//! │  Stock balances are kept in the material's OWN unit.                 │
//! │                                                                      │
//! │  Material "Milk"   unit = l (volume-large)   balance = 3.0           │
//! │  Recipe line:      amount_per_unit = 200     (meaning 200 ml)        │
//! │                                                                      │
//! │  Producing 1 cup:  200 / 1000 = 0.2 l  ──►  balance 3.0 → 2.8        │
//! │                                                                      │
//! │  Materials with small or count units need no conversion:             │
//! │  Material "Sugar"  unit = g    amount_per_unit = 15  ──►  15 g       │
//! │  Material "Cup"    unit = pcs  amount_per_unit = 1   ──►  1 pcs      │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The large→small factor is fixed at 1000 for both mass (kg↔g) and
//! volume (l↔ml); count has no large form.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::StockError;

/// Fixed conversion factor between a "large" unit and its "small" unit.
pub const LARGE_TO_SMALL: Decimal = Decimal::ONE_THOUSAND;

// =============================================================================
// Stock Unit
// =============================================================================

/// The unit a material's stock balance is expressed in.
///
/// This is a closed enumeration; anything else fails with
/// [`StockError::UnknownUnit`] at the parsing boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockUnit {
    /// Kilograms (mass, large).
    MassLarge,
    /// Grams (mass, small).
    MassSmall,
    /// Liters (volume, large).
    VolumeLarge,
    /// Milliliters (volume, small).
    VolumeSmall,
    /// Pieces (count; no large form).
    Count,
}

impl StockUnit {
    /// The storage/display symbol for this unit.
    pub fn as_str(&self) -> &'static str {
        match self {
            StockUnit::MassLarge => "kg",
            StockUnit::MassSmall => "g",
            StockUnit::VolumeLarge => "l",
            StockUnit::VolumeSmall => "ml",
            StockUnit::Count => "pcs",
        }
    }

    /// Parses a unit symbol.
    ///
    /// ## Errors
    /// [`StockError::UnknownUnit`] if the symbol is not in the enumeration.
    pub fn parse(s: &str) -> Result<Self, StockError> {
        match s {
            "kg" => Ok(StockUnit::MassLarge),
            "g" => Ok(StockUnit::MassSmall),
            "l" => Ok(StockUnit::VolumeLarge),
            "ml" => Ok(StockUnit::VolumeSmall),
            "pcs" => Ok(StockUnit::Count),
            other => Err(StockError::UnknownUnit {
                unit: other.to_string(),
            }),
        }
    }

    /// Whether this is a "large" unit whose recipe amounts are written in
    /// the corresponding small unit.
    #[inline]
    pub const fn is_large(&self) -> bool {
        matches!(self, StockUnit::MassLarge | StockUnit::VolumeLarge)
    }
}

impl std::fmt::Display for StockUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Conversion
// =============================================================================

/// Converts a recipe `amount_per_unit` into the material's stock unit.
///
/// Recipe amounts are always expressed in the smallest unit of the
/// material's unit family, so for large-unit materials the amount is
/// divided by [`LARGE_TO_SMALL`]; small and count units pass through
/// unchanged.
///
/// ## Example
/// ```rust
/// use fieldpos_core::units::{recipe_amount_in_stock_unit, StockUnit};
/// use rust_decimal::Decimal;
///
/// // 200 ml of a material stocked in liters => 0.2 l
/// let amount = recipe_amount_in_stock_unit(Decimal::from(200), StockUnit::VolumeLarge);
/// assert_eq!(amount, Decimal::new(2, 1));
///
/// // 15 g of a material stocked in grams => 15 g
/// let amount = recipe_amount_in_stock_unit(Decimal::from(15), StockUnit::MassSmall);
/// assert_eq!(amount, Decimal::from(15));
/// ```
#[inline]
pub fn recipe_amount_in_stock_unit(amount_per_unit: Decimal, unit: StockUnit) -> Decimal {
    if unit.is_large() {
        amount_per_unit / LARGE_TO_SMALL
    } else {
        amount_per_unit
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_all_units() {
        assert_eq!(StockUnit::parse("kg").unwrap(), StockUnit::MassLarge);
        assert_eq!(StockUnit::parse("g").unwrap(), StockUnit::MassSmall);
        assert_eq!(StockUnit::parse("l").unwrap(), StockUnit::VolumeLarge);
        assert_eq!(StockUnit::parse("ml").unwrap(), StockUnit::VolumeSmall);
        assert_eq!(StockUnit::parse("pcs").unwrap(), StockUnit::Count);
    }

    #[test]
    fn test_parse_unknown_unit() {
        let err = StockUnit::parse("oz").unwrap_err();
        assert!(matches!(err, StockError::UnknownUnit { unit } if unit == "oz"));
    }

    #[test]
    fn test_roundtrip_symbols() {
        for unit in [
            StockUnit::MassLarge,
            StockUnit::MassSmall,
            StockUnit::VolumeLarge,
            StockUnit::VolumeSmall,
            StockUnit::Count,
        ] {
            assert_eq!(StockUnit::parse(unit.as_str()).unwrap(), unit);
        }
    }

    #[test]
    fn test_large_units_divide_by_1000() {
        assert_eq!(
            recipe_amount_in_stock_unit(dec!(200), StockUnit::VolumeLarge),
            dec!(0.2)
        );
        assert_eq!(
            recipe_amount_in_stock_unit(dec!(250), StockUnit::MassLarge),
            dec!(0.25)
        );
    }

    #[test]
    fn test_small_and_count_units_pass_through() {
        assert_eq!(
            recipe_amount_in_stock_unit(dec!(15), StockUnit::MassSmall),
            dec!(15)
        );
        assert_eq!(
            recipe_amount_in_stock_unit(dec!(30), StockUnit::VolumeSmall),
            dec!(30)
        );
        assert_eq!(
            recipe_amount_in_stock_unit(dec!(1), StockUnit::Count),
            dec!(1)
        );
    }
}
