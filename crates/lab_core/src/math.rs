//! Fixed-point amounts for deterministic resource math.
//!
//! Money, compute, safety and capabilities are all stored as [`Amount`].
//! Floating point only appears at the display boundary (snapshots and
//! readouts), never inside the simulation.

use fixed::types::I32F32;

/// Fixed-point number type for all resource math.
///
/// Uses 32 bits for integer part and 32 bits for fractional part.
/// Range: approximately -2,147,483,648 to 2,147,483,647
pub type Amount = I32F32;

/// Create an amount from a whole number.
#[must_use]
pub fn amount(n: i64) -> Amount {
    Amount::saturating_from_num(n)
}

/// Convert an amount to `f64` for display.
#[must_use]
pub fn to_display(value: Amount) -> f64 {
    value.to_num::<f64>()
}

/// Format an amount of money without fractional digits, e.g. `50000`.
#[must_use]
pub fn format_money(value: Amount) -> String {
    format!("{}", value.round().to_num::<i64>())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amount_round_trips_whole_numbers() {
        assert_eq!(to_display(amount(50_000)), 50_000.0);
        assert_eq!(to_display(amount(-12)), -12.0);
    }

    #[test]
    fn test_amount_saturates() {
        assert_eq!(amount(i64::MAX), Amount::MAX);
    }

    #[test]
    fn test_format_money() {
        assert_eq!(format_money(amount(100_000)), "100000");
        assert_eq!(format_money(Amount::from_num(2.5)), "3");
    }
}
