//! Margin calculations

use rust_decimal::Decimal;

/// Margin required for a position: notional / leverage.
pub fn required_margin(size: Decimal, price: Decimal, leverage: u32) -> Decimal {
    assert!(leverage >= 1, "leverage must be at least 1");
    let notional = size.abs() * price;
    notional / Decimal::from(leverage)
}

/// Check that leverage is within the allowed range.
pub fn validate_leverage(leverage: u32, max_leverage: u32) -> bool {
    (1..=max_leverage).contains(&leverage)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_required_margin() {
        // 1 @ 100 at 100x -> margin 1
        assert_eq!(required_margin(dec!(1), dec!(100), 100), dec!(1));
        // 2 @ 100 at 10x -> margin 20
        assert_eq!(required_margin(dec!(2), dec!(100), 10), dec!(20));
        // Short positions use absolute size
        assert_eq!(required_margin(dec!(-2), dec!(100), 10), dec!(20));
    }

    #[test]
    fn test_validate_leverage() {
        assert!(validate_leverage(1, 150));
        assert!(validate_leverage(150, 150));
        assert!(!validate_leverage(0, 150));
        assert!(!validate_leverage(151, 150));
    }
}
