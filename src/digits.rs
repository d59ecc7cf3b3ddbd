use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal::prelude::ToPrimitive;
use serde_json::Value;

use crate::error::CoreError;

/// Extract the last decimal digit of a price at the given precision.
///
/// For `decimals > 0` the price is rounded to exactly `decimals` fractional
/// digits (half away from zero) and the digit in the 10^-decimals place is
/// returned. Trailing zeros are significant: `100.20` at 3 decimals reads as
/// `100.200`, so the last digit is 0, not 2.
///
/// For `decimals == 0` the result is `abs(trunc(price)) mod 10`.
pub fn last_digit(price: Decimal, decimals: i32) -> Result<u8, CoreError> {
    if decimals < 0 {
        return Err(CoreError::InvalidInput(format!(
            "negative decimal precision: {decimals}"
        )));
    }
    if decimals == 0 {
        let whole = price.trunc().abs();
        let digit = (whole % Decimal::TEN)
            .to_u8()
            .ok_or_else(|| CoreError::InvalidInput(format!("unusable price: {price}")))?;
        return Ok(digit);
    }

    let scale = decimals as u32;
    if scale > 28 {
        // Beyond Decimal's representable scale.
        return Err(CoreError::InvalidInput(format!(
            "decimal precision too large: {decimals}"
        )));
    }

    let mut fixed = price.round_dp_with_strategy(scale, RoundingStrategy::MidpointAwayFromZero);
    // Pad to exactly `decimals` fractional digits so the mantissa's ones
    // place is the digit we want.
    fixed.rescale(scale);
    if fixed.scale() != scale {
        // rescale leaves the value untouched when padding would overflow the
        // 96-bit mantissa.
        return Err(CoreError::InvalidInput(format!(
            "price {price} not representable at {decimals} decimals"
        )));
    }
    Ok((fixed.mantissa().unsigned_abs() % 10) as u8)
}

/// Parse a venue price, which arrives as either a JSON number or a string.
///
/// Numbers go through their shortest textual form, so the parsed scale
/// matches what the venue printed (no binary-float noise).
pub fn parse_price(raw: &Value) -> Result<Decimal, CoreError> {
    let text = match raw {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        other => {
            return Err(CoreError::InvalidInput(format!(
                "price is not a number or string: {other}"
            )));
        }
    };
    text.parse::<Decimal>()
        .or_else(|_| Decimal::from_scientific(&text))
        .map_err(|e| CoreError::InvalidInput(format!("unparseable price {text:?}: {e}")))
}

/// Infer a market's decimal precision from a quoted price.
///
/// Mirrors the venue's own formatting: the fractional length of the quote,
/// or 2 when the quote has no fractional part.
pub fn infer_decimals(price: &Decimal) -> i32 {
    if price.scale() == 0 {
        2
    } else {
        price.scale() as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn trailing_zeros_are_significant() {
        assert_eq!(last_digit(dec!(100.20), 3).unwrap(), 0);
    }

    #[test]
    fn fractional_last_digit() {
        assert_eq!(last_digit(dec!(100.2), 1).unwrap(), 2);
        assert_eq!(last_digit(dec!(9876.54321), 5).unwrap(), 1);
    }

    #[test]
    fn integer_precision_uses_whole_part() {
        assert_eq!(last_digit(dec!(737), 0).unwrap(), 7);
        assert_eq!(last_digit(dec!(737.9), 0).unwrap(), 7);
        assert_eq!(last_digit(dec!(-12.5), 0).unwrap(), 2);
    }

    #[test]
    fn rounds_half_away_from_zero() {
        // Half-to-even would give 1.2 here.
        assert_eq!(last_digit(dec!(1.25), 1).unwrap(), 3);
        assert_eq!(last_digit(dec!(-1.25), 1).unwrap(), 3);
    }

    #[test]
    fn excess_precision_rounds_then_reads() {
        // 245.6789 at 2 decimals -> 245.68
        assert_eq!(last_digit(dec!(245.6789), 2).unwrap(), 8);
    }

    #[test]
    fn negative_decimals_rejected() {
        assert!(matches!(
            last_digit(dec!(1.5), -1),
            Err(CoreError::InvalidInput(_))
        ));
    }

    #[test]
    fn parse_price_number_and_string() {
        assert_eq!(parse_price(&json!(100.2)).unwrap(), dec!(100.2));
        assert_eq!(parse_price(&json!("6245.77")).unwrap(), dec!(6245.77));
        assert!(parse_price(&json!(null)).is_err());
        assert!(parse_price(&json!("not-a-price")).is_err());
    }

    #[test]
    fn infer_decimals_from_quote() {
        assert_eq!(infer_decimals(&dec!(6245.77)), 2);
        assert_eq!(infer_decimals(&dec!(1234.567)), 3);
        // Whole quotes default to 2.
        assert_eq!(infer_decimals(&dec!(737)), 2);
    }
}
