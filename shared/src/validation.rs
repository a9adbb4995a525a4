//! Field validators shared by request bodies
//!
//! Each function has the signature `validator` expects for
//! `#[validate(custom = "...")]`.

use rust_decimal::Decimal;
use validator::ValidationError;

use crate::error::{DomainError, DomainResult};

/// Decimal places kept by quantity and price columns
pub const QUANTITY_SCALE: u32 = 2;

/// Largest magnitude a `NUMERIC(12, 2)` quantity or price column holds
pub const MAX_QUANTITY: Decimal = Decimal::from_parts(0xD4A5_0FFF, 0xE8, 0, false, QUANTITY_SCALE);

/// Largest magnitude a `NUMERIC(14, 2)` amount column holds
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(0x107A_3FFF, 0x5AF3, 0, false, QUANTITY_SCALE);

/// Whether the column stores `value` exactly, without rounding or overflow
pub fn is_storable(value: &Decimal, max: Decimal) -> bool {
    value.normalize().scale() <= QUANTITY_SCALE && value.abs() <= max
}

/// Domain-level form of the storage check, for values that do not pass
/// through a request body validator
pub fn ensure_storable(field: &str, value: Decimal, max: Decimal) -> DomainResult<()> {
    if value.normalize().scale() > QUANTITY_SCALE {
        return Err(DomainError::validation(
            field,
            format!("{} has more than {} decimal places", value, QUANTITY_SCALE),
        ));
    }
    if value.abs() > max {
        return Err(DomainError::validation(
            field,
            format!("{} exceeds the maximum of {}", value, max),
        ));
    }
    Ok(())
}

fn error(code: &'static str, message: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(message.into());
    err
}

/// At most two decimal places and within the column range
pub fn validate_storable(value: &Decimal) -> Result<(), ValidationError> {
    if value.normalize().scale() > QUANTITY_SCALE {
        return Err(error("scale", "must have at most two decimal places"));
    }
    if value.abs() > MAX_QUANTITY {
        return Err(error("range", "must not exceed 9999999999.99"));
    }
    Ok(())
}

/// Quantity strictly greater than zero
pub fn validate_positive(value: &Decimal) -> Result<(), ValidationError> {
    validate_storable(value)?;
    if *value > Decimal::ZERO {
        Ok(())
    } else {
        Err(error("positive", "must be greater than zero"))
    }
}

/// Money amount: positive, cents at most, within a `NUMERIC(14, 2)` column
pub fn validate_amount(value: &Decimal) -> Result<(), ValidationError> {
    if !is_storable(value, MAX_AMOUNT) {
        return Err(error("amount_range", "must have at most two decimal places and not exceed 999999999999.99"));
    }
    if *value > Decimal::ZERO {
        Ok(())
    } else {
        Err(error("positive", "must be greater than zero"))
    }
}

/// Quantity or price that may be zero but never negative
pub fn validate_non_negative(value: &Decimal) -> Result<(), ValidationError> {
    validate_storable(value)?;
    if *value >= Decimal::ZERO {
        Ok(())
    } else {
        Err(error("non_negative", "must not be negative"))
    }
}

/// Signed change that must actually change something
pub fn validate_non_zero(value: &Decimal) -> Result<(), ValidationError> {
    validate_storable(value)?;
    if value.is_zero() {
        Err(error("non_zero", "must not be zero"))
    } else {
        Ok(())
    }
}

/// Reference codes: 1-50 characters of uppercase letters, digits, `-` or `_`
pub fn validate_code(code: &str) -> Result<(), ValidationError> {
    if code.is_empty() || code.len() > 50 {
        return Err(error("code_length", "must be between 1 and 50 characters"));
    }
    if !code
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '-' || c == '_')
    {
        return Err(error(
            "code_format",
            "must contain only uppercase letters, digits, '-' or '_'",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::str::FromStr;

    #[test]
    fn decimal_rules() {
        assert!(validate_positive(&Decimal::ONE).is_ok());
        assert!(validate_positive(&Decimal::ZERO).is_err());
        assert!(validate_non_negative(&Decimal::ZERO).is_ok());
        assert!(validate_non_negative(&Decimal::NEGATIVE_ONE).is_err());
        assert!(validate_non_zero(&Decimal::NEGATIVE_ONE).is_ok());
        assert!(validate_non_zero(&Decimal::ZERO).is_err());
    }

    #[test]
    fn storage_bounds() {
        assert_eq!(MAX_QUANTITY, Decimal::from_str("9999999999.99").unwrap());
        assert_eq!(MAX_AMOUNT, Decimal::from_str("999999999999.99").unwrap());

        assert!(validate_positive(&Decimal::from_str("0.004").unwrap()).is_err());
        assert!(validate_non_zero(&Decimal::from_str("0.006").unwrap()).is_err());
        assert!(validate_non_negative(&Decimal::from_str("1.500").unwrap()).is_ok());
        assert!(validate_positive(&MAX_QUANTITY).is_ok());
        assert!(validate_positive(&(MAX_QUANTITY + Decimal::new(1, 2))).is_err());

        assert!(validate_amount(&Decimal::from_str("150000000000.50").unwrap()).is_ok());
        assert!(validate_amount(&Decimal::from_str("12.345").unwrap()).is_err());
        assert!(validate_amount(&Decimal::ZERO).is_err());

        assert!(ensure_storable("quantity", Decimal::new(-1, 2), MAX_QUANTITY).is_ok());
        assert!(ensure_storable("quantity", Decimal::new(-1, 3), MAX_QUANTITY).is_err());
    }

    #[test]
    fn codes() {
        assert!(validate_code("WH-01").is_ok());
        assert!(validate_code("CEMENT_50KG").is_ok());
        assert!(validate_code("").is_err());
        assert!(validate_code("wh-01").is_err());
        assert!(validate_code(&"A".repeat(51)).is_err());
    }

    proptest! {
        #[test]
        fn generated_codes_are_accepted(code in "[A-Z0-9_-]{1,50}") {
            prop_assert!(validate_code(&code).is_ok());
        }
    }
}
