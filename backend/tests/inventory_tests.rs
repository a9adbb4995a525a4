//! Inventory ledger tests
//!
//! Covers the rules the inventory service applies inside its transactions:
//! - Ledger positions never go negative
//! - Every accepted change is logged as a positive-magnitude movement
//! - Low-stock alerts fire only for monitored positions under their minimum

use proptest::prelude::*;
use rust_decimal::Decimal;
use std::str::FromStr;
use uuid::Uuid;

use shared::{
    apply_delta, is_below_minimum, validate_non_zero, validate_positive, DomainError,
    LowStockAlert, Movement, StockReference, TransactionType,
};

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_transaction_types_round_trip() {
        for t in TransactionType::ALL {
            assert_eq!(TransactionType::from_str(t.as_str()).unwrap(), *t);
        }
        assert!(TransactionType::from_str("sale").is_err());
    }

    #[test]
    fn test_issue_then_shortage() {
        let material = Uuid::new_v4();

        let balance = apply_delta(material, dec("100"), dec("-40")).unwrap();
        assert_eq!(balance, dec("60"));

        let err = apply_delta(material, balance, dec("-60.01")).unwrap_err();
        match err {
            DomainError::InsufficientQuantity {
                available,
                requested,
                ..
            } => {
                assert_eq!(available, dec("60"));
                assert_eq!(requested, dec("60.01"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_sub_cent_changes_never_reach_the_ledger() {
        let material = Uuid::new_v4();
        for delta in ["0.006", "0.004"] {
            assert!(matches!(
                apply_delta(material, dec("100"), dec(delta)),
                Err(DomainError::Validation { .. })
            ));
        }
        assert!(validate_non_zero(&dec("0.006")).is_err());
        assert!(validate_positive(&dec("0.004")).is_err());
        assert!(validate_positive(&dec("10000000000")).is_err());
    }

    #[test]
    fn test_issue_everything_leaves_zero() {
        let balance = apply_delta(Uuid::new_v4(), dec("12.5"), dec("-12.5")).unwrap();
        assert_eq!(balance, Decimal::ZERO);
    }

    #[test]
    fn test_transfer_legs_are_two_adjustments() {
        let source_wh = Uuid::new_v4();
        let dest_wh = Uuid::new_v4();
        let quantity = dec("7");

        let out_leg = Movement::for_delta(TransactionType::Adjustment, -quantity, source_wh);
        let in_leg = Movement::for_delta(TransactionType::Adjustment, quantity, dest_wh);

        assert!(out_leg.validate().is_ok());
        assert!(in_leg.validate().is_ok());
        assert_eq!(out_leg.quantity, in_leg.quantity);
        assert_eq!(out_leg.from_warehouse_id, Some(source_wh));
        assert_eq!(in_leg.to_warehouse_id, Some(dest_wh));
    }

    #[test]
    fn test_reference_serializes_as_tagged_value() {
        let project = Uuid::nil();
        let json = serde_json::to_value(StockReference::Project(project)).unwrap();
        assert_eq!(json["kind"], "project");
        assert_eq!(json["id"], project.to_string());

        let json = serde_json::to_value(StockReference::GeneralUse).unwrap();
        assert_eq!(json["kind"], "general_use");
    }

    #[test]
    fn test_low_stock_message() {
        let alert = LowStockAlert {
            inventory_item_id: Uuid::new_v4(),
            material_id: Uuid::new_v4(),
            warehouse_id: Uuid::new_v4(),
            quantity: dec("5"),
            min_quantity: dec("10"),
        };
        assert_eq!(
            alert.message("Rebar 12mm (RB-12)"),
            "Stock of Rebar 12mm (RB-12) is 5 which is below the minimum of 10"
        );
    }

    #[test]
    fn test_alert_threshold_is_strict() {
        assert!(is_below_minimum(dec("9.99"), dec("10"), true));
        assert!(!is_below_minimum(dec("10"), dec("10"), true));
        assert!(!is_below_minimum(dec("0"), dec("10"), false));
    }
}

// ============================================================================
// Property Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    /// Non-zero signed changes between -1000.0 and 1000.0
    fn delta_strategy() -> impl Strategy<Value = Decimal> {
        prop_oneof![
            (1i64..=10000i64).prop_map(|n| Decimal::new(n, 1)),
            (1i64..=10000i64).prop_map(|n| Decimal::new(-n, 1)),
        ]
    }

    fn quantity_strategy() -> impl Strategy<Value = Decimal> {
        (0i64..=100000i64).prop_map(|n| Decimal::new(n, 2))
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Replaying any sequence of changes never produces a negative
        /// balance, and rejected changes leave the balance untouched
        #[test]
        fn prop_balance_never_negative(
            opening in quantity_strategy(),
            deltas in prop::collection::vec(delta_strategy(), 1..30)
        ) {
            let material = Uuid::new_v4();
            let mut balance = opening;
            let mut accepted = Decimal::ZERO;

            for delta in deltas {
                match apply_delta(material, balance, delta) {
                    Ok(next) => {
                        prop_assert_eq!(next, balance + delta);
                        accepted += delta;
                        balance = next;
                    }
                    Err(DomainError::InsufficientQuantity { available, requested, .. }) => {
                        prop_assert!(delta < Decimal::ZERO);
                        prop_assert_eq!(available, balance);
                        prop_assert_eq!(requested, -delta);
                    }
                    Err(other) => prop_assert!(false, "unexpected error {}", other),
                }
                prop_assert!(balance >= Decimal::ZERO);
            }

            prop_assert_eq!(balance, opening + accepted);
        }

        /// The logged magnitude is |delta| and the direction follows its sign
        #[test]
        fn prop_movement_records_magnitude_and_direction(delta in delta_strategy()) {
            let warehouse = Uuid::new_v4();
            let movement = Movement::for_delta(TransactionType::Adjustment, delta, warehouse);

            prop_assert!(movement.validate().is_ok());
            prop_assert_eq!(movement.quantity, delta.abs());
            prop_assert!(movement.quantity > Decimal::ZERO);
            if delta < Decimal::ZERO {
                prop_assert_eq!(movement.from_warehouse_id, Some(warehouse));
                prop_assert_eq!(movement.to_warehouse_id, None);
            } else {
                prop_assert_eq!(movement.to_warehouse_id, Some(warehouse));
                prop_assert_eq!(movement.from_warehouse_id, None);
            }
        }

        /// Unmonitored positions never alert, whatever their level
        #[test]
        fn prop_unmonitored_never_alerts(
            quantity in quantity_strategy(),
            min_quantity in quantity_strategy()
        ) {
            prop_assert!(!is_below_minimum(quantity, min_quantity, false));
            prop_assert_eq!(is_below_minimum(quantity, min_quantity, true), quantity < min_quantity);
        }
    }
}
