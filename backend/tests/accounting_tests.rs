//! Accounting tests
//!
//! Covers expense and income decisions, allocation of shared expenses
//! and the per-project balance.

use proptest::prelude::*;
use rust_decimal::Decimal;
use std::str::FromStr;
use uuid::Uuid;

use shared::{allocate_by_weight, validate_amount, AllocationType, ApprovalStatus, ProjectBalance};

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_only_pending_can_be_decided() {
        for status in ApprovalStatus::ALL {
            let can_decide = *status == ApprovalStatus::Pending;
            assert_eq!(
                status.transition_to(ApprovalStatus::Approved, "expense").is_ok(),
                can_decide,
                "{status}"
            );
            assert_eq!(
                status.transition_to(ApprovalStatus::Rejected, "expense").is_ok(),
                can_decide,
                "{status}"
            );
        }
    }

    #[test]
    fn test_status_reads_from_column() {
        assert_eq!(ApprovalStatus::try_from("approved".to_string()).unwrap(), ApprovalStatus::Approved);
        assert!(ApprovalStatus::from_str("paid").is_err());
        assert_eq!(
            AllocationType::from_str("weight_based").unwrap(),
            AllocationType::WeightBased
        );
    }

    #[test]
    fn test_expense_amounts_fit_the_column() {
        assert!(validate_amount(&dec("1500.25")).is_ok());
        assert!(validate_amount(&Decimal::ZERO).is_err());
        assert!(validate_amount(&dec("-3")).is_err());
        assert!(validate_amount(&dec("10.004")).is_err());
        assert!(validate_amount(&dec("1000000000000")).is_err());
    }

    #[test]
    fn test_shared_expense_follows_issued_quantity() {
        let tower = Uuid::new_v4();
        let bridge = Uuid::new_v4();
        let shares = allocate_by_weight(dec("900"), &[(tower, dec("200")), (bridge, dec("100"))]);

        assert_eq!(shares, vec![(tower, dec("600")), (bridge, dec("300"))]);
    }

    #[test]
    fn test_idle_project_gets_no_share() {
        let busy = Uuid::new_v4();
        let idle = Uuid::new_v4();
        let shares = allocate_by_weight(dec("50"), &[(busy, dec("4")), (idle, Decimal::ZERO)]);

        assert_eq!(shares, vec![(busy, dec("50"))]);
    }

    #[test]
    fn test_balance_can_go_negative() {
        let balance = ProjectBalance::new(
            Uuid::nil(),
            dec("100"),
            dec("80"),
            dec("15.50"),
            dec("20"),
        );
        assert_eq!(balance.net, dec("-15.50"));
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// No project's share exceeds the expense and none is negative
        #[test]
        fn prop_shares_bounded(
            cents in 1i64..10_000_000,
            weights in prop::collection::vec(0i64..1_000, 1..8)
        ) {
            let amount = Decimal::new(cents, 2);
            let weights: Vec<(Uuid, Decimal)> = weights
                .into_iter()
                .map(|w| (Uuid::new_v4(), Decimal::from(w)))
                .collect();

            for (_, share) in allocate_by_weight(amount, &weights) {
                prop_assert!(share >= Decimal::ZERO);
                prop_assert!(share <= amount);
            }
        }
    }
}
