//! Quality check tests
//!
//! Covers the check lifecycle allow-list and the approval gate.

use proptest::prelude::*;
use std::str::FromStr;

use shared::{ensure_all_passed, AlertType, QualityCheckStatus};

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_results_locked_after_submission() {
        assert!(QualityCheckStatus::Draft.accepts_results());
        for status in QualityCheckStatus::ALL.iter().filter(|s| **s != QualityCheckStatus::Draft) {
            assert!(!status.accepts_results(), "{status} should not accept results");
        }
    }

    #[test]
    fn test_rejected_check_cannot_complete() {
        let rejected = QualityCheckStatus::Submitted
            .transition_to(QualityCheckStatus::Rejected)
            .unwrap();
        assert!(rejected.transition_to(QualityCheckStatus::Completed).is_err());
    }

    #[test]
    fn test_cancel_allowed_until_terminal() {
        for status in [
            QualityCheckStatus::Draft,
            QualityCheckStatus::Submitted,
            QualityCheckStatus::Approved,
        ] {
            assert!(status.transition_to(QualityCheckStatus::Cancelled).is_ok());
        }
        assert!(QualityCheckStatus::Completed
            .transition_to(QualityCheckStatus::Cancelled)
            .is_err());
    }

    #[test]
    fn test_status_strings() {
        assert_eq!(QualityCheckStatus::from_str("submitted").unwrap(), QualityCheckStatus::Submitted);
        assert!(QualityCheckStatus::from_str("passed").is_err());
        assert_eq!(AlertType::InventoryLow.as_str(), "inventory_low");
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Approval passes exactly when there is at least one item and none failed
        #[test]
        fn prop_approval_gate(results in prop::collection::vec(any::<bool>(), 0..12)) {
            let expected = !results.is_empty() && results.iter().all(|r| *r);
            prop_assert_eq!(ensure_all_passed(&results).is_ok(), expected);
        }
    }
}
