//! Material request tests
//!
//! Covers the request lifecycle and the fulfillment planners:
//! - Fulfillment only from approved or in-progress requests
//! - A single shortage fails a whole fulfillment
//! - Partial fulfillment never exceeds the requested quantity

use proptest::prelude::*;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::str::FromStr;
use uuid::Uuid;

use shared::{
    plan_fulfillment, plan_partial_fulfillment, DomainError, RequestItemStatus, RequestLine,
    RequestStatus,
};

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn line(material_id: Uuid, quantity: &str, fulfilled: &str) -> RequestLine {
    let quantity = dec(quantity);
    let quantity_fulfilled = dec(fulfilled);
    RequestLine {
        item_id: Uuid::new_v4(),
        material_id,
        quantity,
        quantity_fulfilled,
        is_fulfilled: quantity_fulfilled >= quantity,
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_approval_flow() {
        let status = RequestStatus::Draft
            .transition_to(RequestStatus::PendingApproval)
            .and_then(|s| s.transition_to(RequestStatus::Approved))
            .unwrap();
        assert!(status.accepts_fulfillment());
        assert!(!RequestStatus::Draft.accepts_fulfillment());
        assert!(!RequestStatus::PendingApproval.accepts_fulfillment());
    }

    #[test]
    fn test_rejected_request_is_terminal() {
        let status = RequestStatus::PendingApproval
            .transition_to(RequestStatus::Rejected)
            .unwrap();
        assert!(status.is_terminal());
        assert!(status.transition_to(RequestStatus::Approved).is_err());
    }

    #[test]
    fn test_cancellation_closes_only_open_lines() {
        assert!(RequestItemStatus::Pending.is_open());
        assert!(RequestItemStatus::PartiallyFulfilled.is_open());
        assert!(!RequestItemStatus::Fulfilled.is_open());
        assert!(!RequestItemStatus::Cancelled.is_open());
    }

    #[test]
    fn test_fulfillment_requires_approval() {
        let material = Uuid::new_v4();
        let lines = [line(material, "5", "0")];
        let result = plan_fulfillment(RequestStatus::PendingApproval, &lines, |_| Some(dec("100")));
        assert!(matches!(result, Err(DomainError::Validation { .. })));
    }

    #[test]
    fn test_two_lines_share_one_balance() {
        let material = Uuid::new_v4();
        let lines = [line(material, "6", "0"), line(material, "6", "0")];

        let result = plan_fulfillment(RequestStatus::Approved, &lines, |_| Some(dec("10")));
        match result {
            Err(DomainError::InsufficientQuantity {
                available,
                requested,
                ..
            }) => {
                assert_eq!(available, dec("4"));
                assert_eq!(requested, dec("6"));
            }
            other => panic!("expected shortage, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_position_is_reported() {
        let lines = [line(Uuid::new_v4(), "1", "0")];
        let result = plan_fulfillment(RequestStatus::Approved, &lines, |_| None);
        assert!(matches!(result, Err(DomainError::Validation { .. })));
    }

    #[test]
    fn test_only_remaining_quantities_are_issued() {
        let material = Uuid::new_v4();
        let done = line(material, "3", "3");
        let half = line(material, "10", "4");

        let issues =
            plan_fulfillment(RequestStatus::InProgress, &[done, half.clone()], |_| Some(dec("6")))
                .unwrap();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].item_id, half.item_id);
        assert_eq!(issues[0].quantity, dec("6"));
    }

    #[test]
    fn test_partial_fulfillment_steps() {
        let material = Uuid::new_v4();
        let request_line = line(material, "10", "0");

        let first =
            plan_partial_fulfillment(RequestStatus::Approved, &request_line, dec("4"), dec("50"))
                .unwrap();
        assert_eq!(first.quantity_fulfilled, dec("4"));
        assert!(!first.is_fulfilled);
        assert_eq!(first.item_status, RequestItemStatus::PartiallyFulfilled);

        let after = RequestLine {
            quantity_fulfilled: first.quantity_fulfilled,
            ..request_line
        };
        let second =
            plan_partial_fulfillment(RequestStatus::InProgress, &after, dec("6"), dec("46")).unwrap();
        assert!(second.is_fulfilled);
        assert_eq!(second.item_status, RequestItemStatus::Fulfilled);
    }

    #[test]
    fn test_partial_fulfillment_limits() {
        let material = Uuid::new_v4();
        let request_line = line(material, "10", "8");

        assert!(plan_partial_fulfillment(RequestStatus::Approved, &request_line, dec("3"), dec("50")).is_err());
        assert!(plan_partial_fulfillment(RequestStatus::Approved, &request_line, dec("2"), dec("1")).is_err());
        assert!(plan_partial_fulfillment(RequestStatus::Draft, &request_line, dec("1"), dec("50")).is_err());

        assert!(plan_partial_fulfillment(RequestStatus::Approved, &request_line, dec("0.006"), dec("50")).is_err());
        assert!(plan_partial_fulfillment(RequestStatus::Approved, &request_line, dec("0.004"), dec("50")).is_err());

        let done = line(material, "10", "10");
        assert!(plan_partial_fulfillment(RequestStatus::InProgress, &done, dec("1"), dec("50")).is_err());
    }
}

// ============================================================================
// Property Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    fn quantity_strategy() -> impl Strategy<Value = Decimal> {
        (1i64..=1000i64).prop_map(|n| Decimal::new(n, 1))
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// A plan either covers every outstanding line from stock or fails;
        /// it never issues more of a material than is on hand
        #[test]
        fn prop_plan_never_overdraws(
            requested in prop::collection::vec((0usize..3, quantity_strategy()), 1..10),
            stock in prop::collection::vec(quantity_strategy(), 3)
        ) {
            let materials: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
            let on_hand: HashMap<Uuid, Decimal> =
                materials.iter().copied().zip(stock.iter().copied()).collect();
            let lines: Vec<RequestLine> = requested
                .iter()
                .map(|(m, q)| RequestLine {
                    item_id: Uuid::new_v4(),
                    material_id: materials[*m],
                    quantity: *q,
                    quantity_fulfilled: Decimal::ZERO,
                    is_fulfilled: false,
                })
                .collect();

            let mut demand: HashMap<Uuid, Decimal> = HashMap::new();
            for l in &lines {
                *demand.entry(l.material_id).or_default() += l.quantity;
            }
            let coverable = demand.iter().all(|(m, d)| on_hand[m] >= *d);

            match plan_fulfillment(RequestStatus::Approved, &lines, |m| on_hand.get(&m).copied()) {
                Ok(issues) => {
                    prop_assert!(coverable);
                    prop_assert_eq!(issues.len(), lines.len());
                    let mut issued: HashMap<Uuid, Decimal> = HashMap::new();
                    for issue in &issues {
                        *issued.entry(issue.material_id).or_default() += issue.quantity;
                    }
                    for (m, total) in issued {
                        prop_assert!(total <= on_hand[&m]);
                    }
                }
                Err(DomainError::InsufficientQuantity { .. }) => prop_assert!(!coverable),
                Err(other) => prop_assert!(false, "unexpected error {}", other),
            }
        }

        /// Fulfilled quantity stays within the requested quantity
        #[test]
        fn prop_partial_within_bounds(
            quantity in quantity_strategy(),
            issue in quantity_strategy()
        ) {
            let request_line = RequestLine {
                item_id: Uuid::new_v4(),
                material_id: Uuid::new_v4(),
                quantity,
                quantity_fulfilled: Decimal::ZERO,
                is_fulfilled: false,
            };

            match plan_partial_fulfillment(RequestStatus::Approved, &request_line, issue, quantity) {
                Ok(outcome) => {
                    prop_assert!(issue <= quantity);
                    prop_assert!(outcome.quantity_fulfilled <= quantity);
                    prop_assert_eq!(outcome.is_fulfilled, issue == quantity);
                }
                Err(_) => prop_assert!(issue > quantity),
            }
        }
    }
}
