//! Purchase order tests
//!
//! Covers the order lifecycle allow-list and the receiving planner:
//! - Only approved-and-later orders accept receipts
//! - A receive call is validated in full before any line changes
//! - An order is fully received only when all its live lines are

use proptest::prelude::*;
use rust_decimal::Decimal;
use std::str::FromStr;
use uuid::Uuid;

use shared::{
    line_total, plan_receipt, DocumentKind, OrderLine, PurchaseOrderItemStatus,
    PurchaseOrderStatus, ReceiptLine,
};

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn order_line(quantity: &str, received: &str) -> OrderLine {
    OrderLine {
        item_id: Uuid::new_v4(),
        material_id: Uuid::new_v4(),
        quantity: dec(quantity),
        received_quantity: dec(received),
        status: PurchaseOrderItemStatus::Ordered,
    }
}

fn receipt(line: &OrderLine, quantity: &str) -> ReceiptLine {
    ReceiptLine {
        material_id: line.material_id,
        quantity: dec(quantity),
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_happy_path_lifecycle() {
        use PurchaseOrderStatus::*;
        let path = [PendingApproval, Approved, Sent, Confirmed, PartiallyReceived, FullyReceived, Completed];

        let mut status = Draft;
        for next in path {
            status = status.transition_to(next).unwrap();
        }
        assert_eq!(status, Completed);
        assert!(status.is_terminal());
    }

    #[test]
    fn test_terminal_states_reject_everything() {
        for terminal in [
            PurchaseOrderStatus::Completed,
            PurchaseOrderStatus::Rejected,
            PurchaseOrderStatus::Cancelled,
        ] {
            for next in PurchaseOrderStatus::ALL {
                assert!(terminal.transition_to(*next).is_err());
            }
        }
    }

    #[test]
    fn test_draft_cannot_skip_approval() {
        assert!(PurchaseOrderStatus::Draft
            .transition_to(PurchaseOrderStatus::Approved)
            .is_err());
        assert!(!PurchaseOrderStatus::Draft.accepts_receipts());
        assert!(!PurchaseOrderStatus::PendingApproval.accepts_receipts());
    }

    #[test]
    fn test_partial_then_full_receipt() {
        let line = order_line("100", "0");

        let plan = plan_receipt(
            PurchaseOrderStatus::Approved,
            &[line.clone()],
            &[receipt(&line, "40")],
        )
        .unwrap();
        assert_eq!(plan.order_status, PurchaseOrderStatus::PartiallyReceived);
        assert_eq!(plan.receipts[0].received_quantity, dec("40"));
        assert_eq!(plan.receipts[0].status, PurchaseOrderItemStatus::PartiallyReceived);

        let after = OrderLine {
            received_quantity: dec("40"),
            status: PurchaseOrderItemStatus::PartiallyReceived,
            ..line.clone()
        };
        let plan = plan_receipt(
            PurchaseOrderStatus::PartiallyReceived,
            &[after],
            &[receipt(&line, "60")],
        )
        .unwrap();
        assert_eq!(plan.order_status, PurchaseOrderStatus::FullyReceived);
        assert_eq!(plan.receipts[0].status, PurchaseOrderItemStatus::FullyReceived);
    }

    #[test]
    fn test_over_receipt_rejected() {
        let line = order_line("100", "90");
        let result = plan_receipt(
            PurchaseOrderStatus::PartiallyReceived,
            &[line.clone()],
            &[receipt(&line, "11")],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_material_rejects_whole_call() {
        let line = order_line("10", "0");
        let stranger = ReceiptLine {
            material_id: Uuid::new_v4(),
            quantity: dec("1"),
        };

        let result = plan_receipt(
            PurchaseOrderStatus::Approved,
            &[line.clone()],
            &[receipt(&line, "5"), stranger],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_receiving_one_of_two_lines_is_partial() {
        let a = order_line("10", "0");
        let b = order_line("5", "0");

        let plan = plan_receipt(
            PurchaseOrderStatus::Sent,
            &[a.clone(), b],
            &[receipt(&a, "10")],
        )
        .unwrap();
        assert_eq!(plan.receipts[0].status, PurchaseOrderItemStatus::FullyReceived);
        assert_eq!(plan.order_status, PurchaseOrderStatus::PartiallyReceived);
    }

    #[test]
    fn test_cancelled_lines_do_not_block_completion() {
        let live = order_line("10", "0");
        let cancelled = OrderLine {
            status: PurchaseOrderItemStatus::Cancelled,
            ..order_line("5", "0")
        };

        let plan = plan_receipt(
            PurchaseOrderStatus::Confirmed,
            &[live.clone(), cancelled],
            &[receipt(&live, "10")],
        )
        .unwrap();
        assert_eq!(plan.order_status, PurchaseOrderStatus::FullyReceived);
    }

    #[test]
    fn test_receipts_rejected_before_approval() {
        let line = order_line("10", "0");
        assert!(plan_receipt(PurchaseOrderStatus::Draft, &[line.clone()], &[receipt(&line, "1")]).is_err());
        assert!(plan_receipt(PurchaseOrderStatus::Approved, &[line], &[]).is_err());
    }

    #[test]
    fn test_document_numbers() {
        let date = chrono::NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        assert_eq!(DocumentKind::PurchaseOrder.next_number(date, None), "PO-20240115-0001");
        assert_eq!(
            DocumentKind::PurchaseOrder.next_number(date, Some("PO-20240115-0041")),
            "PO-20240115-0042"
        );
        assert_eq!(DocumentKind::Request.stem(date), "REQ-20240115-");
    }

    #[test]
    fn test_line_total() {
        assert_eq!(line_total(dec("12.5"), dec("4.20")).unwrap(), dec("52.50"));
        assert_eq!(line_total(dec("0.25"), dec("0.10")).unwrap(), dec("0.03"));
        assert!(line_total(dec("9999999999.99"), dec("9999999999.99")).is_err());
    }

    #[test]
    fn test_sub_cent_receipt_rejected() {
        let line = order_line("10", "0");
        for quantity in ["0.004", "0.006"] {
            let result = plan_receipt(
                PurchaseOrderStatus::Approved,
                &[line.clone()],
                &[receipt(&line, quantity)],
            );
            assert!(result.is_err(), "{quantity} should be refused");
        }
    }
}

// ============================================================================
// Property Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    fn quantity_strategy() -> impl Strategy<Value = Decimal> {
        (1i64..=10000i64).prop_map(|n| Decimal::new(n, 1))
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Splitting an order quantity over several receive calls ends fully
        /// received exactly when the pieces add up to the ordered quantity
        #[test]
        fn prop_split_receipts_accumulate(
            pieces in prop::collection::vec(quantity_strategy(), 1..8)
        ) {
            let ordered: Decimal = pieces.iter().sum();
            let mut line = OrderLine {
                item_id: Uuid::new_v4(),
                material_id: Uuid::new_v4(),
                quantity: ordered,
                received_quantity: Decimal::ZERO,
                status: PurchaseOrderItemStatus::Ordered,
            };
            let mut status = PurchaseOrderStatus::Approved;

            for piece in &pieces {
                let plan = plan_receipt(
                    status,
                    &[line.clone()],
                    &[ReceiptLine { material_id: line.material_id, quantity: *piece }],
                ).unwrap();

                line.received_quantity = plan.receipts[0].received_quantity;
                line.status = plan.receipts[0].status;
                status = plan.order_status;
                prop_assert!(line.received_quantity <= line.quantity);
            }

            prop_assert_eq!(line.received_quantity, ordered);
            prop_assert_eq!(status, PurchaseOrderStatus::FullyReceived);
            prop_assert_eq!(line.status, PurchaseOrderItemStatus::FullyReceived);
        }

        /// Any receipt larger than what remains is refused
        #[test]
        fn prop_over_receipt_always_refused(
            ordered in quantity_strategy(),
            extra in quantity_strategy()
        ) {
            let line = OrderLine {
                item_id: Uuid::new_v4(),
                material_id: Uuid::new_v4(),
                quantity: ordered,
                received_quantity: Decimal::ZERO,
                status: PurchaseOrderItemStatus::Ordered,
            };
            let result = plan_receipt(
                PurchaseOrderStatus::Approved,
                &[line.clone()],
                &[ReceiptLine { material_id: line.material_id, quantity: ordered + extra }],
            );
            prop_assert!(result.is_err());
        }
    }
}
