//! Purchase order lifecycle and receiving rules

use std::collections::HashMap;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DomainError, DomainResult};
use crate::validation::{ensure_storable, MAX_AMOUNT, MAX_QUANTITY, QUANTITY_SCALE};

string_enum! {
    /// Purchase order status
    pub enum PurchaseOrderStatus {
        Draft => "draft",
        PendingApproval => "pending_approval",
        Approved => "approved",
        Sent => "sent",
        Confirmed => "confirmed",
        PartiallyReceived => "partially_received",
        FullyReceived => "fully_received",
        Completed => "completed",
        Rejected => "rejected",
        Cancelled => "cancelled",
    }
}

impl PurchaseOrderStatus {
    /// Allow-list of statuses reachable from this one
    pub fn allowed_transitions(&self) -> &'static [PurchaseOrderStatus] {
        use PurchaseOrderStatus::*;
        match self {
            Draft => &[PendingApproval, Cancelled],
            PendingApproval => &[Approved, Rejected, Cancelled],
            Approved => &[Sent, PartiallyReceived, FullyReceived, Cancelled],
            Sent => &[Confirmed, PartiallyReceived, FullyReceived, Cancelled],
            Confirmed => &[PartiallyReceived, FullyReceived, Cancelled],
            PartiallyReceived => &[PartiallyReceived, FullyReceived],
            FullyReceived => &[Completed],
            Completed | Rejected | Cancelled => &[],
        }
    }

    pub fn can_transition_to(&self, next: PurchaseOrderStatus) -> bool {
        self.allowed_transitions().contains(&next)
    }

    pub fn transition_to(self, next: PurchaseOrderStatus) -> DomainResult<PurchaseOrderStatus> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(DomainError::InvalidTransition {
                entity: "purchase order",
                from: self.to_string(),
                to: next.to_string(),
            })
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.allowed_transitions().is_empty()
    }

    /// Receipts may be booked once the order has been approved
    pub fn accepts_receipts(&self) -> bool {
        matches!(
            self,
            PurchaseOrderStatus::Approved
                | PurchaseOrderStatus::Sent
                | PurchaseOrderStatus::Confirmed
                | PurchaseOrderStatus::PartiallyReceived
        )
    }

    /// Lines and header fields are editable only while drafting
    pub fn is_editable(&self) -> bool {
        matches!(self, PurchaseOrderStatus::Draft)
    }
}

string_enum! {
    /// Status of a single purchase order line
    pub enum PurchaseOrderItemStatus {
        Pending => "pending",
        Ordered => "ordered",
        PartiallyReceived => "partially_received",
        FullyReceived => "fully_received",
        Cancelled => "cancelled",
    }
}

impl PurchaseOrderItemStatus {
    pub fn for_received(received_quantity: Decimal, quantity: Decimal) -> Self {
        if received_quantity >= quantity {
            PurchaseOrderItemStatus::FullyReceived
        } else if received_quantity > Decimal::ZERO {
            PurchaseOrderItemStatus::PartiallyReceived
        } else {
            PurchaseOrderItemStatus::Ordered
        }
    }
}

/// Line total for a quantity at a unit price, rounded half away from zero
/// to cents
pub fn line_total(quantity: Decimal, unit_price: Decimal) -> DomainResult<Decimal> {
    let total = quantity
        .checked_mul(unit_price)
        .map(|t| t.round_dp_with_strategy(QUANTITY_SCALE, RoundingStrategy::MidpointAwayFromZero))
        .filter(|t| t.abs() <= MAX_AMOUNT)
        .ok_or_else(|| {
            DomainError::validation(
                "unit_price",
                format!("line total exceeds the maximum of {}", MAX_AMOUNT),
            )
        })?;
    Ok(total)
}

/// Current state of an order line as read inside the receiving transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderLine {
    pub item_id: Uuid,
    pub material_id: Uuid,
    pub quantity: Decimal,
    pub received_quantity: Decimal,
    pub status: PurchaseOrderItemStatus,
}

impl OrderLine {
    pub fn remaining(&self) -> Decimal {
        self.quantity - self.received_quantity
    }
}

/// One delivered quantity in a receive call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptLine {
    pub material_id: Uuid,
    pub quantity: Decimal,
}

/// Change to apply to one order line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedReceipt {
    pub item_id: Uuid,
    pub material_id: Uuid,
    pub quantity: Decimal,
    pub received_quantity: Decimal,
    pub status: PurchaseOrderItemStatus,
}

/// Every write a receive call will perform, decided up front
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptPlan {
    pub receipts: Vec<PlannedReceipt>,
    pub order_status: PurchaseOrderStatus,
}

/// Validate a receive call against the order and compute its effect.
///
/// Fails on the first violated rule, so the caller never applies a
/// subset of the lines. The order becomes fully received only when every
/// non-cancelled line of the whole order is fully received afterwards.
pub fn plan_receipt(
    order_status: PurchaseOrderStatus,
    lines: &[OrderLine],
    receipts: &[ReceiptLine],
) -> DomainResult<ReceiptPlan> {
    if !order_status.accepts_receipts() {
        return Err(DomainError::validation(
            "status",
            format!(
                "Order is not in a valid status for receiving (current status: {})",
                order_status
            ),
        ));
    }

    if receipts.is_empty() {
        return Err(DomainError::validation(
            "items",
            "at least one item must be received",
        ));
    }

    let mut received: HashMap<Uuid, Decimal> = lines
        .iter()
        .map(|line| (line.item_id, line.received_quantity))
        .collect();
    let mut planned: Vec<PlannedReceipt> = Vec::with_capacity(receipts.len());

    for receipt in receipts {
        if receipt.quantity <= Decimal::ZERO {
            return Err(DomainError::validation(
                "quantity",
                format!("Quantity for material {} must be positive", receipt.material_id),
            ));
        }
        ensure_storable("quantity", receipt.quantity, MAX_QUANTITY)?;

        let line = lines
            .iter()
            .find(|line| {
                line.material_id == receipt.material_id
                    && line.status != PurchaseOrderItemStatus::Cancelled
            })
            .ok_or_else(|| {
                DomainError::validation(
                    "material_id",
                    format!("Material {} is not part of this order", receipt.material_id),
                )
            })?;

        let already = received.get(&line.item_id).copied().unwrap_or_default();
        if receipt.quantity > line.quantity - already {
            return Err(DomainError::validation(
                "quantity",
                format!(
                    "Quantity exceeds remaining quantity for material {}",
                    receipt.material_id
                ),
            ));
        }

        let new_received = already + receipt.quantity;
        received.insert(line.item_id, new_received);

        planned.push(PlannedReceipt {
            item_id: line.item_id,
            material_id: line.material_id,
            quantity: receipt.quantity,
            received_quantity: new_received,
            status: PurchaseOrderItemStatus::for_received(new_received, line.quantity),
        });
    }

    let fully_received = lines
        .iter()
        .filter(|line| line.status != PurchaseOrderItemStatus::Cancelled)
        .all(|line| received.get(&line.item_id).copied().unwrap_or_default() >= line.quantity);

    let next = if fully_received {
        PurchaseOrderStatus::FullyReceived
    } else {
        PurchaseOrderStatus::PartiallyReceived
    };

    Ok(ReceiptPlan {
        receipts: planned,
        order_status: order_status.transition_to(next)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn line(quantity: &str, received: &str) -> OrderLine {
        OrderLine {
            item_id: Uuid::new_v4(),
            material_id: Uuid::new_v4(),
            quantity: dec(quantity),
            received_quantity: dec(received),
            status: PurchaseOrderItemStatus::Ordered,
        }
    }

    #[test]
    fn transition_table_is_exhaustive() {
        for from in PurchaseOrderStatus::ALL {
            for to in PurchaseOrderStatus::ALL {
                let result = from.transition_to(*to);
                if from.allowed_transitions().contains(to) {
                    assert_eq!(result, Ok(*to));
                } else {
                    assert!(
                        matches!(result, Err(DomainError::InvalidTransition { .. })),
                        "{} -> {} should be rejected",
                        from,
                        to
                    );
                }
            }
        }
    }

    #[test]
    fn terminal_statuses() {
        assert!(PurchaseOrderStatus::Completed.is_terminal());
        assert!(PurchaseOrderStatus::Rejected.is_terminal());
        assert!(PurchaseOrderStatus::Cancelled.is_terminal());
        assert!(!PurchaseOrderStatus::FullyReceived.is_terminal());
    }

    #[test]
    fn full_receipt_of_single_line() {
        let order_line = line("50", "0");
        let plan = plan_receipt(
            PurchaseOrderStatus::Confirmed,
            &[order_line.clone()],
            &[ReceiptLine {
                material_id: order_line.material_id,
                quantity: dec("50"),
            }],
        )
        .unwrap();

        assert_eq!(plan.order_status, PurchaseOrderStatus::FullyReceived);
        assert_eq!(plan.receipts[0].received_quantity, dec("50"));
        assert_eq!(plan.receipts[0].status, PurchaseOrderItemStatus::FullyReceived);
    }

    #[test]
    fn partial_when_other_lines_outstanding() {
        let first = line("10", "0");
        let second = line("5", "0");
        let plan = plan_receipt(
            PurchaseOrderStatus::Sent,
            &[first.clone(), second],
            &[ReceiptLine {
                material_id: first.material_id,
                quantity: dec("10"),
            }],
        )
        .unwrap();

        assert_eq!(plan.order_status, PurchaseOrderStatus::PartiallyReceived);
    }

    #[test]
    fn second_line_failure_rejects_whole_call() {
        let first = line("10", "0");
        let second = line("5", "4");
        let result = plan_receipt(
            PurchaseOrderStatus::Confirmed,
            &[first.clone(), second.clone()],
            &[
                ReceiptLine {
                    material_id: first.material_id,
                    quantity: dec("10"),
                },
                ReceiptLine {
                    material_id: second.material_id,
                    quantity: dec("2"),
                },
            ],
        );

        assert!(matches!(result, Err(DomainError::Validation { .. })));
    }

    #[test]
    fn repeated_material_counts_cumulatively() {
        let order_line = line("10", "0");
        let receipt = ReceiptLine {
            material_id: order_line.material_id,
            quantity: dec("6"),
        };
        let result = plan_receipt(
            PurchaseOrderStatus::Confirmed,
            &[order_line],
            &[receipt.clone(), receipt],
        );
        assert!(result.is_err());
    }

    #[test]
    fn unknown_material_and_wrong_status_fail() {
        let order_line = line("10", "0");
        let stranger = ReceiptLine {
            material_id: Uuid::new_v4(),
            quantity: dec("1"),
        };
        assert!(plan_receipt(PurchaseOrderStatus::Confirmed, &[order_line.clone()], &[stranger]).is_err());

        let ok_line = ReceiptLine {
            material_id: order_line.material_id,
            quantity: dec("1"),
        };
        assert!(plan_receipt(PurchaseOrderStatus::Draft, &[order_line], &[ok_line]).is_err());
    }

    #[test]
    fn item_status_from_received() {
        assert_eq!(
            PurchaseOrderItemStatus::for_received(dec("0"), dec("5")),
            PurchaseOrderItemStatus::Ordered
        );
        assert_eq!(
            PurchaseOrderItemStatus::for_received(dec("2"), dec("5")),
            PurchaseOrderItemStatus::PartiallyReceived
        );
        assert_eq!(
            PurchaseOrderItemStatus::for_received(dec("5"), dec("5")),
            PurchaseOrderItemStatus::FullyReceived
        );
    }
}
