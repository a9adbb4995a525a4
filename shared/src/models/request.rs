//! Internal material request lifecycle and fulfillment rules

use std::collections::HashMap;

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::{DomainError, DomainResult};
use crate::validation::{ensure_storable, MAX_QUANTITY};

string_enum! {
    /// Material request status
    pub enum RequestStatus {
        Draft => "draft",
        PendingApproval => "pending_approval",
        Approved => "approved",
        InProgress => "in_progress",
        Completed => "completed",
        Rejected => "rejected",
        Cancelled => "cancelled",
    }
}

impl RequestStatus {
    pub fn allowed_transitions(&self) -> &'static [RequestStatus] {
        use RequestStatus::*;
        match self {
            Draft => &[PendingApproval, Cancelled],
            PendingApproval => &[Approved, Rejected, Cancelled],
            Approved => &[InProgress, Completed, Cancelled],
            InProgress => &[InProgress, Completed, Cancelled],
            Completed | Rejected | Cancelled => &[],
        }
    }

    pub fn can_transition_to(&self, next: RequestStatus) -> bool {
        self.allowed_transitions().contains(&next)
    }

    pub fn transition_to(self, next: RequestStatus) -> DomainResult<RequestStatus> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(DomainError::InvalidTransition {
                entity: "request",
                from: self.to_string(),
                to: next.to_string(),
            })
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.allowed_transitions().is_empty()
    }

    /// Stock may be issued against approved requests, including ones
    /// already partially served
    pub fn accepts_fulfillment(&self) -> bool {
        matches!(self, RequestStatus::Approved | RequestStatus::InProgress)
    }
}

string_enum! {
    /// Status of a single request line
    pub enum RequestItemStatus {
        Pending => "pending",
        PartiallyFulfilled => "partially_fulfilled",
        Fulfilled => "fulfilled",
        Cancelled => "cancelled",
    }
}

impl RequestItemStatus {
    /// Lines still waiting for stock; these are cancelled with their request
    pub fn is_open(&self) -> bool {
        matches!(
            self,
            RequestItemStatus::Pending | RequestItemStatus::PartiallyFulfilled
        )
    }
}

/// Current state of a request line as read inside the fulfillment transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLine {
    pub item_id: Uuid,
    pub material_id: Uuid,
    pub quantity: Decimal,
    pub quantity_fulfilled: Decimal,
    pub is_fulfilled: bool,
}

impl RequestLine {
    pub fn remaining(&self) -> Decimal {
        self.quantity - self.quantity_fulfilled
    }
}

/// Stock to issue for one request line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedIssue {
    pub item_id: Uuid,
    pub material_id: Uuid,
    pub quantity: Decimal,
}

/// Decide every issue a full fulfillment will perform.
///
/// `available` reports the ledger balance per material (None when the
/// material has no ledger position). Balances are consumed as lines are
/// planned so two lines for one material cannot both claim the same
/// stock. The first shortage aborts the whole plan.
pub fn plan_fulfillment<F>(
    status: RequestStatus,
    lines: &[RequestLine],
    available: F,
) -> DomainResult<Vec<PlannedIssue>>
where
    F: Fn(Uuid) -> Option<Decimal>,
{
    if !status.accepts_fulfillment() {
        return Err(DomainError::validation(
            "status",
            format!("Request is not approved (current status: {})", status),
        ));
    }

    let mut consumed: HashMap<Uuid, Decimal> = HashMap::new();
    let mut issues = Vec::new();

    for line in lines.iter().filter(|line| !line.is_fulfilled) {
        let remaining = line.remaining();
        if remaining <= Decimal::ZERO {
            continue;
        }

        let on_hand = available(line.material_id).ok_or_else(|| {
            DomainError::validation(
                "material_id",
                format!("No inventory found for material {}", line.material_id),
            )
        })?;
        let used = consumed.entry(line.material_id).or_default();
        let free = on_hand - *used;

        if free < remaining {
            return Err(DomainError::InsufficientQuantity {
                material_id: line.material_id,
                available: free,
                requested: remaining,
            });
        }

        *used += remaining;
        issues.push(PlannedIssue {
            item_id: line.item_id,
            material_id: line.material_id,
            quantity: remaining,
        });
    }

    Ok(issues)
}

/// Effect of issuing part of one request line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialFulfillment {
    pub quantity_fulfilled: Decimal,
    pub is_fulfilled: bool,
    pub item_status: RequestItemStatus,
}

/// Validate issuing `quantity` against one line with `on_hand` stock
pub fn plan_partial_fulfillment(
    status: RequestStatus,
    line: &RequestLine,
    quantity: Decimal,
    on_hand: Decimal,
) -> DomainResult<PartialFulfillment> {
    if !status.accepts_fulfillment() {
        return Err(DomainError::validation(
            "status",
            format!("Request is not approved (current status: {})", status),
        ));
    }

    if line.is_fulfilled {
        return Err(DomainError::validation("item", "Item is already fulfilled"));
    }

    if quantity <= Decimal::ZERO {
        return Err(DomainError::validation("quantity", "Quantity must be positive"));
    }
    ensure_storable("quantity", quantity, MAX_QUANTITY)?;

    if quantity > line.remaining() {
        return Err(DomainError::validation(
            "quantity",
            "Quantity exceeds remaining quantity",
        ));
    }

    if on_hand < quantity {
        return Err(DomainError::InsufficientQuantity {
            material_id: line.material_id,
            available: on_hand,
            requested: quantity,
        });
    }

    let quantity_fulfilled = line.quantity_fulfilled + quantity;
    let is_fulfilled = quantity_fulfilled >= line.quantity;

    Ok(PartialFulfillment {
        quantity_fulfilled,
        is_fulfilled,
        item_status: if is_fulfilled {
            RequestItemStatus::Fulfilled
        } else {
            RequestItemStatus::PartiallyFulfilled
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn line(material_id: Uuid, quantity: &str) -> RequestLine {
        RequestLine {
            item_id: Uuid::new_v4(),
            material_id,
            quantity: dec(quantity),
            quantity_fulfilled: Decimal::ZERO,
            is_fulfilled: false,
        }
    }

    #[test]
    fn shortage_on_one_line_fails_everything() {
        let plenty = Uuid::new_v4();
        let scarce = Uuid::new_v4();
        let lines = [line(plenty, "5"), line(scarce, "10")];

        let result = plan_fulfillment(RequestStatus::Approved, &lines, |m| {
            if m == plenty {
                Some(dec("100"))
            } else {
                Some(dec("3"))
            }
        });

        assert!(matches!(result, Err(DomainError::InsufficientQuantity { .. })));
    }

    #[test]
    fn fulfilled_lines_are_skipped() {
        let material = Uuid::new_v4();
        let mut done = line(material, "5");
        done.is_fulfilled = true;
        done.quantity_fulfilled = dec("5");
        let open = line(material, "2");

        let plan = plan_fulfillment(RequestStatus::Approved, &[done, open.clone()], |_| Some(dec("2"))).unwrap();
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].item_id, open.item_id);
    }

    #[test]
    fn same_material_lines_share_stock() {
        let material = Uuid::new_v4();
        let lines = [line(material, "6"), line(material, "6")];
        let result = plan_fulfillment(RequestStatus::Approved, &lines, |_| Some(dec("10")));
        assert!(result.is_err());
    }

    #[test]
    fn requires_approval() {
        let material = Uuid::new_v4();
        let result = plan_fulfillment(RequestStatus::PendingApproval, &[line(material, "1")], |_| Some(dec("10")));
        assert!(matches!(result, Err(DomainError::Validation { .. })));
    }

    #[test]
    fn missing_inventory_is_reported() {
        let result = plan_fulfillment(RequestStatus::Approved, &[line(Uuid::new_v4(), "1")], |_| None);
        assert!(result.is_err());
    }

    #[test]
    fn partial_then_complete() {
        let mut request_line = line(Uuid::new_v4(), "10");

        let first = plan_partial_fulfillment(RequestStatus::Approved, &request_line, dec("4"), dec("50")).unwrap();
        assert_eq!(first.item_status, RequestItemStatus::PartiallyFulfilled);
        assert!(!first.is_fulfilled);

        request_line.quantity_fulfilled = first.quantity_fulfilled;
        let second = plan_partial_fulfillment(RequestStatus::InProgress, &request_line, dec("6"), dec("46")).unwrap();
        assert_eq!(second.item_status, RequestItemStatus::Fulfilled);
        assert!(second.is_fulfilled);
    }

    #[test]
    fn partial_checks_stock_and_remaining() {
        let request_line = line(Uuid::new_v4(), "10");
        assert!(matches!(
            plan_partial_fulfillment(RequestStatus::Approved, &request_line, dec("5"), dec("4")),
            Err(DomainError::InsufficientQuantity { .. })
        ));
        assert!(plan_partial_fulfillment(RequestStatus::Approved, &request_line, dec("11"), dec("40")).is_err());
        assert!(plan_partial_fulfillment(RequestStatus::Approved, &request_line, dec("0"), dec("40")).is_err());
    }

    #[test]
    fn request_transition_table() {
        for from in RequestStatus::ALL {
            for to in RequestStatus::ALL {
                assert_eq!(
                    from.transition_to(*to).is_ok(),
                    from.allowed_transitions().contains(to)
                );
            }
        }
        assert!(RequestStatus::Completed.is_terminal());
        assert!(RequestStatus::Approved.can_transition_to(RequestStatus::Completed));
        assert!(!RequestStatus::Draft.can_transition_to(RequestStatus::Approved));
    }
}
