//! Expenses, project income and material cost entries

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{DomainError, DomainResult};
use crate::validation::QUANTITY_SCALE;

string_enum! {
    /// Approval state shared by expenses, incomes and accounting entries
    pub enum ApprovalStatus {
        Pending => "pending",
        Approved => "approved",
        Rejected => "rejected",
    }
}

impl ApprovalStatus {
    pub fn allowed_transitions(&self) -> &'static [ApprovalStatus] {
        match self {
            ApprovalStatus::Pending => &[ApprovalStatus::Approved, ApprovalStatus::Rejected],
            ApprovalStatus::Approved | ApprovalStatus::Rejected => &[],
        }
    }

    pub fn transition_to(
        self,
        next: ApprovalStatus,
        entity: &'static str,
    ) -> DomainResult<ApprovalStatus> {
        if self.allowed_transitions().contains(&next) {
            Ok(next)
        } else {
            Err(DomainError::InvalidTransition {
                entity,
                from: self.to_string(),
                to: next.to_string(),
            })
        }
    }
}

string_enum! {
    /// How a general expense is charged to projects
    pub enum AllocationType {
        /// Charged in full to one project
        ProjectSpecific => "project_specific",
        /// Spread over projects in proportion to the material issued to them
        WeightBased => "weight_based",
    }
}

impl AllocationType {
    /// Project-specific expenses name their project; weight-based ones must not
    pub fn check_project(&self, project_id: Option<Uuid>) -> DomainResult<()> {
        match (self, project_id) {
            (AllocationType::ProjectSpecific, None) => Err(DomainError::validation(
                "project_id",
                "a project-specific expense requires a project",
            )),
            (AllocationType::WeightBased, Some(_)) => Err(DomainError::validation(
                "project_id",
                "a weight-based expense is spread over all projects and cannot name one",
            )),
            _ => Ok(()),
        }
    }
}

/// Split `amount` over projects in proportion to `weights`.
///
/// Shares are truncated to cents; the leftover cents go to the
/// heaviest project so the shares always add up to `amount`. Projects
/// with a zero weight get nothing, and with no positive weight at all
/// nothing is allocated.
pub fn allocate_by_weight(amount: Decimal, weights: &[(Uuid, Decimal)]) -> Vec<(Uuid, Decimal)> {
    let positive: Vec<(Uuid, Decimal)> = weights
        .iter()
        .copied()
        .filter(|(_, w)| *w > Decimal::ZERO)
        .collect();
    let total: Decimal = positive.iter().map(|(_, w)| *w).sum();
    if total.is_zero() {
        return Vec::new();
    }

    let mut shares: Vec<(Uuid, Decimal)> = positive
        .iter()
        .map(|(id, w)| {
            let share = (amount * *w / total)
                .round_dp_with_strategy(QUANTITY_SCALE, RoundingStrategy::ToZero);
            (*id, share)
        })
        .collect();

    let allocated: Decimal = shares.iter().map(|(_, s)| *s).sum();
    let remainder = amount - allocated;
    if !remainder.is_zero() {
        let heaviest = positive
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.1.cmp(&b.1))
            .map(|(i, _)| i);
        if let Some(i) = heaviest {
            shares[i].1 += remainder;
        }
    }

    shares
}

/// Money in and out of one project
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectBalance {
    pub project_id: Uuid,
    pub income: Decimal,
    pub direct_expenses: Decimal,
    pub allocated_expenses: Decimal,
    pub material_cost: Decimal,
    pub net: Decimal,
}

impl ProjectBalance {
    pub fn new(
        project_id: Uuid,
        income: Decimal,
        direct_expenses: Decimal,
        allocated_expenses: Decimal,
        material_cost: Decimal,
    ) -> Self {
        Self {
            project_id,
            income,
            direct_expenses,
            allocated_expenses,
            material_cost,
            net: income - direct_expenses - allocated_expenses - material_cost,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn decisions_are_final() {
        assert_eq!(
            ApprovalStatus::Pending.transition_to(ApprovalStatus::Approved, "expense").unwrap(),
            ApprovalStatus::Approved
        );
        assert!(ApprovalStatus::Approved
            .transition_to(ApprovalStatus::Rejected, "expense")
            .is_err());
        assert!(ApprovalStatus::Rejected
            .transition_to(ApprovalStatus::Approved, "expense")
            .is_err());
        assert!(ApprovalStatus::Pending
            .transition_to(ApprovalStatus::Pending, "expense")
            .is_err());
    }

    #[test]
    fn allocation_needs_matching_project() {
        let project = Some(Uuid::new_v4());
        assert!(AllocationType::ProjectSpecific.check_project(project).is_ok());
        assert!(AllocationType::ProjectSpecific.check_project(None).is_err());
        assert!(AllocationType::WeightBased.check_project(None).is_ok());
        assert!(AllocationType::WeightBased.check_project(project).is_err());
    }

    #[test]
    fn remainder_goes_to_heaviest_project() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();
        let shares = allocate_by_weight(dec("100"), &[(a, dec("1")), (b, dec("1")), (c, dec("2"))]);

        assert_eq!(shares.len(), 3);
        assert_eq!(shares[0], (a, dec("25")));
        assert_eq!(shares[2], (c, dec("50")));

        let shares = allocate_by_weight(dec("10"), &[(a, dec("1")), (b, dec("1")), (c, dec("1.5"))]);
        let total: Decimal = shares.iter().map(|(_, s)| *s).sum();
        assert_eq!(total, dec("10"));

        let tiny = allocate_by_weight(dec("0.04"), &[(a, dec("1")); 7]);
        assert!(tiny.iter().all(|(_, s)| *s >= Decimal::ZERO));
        assert_eq!(tiny.iter().map(|(_, s)| *s).sum::<Decimal>(), dec("0.04"));
    }

    #[test]
    fn no_weights_no_allocation() {
        assert!(allocate_by_weight(dec("10"), &[]).is_empty());
        assert!(allocate_by_weight(dec("10"), &[(Uuid::new_v4(), Decimal::ZERO)]).is_empty());
    }

    #[test]
    fn balance_nets_out() {
        let balance = ProjectBalance::new(Uuid::nil(), dec("1000"), dec("200"), dec("50.25"), dec("300"));
        assert_eq!(balance.net, dec("449.75"));
    }

    proptest! {
        #[test]
        fn shares_add_up(
            cents in 1i64..100_000_000,
            weights in prop::collection::vec(1i64..10_000, 1..12)
        ) {
            let amount = Decimal::new(cents, 2);
            let weights: Vec<(Uuid, Decimal)> = weights
                .into_iter()
                .map(|w| (Uuid::new_v4(), Decimal::new(w, 1)))
                .collect();

            let shares = allocate_by_weight(amount, &weights);
            let total: Decimal = shares.iter().map(|(_, s)| *s).sum();
            prop_assert_eq!(total, amount);
            for (_, share) in &shares {
                prop_assert!(*share >= Decimal::ZERO);
                prop_assert!(share.normalize().scale() <= QUANTITY_SCALE);
            }
        }
    }
}
