//! Quality check lifecycle

use crate::error::{DomainError, DomainResult};

string_enum! {
    /// Quality check status
    pub enum QualityCheckStatus {
        Draft => "draft",
        Submitted => "submitted",
        Approved => "approved",
        Rejected => "rejected",
        Completed => "completed",
        Cancelled => "cancelled",
    }
}

impl QualityCheckStatus {
    pub fn allowed_transitions(&self) -> &'static [QualityCheckStatus] {
        use QualityCheckStatus::*;
        match self {
            Draft => &[Submitted, Cancelled],
            Submitted => &[Approved, Rejected, Cancelled],
            Approved => &[Completed, Cancelled],
            Rejected | Completed | Cancelled => &[],
        }
    }

    pub fn transition_to(self, next: QualityCheckStatus) -> DomainResult<QualityCheckStatus> {
        if self.allowed_transitions().contains(&next) {
            Ok(next)
        } else {
            Err(DomainError::InvalidTransition {
                entity: "quality check",
                from: self.to_string(),
                to: next.to_string(),
            })
        }
    }

    /// Item results can only be recorded before submission
    pub fn accepts_results(&self) -> bool {
        matches!(self, QualityCheckStatus::Draft)
    }
}

/// Approval requires at least one item and every item passed
pub fn ensure_all_passed(results: &[bool]) -> DomainResult<()> {
    if results.is_empty() {
        return Err(DomainError::validation(
            "items",
            "a quality check needs at least one item before approval",
        ));
    }

    let failed = results.iter().filter(|passed| !**passed).count();
    if failed > 0 {
        return Err(DomainError::validation(
            "items",
            format!("{} check item(s) did not pass", failed),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn approval_path() {
        let status = QualityCheckStatus::Draft
            .transition_to(QualityCheckStatus::Submitted)
            .and_then(|s| s.transition_to(QualityCheckStatus::Approved))
            .and_then(|s| s.transition_to(QualityCheckStatus::Completed))
            .unwrap();
        assert_eq!(status, QualityCheckStatus::Completed);
    }

    #[test]
    fn cannot_approve_draft_or_reopen_terminal() {
        assert!(QualityCheckStatus::Draft.transition_to(QualityCheckStatus::Approved).is_err());
        assert!(QualityCheckStatus::Completed.transition_to(QualityCheckStatus::Cancelled).is_err());
        assert!(QualityCheckStatus::Rejected.transition_to(QualityCheckStatus::Submitted).is_err());
    }

    #[test]
    fn approval_needs_passing_items() {
        assert!(ensure_all_passed(&[]).is_err());
        assert!(ensure_all_passed(&[true, false]).is_err());
        assert!(ensure_all_passed(&[true, true]).is_ok());
    }
}
