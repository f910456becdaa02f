//! Human-facing labels derived from the three status axes.

use serde::Serialize;

use super::domain::{ApplicationStatus, ApprovalStatus, RecommendationStatus, ReviewStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusLabel {
    UnderReview,
    Shortlisted,
    Selected,
    Rejected,
    RecommendedPendingApproval,
    NotRecommended,
    Approved,
    NotApproved,
}

impl StatusLabel {
    pub const fn label(self) -> &'static str {
        match self {
            StatusLabel::UnderReview => "Under Review",
            StatusLabel::Shortlisted => "Shortlisted",
            StatusLabel::Selected => "Selected",
            StatusLabel::Rejected => "Rejected",
            StatusLabel::RecommendedPendingApproval => "Recommended — Pending Approval",
            StatusLabel::NotRecommended => "Not Recommended",
            StatusLabel::Approved => "Approved",
            StatusLabel::NotApproved => "Not Approved",
        }
    }

    /// No further action is expected from anyone.
    pub const fn is_final(self) -> bool {
        matches!(
            self,
            StatusLabel::Rejected
                | StatusLabel::Approved
                | StatusLabel::NotApproved
                | StatusLabel::NotRecommended
        )
    }
}

/// Company rejection outranks every institutional outcome; the institutional
/// pipeline outranks the remaining company review states.
pub fn project(status: ApplicationStatus) -> StatusLabel {
    let ApplicationStatus {
        review,
        recommendation,
        approval,
    } = status;

    if review == ReviewStatus::Rejected {
        return StatusLabel::Rejected;
    }

    match (approval, recommendation) {
        (ApprovalStatus::Approved, _) => StatusLabel::Approved,
        (ApprovalStatus::NotApproved, _) => StatusLabel::NotApproved,
        (ApprovalStatus::Pending, RecommendationStatus::NotRecommended) => {
            StatusLabel::NotRecommended
        }
        (ApprovalStatus::Pending, RecommendationStatus::Recommended) => {
            StatusLabel::RecommendedPendingApproval
        }
        (ApprovalStatus::Pending, RecommendationStatus::Pending) => match review {
            ReviewStatus::Selected => StatusLabel::Selected,
            ReviewStatus::Shortlisted => StatusLabel::Shortlisted,
            _ => StatusLabel::UnderReview,
        },
    }
}
