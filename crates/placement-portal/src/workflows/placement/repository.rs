use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{
    ApplicationId, ApplicationKey, ApplicationStatus, ApprovalStatus, Company, CompanyId,
    Opportunity, OpportunityId, RecommendationStatus, ReviewStatus, Student, StudentId,
};
use super::projection::{project, StatusLabel};

/// Repository record for one (student, company, opportunity) application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationRecord {
    pub id: ApplicationId,
    pub key: ApplicationKey,
    pub status: ApplicationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub recommended_at: Option<DateTime<Utc>>,
    pub approved_at: Option<DateTime<Utc>>,
}

impl ApplicationRecord {
    pub fn new(id: ApplicationId, key: ApplicationKey, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            key,
            status: ApplicationStatus::initial(),
            created_at,
            updated_at: created_at,
            reviewed_at: None,
            recommended_at: None,
            approved_at: None,
        }
    }

    pub fn label(&self) -> StatusLabel {
        project(self.status)
    }

    pub fn status_view(&self) -> ApplicationStatusView {
        ApplicationStatusView {
            application_id: self.id.clone(),
            review: self.status.review.label(),
            recommendation: self.status.recommendation.label(),
            approval: self.status.approval.label(),
            label: self.label().label(),
            updated_at: self.updated_at,
        }
    }
}

/// Sanitized representation of an application's exposed status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplicationStatusView {
    pub application_id: ApplicationId,
    pub review: &'static str,
    pub recommendation: &'static str,
    pub approval: &'static str,
    pub label: &'static str,
    pub updated_at: DateTime<Utc>,
}

/// Conjunction of optional constraints applied to stored applications.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplicationScope {
    pub student: Option<StudentId>,
    pub company: Option<CompanyId>,
    pub opportunity: Option<OpportunityId>,
    pub review: Option<ReviewStatus>,
    pub recommendation: Option<RecommendationStatus>,
    pub approval: Option<ApprovalStatus>,
}

impl ApplicationScope {
    pub fn matches(&self, record: &ApplicationRecord) -> bool {
        fn allows<T: PartialEq>(wanted: &Option<T>, actual: &T) -> bool {
            wanted.as_ref().map_or(true, |wanted| wanted == actual)
        }

        allows(&self.student, &record.key.student)
            && allows(&self.company, &record.key.company)
            && allows(&self.opportunity, &record.key.opportunity)
            && allows(&self.review, &record.status.review)
            && allows(&self.recommendation, &record.status.recommendation)
            && allows(&self.approval, &record.status.approval)
    }
}

/// Entities whose identifiers are allocated from a store-wide sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencedEntity {
    Opportunity,
    Application,
}

/// Storage abstraction behind the entity store and workflow engine.
///
/// Implementations never delete. Callers serialise writes, so `next_sequence`
/// only has to return one more than the number of stored entities.
pub trait PlacementRepository: Send + Sync {
    fn insert_student(&self, student: Student) -> Result<Student, RepositoryError>;
    fn fetch_student(&self, id: &StudentId) -> Result<Option<Student>, RepositoryError>;

    fn insert_company(&self, company: Company) -> Result<Company, RepositoryError>;
    fn fetch_company(&self, id: &CompanyId) -> Result<Option<Company>, RepositoryError>;
    /// Case-insensitive lookup by display name.
    fn find_company_by_name(&self, name: &str) -> Result<Option<Company>, RepositoryError>;

    fn insert_opportunity(&self, opportunity: Opportunity)
        -> Result<Opportunity, RepositoryError>;
    fn update_opportunity(&self, opportunity: Opportunity) -> Result<(), RepositoryError>;
    fn fetch_opportunity(&self, id: &OpportunityId)
        -> Result<Option<Opportunity>, RepositoryError>;
    /// Postings in creation order, optionally restricted to one company.
    fn opportunities(&self, company: Option<&CompanyId>)
        -> Result<Vec<Opportunity>, RepositoryError>;

    fn insert_application(
        &self,
        record: ApplicationRecord,
    ) -> Result<ApplicationRecord, RepositoryError>;
    fn update_application(&self, record: ApplicationRecord) -> Result<(), RepositoryError>;
    fn fetch_application(
        &self,
        id: &ApplicationId,
    ) -> Result<Option<ApplicationRecord>, RepositoryError>;
    /// Indexed lookup on the (student, company, opportunity) triple.
    fn find_application(
        &self,
        key: &ApplicationKey,
    ) -> Result<Option<ApplicationRecord>, RepositoryError>;
    /// Applications matching `scope`, in creation order.
    fn applications(
        &self,
        scope: &ApplicationScope,
    ) -> Result<Vec<ApplicationRecord>, RepositoryError>;

    fn next_sequence(&self, entity: SequencedEntity) -> Result<u64, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> ApplicationRecord {
        ApplicationRecord::new(
            ApplicationId::from_sequence(1),
            ApplicationKey {
                student: StudentId("a@x.com".to_string()),
                company: CompanyId("hr@acme.io".to_string()),
                opportunity: OpportunityId::from_sequence(1),
            },
            Utc::now(),
        )
    }

    #[test]
    fn new_record_starts_applied_and_pending() {
        let record = record();
        assert_eq!(record.status, ApplicationStatus::initial());
        assert_eq!(record.created_at, record.updated_at);
        assert!(record.reviewed_at.is_none());
        assert_eq!(record.label(), StatusLabel::UnderReview);
    }

    #[test]
    fn empty_scope_matches_everything() {
        assert!(ApplicationScope::default().matches(&record()));
    }

    #[test]
    fn scope_constraints_are_conjunctive() {
        let record = record();
        let scope = ApplicationScope {
            company: Some(CompanyId("hr@acme.io".to_string())),
            recommendation: Some(RecommendationStatus::Pending),
            ..ApplicationScope::default()
        };
        assert!(scope.matches(&record));

        let scope = ApplicationScope {
            recommendation: Some(RecommendationStatus::Recommended),
            ..scope
        };
        assert!(!scope.matches(&record));
    }

    #[test]
    fn status_view_exposes_axis_labels() {
        let view = record().status_view();
        assert_eq!(view.review, "applied");
        assert_eq!(view.recommendation, "pending");
        assert_eq!(view.approval, "pending");
        assert_eq!(view.label, "Under Review");
    }
}
