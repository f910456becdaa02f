use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use tracing::{info, warn};

use super::documents::DocumentError;
use super::domain::{
    ApplicationId, ApplicationKey, ApprovalDecision, ApprovalStatus, Company, CompanyId,
    CompanyRegistration, Opportunity, OpportunityDraft, OpportunityId, OpportunityStatus,
    RecommendationDecision, RecommendationStatus, ReviewStatus, Student, StudentId,
    StudentRegistration,
};
use super::identity::{Actor, AdminTier, IdentityError};
use super::repository::{
    ApplicationRecord, ApplicationStatusView, PlacementRepository, RepositoryError,
    SequencedEntity,
};
use super::validation::{
    company_from_registration, sanitize_draft, student_from_registration, ValidationError,
};

/// Entity store and application workflow engine over a pluggable repository.
///
/// Every mutation holds `write_lock` from its first read to its last write, so
/// checks such as the approval gate observe the state they act on.
pub struct PlacementService<R> {
    repository: Arc<R>,
    write_lock: Mutex<()>,
}

impl<R> PlacementService<R>
where
    R: PlacementRepository + 'static,
{
    pub fn new(repository: Arc<R>) -> Self {
        Self {
            repository,
            write_lock: Mutex::new(()),
        }
    }

    pub(crate) fn repository(&self) -> &Arc<R> {
        &self.repository
    }

    fn lock(&self) -> Result<MutexGuard<'_, ()>, PlacementError> {
        self.write_lock
            .lock()
            .map_err(|_| PlacementError::StorageUnavailable("write lock poisoned".to_string()))
    }

    pub fn register_student(
        &self,
        registration: StudentRegistration,
    ) -> Result<Student, PlacementError> {
        let student = student_from_registration(registration, Utc::now())?;
        let _guard = self.lock()?;

        let duplicate = || PlacementError::Duplicate {
            entity: "student",
            key: student.id.to_string(),
        };
        if self.repository.fetch_student(&student.id)?.is_some() {
            return Err(duplicate());
        }
        let stored = self
            .repository
            .insert_student(student.clone())
            .map_err(|err| on_conflict(err, duplicate))?;

        info!(student = %stored.id, "student registered");
        Ok(stored)
    }

    pub fn register_company(
        &self,
        registration: CompanyRegistration,
    ) -> Result<Company, PlacementError> {
        let company = company_from_registration(registration, Utc::now())?;
        let _guard = self.lock()?;

        if self.repository.fetch_company(&company.id)?.is_some() {
            return Err(PlacementError::Duplicate {
                entity: "company",
                key: company.id.to_string(),
            });
        }
        if self
            .repository
            .find_company_by_name(&company.name)?
            .is_some()
        {
            return Err(PlacementError::Duplicate {
                entity: "company name",
                key: company.name.clone(),
            });
        }
        let key = company.id.to_string();
        let stored = self
            .repository
            .insert_company(company)
            .map_err(|err| {
                on_conflict(err, || PlacementError::Duplicate {
                    entity: "company",
                    key,
                })
            })?;

        info!(company = %stored.id, name = %stored.name, "company registered");
        Ok(stored)
    }

    pub fn add_opportunity(
        &self,
        actor: &Actor,
        company_id: &CompanyId,
        draft: OpportunityDraft,
    ) -> Result<Opportunity, PlacementError> {
        require_company(actor, company_id, "post opportunities")?;
        let draft = sanitize_draft(draft)?;
        let _guard = self.lock()?;

        if self.repository.fetch_company(company_id)?.is_none() {
            return Err(PlacementError::not_found("company", company_id));
        }

        let sequence = self.repository.next_sequence(SequencedEntity::Opportunity)?;
        let opportunity = Opportunity {
            id: OpportunityId::from_sequence(sequence),
            company_id: company_id.clone(),
            title: draft.title,
            kind: draft.kind,
            location: draft.location,
            compensation: draft.compensation,
            skills: draft.skills,
            description: draft.description,
            status: OpportunityStatus::Open,
            posted_at: Utc::now(),
            withdrawn_at: None,
        };
        let stored = self.repository.insert_opportunity(opportunity)?;

        info!(
            company = %company_id,
            opportunity = %stored.id,
            kind = stored.kind.label(),
            "opportunity posted"
        );
        Ok(stored)
    }

    pub fn update_opportunity(
        &self,
        actor: &Actor,
        company_id: &CompanyId,
        opportunity_id: &OpportunityId,
        draft: OpportunityDraft,
    ) -> Result<Opportunity, PlacementError> {
        require_company(actor, company_id, "edit opportunities")?;
        let draft = sanitize_draft(draft)?;
        let _guard = self.lock()?;

        let mut opportunity = self.owned_opportunity(actor, company_id, opportunity_id)?;
        if !opportunity.is_open() {
            return Err(ValidationError::OpportunityWithdrawn(opportunity.id).into());
        }

        opportunity.title = draft.title;
        opportunity.kind = draft.kind;
        opportunity.location = draft.location;
        opportunity.compensation = draft.compensation;
        opportunity.skills = draft.skills;
        opportunity.description = draft.description;
        self.repository.update_opportunity(opportunity.clone())?;

        info!(company = %company_id, opportunity = %opportunity.id, "opportunity updated");
        Ok(opportunity)
    }

    /// Withdraws the posting; it stays stored so existing applications keep resolving.
    pub fn remove_opportunity(
        &self,
        actor: &Actor,
        company_id: &CompanyId,
        opportunity_id: &OpportunityId,
    ) -> Result<Opportunity, PlacementError> {
        require_company(actor, company_id, "withdraw opportunities")?;
        let _guard = self.lock()?;

        let mut opportunity = self.owned_opportunity(actor, company_id, opportunity_id)?;
        if !opportunity.is_open() {
            return Ok(opportunity);
        }

        opportunity.status = OpportunityStatus::Withdrawn;
        opportunity.withdrawn_at = Some(Utc::now());
        self.repository.update_opportunity(opportunity.clone())?;

        info!(company = %company_id, opportunity = %opportunity.id, "opportunity withdrawn");
        Ok(opportunity)
    }

    fn owned_opportunity(
        &self,
        actor: &Actor,
        company_id: &CompanyId,
        opportunity_id: &OpportunityId,
    ) -> Result<Opportunity, PlacementError> {
        let opportunity = self
            .repository
            .fetch_opportunity(opportunity_id)?
            .ok_or_else(|| PlacementError::not_found("opportunity", opportunity_id))?;
        if &opportunity.company_id != company_id {
            warn!(
                actor = %actor,
                opportunity = %opportunity_id,
                "company attempted to modify a posting it does not own"
            );
            return Err(PlacementError::unauthorized(actor, "modify this opportunity"));
        }
        Ok(opportunity)
    }

    pub fn apply(
        &self,
        actor: &Actor,
        key: ApplicationKey,
    ) -> Result<ApplicationRecord, PlacementError> {
        match actor {
            Actor::Student(id) if *id == key.student => {}
            _ => {
                warn!(actor = %actor, key = %key, "apply attempted for another student");
                return Err(PlacementError::unauthorized(actor, "apply for this student"));
            }
        }
        let _guard = self.lock()?;

        if self.repository.fetch_student(&key.student)?.is_none() {
            return Err(PlacementError::not_found("student", &key.student));
        }
        if self.repository.fetch_company(&key.company)?.is_none() {
            return Err(PlacementError::not_found("company", &key.company));
        }
        let opportunity = self
            .repository
            .fetch_opportunity(&key.opportunity)?
            .filter(|opportunity| opportunity.company_id == key.company)
            .ok_or_else(|| PlacementError::not_found("opportunity", &key.opportunity))?;
        if !opportunity.is_open() {
            return Err(ValidationError::OpportunityWithdrawn(opportunity.id).into());
        }

        if self.repository.find_application(&key)?.is_some() {
            return Err(PlacementError::DuplicateApplication(key));
        }

        let sequence = self.repository.next_sequence(SequencedEntity::Application)?;
        let record = ApplicationRecord::new(
            ApplicationId::from_sequence(sequence),
            key.clone(),
            Utc::now(),
        );
        let stored = self
            .repository
            .insert_application(record)
            .map_err(|err| on_conflict(err, || PlacementError::DuplicateApplication(key)))?;

        info!(application = %stored.id, key = %stored.key, "application submitted");
        Ok(stored)
    }

    /// Company decision on its own applicant. Re-sending the current status is a no-op.
    pub fn set_review_status(
        &self,
        actor: &Actor,
        application_id: &ApplicationId,
        status: ReviewStatus,
    ) -> Result<ApplicationRecord, PlacementError> {
        if status == ReviewStatus::Applied {
            return Err(ValidationError::InitialStatusOnly.into());
        }
        let _guard = self.lock()?;

        let mut record = self.fetch_record(application_id)?;
        if *actor != Actor::Company(record.key.company.clone()) {
            warn!(actor = %actor, application = %application_id, "review attempted by non-owner");
            return Err(PlacementError::unauthorized(actor, "review this application"));
        }
        if record.status.review == status {
            return Ok(record);
        }

        let now = Utc::now();
        let previous = record.status.review;
        record.status.review = status;
        record.reviewed_at = Some(now);
        record.updated_at = now;
        self.repository.update_application(record.clone())?;

        info!(
            application = %record.id,
            from = previous.label(),
            to = status.label(),
            "review status changed"
        );
        Ok(record)
    }

    /// Tier-1 decision; may be revised at any time without touching approval.
    pub fn set_recommendation(
        &self,
        actor: &Actor,
        application_id: &ApplicationId,
        decision: RecommendationDecision,
    ) -> Result<ApplicationRecord, PlacementError> {
        require_admin(actor, AdminTier::Tier1, "record recommendations")?;
        let _guard = self.lock()?;

        let mut record = self.fetch_record(application_id)?;
        let status = RecommendationStatus::from(decision);
        if record.status.recommendation == status {
            return Ok(record);
        }

        let now = Utc::now();
        record.status.recommendation = status;
        record.recommended_at = Some(now);
        record.updated_at = now;
        self.repository.update_application(record.clone())?;

        info!(
            application = %record.id,
            recommendation = status.label(),
            approval = record.status.approval.label(),
            "recommendation recorded"
        );
        Ok(record)
    }

    /// Tier-2 decision. Only legal while the recommendation currently reads
    /// `recommended`; the check and the write happen under the same lock.
    pub fn set_approval(
        &self,
        actor: &Actor,
        application_id: &ApplicationId,
        decision: ApprovalDecision,
    ) -> Result<ApplicationRecord, PlacementError> {
        require_admin(actor, AdminTier::Tier2, "record approvals")?;
        let _guard = self.lock()?;

        let mut record = self.fetch_record(application_id)?;
        if record.status.recommendation != RecommendationStatus::Recommended {
            warn!(
                application = %record.id,
                recommendation = record.status.recommendation.label(),
                "approval rejected: application is not recommended"
            );
            return Err(PlacementError::GateNotSatisfied {
                application_id: record.id.clone(),
                recommendation: record.status.recommendation,
                current: record.status_view(),
            });
        }

        let status = ApprovalStatus::from(decision);
        if record.status.approval == status {
            return Ok(record);
        }

        let now = Utc::now();
        record.status.approval = status;
        record.approved_at = Some(now);
        record.updated_at = now;
        self.repository.update_application(record.clone())?;

        info!(application = %record.id, approval = status.label(), "approval recorded");
        Ok(record)
    }

    pub(crate) fn fetch_record(
        &self,
        application_id: &ApplicationId,
    ) -> Result<ApplicationRecord, PlacementError> {
        self.repository
            .fetch_application(application_id)?
            .ok_or_else(|| PlacementError::not_found("application", application_id))
    }

    pub fn student(&self, id: &StudentId) -> Result<Student, PlacementError> {
        self.repository
            .fetch_student(id)?
            .ok_or_else(|| PlacementError::not_found("student", id))
    }

    pub fn company(&self, id: &CompanyId) -> Result<Company, PlacementError> {
        self.repository
            .fetch_company(id)?
            .ok_or_else(|| PlacementError::not_found("company", id))
    }

    pub fn opportunity(&self, id: &OpportunityId) -> Result<Opportunity, PlacementError> {
        self.repository
            .fetch_opportunity(id)?
            .ok_or_else(|| PlacementError::not_found("opportunity", id))
    }

    /// All postings of one company, withdrawn ones included, in creation order.
    pub fn company_opportunities(
        &self,
        company_id: &CompanyId,
    ) -> Result<Vec<Opportunity>, PlacementError> {
        self.company(company_id)?;
        Ok(self.repository.opportunities(Some(company_id))?)
    }
}

fn require_company(
    actor: &Actor,
    company_id: &CompanyId,
    action: &'static str,
) -> Result<(), PlacementError> {
    match actor {
        Actor::Company(id) if id == company_id => Ok(()),
        _ => {
            warn!(actor = %actor, company = %company_id, action, "company action refused");
            Err(PlacementError::unauthorized(actor, action))
        }
    }
}

fn require_admin(
    actor: &Actor,
    tier: AdminTier,
    action: &'static str,
) -> Result<(), PlacementError> {
    if *actor == Actor::Admin(tier) {
        return Ok(());
    }
    warn!(actor = %actor, required = tier.label(), action, "admin action refused");
    Err(PlacementError::unauthorized(actor, action))
}

fn on_conflict(err: RepositoryError, duplicate: impl FnOnce() -> PlacementError) -> PlacementError {
    match err {
        RepositoryError::Conflict => duplicate(),
        other => other.into(),
    }
}

/// Failures surfaced by the entity store, workflow engine and query layer.
#[derive(Debug, thiserror::Error)]
pub enum PlacementError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{entity} '{key}' is already registered")]
    Duplicate { entity: &'static str, key: String },
    #[error("an application already exists for {0}")]
    DuplicateApplication(ApplicationKey),
    #[error(
        "application {application_id} cannot be approved while its recommendation is {}",
        .recommendation.label()
    )]
    GateNotSatisfied {
        application_id: ApplicationId,
        recommendation: RecommendationStatus,
        current: ApplicationStatusView,
    },
    #[error("{entity} '{key}' was not found")]
    NotFound { entity: &'static str, key: String },
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),
    #[error("{actor} may not {action}")]
    Unauthorized { actor: Actor, action: &'static str },
    #[error(transparent)]
    Identity(#[from] IdentityError),
    #[error(transparent)]
    Document(#[from] DocumentError),
}

impl PlacementError {
    pub(crate) fn not_found(entity: &'static str, key: impl ToString) -> Self {
        PlacementError::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    pub(crate) fn unauthorized(actor: &Actor, action: &'static str) -> Self {
        PlacementError::Unauthorized {
            actor: actor.clone(),
            action,
        }
    }
}

/// Conflicts and misses that survive the service's own checks mean the store
/// disagrees with itself, so every repository failure reaching here is a
/// storage failure unless a call site maps it first.
impl From<RepositoryError> for PlacementError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::Unavailable(reason) => PlacementError::StorageUnavailable(reason),
            other => PlacementError::StorageUnavailable(other.to_string()),
        }
    }
}
