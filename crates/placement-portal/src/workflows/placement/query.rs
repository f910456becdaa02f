//! Read side: role-scoped listings joined with display fields.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::domain::{
    ApplicationId, ApplicationKey, ApplicationStatus, ApprovalStatus, CompanyId, Opportunity,
    OpportunityId, OpportunityKind, RecommendationStatus, ReviewStatus, StudentId,
};
use super::identity::{Actor, AdminTier};
use super::repository::{ApplicationRecord, ApplicationScope, PlacementRepository};
use super::service::{PlacementError, PlacementService};

/// Optional narrowing applied on top of an actor's visible applications.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ApplicationFilter {
    pub review: Option<ReviewStatus>,
    pub recommendation: Option<RecommendationStatus>,
    pub approval: Option<ApprovalStatus>,
    /// Matched case-insensitively, like every e-mail keyed id.
    pub company: Option<CompanyId>,
    pub opportunity: Option<OpportunityId>,
}

/// An application joined with the names a person would recognise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplicationView {
    pub application_id: ApplicationId,
    pub student_id: StudentId,
    pub student_name: String,
    pub company_id: CompanyId,
    pub company_name: String,
    pub opportunity_id: OpportunityId,
    pub opportunity_title: String,
    pub opportunity_kind: OpportunityKind,
    pub status: ApplicationStatus,
    pub label: &'static str,
    pub is_final: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Open posting together with its company's display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OpportunityListing {
    #[serde(flatten)]
    pub opportunity: Opportunity,
    pub company_name: String,
}

/// Snapshot of matching application records.
///
/// Display fields are resolved as the iterator advances; `iter` may be called
/// any number of times and always walks the same snapshot.
pub struct ApplicationListing<R> {
    repository: Arc<R>,
    records: Vec<ApplicationRecord>,
}

impl<R: PlacementRepository> ApplicationListing<R> {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[ApplicationRecord] {
        &self.records
    }

    pub fn iter(&self) -> impl Iterator<Item = Result<ApplicationView, PlacementError>> + '_ {
        self.records
            .iter()
            .map(|record| join(self.repository.as_ref(), record))
    }

    /// Resolve every entry, stopping at the first join failure.
    pub fn collect_views(&self) -> Result<Vec<ApplicationView>, PlacementError> {
        self.iter().collect()
    }
}

fn join<R: PlacementRepository>(
    repository: &R,
    record: &ApplicationRecord,
) -> Result<ApplicationView, PlacementError> {
    let ApplicationKey {
        student,
        company,
        opportunity,
    } = &record.key;
    let student_record = repository
        .fetch_student(student)?
        .ok_or_else(|| PlacementError::not_found("student", student))?;
    let company_record = repository
        .fetch_company(company)?
        .ok_or_else(|| PlacementError::not_found("company", company))?;
    let opportunity_record = repository
        .fetch_opportunity(opportunity)?
        .ok_or_else(|| PlacementError::not_found("opportunity", opportunity))?;

    let label = record.label();
    Ok(ApplicationView {
        application_id: record.id.clone(),
        student_id: student_record.id,
        student_name: student_record.name,
        company_id: company_record.id,
        company_name: company_record.name,
        opportunity_id: opportunity_record.id,
        opportunity_title: opportunity_record.title,
        opportunity_kind: opportunity_record.kind,
        status: record.status,
        label: label.label(),
        is_final: label.is_final(),
        created_at: record.created_at,
        updated_at: record.updated_at,
    })
}

/// Fixes `slot` to `requested`; false when the two contradict.
fn narrow<T: PartialEq>(slot: &mut Option<T>, requested: Option<T>) -> bool {
    match requested {
        None => true,
        Some(requested) => match slot {
            Some(fixed) => *fixed == requested,
            None => {
                *slot = Some(requested);
                true
            }
        },
    }
}

/// Base visibility per actor before any caller filter applies.
fn visible_scope(actor: &Actor) -> ApplicationScope {
    match actor {
        Actor::Student(id) => ApplicationScope {
            student: Some(id.clone()),
            ..ApplicationScope::default()
        },
        Actor::Company(id) => ApplicationScope {
            company: Some(id.clone()),
            ..ApplicationScope::default()
        },
        Actor::Admin(AdminTier::Tier1) => ApplicationScope::default(),
        Actor::Admin(AdminTier::Tier2) => ApplicationScope {
            recommendation: Some(RecommendationStatus::Recommended),
            ..ApplicationScope::default()
        },
    }
}

impl<R> PlacementService<R>
where
    R: PlacementRepository + 'static,
{
    fn listing(&self, records: Vec<ApplicationRecord>) -> ApplicationListing<R> {
        ApplicationListing {
            repository: Arc::clone(self.repository()),
            records,
        }
    }

    /// Applications the actor may see, narrowed by `filter`.
    pub fn list_applications_for(
        &self,
        actor: &Actor,
        filter: &ApplicationFilter,
    ) -> Result<ApplicationListing<R>, PlacementError> {
        let mut scope = visible_scope(actor);
        let consistent = narrow(&mut scope.review, filter.review)
            & narrow(&mut scope.recommendation, filter.recommendation)
            & narrow(&mut scope.approval, filter.approval)
            & narrow(
                &mut scope.company,
                filter.company.as_ref().map(|id| CompanyId::from_email(&id.0)),
            )
            & narrow(&mut scope.opportunity, filter.opportunity.clone());

        let records = if consistent {
            self.repository().applications(&scope)?
        } else {
            Vec::new()
        };
        debug!(actor = %actor, matched = records.len(), "listed applications");
        Ok(self.listing(records))
    }

    /// What is waiting on this actor's decision, or for a student, what is
    /// still in flight.
    pub fn pending_items(&self, actor: &Actor) -> Result<ApplicationListing<R>, PlacementError> {
        let scope = match actor {
            Actor::Student(id) => ApplicationScope {
                student: Some(id.clone()),
                ..ApplicationScope::default()
            },
            Actor::Company(id) => ApplicationScope {
                company: Some(id.clone()),
                review: Some(ReviewStatus::Applied),
                ..ApplicationScope::default()
            },
            Actor::Admin(AdminTier::Tier1) => ApplicationScope {
                recommendation: Some(RecommendationStatus::Pending),
                ..ApplicationScope::default()
            },
            Actor::Admin(AdminTier::Tier2) => ApplicationScope {
                recommendation: Some(RecommendationStatus::Recommended),
                approval: Some(ApprovalStatus::Pending),
                ..ApplicationScope::default()
            },
        };

        let mut records = self.repository().applications(&scope)?;
        if matches!(actor, Actor::Student(_)) {
            records.retain(|record| !record.label().is_final());
        }
        debug!(actor = %actor, pending = records.len(), "listed pending items");
        Ok(self.listing(records))
    }

    pub fn has_applied(&self, key: &ApplicationKey) -> Result<bool, PlacementError> {
        Ok(self.repository().find_application(key)?.is_some())
    }

    /// Every posting that can still receive applications.
    pub fn open_opportunities(&self) -> Result<Vec<OpportunityListing>, PlacementError> {
        let repository = self.repository();
        let mut listings = Vec::new();
        for opportunity in repository.opportunities(None)? {
            if !opportunity.is_open() {
                continue;
            }
            let company = repository
                .fetch_company(&opportunity.company_id)?
                .ok_or_else(|| PlacementError::not_found("company", &opportunity.company_id))?;
            listings.push(OpportunityListing {
                opportunity,
                company_name: company.name,
            });
        }
        debug!(open = listings.len(), "listed open opportunities");
        Ok(listings)
    }

    /// Single joined view for the student who applied, the owning company, or an admin.
    pub fn application_view(
        &self,
        actor: &Actor,
        application_id: &ApplicationId,
    ) -> Result<ApplicationView, PlacementError> {
        let record = self.fetch_record(application_id)?;
        let visible = match actor {
            Actor::Student(id) => *id == record.key.student,
            Actor::Company(id) => *id == record.key.company,
            Actor::Admin(_) => true,
        };
        if !visible {
            return Err(PlacementError::unauthorized(actor, "view this application"));
        }
        join(self.repository().as_ref(), &record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn narrow_adopts_or_checks_requested_values() {
        let mut slot = None;
        assert!(narrow(&mut slot, Some(ReviewStatus::Selected)));
        assert_eq!(slot, Some(ReviewStatus::Selected));

        assert!(narrow(&mut slot, None));
        assert!(narrow(&mut slot, Some(ReviewStatus::Selected)));
        assert!(!narrow(&mut slot, Some(ReviewStatus::Rejected)));
    }

    #[test]
    fn tier_two_only_sees_recommended_applications() {
        let scope = visible_scope(&Actor::Admin(AdminTier::Tier2));
        assert_eq!(scope.recommendation, Some(RecommendationStatus::Recommended));
        assert!(scope.student.is_none());

        let scope = visible_scope(&Actor::Admin(AdminTier::Tier1));
        assert_eq!(scope, ApplicationScope::default());
    }

    #[test]
    fn companies_are_scoped_to_themselves() {
        let id = CompanyId::from_email("hr@acme.io");
        let mut scope = visible_scope(&Actor::Company(id.clone()));
        assert_eq!(scope.company, Some(id));
        assert!(!narrow(
            &mut scope.company,
            Some(CompanyId::from_email("hr@globex.io"))
        ));
    }
}
