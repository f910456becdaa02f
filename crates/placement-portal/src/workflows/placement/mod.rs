//! Placement and internship coordination.
//!
//! Students and companies register, companies post opportunities, students
//! apply, and each application moves along three independent axes: the
//! company's review, a tier-1 recommendation and a tier-2 approval. Approval
//! is only reachable while the recommendation currently reads `recommended`.

pub mod documents;
pub mod domain;
pub mod identity;
pub mod memory;
pub mod projection;
pub mod query;
pub mod repository;
pub mod router;
pub mod service;
pub mod sqlite;
pub(crate) mod validation;

#[cfg(test)]
mod tests;

pub use documents::{DocumentError, DocumentStore, LocalDocumentStore, MemoryDocumentStore};
pub use domain::{
    ApplicationId, ApplicationKey, ApplicationStatus, ApprovalDecision, ApprovalStatus, Company,
    CompanyId, CompanyRegistration, DocumentKind, DocumentRef, Opportunity, OpportunityDraft,
    OpportunityId, OpportunityKind, OpportunityStatus, RecommendationDecision,
    RecommendationStatus, ReviewStatus, Student, StudentId, StudentRegistration,
};
pub use identity::{
    Actor, AdminAccount, AdminTier, ConfiguredIdentityProvider, IdentityClaim, IdentityError,
    IdentityProvider, Role,
};
pub use memory::InMemoryPlacementRepository;
pub use projection::{project, StatusLabel};
pub use query::{ApplicationFilter, ApplicationListing, ApplicationView, OpportunityListing};
pub use repository::{
    ApplicationRecord, ApplicationScope, ApplicationStatusView, PlacementRepository,
    RepositoryError,
};
pub use router::{placement_router, IDENTITY_HEADER, ROLE_HEADER, SECRET_HEADER};
pub use service::{PlacementError, PlacementService};
pub use sqlite::SqlitePlacementRepository;
pub use validation::ValidationError;
