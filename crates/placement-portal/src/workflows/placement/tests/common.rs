use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request};
use axum::response::Response;
use serde_json::Value;

use crate::workflows::placement::domain::{
    ApplicationId, ApplicationKey, Company, CompanyId, CompanyRegistration, DocumentKind,
    DocumentRef, Opportunity, OpportunityDraft, OpportunityId, OpportunityKind, Student,
    StudentId, StudentRegistration,
};
use crate::workflows::placement::documents::DocumentStore;
use crate::workflows::placement::identity::{
    Actor, AdminAccount, AdminTier, ConfiguredIdentityProvider,
};
use crate::workflows::placement::repository::{
    ApplicationRecord, ApplicationScope, PlacementRepository, RepositoryError, SequencedEntity,
};
use crate::workflows::placement::router::{IDENTITY_HEADER, ROLE_HEADER, SECRET_HEADER};
use crate::workflows::placement::{
    placement_router, InMemoryPlacementRepository, MemoryDocumentStore, PlacementService,
};

pub(super) const TIER1_USER: &str = "recommender";
pub(super) const TIER1_SECRET: &str = "tier1-secret";
pub(super) const TIER2_USER: &str = "approver";
pub(super) const TIER2_SECRET: &str = "tier2-secret";

pub(super) type MemoryService = PlacementService<InMemoryPlacementRepository>;

pub(super) fn build_service() -> (MemoryService, Arc<InMemoryPlacementRepository>) {
    let repository = Arc::new(InMemoryPlacementRepository::default());
    let service = PlacementService::new(repository.clone());
    (service, repository)
}

pub(super) fn resume() -> DocumentRef {
    DocumentRef {
        kind: DocumentKind::Resume,
        file_name: "cv.pdf".to_string(),
        location: "memory://resumes/0001-cv.pdf".to_string(),
        content_type: "application/pdf".to_string(),
    }
}

pub(super) fn student_registration(email: &str) -> StudentRegistration {
    StudentRegistration {
        name: "Asha Rao".to_string(),
        contact: "9876543210".to_string(),
        email: email.to_string(),
        qualification: "B.Tech Computer Science".to_string(),
        identity_document: "123412341234".to_string(),
        resume: Some(resume()),
    }
}

pub(super) fn company_registration(email: &str, name: &str) -> CompanyRegistration {
    CompanyRegistration {
        name: name.to_string(),
        email: email.to_string(),
        industry: "Manufacturing".to_string(),
        description: "Industrial widgets".to_string(),
        website: Some("https://acme.io".to_string()),
        logo: None,
    }
}

pub(super) fn draft(title: &str) -> OpportunityDraft {
    OpportunityDraft {
        title: title.to_string(),
        kind: OpportunityKind::Internship,
        location: "New Delhi".to_string(),
        compensation: "15000/month".to_string(),
        skills: vec!["rust".to_string(), "sql".to_string()],
        description: "Backend services internship".to_string(),
    }
}

pub(super) fn tier1() -> Actor {
    Actor::Admin(AdminTier::Tier1)
}

pub(super) fn tier2() -> Actor {
    Actor::Admin(AdminTier::Tier2)
}

/// Student "a@x.com", company "Acme" and its posting "Intern-1", not yet applied.
pub(super) struct Scenario {
    pub(super) service: Arc<MemoryService>,
    pub(super) repository: Arc<InMemoryPlacementRepository>,
    pub(super) student: Actor,
    pub(super) company: Actor,
    pub(super) key: ApplicationKey,
}

impl Scenario {
    pub(super) fn new() -> Self {
        let (service, repository) = build_service();
        let student = service
            .register_student(student_registration("a@x.com"))
            .expect("student registers");
        let company = service
            .register_company(company_registration("hr@acme.io", "Acme"))
            .expect("company registers");
        let company_actor = Actor::Company(company.id.clone());
        let opportunity = service
            .add_opportunity(&company_actor, &company.id, draft("Intern-1"))
            .expect("opportunity posted");

        Self {
            service: Arc::new(service),
            repository,
            student: Actor::Student(student.id.clone()),
            company: company_actor,
            key: ApplicationKey {
                student: student.id,
                company: company.id,
                opportunity: opportunity.id,
            },
        }
    }

    pub(super) fn apply(&self) -> ApplicationId {
        self.service
            .apply(&self.student, self.key.clone())
            .expect("application accepted")
            .id
    }

    pub(super) fn record(&self, id: &ApplicationId) -> ApplicationRecord {
        self.repository
            .fetch_application(id)
            .expect("repository readable")
            .expect("application stored")
    }
}

pub(super) fn identity_provider() -> ConfiguredIdentityProvider {
    ConfiguredIdentityProvider::new(vec![
        AdminAccount {
            tier: AdminTier::Tier1,
            username: TIER1_USER.to_string(),
            secret: TIER1_SECRET.to_string(),
        },
        AdminAccount {
            tier: AdminTier::Tier2,
            username: TIER2_USER.to_string(),
            secret: TIER2_SECRET.to_string(),
        },
    ])
}

/// Document store that has already issued the fixture `resume()`.
pub(super) fn document_store() -> Arc<MemoryDocumentStore> {
    let store = MemoryDocumentStore::default();
    let issued = store
        .store(DocumentKind::Resume, "cv.pdf", b"%PDF-1.7")
        .expect("fixture resume stored");
    assert_eq!(issued, resume());
    Arc::new(store)
}

pub(super) fn router_with_service(service: Arc<MemoryService>) -> axum::Router {
    placement_router(service, Arc::new(identity_provider()), document_store())
}

/// Claim headers for a request, as `(role, identity, secret)`.
pub(super) type Caller<'a> = Option<(&'a str, &'a str, Option<&'a str>)>;

pub(super) fn request(
    method: Method,
    uri: &str,
    caller: Caller<'_>,
    body: Option<Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some((role, identity, secret)) = caller {
        builder = builder
            .header(ROLE_HEADER, role)
            .header(IDENTITY_HEADER, identity);
        if let Some(secret) = secret {
            builder = builder.header(SECRET_HEADER, secret);
        }
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&body).expect("json body")))
            .expect("request builds"),
        None => builder.body(Body::empty()).expect("request builds"),
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

pub(super) struct UnavailableRepository;

fn offline<T>() -> Result<T, RepositoryError> {
    Err(RepositoryError::Unavailable("database offline".to_string()))
}

impl PlacementRepository for UnavailableRepository {
    fn insert_student(&self, _student: Student) -> Result<Student, RepositoryError> {
        offline()
    }

    fn fetch_student(&self, _id: &StudentId) -> Result<Option<Student>, RepositoryError> {
        offline()
    }

    fn insert_company(&self, _company: Company) -> Result<Company, RepositoryError> {
        offline()
    }

    fn fetch_company(&self, _id: &CompanyId) -> Result<Option<Company>, RepositoryError> {
        offline()
    }

    fn find_company_by_name(&self, _name: &str) -> Result<Option<Company>, RepositoryError> {
        offline()
    }

    fn insert_opportunity(
        &self,
        _opportunity: Opportunity,
    ) -> Result<Opportunity, RepositoryError> {
        offline()
    }

    fn update_opportunity(&self, _opportunity: Opportunity) -> Result<(), RepositoryError> {
        offline()
    }

    fn fetch_opportunity(
        &self,
        _id: &OpportunityId,
    ) -> Result<Option<Opportunity>, RepositoryError> {
        offline()
    }

    fn opportunities(
        &self,
        _company: Option<&CompanyId>,
    ) -> Result<Vec<Opportunity>, RepositoryError> {
        offline()
    }

    fn insert_application(
        &self,
        _record: ApplicationRecord,
    ) -> Result<ApplicationRecord, RepositoryError> {
        offline()
    }

    fn update_application(&self, _record: ApplicationRecord) -> Result<(), RepositoryError> {
        offline()
    }

    fn fetch_application(
        &self,
        _id: &ApplicationId,
    ) -> Result<Option<ApplicationRecord>, RepositoryError> {
        offline()
    }

    fn find_application(
        &self,
        _key: &ApplicationKey,
    ) -> Result<Option<ApplicationRecord>, RepositoryError> {
        offline()
    }

    fn applications(
        &self,
        _scope: &ApplicationScope,
    ) -> Result<Vec<ApplicationRecord>, RepositoryError> {
        offline()
    }

    fn next_sequence(&self, _entity: SequencedEntity) -> Result<u64, RepositoryError> {
        offline()
    }
}
