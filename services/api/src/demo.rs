use chrono::{DateTime, Local, Utc};
use clap::Args;
use placement_portal::error::AppError;
use placement_portal::workflows::placement::{
    Actor, AdminTier, ApplicationFilter, ApplicationKey, ApplicationRecord, ApprovalDecision,
    CompanyRegistration, DocumentKind, DocumentStore, InMemoryPlacementRepository,
    MemoryDocumentStore, OpportunityDraft, OpportunityKind, PlacementError, PlacementRepository,
    PlacementService, RecommendationDecision, ReviewStatus, SqlitePlacementRepository,
    StudentRegistration,
};
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Run against an in-memory SQLite database instead of the plain in-memory store.
    #[arg(long)]
    pub(crate) sqlite: bool,
    /// Stop after the approval step; skip the company rejection that follows.
    #[arg(long)]
    pub(crate) skip_rejection: bool,
}

/// One line of walkthrough output: what happened and the label the student sees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DemoStep {
    pub(crate) action: &'static str,
    pub(crate) outcome: String,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        sqlite,
        skip_rejection,
    } = args;

    println!("Placement portal demo");
    let steps = if sqlite {
        println!("Storage: sqlite (in-memory database)");
        walkthrough(SqlitePlacementRepository::open_in_memory()?, skip_rejection)?
    } else {
        println!("Storage: in-memory");
        walkthrough(InMemoryPlacementRepository::default(), skip_rejection)?
    };

    for (index, step) in steps.iter().enumerate() {
        println!("{:>2}. {:<44} {}", index + 1, step.action, step.outcome);
    }

    Ok(())
}

pub(crate) fn walkthrough<R>(
    repository: R,
    skip_rejection: bool,
) -> Result<Vec<DemoStep>, AppError>
where
    R: PlacementRepository + 'static,
{
    let service = PlacementService::new(Arc::new(repository));
    let documents = MemoryDocumentStore::default();
    let tier1 = Actor::Admin(AdminTier::Tier1);
    let tier2 = Actor::Admin(AdminTier::Tier2);
    let mut steps = Vec::new();

    let resume = documents
        .store(DocumentKind::Resume, "asha-rao-cv.pdf", b"%PDF-1.7 demo")
        .map_err(PlacementError::from)?;
    let student = service.register_student(StudentRegistration {
        name: "Asha Rao".to_string(),
        contact: "9876543210".to_string(),
        email: "a@x.com".to_string(),
        qualification: "B.Tech Computer Science".to_string(),
        identity_document: "123412341234".to_string(),
        resume: Some(resume),
    })?;
    steps.push(DemoStep {
        action: "student registers",
        outcome: student.id.0.clone(),
    });

    let logo = documents
        .store(DocumentKind::Logo, "acme.png", b"\x89PNG demo")
        .map_err(PlacementError::from)?;
    let company = service.register_company(CompanyRegistration {
        name: "Acme".to_string(),
        email: "hr@acme.io".to_string(),
        industry: "Manufacturing".to_string(),
        description: "Industrial widgets and tooling".to_string(),
        website: Some("https://acme.io".to_string()),
        logo: Some(logo),
    })?;
    let company_actor = Actor::Company(company.id.clone());
    let opportunity = service.add_opportunity(
        &company_actor,
        &company.id,
        OpportunityDraft {
            title: "Intern-1".to_string(),
            kind: OpportunityKind::Internship,
            location: "Pune".to_string(),
            compensation: "15000/month".to_string(),
            skills: vec!["rust".to_string(), "sql".to_string()],
            description: "Six month backend internship".to_string(),
        },
    )?;
    steps.push(DemoStep {
        action: "company posts an internship",
        outcome: format!("{} ({})", opportunity.title, opportunity.id.0),
    });

    let student_actor = Actor::Student(student.id.clone());
    let key = ApplicationKey {
        student: student.id.clone(),
        company: company.id.clone(),
        opportunity: opportunity.id.clone(),
    };
    let record = service.apply(&student_actor, key.clone())?;
    steps.push(described("student applies", &record));

    match service.apply(&student_actor, key) {
        Err(PlacementError::DuplicateApplication(_)) => steps.push(DemoStep {
            action: "student applies again",
            outcome: "refused: already applied".to_string(),
        }),
        Err(err) => return Err(err.into()),
        Ok(_) => steps.push(DemoStep {
            action: "student applies again",
            outcome: "unexpectedly accepted".to_string(),
        }),
    }

    match service.set_approval(&tier2, &record.id, ApprovalDecision::Approved) {
        Err(PlacementError::GateNotSatisfied { recommendation, .. }) => steps.push(DemoStep {
            action: "tier-2 approves before any recommendation",
            outcome: format!("refused: recommendation is {}", recommendation.label()),
        }),
        Err(err) => return Err(err.into()),
        Ok(record) => steps.push(described("tier-2 approves (unexpected)", &record)),
    }

    let record = service.set_review_status(&company_actor, &record.id, ReviewStatus::Shortlisted)?;
    steps.push(described("company shortlists", &record));

    let record =
        service.set_recommendation(&tier1, &record.id, RecommendationDecision::Recommended)?;
    steps.push(described("tier-1 recommends", &record));

    let record = service.set_approval(&tier2, &record.id, ApprovalDecision::Approved)?;
    steps.push(described("tier-2 approves", &record));

    if !skip_rejection {
        let record = service.set_review_status(&company_actor, &record.id, ReviewStatus::Rejected)?;
        steps.push(described("company rejects after approval", &record));
    }

    let listing = service.list_applications_for(&student_actor, &ApplicationFilter::default())?;
    for view in listing.iter() {
        let view = view?;
        steps.push(DemoStep {
            action: "student dashboard",
            outcome: format!(
                "{} at {}: {}",
                view.opportunity_title, view.company_name, view.label
            ),
        });
    }

    Ok(steps)
}

fn described(action: &'static str, record: &ApplicationRecord) -> DemoStep {
    DemoStep {
        action,
        outcome: format!(
            "{} (review {}, recommendation {}, approval {}) at {}",
            record.label().label(),
            record.status.review.label(),
            record.status.recommendation.label(),
            record.status.approval.label(),
            local_time(record.updated_at),
        ),
    }
}

fn local_time(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%H:%M:%S").to_string()
}
