use std::sync::Arc;

use super::common::*;
use crate::workflows::placement::domain::{CompanyId, OpportunityStatus, StudentId};
use crate::workflows::placement::identity::Actor;
use crate::workflows::placement::{PlacementError, PlacementService, ValidationError};

#[test]
fn second_student_with_same_email_is_duplicate() {
    let (service, _) = build_service();
    service
        .register_student(student_registration("a@x.com"))
        .expect("first registration");

    let err = service
        .register_student(student_registration(" A@X.COM "))
        .unwrap_err();
    match err {
        PlacementError::Duplicate { entity, key } => {
            assert_eq!(entity, "student");
            assert_eq!(key, "a@x.com");
        }
        other => panic!("expected duplicate, got {other:?}"),
    }
}

#[test]
fn second_company_with_same_email_is_duplicate() {
    let (service, _) = build_service();
    service
        .register_company(company_registration("hr@acme.io", "Acme"))
        .expect("first registration");

    let err = service
        .register_company(company_registration("hr@acme.io", "Acme Holdings"))
        .unwrap_err();
    assert!(matches!(
        err,
        PlacementError::Duplicate {
            entity: "company",
            ..
        }
    ));
}

#[test]
fn invalid_registration_stores_nothing() {
    let (service, _) = build_service();
    let mut registration = student_registration("a@x.com");
    registration.contact = "12345".to_string();

    let err = service.register_student(registration).unwrap_err();
    assert!(matches!(
        err,
        PlacementError::Validation(ValidationError::InvalidDigits {
            field: "contact",
            ..
        })
    ));
    assert!(matches!(
        service.student(&StudentId::from_email("a@x.com")),
        Err(PlacementError::NotFound { .. })
    ));
}

#[test]
fn registrations_are_retrievable_by_id() {
    let scenario = Scenario::new();
    let student = scenario
        .service
        .student(&scenario.key.student)
        .expect("student found");
    assert_eq!(student.name, "Asha Rao");
    assert_eq!(student.resume.file_name, "cv.pdf");

    let company = scenario
        .service
        .company(&scenario.key.company)
        .expect("company found");
    assert_eq!(company.website.as_deref(), Some("https://acme.io"));
}

#[test]
fn opportunities_get_stable_generated_ids_in_order() {
    let scenario = Scenario::new();
    let second = scenario
        .service
        .add_opportunity(&scenario.company, &scenario.key.company, draft("Graduate Engineer"))
        .expect("second posting");

    assert_eq!(scenario.key.opportunity.0, "opp-000001");
    assert_eq!(second.id.0, "opp-000002");

    let titles: Vec<String> = scenario
        .service
        .company_opportunities(&scenario.key.company)
        .expect("listing")
        .into_iter()
        .map(|opportunity| opportunity.title)
        .collect();
    assert_eq!(titles, vec!["Intern-1", "Graduate Engineer"]);
}

#[test]
fn opportunity_updates_are_scoped_to_the_owner() {
    let scenario = Scenario::new();
    scenario
        .service
        .register_company(company_registration("hr@globex.io", "Globex"))
        .expect("second company");
    let globex = CompanyId::from_email("hr@globex.io");

    let err = scenario
        .service
        .update_opportunity(
            &Actor::Company(globex.clone()),
            &globex,
            &scenario.key.opportunity,
            draft("Hijacked"),
        )
        .unwrap_err();
    assert!(matches!(err, PlacementError::Unauthorized { .. }));

    let updated = scenario
        .service
        .update_opportunity(
            &scenario.company,
            &scenario.key.company,
            &scenario.key.opportunity,
            draft("Intern-1 (Summer)"),
        )
        .expect("owner updates");
    assert_eq!(updated.title, "Intern-1 (Summer)");
    assert_eq!(updated.id, scenario.key.opportunity);
}

#[test]
fn removal_withdraws_without_deleting() {
    let scenario = Scenario::new();
    let application = scenario.apply();

    scenario
        .service
        .remove_opportunity(
            &scenario.company,
            &scenario.key.company,
            &scenario.key.opportunity,
        )
        .expect("withdrawn");

    let stored = scenario
        .service
        .opportunity(&scenario.key.opportunity)
        .expect("still stored");
    assert_eq!(stored.status, OpportunityStatus::Withdrawn);
    assert!(scenario
        .service
        .open_opportunities()
        .expect("listing")
        .is_empty());

    let view = scenario
        .service
        .application_view(&scenario.student, &application)
        .expect("existing application still joins");
    assert_eq!(view.opportunity_title, "Intern-1");
}

#[test]
fn unknown_opportunity_is_not_found() {
    let scenario = Scenario::new();
    let err = scenario
        .service
        .remove_opportunity(
            &scenario.company,
            &scenario.key.company,
            &crate::workflows::placement::OpportunityId("opp-999999".to_string()),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        PlacementError::NotFound {
            entity: "opportunity",
            ..
        }
    ));
}

#[test]
fn storage_outage_surfaces_verbatim() {
    let service = PlacementService::new(Arc::new(UnavailableRepository));
    let err = service
        .register_student(student_registration("a@x.com"))
        .unwrap_err();
    match err {
        PlacementError::StorageUnavailable(reason) => assert_eq!(reason, "database offline"),
        other => panic!("expected storage failure, got {other:?}"),
    }
}
