use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;

use super::domain::{
    normalize_email, Company, CompanyId, CompanyRegistration, DocumentKind, DocumentRef,
    OpportunityDraft, OpportunityId, Student, StudentId, StudentRegistration,
};

const EMAIL_PATTERN: &str = r"^[^@\s]+@[^@\s]+\.[^@\s]+$";
const CONTACT_DIGITS: usize = 10;
const IDENTITY_DOCUMENT_DIGITS: usize = 12;

/// Malformed or missing input; callers re-prompt.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("'{0}' is not a valid e-mail address")]
    InvalidEmail(String),
    #[error("{field} must be exactly {expected} digits")]
    InvalidDigits { field: &'static str, expected: usize },
    #[error("{field} must reference a {expected} document")]
    WrongDocumentKind {
        field: &'static str,
        expected: DocumentKind,
    },
    #[error("at least one required skill must be listed")]
    MissingSkills,
    #[error("'applied' is the initial review status and cannot be assigned")]
    InitialStatusOnly,
    #[error("opportunity {0} has been withdrawn")]
    OpportunityWithdrawn(OpportunityId),
}

fn email_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(EMAIL_PATTERN).ok()).as_ref()
}

fn required(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::MissingField(field));
    }
    Ok(trimmed.to_string())
}

fn email(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let normalized = normalize_email(&required(field, value)?);
    if !email_pattern().is_some_and(|pattern| pattern.is_match(&normalized)) {
        return Err(ValidationError::InvalidEmail(value.trim().to_string()));
    }
    Ok(normalized)
}

fn digits(field: &'static str, value: &str, expected: usize) -> Result<String, ValidationError> {
    let trimmed = required(field, value)?;
    if trimmed.len() != expected || !trimmed.bytes().all(|byte| byte.is_ascii_digit()) {
        return Err(ValidationError::InvalidDigits { field, expected });
    }
    Ok(trimmed)
}

fn document(
    field: &'static str,
    value: Option<DocumentRef>,
    expected: DocumentKind,
) -> Result<Option<DocumentRef>, ValidationError> {
    match value {
        Some(document) if document.kind != expected => {
            Err(ValidationError::WrongDocumentKind { field, expected })
        }
        other => Ok(other),
    }
}

fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty())
}

/// Check a student registration and produce the record to persist.
pub fn student_from_registration(
    registration: StudentRegistration,
    registered_at: DateTime<Utc>,
) -> Result<Student, ValidationError> {
    let name = required("name", &registration.name)?;
    let contact = digits("contact", &registration.contact, CONTACT_DIGITS)?;
    let email = email("email", &registration.email)?;
    let qualification = required("qualification", &registration.qualification)?;
    let identity_document = digits(
        "identity_document",
        &registration.identity_document,
        IDENTITY_DOCUMENT_DIGITS,
    )?;
    let resume = document("resume", registration.resume, DocumentKind::Resume)?
        .ok_or(ValidationError::MissingField("resume"))?;

    Ok(Student {
        id: StudentId(email.clone()),
        name,
        contact,
        email,
        qualification,
        identity_document,
        resume,
        registered_at,
    })
}

/// Check a company registration and produce the record to persist.
pub fn company_from_registration(
    registration: CompanyRegistration,
    registered_at: DateTime<Utc>,
) -> Result<Company, ValidationError> {
    let name = required("name", &registration.name)?;
    let email = email("email", &registration.email)?;
    let industry = required("industry", &registration.industry)?;
    let description = required("description", &registration.description)?;
    let logo = document("logo", registration.logo, DocumentKind::Logo)?;

    Ok(Company {
        id: CompanyId(email.clone()),
        name,
        email,
        industry,
        description,
        website: optional(registration.website),
        logo,
        registered_at,
    })
}

/// Trim every field of a posting and drop blank skills.
pub fn sanitize_draft(draft: OpportunityDraft) -> Result<OpportunityDraft, ValidationError> {
    let skills: Vec<String> = draft
        .skills
        .iter()
        .map(|skill| skill.trim().to_string())
        .filter(|skill| !skill.is_empty())
        .collect();
    if skills.is_empty() {
        return Err(ValidationError::MissingSkills);
    }

    Ok(OpportunityDraft {
        title: required("title", &draft.title)?,
        kind: draft.kind,
        location: required("location", &draft.location)?,
        compensation: required("compensation", &draft.compensation)?,
        skills,
        description: required("description", &draft.description)?,
    })
}
