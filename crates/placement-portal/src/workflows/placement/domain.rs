use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Students are keyed by their normalised e-mail address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StudentId(pub String);

/// Companies are keyed by their normalised contact e-mail address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CompanyId(pub String);

/// Generated identifier of a posting, e.g. `opp-000004`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OpportunityId(pub String);

/// Generated identifier of an application, e.g. `app-000012`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApplicationId(pub String);

/// Generated ids share a prefix and pad to at least six digits, so a longer id
/// was issued later; equal lengths compare as text.
fn sequence_order(left: &str, right: &str) -> Ordering {
    left.len().cmp(&right.len()).then_with(|| left.cmp(right))
}

impl Ord for OpportunityId {
    fn cmp(&self, other: &Self) -> Ordering {
        sequence_order(&self.0, &other.0)
    }
}

impl PartialOrd for OpportunityId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ApplicationId {
    fn cmp(&self, other: &Self) -> Ordering {
        sequence_order(&self.0, &other.0)
    }
}

impl PartialOrd for ApplicationId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

pub(crate) fn normalize_email(raw: &str) -> String {
    raw.trim().to_ascii_lowercase()
}

impl StudentId {
    pub fn from_email(email: &str) -> Self {
        Self(normalize_email(email))
    }
}

impl CompanyId {
    pub fn from_email(email: &str) -> Self {
        Self(normalize_email(email))
    }
}

impl OpportunityId {
    pub(crate) fn from_sequence(sequence: u64) -> Self {
        Self(format!("opp-{sequence:06}"))
    }
}

impl ApplicationId {
    pub(crate) fn from_sequence(sequence: u64) -> Self {
        Self(format!("app-{sequence:06}"))
    }
}

macro_rules! display_inner {
    ($($ty:ty),+) => {
        $(impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        })+
    };
}

display_inner!(StudentId, CompanyId, OpportunityId, ApplicationId);

/// What kind of upload a `DocumentRef` points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Resume,
    Logo,
}

impl DocumentKind {
    pub const fn label(self) -> &'static str {
        match self {
            DocumentKind::Resume => "resume",
            DocumentKind::Logo => "logo",
        }
    }

    pub(crate) const fn directory(self) -> &'static str {
        match self {
            DocumentKind::Resume => "resumes",
            DocumentKind::Logo => "logos",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for DocumentKind {
    type Err = ParseStatusError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "resume" | "resumes" => Ok(DocumentKind::Resume),
            "logo" | "logos" => Ok(DocumentKind::Logo),
            other => Err(ParseStatusError::new("document kind", other)),
        }
    }
}

/// Retrievable handle returned by the document store; only this is persisted, never the blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRef {
    pub kind: DocumentKind,
    pub file_name: String,
    pub location: String,
    pub content_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentRegistration {
    pub name: String,
    pub contact: String,
    pub email: String,
    pub qualification: String,
    pub identity_document: String,
    pub resume: Option<DocumentRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub id: StudentId,
    pub name: String,
    pub contact: String,
    pub email: String,
    pub qualification: String,
    pub identity_document: String,
    pub resume: DocumentRef,
    pub registered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyRegistration {
    pub name: String,
    pub email: String,
    pub industry: String,
    pub description: String,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub logo: Option<DocumentRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
    pub id: CompanyId,
    pub name: String,
    pub email: String,
    pub industry: String,
    pub description: String,
    pub website: Option<String>,
    pub logo: Option<DocumentRef>,
    pub registered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpportunityKind {
    Internship,
    Job,
}

impl OpportunityKind {
    pub const fn label(self) -> &'static str {
        match self {
            OpportunityKind::Internship => "internship",
            OpportunityKind::Job => "job",
        }
    }
}

impl FromStr for OpportunityKind {
    type Err = ParseStatusError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "internship" => Ok(OpportunityKind::Internship),
            "job" => Ok(OpportunityKind::Job),
            other => Err(ParseStatusError::new("opportunity kind", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpportunityStatus {
    Open,
    Withdrawn,
}

impl OpportunityStatus {
    pub const fn label(self) -> &'static str {
        match self {
            OpportunityStatus::Open => "open",
            OpportunityStatus::Withdrawn => "withdrawn",
        }
    }
}

impl FromStr for OpportunityStatus {
    type Err = ParseStatusError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "open" => Ok(OpportunityStatus::Open),
            "withdrawn" => Ok(OpportunityStatus::Withdrawn),
            other => Err(ParseStatusError::new("opportunity status", other)),
        }
    }
}

/// Company-supplied posting fields, used for both creation and updates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpportunityDraft {
    pub title: String,
    pub kind: OpportunityKind,
    pub location: String,
    pub compensation: String,
    pub skills: Vec<String>,
    pub description: String,
}

/// A posting owned by exactly one company.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Opportunity {
    pub id: OpportunityId,
    pub company_id: CompanyId,
    pub title: String,
    pub kind: OpportunityKind,
    pub location: String,
    pub compensation: String,
    pub skills: Vec<String>,
    pub description: String,
    pub status: OpportunityStatus,
    pub posted_at: DateTime<Utc>,
    pub withdrawn_at: Option<DateTime<Utc>>,
}

impl Opportunity {
    pub fn is_open(&self) -> bool {
        self.status == OpportunityStatus::Open
    }
}

/// The (student, company, opportunity) triple; at most one application exists per key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ApplicationKey {
    pub student: StudentId,
    pub company: CompanyId,
    pub opportunity: OpportunityId,
}

impl fmt::Display for ApplicationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.student, self.company, self.opportunity)
    }
}

/// Company-driven review axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    Applied,
    Shortlisted,
    Rejected,
    Selected,
}

impl ReviewStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ReviewStatus::Applied => "applied",
            ReviewStatus::Shortlisted => "shortlisted",
            ReviewStatus::Rejected => "rejected",
            ReviewStatus::Selected => "selected",
        }
    }
}

impl FromStr for ReviewStatus {
    type Err = ParseStatusError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "applied" => Ok(ReviewStatus::Applied),
            "shortlisted" => Ok(ReviewStatus::Shortlisted),
            "rejected" => Ok(ReviewStatus::Rejected),
            "selected" => Ok(ReviewStatus::Selected),
            other => Err(ParseStatusError::new("review status", other)),
        }
    }
}

/// Tier-1 admin axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationStatus {
    Pending,
    Recommended,
    NotRecommended,
}

impl RecommendationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            RecommendationStatus::Pending => "pending",
            RecommendationStatus::Recommended => "recommended",
            RecommendationStatus::NotRecommended => "not_recommended",
        }
    }
}

impl FromStr for RecommendationStatus {
    type Err = ParseStatusError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(RecommendationStatus::Pending),
            "recommended" => Ok(RecommendationStatus::Recommended),
            "not_recommended" => Ok(RecommendationStatus::NotRecommended),
            other => Err(ParseStatusError::new("recommendation status", other)),
        }
    }
}

/// Tier-2 admin axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    NotApproved,
}

impl ApprovalStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ApprovalStatus::Pending => "pending",
            ApprovalStatus::Approved => "approved",
            ApprovalStatus::NotApproved => "not_approved",
        }
    }
}

impl FromStr for ApprovalStatus {
    type Err = ParseStatusError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(ApprovalStatus::Pending),
            "approved" => Ok(ApprovalStatus::Approved),
            "not_approved" => Ok(ApprovalStatus::NotApproved),
            other => Err(ParseStatusError::new("approval status", other)),
        }
    }
}

/// Values a tier-1 admin may record; `pending` is never a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationDecision {
    Recommended,
    NotRecommended,
}

impl From<RecommendationDecision> for RecommendationStatus {
    fn from(value: RecommendationDecision) -> Self {
        match value {
            RecommendationDecision::Recommended => RecommendationStatus::Recommended,
            RecommendationDecision::NotRecommended => RecommendationStatus::NotRecommended,
        }
    }
}

/// Values a tier-2 admin may record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalDecision {
    Approved,
    NotApproved,
}

impl From<ApprovalDecision> for ApprovalStatus {
    fn from(value: ApprovalDecision) -> Self {
        match value {
            ApprovalDecision::Approved => ApprovalStatus::Approved,
            ApprovalDecision::NotApproved => ApprovalStatus::NotApproved,
        }
    }
}

/// The three independent status axes of one application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationStatus {
    pub review: ReviewStatus,
    pub recommendation: RecommendationStatus,
    pub approval: ApprovalStatus,
}

impl ApplicationStatus {
    pub const fn initial() -> Self {
        Self {
            review: ReviewStatus::Applied,
            recommendation: RecommendationStatus::Pending,
            approval: ApprovalStatus::Pending,
        }
    }
}

impl Default for ApplicationStatus {
    fn default() -> Self {
        Self::initial()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct ParseStatusError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseStatusError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}
