use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};

use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Connection, ErrorCode, OptionalExtension, Row};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::domain::{
    ApplicationId, ApplicationKey, ApplicationStatus, Company, CompanyId, Opportunity,
    OpportunityId, Student, StudentId,
};
use super::repository::{
    ApplicationRecord, ApplicationScope, PlacementRepository, RepositoryError, SequencedEntity,
};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS students (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    contact TEXT NOT NULL,
    email TEXT NOT NULL UNIQUE,
    qualification TEXT NOT NULL,
    identity_document TEXT NOT NULL,
    resume TEXT NOT NULL,
    registered_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS companies (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    name_key TEXT NOT NULL UNIQUE,
    email TEXT NOT NULL UNIQUE,
    industry TEXT NOT NULL,
    description TEXT NOT NULL,
    website TEXT,
    logo TEXT,
    registered_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS opportunities (
    id TEXT PRIMARY KEY,
    company_id TEXT NOT NULL REFERENCES companies(id),
    title TEXT NOT NULL,
    kind TEXT NOT NULL CHECK (kind IN ('internship', 'job')),
    location TEXT NOT NULL,
    compensation TEXT NOT NULL,
    skills TEXT NOT NULL,
    description TEXT NOT NULL,
    status TEXT NOT NULL CHECK (status IN ('open', 'withdrawn')),
    posted_at TEXT NOT NULL,
    withdrawn_at TEXT
);

CREATE TABLE IF NOT EXISTS applications (
    id TEXT PRIMARY KEY,
    student_id TEXT NOT NULL REFERENCES students(id),
    company_id TEXT NOT NULL REFERENCES companies(id),
    opportunity_id TEXT NOT NULL REFERENCES opportunities(id),
    review_status TEXT NOT NULL
        CHECK (review_status IN ('applied', 'shortlisted', 'rejected', 'selected')),
    recommendation_status TEXT NOT NULL
        CHECK (recommendation_status IN ('pending', 'recommended', 'not_recommended')),
    approval_status TEXT NOT NULL
        CHECK (approval_status IN ('pending', 'approved', 'not_approved')),
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    reviewed_at TEXT,
    recommended_at TEXT,
    approved_at TEXT,
    UNIQUE (student_id, company_id, opportunity_id)
);

CREATE INDEX IF NOT EXISTS idx_opportunities_company ON opportunities(company_id);
CREATE INDEX IF NOT EXISTS idx_applications_student ON applications(student_id);
CREATE INDEX IF NOT EXISTS idx_applications_company ON applications(company_id);
CREATE INDEX IF NOT EXISTS idx_applications_recommendation
    ON applications(recommendation_status);
"#;

const STUDENT_COLUMNS: &str =
    "id, name, contact, email, qualification, identity_document, resume, registered_at";
const COMPANY_COLUMNS: &str =
    "id, name, email, industry, description, website, logo, registered_at";
const OPPORTUNITY_COLUMNS: &str = "id, company_id, title, kind, location, compensation, skills, \
     description, status, posted_at, withdrawn_at";
const APPLICATION_COLUMNS: &str = "id, student_id, company_id, opportunity_id, review_status, \
     recommendation_status, approval_status, created_at, updated_at, reviewed_at, \
     recommended_at, approved_at";

/// Durable repository backed by a single SQLite connection.
pub struct SqlitePlacementRepository {
    conn: Mutex<Connection>,
}

impl SqlitePlacementRepository {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RepositoryError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|err| RepositoryError::Unavailable(err.to_string()))?;
        }
        let conn = Connection::open(path).map_err(storage_error)?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, RepositoryError> {
        let conn = Connection::open_in_memory().map_err(storage_error)?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, RepositoryError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .and_then(|_| conn.execute_batch(SCHEMA))
            .map_err(storage_error)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, RepositoryError> {
        self.conn
            .lock()
            .map_err(|_| RepositoryError::Unavailable("sqlite connection poisoned".to_string()))
    }
}

fn storage_error(err: rusqlite::Error) -> RepositoryError {
    match err {
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.code == ErrorCode::ConstraintViolation =>
        {
            RepositoryError::Conflict
        }
        other => RepositoryError::Unavailable(other.to_string()),
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<String, RepositoryError> {
    serde_json::to_string(value).map_err(|err| RepositoryError::Unavailable(err.to_string()))
}

fn parsed<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err)))
}

fn json<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err)))
}

fn optional_json<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<T>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|raw| {
        serde_json::from_str(&raw).map_err(|err| {
            rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
        })
    })
    .transpose()
}

fn row_to_student(row: &Row<'_>) -> rusqlite::Result<Student> {
    Ok(Student {
        id: StudentId(row.get(0)?),
        name: row.get(1)?,
        contact: row.get(2)?,
        email: row.get(3)?,
        qualification: row.get(4)?,
        identity_document: row.get(5)?,
        resume: json(row, 6)?,
        registered_at: row.get(7)?,
    })
}

fn row_to_company(row: &Row<'_>) -> rusqlite::Result<Company> {
    Ok(Company {
        id: CompanyId(row.get(0)?),
        name: row.get(1)?,
        email: row.get(2)?,
        industry: row.get(3)?,
        description: row.get(4)?,
        website: row.get(5)?,
        logo: optional_json(row, 6)?,
        registered_at: row.get(7)?,
    })
}

fn row_to_opportunity(row: &Row<'_>) -> rusqlite::Result<Opportunity> {
    Ok(Opportunity {
        id: OpportunityId(row.get(0)?),
        company_id: CompanyId(row.get(1)?),
        title: row.get(2)?,
        kind: parsed(row, 3)?,
        location: row.get(4)?,
        compensation: row.get(5)?,
        skills: json(row, 6)?,
        description: row.get(7)?,
        status: parsed(row, 8)?,
        posted_at: row.get(9)?,
        withdrawn_at: row.get(10)?,
    })
}

fn row_to_application(row: &Row<'_>) -> rusqlite::Result<ApplicationRecord> {
    Ok(ApplicationRecord {
        id: ApplicationId(row.get(0)?),
        key: ApplicationKey {
            student: StudentId(row.get(1)?),
            company: CompanyId(row.get(2)?),
            opportunity: OpportunityId(row.get(3)?),
        },
        status: ApplicationStatus {
            review: parsed(row, 4)?,
            recommendation: parsed(row, 5)?,
            approval: parsed(row, 6)?,
        },
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
        reviewed_at: row.get(9)?,
        recommended_at: row.get(10)?,
        approved_at: row.get(11)?,
    })
}

impl PlacementRepository for SqlitePlacementRepository {
    fn insert_student(&self, student: Student) -> Result<Student, RepositoryError> {
        let resume = to_json(&student.resume)?;
        self.conn()?
            .execute(
                &format!(
                    "INSERT INTO students ({STUDENT_COLUMNS}) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"
                ),
                params![
                    student.id.0,
                    student.name,
                    student.contact,
                    student.email,
                    student.qualification,
                    student.identity_document,
                    resume,
                    student.registered_at,
                ],
            )
            .map_err(storage_error)?;
        Ok(student)
    }

    fn fetch_student(&self, id: &StudentId) -> Result<Option<Student>, RepositoryError> {
        self.conn()?
            .query_row(
                &format!("SELECT {STUDENT_COLUMNS} FROM students WHERE id = ?1"),
                [&id.0],
                row_to_student,
            )
            .optional()
            .map_err(storage_error)
    }

    fn insert_company(&self, company: Company) -> Result<Company, RepositoryError> {
        let logo = company.logo.as_ref().map(to_json).transpose()?;
        self.conn()?
            .execute(
                "INSERT INTO companies (id, name, name_key, email, industry, description, \
                 website, logo, registered_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    company.id.0,
                    company.name,
                    company.name.trim().to_lowercase(),
                    company.email,
                    company.industry,
                    company.description,
                    company.website,
                    logo,
                    company.registered_at,
                ],
            )
            .map_err(storage_error)?;
        Ok(company)
    }

    fn fetch_company(&self, id: &CompanyId) -> Result<Option<Company>, RepositoryError> {
        self.conn()?
            .query_row(
                &format!("SELECT {COMPANY_COLUMNS} FROM companies WHERE id = ?1"),
                [&id.0],
                row_to_company,
            )
            .optional()
            .map_err(storage_error)
    }

    fn find_company_by_name(&self, name: &str) -> Result<Option<Company>, RepositoryError> {
        self.conn()?
            .query_row(
                &format!("SELECT {COMPANY_COLUMNS} FROM companies WHERE name_key = ?1"),
                [name.trim().to_lowercase()],
                row_to_company,
            )
            .optional()
            .map_err(storage_error)
    }

    fn insert_opportunity(
        &self,
        opportunity: Opportunity,
    ) -> Result<Opportunity, RepositoryError> {
        let skills = to_json(&opportunity.skills)?;
        self.conn()?
            .execute(
                &format!(
                    "INSERT INTO opportunities ({OPPORTUNITY_COLUMNS}) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"
                ),
                params![
                    opportunity.id.0,
                    opportunity.company_id.0,
                    opportunity.title,
                    opportunity.kind.label(),
                    opportunity.location,
                    opportunity.compensation,
                    skills,
                    opportunity.description,
                    opportunity.status.label(),
                    opportunity.posted_at,
                    opportunity.withdrawn_at,
                ],
            )
            .map_err(storage_error)?;
        Ok(opportunity)
    }

    fn update_opportunity(&self, opportunity: Opportunity) -> Result<(), RepositoryError> {
        let skills = to_json(&opportunity.skills)?;
        let changed = self
            .conn()?
            .execute(
                "UPDATE opportunities SET title = ?2, kind = ?3, location = ?4, \
                 compensation = ?5, skills = ?6, description = ?7, status = ?8, \
                 withdrawn_at = ?9 WHERE id = ?1 AND company_id = ?10",
                params![
                    opportunity.id.0,
                    opportunity.title,
                    opportunity.kind.label(),
                    opportunity.location,
                    opportunity.compensation,
                    skills,
                    opportunity.description,
                    opportunity.status.label(),
                    opportunity.withdrawn_at,
                    opportunity.company_id.0,
                ],
            )
            .map_err(storage_error)?;
        if changed == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    fn fetch_opportunity(
        &self,
        id: &OpportunityId,
    ) -> Result<Option<Opportunity>, RepositoryError> {
        self.conn()?
            .query_row(
                &format!("SELECT {OPPORTUNITY_COLUMNS} FROM opportunities WHERE id = ?1"),
                [&id.0],
                row_to_opportunity,
            )
            .optional()
            .map_err(storage_error)
    }

    fn opportunities(
        &self,
        company: Option<&CompanyId>,
    ) -> Result<Vec<Opportunity>, RepositoryError> {
        let conn = self.conn()?;
        let (sql, values) = match company {
            Some(id) => (
                format!(
                    "SELECT {OPPORTUNITY_COLUMNS} FROM opportunities \
                     WHERE company_id = ?1 ORDER BY length(id), id"
                ),
                vec![id.0.clone()],
            ),
            None => (
                format!(
                    "SELECT {OPPORTUNITY_COLUMNS} FROM opportunities ORDER BY length(id), id"
                ),
                Vec::new(),
            ),
        };
        let mut stmt = conn.prepare(&sql).map_err(storage_error)?;
        let rows = stmt
            .query_map(params_from_iter(values.iter()), row_to_opportunity)
            .map_err(storage_error)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(storage_error)
    }

    fn insert_application(
        &self,
        record: ApplicationRecord,
    ) -> Result<ApplicationRecord, RepositoryError> {
        self.conn()?
            .execute(
                &format!(
                    "INSERT INTO applications ({APPLICATION_COLUMNS}) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
                ),
                params![
                    record.id.0,
                    record.key.student.0,
                    record.key.company.0,
                    record.key.opportunity.0,
                    record.status.review.label(),
                    record.status.recommendation.label(),
                    record.status.approval.label(),
                    record.created_at,
                    record.updated_at,
                    record.reviewed_at,
                    record.recommended_at,
                    record.approved_at,
                ],
            )
            .map_err(storage_error)?;
        Ok(record)
    }

    fn update_application(&self, record: ApplicationRecord) -> Result<(), RepositoryError> {
        let conn = self.conn()?;
        let changed = conn
            .execute(
                "UPDATE applications SET review_status = ?5, recommendation_status = ?6, \
                 approval_status = ?7, updated_at = ?8, reviewed_at = ?9, \
                 recommended_at = ?10, approved_at = ?11 \
                 WHERE id = ?1 AND student_id = ?2 AND company_id = ?3 AND opportunity_id = ?4",
                params![
                    record.id.0,
                    record.key.student.0,
                    record.key.company.0,
                    record.key.opportunity.0,
                    record.status.review.label(),
                    record.status.recommendation.label(),
                    record.status.approval.label(),
                    record.updated_at,
                    record.reviewed_at,
                    record.recommended_at,
                    record.approved_at,
                ],
            )
            .map_err(storage_error)?;
        if changed > 0 {
            return Ok(());
        }

        let exists: Option<String> = conn
            .query_row(
                "SELECT id FROM applications WHERE id = ?1",
                [&record.id.0],
                |row| row.get(0),
            )
            .optional()
            .map_err(storage_error)?;
        match exists {
            Some(_) => Err(RepositoryError::Conflict),
            None => Err(RepositoryError::NotFound),
        }
    }

    fn fetch_application(
        &self,
        id: &ApplicationId,
    ) -> Result<Option<ApplicationRecord>, RepositoryError> {
        self.conn()?
            .query_row(
                &format!("SELECT {APPLICATION_COLUMNS} FROM applications WHERE id = ?1"),
                [&id.0],
                row_to_application,
            )
            .optional()
            .map_err(storage_error)
    }

    fn find_application(
        &self,
        key: &ApplicationKey,
    ) -> Result<Option<ApplicationRecord>, RepositoryError> {
        self.conn()?
            .query_row(
                &format!(
                    "SELECT {APPLICATION_COLUMNS} FROM applications \
                     WHERE student_id = ?1 AND company_id = ?2 AND opportunity_id = ?3"
                ),
                params![key.student.0, key.company.0, key.opportunity.0],
                row_to_application,
            )
            .optional()
            .map_err(storage_error)
    }

    fn applications(
        &self,
        scope: &ApplicationScope,
    ) -> Result<Vec<ApplicationRecord>, RepositoryError> {
        let mut clauses = Vec::new();
        let mut values: Vec<String> = Vec::new();
        let mut constrain = |column: &str, value: Option<String>| {
            if let Some(value) = value {
                values.push(value);
                clauses.push(format!("{column} = ?{}", values.len()));
            }
        };
        constrain("student_id", scope.student.as_ref().map(|id| id.0.clone()));
        constrain("company_id", scope.company.as_ref().map(|id| id.0.clone()));
        constrain(
            "opportunity_id",
            scope.opportunity.as_ref().map(|id| id.0.clone()),
        );
        constrain(
            "review_status",
            scope.review.map(|status| status.label().to_string()),
        );
        constrain(
            "recommendation_status",
            scope.recommendation.map(|status| status.label().to_string()),
        );
        constrain(
            "approval_status",
            scope.approval.map(|status| status.label().to_string()),
        );

        let filter = if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        };
        let sql = format!(
            "SELECT {APPLICATION_COLUMNS} FROM applications{filter} ORDER BY length(id), id"
        );

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql).map_err(storage_error)?;
        let rows = stmt
            .query_map(params_from_iter(values.iter()), row_to_application)
            .map_err(storage_error)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(storage_error)
    }

    fn next_sequence(&self, entity: SequencedEntity) -> Result<u64, RepositoryError> {
        let table = match entity {
            SequencedEntity::Opportunity => "opportunities",
            SequencedEntity::Application => "applications",
        };
        let count: i64 = self
            .conn()?
            .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                row.get(0)
            })
            .map_err(storage_error)?;
        Ok(count as u64 + 1)
    }
}
