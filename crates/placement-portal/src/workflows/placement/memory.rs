use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::domain::{
    ApplicationId, ApplicationKey, Company, CompanyId, Opportunity, OpportunityId, Student,
    StudentId,
};
use super::repository::{
    ApplicationRecord, ApplicationScope, PlacementRepository, RepositoryError, SequencedEntity,
};

#[derive(Debug, Default)]
struct Tables {
    students: HashMap<StudentId, Student>,
    companies: HashMap<CompanyId, Company>,
    company_names: HashMap<String, CompanyId>,
    opportunities: BTreeMap<OpportunityId, Opportunity>,
    applications: BTreeMap<ApplicationId, ApplicationRecord>,
    application_keys: HashMap<ApplicationKey, ApplicationId>,
}

fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Process-local repository with keyed lookups and a composite application index.
#[derive(Debug, Default, Clone)]
pub struct InMemoryPlacementRepository {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryPlacementRepository {
    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, RepositoryError> {
        self.tables
            .read()
            .map_err(|_| RepositoryError::Unavailable("repository lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, RepositoryError> {
        self.tables
            .write()
            .map_err(|_| RepositoryError::Unavailable("repository lock poisoned".to_string()))
    }
}

impl PlacementRepository for InMemoryPlacementRepository {
    fn insert_student(&self, student: Student) -> Result<Student, RepositoryError> {
        let mut tables = self.write()?;
        if tables.students.contains_key(&student.id) {
            return Err(RepositoryError::Conflict);
        }
        tables.students.insert(student.id.clone(), student.clone());
        Ok(student)
    }

    fn fetch_student(&self, id: &StudentId) -> Result<Option<Student>, RepositoryError> {
        Ok(self.read()?.students.get(id).cloned())
    }

    fn insert_company(&self, company: Company) -> Result<Company, RepositoryError> {
        let mut tables = self.write()?;
        let name = name_key(&company.name);
        if tables.companies.contains_key(&company.id) || tables.company_names.contains_key(&name)
        {
            return Err(RepositoryError::Conflict);
        }
        tables.company_names.insert(name, company.id.clone());
        tables.companies.insert(company.id.clone(), company.clone());
        Ok(company)
    }

    fn fetch_company(&self, id: &CompanyId) -> Result<Option<Company>, RepositoryError> {
        Ok(self.read()?.companies.get(id).cloned())
    }

    fn find_company_by_name(&self, name: &str) -> Result<Option<Company>, RepositoryError> {
        let tables = self.read()?;
        Ok(tables
            .company_names
            .get(&name_key(name))
            .and_then(|id| tables.companies.get(id))
            .cloned())
    }

    fn insert_opportunity(
        &self,
        opportunity: Opportunity,
    ) -> Result<Opportunity, RepositoryError> {
        let mut tables = self.write()?;
        if tables.opportunities.contains_key(&opportunity.id) {
            return Err(RepositoryError::Conflict);
        }
        tables
            .opportunities
            .insert(opportunity.id.clone(), opportunity.clone());
        Ok(opportunity)
    }

    fn update_opportunity(&self, opportunity: Opportunity) -> Result<(), RepositoryError> {
        let mut tables = self.write()?;
        match tables.opportunities.get_mut(&opportunity.id) {
            Some(existing) => {
                *existing = opportunity;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn fetch_opportunity(
        &self,
        id: &OpportunityId,
    ) -> Result<Option<Opportunity>, RepositoryError> {
        Ok(self.read()?.opportunities.get(id).cloned())
    }

    fn opportunities(
        &self,
        company: Option<&CompanyId>,
    ) -> Result<Vec<Opportunity>, RepositoryError> {
        Ok(self
            .read()?
            .opportunities
            .values()
            .filter(|opportunity| company.map_or(true, |id| &opportunity.company_id == id))
            .cloned()
            .collect())
    }

    fn insert_application(
        &self,
        record: ApplicationRecord,
    ) -> Result<ApplicationRecord, RepositoryError> {
        let mut tables = self.write()?;
        if tables.applications.contains_key(&record.id)
            || tables.application_keys.contains_key(&record.key)
        {
            return Err(RepositoryError::Conflict);
        }
        tables
            .application_keys
            .insert(record.key.clone(), record.id.clone());
        tables.applications.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    fn update_application(&self, record: ApplicationRecord) -> Result<(), RepositoryError> {
        let mut tables = self.write()?;
        match tables.applications.get_mut(&record.id) {
            Some(existing) if existing.key == record.key => {
                *existing = record;
                Ok(())
            }
            Some(_) => Err(RepositoryError::Conflict),
            None => Err(RepositoryError::NotFound),
        }
    }

    fn fetch_application(
        &self,
        id: &ApplicationId,
    ) -> Result<Option<ApplicationRecord>, RepositoryError> {
        Ok(self.read()?.applications.get(id).cloned())
    }

    fn find_application(
        &self,
        key: &ApplicationKey,
    ) -> Result<Option<ApplicationRecord>, RepositoryError> {
        let tables = self.read()?;
        Ok(tables
            .application_keys
            .get(key)
            .and_then(|id| tables.applications.get(id))
            .cloned())
    }

    fn applications(
        &self,
        scope: &ApplicationScope,
    ) -> Result<Vec<ApplicationRecord>, RepositoryError> {
        Ok(self
            .read()?
            .applications
            .values()
            .filter(|record| scope.matches(record))
            .cloned()
            .collect())
    }

    fn next_sequence(&self, entity: SequencedEntity) -> Result<u64, RepositoryError> {
        let tables = self.read()?;
        let count = match entity {
            SequencedEntity::Opportunity => tables.opportunities.len(),
            SequencedEntity::Application => tables.applications.len(),
        };
        Ok(count as u64 + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::placement::domain::{
        DocumentKind, DocumentRef, OpportunityKind, OpportunityStatus,
    };
    use chrono::Utc;

    fn company(email: &str, name: &str) -> Company {
        Company {
            id: CompanyId::from_email(email),
            name: name.to_string(),
            email: email.to_string(),
            industry: "Manufacturing".to_string(),
            description: "Widgets".to_string(),
            website: None,
            logo: None,
            registered_at: Utc::now(),
        }
    }

    fn opportunity(sequence: u64, company: &str) -> Opportunity {
        Opportunity {
            id: OpportunityId::from_sequence(sequence),
            company_id: CompanyId::from_email(company),
            title: format!("Intern-{sequence}"),
            kind: OpportunityKind::Internship,
            location: "Delhi".to_string(),
            compensation: "Stipend".to_string(),
            skills: vec!["rust".to_string()],
            description: "Backend".to_string(),
            status: OpportunityStatus::Open,
            posted_at: Utc::now(),
            withdrawn_at: None,
        }
    }

    fn key(student: &str) -> ApplicationKey {
        ApplicationKey {
            student: StudentId::from_email(student),
            company: CompanyId::from_email("hr@acme.io"),
            opportunity: OpportunityId::from_sequence(1),
        }
    }

    #[test]
    fn duplicate_student_is_a_conflict() {
        let repository = InMemoryPlacementRepository::default();
        let student = Student {
            id: StudentId::from_email("a@x.com"),
            name: "A".to_string(),
            contact: "9876543210".to_string(),
            email: "a@x.com".to_string(),
            qualification: "B.Sc".to_string(),
            identity_document: "123412341234".to_string(),
            resume: DocumentRef {
                kind: DocumentKind::Resume,
                file_name: "cv.pdf".to_string(),
                location: "memory://resumes/cv.pdf".to_string(),
                content_type: "application/pdf".to_string(),
            },
            registered_at: Utc::now(),
        };
        repository
            .insert_student(student.clone())
            .expect("first insert");
        assert_eq!(
            repository.insert_student(student),
            Err(RepositoryError::Conflict)
        );
    }

    #[test]
    fn company_names_are_indexed_case_insensitively() {
        let repository = InMemoryPlacementRepository::default();
        repository
            .insert_company(company("hr@acme.io", "Acme"))
            .expect("insert");

        let found = repository
            .find_company_by_name(" ACME ")
            .expect("lookup")
            .expect("present");
        assert_eq!(found.id, CompanyId::from_email("hr@acme.io"));
        assert_eq!(
            repository.insert_company(company("jobs@acme.io", "acme")),
            Err(RepositoryError::Conflict)
        );
    }

    #[test]
    fn opportunities_filter_by_owner_in_creation_order() {
        let repository = InMemoryPlacementRepository::default();
        repository
            .insert_opportunity(opportunity(1, "hr@acme.io"))
            .expect("insert");
        repository
            .insert_opportunity(opportunity(2, "hr@globex.io"))
            .expect("insert");
        repository
            .insert_opportunity(opportunity(3, "hr@acme.io"))
            .expect("insert");

        let acme = CompanyId::from_email("hr@acme.io");
        let ids: Vec<String> = repository
            .opportunities(Some(&acme))
            .expect("list")
            .into_iter()
            .map(|opportunity| opportunity.id.0)
            .collect();
        assert_eq!(ids, vec!["opp-000001", "opp-000003"]);
        assert_eq!(
            repository
                .next_sequence(SequencedEntity::Opportunity)
                .expect("sequence"),
            4
        );
    }

    #[test]
    fn opportunity_listing_orders_long_ids_last() {
        let repository = InMemoryPlacementRepository::default();
        for sequence in [1_000_000, 999_999] {
            repository
                .insert_opportunity(opportunity(sequence, "hr@acme.io"))
                .expect("insert");
        }

        let ids: Vec<String> = repository
            .opportunities(None)
            .expect("list")
            .into_iter()
            .map(|opportunity| opportunity.id.0)
            .collect();
        assert_eq!(ids, vec!["opp-999999", "opp-1000000"]);
    }

    #[test]
    fn composite_key_rejects_second_application() {
        let repository = InMemoryPlacementRepository::default();
        let first =
            ApplicationRecord::new(ApplicationId::from_sequence(1), key("a@x.com"), Utc::now());
        repository
            .insert_application(first.clone())
            .expect("insert");

        let second =
            ApplicationRecord::new(ApplicationId::from_sequence(2), key("a@x.com"), Utc::now());
        assert_eq!(
            repository.insert_application(second),
            Err(RepositoryError::Conflict)
        );
        assert_eq!(
            repository.find_application(&key("a@x.com")).expect("lookup"),
            Some(first)
        );
        assert_eq!(
            repository.find_application(&key("b@x.com")).expect("lookup"),
            None
        );
    }

    #[test]
    fn update_requires_existing_record_with_same_key() {
        let repository = InMemoryPlacementRepository::default();
        let record =
            ApplicationRecord::new(ApplicationId::from_sequence(1), key("a@x.com"), Utc::now());
        assert_eq!(
            repository.update_application(record.clone()),
            Err(RepositoryError::NotFound)
        );

        repository
            .insert_application(record.clone())
            .expect("insert");
        let moved = ApplicationRecord {
            key: key("b@x.com"),
            ..record
        };
        assert_eq!(
            repository.update_application(moved),
            Err(RepositoryError::Conflict)
        );
    }
}
