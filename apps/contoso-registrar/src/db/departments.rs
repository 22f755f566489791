//! Department database operations
//!
//! Departments are the versioned entity: every write replaces `row_version`,
//! and writes only apply while the caller's token is still the stored one.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqliteArguments};
use sqlx::SqlitePool;

use crate::concurrency::{
    Conditional, ConditionalDelete, ConditionalWrite, FieldEdits, FieldKind, FieldValue, Money,
    Record, RecordField, VersionToken, VersionedStore,
};
use crate::error::{AppError, Result, StoreError, ValidationIssue};
use crate::pagination::PageSource;

/// Department record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Department {
    pub id: i64,
    pub name: String,
    pub budget: Money,
    pub start_date: NaiveDate,
    /// Administrator
    pub instructor_id: Option<i64>,
    pub row_version: VersionToken,
}

/// Editable department fields, in form order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DepartmentField {
    Name,
    Budget,
    StartDate,
    #[serde(rename = "InstructorID")]
    InstructorId,
}

impl DepartmentField {
    fn column(self) -> &'static str {
        match self {
            DepartmentField::Name => "name",
            DepartmentField::Budget => "budget_cents",
            DepartmentField::StartDate => "start_date",
            DepartmentField::InstructorId => "instructor_id",
        }
    }
}

impl RecordField for DepartmentField {
    fn all() -> &'static [Self] {
        &[
            DepartmentField::Name,
            DepartmentField::Budget,
            DepartmentField::StartDate,
            DepartmentField::InstructorId,
        ]
    }

    fn name(self) -> &'static str {
        match self {
            DepartmentField::Name => "Name",
            DepartmentField::Budget => "Budget",
            DepartmentField::StartDate => "StartDate",
            DepartmentField::InstructorId => "InstructorID",
        }
    }

    fn kind(self) -> FieldKind {
        match self {
            DepartmentField::Name => FieldKind::Text,
            DepartmentField::Budget => FieldKind::Money,
            DepartmentField::StartDate => FieldKind::Date,
            DepartmentField::InstructorId => FieldKind::Reference,
        }
    }

    fn check(self, value: &FieldValue) -> std::result::Result<(), String> {
        match (self, value) {
            (DepartmentField::Name, FieldValue::Text(name)) => {
                let len = name.trim().chars().count();
                if (3..=50).contains(&len) {
                    Ok(())
                } else {
                    Err("must be between 3 and 50 characters".to_string())
                }
            }
            (DepartmentField::Budget, FieldValue::Money(budget)) if budget.is_negative() => {
                Err("must not be negative".to_string())
            }
            _ => Ok(()),
        }
    }
}

/// New department request
#[derive(Debug, Clone, Deserialize)]
pub struct NewDepartment {
    pub name: String,
    pub budget: Money,
    pub start_date: NaiveDate,
    pub instructor_id: Option<i64>,
}

impl NewDepartment {
    pub fn values(&self) -> FieldEdits<DepartmentField> {
        let mut values = FieldEdits::new();
        values.insert(DepartmentField::Name, FieldValue::Text(self.name.clone()));
        values.insert(DepartmentField::Budget, FieldValue::Money(self.budget));
        values.insert(DepartmentField::StartDate, FieldValue::Date(self.start_date));
        values.insert(
            DepartmentField::InstructorId,
            FieldValue::Reference(self.instructor_id),
        );
        values
    }
}

impl Department {
    pub fn to_record(&self) -> Record<DepartmentField> {
        Record::new(self.id, self.row_version)
            .with_field(DepartmentField::Name, FieldValue::Text(self.name.clone()))
            .with_field(DepartmentField::Budget, FieldValue::Money(self.budget))
            .with_field(DepartmentField::StartDate, FieldValue::Date(self.start_date))
            .with_field(
                DepartmentField::InstructorId,
                FieldValue::Reference(self.instructor_id),
            )
    }
}

impl TryFrom<&Record<DepartmentField>> for Department {
    type Error = AppError;

    fn try_from(record: &Record<DepartmentField>) -> Result<Self> {
        let missing = |field: DepartmentField| {
            AppError::Internal(format!(
                "department {} has no {} value",
                record.id,
                field.name()
            ))
        };

        let name = match record.get(DepartmentField::Name) {
            Some(FieldValue::Text(name)) => name.clone(),
            _ => return Err(missing(DepartmentField::Name)),
        };
        let budget = match record.get(DepartmentField::Budget) {
            Some(FieldValue::Money(budget)) => *budget,
            _ => return Err(missing(DepartmentField::Budget)),
        };
        let start_date = match record.get(DepartmentField::StartDate) {
            Some(FieldValue::Date(date)) => *date,
            _ => return Err(missing(DepartmentField::StartDate)),
        };
        let instructor_id = match record.get(DepartmentField::InstructorId) {
            Some(FieldValue::Reference(id)) => *id,
            None => None,
            Some(_) => return Err(missing(DepartmentField::InstructorId)),
        };

        Ok(Department {
            id: record.id,
            name,
            budget,
            start_date,
            instructor_id,
            row_version: record.version,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct DepartmentRow {
    department_id: i64,
    name: String,
    budget_cents: i64,
    start_date: NaiveDate,
    instructor_id: Option<i64>,
    row_version: Vec<u8>,
}

impl TryFrom<DepartmentRow> for Department {
    type Error = StoreError;

    fn try_from(row: DepartmentRow) -> std::result::Result<Self, Self::Error> {
        let row_version = VersionToken::from_slice(&row.row_version).map_err(|e| {
            StoreError::Corrupt(format!("department {}: {}", row.department_id, e))
        })?;

        Ok(Department {
            id: row.department_id,
            name: row.name,
            budget: Money::from_cents(row.budget_cents),
            start_date: row.start_date,
            instructor_id: row.instructor_id,
            row_version,
        })
    }
}

/// Department row for listings, with the administrator's name
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DepartmentSummary {
    pub department: Department,
    pub administrator: Option<String>,
}

#[derive(Debug, sqlx::FromRow)]
struct DepartmentSummaryRow {
    #[sqlx(flatten)]
    department: DepartmentRow,
    administrator_last_name: Option<String>,
    administrator_first_mid_name: Option<String>,
}

impl TryFrom<DepartmentSummaryRow> for DepartmentSummary {
    type Error = StoreError;

    fn try_from(row: DepartmentSummaryRow) -> std::result::Result<Self, Self::Error> {
        let administrator = match (row.administrator_last_name, row.administrator_first_mid_name) {
            (Some(last), Some(first)) => Some(format!("{}, {}", last, first)),
            _ => None,
        };
        Ok(DepartmentSummary {
            department: Department::try_from(row.department)?,
            administrator,
        })
    }
}

/// Department repository
pub struct DepartmentRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> DepartmentRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Fetch a single department
    pub async fn find(&self, id: i64) -> std::result::Result<Option<Department>, StoreError> {
        let row = sqlx::query_as::<_, DepartmentRow>(
            r#"
            SELECT department_id, name, budget_cents, start_date, instructor_id, row_version
            FROM departments
            WHERE department_id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(Department::try_from).transpose()
    }

    /// Zero rows were touched: tell a stale token apart from a missing row
    async fn disambiguate<T>(
        &self,
        id: i64,
    ) -> std::result::Result<Conditional<T, DepartmentField>, StoreError> {
        Ok(match self.find(id).await? {
            Some(current) => Conditional::Conflict(current.to_record()),
            None => Conditional::NotFound,
        })
    }
}

fn bind_value<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    field: DepartmentField,
    value: &FieldValue,
) -> std::result::Result<Query<'q, Sqlite, SqliteArguments<'q>>, StoreError> {
    if value.kind() != field.kind() {
        return Err(StoreError::Corrupt(format!(
            "{} cannot hold a {:?} value",
            field.name(),
            value.kind()
        )));
    }

    Ok(match value {
        FieldValue::Text(text) => query.bind(text.clone()),
        FieldValue::Date(date) => query.bind(*date),
        FieldValue::Money(amount) => query.bind(amount.cents()),
        FieldValue::Reference(id) => query.bind(*id),
    })
}

/// An administrator removed after the reference check trips the foreign key
fn reject_dangling_reference(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
            StoreError::Rejected(vec![ValidationIssue::new(
                DepartmentField::InstructorId.name(),
                "does not refer to an existing instructor",
            )])
        }
        _ => StoreError::Database(err),
    }
}

#[async_trait]
impl VersionedStore for DepartmentRepository<'_> {
    type Field = DepartmentField;

    async fn get(&self, id: i64) -> std::result::Result<Option<Record<DepartmentField>>, StoreError> {
        Ok(self.find(id).await?.map(|d| d.to_record()))
    }

    async fn insert(
        &self,
        values: &FieldEdits<DepartmentField>,
    ) -> std::result::Result<Record<DepartmentField>, StoreError> {
        // Every field but the optional administrator is required
        let required = DepartmentField::all()
            .iter()
            .filter(|f| f.kind() != FieldKind::Reference);
        for field in required {
            if !values.contains_key(field) {
                return Err(StoreError::Corrupt(format!(
                    "new department is missing {}",
                    field.name()
                )));
            }
        }

        let token = VersionToken::generate();
        let columns: Vec<&str> = values.keys().map(|f| f.column()).collect();
        let placeholders = vec!["?"; columns.len() + 1].join(", ");
        let sql = format!(
            "INSERT INTO departments ({}, row_version) VALUES ({})",
            columns.join(", "),
            placeholders
        );

        let mut query = sqlx::query(&sql);
        for (field, value) in values {
            query = bind_value(query, *field, value)?;
        }
        let result = query
            .bind(token.as_bytes().to_vec())
            .execute(self.pool)
            .await
            .map_err(reject_dangling_reference)?;

        let id = result.last_insert_rowid();
        tracing::debug!(id = id, version = %token, "Inserted department");

        self.get(id)
            .await?
            .ok_or_else(|| StoreError::Corrupt(format!("department {} vanished after insert", id)))
    }

    async fn try_conditional_write(
        &self,
        id: i64,
        expected: VersionToken,
        values: &FieldEdits<DepartmentField>,
    ) -> std::result::Result<ConditionalWrite<DepartmentField>, StoreError> {
        let token = VersionToken::successor_of(expected);

        // Build dynamic update; the token check and the write are one statement
        let mut set_clauses: Vec<String> = values
            .keys()
            .map(|f| format!("{} = ?", f.column()))
            .collect();
        set_clauses.push("row_version = ?".to_string());

        let sql = format!(
            "UPDATE departments SET {} WHERE department_id = ? AND row_version = ?",
            set_clauses.join(", ")
        );

        let mut query = sqlx::query(&sql);
        for (field, value) in values {
            query = bind_value(query, *field, value)?;
        }
        let result = query
            .bind(token.as_bytes().to_vec())
            .bind(id)
            .bind(expected.as_bytes().to_vec())
            .execute(self.pool)
            .await
            .map_err(reject_dangling_reference)?;

        if result.rows_affected() == 1 {
            return Ok(Conditional::Applied(token));
        }
        self.disambiguate(id).await
    }

    async fn try_conditional_delete(
        &self,
        id: i64,
        expected: VersionToken,
    ) -> std::result::Result<ConditionalDelete<DepartmentField>, StoreError> {
        let result = sqlx::query(
            r#"
            DELETE FROM departments
            WHERE department_id = ? AND row_version = ?
            "#,
        )
        .bind(id)
        .bind(expected.as_bytes().to_vec())
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(Conditional::Applied(()));
        }
        self.disambiguate(id).await
    }
}

/// Departments ordered by name, with their administrators
#[async_trait]
impl PageSource<DepartmentSummary> for DepartmentRepository<'_> {
    async fn count(&self) -> Result<u64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM departments")
            .fetch_one(self.pool)
            .await?;

        Ok(count.max(0) as u64)
    }

    async fn slice(&self, offset: u64, limit: u64) -> Result<Vec<DepartmentSummary>> {
        let rows = sqlx::query_as::<_, DepartmentSummaryRow>(
            r#"
            SELECT d.department_id, d.name, d.budget_cents, d.start_date, d.instructor_id,
                   d.row_version,
                   i.last_name AS administrator_last_name,
                   i.first_mid_name AS administrator_first_mid_name
            FROM departments d
            LEFT JOIN instructors i ON i.instructor_id = d.instructor_id
            ORDER BY d.name, d.department_id
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .bind(i64::try_from(offset).unwrap_or(i64::MAX))
        .fetch_all(self.pool)
        .await?;

        let summaries = rows
            .into_iter()
            .map(DepartmentSummary::try_from)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(summaries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{test_pool, InstructorRepository, NewInstructor};
    use crate::pagination::{Page, PageSize};

    fn english() -> NewDepartment {
        NewDepartment {
            name: "English".to_string(),
            budget: Money::from_units(350_000),
            start_date: NaiveDate::from_ymd_opt(2007, 9, 1).unwrap(),
            instructor_id: None,
        }
    }

    fn budget(units: i64) -> FieldEdits<DepartmentField> {
        let mut edits = FieldEdits::new();
        edits.insert(DepartmentField::Budget, FieldValue::Money(Money::from_units(units)));
        edits
    }

    #[test]
    fn test_field_checks() {
        let name = |s: &str| DepartmentField::Name.validate(&FieldValue::Text(s.to_string()));
        assert!(name("Art").is_ok());
        assert!(name("  Ar  ").is_err());
        assert!(name(&"x".repeat(51)).is_err());
        assert!(DepartmentField::Budget
            .validate(&FieldValue::Money(Money::from_cents(-1)))
            .is_err());
        assert!(DepartmentField::StartDate
            .validate(&FieldValue::Text("2007-09-01".to_string()))
            .is_err());
    }

    #[test]
    fn test_record_conversion() {
        let department = Department {
            id: 4,
            name: "Economics".to_string(),
            budget: Money::from_units(100_000),
            start_date: NaiveDate::from_ymd_opt(2007, 9, 1).unwrap(),
            instructor_id: Some(2),
            row_version: VersionToken::generate(),
        };
        let record = department.to_record();
        assert_eq!(Department::try_from(&record).unwrap(), department);

        let empty = Record::placeholder(4);
        assert!(matches!(Department::try_from(&empty), Err(AppError::Internal(_))));
    }

    #[tokio::test]
    async fn test_insert_and_conditional_write() {
        let pool = test_pool().await;
        let repo = DepartmentRepository::new(&pool);

        let created = repo.insert(&english().values()).await.unwrap();
        assert_ne!(created.version, VersionToken::ZERO);

        let outcome = repo
            .try_conditional_write(created.id, created.version, &budget(200))
            .await
            .unwrap();
        let token = match outcome {
            Conditional::Applied(token) => token,
            other => panic!("expected applied, got {:?}", other),
        };
        assert_ne!(token, created.version);

        let stored = repo.find(created.id).await.unwrap().unwrap();
        assert_eq!(stored.row_version, token);
        assert_eq!(stored.budget, Money::from_units(200));
        assert_eq!(stored.name, "English");
    }

    #[tokio::test]
    async fn test_stale_token_returns_current_snapshot() {
        let pool = test_pool().await;
        let repo = DepartmentRepository::new(&pool);
        let created = repo.insert(&english().values()).await.unwrap();

        repo.try_conditional_write(created.id, created.version, &budget(200))
            .await
            .unwrap();
        let stale = repo
            .try_conditional_write(created.id, created.version, &budget(300))
            .await
            .unwrap();

        match stale {
            Conditional::Conflict(current) => {
                assert_eq!(
                    current.get(DepartmentField::Budget),
                    Some(&FieldValue::Money(Money::from_units(200)))
                );
            }
            other => panic!("expected conflict, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_delete_then_write_is_not_found() {
        let pool = test_pool().await;
        let repo = DepartmentRepository::new(&pool);
        let created = repo.insert(&english().values()).await.unwrap();

        assert_eq!(
            repo.try_conditional_delete(created.id, VersionToken::generate())
                .await
                .unwrap(),
            Conditional::Conflict(created.clone())
        );
        assert_eq!(
            repo.try_conditional_delete(created.id, created.version)
                .await
                .unwrap(),
            Conditional::Applied(())
        );
        assert_eq!(
            repo.try_conditional_write(created.id, created.version, &budget(1))
                .await
                .unwrap(),
            Conditional::NotFound
        );
    }

    #[tokio::test]
    async fn test_insert_requires_all_but_administrator() {
        let pool = test_pool().await;
        let repo = DepartmentRepository::new(&pool);

        let mut values = english().values();
        values.remove(&DepartmentField::InstructorId);
        assert!(repo.insert(&values).await.is_ok());

        values.remove(&DepartmentField::StartDate);
        assert!(matches!(repo.insert(&values).await, Err(StoreError::Corrupt(m)) if m.contains("StartDate")));
    }

    #[tokio::test]
    async fn test_unknown_administrator_is_rejected() {
        let pool = test_pool().await;
        let repo = DepartmentRepository::new(&pool);

        let mut dangling = english();
        dangling.instructor_id = Some(9999);
        match repo.insert(&dangling.values()).await {
            Err(StoreError::Rejected(issues)) => assert_eq!(issues[0].field, "InstructorID"),
            other => panic!("expected rejection, got {:?}", other),
        }

        let created = repo.insert(&english().values()).await.unwrap();
        let mut edits = FieldEdits::new();
        edits.insert(DepartmentField::InstructorId, FieldValue::Reference(Some(9999)));
        assert!(matches!(
            repo.try_conditional_write(created.id, created.version, &edits).await,
            Err(StoreError::Rejected(_))
        ));
        assert_eq!(repo.find(created.id).await.unwrap().unwrap().row_version, created.version);
    }

    #[tokio::test]
    async fn test_corrupt_row_version() {
        let pool = test_pool().await;
        let repo = DepartmentRepository::new(&pool);
        let created = repo.insert(&english().values()).await.unwrap();

        sqlx::query("UPDATE departments SET row_version = x'0102' WHERE department_id = ?")
            .bind(created.id)
            .execute(&pool)
            .await
            .unwrap();

        assert!(matches!(repo.find(created.id).await, Err(StoreError::Corrupt(_))));
    }

    #[tokio::test]
    async fn test_listing_orders_by_name_with_administrator() {
        let pool = test_pool().await;
        let instructors = InstructorRepository::new(&pool);
        let kim = instructors
            .create(&NewInstructor {
                last_name: "Abercrombie".to_string(),
                first_mid_name: "Kim".to_string(),
                hire_date: NaiveDate::from_ymd_opt(1995, 3, 11).unwrap(),
            })
            .await
            .unwrap();

        let repo = DepartmentRepository::new(&pool);
        for name in ["Mathematics", "Economics", "English"] {
            let mut department = english();
            department.name = name.to_string();
            if name == "Economics" {
                department.instructor_id = Some(kim.id);
            }
            repo.insert(&department.values()).await.unwrap();
        }

        let page = Page::create(&repo, Some(1), PageSize::new(2).unwrap())
            .await
            .unwrap();
        let names: Vec<_> = page.items().iter().map(|s| s.department.name.as_str()).collect();
        assert_eq!(names, vec!["Economics", "English"]);
        assert_eq!(page.items()[0].administrator.as_deref(), Some("Abercrombie, Kim"));
        assert_eq!(page.items()[1].administrator, None);
        assert!(page.has_next());
    }
}
