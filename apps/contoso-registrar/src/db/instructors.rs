//! Instructor database operations

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::concurrency::ReferenceLabels;
use crate::error::Result;

/// Instructor record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Instructor {
    #[sqlx(rename = "instructor_id")]
    pub id: i64,
    pub last_name: String,
    pub first_mid_name: String,
    pub hire_date: NaiveDate,
}

impl Instructor {
    /// "Last, First Middle"
    pub fn full_name(&self) -> String {
        format!("{}, {}", self.last_name, self.first_mid_name)
    }
}

/// New instructor request
#[derive(Debug, Clone, Deserialize)]
pub struct NewInstructor {
    pub last_name: String,
    pub first_mid_name: String,
    pub hire_date: NaiveDate,
}

/// Lookup of referenced records by id
///
/// Used to check that a reference points at something before writing it, and
/// to render references by name in conflict reports.
#[async_trait]
pub trait ReferenceDirectory: Send + Sync {
    async fn exists(&self, id: i64) -> Result<bool>;

    /// Display labels for the given ids; unknown ids are left out
    async fn labels(&self, ids: &[i64]) -> Result<ReferenceLabels>;
}

/// Instructor repository
pub struct InstructorRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> InstructorRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, id: i64) -> Result<Option<Instructor>> {
        let instructor = sqlx::query_as::<_, Instructor>(
            r#"
            SELECT instructor_id, last_name, first_mid_name, hire_date
            FROM instructors
            WHERE instructor_id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(instructor)
    }

    /// All instructors ordered by last name
    pub async fn list(&self) -> Result<Vec<Instructor>> {
        let instructors = sqlx::query_as::<_, Instructor>(
            r#"
            SELECT instructor_id, last_name, first_mid_name, hire_date
            FROM instructors
            ORDER BY last_name, first_mid_name, instructor_id
            "#,
        )
        .fetch_all(self.pool)
        .await?;

        Ok(instructors)
    }

    pub async fn create(&self, new: &NewInstructor) -> Result<Instructor> {
        let result = sqlx::query(
            r#"
            INSERT INTO instructors (last_name, first_mid_name, hire_date)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(&new.last_name)
        .bind(&new.first_mid_name)
        .bind(new.hire_date)
        .execute(self.pool)
        .await?;

        Ok(Instructor {
            id: result.last_insert_rowid(),
            last_name: new.last_name.clone(),
            first_mid_name: new.first_mid_name.clone(),
            hire_date: new.hire_date,
        })
    }
}

#[async_trait]
impl ReferenceDirectory for InstructorRepository<'_> {
    async fn exists(&self, id: i64) -> Result<bool> {
        Ok(self.get(id).await?.is_some())
    }

    async fn labels(&self, ids: &[i64]) -> Result<ReferenceLabels> {
        if ids.is_empty() {
            return Ok(ReferenceLabels::new());
        }

        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!(
            "SELECT instructor_id, last_name, first_mid_name, hire_date FROM instructors WHERE instructor_id IN ({})",
            placeholders
        );

        let mut query = sqlx::query_as::<_, Instructor>(&sql);
        for id in ids {
            query = query.bind(id);
        }
        let instructors = query.fetch_all(self.pool).await?;

        Ok(instructors.iter().map(|i| (i.id, i.full_name())).collect())
    }
}

#[async_trait]
impl ReferenceDirectory for ReferenceLabels {
    async fn exists(&self, id: i64) -> Result<bool> {
        Ok(self.get(id).is_some())
    }

    async fn labels(&self, ids: &[i64]) -> Result<ReferenceLabels> {
        Ok(ids
            .iter()
            .filter_map(|id| self.get(*id).map(|label| (*id, label.to_string())))
            .collect())
    }
}
