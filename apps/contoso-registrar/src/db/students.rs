//! Student database operations

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::error::{AppError, Result, ValidationIssue};
use crate::pagination::PageSource;

/// Student record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Student {
    #[sqlx(rename = "student_id")]
    pub id: i64,
    pub last_name: String,
    pub first_mid_name: String,
    pub enrollment_date: NaiveDate,
}

/// New student request
#[derive(Debug, Clone, Deserialize)]
pub struct NewStudent {
    pub last_name: String,
    pub first_mid_name: String,
    pub enrollment_date: NaiveDate,
}

impl NewStudent {
    pub fn validate(&self) -> Result<()> {
        let mut issues = Vec::new();
        for (field, value) in [("LastName", &self.last_name), ("FirstMidName", &self.first_mid_name)] {
            let len = value.trim().chars().count();
            if !(1..=50).contains(&len) {
                issues.push(ValidationIssue::new(field, "must be between 1 and 50 characters"));
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(AppError::ValidationRejected(issues))
        }
    }
}

/// Student list ordering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StudentSort {
    #[default]
    LastNameAsc,
    LastNameDesc,
    EnrollmentAsc,
    EnrollmentDesc,
}

impl StudentSort {
    /// Parse the `sort_order` request parameter; unknown values sort by last name
    pub fn from_param(param: &str) -> Self {
        match param {
            "name_desc" => StudentSort::LastNameDesc,
            "Date" => StudentSort::EnrollmentAsc,
            "date_desc" => StudentSort::EnrollmentDesc,
            _ => StudentSort::LastNameAsc,
        }
    }

    pub fn as_param(self) -> &'static str {
        match self {
            StudentSort::LastNameAsc => "",
            StudentSort::LastNameDesc => "name_desc",
            StudentSort::EnrollmentAsc => "Date",
            StudentSort::EnrollmentDesc => "date_desc",
        }
    }

    fn order_by(self) -> &'static str {
        match self {
            StudentSort::LastNameAsc => "last_name ASC, student_id ASC",
            StudentSort::LastNameDesc => "last_name DESC, student_id ASC",
            StudentSort::EnrollmentAsc => "enrollment_date ASC, student_id ASC",
            StudentSort::EnrollmentDesc => "enrollment_date DESC, student_id ASC",
        }
    }
}

/// Filter and order for a student listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StudentQuery {
    /// Substring of the last name or first/middle name
    pub filter: Option<String>,
    pub sort: StudentSort,
}

impl StudentQuery {
    fn like_pattern(&self) -> Option<String> {
        self.filter
            .as_deref()
            .filter(|f| !f.is_empty())
            .map(|f| format!("%{}%", escape_like(f)))
    }
}

fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Student repository
pub struct StudentRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> StudentRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, id: i64) -> Result<Option<Student>> {
        let student = sqlx::query_as::<_, Student>(
            r#"
            SELECT student_id, last_name, first_mid_name, enrollment_date
            FROM students
            WHERE student_id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(student)
    }

    pub async fn create(&self, new: &NewStudent) -> Result<Student> {
        new.validate()?;

        let result = sqlx::query(
            r#"
            INSERT INTO students (last_name, first_mid_name, enrollment_date)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(&new.last_name)
        .bind(&new.first_mid_name)
        .bind(new.enrollment_date)
        .execute(self.pool)
        .await?;

        Ok(Student {
            id: result.last_insert_rowid(),
            last_name: new.last_name.clone(),
            first_mid_name: new.first_mid_name.clone(),
            enrollment_date: new.enrollment_date,
        })
    }

    /// Replace a student's names and enrollment date
    pub async fn update(&self, id: i64, changes: &NewStudent) -> Result<Student> {
        changes.validate()?;

        let result = sqlx::query(
            r#"
            UPDATE students
            SET last_name = ?, first_mid_name = ?, enrollment_date = ?
            WHERE student_id = ?
            "#,
        )
        .bind(&changes.last_name)
        .bind(&changes.first_mid_name)
        .bind(changes.enrollment_date)
        .bind(id)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Student not found: {}", id)));
        }

        tracing::debug!(id = id, "Updated student");
        Ok(Student {
            id,
            last_name: changes.last_name.clone(),
            first_mid_name: changes.first_mid_name.clone(),
            enrollment_date: changes.enrollment_date,
        })
    }

    /// Delete a student. Reads first; a missing student is left alone and
    /// reported as `false`.
    pub async fn delete(&self, id: i64) -> Result<bool> {
        if self.get(id).await?.is_none() {
            return Ok(false);
        }

        let result = sqlx::query("DELETE FROM students WHERE student_id = ?")
            .bind(id)
            .execute(self.pool)
            .await?;

        tracing::debug!(id = id, "Deleted student");
        Ok(result.rows_affected() > 0)
    }

    /// Filtered, ordered view over the students table
    pub fn listing(&self, query: StudentQuery) -> StudentListing<'a> {
        StudentListing {
            pool: self.pool,
            query,
        }
    }
}

/// Students matching a [`StudentQuery`], in its order
pub struct StudentListing<'a> {
    pool: &'a SqlitePool,
    query: StudentQuery,
}

const STUDENT_FILTER: &str =
    "(last_name LIKE ?1 ESCAPE '\\' OR first_mid_name LIKE ?1 ESCAPE '\\')";

#[async_trait]
impl PageSource<Student> for StudentListing<'_> {
    async fn count(&self) -> Result<u64> {
        let count: i64 = match self.query.like_pattern() {
            Some(pattern) => {
                let sql = format!("SELECT COUNT(*) FROM students WHERE {}", STUDENT_FILTER);
                sqlx::query_scalar(&sql)
                    .bind(pattern)
                    .fetch_one(self.pool)
                    .await?
            }
            None => {
                sqlx::query_scalar("SELECT COUNT(*) FROM students")
                    .fetch_one(self.pool)
                    .await?
            }
        };

        Ok(count.max(0) as u64)
    }

    async fn slice(&self, offset: u64, limit: u64) -> Result<Vec<Student>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let offset = i64::try_from(offset).unwrap_or(i64::MAX);
        let columns = "student_id, last_name, first_mid_name, enrollment_date";
        let order_by = self.query.sort.order_by();

        let students = match self.query.like_pattern() {
            Some(pattern) => {
                let sql = format!(
                    "SELECT {} FROM students WHERE {} ORDER BY {} LIMIT ?2 OFFSET ?3",
                    columns, STUDENT_FILTER, order_by
                );
                sqlx::query_as::<_, Student>(&sql)
                    .bind(pattern)
                    .bind(limit)
                    .bind(offset)
                    .fetch_all(self.pool)
                    .await?
            }
            None => {
                let sql = format!(
                    "SELECT {} FROM students ORDER BY {} LIMIT ? OFFSET ?",
                    columns, order_by
                );
                sqlx::query_as::<_, Student>(&sql)
                    .bind(limit)
                    .bind(offset)
                    .fetch_all(self.pool)
                    .await?
            }
        };

        Ok(students)
    }
}
