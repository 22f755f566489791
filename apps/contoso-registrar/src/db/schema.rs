//! Database schema initialization

use sqlx::SqlitePool;

use crate::error::Result;

/// Initialize the database schema
pub async fn initialize_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(SCHEMA_SQL).execute(pool).await?;

    Ok(())
}

const SCHEMA_SQL: &str = r#"
-- Instructors (department administrators)
CREATE TABLE IF NOT EXISTS instructors (
    instructor_id INTEGER PRIMARY KEY AUTOINCREMENT,
    last_name TEXT NOT NULL,
    first_mid_name TEXT NOT NULL,
    hire_date TEXT NOT NULL
);

-- Departments carry an 8-byte row version replaced on every write
CREATE TABLE IF NOT EXISTS departments (
    department_id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    budget_cents INTEGER NOT NULL,
    start_date TEXT NOT NULL,
    instructor_id INTEGER REFERENCES instructors(instructor_id),
    row_version BLOB NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_departments_name ON departments(name);

-- Students
CREATE TABLE IF NOT EXISTS students (
    student_id INTEGER PRIMARY KEY AUTOINCREMENT,
    last_name TEXT NOT NULL,
    first_mid_name TEXT NOT NULL,
    enrollment_date TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_students_last_name ON students(last_name);
CREATE INDEX IF NOT EXISTS idx_students_enrollment_date ON students(enrollment_date);
"#;
