//! Demo data for an empty database

use chrono::NaiveDate;
use sqlx::SqlitePool;

use crate::concurrency::{Money, VersionedStore};
use crate::db::{DepartmentRepository, InstructorRepository, NewDepartment, NewInstructor, NewStudent, StudentRepository};
use crate::error::{AppError, Result};

const STUDENTS: &[(&str, &str, &str)] = &[
    ("Carson", "Alexander", "2005-09-01"),
    ("Meredith", "Alonso", "2002-09-01"),
    ("Arturo", "Anand", "2003-09-01"),
    ("Gytis", "Barzdukas", "2002-09-01"),
    ("Yan", "Li", "2002-09-01"),
    ("Peggy", "Justice", "2001-09-01"),
    ("Laura", "Norman", "2003-09-01"),
    ("Nino", "Olivetto", "2005-09-01"),
];

const INSTRUCTORS: &[(&str, &str, &str)] = &[
    ("Kim", "Abercrombie", "1995-03-11"),
    ("Fadi", "Fakhouri", "2002-07-06"),
    ("Roger", "Harui", "1998-07-01"),
    ("Candace", "Kapoor", "2001-01-15"),
    ("Roger", "Zheng", "2004-02-12"),
];

/// Name, budget in whole units, start date, administrator's last name
const DEPARTMENTS: &[(&str, i64, &str, &str)] = &[
    ("English", 350_000, "2007-09-01", "Abercrombie"),
    ("Mathematics", 100_000, "2007-09-01", "Fakhouri"),
    ("Engineering", 350_000, "2007-09-01", "Harui"),
    ("Economics", 100_000, "2007-09-01", "Kapoor"),
];

fn date(text: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .map_err(|e| AppError::Internal(format!("bad seed date {}: {}", text, e)))
}

async fn row_count(pool: &SqlitePool, table: &str) -> Result<i64> {
    let (count,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {}", table))
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Insert demo rows into each of students, instructors and departments that
/// is still empty, so a run interrupted part way is completed by the next.
/// Returns whether anything was inserted.
pub async fn seed_demo_data(pool: &SqlitePool) -> Result<bool> {
    let mut seeded = false;

    if row_count(pool, "students").await? == 0 {
        let students = StudentRepository::new(pool);
        for (first, last, enrolled) in STUDENTS {
            students
                .create(&NewStudent {
                    last_name: last.to_string(),
                    first_mid_name: first.to_string(),
                    enrollment_date: date(enrolled)?,
                })
                .await?;
        }
        tracing::info!(count = STUDENTS.len(), "Seeded students");
        seeded = true;
    }

    let instructors = InstructorRepository::new(pool);
    if row_count(pool, "instructors").await? == 0 {
        for (first, last, hired) in INSTRUCTORS {
            instructors
                .create(&NewInstructor {
                    last_name: last.to_string(),
                    first_mid_name: first.to_string(),
                    hire_date: date(hired)?,
                })
                .await?;
        }
        tracing::info!(count = INSTRUCTORS.len(), "Seeded instructors");
        seeded = true;
    }

    if row_count(pool, "departments").await? == 0 {
        let administrators = instructors.list().await?;
        let departments = DepartmentRepository::new(pool);
        for (name, budget, started, administrator) in DEPARTMENTS {
            let instructor_id = administrators
                .iter()
                .find(|i| i.last_name == *administrator)
                .map(|i| i.id);
            let department = NewDepartment {
                name: name.to_string(),
                budget: Money::from_units(*budget),
                start_date: date(started)?,
                instructor_id,
            };
            departments.insert(&department.values()).await?;
        }
        tracing::info!(count = DEPARTMENTS.len(), "Seeded departments");
        seeded = true;
    }

    if !seeded {
        tracing::debug!("Database already seeded");
    }
    Ok(seeded)
}
