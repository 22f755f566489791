//! Contoso Registrar
//!
//! Department, instructor and student records over SQLite. Department edits
//! and deletes use optimistic concurrency on a per-row version token; lost
//! races come back as field-level conflict reports. Listings are served in
//! offset pages.

pub mod concurrency;
pub mod config;
pub mod db;
pub mod departments;
pub mod error;
pub mod pagination;
pub mod seed;
pub mod students;

pub use config::Config;
pub use departments::{DeleteOutcome, DepartmentService, EditOutcome};
pub use error::{AppError, Result};
pub use pagination::{Page, PageSize, PageSource};
pub use students::{list_students, StudentListRequest, StudentListView};
