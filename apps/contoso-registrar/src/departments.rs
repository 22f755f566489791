//! Department edit and delete flows
//!
//! Request handlers call into [`DepartmentService`] with the version token
//! they rendered the form with. A lost race never surfaces as an error:
//! edits come back with a conflict report and a merged record to resubmit,
//! deletes come back with the current values to confirm against.

use serde::Serialize;

use crate::concurrency::{
    validate_fields, Advisory, Conditional, ConflictReport, ConflictResolver, EditIntent,
    FieldEdits, FieldValue, Record, RecordField, ReferenceLabels, VersionToken,
    VersionedRecordStore, VersionedStore,
};
use crate::config::DisplayConfig;
use crate::db::{
    Department, DepartmentField, DepartmentSummary, NewDepartment, ReferenceDirectory,
};
use crate::error::{AppError, Result, ValidationIssue};
use crate::pagination::{Page, PageSize, PageSource};

/// Result of an edit attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "data", rename_all = "snake_case")]
pub enum EditOutcome {
    /// Saved; the form should carry the new token from now on
    Success(VersionToken),
    /// Someone else saved first. Resubmitting `merged` overwrites their values.
    NeedsMerge {
        report: ConflictReport<DepartmentField>,
        merged: Record<DepartmentField>,
    },
    /// The department was deleted; the only way forward is the listing
    Deleted { report: ConflictReport<DepartmentField> },
}

/// Result of a delete attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "data", rename_all = "snake_case")]
pub enum DeleteOutcome {
    Success,
    /// The department changed since it was shown; deleting again with
    /// `current.row_version` confirms.
    NeedsConfirmationRetry {
        current: Department,
        message: &'static str,
    },
    /// Nothing left to delete
    AlreadyGone,
}

/// Department operations for request handlers
pub struct DepartmentService<S, D> {
    store: VersionedRecordStore<S>,
    directory: D,
    resolver: ConflictResolver,
}

impl<S, D> DepartmentService<S, D>
where
    S: VersionedStore<Field = DepartmentField>,
    D: ReferenceDirectory,
{
    pub fn new(backing: S, directory: D, display: DisplayConfig) -> Self {
        Self {
            store: VersionedRecordStore::new(backing),
            directory,
            resolver: ConflictResolver::new(display),
        }
    }

    /// Department with its administrator's name
    pub async fn details(&self, id: i64) -> Result<DepartmentSummary> {
        let record = self.store.read(id).await?;
        let department = Department::try_from(&record)?;
        let administrator = match department.instructor_id {
            Some(instructor_id) => self
                .directory
                .labels(&[instructor_id])
                .await?
                .get(instructor_id)
                .map(str::to_string),
            None => None,
        };

        Ok(DepartmentSummary {
            department,
            administrator,
        })
    }

    pub async fn create(&self, new: &NewDepartment) -> Result<Department> {
        let values = new.values();
        validate_fields(&values)?;
        self.check_references(&values).await?;

        let record = self.store.create(&values).await?;
        Department::try_from(&record)
    }

    /// Save `edits` if the department still carries `token`
    pub async fn attempt_edit(
        &self,
        id: i64,
        token: VersionToken,
        edits: FieldEdits<DepartmentField>,
    ) -> Result<EditOutcome> {
        let intent = EditIntent::new(token, edits);
        intent.validate()?;
        self.check_references(intent.edits()).await?;

        match self.store.conditional_update(id, &intent).await? {
            Conditional::Applied(new_token) => {
                tracing::info!(id = id, version = %new_token, "Department updated");
                Ok(EditOutcome::Success(new_token))
            }
            Conditional::Conflict(current) => {
                let submitted = Record::new(id, token).overlay(intent.edits());
                let ids: Vec<i64> = current.references().collect();
                let labels = self.directory.labels(&ids).await?;

                let resolution = self
                    .resolver
                    .resolve(&intent, &submitted, Some(&current), &labels);
                tracing::debug!(
                    id = id,
                    fields = resolution.report.discrepancies().len(),
                    "Department edit needs merge"
                );
                Ok(EditOutcome::NeedsMerge {
                    report: resolution.report,
                    merged: resolution.merged,
                })
            }
            Conditional::NotFound => {
                let submitted = Record::new(id, token).overlay(intent.edits());
                let resolution =
                    self.resolver
                        .resolve(&intent, &submitted, None, &ReferenceLabels::new());
                Ok(EditOutcome::Deleted {
                    report: resolution.report,
                })
            }
        }
    }

    /// Delete the department if it still carries `token`
    pub async fn attempt_delete(&self, id: i64, token: VersionToken) -> Result<DeleteOutcome> {
        match self.store.conditional_delete(id, token).await? {
            Conditional::Applied(()) => {
                tracing::info!(id = id, "Department deleted");
                Ok(DeleteOutcome::Success)
            }
            Conditional::Conflict(current) => Ok(DeleteOutcome::NeedsConfirmationRetry {
                current: Department::try_from(&current)?,
                message: Advisory::DeleteAfterModification.message(),
            }),
            Conditional::NotFound => Ok(DeleteOutcome::AlreadyGone),
        }
    }

    /// Administrators must exist; reading them is the only check made
    async fn check_references(&self, values: &FieldEdits<DepartmentField>) -> Result<()> {
        if let Some(FieldValue::Reference(Some(instructor_id))) =
            values.get(&DepartmentField::InstructorId)
        {
            if !self.directory.exists(*instructor_id).await? {
                return Err(AppError::ValidationRejected(vec![ValidationIssue::new(
                    DepartmentField::InstructorId.name(),
                    format!("no instructor with id {}", instructor_id),
                )]));
            }
        }
        Ok(())
    }
}

impl<S, D> DepartmentService<S, D>
where
    S: VersionedStore<Field = DepartmentField> + PageSource<DepartmentSummary>,
    D: ReferenceDirectory,
{
    /// Departments ordered by name
    pub async fn page(
        &self,
        page_index: Option<i64>,
        page_size: PageSize,
    ) -> Result<Page<DepartmentSummary>> {
        Page::create(self.store.backing(), page_index, page_size).await
    }
}
