//! Conflict reports shown to the user before a retry

use serde::Serialize;

use super::record::RecordField;

/// Record-level message attached to every conflict report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Advisory {
    /// The record changed after the caller read it; resubmitting overwrites
    ConcurrentlyModified,
    /// The record is gone; the caller should return to the listing
    DeletedByAnother,
    /// A delete hit a newer version; deleting again confirms
    DeleteAfterModification,
}

impl Advisory {
    pub fn message(self) -> &'static str {
        match self {
            Advisory::ConcurrentlyModified => {
                "The record you attempted to edit was modified by another user after you \
                 got the original value. The edit operation was canceled and the current \
                 values have been displayed. If you still want to edit this record, save \
                 again and your values will overwrite the ones shown. Otherwise go back to \
                 the list."
            }
            Advisory::DeletedByAnother => {
                "Unable to save changes. The record was deleted by another user."
            }
            Advisory::DeleteAfterModification => {
                "The record you attempted to delete was modified by another user after you \
                 got the original values. The delete operation was canceled and the current \
                 values have been displayed. If you still want to delete this record, delete \
                 it again. Otherwise go back to the list."
            }
        }
    }

    /// Whether resubmitting can succeed
    pub fn is_retryable(self) -> bool {
        !matches!(self, Advisory::DeletedByAnother)
    }
}

/// A field whose stored value differs from what the caller submitted
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldDiscrepancy<F> {
    pub field: F,
    /// Stored value, formatted for display
    pub current_value: String,
}

impl<F: RecordField> FieldDiscrepancy<F> {
    pub fn message(&self) -> String {
        format!("Current value: {}", self.current_value)
    }
}

/// Field-by-field description of how a stale view differs from the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConflictReport<F> {
    discrepancies: Vec<FieldDiscrepancy<F>>,
    advisory: Advisory,
}

impl<F: RecordField> ConflictReport<F> {
    pub fn new(advisory: Advisory) -> Self {
        Self {
            discrepancies: Vec::new(),
            advisory,
        }
    }

    pub fn push(&mut self, field: F, current_value: String) {
        self.discrepancies.push(FieldDiscrepancy {
            field,
            current_value,
        });
    }

    pub fn discrepancies(&self) -> &[FieldDiscrepancy<F>] {
        &self.discrepancies
    }

    pub fn discrepancy(&self, field: F) -> Option<&FieldDiscrepancy<F>> {
        self.discrepancies.iter().find(|d| d.field == field)
    }

    pub fn advisory(&self) -> Advisory {
        self.advisory
    }

    /// Flattened `(field name, message)` pairs; the advisory has no field
    /// name and comes last.
    pub fn entries(&self) -> Vec<(Option<&'static str>, String)> {
        self.discrepancies
            .iter()
            .map(|d| (Some(d.field.name()), d.message()))
            .chain(std::iter::once((None, self.advisory.message().to_string())))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::concurrency::record::tests::Widget;

    #[test]
    fn test_entries_put_advisory_last() {
        let mut report = ConflictReport::new(Advisory::ConcurrentlyModified);
        report.push(Widget::Title, "B".to_string());
        report.push(Widget::Cost, "$100.00".to_string());

        let entries = report.entries();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0], (Some("Title"), "Current value: B".to_string()));
        assert_eq!(entries[1], (Some("Cost"), "Current value: $100.00".to_string()));
        assert_eq!(entries[2].0, None);
        assert!(entries[2].1.contains("modified by another user"));
    }

    #[test]
    fn test_deleted_advisory_is_terminal() {
        assert!(!Advisory::DeletedByAnother.is_retryable());
        assert!(Advisory::ConcurrentlyModified.is_retryable());
        assert!(Advisory::DeleteAfterModification.is_retryable());
    }
}
