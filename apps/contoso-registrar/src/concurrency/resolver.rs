//! Conflict resolution
//!
//! Turns a rejected conditional write into a per-field report and a record
//! the caller can resubmit.

use serde::Serialize;

use super::record::{EditIntent, Record, RecordField, ReferenceLabels};
use super::report::{Advisory, ConflictReport};
use crate::config::DisplayConfig;

/// Builds conflict reports using the configured display conventions
#[derive(Debug, Clone, Default)]
pub struct ConflictResolver {
    display: DisplayConfig,
}

/// Report plus the record to show for a retry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution<F: RecordField> {
    pub report: ConflictReport<F>,
    /// Current identity and version with the caller's edits on top. A
    /// field-less placeholder when the record was deleted.
    pub merged: Record<F>,
}

impl<F: RecordField> Resolution<F> {
    /// Whether resubmitting `merged` can succeed
    pub fn is_retryable(&self) -> bool {
        self.report.advisory().is_retryable()
    }
}

impl ConflictResolver {
    pub fn new(display: DisplayConfig) -> Self {
        Self { display }
    }

    /// Compare what the caller submitted with what the store holds now.
    ///
    /// Only fields in the intent's edit set are compared, so a concurrent
    /// change to a field the caller left alone never shows up. `current` is
    /// `None` when the record was deleted; the report then carries the
    /// deletion advisory alone.
    pub fn resolve<F: RecordField>(
        &self,
        intent: &EditIntent<F>,
        client: &Record<F>,
        current: Option<&Record<F>>,
        labels: &ReferenceLabels,
    ) -> Resolution<F> {
        let Some(current) = current else {
            return Resolution {
                report: ConflictReport::new(Advisory::DeletedByAnother),
                merged: Record::placeholder(client.id),
            };
        };

        let mut report = ConflictReport::new(Advisory::ConcurrentlyModified);
        for field in intent.edits().keys().copied() {
            let submitted = client.get(field);
            let stored = current.get(field);
            let differs = match (submitted, stored) {
                (Some(a), Some(b)) => !a.matches(b),
                (None, None) => false,
                _ => true,
            };
            if differs {
                let shown = stored
                    .map(|v| v.display(&self.display, labels))
                    .unwrap_or_default();
                report.push(field, shown);
            }
        }

        // Caller's submitted values for the edited fields, everything else
        // and the version from the store.
        let mut merged = current.clone();
        for field in intent.edits().keys().copied() {
            if let Some(value) = client.get(field) {
                merged.set(field, value.clone());
            }
        }

        Resolution { report, merged }
    }
}
