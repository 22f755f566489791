//! Versioned record snapshots
//!
//! Records are plain values: a snapshot read from the store, or a snapshot
//! built from what a client submitted. Nothing here tracks changes; conflict
//! detection compares two snapshots explicitly.

use std::collections::{BTreeMap, HashMap};
use std::fmt::{Debug, Write};
use std::hash::Hash;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::money::Money;
use super::token::VersionToken;
use crate::config::DisplayConfig;
use crate::error::{AppError, Result, ValidationIssue};

/// Scalar kinds a record field can hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Text,
    Date,
    Money,
    Reference,
}

/// A single scalar field value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum FieldValue {
    Text(String),
    Date(NaiveDate),
    Money(Money),
    /// Id of another record, if set
    Reference(Option<i64>),
}

impl FieldValue {
    pub fn kind(&self) -> FieldKind {
        match self {
            FieldValue::Text(_) => FieldKind::Text,
            FieldValue::Date(_) => FieldKind::Date,
            FieldValue::Money(_) => FieldKind::Money,
            FieldValue::Reference(_) => FieldKind::Reference,
        }
    }

    /// Field-appropriate equality.
    ///
    /// Text and references compare exactly, dates by calendar day, money by
    /// whole cents. Values of different kinds never match.
    pub fn matches(&self, other: &FieldValue) -> bool {
        match (self, other) {
            (FieldValue::Text(a), FieldValue::Text(b)) => a == b,
            (FieldValue::Date(a), FieldValue::Date(b)) => a == b,
            (FieldValue::Money(a), FieldValue::Money(b)) => a.cents() == b.cents(),
            (FieldValue::Reference(a), FieldValue::Reference(b)) => a == b,
            _ => false,
        }
    }

    /// Render for display next to a form field
    pub fn display(&self, conventions: &DisplayConfig, labels: &ReferenceLabels) -> String {
        match self {
            FieldValue::Text(text) => text.clone(),
            FieldValue::Date(date) => {
                let mut shown = String::new();
                match write!(shown, "{}", date.format(&conventions.date_format)) {
                    Ok(()) => shown,
                    Err(_) => date.to_string(),
                }
            }
            FieldValue::Money(amount) => amount.format(&conventions.currency_symbol),
            FieldValue::Reference(Some(id)) => labels.get(*id).unwrap_or_default().to_string(),
            FieldValue::Reference(None) => String::new(),
        }
    }
}

/// Named field of a versioned entity
///
/// The derived `Ord` must follow declaration order: reports list fields in
/// that order.
pub trait RecordField: Copy + Ord + Eq + Hash + Debug + Send + Sync + 'static {
    /// Every field, in declaration order
    fn all() -> &'static [Self];

    /// Name shown to users and used as the report key
    fn name(self) -> &'static str;

    fn kind(self) -> FieldKind;

    /// Domain constraints beyond the value kind
    fn check(self, _value: &FieldValue) -> std::result::Result<(), String> {
        Ok(())
    }

    /// Kind check followed by [`RecordField::check`]
    fn validate(self, value: &FieldValue) -> std::result::Result<(), String> {
        if value.kind() != self.kind() {
            return Err(format!(
                "expected a {:?} value, got {:?}",
                self.kind(),
                value.kind()
            ));
        }
        self.check(value)
    }
}

/// Field values keyed by field, iterated in declaration order
pub type FieldEdits<F> = BTreeMap<F, FieldValue>;

/// Snapshot of a versioned entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Record<F: RecordField> {
    pub id: i64,
    pub version: VersionToken,
    fields: BTreeMap<F, FieldValue>,
}

impl<F: RecordField> Record<F> {
    pub fn new(id: i64, version: VersionToken) -> Self {
        Self {
            id,
            version,
            fields: BTreeMap::new(),
        }
    }

    /// Stand-in for a record that no longer exists
    pub fn placeholder(id: i64) -> Self {
        Self::new(id, VersionToken::ZERO)
    }

    pub fn with_field(mut self, field: F, value: FieldValue) -> Self {
        self.fields.insert(field, value);
        self
    }

    pub fn with_version(mut self, version: VersionToken) -> Self {
        self.version = version;
        self
    }

    pub fn get(&self, field: F) -> Option<&FieldValue> {
        self.fields.get(&field)
    }

    pub fn set(&mut self, field: F, value: FieldValue) {
        self.fields.insert(field, value);
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Copy of this record with `edits` layered on top
    pub fn overlay(&self, edits: &FieldEdits<F>) -> Self {
        let mut merged = self.clone();
        for (field, value) in edits {
            merged.fields.insert(*field, value.clone());
        }
        merged
    }

    /// Reference ids held by any field
    pub fn references(&self) -> impl Iterator<Item = i64> + '_ {
        self.fields.values().filter_map(|v| match v {
            FieldValue::Reference(Some(id)) => Some(*id),
            _ => None,
        })
    }
}

/// The caller's intended changes and the token it last read
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditIntent<F: RecordField> {
    token: VersionToken,
    edits: FieldEdits<F>,
}

impl<F: RecordField> EditIntent<F> {
    pub fn new(token: VersionToken, edits: FieldEdits<F>) -> Self {
        Self { token, edits }
    }

    pub fn token(&self) -> VersionToken {
        self.token
    }

    pub fn edits(&self) -> &FieldEdits<F> {
        &self.edits
    }

    /// Reject malformed edits before any store call
    pub fn validate(&self) -> Result<()> {
        if self.edits.is_empty() {
            return Err(AppError::ValidationRejected(vec![ValidationIssue::new(
                "",
                "no fields to change",
            )]));
        }
        validate_fields(&self.edits)
    }
}

/// Validate every value in `values` against its field
pub fn validate_fields<F: RecordField>(values: &FieldEdits<F>) -> Result<()> {
    let issues: Vec<ValidationIssue> = values
        .iter()
        .filter_map(|(field, value)| {
            field
                .validate(value)
                .err()
                .map(|message| ValidationIssue::new(field.name(), message))
        })
        .collect();

    if issues.is_empty() {
        Ok(())
    } else {
        Err(AppError::ValidationRejected(issues))
    }
}

/// Display labels for referenced records, e.g. instructor names by id
#[derive(Debug, Clone, Default)]
pub struct ReferenceLabels {
    labels: HashMap<i64, String>,
}

impl ReferenceLabels {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: i64, label: impl Into<String>) {
        self.labels.insert(id, label.into());
    }

    pub fn get(&self, id: i64) -> Option<&str> {
        self.labels.get(&id).map(String::as_str)
    }
}

impl FromIterator<(i64, String)> for ReferenceLabels {
    fn from_iter<I: IntoIterator<Item = (i64, String)>>(iter: I) -> Self {
        Self {
            labels: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
    pub enum Widget {
        Title,
        Due,
        Cost,
        Owner,
    }

    impl RecordField for Widget {
        fn all() -> &'static [Self] {
            &[Widget::Title, Widget::Due, Widget::Cost, Widget::Owner]
        }

        fn name(self) -> &'static str {
            match self {
                Widget::Title => "Title",
                Widget::Due => "Due",
                Widget::Cost => "Cost",
                Widget::Owner => "Owner",
            }
        }

        fn kind(self) -> FieldKind {
            match self {
                Widget::Title => FieldKind::Text,
                Widget::Due => FieldKind::Date,
                Widget::Cost => FieldKind::Money,
                Widget::Owner => FieldKind::Reference,
            }
        }

        fn check(self, value: &FieldValue) -> std::result::Result<(), String> {
            match value {
                FieldValue::Text(t) if t.is_empty() => Err("must not be empty".to_string()),
                _ => Ok(()),
            }
        }
    }

    pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_matches_by_kind() {
        let a = FieldValue::Money(Money::from_cents(100));
        assert!(a.matches(&FieldValue::Money(Money::from_units(1))));
        assert!(!a.matches(&FieldValue::Money(Money::from_cents(101))));
        assert!(!a.matches(&FieldValue::Text("1.00".to_string())));
        assert!(FieldValue::Date(date(2007, 9, 1)).matches(&FieldValue::Date(date(2007, 9, 1))));
        assert!(!FieldValue::Reference(None).matches(&FieldValue::Reference(Some(1))));
    }

    #[test]
    fn test_display_conventions() {
        let conventions = DisplayConfig {
            date_format: "%m/%d/%Y".to_string(),
            currency_symbol: "$".to_string(),
        };
        let mut labels = ReferenceLabels::new();
        labels.insert(3, "Fakhouri, Fadi");

        assert_eq!(
            FieldValue::Date(date(2007, 9, 1)).display(&conventions, &labels),
            "09/01/2007"
        );
        assert_eq!(
            FieldValue::Money(Money::from_units(350_000)).display(&conventions, &labels),
            "$350,000.00"
        );
        assert_eq!(
            FieldValue::Reference(Some(3)).display(&conventions, &labels),
            "Fakhouri, Fadi"
        );
        assert_eq!(FieldValue::Reference(Some(9)).display(&conventions, &labels), "");
        assert_eq!(FieldValue::Reference(None).display(&conventions, &labels), "");
    }

    #[test]
    fn test_unusable_date_pattern_falls_back_to_iso() {
        let conventions = DisplayConfig {
            date_format: "%Q".to_string(),
            currency_symbol: "$".to_string(),
        };
        assert_eq!(
            FieldValue::Date(date(2007, 9, 1)).display(&conventions, &ReferenceLabels::new()),
            "2007-09-01"
        );
    }

    #[test]
    fn test_overlay_replaces_only_edited_fields() {
        let record = Record::new(1, VersionToken::generate())
            .with_field(Widget::Title, FieldValue::Text("A".to_string()))
            .with_field(Widget::Cost, FieldValue::Money(Money::from_units(100)));

        let mut edits = FieldEdits::new();
        edits.insert(Widget::Cost, FieldValue::Money(Money::from_units(200)));

        let merged = record.overlay(&edits);
        assert_eq!(merged.get(Widget::Title), record.get(Widget::Title));
        assert_eq!(merged.get(Widget::Cost), Some(&FieldValue::Money(Money::from_units(200))));
        assert_eq!(merged.version, record.version);
    }

    #[test]
    fn test_intent_validation() {
        let token = VersionToken::generate();
        let empty: EditIntent<Widget> = EditIntent::new(token, FieldEdits::new());
        assert!(matches!(empty.validate(), Err(AppError::ValidationRejected(_))));

        let mut edits = FieldEdits::new();
        edits.insert(Widget::Due, FieldValue::Text("tomorrow".to_string()));
        edits.insert(Widget::Title, FieldValue::Text(String::new()));
        match EditIntent::new(token, edits).validate() {
            Err(AppError::ValidationRejected(issues)) => {
                let fields: Vec<_> = issues.iter().map(|i| i.field.as_str()).collect();
                assert_eq!(fields, vec!["Title", "Due"]);
            }
            other => panic!("expected validation failure, got {:?}", other),
        }
    }
}
