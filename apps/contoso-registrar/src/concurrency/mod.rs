//! Optimistic concurrency for versioned records
//!
//! Conditional writes against a version token, and conflict reports for the
//! writes that lose.

mod memory;
mod money;
mod record;
mod report;
mod resolver;
mod store;
mod token;

pub use memory::MemoryStore;
pub use money::{Money, MoneyParseError};
pub use record::{
    validate_fields, EditIntent, FieldEdits, FieldKind, FieldValue, Record, RecordField,
    ReferenceLabels,
};
pub use report::{Advisory, ConflictReport, FieldDiscrepancy};
pub use resolver::{ConflictResolver, Resolution};
pub use store::{Conditional, ConditionalDelete, ConditionalWrite, VersionedRecordStore, VersionedStore};
pub use token::{TokenError, VersionToken};
