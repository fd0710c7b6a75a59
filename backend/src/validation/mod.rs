//! JSON Schema validation for contact records.
//!
//! Every [`CanonicalRecord`] produced by the import projection is checked
//! against `schemas/contact-record.json` (Draft 7) before it is handed to the
//! store. Records that fail are reported with their row index and skipped.
//!
//! # Example
//!
//! ```rust,ignore
//! use serde_json::json;
//! use reconcile::validation::is_valid_contact_record;
//!
//! let record = json!({
//!     "name": "Ada Lovelace",
//!     "associatedGroup": "Mohan Coaching",
//!     "tags": ["Connection"],
//!     "createdAt": "2026-10-16T09:00:00Z"
//! });
//! assert!(is_valid_contact_record(&record));
//! ```

use once_cell::sync::Lazy;
use serde_json::Value;

use crate::error::ValidationError;
use crate::models::CanonicalRecord;
use crate::transform::projector::SkippedRow;

static CONTACT_SCHEMA: Lazy<Value> = Lazy::new(|| {
    serde_json::from_str(include_str!("../../schemas/contact-record.json"))
        .expect("Invalid embedded schema")
});

/// Compiled once; shared by every record of every import.
static CONTACT_VALIDATOR: Lazy<jsonschema::Validator> =
    Lazy::new(|| jsonschema::draft7::new(&CONTACT_SCHEMA).expect("Invalid embedded schema"));

/// Validate a serialized contact record.
///
/// Returns every error message on failure.
pub fn validate_contact_record(data: &Value) -> Result<(), Vec<String>> {
    let errors: Vec<String> = CONTACT_VALIDATOR
        .iter_errors(data)
        .map(|e| e.to_string())
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

pub fn is_valid_contact_record(data: &Value) -> bool {
    CONTACT_VALIDATOR.is_valid(data)
}

/// Validate a typed record.
pub fn validate_record(record: &CanonicalRecord) -> Result<(), ValidationError> {
    let data = serde_json::to_value(record).map_err(|e| ValidationError::SchemaError {
        errors: vec![e.to_string()],
    })?;
    validate_contact_record(&data).map_err(|errors| ValidationError::SchemaError { errors })
}

/// Records that passed, plus the rows that did not.
#[derive(Debug, Clone, Default)]
pub struct ValidatedRecords {
    pub valid: Vec<CanonicalRecord>,
    pub rejected: Vec<SkippedRow>,
}

/// Split projected `(row, record)` pairs into valid records and rejected rows.
pub fn validate_records(records: Vec<(usize, CanonicalRecord)>) -> ValidatedRecords {
    let mut result = ValidatedRecords::default();

    for (row, record) in records {
        match validate_record(&record) {
            Ok(()) => result.valid.push(record),
            Err(ValidationError::SchemaError { errors }) => result.rejected.push(SkippedRow {
                row,
                reason: errors.join("; "),
                missing_fields: Vec::new(),
            }),
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Tag;
    use chrono::Utc;
    use serde_json::json;

    fn record(name: &str) -> CanonicalRecord {
        CanonicalRecord {
            name: name.to_string(),
            email: Some("ada@x.com".into()),
            phone_number: None,
            company: Some("Acme".into()),
            title: None,
            notes: None,
            linkedin_url: None,
            associated_group: "Mohan Coaching".into(),
            tags: vec![Tag::Connection],
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_validator_is_shared() {
        let first: *const jsonschema::Validator = &*CONTACT_VALIDATOR;
        assert!(validate_record(&record("Ada")).is_ok());
        assert!(validate_record(&record("Grace")).is_ok());
        assert!(std::ptr::eq(first, &*CONTACT_VALIDATOR));
    }

    #[test]
    fn test_valid_record() {
        assert!(validate_record(&record("Ada Lovelace")).is_ok());
    }

    #[test]
    fn test_blank_name_rejected() {
        assert!(validate_record(&record("")).is_err());
        assert!(validate_record(&record("   ")).is_err());
    }

    #[test]
    fn test_unknown_tag_rejected() {
        let data = json!({
            "name": "Ada",
            "associatedGroup": "Mohan Coaching",
            "tags": ["Stranger"],
            "createdAt": "2026-10-16T09:00:00Z"
        });
        assert!(!is_valid_contact_record(&data));
    }

    #[test]
    fn test_missing_required_reports_errors() {
        let result = validate_contact_record(&json!({ "name": "Ada" }));
        let errors = result.unwrap_err();
        assert!(!errors.is_empty());
    }

    #[test]
    fn test_validate_records_keeps_row_index() {
        let split = validate_records(vec![(0, record("Ada")), (3, record(" ")), (4, record("Grace"))]);

        assert_eq!(split.valid.len(), 2);
        assert_eq!(split.rejected.len(), 1);
        assert_eq!(split.rejected[0].row, 3);
    }
}
