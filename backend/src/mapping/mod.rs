//! Column mapping: propose a [`CanonicalField`] for every spreadsheet header.
//!
//! Suggestion and approval are separate steps. [`suggest_mapping`] only
//! proposes; the caller reviews it, applies overrides with
//! [`FieldMapping::with_overrides`] and hands the approved mapping to the
//! projector. Nothing downstream re-derives a mapping on its own.
//!
//! ```text
//! headers ──▶ suggest ──▶ (reviewer overrides) ──▶ check_required ──▶ projector
//! ```

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::error::InputShapeError;
use crate::models::{CanonicalField, FieldMapping, MappingPurpose};

// =============================================================================
// Synonym Tables
// =============================================================================

/// Header synonyms used when reconciling against existing contacts.
const RECONCILE_SYNONYMS: &[(&str, CanonicalField)] = &[
    ("first name", CanonicalField::FirstName),
    ("last name", CanonicalField::LastName),
    ("preferred name", CanonicalField::PreferredName),
    ("name", CanonicalField::Name),
    ("full name", CanonicalField::Name),
    ("email", CanonicalField::Email),
    ("email address", CanonicalField::Email),
    ("best to use email", CanonicalField::Email),
    ("personal email", CanonicalField::PersonalEmail),
    ("home phone", CanonicalField::HomePhone),
    ("mobile phone", CanonicalField::MobilePhone),
    ("phone", CanonicalField::MobilePhone),
    ("phone number", CanonicalField::MobilePhone),
];

/// Header synonyms used when importing new contacts.
const IMPORT_SYNONYMS: &[(&str, CanonicalField)] = &[
    ("first name", CanonicalField::FirstName),
    ("last name", CanonicalField::LastName),
    ("name", CanonicalField::Name),
    ("full name", CanonicalField::Name),
    ("url", CanonicalField::LinkedInUrl),
    ("linkedin profile url", CanonicalField::LinkedInUrl),
    ("email", CanonicalField::Email),
    ("email address", CanonicalField::Email),
    ("phone", CanonicalField::PhoneNumber),
    ("phone number", CanonicalField::PhoneNumber),
    ("company", CanonicalField::Company),
    ("current company", CanonicalField::Company),
    ("position", CanonicalField::Title),
    ("title", CanonicalField::Title),
    ("job title", CanonicalField::Title),
    ("notes", CanonicalField::Notes),
];

static SEPARATOR_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\s_]+").expect("static separator pattern"));

/// Synonym table for `purpose`.
pub fn synonyms(purpose: MappingPurpose) -> &'static [(&'static str, CanonicalField)] {
    match purpose {
        MappingPurpose::Import => IMPORT_SYNONYMS,
        MappingPurpose::Reconcile => RECONCILE_SYNONYMS,
    }
}

/// Fields the reviewer may pick from for `purpose`, `Ignore` first.
pub fn mappable_fields(purpose: MappingPurpose) -> Vec<CanonicalField> {
    let mut fields = vec![CanonicalField::Ignore];
    match purpose {
        MappingPurpose::Import => fields.extend([
            CanonicalField::Name,
            CanonicalField::FirstName,
            CanonicalField::LastName,
            CanonicalField::Email,
            CanonicalField::PhoneNumber,
            CanonicalField::LinkedInUrl,
            CanonicalField::Company,
            CanonicalField::Title,
            CanonicalField::Notes,
        ]),
        MappingPurpose::Reconcile => fields.extend([
            CanonicalField::Name,
            CanonicalField::FirstName,
            CanonicalField::LastName,
            CanonicalField::PreferredName,
            CanonicalField::Email,
            CanonicalField::PersonalEmail,
            CanonicalField::HomePhone,
            CanonicalField::MobilePhone,
        ]),
    }
    fields
}

/// One entry of the review dropdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FieldOption {
    pub field: CanonicalField,
    pub label: &'static str,
}

/// [`mappable_fields`] with their display labels.
pub fn field_options(purpose: MappingPurpose) -> Vec<FieldOption> {
    mappable_fields(purpose)
        .into_iter()
        .map(|field| FieldOption {
            field,
            label: field.label(),
        })
        .collect()
}

/// Lookup key for a header: trimmed, lower-cased, separators collapsed.
///
/// `"  First_Name "` and `"first  name"` both become `"first name"`.
pub fn header_key(header: &str) -> String {
    SEPARATOR_RUN
        .replace_all(header.trim(), " ")
        .to_lowercase()
}

/// Look a single header up in the synonym table for `purpose`.
pub fn lookup(header: &str, purpose: MappingPurpose) -> CanonicalField {
    let key = header_key(header);
    synonyms(purpose)
        .iter()
        .find(|(synonym, _)| *synonym == key)
        .map(|(_, field)| *field)
        .unwrap_or(CanonicalField::Ignore)
}

// =============================================================================
// Suggestion
// =============================================================================

/// Suggest a reconciliation mapping for `headers`.
///
/// Unknown headers are assigned [`CanonicalField::Ignore`].
pub fn suggest_mapping(headers: &[String]) -> FieldMapping {
    suggest_mapping_for(headers, MappingPurpose::Reconcile)
}

/// Suggest a mapping for `headers` using the synonym table of `purpose`.
pub fn suggest_mapping_for(headers: &[String], purpose: MappingPurpose) -> FieldMapping {
    headers
        .iter()
        .map(|h| (h.clone(), lookup(h, purpose)))
        .collect()
}

impl FieldMapping {
    /// Apply reviewer overrides on top of this mapping.
    ///
    /// Overridden headers keep their position; headers only present in
    /// `overrides` are appended in the override order.
    pub fn with_overrides(mut self, overrides: &FieldMapping) -> FieldMapping {
        for (header, field) in overrides.iter() {
            self.set(header, field);
        }
        self
    }

    /// Keep only the entries whose header is in `headers`, in header order.
    ///
    /// Entries for columns the sheet does not have can never yield a value,
    /// so required-field checks run on this view.
    pub fn for_headers(&self, headers: &[String]) -> FieldMapping {
        headers
            .iter()
            .filter_map(|h| self.get(h).map(|field| (h.clone(), field)))
            .collect()
    }

    /// Make sure the mapping can produce anything for `purpose`.
    ///
    /// Import needs a name-like column; reconciliation needs at least one
    /// signal column (name, email or phone).
    pub fn check_required(&self, purpose: MappingPurpose) -> Result<(), InputShapeError> {
        let name_like = [
            CanonicalField::Name,
            CanonicalField::FirstName,
            CanonicalField::LastName,
        ];

        let (satisfied, expected) = match purpose {
            MappingPurpose::Import => (
                name_like.iter().any(|f| self.maps_to(*f)),
                "name, firstName or lastName",
            ),
            MappingPurpose::Reconcile => (
                self.iter().any(|(_, f)| is_signal_field(f)),
                "a name, email or phone field",
            ),
        };

        if satisfied {
            Ok(())
        } else {
            Err(InputShapeError::MissingRequiredField {
                purpose,
                expected: expected.to_string(),
            })
        }
    }
}

/// Whether `field` feeds one of the three match signals.
pub fn is_signal_field(field: CanonicalField) -> bool {
    matches!(
        field,
        CanonicalField::Name
            | CanonicalField::FirstName
            | CanonicalField::LastName
            | CanonicalField::PreferredName
            | CanonicalField::Email
            | CanonicalField::PersonalEmail
            | CanonicalField::PhoneNumber
            | CanonicalField::HomePhone
            | CanonicalField::MobilePhone
    )
}
