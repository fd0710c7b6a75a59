//! Row projection: apply an approved [`FieldMapping`] to raw rows.
//!
//! Both paths share [`apply_mapping`]:
//!
//! ```text
//!                          ┌──▶ project_import ──▶ CanonicalRecord (or skipped)
//! RawRow ──▶ apply_mapping ┤
//!                          └──▶ project_match  ──▶ MatchIdentifier (or dropped)
//! ```

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use crate::models::{
    cell_text, CanonicalField, CanonicalRecord, FieldMapping, MatchIdentifier, RawRow, Tag,
};
use crate::normalize::{normalize_phone, normalize_text};

/// Field values picked out of one row.
pub type ProjectedFields = BTreeMap<CanonicalField, String>;

/// A row that produced no record.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedRow {
    pub row: usize,
    pub reason: String,
    pub missing_fields: Vec<String>,
}

/// Result of the import projection.
#[derive(Debug, Clone, Default)]
pub struct ImportProjection {
    /// Accepted records with the index of the row they came from.
    pub records: Vec<(usize, CanonicalRecord)>,
    /// Rows that synthesized an empty name.
    pub skipped: Vec<SkippedRow>,
}

impl ImportProjection {
    pub fn accepted(&self) -> usize {
        self.records.len()
    }

    pub fn summary(&self) -> String {
        format!(
            "Projected: {} records, {} skipped",
            self.records.len(),
            self.skipped.len()
        )
    }
}

// =============================================================================
// Shared primitive
// =============================================================================

/// Copy every mapped cell of `row` under its canonical field.
///
/// Cells are visited in row order, which is header order for parsed sheets.
/// Ignored and unmapped headers are skipped. When several headers map to the
/// same field the first one in header order claims it, even if its cell is
/// empty; the key order of `mapping` plays no part.
pub fn apply_mapping(row: &RawRow, mapping: &FieldMapping) -> ProjectedFields {
    let mut fields = ProjectedFields::new();

    for (header, cell) in row {
        let Some(field) = mapping.get(header) else {
            continue;
        };
        if field.is_ignore() || fields.contains_key(&field) {
            continue;
        }
        fields.insert(field, cell_text(cell));
    }

    fields
}

/// Trimmed value of the first listed field that is non-empty.
fn first_present(fields: &ProjectedFields, candidates: &[CanonicalField]) -> Option<String> {
    candidates
        .iter()
        .filter_map(|f| fields.get(f))
        .map(|v| v.trim())
        .find(|v| !v.is_empty())
        .map(str::to_string)
}

/// `first last`, skipping empty parts.
fn joined_name(fields: &ProjectedFields) -> String {
    [CanonicalField::FirstName, CanonicalField::LastName]
        .iter()
        .filter_map(|f| fields.get(f))
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

// =============================================================================
// Import projection
// =============================================================================

/// Build a new contact from one row.
///
/// Name order: the `name` column, else `firstName lastName`, else whichever
/// of the two is present. Returns `None` when that yields an empty name.
pub fn project_import_row(
    row: &RawRow,
    mapping: &FieldMapping,
    associated_group: &str,
    created_at: DateTime<Utc>,
) -> Option<CanonicalRecord> {
    let fields = apply_mapping(row, mapping);

    let name = first_present(&fields, &[CanonicalField::Name]).or_else(|| {
        let joined = joined_name(&fields);
        (!joined.is_empty()).then_some(joined)
    })?;

    Some(CanonicalRecord {
        name,
        email: first_present(&fields, &[CanonicalField::Email, CanonicalField::PersonalEmail]),
        phone_number: first_present(
            &fields,
            &[
                CanonicalField::PhoneNumber,
                CanonicalField::MobilePhone,
                CanonicalField::HomePhone,
            ],
        ),
        company: first_present(&fields, &[CanonicalField::Company]),
        title: first_present(&fields, &[CanonicalField::Title]),
        notes: first_present(&fields, &[CanonicalField::Notes]),
        linkedin_url: first_present(&fields, &[CanonicalField::LinkedInUrl]),
        associated_group: associated_group.to_string(),
        tags: vec![Tag::Connection],
        created_at,
    })
}

/// Project every row for import; rows without a name are counted as skipped.
pub fn project_import(
    rows: &[RawRow],
    mapping: &FieldMapping,
    associated_group: &str,
    created_at: DateTime<Utc>,
) -> ImportProjection {
    let mut result = ImportProjection::default();

    for (idx, row) in rows.iter().enumerate() {
        match project_import_row(row, mapping, associated_group, created_at) {
            Some(record) => result.records.push((idx, record)),
            None => result.skipped.push(SkippedRow {
                row: idx,
                reason: "No name could be synthesized".to_string(),
                missing_fields: vec![
                    CanonicalField::Name.to_string(),
                    CanonicalField::FirstName.to_string(),
                    CanonicalField::LastName.to_string(),
                ],
            }),
        }
    }

    result
}

// =============================================================================
// Match projection
// =============================================================================

fn push_unique(list: &mut Vec<String>, value: String) {
    if !value.is_empty() && !list.contains(&value) {
        list.push(value);
    }
}

/// Extract the normalized match signals of one row.
///
/// Returns `None` when the row has no name, email or phone left after
/// normalization.
pub fn project_match_row(
    source_row: usize,
    row: &RawRow,
    mapping: &FieldMapping,
) -> Option<MatchIdentifier> {
    let fields = apply_mapping(row, mapping);
    let text = |field: CanonicalField| fields.get(&field).map(|v| normalize_text(v)).unwrap_or_default();

    let mut identifier = MatchIdentifier {
        source_row,
        ..Default::default()
    };

    let full_name = match text(CanonicalField::Name) {
        name if !name.is_empty() => name,
        _ => normalize_text(&joined_name(&fields)),
    };
    push_unique(&mut identifier.names, full_name);
    push_unique(&mut identifier.names, text(CanonicalField::PreferredName));
    push_unique(&mut identifier.names, text(CanonicalField::FirstName));

    for field in [CanonicalField::Email, CanonicalField::PersonalEmail] {
        push_unique(&mut identifier.emails, text(field));
    }

    for field in [
        CanonicalField::PhoneNumber,
        CanonicalField::MobilePhone,
        CanonicalField::HomePhone,
    ] {
        let digits = fields.get(&field).map(|v| normalize_phone(v)).unwrap_or_default();
        push_unique(&mut identifier.phones, digits);
    }

    (!identifier.is_empty()).then_some(identifier)
}

/// Project every row for matching, silently dropping rows without signal.
pub fn project_match(rows: &[RawRow], mapping: &FieldMapping) -> Vec<MatchIdentifier> {
    rows.iter()
        .enumerate()
        .filter_map(|(idx, row)| project_match_row(idx, row, mapping))
        .collect()
}
