//! Domain models for the reconciliation engine.
//!
//! - [`Sheet`] / [`RawRow`] - a parsed spreadsheet, header order preserved
//! - [`CanonicalField`] / [`FieldMapping`] - header to contact attribute assignment
//! - [`CanonicalRecord`] - a row ready to be inserted as a new contact
//! - [`Connection`] - a contact persisted in the record store
//! - [`MatchIdentifier`] - the normalized signals extracted from one row
//! - [`MatchCandidate`] / [`MatchGroup`] - proposed matches awaiting review
//! - [`BulkAction`] / [`BulkActionRequest`] - an approved mutation
//! - [`ActionResponse`] - the uniform caller-facing envelope

use chrono::{DateTime, Utc};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fmt;

// =============================================================================
// Spreadsheet Input
// =============================================================================

/// One data row: header -> raw cell, in header order.
///
/// Cells are usually strings, but sheets arriving as JSON may carry numbers
/// (phone columns exported as numeric cells). Read them with [`cell_text`].
pub type RawRow = Map<String, Value>;

/// A parsed spreadsheet: header row plus data rows.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Sheet {
    pub headers: Vec<String>,
    pub rows: Vec<RawRow>,
}

/// Render a cell as text. Null and nested values read as empty.
pub fn cell_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null | Value::Array(_) | Value::Object(_) => String::new(),
    }
}

// =============================================================================
// Canonical Fields
// =============================================================================

/// Contact attribute a spreadsheet column can be assigned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CanonicalField {
    Name,
    FirstName,
    LastName,
    PreferredName,
    Email,
    PersonalEmail,
    PhoneNumber,
    HomePhone,
    MobilePhone,
    Company,
    Title,
    Notes,
    #[serde(rename = "linkedInUrl")]
    LinkedInUrl,
    /// Column is not used.
    Ignore,
}

impl CanonicalField {
    /// Every assignable field, `Ignore` last.
    pub const ALL: [CanonicalField; 14] = [
        Self::Name,
        Self::FirstName,
        Self::LastName,
        Self::PreferredName,
        Self::Email,
        Self::PersonalEmail,
        Self::PhoneNumber,
        Self::HomePhone,
        Self::MobilePhone,
        Self::Company,
        Self::Title,
        Self::Notes,
        Self::LinkedInUrl,
        Self::Ignore,
    ];

    /// Wire name (matches the serde representation).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::FirstName => "firstName",
            Self::LastName => "lastName",
            Self::PreferredName => "preferredName",
            Self::Email => "email",
            Self::PersonalEmail => "personalEmail",
            Self::PhoneNumber => "phoneNumber",
            Self::HomePhone => "homePhone",
            Self::MobilePhone => "mobilePhone",
            Self::Company => "company",
            Self::Title => "title",
            Self::Notes => "notes",
            Self::LinkedInUrl => "linkedInUrl",
            Self::Ignore => "ignore",
        }
    }

    /// Parse a wire name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|f| f.as_str() == name)
    }

    /// Human label shown next to a column in the review UI.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Name => "Full Name",
            Self::FirstName => "First Name",
            Self::LastName => "Last Name",
            Self::PreferredName => "Preferred Name",
            Self::Email => "Best to use Email",
            Self::PersonalEmail => "Personal Email",
            Self::PhoneNumber => "Phone Number",
            Self::HomePhone => "Home Phone",
            Self::MobilePhone => "Mobile Phone",
            Self::Company => "Company",
            Self::Title => "Title",
            Self::Notes => "Notes",
            Self::LinkedInUrl => "LinkedIn URL",
            Self::Ignore => "Ignore this column",
        }
    }

    pub fn is_ignore(&self) -> bool {
        matches!(self, Self::Ignore)
    }
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What an approved mapping will be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MappingPurpose {
    /// Create new contacts from the rows.
    Import,
    /// Find existing contacts that correspond to the rows.
    #[default]
    Reconcile,
}

impl fmt::Display for MappingPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Import => f.write_str("import"),
            Self::Reconcile => f.write_str("reconciliation"),
        }
    }
}

// =============================================================================
// Field Mapping
// =============================================================================

/// Ordered header -> field assignment.
///
/// Order is the header order of the sheet and decides which header wins when
/// two of them are assigned the same field (the first one does). Serialized
/// as a JSON object; deserialization keeps document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldMapping {
    entries: Vec<(String, CanonicalField)>,
}

impl FieldMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign `field` to `header`, replacing an earlier assignment in place.
    pub fn set(&mut self, header: impl Into<String>, field: CanonicalField) {
        let header = header.into();
        match self.entries.iter_mut().find(|(h, _)| *h == header) {
            Some(entry) => entry.1 = field,
            None => self.entries.push((header, field)),
        }
    }

    /// Field assigned to `header`, if the header is known.
    pub fn get(&self, header: &str) -> Option<CanonicalField> {
        self.entries
            .iter()
            .find(|(h, _)| h == header)
            .map(|(_, f)| *f)
    }

    /// Entries in header order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, CanonicalField)> {
        self.entries.iter().map(|(h, f)| (h.as_str(), *f))
    }

    /// Headers in order.
    pub fn headers(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(h, _)| h.as_str())
    }

    /// Whether any header is assigned `field`.
    pub fn maps_to(&self, field: CanonicalField) -> bool {
        self.entries.iter().any(|(_, f)| *f == field)
    }

    /// Number of headers that are not ignored.
    pub fn mapped_count(&self) -> usize {
        self.entries.iter().filter(|(_, f)| !f.is_ignore()).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, CanonicalField)> for FieldMapping {
    fn from_iter<I: IntoIterator<Item = (String, CanonicalField)>>(iter: I) -> Self {
        let mut mapping = FieldMapping::new();
        for (header, field) in iter {
            mapping.set(header, field);
        }
        mapping
    }
}

impl Serialize for FieldMapping {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (header, field) in &self.entries {
            map.serialize_entry(header, field)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for FieldMapping {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct MappingVisitor;

        impl<'de> Visitor<'de> for MappingVisitor {
            type Value = FieldMapping;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an object of header -> canonical field")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<FieldMapping, A::Error> {
                let mut mapping = FieldMapping::new();
                while let Some((header, field)) = access.next_entry::<String, CanonicalField>()? {
                    mapping.set(header, field);
                }
                Ok(mapping)
            }
        }

        deserializer.deserialize_map(MappingVisitor)
    }
}

// =============================================================================
// Records
// =============================================================================

/// Tag carried by a contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tag {
    Connection,
    Referral,
}

/// A new contact built from one spreadsheet row (import path).
///
/// `name` is never empty: rows that cannot synthesize one are dropped by the
/// projector before a record exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalRecord {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "linkedInUrl")]
    pub linkedin_url: Option<String>,
    pub associated_group: String,
    pub tags: Vec<Tag>,
    pub created_at: DateTime<Utc>,
}

/// A contact persisted in the record store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "linkedInUrl")]
    pub linkedin_url: Option<String>,
    #[serde(default)]
    pub associated_group: String,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reminder_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Connection {
    /// Persist a new record under `id`.
    pub fn from_record(id: impl Into<String>, record: CanonicalRecord) -> Self {
        Self {
            id: id.into(),
            name: record.name,
            email: record.email,
            phone_number: record.phone_number,
            company: record.company,
            title: record.title,
            notes: record.notes,
            linkedin_url: record.linkedin_url,
            associated_group: record.associated_group,
            tags: record.tags,
            reminder_date: None,
            created_at: record.created_at,
            updated_at: None,
        }
    }

    /// Minimal contact used by tests and fixtures.
    pub fn named(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            email: None,
            phone_number: None,
            company: None,
            title: None,
            notes: None,
            linkedin_url: None,
            associated_group: String::new(),
            tags: vec![Tag::Connection],
            reminder_date: None,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone_number = Some(phone.into());
        self
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.associated_group = group.into();
        self
    }
}

/// The part of a [`Connection`] shown to the reviewer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionSummary {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub company: Option<String>,
}

impl From<&Connection> for ConnectionSummary {
    fn from(c: &Connection) -> Self {
        Self {
            id: c.id.clone(),
            name: c.name.clone(),
            email: c.email.clone(),
            phone_number: c.phone_number.clone(),
            company: c.company.clone(),
        }
    }
}

// =============================================================================
// Matching
// =============================================================================

/// Normalized signals extracted from one spreadsheet row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchIdentifier {
    /// Zero-based index of the data row in the sheet.
    pub source_row: usize,
    /// Lower-cased, de-duplicated: full name, preferred name, first name.
    pub names: Vec<String>,
    /// Lower-cased emails.
    pub emails: Vec<String>,
    /// Digit-only phones.
    pub phones: Vec<String>,
}

impl MatchIdentifier {
    /// No signal at all: cannot match on nothing.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty() && self.emails.is_empty() && self.phones.is_empty()
    }
}

/// Why an existing contact was proposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MatchReason {
    #[serde(rename = "Name Match")]
    Name,
    #[serde(rename = "Email Match")]
    Email,
    #[serde(rename = "Phone Match")]
    Phone,
}

impl MatchReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Name => "Name Match",
            Self::Email => "Email Match",
            Self::Phone => "Phone Match",
        }
    }
}

/// One existing contact proposed for one row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchCandidate {
    pub source_row: usize,
    pub connection: ConnectionSummary,
    pub reasons: BTreeSet<MatchReason>,
}

/// All candidates proposed for one row, in snapshot scan order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchGroup {
    pub id: String,
    pub source_row: usize,
    pub file_row: RawRow,
    pub options: Vec<MatchCandidate>,
}

// =============================================================================
// Bulk Actions
// =============================================================================

/// Mutation applied to every selected contact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum BulkAction {
    /// Delete the contacts.
    Delete,
    /// Set (or clear, with `null`) the follow-up reminder.
    SetReminder {
        #[serde(rename = "reminderDate", default)]
        reminder_date: Option<DateTime<Utc>>,
    },
}

impl BulkAction {
    pub fn verb(&self) -> &'static str {
        match self {
            Self::Delete => "deleted",
            Self::SetReminder { .. } => "updated",
        }
    }
}

/// Approved bulk mutation: `{"connectionIds": [...], "action": "delete"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkActionRequest {
    pub connection_ids: Vec<String>,
    #[serde(flatten)]
    pub action: BulkAction,
}

impl BulkActionRequest {
    pub fn delete<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            connection_ids: ids.into_iter().map(Into::into).collect(),
            action: BulkAction::Delete,
        }
    }
}

// =============================================================================
// Caller-Facing Envelope
// =============================================================================

/// Uniform result of every caller-facing operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResponse {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matches: Option<Vec<MatchGroup>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applied_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imported_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skipped_count: Option<usize>,
}

impl ActionResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            matches: None,
            applied_count: None,
            imported_count: None,
            skipped_count: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            ..Self::ok(message)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cell_text() {
        assert_eq!(cell_text(&json!("Ada")), "Ada");
        assert_eq!(cell_text(&json!(5551234567u64)), "5551234567");
        assert_eq!(cell_text(&json!(true)), "true");
        assert_eq!(cell_text(&Value::Null), "");
    }

    #[test]
    fn test_field_names_match_serde() {
        for field in CanonicalField::ALL {
            let wire = serde_json::to_value(field).unwrap();
            assert_eq!(wire, json!(field.as_str()));
            assert_eq!(CanonicalField::from_name(field.as_str()), Some(field));
        }
    }

    #[test]
    fn test_mapping_keeps_document_order() {
        let mapping: FieldMapping = serde_json::from_str(
            r#"{"Zeta": "email", "Alpha": "name", "Mid": "ignore"}"#,
        )
        .unwrap();
        let headers: Vec<&str> = mapping.headers().collect();
        assert_eq!(headers, vec!["Zeta", "Alpha", "Mid"]);
        assert_eq!(mapping.mapped_count(), 2);

        let back = serde_json::to_string(&mapping).unwrap();
        assert_eq!(back, r#"{"Zeta":"email","Alpha":"name","Mid":"ignore"}"#);
    }

    #[test]
    fn test_mapping_rejects_unknown_field() {
        let result: Result<FieldMapping, _> = serde_json::from_str(r#"{"A": "shoeSize"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_bulk_request_wire_format() {
        let req: BulkActionRequest =
            serde_json::from_value(json!({ "connectionIds": ["a", "b"], "action": "delete" }))
                .unwrap();
        assert_eq!(req.action, BulkAction::Delete);
        assert_eq!(req.connection_ids, vec!["a", "b"]);

        let req: BulkActionRequest = serde_json::from_value(json!({
            "connectionIds": ["a"],
            "action": "setReminder",
            "reminderDate": "2026-11-01T09:00:00Z"
        }))
        .unwrap();
        match req.action {
            BulkAction::SetReminder { reminder_date } => assert!(reminder_date.is_some()),
            other => panic!("unexpected action {:?}", other),
        }
    }

    #[test]
    fn test_unknown_action_rejected() {
        let result: Result<BulkActionRequest, _> =
            serde_json::from_value(json!({ "connectionIds": ["a"], "action": "merge" }));
        assert!(result.is_err());
    }

    #[test]
    fn test_reason_wire_names() {
        let reasons: BTreeSet<MatchReason> = [MatchReason::Email, MatchReason::Name].into();
        assert_eq!(
            serde_json::to_value(&reasons).unwrap(),
            json!(["Name Match", "Email Match"])
        );
    }

    #[test]
    fn test_envelope_omits_absent_fields() {
        let value = serde_json::to_value(ActionResponse::failure("nope")).unwrap();
        assert_eq!(value, json!({ "success": false, "message": "nope" }));
    }
}
