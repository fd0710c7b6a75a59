//! Match engine: propose existing contacts for every spreadsheet row.
//!
//! Three independent exact signals, unioned:
//!
//! | Signal | Identifier side | Existing side | Test |
//! |--------|-----------------|---------------|------|
//! | Name   | full / preferred / first name | normalized full name | substring |
//! | Email  | email, personal email | normalized email | equality |
//! | Phone  | digit strings | digit string | substring |
//!
//! A contact is a candidate when at least one signal fires; every signal that
//! fires is recorded as a reason. Each row keeps all of its candidates: picking
//! one is left to the reviewer.
//!
//! Name matching is by substring: `"ada lovelace"` finds a contact stored as
//! `"ada lovelace-byron"`, and a bare first name finds every contact whose
//! name contains it. Expect false positives on short names.
//!
//! Output order is stable: groups follow spreadsheet row order, candidates
//! follow the order of the existing-record snapshot.

use std::collections::{BTreeSet, HashSet};

use crate::models::{
    Connection, ConnectionSummary, MatchCandidate, MatchGroup, MatchIdentifier, MatchReason,
    RawRow,
};
use crate::normalize::{normalize_phone, normalize_text};

// =============================================================================
// Comparable projection of existing records
// =============================================================================

/// An existing contact reduced to its normalized comparison keys.
///
/// Built from a read-only snapshot; the underlying record is never modified.
#[derive(Debug, Clone)]
pub struct ExistingRecord<'a> {
    pub connection: &'a Connection,
    pub full_name: String,
    pub email: String,
    pub phone: String,
}

impl<'a> ExistingRecord<'a> {
    pub fn new(connection: &'a Connection) -> Self {
        Self {
            connection,
            full_name: normalize_text(&connection.name),
            email: connection.email.as_deref().map(normalize_text).unwrap_or_default(),
            phone: connection.phone_number.as_deref().map(normalize_phone).unwrap_or_default(),
        }
    }

    /// Every signal this record shares with `identifier`.
    pub fn reasons_for(&self, identifier: &MatchIdentifier) -> BTreeSet<MatchReason> {
        let mut reasons = BTreeSet::new();

        let name_hit = !self.full_name.is_empty()
            && identifier
                .names
                .iter()
                .any(|n| !n.is_empty() && self.full_name.contains(n.as_str()));
        if name_hit {
            reasons.insert(MatchReason::Name);
        }

        let email_hit = !self.email.is_empty()
            && identifier.emails.iter().any(|e| !e.is_empty() && *e == self.email);
        if email_hit {
            reasons.insert(MatchReason::Email);
        }

        let phone_hit = !self.phone.is_empty()
            && identifier
                .phones
                .iter()
                .any(|p| !p.is_empty() && self.phone.contains(p.as_str()));
        if phone_hit {
            reasons.insert(MatchReason::Phone);
        }

        reasons
    }
}

/// Project a snapshot for comparison, preserving its order.
pub fn prepare_existing(snapshot: &[Connection]) -> Vec<ExistingRecord<'_>> {
    snapshot.iter().map(ExistingRecord::new).collect()
}

// =============================================================================
// Engine
// =============================================================================

/// Candidates for one identifier, in snapshot order, one per contact id.
pub fn match_identifier(
    identifier: &MatchIdentifier,
    existing: &[ExistingRecord<'_>],
) -> Vec<MatchCandidate> {
    if identifier.is_empty() {
        return Vec::new();
    }

    let mut seen: HashSet<&str> = HashSet::new();
    let mut candidates = Vec::new();

    for record in existing {
        let reasons = record.reasons_for(identifier);
        if reasons.is_empty() || !seen.insert(record.connection.id.as_str()) {
            continue;
        }
        candidates.push(MatchCandidate {
            source_row: identifier.source_row,
            connection: ConnectionSummary::from(record.connection),
            reasons,
        });
    }

    candidates
}

/// Compare every identifier against the snapshot.
///
/// `rows` are the sheet's data rows, used to attach the original cells to
/// each group for review. Identifiers with no candidate are left out.
///
/// Cost is identifiers x snapshot; fine for the thousands of rows a
/// reviewed batch holds.
pub fn find_matches(
    identifiers: &[MatchIdentifier],
    snapshot: &[Connection],
    rows: &[RawRow],
) -> Vec<MatchGroup> {
    let existing = prepare_existing(snapshot);

    identifiers
        .iter()
        .filter_map(|identifier| {
            let options = match_identifier(identifier, &existing);
            if options.is_empty() {
                return None;
            }
            Some(MatchGroup {
                id: format!("row-{}", identifier.source_row),
                source_row: identifier.source_row,
                file_row: rows.get(identifier.source_row).cloned().unwrap_or_default(),
                options,
            })
        })
        .collect()
}

/// Contact ids proposed across all groups, first occurrence order.
///
/// This is the reviewer's default selection.
pub fn candidate_ids(groups: &[MatchGroup]) -> Vec<String> {
    let mut seen = HashSet::new();
    groups
        .iter()
        .flat_map(|g| g.options.iter())
        .filter(|c| seen.insert(c.connection.id.clone()))
        .map(|c| c.connection.id.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identifier(names: &[&str], emails: &[&str], phones: &[&str]) -> MatchIdentifier {
        MatchIdentifier {
            source_row: 0,
            names: names.iter().map(|s| s.to_string()).collect(),
            emails: emails.iter().map(|s| s.to_string()).collect(),
            phones: phones.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn reasons(list: &[MatchReason]) -> BTreeSet<MatchReason> {
        list.iter().copied().collect()
    }

    #[test]
    fn test_email_case_insensitive() {
        let snapshot = vec![Connection::named("c1", "Someone Else").with_email("A@X.com")];
        let groups = find_matches(&[identifier(&[], &["a@x.com"], &[])], &snapshot, &[]);

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].options[0].reasons, reasons(&[MatchReason::Email]));
    }

    #[test]
    fn test_phone_after_normalization() {
        let snapshot = vec![Connection::named("c1", "Someone").with_phone("(555) 123-4567")];
        let groups = find_matches(&[identifier(&[], &[], &["5551234567"])], &snapshot, &[]);

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].options[0].reasons, reasons(&[MatchReason::Phone]));
    }

    #[test]
    fn test_phone_substring_allows_country_code() {
        let snapshot = vec![Connection::named("c1", "Someone").with_phone("+1 555 123 4567")];
        let groups = find_matches(&[identifier(&[], &[], &["5551234567"])], &snapshot, &[]);
        assert_eq!(groups.len(), 1);
    }

    #[test]
    fn test_name_substring() {
        let snapshot = vec![Connection::named("c1", "Augusta Ada Lovelace")];
        let groups = find_matches(&[identifier(&["ada"], &[], &[])], &snapshot, &[]);

        assert_eq!(groups[0].options[0].reasons, reasons(&[MatchReason::Name]));
    }

    #[test]
    fn test_multiple_reasons() {
        let snapshot = vec![Connection::named("c1", "Ada Lovelace").with_email("ada@x.com")];
        let groups = find_matches(
            &[identifier(&["ada lovelace"], &["ada@x.com"], &[])],
            &snapshot,
            &[],
        );

        assert_eq!(
            groups[0].options[0].reasons,
            reasons(&[MatchReason::Name, MatchReason::Email])
        );
    }

    #[test]
    fn test_empty_values_never_match() {
        let snapshot = vec![Connection::named("c1", "")];
        let id = identifier(&[""], &[""], &[""]);
        assert!(find_matches(&[id], &snapshot, &[]).is_empty());

        let snapshot = vec![Connection::named("c1", "Ada").with_email("").with_phone("n/a")];
        let id = identifier(&[], &["x@y.com"], &["123"]);
        assert!(find_matches(&[id], &snapshot, &[]).is_empty());
    }

    #[test]
    fn test_identifier_without_signal_yields_nothing() {
        let snapshot = vec![Connection::named("c1", "Ada")];
        assert!(find_matches(&[MatchIdentifier::default()], &snapshot, &[]).is_empty());
    }

    #[test]
    fn test_one_to_many_in_scan_order() {
        let snapshot = vec![
            Connection::named("c3", "Ada Byron"),
            Connection::named("c1", "Grace Hopper"),
            Connection::named("c2", "Ada Lovelace"),
        ];
        let groups = find_matches(&[identifier(&["ada"], &[], &[])], &snapshot, &[]);

        let ids: Vec<&str> = groups[0].options.iter().map(|c| c.connection.id.as_str()).collect();
        assert_eq!(ids, vec!["c3", "c2"]);
    }

    #[test]
    fn test_duplicate_ids_collapsed() {
        let snapshot = vec![
            Connection::named("c1", "Ada Lovelace"),
            Connection::named("c1", "Ada Lovelace"),
        ];
        let groups = find_matches(&[identifier(&["ada"], &[], &[])], &snapshot, &[]);
        assert_eq!(groups[0].options.len(), 1);
    }

    #[test]
    fn test_groups_follow_row_order_and_carry_file_row() {
        let snapshot = vec![Connection::named("c1", "Ada Lovelace")];
        let rows: Vec<RawRow> = (0..3)
            .map(|i| {
                let mut row = RawRow::new();
                row.insert("Name".into(), serde_json::json!(format!("row {}", i)));
                row
            })
            .collect();
        let mut first = identifier(&["ada"], &[], &[]);
        first.source_row = 2;
        let mut second = identifier(&["zed"], &[], &[]);
        second.source_row = 1;
        let mut third = identifier(&["lovelace"], &[], &[]);
        third.source_row = 0;

        let groups = find_matches(&[third, second, first], &snapshot, &rows);
        let order: Vec<usize> = groups.iter().map(|g| g.source_row).collect();
        assert_eq!(order, vec![0, 2]);
        assert_eq!(groups[1].id, "row-2");
        assert_eq!(groups[1].file_row["Name"], "row 2");
    }

    #[test]
    fn test_candidate_ids_deduplicated() {
        let snapshot = vec![
            Connection::named("c1", "Ada Lovelace"),
            Connection::named("c2", "Ada Byron"),
        ];
        let mut a = identifier(&["lovelace"], &[], &[]);
        a.source_row = 0;
        let mut b = identifier(&["ada"], &[], &[]);
        b.source_row = 1;

        let groups = find_matches(&[a, b], &snapshot, &[]);
        assert_eq!(candidate_ids(&groups), vec!["c1", "c2"]);
    }

    #[test]
    fn test_existing_record_projection() {
        let c = Connection::named("c1", "  Ada  King Lovelace ")
            .with_email(" ADA@X.COM ")
            .with_phone("555-123-4567");
        let record = ExistingRecord::new(&c);

        assert_eq!(record.full_name, "ada  king lovelace");
        assert_eq!(record.email, "ada@x.com");
        assert_eq!(record.phone, "5551234567");
        assert_eq!(c.name, "  Ada  King Lovelace ");
    }
}
