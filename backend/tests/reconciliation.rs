//! End-to-end runs: CSV text through parsing, mapping, matching and bulk
//! mutation against in-memory and file-backed stores.

use std::collections::BTreeSet;

use reconcile::error::{BulkActionError, PipelineError, StoreError};
use reconcile::store::{InMemoryStore, JsonFileStore, RecordStore};
use reconcile::{
    apply_bulk, find_sheet_matches, import_sheet, parse_bytes_auto, suggest_mapping,
    suggest_mapping_for, try_apply_bulk, BulkActionRequest, CanonicalField, Connection,
    MappingPurpose, MatchReason,
};

const EMAIL_ONLY: usize = 40;
const PHONE_ONLY: usize = 10;
const DUAL: usize = 5;
const UNMATCHED: usize = 45;

/// 100 rows: 40 match by email, 10 by phone, 5 by name and email, 45 by nothing.
fn reconciliation_csv() -> String {
    let mut csv = String::from("Full Name,Email Address,Phone\n");
    for i in 0..EMAIL_ONLY {
        csv.push_str(&format!("Stranger{} Row,KNOWN{}@example.com,\n", i, i));
    }
    for i in 0..PHONE_ONLY {
        csv.push_str(&format!("Caller{} Row,,555000{:04}\n", i, i));
    }
    for i in 0..DUAL {
        csv.push_str(&format!("Dual{} Person, dual{}@example.com ,\n", i, i));
    }
    for i in 0..UNMATCHED {
        csv.push_str(&format!("Ghost{} Row,nobody{}@nowhere.test,\n", i, i));
    }
    csv
}

fn existing_population() -> Vec<Connection> {
    let mut records = Vec::new();
    for i in 0..EMAIL_ONLY {
        records.push(
            Connection::named(format!("known-{}", i), format!("Known{} Contact", i))
                .with_email(format!("known{}@example.com", i))
                .with_group("Mohan Coaching"),
        );
    }
    for i in 0..PHONE_ONLY {
        records.push(
            Connection::named(format!("phone-{}", i), format!("Phoner{} Person", i))
                .with_phone(format!("(555) 000-{:04}", i))
                .with_group("Mohan Coaching"),
        );
    }
    for i in 0..DUAL {
        records.push(
            Connection::named(format!("dual-{}", i), format!("Dual{} Person", i))
                .with_email(format!("dual{}@example.com", i))
                .with_group("Mohan Financial"),
        );
    }
    for i in 0..20 {
        records.push(
            Connection::named(format!("other-{}", i), format!("Unrelated{} Someone", i))
                .with_email(format!("other{}@example.org", i))
                .with_phone(format!("+44 20 7946 {:04}", i))
                .with_group("Mohan Financial"),
        );
    }
    records
}

fn reasons(list: &[MatchReason]) -> BTreeSet<MatchReason> {
    list.iter().copied().collect()
}

#[tokio::test]
async fn test_hundred_row_reconciliation() {
    let parsed = parse_bytes_auto(reconciliation_csv().as_bytes()).unwrap();
    assert_eq!(parsed.sheet.rows.len(), 100);

    let mapping = suggest_mapping(&parsed.sheet.headers);
    assert_eq!(mapping.get("Full Name"), Some(CanonicalField::Name));
    assert_eq!(mapping.get("Email Address"), Some(CanonicalField::Email));
    assert_eq!(mapping.get("Phone"), Some(CanonicalField::MobilePhone));

    let store = InMemoryStore::with_records(existing_population());
    let response = find_sheet_matches(&store, &parsed.sheet, &mapping, None).await;
    assert!(response.success, "{}", response.message);

    let groups = response.matches.unwrap();
    assert_eq!(groups.len(), EMAIL_ONLY + PHONE_ONLY + DUAL);

    // Row order, one candidate each
    let rows: Vec<usize> = groups.iter().map(|g| g.source_row).collect();
    let expected: Vec<usize> = (0..EMAIL_ONLY + PHONE_ONLY + DUAL).collect();
    assert_eq!(rows, expected);
    assert!(groups.iter().all(|g| g.options.len() == 1));

    for g in &groups[..EMAIL_ONLY] {
        assert_eq!(g.options[0].reasons, reasons(&[MatchReason::Email]));
        assert!(g.options[0].connection.id.starts_with("known-"));
    }
    for g in &groups[EMAIL_ONLY..EMAIL_ONLY + PHONE_ONLY] {
        assert_eq!(g.options[0].reasons, reasons(&[MatchReason::Phone]));
        assert!(g.options[0].connection.id.starts_with("phone-"));
    }

    let dual: Vec<_> = groups.iter().filter(|g| g.options[0].reasons.len() == 2).collect();
    assert_eq!(dual.len(), DUAL);
    for g in dual {
        assert_eq!(
            g.options[0].reasons,
            reasons(&[MatchReason::Name, MatchReason::Email])
        );
    }

    // Unmatched rows never show up
    assert!(groups.iter().all(|g| g.source_row < EMAIL_ONLY + PHONE_ONLY + DUAL));
    assert!(groups
        .iter()
        .all(|g| !g.file_row["Full Name"].as_str().unwrap().starts_with("Ghost")));
}

#[tokio::test]
async fn test_scope_limits_snapshot() {
    let parsed = parse_bytes_auto(reconciliation_csv().as_bytes()).unwrap();
    let mapping = suggest_mapping(&parsed.sheet.headers);
    let store = InMemoryStore::with_records(existing_population());

    let response =
        find_sheet_matches(&store, &parsed.sheet, &mapping, Some("Mohan Financial")).await;
    let groups = response.matches.unwrap();

    assert_eq!(groups.len(), DUAL);
    assert!(groups
        .iter()
        .all(|g| g.options[0].connection.id.starts_with("dual-")));
}

#[tokio::test]
async fn test_reviewed_delete_is_all_or_nothing() {
    let parsed = parse_bytes_auto(reconciliation_csv().as_bytes()).unwrap();
    let mapping = suggest_mapping(&parsed.sheet.headers);
    let store = InMemoryStore::with_records(existing_population());
    let total = store.snapshot().len();

    let groups = find_sheet_matches(&store, &parsed.sheet, &mapping, None)
        .await
        .matches
        .unwrap();
    let mut selection: Vec<String> = groups
        .iter()
        .map(|g| g.options[0].connection.id.clone())
        .collect();
    // Reviewer left a few rows on "ignore"
    selection[3] = "ignore".to_string();
    selection[7] = "ignore".to_string();
    let request = BulkActionRequest::delete(selection);

    store.fail_at(20);
    let err = try_apply_bulk(&store, &request).await.unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Bulk(BulkActionError::Store(StoreError::WriteFailed(_)))
    ));
    assert_eq!(store.snapshot().len(), total);

    let response = apply_bulk(&store, &request).await;
    assert!(response.success, "{}", response.message);
    assert_eq!(response.applied_count, Some(53));
    assert_eq!(store.snapshot().len(), total - 53);
    assert!(store.snapshot().iter().any(|c| c.id == "known-3"));
}

#[tokio::test]
async fn test_import_then_reconcile_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileStore::new(dir.path().join("records.json"));

    let csv = "First Name;Last Name;Email;Current Company;Job Title\n\
               Ada;Lovelace;ada@analytical.org;Analytical Engines;Countess\n\
               ;;orphan@example.com;;\n\
               Grace;Hopper;grace@navy.mil;US Navy;Rear Admiral\n";
    let parsed = parse_bytes_auto(csv.as_bytes()).unwrap();
    let import_mapping = suggest_mapping_for(&parsed.sheet.headers, MappingPurpose::Import);
    assert_eq!(
        import_mapping.get("Current Company"),
        Some(CanonicalField::Company)
    );

    let imported = import_sheet(&store, &parsed.sheet, &import_mapping, "Mohan Coaching").await;
    assert!(imported.success, "{}", imported.message);
    assert_eq!(imported.imported_count, Some(2));
    assert_eq!(imported.skipped_count, Some(1));

    let stored = store.fetch(None).await.unwrap();
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[0].name, "Ada Lovelace");
    assert_eq!(stored[0].company.as_deref(), Some("Analytical Engines"));
    assert_eq!(stored[1].title.as_deref(), Some("Rear Admiral"));

    // Same file, reconciliation mapping: both contacts come back by name and email
    let match_mapping = suggest_mapping(&parsed.sheet.headers);
    let response = find_sheet_matches(&store, &parsed.sheet, &match_mapping, None).await;
    let groups = response.matches.unwrap();
    assert_eq!(groups.len(), 2);
    assert_eq!(
        groups[0].options[0].reasons,
        reasons(&[MatchReason::Name, MatchReason::Email])
    );

    let ids: Vec<String> = stored.iter().map(|c| c.id.clone()).collect();
    let deleted = apply_bulk(&store, &BulkActionRequest::delete(ids)).await;
    assert!(deleted.success);
    assert!(JsonFileStore::new(dir.path().join("records.json"))
        .fetch(None)
        .await
        .unwrap()
        .is_empty());
}
