//! High-level operations combining every step of a reconciliation run.
//!
//! Each operation comes in two forms:
//!
//! - `try_*` returns a typed [`PipelineError`] and is what Rust callers
//!   and tests use.
//! - the plain form folds that into an [`ActionResponse`] envelope, so the
//!   CLI and the HTTP API never see an expected failure as an error.
//!
//! ```text
//! import:    sheet ─▶ check ─▶ project_import ─▶ validate ─▶ insert batch
//! reconcile: sheet ─▶ check ─▶ project_match ─▶ fetch snapshot ─▶ find_matches
//! review:    BulkActionRequest ─▶ filter ids ─▶ one atomic batch
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use reconcile::store::InMemoryStore;
//! use reconcile::transform::pipeline::find_sheet_matches;
//!
//! let store = InMemoryStore::new();
//! let response = find_sheet_matches(&store, &sheet, &mapping, None).await;
//! println!("{}", response.message);
//! ```

use chrono::Utc;
use serde::Serialize;

use crate::api::logs::{log_error, log_info, log_info_indent, log_success, log_warning};
use crate::bulk::{apply_bulk_action, insert_records, BulkOutcome};
use crate::cache::MappingRegistry;
use crate::error::{PipelineError, PipelineResult};
use crate::mapping::{field_options, FieldOption};
use crate::matching::{candidate_ids, find_matches};
use crate::models::{
    ActionResponse, BulkActionRequest, FieldMapping, MappingPurpose, MatchGroup, Sheet,
};
use crate::parser::{check_shape, parse_bytes_auto};
use crate::store::{RecordFilter, RecordStore};
use crate::transform::projector::{project_import, project_match, SkippedRow};
use crate::validation::validate_records;

/// Scope value meaning "every group".
pub const ALL_SCOPE: &str = "All";

/// Rejected rows logged individually before summarizing.
const MAX_LOGGED_SKIPS: usize = 3;

// =============================================================================
// Sheet preview
// =============================================================================

/// A parsed upload plus the mapping proposed for it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetPreview {
    pub headers: Vec<String>,
    pub rows: Vec<crate::models::RawRow>,
    pub suggested_mapping: FieldMapping,
    pub purpose: MappingPurpose,
    pub encoding: String,
    pub delimiter: String,
    /// Stored mapping the suggestion was taken from, if any.
    pub registry_mapping_id: Option<String>,
    /// Choices offered for each column during review.
    pub field_options: Vec<FieldOption>,
}

impl SheetPreview {
    pub fn sheet(&self) -> Sheet {
        Sheet {
            headers: self.headers.clone(),
            rows: self.rows.clone(),
        }
    }
}

/// Parse an uploaded file and propose a mapping for `purpose`.
///
/// With a registry, the best compatible stored mapping is overlaid on the
/// synonym suggestion.
pub fn preview_bytes(
    bytes: &[u8],
    purpose: MappingPurpose,
    registry: Option<&MappingRegistry>,
) -> PipelineResult<SheetPreview> {
    log_info("📖 Reading spreadsheet...");
    let parsed = parse_bytes_auto(bytes)?;
    log_success(format!("Detected encoding: {}", parsed.encoding));
    log_success(format!(
        "Detected separator: '{}'",
        format_delimiter(parsed.delimiter)
    ));
    log_success(format!("Read {} rows", parsed.sheet.rows.len()));
    parsed.require_rows()?;

    let (suggested_mapping, registry_mapping_id) = match registry {
        Some(registry) => registry.suggest_with_registry(&parsed.sheet.headers, purpose),
        None => (
            crate::mapping::suggest_mapping_for(&parsed.sheet.headers, purpose),
            None,
        ),
    };

    log_info(format!("📋 {} columns:", parsed.sheet.headers.len()));
    for (header, field) in suggested_mapping.iter() {
        log_info_indent(format!("{} → {}", header, field), 1);
    }
    if let Some(id) = &registry_mapping_id {
        log_success(format!("Reused stored mapping {}", id));
    }

    Ok(SheetPreview {
        headers: parsed.sheet.headers,
        rows: parsed.sheet.rows,
        suggested_mapping,
        purpose,
        encoding: parsed.encoding,
        delimiter: format_delimiter(parsed.delimiter).to_string(),
        registry_mapping_id,
        field_options: field_options(purpose),
    })
}

// =============================================================================
// Import
// =============================================================================

/// Outcome of a committed import.
#[derive(Debug, Clone, Default)]
pub struct ImportSummary {
    pub imported_count: usize,
    pub inserted_ids: Vec<String>,
    /// Rows without a name plus rows failing validation, by row index.
    pub skipped: Vec<SkippedRow>,
}

/// Import every row of `sheet` as a new contact in `associated_group`.
///
/// The sheet shape and the mapping are checked before anything else; nothing
/// reaches the store unless at least one record survives projection and
/// validation. All records go in one atomic batch.
pub async fn try_import_sheet(
    store: &dyn RecordStore,
    sheet: &Sheet,
    mapping: &FieldMapping,
    associated_group: &str,
) -> PipelineResult<ImportSummary> {
    check_shape(sheet)?;
    let mapping = &mapping.for_headers(&sheet.headers);
    mapping.check_required(MappingPurpose::Import)?;

    log_info(format!("🔄 Projecting {} rows for import...", sheet.rows.len()));
    let projection = project_import(&sheet.rows, mapping, associated_group, Utc::now());
    log_success(projection.summary());

    let validated = validate_records(projection.records);
    let mut skipped = projection.skipped;
    log_rejections(&validated.rejected);
    skipped.extend(validated.rejected);
    skipped.sort_by_key(|s| s.row);

    if validated.valid.is_empty() {
        return Err(PipelineError::NothingToImport);
    }

    log_info(format!("💾 Committing {} records...", validated.valid.len()));
    let receipt = insert_records(store, validated.valid).await?;
    log_success(format!("{} records inserted", receipt.applied));

    Ok(ImportSummary {
        imported_count: receipt.applied,
        inserted_ids: receipt.inserted_ids,
        skipped,
    })
}

/// Envelope form of [`try_import_sheet`].
pub async fn import_sheet(
    store: &dyn RecordStore,
    sheet: &Sheet,
    mapping: &FieldMapping,
    associated_group: &str,
) -> ActionResponse {
    match try_import_sheet(store, sheet, mapping, associated_group).await {
        Ok(summary) => ActionResponse {
            imported_count: Some(summary.imported_count),
            skipped_count: Some(summary.skipped.len()),
            ..ActionResponse::ok(format!(
                "{} connections added successfully.",
                summary.imported_count
            ))
        },
        Err(e) => failure(e),
    }
}

// =============================================================================
// Reconciliation
// =============================================================================

/// Propose existing contacts for every row of `sheet`.
///
/// `scope` restricts the snapshot to one `associatedGroup`; `None`, blank or
/// [`ALL_SCOPE`] fetch every contact. No match is not an error.
pub async fn try_find_sheet_matches(
    store: &dyn RecordStore,
    sheet: &Sheet,
    mapping: &FieldMapping,
    scope: Option<&str>,
) -> PipelineResult<Vec<MatchGroup>> {
    check_shape(sheet)?;
    let mapping = &mapping.for_headers(&sheet.headers);
    mapping.check_required(MappingPurpose::Reconcile)?;

    log_info(format!("🔎 Extracting match signals from {} rows...", sheet.rows.len()));
    let identifiers = project_match(&sheet.rows, mapping);
    let dropped = sheet.rows.len() - identifiers.len();
    if dropped > 0 {
        log_warning(format!("{} rows carry no name, email or phone", dropped));
    }

    let filter = scope
        .map(str::trim)
        .filter(|s| !s.is_empty() && *s != ALL_SCOPE)
        .map(RecordFilter::group);
    let snapshot = store.fetch(filter.as_ref()).await?;
    match &filter {
        Some(f) => log_info(format!("Loaded {} contacts in {}", snapshot.len(), f.value)),
        None => log_info(format!("Loaded {} contacts", snapshot.len())),
    }

    let groups = find_matches(&identifiers, &snapshot, &sheet.rows);
    log_success(format!(
        "{} rows matched, {} candidate contacts",
        groups.len(),
        candidate_ids(&groups).len()
    ));

    Ok(groups)
}

/// Envelope form of [`try_find_sheet_matches`].
pub async fn find_sheet_matches(
    store: &dyn RecordStore,
    sheet: &Sheet,
    mapping: &FieldMapping,
    scope: Option<&str>,
) -> ActionResponse {
    match try_find_sheet_matches(store, sheet, mapping, scope).await {
        Ok(groups) => {
            let message = if groups.is_empty() {
                "No potential matches were found based on your file.".to_string()
            } else {
                format!("Found potential matches for {} rows.", groups.len())
            };
            ActionResponse {
                matches: Some(groups),
                ..ActionResponse::ok(message)
            }
        }
        Err(e) => failure(e),
    }
}

// =============================================================================
// Bulk action
// =============================================================================

/// Apply a reviewed bulk action.
pub async fn try_apply_bulk(
    store: &dyn RecordStore,
    request: &BulkActionRequest,
) -> PipelineResult<BulkOutcome> {
    log_info(format!(
        "⚙️  Applying bulk action to {} selected ids...",
        request.connection_ids.len()
    ));
    let outcome = apply_bulk_action(store, request).await?;
    log_success(format!(
        "{} connections {}",
        outcome.applied_count,
        request.action.verb()
    ));
    Ok(outcome)
}

/// Envelope form of [`try_apply_bulk`].
pub async fn apply_bulk(store: &dyn RecordStore, request: &BulkActionRequest) -> ActionResponse {
    match try_apply_bulk(store, request).await {
        Ok(outcome) => ActionResponse {
            applied_count: Some(outcome.applied_count),
            ..ActionResponse::ok(format!(
                "{} connections {} successfully.",
                outcome.applied_count,
                request.action.verb()
            ))
        },
        Err(e) => failure(e),
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn failure(error: PipelineError) -> ActionResponse {
    log_error(error.to_string());
    ActionResponse::failure(error.to_string())
}

fn log_rejections(rejected: &[SkippedRow]) {
    for skip in rejected.iter().take(MAX_LOGGED_SKIPS) {
        log_warning(format!("Row {}: {}", skip.row + 1, skip.reason));
    }
    if rejected.len() > MAX_LOGGED_SKIPS {
        log_warning(format!("{} rows failed validation", rejected.len()));
    }
}

/// Format delimiter for display
fn format_delimiter(d: char) -> &'static str {
    match d {
        ';' => ";",
        ',' => ",",
        '\t' => "TAB",
        '|' => "|",
        _ => "?",
    }
}
