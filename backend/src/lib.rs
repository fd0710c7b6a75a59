//! # Reconcile - spreadsheet reconciliation for a contact store
//!
//! Reconcile takes a spreadsheet whose columns are not known in advance and
//! either imports its rows as new contacts or finds the existing contacts
//! they correspond to, so a reviewer can apply one bulk action to them.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────┐   ┌───────────┐   ┌────────────┐   ┌────────────┐
//! │ CSV file │──▶│  Parser  │──▶│  Mapping  │──▶│ Projector  │──▶│  import    │
//! │(any enc.)│   │(auto-det)│   │ (suggest) │   │            │   │  batch     │
//! └──────────┘   └──────────┘   └───────────┘   └─────┬──────┘   └────────────┘
//!                                                     │
//!                                                     ▼
//!                                    ┌────────────┐   ┌────────────┐
//!                                    │  Matching  │──▶│   review   │──▶ bulk batch
//!                                    │ (snapshot) │   │ (external) │
//!                                    └────────────┘   └────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use reconcile::{find_sheet_matches, parse_csv_file_auto, suggest_mapping, InMemoryStore};
//!
//! #[tokio::main]
//! async fn main() {
//!     let parsed = parse_csv_file_auto("contacts.csv").unwrap();
//!     let mapping = suggest_mapping(&parsed.sheet.headers);
//!     let store = InMemoryStore::new();
//!     let response = find_sheet_matches(&store, &parsed.sheet, &mapping, None).await;
//!     println!("{}", response.message);
//! }
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`config`] - Environment configuration
//! - [`models`] - Sheets, mappings, records, match groups, envelopes
//! - [`normalize`] - Phone/text canonicalization
//! - [`parser`] - CSV parsing with auto-detection
//! - [`mapping`] - Header synonym tables and mapping suggestion
//! - [`transform`] - Row projection and pipeline
//! - [`matching`] - Match engine
//! - [`store`] - Record store trait and backends
//! - [`bulk`] - Atomic bulk mutations
//! - [`validation`] - Contact record schema validation
//! - [`cache`] - Registry of approved mappings
//! - [`api`] - HTTP API server

// Core modules
pub mod config;
pub mod error;
pub mod models;

// Input
pub mod mapping;
pub mod normalize;
pub mod parser;

// Engine
pub mod bulk;
pub mod matching;
pub mod transform;

// Persistence
pub mod cache;
pub mod store;

// Validation
pub mod validation;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    BulkActionError, CsvError, InputShapeError, PipelineError, RegistryError, ServerError,
    StoreError, ValidationError,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{
    ActionResponse, BulkAction, BulkActionRequest, CanonicalField, CanonicalRecord, Connection,
    FieldMapping, MappingPurpose, MatchCandidate, MatchGroup, MatchIdentifier, MatchReason, RawRow,
    Sheet,
};

// =============================================================================
// Re-exports - Engine
// =============================================================================

pub use bulk::apply_bulk_action;
pub use mapping::{suggest_mapping, suggest_mapping_for};
pub use matching::find_matches;
pub use normalize::{normalize_phone, normalize_text, split_full_name};
pub use transform::projector::{apply_mapping, project_import, project_match};

// =============================================================================
// Re-exports - CSV Parsing
// =============================================================================

pub use parser::{parse_bytes_auto, parse_csv_file_auto, ParseResult};

// =============================================================================
// Re-exports - Store and Registry
// =============================================================================

pub use cache::{MappingRegistry, StoredMapping};
pub use store::{InMemoryStore, JsonFileStore, RecordStore};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use transform::pipeline::{
    apply_bulk, find_sheet_matches, import_sheet, preview_bytes, try_apply_bulk,
    try_find_sheet_matches, try_import_sheet, ImportSummary, SheetPreview,
};

// Server
pub mod server {
    pub use crate::api::server::start_server;
}
