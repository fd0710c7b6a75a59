//! Request and response bodies of the HTTP API.
//!
//! Field names are camelCase on the wire. Operation results use the shared
//! [`ActionResponse`] envelope; see [`crate::models`].

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::models::{ActionResponse, FieldMapping, MappingPurpose, Sheet};

/// `POST /api/import`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportRequest {
    pub sheet: Sheet,
    /// Approved mapping
    pub mapping: FieldMapping,
    /// Falls back to the configured default group when absent
    #[serde(default)]
    pub associated_group: Option<String>,
    /// Remember the approved mapping under this name
    #[serde(default)]
    pub save_mapping_as: Option<String>,
}

/// `POST /api/matches`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchRequest {
    pub sheet: Sheet,
    /// Approved mapping
    pub mapping: FieldMapping,
    /// Restrict the snapshot to one group; absent or `"All"` means every group
    #[serde(default)]
    pub associated_group: Option<String>,
    #[serde(default)]
    pub save_mapping_as: Option<String>,
}

/// Query of `POST /api/sheet`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SheetQuery {
    #[serde(default)]
    pub purpose: MappingPurpose,
}

/// Error body for malformed requests (4xx)
pub fn error_response(error: &str) -> Value {
    json!({
        "requestId": Uuid::new_v4().to_string(),
        "success": false,
        "message": error,
    })
}

/// Envelope for a failure that is not the caller's fault
pub fn failure_envelope(message: impl Into<String>) -> ActionResponse {
    ActionResponse::failure(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CanonicalField;

    #[test]
    fn test_import_request_from_json() {
        let body = json!({
            "sheet": {
                "headers": ["Full Name", "Email"],
                "rows": [{ "Full Name": "Ada Lovelace", "Email": "ada@x.com" }]
            },
            "mapping": { "Full Name": "name", "Email": "email" },
            "associatedGroup": "Mohan Coaching"
        });

        let req: ImportRequest = serde_json::from_value(body).unwrap();
        assert_eq!(req.mapping.get("Full Name"), Some(CanonicalField::Name));
        assert_eq!(req.associated_group.as_deref(), Some("Mohan Coaching"));
        assert!(req.save_mapping_as.is_none());
        assert_eq!(req.sheet.rows.len(), 1);
    }

    #[test]
    fn test_match_request_group_optional() {
        let body = json!({
            "sheet": { "headers": ["Email"], "rows": [] },
            "mapping": { "Email": "email" }
        });
        let req: MatchRequest = serde_json::from_value(body).unwrap();
        assert!(req.associated_group.is_none());
    }

    #[test]
    fn test_error_response_shape() {
        let body = error_response("No file provided");
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "No file provided");
        assert!(body["requestId"].is_string());
    }
}
