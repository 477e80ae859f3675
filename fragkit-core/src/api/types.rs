/*!
Wire types mirroring server-side entities and import results.

Server identities are numeric longs that the JSON web services may send either
as numbers or as strings; they are normalized to `String` here.
*/

use crate::project::FragmentType;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

fn id_from_string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {other}"
        ))),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerCollection {
    #[serde(deserialize_with = "id_from_string_or_number")]
    pub fragment_collection_id: String,
    #[serde(default)]
    pub fragment_collection_key: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerFragment {
    #[serde(deserialize_with = "id_from_string_or_number")]
    pub fragment_entry_id: String,
    #[serde(default)]
    pub fragment_entry_key: String,
    pub name: String,
    #[serde(default)]
    pub css: String,
    #[serde(default)]
    pub html: String,
    #[serde(default)]
    pub js: String,
    #[serde(default)]
    pub configuration: String,
    #[serde(rename = "type", default)]
    pub fragment_type: Option<Value>,
}

impl ServerFragment {
    /// Local fragment type for the server's numeric or textual type
    pub fn local_type(&self) -> FragmentType {
        match &self.fragment_type {
            Some(Value::Number(n)) => match n.as_i64() {
                Some(0) => FragmentType::Section,
                Some(2) => FragmentType::React,
                Some(3) => FragmentType::Input,
                Some(4) => FragmentType::Element,
                _ => FragmentType::Component,
            },
            Some(Value::String(s)) => s.parse().unwrap_or_default(),
            _ => FragmentType::Component,
        }
    }
}

/// Numeric type code sent when creating fragment entries
pub fn server_type_code(fragment_type: FragmentType) -> i64 {
    match fragment_type {
        FragmentType::Section => 0,
        FragmentType::Component => 1,
        FragmentType::React => 2,
        FragmentType::Input => 3,
        FragmentType::Element => 4,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerFragmentComposition {
    #[serde(deserialize_with = "id_from_string_or_number")]
    pub fragment_composition_id: String,
    #[serde(default)]
    pub fragment_composition_key: String,
    pub name: String,
    #[serde(default)]
    pub definition_data: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ImportStatus {
    Imported,
    ImportedDraft,
    Invalid,
    Ignored,
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for ImportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ImportStatus::Imported => "imported",
            ImportStatus::ImportedDraft => "imported-draft",
            ImportStatus::Invalid => "invalid",
            ImportStatus::Ignored => "ignored",
            ImportStatus::Unknown => "unknown",
        };
        f.write_str(label)
    }
}

/// Per-entity outcome of an import
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResult {
    pub name: String,
    pub status: ImportStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl ImportResult {
    pub fn imported<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            status: ImportStatus::Imported,
            error_message: None,
        }
    }

    pub fn invalid<S: Into<String>, M: Into<String>>(name: S, message: M) -> Self {
        Self {
            name: name.into(),
            status: ImportStatus::Invalid,
            error_message: Some(message.into()),
        }
    }

    pub fn ignored<S: Into<String>, M: Into<String>>(name: S, message: M) -> Self {
        Self {
            name: name.into(),
            status: ImportStatus::Ignored,
            error_message: Some(message.into()),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.status, ImportStatus::Invalid)
    }
}

/// Body returned by the bulk import endpoint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ImportZipResponse {
    pub fragment_entries_import_result: Option<Vec<ImportResult>>,
    pub page_templates_import_result: Option<Vec<ImportResult>>,
    pub error: Option<Value>,
}

impl ImportZipResponse {
    /// Error text when the server reported a failure inside a successful response
    pub fn error_message(&self) -> Option<String> {
        match &self.error {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_accept_strings_and_numbers() {
        let from_string: ServerCollection = serde_json::from_str(
            r#"{"fragmentCollectionId": "38701", "fragmentCollectionKey": "basic", "name": "Basic"}"#,
        )
        .unwrap();
        let from_number: ServerCollection = serde_json::from_str(
            r#"{"fragmentCollectionId": 38701, "fragmentCollectionKey": "basic", "name": "Basic"}"#,
        )
        .unwrap();
        assert_eq!(from_string, from_number);
        assert_eq!(from_number.fragment_collection_id, "38701");
    }

    #[test]
    fn test_server_fragment_local_type() {
        let mut fragment: ServerFragment = serde_json::from_str(
            r#"{"fragmentEntryId": 1, "fragmentEntryKey": "card", "name": "Card", "type": 0}"#,
        )
        .unwrap();
        assert_eq!(fragment.local_type(), FragmentType::Section);

        fragment.fragment_type = Some(Value::from("react"));
        assert_eq!(fragment.local_type(), FragmentType::React);

        fragment.fragment_type = None;
        assert_eq!(fragment.local_type(), FragmentType::Component);
        assert_eq!(server_type_code(FragmentType::React), 2);
    }

    #[test]
    fn test_import_status_parsing() {
        let results: Vec<ImportResult> = serde_json::from_str(
            r#"[
                {"name": "a", "status": "imported"},
                {"name": "b", "status": "imported-draft"},
                {"name": "c", "status": "invalid", "errorMessage": "bad html"},
                {"name": "d", "status": "something-new"}
            ]"#,
        )
        .unwrap();
        assert_eq!(results[1].status, ImportStatus::ImportedDraft);
        assert_eq!(results[2].error_message.as_deref(), Some("bad html"));
        assert!(results[2].is_failure());
        assert_eq!(results[3].status, ImportStatus::Unknown);
    }

    #[test]
    fn test_import_zip_response_error() {
        let response: ImportZipResponse =
            serde_json::from_str(r#"{"error": "Unable to import"}"#).unwrap();
        assert_eq!(response.error_message().as_deref(), Some("Unable to import"));

        let response: ImportZipResponse =
            serde_json::from_str(r#"{"fragmentEntriesImportResult": []}"#).unwrap();
        assert!(response.error_message().is_none());
        assert_eq!(response.fragment_entries_import_result, Some(vec![]));
    }
}
