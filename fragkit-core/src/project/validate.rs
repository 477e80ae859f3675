/*!
Schema validation for per-entity metadata files.

Each validator takes the raw text of a metadata file and returns a
[`Validated`] value. The reader logs and skips anything `Invalid`.
*/

use super::{
    CollectionMetadata, FragmentCompositionMetadata, FragmentMetadata, PageTemplateMetadata,
};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::path::{Component, Path};

/// Outcome of validating one metadata file
#[derive(Debug, Clone, PartialEq)]
pub enum Validated<T> {
    Valid(T),
    Invalid(String),
}

impl<T> Validated<T> {
    pub fn is_valid(&self) -> bool {
        matches!(self, Validated::Valid(_))
    }

    pub fn into_result(self) -> std::result::Result<T, String> {
        match self {
            Validated::Valid(value) => Ok(value),
            Validated::Invalid(reason) => Err(reason),
        }
    }
}

pub fn validate_collection(text: &str) -> Validated<CollectionMetadata> {
    validate_with(text, &["name"], &[], |_: &CollectionMetadata| Ok(()))
}

pub fn validate_fragment(text: &str) -> Validated<FragmentMetadata> {
    validate_with(
        text,
        &["name", "htmlPath", "cssPath", "jsPath"],
        &["type", "configurationPath", "thumbnailPath"],
        |metadata: &FragmentMetadata| {
            for path in metadata.referenced_paths() {
                check_relative_path(path)?;
            }
            Ok(())
        },
    )
}

pub fn validate_composition(text: &str) -> Validated<FragmentCompositionMetadata> {
    validate_with(
        text,
        &["name", "fragmentCompositionDefinitionPath"],
        &[],
        |metadata: &FragmentCompositionMetadata| {
            check_relative_path(&metadata.fragment_composition_definition_path)
        },
    )
}

pub fn validate_page_template(text: &str) -> Validated<PageTemplateMetadata> {
    validate_with(
        text,
        &["name"],
        &["type", "pageDefinitionPath"],
        |metadata: &PageTemplateMetadata| check_relative_path(metadata.definition_path()),
    )
}

/// Parse the root manifest and return the project name
pub fn validate_manifest(text: &str) -> Validated<String> {
    let object = match parse_object(text) {
        Ok(object) => object,
        Err(reason) => return Validated::Invalid(reason),
    };
    match object.get("name") {
        Some(Value::String(name)) => Validated::Valid(name.clone()),
        Some(_) => Validated::Invalid("\"name\" must be a string".to_string()),
        None => Validated::Invalid("missing required key \"name\"".to_string()),
    }
}

/// Reject absolute paths and paths climbing out of the entity directory
pub fn check_relative_path(path: &str) -> std::result::Result<(), String> {
    if path.is_empty() {
        return Err("content path must not be empty".to_string());
    }
    let escapes = Path::new(path).components().any(|c| {
        matches!(
            c,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    });
    if escapes {
        return Err(format!("content path {path:?} escapes the entity directory"));
    }
    Ok(())
}

/// Accept only a single plain directory name usable as an entity slug
pub fn check_slug(slug: &str) -> std::result::Result<(), String> {
    let mut components = Path::new(slug).components();
    let single_name = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    );
    if !single_name || slug.contains(['/', '\\']) {
        return Err(format!("slug {slug:?} is not a plain directory name"));
    }
    Ok(())
}

fn parse_object(text: &str) -> std::result::Result<Map<String, Value>, String> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(object)) => Ok(object),
        Ok(_) => Err("metadata must be a JSON object".to_string()),
        Err(e) => Err(format!("invalid JSON: {e}")),
    }
}

fn validate_with<T, F>(
    text: &str,
    required_strings: &[&str],
    optional_strings: &[&str],
    check: F,
) -> Validated<T>
where
    T: DeserializeOwned,
    F: FnOnce(&T) -> std::result::Result<(), String>,
{
    let object = match parse_object(text) {
        Ok(object) => object,
        Err(reason) => return Validated::Invalid(reason),
    };

    for key in required_strings {
        match object.get(*key) {
            Some(Value::String(_)) => {}
            Some(_) => return Validated::Invalid(format!("\"{key}\" must be a string")),
            None => return Validated::Invalid(format!("missing required key \"{key}\"")),
        }
    }
    for key in optional_strings {
        match object.get(*key) {
            None | Some(Value::String(_)) => {}
            Some(_) => return Validated::Invalid(format!("\"{key}\" must be a string")),
        }
    }

    let value: T = match serde_json::from_value(Value::Object(object)) {
        Ok(value) => value,
        Err(e) => return Validated::Invalid(e.to_string()),
    };

    match check(&value) {
        Ok(()) => Validated::Valid(value),
        Err(reason) => Validated::Invalid(reason),
    }
}
