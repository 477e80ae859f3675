/*!
In-memory model of a fragment project.

A [`Project`] is the root aggregate: it exclusively owns its collections, their
fragments and compositions, and the page templates. Values are built fresh by
[`read_project`] on every call; re-read to observe filesystem changes.
*/

pub mod reader;
pub mod validate;
pub mod writer;

pub(crate) mod fs_utils;

pub use reader::{read_project, read_project_from_archive};
pub use validate::Validated;
pub use writer::write_project;

use crate::{FragkitError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

/// Root manifest file name
pub const PROJECT_MANIFEST: &str = "package.json";
/// Directory holding all project content
pub const SOURCE_DIR: &str = "src";
pub const COLLECTION_METADATA: &str = "collection.json";
pub const FRAGMENT_METADATA: &str = "fragment.json";
pub const COMPOSITION_METADATA: &str = "fragment-composition.json";
pub const PAGE_TEMPLATE_METADATA: &str = "page-template.json";
pub const DEFAULT_PAGE_DEFINITION: &str = "page-definition.json";
pub const DEFAULT_COMPOSITION_DEFINITION: &str = "definition.json";

/// A file the model does not interpret, preserved byte for byte
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownFile {
    /// Forward-slash path relative to the owning directory
    pub file_path: String,
    pub content: Vec<u8>,
}

impl UnknownFile {
    pub fn new<S: Into<String>>(file_path: S, content: Vec<u8>) -> Self {
        Self {
            file_path: file_path.into(),
            content,
        }
    }
}

/// Local fragment project
#[derive(Debug, Clone, PartialEq)]
pub struct Project {
    pub base_path: PathBuf,
    /// Display name from the root manifest
    pub name: String,
    pub collections: Vec<Collection>,
    pub page_templates: Vec<PageTemplate>,
    pub unknown_files: Vec<UnknownFile>,
}

impl Project {
    pub fn new<P: Into<PathBuf>, S: Into<String>>(base_path: P, name: S) -> Self {
        Self {
            base_path: base_path.into(),
            name: name.into(),
            collections: Vec::new(),
            page_templates: Vec::new(),
            unknown_files: Vec::new(),
        }
    }

    pub fn collection(&self, slug: &str) -> Option<&Collection> {
        self.collections.iter().find(|c| c.slug == slug)
    }

    pub fn collection_mut(&mut self, slug: &str) -> Option<&mut Collection> {
        self.collections.iter_mut().find(|c| c.slug == slug)
    }

    /// Iterate all fragments in collection order
    pub fn fragments(&self) -> impl Iterator<Item = (&Collection, &Fragment)> {
        self.collections
            .iter()
            .flat_map(|c| c.fragments.iter().map(move |f| (c, f)))
    }

    pub fn fragment_count(&self) -> usize {
        self.collections.iter().map(|c| c.fragments.len()).sum()
    }

    /// Check slug uniqueness for collections and for entities inside each collection
    pub fn validate_slugs(&self) -> Result<()> {
        let mut collection_slugs = HashSet::new();
        for collection in &self.collections {
            if !collection_slugs.insert(collection.slug.as_str()) {
                return Err(FragkitError::validation(format!(
                    "Duplicate collection slug: {}",
                    collection.slug
                )));
            }

            let mut entity_slugs = HashSet::new();
            let slugs = collection
                .fragments
                .iter()
                .map(|f| f.slug.as_str())
                .chain(collection.fragment_compositions.iter().map(|c| c.slug.as_str()));
            for slug in slugs {
                if !entity_slugs.insert(slug) {
                    return Err(FragkitError::validation(format!(
                        "Duplicate slug {slug} in collection {}",
                        collection.slug
                    )));
                }
            }
        }
        Ok(())
    }
}

/// `collection.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionMetadata {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// A named grouping of fragments and compositions
#[derive(Debug, Clone, PartialEq)]
pub struct Collection {
    /// Directory name; stable identity key
    pub slug: String,
    /// Identity used when talking to the server (defaults to the slug)
    pub fragment_collection_id: String,
    pub metadata: CollectionMetadata,
    pub fragments: Vec<Fragment>,
    pub fragment_compositions: Vec<FragmentComposition>,
    /// Files inside the collection directory outside any fragment or composition
    pub unknown_files: Vec<UnknownFile>,
}

impl Collection {
    pub fn new<S: Into<String>>(slug: S, metadata: CollectionMetadata) -> Self {
        let slug = slug.into();
        Self {
            fragment_collection_id: slug.clone(),
            slug,
            metadata,
            fragments: Vec::new(),
            fragment_compositions: Vec::new(),
            unknown_files: Vec::new(),
        }
    }
}

/// Kind of fragment, as declared in `fragment.json`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FragmentType {
    #[default]
    Component,
    React,
    Input,
    Section,
    Element,
}

impl FragmentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FragmentType::Component => "component",
            FragmentType::React => "react",
            FragmentType::Input => "input",
            FragmentType::Section => "section",
            FragmentType::Element => "element",
        }
    }
}

impl std::fmt::Display for FragmentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for FragmentType {
    type Err = FragkitError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "component" => Ok(FragmentType::Component),
            "react" => Ok(FragmentType::React),
            "input" => Ok(FragmentType::Input),
            "section" => Ok(FragmentType::Section),
            "element" => Ok(FragmentType::Element),
            other => Err(FragkitError::validation(format!(
                "Unknown fragment type: {other}"
            ))),
        }
    }
}

/// `fragment.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FragmentMetadata {
    pub name: String,
    #[serde(rename = "type", default)]
    pub fragment_type: FragmentType,
    pub html_path: String,
    pub css_path: String,
    pub js_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configuration_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_path: Option<String>,
}

impl FragmentMetadata {
    /// Metadata using the conventional file names
    pub fn with_defaults<S: Into<String>>(name: S, fragment_type: FragmentType) -> Self {
        Self {
            name: name.into(),
            fragment_type,
            html_path: "index.html".to_string(),
            css_path: "styles.css".to_string(),
            js_path: "main.js".to_string(),
            configuration_path: Some("configuration.json".to_string()),
            thumbnail_path: None,
        }
    }

    /// Every path this metadata points at, relative to the fragment directory
    pub fn referenced_paths(&self) -> Vec<&str> {
        let mut paths = vec![
            self.html_path.as_str(),
            self.css_path.as_str(),
            self.js_path.as_str(),
        ];
        paths.extend(self.configuration_path.as_deref());
        paths.extend(self.thumbnail_path.as_deref());
        paths
    }
}

/// A reusable HTML/CSS/JS content unit
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    pub slug: String,
    pub metadata: FragmentMetadata,
    pub html: String,
    pub css: String,
    pub js: String,
    /// Configuration schema as JSON text; empty when absent
    pub configuration: String,
    pub thumbnail: Option<Vec<u8>>,
    pub unknown_files: Vec<UnknownFile>,
}

impl Fragment {
    pub fn new<S: Into<String>>(slug: S, metadata: FragmentMetadata) -> Self {
        Self {
            slug: slug.into(),
            metadata,
            html: String::new(),
            css: String::new(),
            js: String::new(),
            configuration: String::new(),
            thumbnail: None,
            unknown_files: Vec::new(),
        }
    }
}

/// `fragment-composition.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FragmentCompositionMetadata {
    pub name: String,
    pub fragment_composition_definition_path: String,
}

/// A saved arrangement of fragments
#[derive(Debug, Clone, PartialEq)]
pub struct FragmentComposition {
    pub slug: String,
    pub metadata: FragmentCompositionMetadata,
    /// Serialized page-element tree
    pub definition_data: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PageTemplateType {
    MasterPage,
    #[default]
    PageTemplate,
    DisplayPageTemplate,
}

/// `page-template.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageTemplateMetadata {
    pub name: String,
    #[serde(rename = "type", default)]
    pub template_type: PageTemplateType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_definition_path: Option<String>,
}

impl PageTemplateMetadata {
    pub fn definition_path(&self) -> &str {
        self.page_definition_path
            .as_deref()
            .unwrap_or(DEFAULT_PAGE_DEFINITION)
    }
}

/// Master page, page template or display page template
#[derive(Debug, Clone, PartialEq)]
pub struct PageTemplate {
    pub slug: String,
    pub metadata: PageTemplateMetadata,
    pub definition_data: String,
}
