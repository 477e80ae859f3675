/*!
Writes a [`Project`] back to a directory tree.

Writing is a merge, not a sync: JSON metadata is shallow-merged over whatever
already exists at the target path, content files are overwritten, and nothing
absent from the project is ever deleted. There is no rollback if a write fails
part way. Unsafe slugs are rejected before anything is written.
*/

use super::validate::check_slug;
use super::{
    Collection, Fragment, FragmentComposition, PageTemplate, Project, UnknownFile,
    COLLECTION_METADATA, COMPOSITION_METADATA, FRAGMENT_METADATA, PAGE_TEMPLATE_METADATA,
    PROJECT_MANIFEST, SOURCE_DIR,
};
use crate::{FragkitError, Result};
use serde::Serialize;
use serde_json::Value;
use std::path::Path;
use tracing::{debug, warn};

/// Write `project` under `base_path`
pub async fn write_project<P: AsRef<Path>>(base_path: P, project: &Project) -> Result<()> {
    let base_path = base_path.as_ref();
    check_slugs(project)?;
    tokio::fs::create_dir_all(base_path).await?;

    write_json_merged(
        &base_path.join(PROJECT_MANIFEST),
        &serde_json::json!({ "name": project.name }),
    )
    .await?;
    write_unknown_files(base_path, &project.unknown_files).await?;

    let src = base_path.join(SOURCE_DIR);
    for collection in &project.collections {
        write_collection(&src.join(&collection.slug), collection).await?;
    }
    for page_template in &project.page_templates {
        write_page_template(&src.join(&page_template.slug), page_template).await?;
    }

    debug!(
        path = %base_path.display(),
        collections = project.collections.len(),
        "Wrote project"
    );
    Ok(())
}

/// Every slug becomes a directory name, so each must be a single plain component
fn check_slugs(project: &Project) -> Result<()> {
    let collections = project.collections.iter().flat_map(|collection| {
        std::iter::once(&collection.slug)
            .chain(collection.fragments.iter().map(|f| &f.slug))
            .chain(collection.fragment_compositions.iter().map(|c| &c.slug))
    });
    let page_templates = project.page_templates.iter().map(|t| &t.slug);

    for slug in collections.chain(page_templates) {
        check_slug(slug).map_err(FragkitError::validation)?;
    }
    Ok(())
}

async fn write_collection(dir: &Path, collection: &Collection) -> Result<()> {
    write_json_merged(&dir.join(COLLECTION_METADATA), &collection.metadata).await?;
    write_unknown_files(dir, &collection.unknown_files).await?;

    for fragment in &collection.fragments {
        write_fragment(&dir.join(&fragment.slug), fragment).await?;
    }
    for composition in &collection.fragment_compositions {
        write_composition(&dir.join(&composition.slug), composition).await?;
    }
    Ok(())
}

async fn write_fragment(dir: &Path, fragment: &Fragment) -> Result<()> {
    let metadata = &fragment.metadata;
    write_json_merged(&dir.join(FRAGMENT_METADATA), metadata).await?;

    write_file(&dir.join(&metadata.html_path), fragment.html.as_bytes()).await?;
    write_file(&dir.join(&metadata.css_path), fragment.css.as_bytes()).await?;
    write_file(&dir.join(&metadata.js_path), fragment.js.as_bytes()).await?;
    if let Some(path) = &metadata.configuration_path {
        write_file(&dir.join(path), fragment.configuration.as_bytes()).await?;
    }
    if let (Some(path), Some(thumbnail)) = (&metadata.thumbnail_path, &fragment.thumbnail) {
        write_file(&dir.join(path), thumbnail).await?;
    }

    write_unknown_files(dir, &fragment.unknown_files).await
}

async fn write_composition(dir: &Path, composition: &FragmentComposition) -> Result<()> {
    write_json_merged(&dir.join(COMPOSITION_METADATA), &composition.metadata).await?;
    write_file(
        &dir.join(&composition.metadata.fragment_composition_definition_path),
        composition.definition_data.as_bytes(),
    )
    .await
}

async fn write_page_template(dir: &Path, page_template: &PageTemplate) -> Result<()> {
    write_json_merged(&dir.join(PAGE_TEMPLATE_METADATA), &page_template.metadata).await?;
    write_file(
        &dir.join(page_template.metadata.definition_path()),
        page_template.definition_data.as_bytes(),
    )
    .await
}

async fn write_unknown_files(dir: &Path, files: &[UnknownFile]) -> Result<()> {
    for file in files {
        write_file(&dir.join(&file.file_path), &file.content).await?;
    }
    Ok(())
}

/// Write raw bytes, creating parent directories as needed
async fn write_file(path: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, content).await.map_err(|e| {
        FragkitError::Io(std::io::Error::new(
            e.kind(),
            format!("Failed to write {}: {e}", path.display()),
        ))
    })
}

/// Serialize `value` and shallow-merge it over the JSON object already at `path`
pub(crate) async fn write_json_merged<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let new_value = serde_json::to_value(value)?;
    let existing = match tokio::fs::read_to_string(path).await {
        Ok(text) => match serde_json::from_str::<Value>(&text) {
            Ok(existing @ Value::Object(_)) => Some(existing),
            _ => {
                warn!(path = %path.display(), "Existing metadata is not a JSON object, replacing it");
                None
            }
        },
        Err(_) => None,
    };

    let merged = match existing {
        Some(existing) => merge_shallow(existing, new_value),
        None => new_value,
    };

    let mut text = serde_json::to_string_pretty(&merged)?;
    text.push('\n');
    write_file(path, text.as_bytes()).await
}

/// Keys in `overlay` replace keys in `base`; keys only in `base` survive
pub fn merge_shallow(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                base.insert(key, value);
            }
            Value::Object(base)
        }
        (_, overlay) => overlay,
    }
}
