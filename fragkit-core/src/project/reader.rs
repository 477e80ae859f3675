/*!
Reads a project directory tree into a [`Project`].

Only the root manifest is fatal. Broken collections, fragments, compositions and
page templates are logged and skipped; missing content files are blanked.
*/

use super::fs_utils::{dir_name, list_files, list_subdirectories};
use super::validate::{
    validate_collection, validate_composition, validate_fragment, validate_manifest,
    validate_page_template, Validated,
};
use super::{
    Collection, Fragment, FragmentComposition, PageTemplate, Project, UnknownFile,
    COLLECTION_METADATA, COMPOSITION_METADATA, FRAGMENT_METADATA, PAGE_TEMPLATE_METADATA,
    PROJECT_MANIFEST, SOURCE_DIR,
};
use crate::{FragkitError, Result};
use futures::future::join_all;
use std::collections::HashSet;
use std::path::{Component, Path};
use tracing::{debug, error, warn};

/// Read the project rooted at `base_path`
///
/// # Errors
/// * `FragkitError::InvalidProject` - if `package.json` is missing or not a JSON object with a name
/// * `FragkitError::Io` - if the `src` directory exists but cannot be listed
pub async fn read_project<P: AsRef<Path>>(base_path: P) -> Result<Project> {
    let base_path = base_path.as_ref();
    let manifest_path = base_path.join(PROJECT_MANIFEST);

    let manifest = tokio::fs::read_to_string(&manifest_path)
        .await
        .map_err(|e| {
            FragkitError::invalid_project(base_path, format!("cannot read {PROJECT_MANIFEST}: {e}"))
        })?;
    let name = validate_manifest(&manifest)
        .into_result()
        .map_err(|reason| {
            FragkitError::invalid_project(base_path, format!("{PROJECT_MANIFEST}: {reason}"))
        })?;

    let entity_dirs = list_subdirectories(&base_path.join(SOURCE_DIR)).await?;

    let collections = join_all(entity_dirs.iter().map(|dir| read_collection(dir))).await;
    let collections: Vec<Collection> = collections.into_iter().collect::<Result<Vec<_>>>()?
        .into_iter()
        .flatten()
        .collect();

    let page_templates = join_all(entity_dirs.iter().map(|dir| read_page_template(dir))).await;
    let page_templates: Vec<PageTemplate> = page_templates.into_iter().flatten().collect();

    let unknown_files = read_root_unknown_files(base_path).await?;

    debug!(
        project = %name,
        collections = collections.len(),
        page_templates = page_templates.len(),
        "Read project"
    );

    Ok(Project {
        base_path: base_path.to_path_buf(),
        name,
        collections,
        page_templates,
        unknown_files,
    })
}

/// Read back a project from an archive produced by [`crate::packager::compress`]
///
/// Archives carry only the `src` tree, so the manifest name has to be supplied.
/// The scratch directory is removed before returning.
pub async fn read_project_from_archive(archive: &[u8], name: &str) -> Result<Project> {
    let scratch = tempfile::TempDir::new()?;
    let manifest = serde_json::json!({ "name": name });
    tokio::fs::write(
        scratch.path().join(PROJECT_MANIFEST),
        serde_json::to_vec_pretty(&manifest)?,
    )
    .await?;

    crate::packager::extract_archive(archive, &scratch.path().join(SOURCE_DIR)).await?;
    read_project(scratch.path()).await
}

/// Metadata file text, or `None` when the file does not exist or cannot be read
async fn read_metadata_text(path: &Path) -> Option<String> {
    match tokio::fs::read_to_string(path).await {
        Ok(text) => Some(text),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => {
            error!(path = %path.display(), error = %e, "Failed to read metadata file");
            None
        }
    }
}

async fn read_collection(dir: &Path) -> Result<Option<Collection>> {
    let metadata_path = dir.join(COLLECTION_METADATA);
    let Some(text) = read_metadata_text(&metadata_path).await else {
        return Ok(None);
    };
    let metadata = match validate_collection(&text) {
        Validated::Valid(metadata) => metadata,
        Validated::Invalid(reason) => {
            error!(path = %metadata_path.display(), %reason, "Skipping invalid collection");
            return Ok(None);
        }
    };

    let mut collection = Collection::new(dir_name(dir), metadata);
    let children = list_subdirectories(dir).await?;
    let mut claimed_dirs = HashSet::new();

    let entries = join_all(children.iter().map(|child| read_collection_entry(child))).await;
    for (child, entry) in children.iter().zip(entries) {
        match entry {
            CollectionEntry::Fragment(fragment) => {
                claimed_dirs.insert(dir_name(child));
                collection.fragments.push(fragment);
            }
            CollectionEntry::Composition(composition) => {
                claimed_dirs.insert(dir_name(child));
                collection.fragment_compositions.push(composition);
            }
            CollectionEntry::Skipped => {
                claimed_dirs.insert(dir_name(child));
            }
            CollectionEntry::NotAnEntity => {}
        }
    }

    let mut unknown_paths = Vec::new();
    for relative in list_files(dir).await? {
        if relative == COLLECTION_METADATA {
            continue;
        }
        let top = relative.split('/').next().unwrap_or_default();
        if relative.contains('/') && claimed_dirs.contains(top) {
            continue;
        }
        unknown_paths.push(relative);
    }
    collection.unknown_files = read_unknown_files(dir, unknown_paths).await;

    Ok(Some(collection))
}

enum CollectionEntry {
    Fragment(Fragment),
    Composition(FragmentComposition),
    /// Had a metadata file that failed validation
    Skipped,
    NotAnEntity,
}

async fn read_collection_entry(dir: &Path) -> CollectionEntry {
    if let Some(text) = read_metadata_text(&dir.join(FRAGMENT_METADATA)).await {
        return match read_fragment(dir, &text).await {
            Some(fragment) => CollectionEntry::Fragment(fragment),
            None => CollectionEntry::Skipped,
        };
    }
    if let Some(text) = read_metadata_text(&dir.join(COMPOSITION_METADATA)).await {
        return match read_composition(dir, &text).await {
            Some(composition) => CollectionEntry::Composition(composition),
            None => CollectionEntry::Skipped,
        };
    }
    CollectionEntry::NotAnEntity
}

async fn read_fragment(dir: &Path, text: &str) -> Option<Fragment> {
    let metadata = match validate_fragment(text) {
        Validated::Valid(metadata) => metadata,
        Validated::Invalid(reason) => {
            error!(
                path = %dir.join(FRAGMENT_METADATA).display(),
                %reason,
                "Skipping invalid fragment"
            );
            return None;
        }
    };

    let mut fragment = Fragment::new(dir_name(dir), metadata);
    fragment.html = read_content_or_empty(dir, &fragment.metadata.html_path).await;
    fragment.css = read_content_or_empty(dir, &fragment.metadata.css_path).await;
    fragment.js = read_content_or_empty(dir, &fragment.metadata.js_path).await;
    if let Some(path) = fragment.metadata.configuration_path.as_deref() {
        fragment.configuration = read_content_or_empty(dir, path).await;
    }
    if let Some(path) = fragment.metadata.thumbnail_path.as_deref() {
        let thumbnail_path = dir.join(path);
        match tokio::fs::read(&thumbnail_path).await {
            Ok(bytes) => fragment.thumbnail = Some(bytes),
            Err(e) => warn!(path = %thumbnail_path.display(), error = %e, "Thumbnail not readable"),
        }
    }

    let referenced: HashSet<String> = fragment
        .metadata
        .referenced_paths()
        .into_iter()
        .map(normalize_slash_path)
        .collect();
    let unknown_paths = match list_files(dir).await {
        Ok(files) => files
            .into_iter()
            .filter(|f| f != FRAGMENT_METADATA && !referenced.contains(f))
            .collect(),
        Err(e) => {
            error!(path = %dir.display(), error = %e, "Failed to list fragment directory");
            Vec::new()
        }
    };
    fragment.unknown_files = read_unknown_files(dir, unknown_paths).await;

    Some(fragment)
}

async fn read_composition(dir: &Path, text: &str) -> Option<FragmentComposition> {
    let metadata = match validate_composition(text) {
        Validated::Valid(metadata) => metadata,
        Validated::Invalid(reason) => {
            error!(
                path = %dir.join(COMPOSITION_METADATA).display(),
                %reason,
                "Skipping invalid fragment composition"
            );
            return None;
        }
    };
    let definition_data =
        read_content_or_empty(dir, &metadata.fragment_composition_definition_path).await;

    Some(FragmentComposition {
        slug: dir_name(dir),
        metadata,
        definition_data,
    })
}

async fn read_page_template(dir: &Path) -> Option<PageTemplate> {
    let metadata_path = dir.join(PAGE_TEMPLATE_METADATA);
    let text = read_metadata_text(&metadata_path).await?;
    let metadata = match validate_page_template(&text) {
        Validated::Valid(metadata) => metadata,
        Validated::Invalid(reason) => {
            error!(path = %metadata_path.display(), %reason, "Skipping invalid page template");
            return None;
        }
    };
    let definition_data = read_content_or_empty(dir, metadata.definition_path()).await;

    Some(PageTemplate {
        slug: dir_name(dir),
        metadata,
        definition_data,
    })
}

async fn read_content_or_empty(dir: &Path, relative: &str) -> String {
    let path = dir.join(relative);
    match tokio::fs::read_to_string(&path).await {
        Ok(content) => content,
        Err(e) => {
            error!(path = %path.display(), error = %e, "Content file not readable, using empty content");
            String::new()
        }
    }
}

async fn read_unknown_files(dir: &Path, relative_paths: Vec<String>) -> Vec<UnknownFile> {
    let mut files = Vec::with_capacity(relative_paths.len());
    for relative in relative_paths {
        match tokio::fs::read(dir.join(&relative)).await {
            Ok(content) => files.push(UnknownFile::new(relative, content)),
            Err(e) => error!(path = %dir.join(&relative).display(), error = %e, "Failed to read file"),
        }
    }
    files
}

async fn read_root_unknown_files(base_path: &Path) -> Result<Vec<UnknownFile>> {
    let mut entries = tokio::fs::read_dir(base_path).await?;
    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if name != PROJECT_MANIFEST {
            names.push(name);
        }
    }
    names.sort();
    Ok(read_unknown_files(base_path, names).await)
}

/// `./a//b.js` → `a/b.js`
fn normalize_slash_path(path: &str) -> String {
    Path::new(path)
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
