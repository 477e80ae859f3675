/*!
Packaging of projects into zip archives.

The archive is always built from a freshly written copy of the project, so it
holds the same merge-resolved content a later [`read_project`] would see rather
than the raw in-memory values.

[`read_project`]: crate::project::read_project
*/

use crate::project::fs_utils::list_files_blocking;
use crate::project::{write_project, Project, SOURCE_DIR};
use crate::{FragkitError, Result};
use bytes::Bytes;
use serde_json::{Map, Value};
use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Name of the optional deployment descriptor entry
pub const DEPLOYMENT_DESCRIPTOR: &str = "liferay-deploy-fragments.json";
/// Output location of [`write_archive`], relative to the project base path
pub const ARCHIVE_PATH: &str = "build/liferay-fragments.zip";

/// Options for [`compress`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompressOptions {
    pub add_deployment_descriptor: bool,
    pub company_web_id: Option<String>,
    pub group_key: Option<String>,
}

impl CompressOptions {
    /// Options producing a descriptor for the given company and site
    pub fn with_descriptor(company_web_id: Option<String>, group_key: Option<String>) -> Self {
        Self {
            add_deployment_descriptor: true,
            company_web_id,
            group_key,
        }
    }
}

/// Descriptor content for the given target
///
/// `companyWebId` is omitted when empty or the `*` wildcard. `groupKey` is only
/// kept alongside a `companyWebId`.
pub fn deployment_descriptor(company_web_id: Option<&str>, group_key: Option<&str>) -> Value {
    let mut descriptor = Map::new();
    if let Some(company_web_id) = company_web_id.filter(|id| !id.is_empty() && *id != "*") {
        descriptor.insert("companyWebId".to_string(), Value::from(company_web_id));
        if let Some(group_key) = group_key.filter(|key| !key.is_empty()) {
            descriptor.insert("groupKey".to_string(), Value::from(group_key));
        }
    }
    Value::Object(descriptor)
}

/// Package `project` into an in-memory zip archive rooted at `src/`
pub async fn compress(project: &Project, options: &CompressOptions) -> Result<Bytes> {
    let scratch = tempfile::TempDir::new()?;
    write_project(scratch.path(), project).await?;

    let descriptor = options.add_deployment_descriptor.then(|| {
        deployment_descriptor(
            options.company_web_id.as_deref(),
            options.group_key.as_deref(),
        )
    });
    let src = scratch.path().join(SOURCE_DIR);
    let archive =
        tokio::task::spawn_blocking(move || build_archive(&src, descriptor.as_ref())).await??;

    debug!(
        project = %project.name,
        size = archive.len(),
        "Compressed project"
    );
    Ok(Bytes::from(archive))
}

/// Package `project` and save the archive under `<base_path>/build`
pub async fn write_archive(project: &Project, options: &CompressOptions) -> Result<PathBuf> {
    let archive = compress(project, options).await?;
    let target = project.base_path.join(ARCHIVE_PATH);
    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&target, &archive).await?;

    info!(path = %target.display(), size = archive.len(), "Wrote fragments archive");
    Ok(target)
}

fn build_archive(src: &Path, descriptor: Option<&Value>) -> Result<Vec<u8>> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::<()>::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o644);

    let files = if src.is_dir() {
        list_files_blocking(src)?
    } else {
        Vec::new()
    };
    for relative in files {
        let content = fs::read(src.join(&relative))?;
        zip.start_file(relative, options)?;
        zip.write_all(&content)?;
    }

    if let Some(descriptor) = descriptor {
        zip.start_file(DEPLOYMENT_DESCRIPTOR, options)?;
        zip.write_all(&serde_json::to_vec_pretty(descriptor)?)?;
    }

    let cursor = zip.finish()?;
    Ok(cursor.into_inner())
}

/// Unpack `archive` into `destination`, returning the number of files written
///
/// Entries whose names would land outside `destination` are skipped.
pub async fn extract_archive(archive: &[u8], destination: &Path) -> Result<usize> {
    let archive = archive.to_vec();
    let destination = destination.to_path_buf();
    tokio::task::spawn_blocking(move || extract_archive_blocking(&archive, &destination)).await?
}

fn extract_archive_blocking(archive: &[u8], destination: &Path) -> Result<usize> {
    let mut archive = ZipArchive::new(Cursor::new(archive))
        .map_err(|e| FragkitError::archive(format!("Not a valid zip archive: {e}")))?;
    fs::create_dir_all(destination)?;

    let mut extracted = 0;
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let Some(relative) = entry.enclosed_name() else {
            warn!(entry = %entry.name(), "Skipping archive entry with unsafe path");
            continue;
        };
        let target = destination.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&target)?;
            continue;
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = fs::File::create(&target)?;
        std::io::copy(&mut entry, &mut file)?;
        extracted += 1;
    }
    Ok(extracted)
}

/// Names of all entries in `archive`, in archive order
pub fn archive_entries(archive: &[u8]) -> Result<Vec<String>> {
    let mut archive = ZipArchive::new(Cursor::new(archive))?;
    let mut names = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        names.push(archive.by_index(i)?.name().to_string());
    }
    Ok(names)
}
