//! Directory walking helpers shared by the reader, packager and export engine.

use crate::{FragkitError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// All regular files below `dir`, as forward-slash paths relative to `dir`, sorted
pub(crate) async fn list_files(dir: &Path) -> Result<Vec<String>> {
    let dir = dir.to_path_buf();
    tokio::task::spawn_blocking(move || list_files_blocking(&dir)).await?
}

pub(crate) fn list_files_blocking(dir: &Path) -> Result<Vec<String>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        files.push(relative_slash_path(dir, entry.path())?);
    }
    Ok(files)
}

/// `path` relative to `base`, joined with forward slashes
pub(crate) fn relative_slash_path(base: &Path, path: &Path) -> Result<String> {
    let relative = path.strip_prefix(base).map_err(|_| {
        FragkitError::validation(format!(
            "{} is not inside {}",
            path.display(),
            base.display()
        ))
    })?;
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Ok(parts.join("/"))
}

/// Immediate subdirectories of `dir` in name order; a missing `dir` yields none
pub(crate) async fn list_subdirectories(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut dirs = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_dir() {
            dirs.push(entry.path());
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// Source and target of every file under `from`, mirrored under `to`
///
/// Fails before anything is copied when a target is an existing directory or
/// sits below an existing non-directory.
pub(crate) fn plan_copy_blocking(from: &Path, to: &Path) -> Result<Vec<(PathBuf, PathBuf)>> {
    let mut plan = Vec::new();
    for relative in list_files_blocking(from)? {
        let target = to.join(&relative);
        if target.is_dir() {
            return Err(copy_conflict(&target, "is a directory"));
        }
        if let Some(blocked) = target
            .ancestors()
            .skip(1)
            .find(|ancestor| ancestor.exists() && !ancestor.is_dir())
        {
            return Err(copy_conflict(blocked, "is not a directory"));
        }
        plan.push((from.join(&relative), target));
    }
    Ok(plan)
}

fn copy_conflict(path: &Path, problem: &str) -> FragkitError {
    FragkitError::Io(std::io::Error::new(
        std::io::ErrorKind::AlreadyExists,
        format!("Cannot copy over {}: it {problem}", path.display()),
    ))
}

/// Copy a plan from [`plan_copy_blocking`], creating directories and overwriting files
pub(crate) fn copy_planned_blocking(plan: &[(PathBuf, PathBuf)]) -> Result<usize> {
    for (source, target) in plan {
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(source, target)?;
    }
    Ok(plan.len())
}

pub(crate) fn dir_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
