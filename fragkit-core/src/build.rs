/*!
Bundling step for projects with React fragments.

When the project carries a bundler configuration and at least one `react`
fragment, the external bundler runs in the project directory. Its output is
copied over each React fragment's script inside a scratch copy of the project,
and the scratch copy is read back. The source project is never modified.
*/

use crate::project::{read_project, write_project, FragmentType, Project, SOURCE_DIR};
use crate::{FragkitError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::process::Command;
use tracing::{debug, info};

/// Bundler invocation settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BuildConfig {
    /// Bundler configuration, relative to the project base path
    pub config_file: PathBuf,
    pub command: String,
    pub args: Vec<String>,
    /// Bundled scripts land in `<output_dir>/<collection>/<fragment>.js`
    pub output_dir: PathBuf,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            config_file: PathBuf::from("liferay-fragments.bundler.json"),
            command: "npx".to_string(),
            args: vec!["liferay-npm-bundler".to_string()],
            output_dir: PathBuf::from("build/bundle"),
        }
    }
}

impl BuildConfig {
    fn bundled_script(&self, project: &Project, collection: &str, fragment: &str) -> PathBuf {
        project
            .base_path
            .join(&self.output_dir)
            .join(collection)
            .join(format!("{fragment}.js"))
    }
}

/// Build `project`, returning the bundled version or an unchanged copy
pub async fn build_project(project: &Project, config: &BuildConfig) -> Result<Project> {
    let config_path = project.base_path.join(&config.config_file);
    if !tokio::fs::try_exists(&config_path).await.unwrap_or(false) {
        debug!(path = %config_path.display(), "No bundler configuration, skipping build");
        return Ok(project.clone());
    }

    let bundled: Vec<(String, String, String)> = project
        .fragments()
        .filter(|(_, fragment)| fragment.metadata.fragment_type == FragmentType::React)
        .map(|(collection, fragment)| {
            (
                collection.slug.clone(),
                fragment.slug.clone(),
                fragment.metadata.js_path.clone(),
            )
        })
        .collect();
    if bundled.is_empty() {
        debug!(project = %project.name, "No react fragments, skipping build");
        return Ok(project.clone());
    }

    run_bundler(project, config).await?;

    let scratch = tempfile::TempDir::new()?;
    write_project(scratch.path(), project).await?;
    for (collection, fragment, js_path) in &bundled {
        let source = config.bundled_script(project, collection, fragment);
        let script = tokio::fs::read(&source).await.map_err(|e| {
            FragkitError::build(format!(
                "Missing bundler output {} for fragment {collection}/{fragment}: {e}",
                source.display()
            ))
        })?;
        let target = scratch
            .path()
            .join(SOURCE_DIR)
            .join(collection)
            .join(fragment)
            .join(js_path);
        tokio::fs::write(&target, script).await?;
    }

    let mut built = read_project(scratch.path()).await?;
    built.base_path = project.base_path.clone();
    info!(project = %project.name, fragments = bundled.len(), "Bundled react fragments");
    Ok(built)
}

async fn run_bundler(project: &Project, config: &BuildConfig) -> Result<()> {
    info!(command = %config.command, args = ?config.args, "Running bundler");
    let output = Command::new(&config.command)
        .args(&config.args)
        .current_dir(&project.base_path)
        .output()
        .await
        .map_err(|e| FragkitError::build(format!("Failed to start {}: {e}", config.command)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(FragkitError::build(format!(
            "{} exited with {}: {}",
            config.command,
            output.status,
            stderr.trim()
        )));
    }
    Ok(())
}
