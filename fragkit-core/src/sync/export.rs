/*!
Export of a remote site into a local project directory.

The bulk path downloads one archive and copies its entity folders into
`<destination>/src`. Any failure there switches to the legacy path, which
rebuilds collections from per-collection API calls and writes them with the
project writer.

Bulk output is extracted to a scratch directory and checked against the
destination before the first file is copied, so conflicting output falls back
without touching the destination. Server keys that are not plain directory
names are skipped, and keys colliding inside a collection get a numeric suffix.
*/

use super::{bulk_failure, CachedSession};
use super::strategy::{choose_strategy, BulkOutcome, Strategy, StrategyState};
use crate::api::{FragmentsApi, ServerCollection, ServerFragment, ServerFragmentComposition, Session};
use crate::observability::record_fallback;
use crate::packager::extract_archive;
use crate::project::fs_utils::{
    copy_planned_blocking, dir_name, list_subdirectories, plan_copy_blocking,
};
use crate::project::validate::check_slug;
use crate::project::writer::write_json_merged;
use crate::project::{
    read_project, write_project, Collection, CollectionMetadata, Fragment, FragmentComposition,
    FragmentCompositionMetadata, FragmentMetadata, Project, DEFAULT_COMPOSITION_DEFINITION,
    PROJECT_MANIFEST, SOURCE_DIR,
};
use crate::Result;
use futures::future::join_all;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Top-level folders of a bulk export archive whose children become `src/` entries
pub const BULK_EXPORT_DIRS: [&str; 4] = [
    "fragments",
    "master-pages",
    "page-templates",
    "display-page-templates",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub strategy: Strategy,
    pub collections: usize,
    pub fragments: usize,
    pub page_templates: usize,
}

impl ExportSummary {
    fn of(strategy: Strategy, project: &Project) -> Self {
        Self {
            strategy,
            collections: project.collections.len(),
            fragments: project.fragment_count(),
            page_templates: project.page_templates.len(),
        }
    }
}

pub struct ExportEngine<A: FragmentsApi> {
    api: Arc<A>,
    session: CachedSession,
}

impl<A: FragmentsApi> ExportEngine<A> {
    pub fn new(api: Arc<A>, session: Session) -> Self {
        Self {
            api,
            session: CachedSession::new(session),
        }
    }

    /// Session as of the last refresh
    pub async fn session(&self) -> Session {
        self.session.get().await
    }

    /// Export the site `group_id` into the project at `destination`
    pub async fn export_project<P: AsRef<Path>>(
        &self,
        group_id: &str,
        destination: P,
    ) -> Result<ExportSummary> {
        let destination = destination.as_ref();
        let session = self.session.refresh(self.api.as_ref()).await;

        let outcome = match self.export_bulk(&session, group_id, destination).await {
            Ok(()) => BulkOutcome::Completed,
            Err(error) => bulk_failure(&error),
        };

        let strategy = match choose_strategy(StrategyState::Bulk, &outcome) {
            StrategyState::Legacy => {
                warn!(
                    group_id,
                    reason = outcome.reason().unwrap_or_default(),
                    "Bulk export failed, falling back to legacy export"
                );
                record_fallback("export");
                self.export_legacy(&session, group_id, destination).await?;
                Strategy::Legacy
            }
            StrategyState::Bulk | StrategyState::Done => Strategy::Bulk,
        };

        let project = read_project(destination).await?;
        let summary = ExportSummary::of(strategy, &project);
        info!(
            group_id,
            destination = %destination.display(),
            strategy = %summary.strategy,
            collections = summary.collections,
            fragments = summary.fragments,
            "Exported site"
        );
        Ok(summary)
    }

    async fn export_bulk(&self, session: &Session, group_id: &str, destination: &Path) -> Result<()> {
        let archive = self.api.export_zip(session, group_id).await?;

        let scratch = tempfile::TempDir::new()?;
        extract_archive(&archive, scratch.path()).await?;

        let mut entries: Vec<PathBuf> = Vec::new();
        for dir in BULK_EXPORT_DIRS {
            entries.extend(list_subdirectories(&scratch.path().join(dir)).await?);
        }

        let src = destination.join(SOURCE_DIR);
        let copied = tokio::task::spawn_blocking(move || -> Result<usize> {
            let mut plan = Vec::new();
            for entry in &entries {
                plan.extend(plan_copy_blocking(entry, &src.join(dir_name(entry)))?);
            }
            copy_planned_blocking(&plan)
        })
        .await??;

        ensure_manifest(destination).await?;
        debug!(copied, destination = %destination.display(), "Copied bulk export");
        Ok(())
    }

    async fn export_legacy(&self, session: &Session, group_id: &str, destination: &Path) -> Result<()> {
        let remote = self.api.get_fragment_collections(session, group_id).await?;
        let collections = join_all(
            remote
                .iter()
                .map(|collection| self.export_collection(session, group_id, collection)),
        )
        .await
        .into_iter()
        .collect::<Result<Vec<_>>>()?;

        let mut project = Project::new(destination, project_name(destination).await);
        project.collections = unique_collections(collections.into_iter().flatten().collect());
        project.validate_slugs()?;
        write_project(destination, &project).await
    }

    async fn export_collection(
        &self,
        session: &Session,
        group_id: &str,
        remote: &ServerCollection,
    ) -> Result<Option<Collection>> {
        let id = &remote.fragment_collection_id;
        let (entries, compositions) = futures::join!(
            self.api.get_fragment_entries(session, group_id, id),
            self.api.get_fragment_compositions(session, group_id, id),
        );
        Ok(local_collection(remote, entries?, compositions))
    }
}

fn non_empty_or<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.is_empty() {
        fallback
    } else {
        value
    }
}

/// Local slug for a server key, or `None` when it is not a plain directory name
fn safe_slug(kind: &str, key: &str, id: &str) -> Option<String> {
    let slug = non_empty_or(key, id);
    match check_slug(slug) {
        Ok(()) => Some(slug.to_string()),
        Err(reason) => {
            warn!(kind, id, %reason, "Skipping remote entity with unusable key");
            None
        }
    }
}

/// `slug`, or `slug-2`, `slug-3`, ... if already taken
fn unique_slug(slug: String, taken: &mut HashSet<String>) -> String {
    let mut candidate = slug.clone();
    let mut n = 2;
    while taken.contains(&candidate) {
        candidate = format!("{slug}-{n}");
        n += 1;
    }
    taken.insert(candidate.clone());
    candidate
}

fn unique_collections(mut collections: Vec<Collection>) -> Vec<Collection> {
    let mut taken = HashSet::new();
    for collection in &mut collections {
        collection.slug = unique_slug(std::mem::take(&mut collection.slug), &mut taken);
    }
    collections
}

/// Local collection with conventional file names for remote entities
///
/// Returns `None` when the collection key cannot be used as a directory name.
/// Entries and compositions with unusable keys are dropped.
pub fn local_collection(
    remote: &ServerCollection,
    entries: Vec<ServerFragment>,
    compositions: Vec<ServerFragmentComposition>,
) -> Option<Collection> {
    let slug = safe_slug(
        "collection",
        &remote.fragment_collection_key,
        &remote.fragment_collection_id,
    )?;
    let mut taken = HashSet::new();
    let mut collection = Collection::new(
        slug,
        CollectionMetadata {
            name: remote.name.clone(),
            description: remote.description.clone(),
        },
    );
    collection.fragment_collection_id = remote.fragment_collection_id.clone();

    collection.fragments = entries
        .into_iter()
        .filter_map(|entry| {
            let slug = safe_slug("fragment", &entry.fragment_entry_key, &entry.fragment_entry_id)?;
            let slug = unique_slug(slug, &mut taken);
            let mut fragment = Fragment::new(
                slug,
                FragmentMetadata::with_defaults(entry.name.clone(), entry.local_type()),
            );
            fragment.html = entry.html;
            fragment.css = entry.css;
            fragment.js = entry.js;
            fragment.configuration = entry.configuration;
            Some(fragment)
        })
        .collect();

    collection.fragment_compositions = compositions
        .into_iter()
        .filter_map(|composition| {
            let slug = safe_slug(
                "composition",
                &composition.fragment_composition_key,
                &composition.fragment_composition_id,
            )?;
            Some(FragmentComposition {
                slug: unique_slug(slug, &mut taken),
                metadata: FragmentCompositionMetadata {
                    name: composition.name,
                    fragment_composition_definition_path: DEFAULT_COMPOSITION_DEFINITION
                        .to_string(),
                },
                definition_data: composition.definition_data,
            })
        })
        .collect();

    Some(collection)
}

/// Name from an existing manifest at `destination`, else the directory name
async fn project_name(destination: &Path) -> String {
    let from_manifest = tokio::fs::read_to_string(destination.join(PROJECT_MANIFEST))
        .await
        .ok()
        .and_then(|text| serde_json::from_str::<serde_json::Value>(&text).ok())
        .and_then(|manifest| manifest.get("name")?.as_str().map(str::to_string));

    from_manifest.unwrap_or_else(|| {
        let name = dir_name(destination);
        if name.is_empty() {
            "fragments".to_string()
        } else {
            name
        }
    })
}

async fn ensure_manifest(destination: &Path) -> Result<()> {
    tokio::fs::create_dir_all(destination).await?;
    let name = project_name(destination).await;
    write_json_merged(&destination.join(PROJECT_MANIFEST), &serde_json::json!({ "name": name })).await
}
