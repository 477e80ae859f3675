/*!
Import of a local project into a remote site.

The bulk path packages the project and uploads it in one request. If that fails
in any way the legacy path reconciles entity by entity, strictly in order:
every collection first, then every fragment in collection order. A fragment
whose collection could not be imported is reported `invalid` without touching
the network. Per-entity failures never abort the remaining entities.
*/

use super::strategy::{choose_strategy, BulkOutcome, StrategyState};
use super::{bulk_failure, CachedSession};
use crate::api::{FragmentsApi, ImportResult, ImportZipResponse, ServerCollection, ServerFragment, Session};
use crate::observability::record_fallback;
use crate::packager::{compress, CompressOptions};
use crate::project::{Collection, Fragment, Project};
use crate::{FragkitError, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Per-entity results of an import
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub fragments: Vec<ImportResult>,
    pub page_templates: Vec<ImportResult>,
}

impl ImportReport {
    /// `(fragment results, page template results)`
    pub fn into_parts(self) -> (Vec<ImportResult>, Vec<ImportResult>) {
        (self.fragments, self.page_templates)
    }

    pub fn failures(&self) -> impl Iterator<Item = &ImportResult> {
        self.fragments
            .iter()
            .chain(&self.page_templates)
            .filter(|result| result.is_failure())
    }

    fn from_response(response: ImportZipResponse) -> Option<Self> {
        if response.fragment_entries_import_result.is_none()
            && response.page_templates_import_result.is_none()
        {
            return None;
        }
        Some(Self {
            fragments: response.fragment_entries_import_result.unwrap_or_default(),
            page_templates: response.page_templates_import_result.unwrap_or_default(),
        })
    }
}

/// Remote counterpart of a local collection: key equal to the slug, else same name
pub fn match_remote_collection<'a>(
    remote: &'a [ServerCollection],
    collection: &Collection,
) -> Option<&'a ServerCollection> {
    remote
        .iter()
        .find(|c| c.fragment_collection_key == collection.slug)
        .or_else(|| remote.iter().find(|c| c.name == collection.metadata.name))
}

/// Remote counterpart of a local fragment: key equal to the slug, else same name
pub fn match_remote_fragment<'a>(
    remote: &'a [ServerFragment],
    fragment: &Fragment,
) -> Option<&'a ServerFragment> {
    remote
        .iter()
        .find(|f| f.fragment_entry_key == fragment.slug)
        .or_else(|| remote.iter().find(|f| f.name == fragment.metadata.name))
}

/// True when no content field differs from the remote entry
pub fn content_matches(remote: &ServerFragment, fragment: &Fragment) -> bool {
    remote.css == fragment.css
        && remote.html == fragment.html
        && remote.js == fragment.js
        && remote.configuration == fragment.configuration
        && remote.name == fragment.metadata.name
}

/// Imports projects, keeping the refreshed session between calls
pub struct ImportEngine<A: FragmentsApi> {
    api: Arc<A>,
    session: CachedSession,
}

impl<A: FragmentsApi> ImportEngine<A> {
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

    /// Import `project` into the site `group_id`
    ///
    /// Returns `None` when the bulk endpoint accepted the archive but reported
    /// nothing importable.
    pub async fn import_project(
        &self,
        project: &Project,
        group_id: &str,
    ) -> Result<Option<ImportReport>> {
        let session = self.session.refresh(self.api.as_ref()).await;

        let (outcome, report) = self.import_bulk(&session, project, group_id).await;
        match choose_strategy(StrategyState::Bulk, &outcome) {
            StrategyState::Legacy => {
                warn!(
                    group_id,
                    reason = outcome.reason().unwrap_or_default(),
                    "Bulk import failed, falling back to legacy import"
                );
                record_fallback("import");
                self.import_legacy_with(&session, project, group_id)
                    .await
                    .map(Some)
            }
            StrategyState::Bulk | StrategyState::Done => Ok(report),
        }
    }

    async fn import_bulk(
        &self,
        session: &Session,
        project: &Project,
        group_id: &str,
    ) -> (BulkOutcome, Option<ImportReport>) {
        let archive = match compress(project, &CompressOptions::default()).await {
            Ok(archive) => archive,
            Err(error) => return (BulkOutcome::Failed(error.to_string()), None),
        };

        match self.api.import_zip(session, group_id, archive).await {
            Err(error) => (bulk_failure(&error), None),
            Ok(response) => match response.error_message() {
                Some(message) => (BulkOutcome::ServerError(message), None),
                None => {
                    let report = ImportReport::from_response(response);
                    info!(
                        project = %project.name,
                        group_id,
                        fragments = report.as_ref().map_or(0, |r| r.fragments.len()),
                        "Imported project archive"
                    );
                    (BulkOutcome::Completed, report)
                }
            },
        }
    }

    /// Reconcile `project` with the server one entity at a time
    pub async fn import_legacy(&self, project: &Project, group_id: &str) -> Result<ImportReport> {
        let session = self.session.refresh(self.api.as_ref()).await;
        self.import_legacy_with(&session, project, group_id).await
    }

    async fn import_legacy_with(
        &self,
        session: &Session,
        project: &Project,
        group_id: &str,
    ) -> Result<ImportReport> {
        // slug -> server id, or the error that prevented the import
        let mut collection_ids: HashMap<&str, std::result::Result<String, String>> = HashMap::new();
        for collection in &project.collections {
            let outcome = self.import_collection(session, group_id, collection).await;
            if let Err(e) = &outcome {
                error!(collection = %collection.slug, error = %e, "Collection import failed");
            }
            collection_ids.insert(collection.slug.as_str(), outcome.map_err(|e| e.to_string()));
        }

        let mut fragments = Vec::with_capacity(project.fragment_count());
        for (collection, fragment) in project.fragments() {
            let result = match collection_ids.get(collection.slug.as_str()) {
                Some(Ok(collection_id)) => {
                    self.import_fragment(session, group_id, collection_id, fragment)
                        .await
                }
                Some(Err(reason)) => ImportResult::invalid(
                    fragment.metadata.name.clone(),
                    format!(
                        "Collection {} could not be imported: {reason}",
                        collection.metadata.name
                    ),
                ),
                None => ImportResult::invalid(fragment.metadata.name.clone(), "Collection not imported"),
            };
            fragments.push(result);
        }

        let page_templates = project
            .page_templates
            .iter()
            .map(|template| {
                ImportResult::ignored(
                    template.metadata.name.clone(),
                    "Page templates can only be imported by servers supporting bulk import",
                )
            })
            .collect();

        let report = ImportReport {
            fragments,
            page_templates,
        };
        info!(
            project = %project.name,
            group_id,
            fragments = report.fragments.len(),
            failed = report.failures().count(),
            "Legacy import finished"
        );
        Ok(report)
    }

    async fn import_collection(
        &self,
        session: &Session,
        group_id: &str,
        collection: &Collection,
    ) -> Result<String> {
        let remote = self.api.get_fragment_collections(session, group_id).await?;
        if let Some(existing) = match_remote_collection(&remote, collection) {
            self.api
                .update_fragment_collection(session, &existing.fragment_collection_id, &collection.metadata)
                .await?;
            debug!(collection = %collection.slug, id = %existing.fragment_collection_id, "Updated collection");
            return Ok(existing.fragment_collection_id.clone());
        }

        self.api
            .add_fragment_collection(session, group_id, &collection.slug, &collection.metadata)
            .await?;
        let remote = self.api.get_fragment_collections(session, group_id).await?;
        let created = match_remote_collection(&remote, collection).ok_or_else(|| {
            FragkitError::api(format!(
                "Collection {} was not found after creating it",
                collection.metadata.name
            ))
        })?;
        debug!(collection = %collection.slug, id = %created.fragment_collection_id, "Added collection");
        Ok(created.fragment_collection_id.clone())
    }

    async fn import_fragment(
        &self,
        session: &Session,
        group_id: &str,
        collection_id: &str,
        fragment: &Fragment,
    ) -> ImportResult {
        let name = fragment.metadata.name.clone();

        let mut thumbnail_error = None;
        let mut preview_file_entry_id = None;
        if let Some(thumbnail) = &fragment.thumbnail {
            match self
                .api
                .upload_thumbnail(session, group_id, fragment, thumbnail)
                .await
            {
                Ok(id) => preview_file_entry_id = Some(id),
                Err(e) => {
                    warn!(fragment = %fragment.slug, error = %e, "Thumbnail upload failed");
                    thumbnail_error = Some(e.to_string());
                }
            }
        }

        match self
            .write_fragment(session, group_id, collection_id, fragment, preview_file_entry_id.as_deref())
            .await
        {
            Ok(()) => ImportResult {
                error_message: thumbnail_error,
                ..ImportResult::imported(name)
            },
            Err(e) => {
                error!(fragment = %fragment.slug, error = %e, "Fragment import failed");
                ImportResult::invalid(name, e.to_string())
            }
        }
    }

    async fn write_fragment(
        &self,
        session: &Session,
        group_id: &str,
        collection_id: &str,
        fragment: &Fragment,
        preview_file_entry_id: Option<&str>,
    ) -> Result<()> {
        let remote = self
            .api
            .get_fragment_entries(session, group_id, collection_id)
            .await?;

        match match_remote_fragment(&remote, fragment) {
            Some(existing) if content_matches(existing, fragment) => {
                debug!(fragment = %fragment.slug, "Fragment is up to date");
                Ok(())
            }
            Some(existing) => {
                self.api
                    .update_fragment_entry(session, &existing.fragment_entry_id, fragment, preview_file_entry_id)
                    .await
            }
            None => {
                self.api
                    .add_fragment_entry(session, group_id, collection_id, fragment, preview_file_entry_id)
                    .await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::fake::{server_fragment, Call, FakeApi, ImportBehavior};
    use crate::api::ImportStatus;
    use crate::project::{CollectionMetadata, FragmentMetadata, FragmentType, PageTemplate, PageTemplateMetadata, PageTemplateType};

    fn fragment(slug: &str, name: &str) -> Fragment {
        let mut fragment = Fragment::new(slug, FragmentMetadata::with_defaults(name, FragmentType::Component));
        fragment.html = format!("<div>{slug}</div>");
        fragment
    }

    fn collection(slug: &str, name: &str, fragments: Vec<Fragment>) -> Collection {
        let mut collection = Collection::new(
            slug,
            CollectionMetadata {
                name: name.to_string(),
                description: String::new(),
            },
        );
        collection.fragments = fragments;
        collection
    }

    fn two_collection_project() -> Project {
        let mut project = Project::new("/nonexistent/project", "project");
        project.collections.push(collection(
            "collection-a",
            "A",
            vec![fragment("a-one", "A One"), fragment("a-two", "A Two")],
        ));
        project.collections.push(collection("collection-b", "B", vec![fragment("b-one", "B One")]));
        project
    }

    fn engine(api: FakeApi) -> (Arc<FakeApi>, ImportEngine<FakeApi>) {
        let api = Arc::new(api);
        let engine = ImportEngine::new(api.clone(), Session::new("http://localhost:8080"));
        (api, engine)
    }

    fn statuses(results: &[ImportResult]) -> Vec<ImportStatus> {
        results.iter().map(|r| r.status).collect()
    }

    #[tokio::test]
    async fn test_bulk_success_returns_server_results() {
        let response = ImportZipResponse {
            fragment_entries_import_result: Some(vec![ImportResult::imported("A One")]),
            page_templates_import_result: None,
            error: None,
        };
        let (api, engine) = engine(FakeApi::new().with_import_behavior(ImportBehavior::Respond(response)));

        let report = engine
            .import_project(&two_collection_project(), "20121")
            .await
            .unwrap()
            .unwrap();
        let (fragments, page_templates) = report.into_parts();
        assert_eq!(fragments, vec![ImportResult::imported("A One")]);
        assert!(page_templates.is_empty());

        assert_eq!(api.count(|c| *c == Call::ImportZip), 1);
        assert_eq!(api.count(|c| matches!(c, Call::GetCollections)), 0);
        assert_eq!(api.imported_archives().len(), 1);
    }

    #[tokio::test]
    async fn test_bulk_without_results_returns_none() {
        let (api, engine) = engine(
            FakeApi::new().with_import_behavior(ImportBehavior::Respond(ImportZipResponse::default())),
        );
        let report = engine.import_project(&two_collection_project(), "20121").await.unwrap();
        assert!(report.is_none());
        assert!(api.collections().is_empty());
    }

    #[tokio::test]
    async fn test_refreshed_session_is_reused_across_imports() {
        let response = ImportZipResponse {
            fragment_entries_import_result: Some(vec![ImportResult::imported("A One")]),
            ..ImportZipResponse::default()
        };
        let (api, engine) = engine(
            FakeApi::new()
                .issuing_tokens()
                .with_import_behavior(ImportBehavior::Respond(response)),
        );
        assert!(engine.session().await.oauth.is_none());

        for _ in 0..3 {
            engine.import_project(&two_collection_project(), "20121").await.unwrap();
        }

        assert_eq!(api.count(|c| *c == Call::RefreshSession), 3);
        assert_eq!(api.tokens_issued(), 1);
        let session = engine.session().await;
        assert_eq!(session.oauth.unwrap().access_token, "token-1");
    }

    #[tokio::test]
    async fn test_bulk_failure_falls_back_once() {
        let (api, engine) = engine(FakeApi::new());
        let report = engine
            .import_project(&two_collection_project(), "20121")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(statuses(&report.fragments), vec![ImportStatus::Imported; 3]);
        assert_eq!(api.count(|c| *c == Call::ImportZip), 1);
        assert_eq!(api.count(|c| matches!(c, Call::AddCollection(_))), 2);
        assert_eq!(api.count(|c| matches!(c, Call::AddEntry(_))), 3);
    }

    #[tokio::test]
    async fn test_error_field_in_bulk_response_falls_back() {
        let response = ImportZipResponse {
            fragment_entries_import_result: Some(vec![]),
            page_templates_import_result: None,
            error: Some(serde_json::Value::from("Unable to import")),
        };
        let (api, engine) = engine(FakeApi::new().with_import_behavior(ImportBehavior::Respond(response)));

        let report = engine
            .import_project(&two_collection_project(), "20121")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(report.fragments.len(), 3);
        assert_eq!(api.count(|c| matches!(c, Call::AddCollection(_))), 2);
    }

    #[tokio::test]
    async fn test_legacy_is_ordered_and_collection_gated() {
        let (api, engine) = engine(FakeApi::new().failing_collection("A"));
        let report = engine
            .import_legacy(&two_collection_project(), "20121")
            .await
            .unwrap();

        assert_eq!(
            statuses(&report.fragments),
            vec![ImportStatus::Invalid, ImportStatus::Invalid, ImportStatus::Imported]
        );
        assert!(report.fragments[0]
            .error_message
            .as_deref()
            .unwrap()
            .contains("Collection A"));
        assert_eq!(report.fragments[2].name, "B One");

        // no fragment writes for the failed collection
        let writes: Vec<Call> = api
            .calls()
            .into_iter()
            .filter(|c| matches!(c, Call::AddEntry(_) | Call::UpdateEntry(_)))
            .collect();
        assert_eq!(writes, vec![Call::AddEntry("b-one".to_string())]);

        // collections are processed before any fragment
        let calls = api.calls();
        let last_collection_call = calls
            .iter()
            .rposition(|c| matches!(c, Call::AddCollection(_) | Call::UpdateCollection(_)))
            .unwrap();
        let first_fragment_call = calls
            .iter()
            .position(|c| matches!(c, Call::GetEntries(_)))
            .unwrap();
        assert!(last_collection_call < first_fragment_call);
    }

    #[tokio::test]
    async fn test_unchanged_fragment_is_not_rewritten() {
        let local = two_collection_project();
        let existing = &local.collections[1].fragments[0];
        let api = FakeApi::new()
            .with_collection(ServerCollection {
                fragment_collection_id: "500".to_string(),
                fragment_collection_key: "collection-b".to_string(),
                name: "B".to_string(),
                description: String::new(),
            })
            .with_entry("500", server_fragment("501", existing));
        let (api, engine) = engine(api);

        let mut project = Project::new("/nonexistent/project", "project");
        project.collections.push(local.collections[1].clone());
        let report = engine.import_legacy(&project, "20121").await.unwrap();

        assert_eq!(report.fragments, vec![ImportResult::imported("B One")]);
        assert_eq!(api.count(|c| matches!(c, Call::UpdateEntry(_))), 0);
        assert_eq!(api.count(|c| matches!(c, Call::AddEntry(_))), 0);
        assert_eq!(api.calls().iter().filter(|c| **c == Call::UpdateCollection("500".to_string())).count(), 1);
    }

    #[tokio::test]
    async fn test_changed_fragment_is_updated() {
        let mut project = Project::new("/nonexistent/project", "project");
        project.collections.push(collection("collection-b", "B", vec![fragment("b-one", "B One")]));
        let mut stale = server_fragment("501", &project.collections[0].fragments[0]);
        stale.css = "old".to_string();

        let (api, engine) = engine(
            FakeApi::new()
                .with_collection(ServerCollection {
                    fragment_collection_id: "500".to_string(),
                    fragment_collection_key: "other-key".to_string(),
                    name: "B".to_string(),
                    description: String::new(),
                })
                .with_entry("500", stale),
        );
        let report = engine.import_legacy(&project, "20121").await.unwrap();

        assert_eq!(report.fragments[0].status, ImportStatus::Imported);
        assert_eq!(api.count(|c| *c == Call::UpdateEntry("501".to_string())), 1);
        assert_eq!(api.entries("500")[0].css, "");
    }

    #[tokio::test]
    async fn test_thumbnail_failure_does_not_block_fragment() {
        let mut project = Project::new("/nonexistent/project", "project");
        let mut with_thumbnail = fragment("thumb", "Thumb");
        with_thumbnail.metadata.thumbnail_path = Some("thumbnail.png".to_string());
        with_thumbnail.thumbnail = Some(vec![0x89, 0x50]);
        project.collections.push(collection("c", "C", vec![with_thumbnail]));

        let (api, engine) = engine(FakeApi::new().failing_thumbnails());
        let report = engine.import_legacy(&project, "20121").await.unwrap();

        assert_eq!(report.fragments[0].status, ImportStatus::Imported);
        assert_eq!(
            report.fragments[0].error_message.as_deref(),
            Some("Unable to upload thumbnail")
        );
        assert_eq!(api.count(|c| matches!(c, Call::AddEntry(_))), 1);
    }

    #[tokio::test]
    async fn test_fragment_failure_continues_with_siblings() {
        let (_, engine) = engine(FakeApi::new().failing_fragment("A One"));
        let report = engine
            .import_legacy(&two_collection_project(), "20121")
            .await
            .unwrap();

        assert_eq!(
            statuses(&report.fragments),
            vec![ImportStatus::Invalid, ImportStatus::Imported, ImportStatus::Imported]
        );
        assert_eq!(
            report.fragments[0].error_message.as_deref(),
            Some("Fragment content is not valid")
        );
        assert_eq!(report.failures().count(), 1);
    }

    #[tokio::test]
    async fn test_page_templates_are_ignored_in_legacy_mode() {
        let mut project = Project::new("/nonexistent/project", "project");
        project.page_templates.push(PageTemplate {
            slug: "home".to_string(),
            metadata: PageTemplateMetadata {
                name: "Home".to_string(),
                template_type: PageTemplateType::MasterPage,
                page_definition_path: None,
            },
            definition_data: "{}".to_string(),
        });

        let (_, engine) = engine(FakeApi::new());
        let (_, page_templates) = engine
            .import_legacy(&project, "20121")
            .await
            .unwrap()
            .into_parts();
        assert_eq!(statuses(&page_templates), vec![ImportStatus::Ignored]);
    }

    #[test]
    fn test_remote_matching_prefers_key() {
        let remote = vec![
            ServerCollection {
                fragment_collection_id: "1".to_string(),
                fragment_collection_key: "other".to_string(),
                name: "Basic".to_string(),
                description: String::new(),
            },
            ServerCollection {
                fragment_collection_id: "2".to_string(),
                fragment_collection_key: "basic".to_string(),
                name: "Renamed".to_string(),
                description: String::new(),
            },
        ];
        let local = collection("basic", "Basic", vec![]);
        assert_eq!(match_remote_collection(&remote, &local).unwrap().fragment_collection_id, "2");

        let local = collection("unknown", "Basic", vec![]);
        assert_eq!(match_remote_collection(&remote, &local).unwrap().fragment_collection_id, "1");
    }
}
