//! In-memory [`FragmentsApi`] used by engine tests.
//!
//! Keeps server state in a mutex, records every call, and fails on demand.

use super::types::server_type_code;
use super::{
    FragmentsApi, ImportZipResponse, OAuthToken, ServerCollection, ServerFragment,
    ServerFragmentComposition, Session,
};
use crate::project::{CollectionMetadata, Fragment};
use crate::{FragkitError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{Duration, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    RefreshSession,
    GetCollections,
    GetEntries(String),
    GetCompositions(String),
    AddCollection(String),
    UpdateCollection(String),
    AddEntry(String),
    UpdateEntry(String),
    UploadThumbnail(String),
    ExportZip,
    ImportZip,
    RenderPreview,
}

/// What `import_zip` answers with
#[derive(Debug, Clone)]
pub(crate) enum ImportBehavior {
    Fail(String),
    Respond(ImportZipResponse),
}

#[derive(Debug, Default)]
struct ServerState {
    collections: Vec<ServerCollection>,
    entries: HashMap<String, Vec<ServerFragment>>,
    compositions: HashMap<String, Vec<ServerFragmentComposition>>,
    calls: Vec<Call>,
    imported_archives: Vec<Bytes>,
    next_id: u64,
    tokens_issued: u32,
}

#[derive(Debug)]
pub(crate) struct FakeApi {
    state: Mutex<ServerState>,
    export_archive: Option<Bytes>,
    import_behavior: ImportBehavior,
    failing_collections: HashSet<String>,
    failing_fragments: HashSet<String>,
    failing_thumbnails: bool,
    compositions_unsupported: bool,
    issues_tokens: bool,
}

impl Default for FakeApi {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeApi {
    /// A server without bulk support and without any content
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ServerState {
                next_id: 1000,
                ..Default::default()
            }),
            export_archive: None,
            import_behavior: ImportBehavior::Fail("Not Found".to_string()),
            failing_collections: HashSet::new(),
            failing_fragments: HashSet::new(),
            failing_thumbnails: false,
            compositions_unsupported: false,
            issues_tokens: false,
        }
    }

    pub fn with_export_archive(mut self, archive: Bytes) -> Self {
        self.export_archive = Some(archive);
        self
    }

    pub fn with_import_behavior(mut self, behavior: ImportBehavior) -> Self {
        self.import_behavior = behavior;
        self
    }

    /// Adding or updating a collection with this name fails
    pub fn failing_collection(mut self, name: &str) -> Self {
        self.failing_collections.insert(name.to_string());
        self
    }

    /// Adding or updating a fragment with this name fails
    pub fn failing_fragment(mut self, name: &str) -> Self {
        self.failing_fragments.insert(name.to_string());
        self
    }

    pub fn failing_thumbnails(mut self) -> Self {
        self.failing_thumbnails = true;
        self
    }

    pub fn without_compositions(mut self) -> Self {
        self.compositions_unsupported = true;
        self
    }

    /// Refreshing a session without a token hands out `token-1`, `token-2`, ...
    pub fn issuing_tokens(mut self) -> Self {
        self.issues_tokens = true;
        self
    }

    pub fn tokens_issued(&self) -> u32 {
        self.state.lock().unwrap().tokens_issued
    }

    pub fn with_collection(self, collection: ServerCollection) -> Self {
        self.state.lock().unwrap().collections.push(collection);
        self
    }

    pub fn with_entry(self, collection_id: &str, entry: ServerFragment) -> Self {
        self.state
            .lock()
            .unwrap()
            .entries
            .entry(collection_id.to_string())
            .or_default()
            .push(entry);
        self
    }

    pub fn with_composition(self, collection_id: &str, composition: ServerFragmentComposition) -> Self {
        self.state
            .lock()
            .unwrap()
            .compositions
            .entry(collection_id.to_string())
            .or_default()
            .push(composition);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.state.lock().unwrap().calls.iter().filter(|c| predicate(c)).count()
    }

    pub fn collections(&self) -> Vec<ServerCollection> {
        self.state.lock().unwrap().collections.clone()
    }

    pub fn entries(&self, collection_id: &str) -> Vec<ServerFragment> {
        self.state
            .lock()
            .unwrap()
            .entries
            .get(collection_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn imported_archives(&self) -> Vec<Bytes> {
        self.state.lock().unwrap().imported_archives.clone()
    }

    fn record(&self, call: Call) {
        self.state.lock().unwrap().calls.push(call);
    }

    fn next_id(&self) -> String {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        state.next_id.to_string()
    }
}

/// Remote entry mirroring a local fragment
pub(crate) fn server_fragment(id: &str, fragment: &Fragment) -> ServerFragment {
    ServerFragment {
        fragment_entry_id: id.to_string(),
        fragment_entry_key: fragment.slug.clone(),
        name: fragment.metadata.name.clone(),
        css: fragment.css.clone(),
        html: fragment.html.clone(),
        js: fragment.js.clone(),
        configuration: fragment.configuration.clone(),
        fragment_type: Some(server_type_code(fragment.metadata.fragment_type).into()),
    }
}

#[async_trait]
impl FragmentsApi for FakeApi {
    async fn refresh_session(&self, session: Session) -> Session {
        self.record(Call::RefreshSession);
        if !self.issues_tokens || session.oauth.is_some() {
            return session;
        }
        let issued = {
            let mut state = self.state.lock().unwrap();
            state.tokens_issued += 1;
            state.tokens_issued
        };
        session.with_token(OAuthToken {
            access_token: format!("token-{issued}"),
            refresh_token: None,
            expiration_date: Utc::now() + Duration::minutes(10),
        })
    }

    async fn get_fragment_collections(
        &self,
        _session: &Session,
        _group_id: &str,
    ) -> Result<Vec<ServerCollection>> {
        self.record(Call::GetCollections);
        Ok(self.collections())
    }

    async fn get_fragment_entries(
        &self,
        _session: &Session,
        _group_id: &str,
        collection_id: &str,
    ) -> Result<Vec<ServerFragment>> {
        self.record(Call::GetEntries(collection_id.to_string()));
        Ok(self.entries(collection_id))
    }

    async fn get_fragment_compositions(
        &self,
        _session: &Session,
        _group_id: &str,
        collection_id: &str,
    ) -> Vec<ServerFragmentComposition> {
        self.record(Call::GetCompositions(collection_id.to_string()));
        if self.compositions_unsupported {
            return Vec::new();
        }
        self.state
            .lock()
            .unwrap()
            .compositions
            .get(collection_id)
            .cloned()
            .unwrap_or_default()
    }

    async fn add_fragment_collection(
        &self,
        _session: &Session,
        _group_id: &str,
        collection_key: &str,
        metadata: &CollectionMetadata,
    ) -> Result<()> {
        self.record(Call::AddCollection(collection_key.to_string()));
        if self.failing_collections.contains(&metadata.name) {
            return Err(FragkitError::api("Collection name is not valid"));
        }
        let id = self.next_id();
        self.state.lock().unwrap().collections.push(ServerCollection {
            fragment_collection_id: id,
            fragment_collection_key: collection_key.to_string(),
            name: metadata.name.clone(),
            description: metadata.description.clone(),
        });
        Ok(())
    }

    async fn update_fragment_collection(
        &self,
        _session: &Session,
        collection_id: &str,
        metadata: &CollectionMetadata,
    ) -> Result<()> {
        self.record(Call::UpdateCollection(collection_id.to_string()));
        if self.failing_collections.contains(&metadata.name) {
            return Err(FragkitError::api("Collection name is not valid"));
        }
        let mut state = self.state.lock().unwrap();
        if let Some(existing) = state
            .collections
            .iter_mut()
            .find(|c| c.fragment_collection_id == collection_id)
        {
            existing.name = metadata.name.clone();
            existing.description = metadata.description.clone();
        }
        Ok(())
    }

    async fn add_fragment_entry(
        &self,
        _session: &Session,
        _group_id: &str,
        collection_id: &str,
        fragment: &Fragment,
        _preview_file_entry_id: Option<&str>,
    ) -> Result<()> {
        self.record(Call::AddEntry(fragment.slug.clone()));
        if self.failing_fragments.contains(&fragment.metadata.name) {
            return Err(FragkitError::api("Fragment content is not valid"));
        }
        let id = self.next_id();
        self.state
            .lock()
            .unwrap()
            .entries
            .entry(collection_id.to_string())
            .or_default()
            .push(server_fragment(&id, fragment));
        Ok(())
    }

    async fn update_fragment_entry(
        &self,
        _session: &Session,
        fragment_entry_id: &str,
        fragment: &Fragment,
        _preview_file_entry_id: Option<&str>,
    ) -> Result<()> {
        self.record(Call::UpdateEntry(fragment_entry_id.to_string()));
        if self.failing_fragments.contains(&fragment.metadata.name) {
            return Err(FragkitError::api("Fragment content is not valid"));
        }
        let mut state = self.state.lock().unwrap();
        for entries in state.entries.values_mut() {
            for entry in entries.iter_mut() {
                if entry.fragment_entry_id == fragment_entry_id {
                    let key = entry.fragment_entry_key.clone();
                    *entry = server_fragment(fragment_entry_id, fragment);
                    entry.fragment_entry_key = key;
                }
            }
        }
        Ok(())
    }

    async fn upload_thumbnail(
        &self,
        _session: &Session,
        _group_id: &str,
        fragment: &Fragment,
        _thumbnail: &[u8],
    ) -> Result<String> {
        self.record(Call::UploadThumbnail(fragment.slug.clone()));
        if self.failing_thumbnails {
            return Err(FragkitError::api("Unable to upload thumbnail"));
        }
        Ok(self.next_id())
    }

    async fn export_zip(&self, _session: &Session, _group_id: &str) -> Result<Bytes> {
        self.record(Call::ExportZip);
        self.export_archive
            .clone()
            .ok_or_else(|| FragkitError::api("Request failed with status 404"))
    }

    async fn import_zip(
        &self,
        _session: &Session,
        _group_id: &str,
        archive: Bytes,
    ) -> Result<ImportZipResponse> {
        self.record(Call::ImportZip);
        self.state.lock().unwrap().imported_archives.push(archive);
        match &self.import_behavior {
            ImportBehavior::Fail(message) => Err(FragkitError::api(message.clone())),
            ImportBehavior::Respond(response) => Ok(response.clone()),
        }
    }

    async fn render_fragment_preview(
        &self,
        _session: &Session,
        _group_id: &str,
        fragment: &Fragment,
    ) -> Result<String> {
        self.record(Call::RenderPreview);
        Ok(fragment.html.clone())
    }

    async fn render_page_definition_preview(
        &self,
        _session: &Session,
        _group_id: &str,
        definition_data: &str,
    ) -> Result<String> {
        self.record(Call::RenderPreview);
        Ok(definition_data.to_string())
    }

    async fn render_composition_preview(
        &self,
        _session: &Session,
        _group_id: &str,
        definition_data: &str,
    ) -> Result<String> {
        self.record(Call::RenderPreview);
        Ok(definition_data.to_string())
    }
}
