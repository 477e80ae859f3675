/*!
Remote fragments API.

This module defines the remote API abstraction (port) and its HTTP adapter.
The export and import engines only talk to [`FragmentsApi`], so tests can swap
in an in-memory double and the HTTP details stay in [`http`].

Every call receives the [`Session`] to authenticate with. Sessions are
immutable; [`FragmentsApi::refresh_session`] returns a new one.
*/

#[cfg(test)]
pub(crate) mod fake;
pub mod http;
pub mod session;
pub mod types;

pub use http::HttpApiClient;
pub use session::{AuthScheme, BasicCredentials, OAuthClient, OAuthToken, Session};
pub use types::{
    ImportResult, ImportStatus, ImportZipResponse, ServerCollection, ServerFragment,
    ServerFragmentComposition,
};

use crate::project::{CollectionMetadata, Fragment};
use crate::Result;
use async_trait::async_trait;
use bytes::Bytes;

/// Remote capabilities needed to synchronize a project with a server
///
/// Implementations must not retry on their own. A failed call surfaces as an
/// error and the caller decides whether to fall back.
#[async_trait]
pub trait FragmentsApi: Send + Sync {
    /// Return a session whose OAuth token is usable right now
    ///
    /// Never fails: when the token cannot be refreshed or acquired the returned
    /// session simply carries no token.
    async fn refresh_session(&self, session: Session) -> Session;

    /// List the fragment collections of a site
    async fn get_fragment_collections(
        &self,
        session: &Session,
        group_id: &str,
    ) -> Result<Vec<ServerCollection>>;

    /// List the fragment entries of a collection
    async fn get_fragment_entries(
        &self,
        session: &Session,
        group_id: &str,
        collection_id: &str,
    ) -> Result<Vec<ServerFragment>>;

    /// List the compositions of a collection
    ///
    /// Older servers do not support compositions, so any failure yields an
    /// empty list.
    async fn get_fragment_compositions(
        &self,
        session: &Session,
        group_id: &str,
        collection_id: &str,
    ) -> Vec<ServerFragmentComposition>;

    /// Create a collection with the given key
    async fn add_fragment_collection(
        &self,
        session: &Session,
        group_id: &str,
        collection_key: &str,
        metadata: &CollectionMetadata,
    ) -> Result<()>;

    /// Update name and description of an existing collection
    async fn update_fragment_collection(
        &self,
        session: &Session,
        collection_id: &str,
        metadata: &CollectionMetadata,
    ) -> Result<()>;

    /// Create a fragment entry from a local fragment
    async fn add_fragment_entry(
        &self,
        session: &Session,
        group_id: &str,
        collection_id: &str,
        fragment: &Fragment,
        preview_file_entry_id: Option<&str>,
    ) -> Result<()>;

    /// Overwrite an existing fragment entry with local content
    async fn update_fragment_entry(
        &self,
        session: &Session,
        fragment_entry_id: &str,
        fragment: &Fragment,
        preview_file_entry_id: Option<&str>,
    ) -> Result<()>;

    /// Upload a fragment thumbnail, returning the created file entry id
    async fn upload_thumbnail(
        &self,
        session: &Session,
        group_id: &str,
        fragment: &Fragment,
        thumbnail: &[u8],
    ) -> Result<String>;

    /// Download every fragment, composition and page template as one archive
    async fn export_zip(&self, session: &Session, group_id: &str) -> Result<Bytes>;

    /// Upload a project archive in one request
    async fn import_zip(
        &self,
        session: &Session,
        group_id: &str,
        archive: Bytes,
    ) -> Result<ImportZipResponse>;

    /// Render a fragment's HTML, CSS and JS server-side
    async fn render_fragment_preview(
        &self,
        session: &Session,
        group_id: &str,
        fragment: &Fragment,
    ) -> Result<String>;

    /// Render a page template's definition JSON
    async fn render_page_definition_preview(
        &self,
        session: &Session,
        group_id: &str,
        definition_data: &str,
    ) -> Result<String>;

    /// Render a composition's definition JSON
    async fn render_composition_preview(
        &self,
        session: &Session,
        group_id: &str,
        definition_data: &str,
    ) -> Result<String>;
}
