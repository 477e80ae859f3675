/*!
HTTP adapter for [`FragmentsApi`](super::FragmentsApi).

Legacy entity calls go to the JSON web services under `/api/jsonws/` with Basic
authentication. Bulk, preview and thumbnail calls go to `/c/portal/fragment/`
and prefer an OAuth bearer token. Tokens come from `/o/oauth2/token`.

No call is retried here.
*/

use super::session::{AuthScheme, OAuthClient, Session, TokenResponse};
use super::types::{
    server_type_code, ImportZipResponse, ServerCollection, ServerFragment,
    ServerFragmentComposition,
};
use super::FragmentsApi;
#[cfg(feature = "metrics")]
use crate::observability::MetricsTimer;
use crate::project::{CollectionMetadata, Fragment};
use crate::{FragkitError, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use chrono::Utc;
use reqwest::header::AUTHORIZATION;
use reqwest::multipart::{Form, Part};
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, warn};

const JSONWS_PREFIX: &str = "/api/jsonws";
const PORTAL_FRAGMENT_PREFIX: &str = "/c/portal/fragment";
const OAUTH_TOKEN_PATH: &str = "/o/oauth2/token";

/// Server exception classes with a user-facing message
const KNOWN_EXCEPTIONS: [(&str, &str); 7] = [
    (
        "DuplicateFragmentCollectionKeyException",
        "A collection with the same key already exists",
    ),
    (
        "DuplicateFragmentEntryKeyException",
        "A fragment with the same key already exists",
    ),
    ("FragmentCollectionNameException", "Collection name is not valid"),
    ("FragmentEntryNameException", "Fragment name is not valid"),
    ("FragmentEntryContentException", "Fragment content is not valid"),
    (
        "FragmentEntryConfigurationException",
        "Fragment configuration is not valid",
    ),
    (
        "PrincipalException",
        "Not enough permissions to perform this operation",
    ),
];

/// Human message for a server exception class name
///
/// Accepts bare or fully qualified names, optionally followed by `: detail`.
pub fn known_exception_message(class_name: &str) -> Option<&'static str> {
    let class_name = class_name.split(':').next().unwrap_or(class_name).trim();
    KNOWN_EXCEPTIONS
        .iter()
        .find(|(suffix, _)| class_name.ends_with(suffix))
        .map(|(_, message)| *message)
}

fn describe(text: &str) -> String {
    known_exception_message(text)
        .map(str::to_string)
        .unwrap_or_else(|| text.to_string())
}

/// Error text carried by a response body, if it has a recognized error shape
pub fn error_message(body: &Value) -> Option<String> {
    let object = body.as_object()?;

    match object.get("error") {
        None | Some(Value::Null) => {}
        Some(Value::Object(error)) => {
            let kind = error.get("type").and_then(Value::as_str);
            let message = error.get("message").and_then(Value::as_str);
            let text = kind
                .and_then(known_exception_message)
                .map(str::to_string)
                .or_else(|| message.map(str::to_string))
                .or_else(|| kind.map(str::to_string))
                .unwrap_or_else(|| Value::Object(error.clone()).to_string());
            return Some(text);
        }
        Some(Value::String(text)) => return Some(describe(text)),
        Some(other) => return Some(other.to_string()),
    }

    match object.get("exception") {
        None | Some(Value::Null) => None,
        Some(Value::String(text)) => Some(describe(text)),
        Some(other) => Some(other.to_string()),
    }
}

/// Turn a status code and body into parsed JSON or an API error
///
/// Any status of 400 or above fails, using the body's error text if it has one.
/// A successful status still fails when the body carries an error shape.
pub fn parse_response(status: u16, body: &str) -> Result<Value> {
    let parsed = if body.trim().is_empty() {
        Ok(Value::Null)
    } else {
        serde_json::from_str::<Value>(body)
    };

    if status >= 400 {
        let detail = parsed.ok().as_ref().and_then(error_message);
        return Err(FragkitError::api(detail.unwrap_or_else(|| {
            format!("Request failed with status {status}")
        })));
    }

    let value = parsed.map_err(|e| FragkitError::api(format!("Invalid JSON response: {e}")))?;
    match error_message(&value) {
        Some(message) => Err(FragkitError::api(message)),
        None => Ok(value),
    }
}

/// Like [`parse_response`] for endpoints answering with HTML
pub fn parse_text_response(status: u16, body: &str) -> Result<String> {
    if status >= 400 {
        return parse_response(status, body).map(|_| String::new());
    }
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        if let Some(message) = error_message(&value) {
            return Err(FragkitError::api(message));
        }
    }
    Ok(body.to_string())
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T> {
    Ok(serde_json::from_value(value)?)
}

fn id_field(value: &Value, field: &str) -> Option<String> {
    match value.get(field)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Empty bodies from the bulk import endpoint mean nothing was importable
fn decode_import_response(value: Value) -> Result<ImportZipResponse> {
    if value.is_null() {
        return Ok(ImportZipResponse::default());
    }
    decode(value)
}

/// Form for `/o/oauth2/token`: a refresh grant when a refresh token is given
fn token_form(client: &OAuthClient, refresh_token: Option<String>) -> Vec<(&'static str, String)> {
    let mut form = vec![
        ("client_id", client.client_id.clone()),
        ("client_secret", client.client_secret.clone()),
    ];
    match refresh_token {
        Some(refresh_token) => {
            form.push(("grant_type", "refresh_token".to_string()));
            form.push(("refresh_token", refresh_token));
        }
        None => form.push(("grant_type", "client_credentials".to_string())),
    }
    form
}

/// Server-side render requests
#[derive(Debug, Clone, Copy)]
enum Preview<'a> {
    Fragment(&'a Fragment),
    PageDefinition(&'a str),
    Composition(&'a str),
}

impl Preview<'_> {
    fn action(&self) -> &'static str {
        match self {
            Preview::Fragment(_) => "render_fragment_entry",
            Preview::PageDefinition(_) => "render_page_definition",
            Preview::Composition(_) => "render_fragment_composition",
        }
    }

    fn form(&self, group_id: &str) -> Vec<(&'static str, String)> {
        let mut form = vec![("groupId", group_id.to_string())];
        match self {
            Preview::Fragment(fragment) => form.extend(fragment_form(fragment)),
            Preview::PageDefinition(definition) => {
                form.push(("pageDefinition", definition.to_string()))
            }
            Preview::Composition(definition) => {
                form.push(("fragmentCompositionDefinition", definition.to_string()))
            }
        }
        form
    }
}

fn fragment_form(fragment: &Fragment) -> Vec<(&'static str, String)> {
    vec![
        ("name", fragment.metadata.name.clone()),
        ("css", fragment.css.clone()),
        ("html", fragment.html.clone()),
        ("js", fragment.js.clone()),
        ("configuration", fragment.configuration.clone()),
    ]
}

/// [`FragmentsApi`] over `reqwest`
#[derive(Debug, Clone)]
pub struct HttpApiClient {
    client: reqwest::Client,
}

impl HttpApiClient {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("fragkit/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn post(&self, session: &Session, scheme: AuthScheme, path: &str) -> RequestBuilder {
        let request = self.client.post(session.url(path));
        match session.authorization(scheme) {
            Some(header) => request.header(AUTHORIZATION, header),
            None => request,
        }
    }

    async fn execute(&self, operation: &str, request: RequestBuilder) -> Result<(u16, Bytes)> {
        #[cfg(feature = "metrics")]
        let timer = MetricsTimer::start(operation);

        let result = async {
            let response = request.send().await?;
            let status = response.status().as_u16();
            let body = response.bytes().await?;
            Ok::<_, FragkitError>((status, body))
        }
        .await;

        #[cfg(feature = "metrics")]
        match &result {
            Ok((status, _)) if *status < 400 => timer.finish(),
            _ => timer.finish_with_error(),
        }

        match &result {
            Ok((status, body)) => debug!(operation, status, size = body.len(), "API response"),
            Err(error) => debug!(operation, error = %error, "API request failed"),
        }
        result
    }

    async fn jsonws(&self, session: &Session, path: &str, form: &[(&str, String)]) -> Result<Value> {
        let request = self
            .post(session, AuthScheme::Basic, &format!("{JSONWS_PREFIX}/{path}"))
            .form(form);
        let (status, body) = self.execute(path, request).await?;
        parse_response(status, &String::from_utf8_lossy(&body))
    }

    async fn portal_text(
        &self,
        session: &Session,
        action: &str,
        form: &[(&str, String)],
    ) -> Result<String> {
        let request = self
            .post(
                session,
                AuthScheme::PreferBearer,
                &format!("{PORTAL_FRAGMENT_PREFIX}/{action}"),
            )
            .form(form);
        let (status, body) = self.execute(action, request).await?;
        parse_text_response(status, &String::from_utf8_lossy(&body))
    }

    fn preview_request(&self, session: &Session, group_id: &str, preview: Preview<'_>) -> RequestBuilder {
        self.post(
            session,
            AuthScheme::PreferBearer,
            &format!("{PORTAL_FRAGMENT_PREFIX}/{}", preview.action()),
        )
        .form(&preview.form(group_id))
    }

    async fn render_preview(
        &self,
        session: &Session,
        group_id: &str,
        preview: Preview<'_>,
    ) -> Result<String> {
        let request = self.preview_request(session, group_id, preview);
        let (status, body) = self.execute(preview.action(), request).await?;
        parse_text_response(status, &String::from_utf8_lossy(&body))
    }

    async fn request_token(&self, session: &Session, form: &[(&str, String)]) -> Result<TokenResponse> {
        let request = self.client.post(session.url(OAUTH_TOKEN_PATH)).form(form);
        let (status, body) = self.execute("oauth2_token", request).await?;
        let body = String::from_utf8_lossy(&body);
        let value = parse_response(status, &body)?;
        decode(value)
    }
}

#[async_trait]
impl FragmentsApi for HttpApiClient {
    async fn refresh_session(&self, session: Session) -> Session {
        let now = Utc::now();
        let expired = session.needs_refresh(now);
        if !expired && !session.can_acquire_token() {
            return session;
        }
        let Some(client) = session.oauth_client.clone() else {
            return session.without_token();
        };

        let refresh_token = session.oauth.as_ref().and_then(|t| t.refresh_token.clone());
        let form = token_form(&client, refresh_token.filter(|_| expired));

        match self.request_token(&session, &form).await {
            Ok(response) => {
                info!(host = %session.host, client_id = %client.client_id, "Obtained OAuth token");
                session.with_token(response.into_token(now))
            }
            Err(error) => {
                warn!(host = %session.host, error = %error, "OAuth token refresh failed, clearing token");
                session.without_token()
            }
        }
    }

    async fn get_fragment_collections(
        &self,
        session: &Session,
        group_id: &str,
    ) -> Result<Vec<ServerCollection>> {
        let value = self
            .jsonws(
                session,
                "fragment.fragmentcollection/get-fragment-collections",
                &[
                    ("groupId", group_id.to_string()),
                    ("start", "-1".to_string()),
                    ("end", "-1".to_string()),
                ],
            )
            .await?;
        decode(value)
    }

    async fn get_fragment_entries(
        &self,
        session: &Session,
        group_id: &str,
        collection_id: &str,
    ) -> Result<Vec<ServerFragment>> {
        let value = self
            .jsonws(
                session,
                "fragment.fragmententry/get-fragment-entries",
                &[
                    ("groupId", group_id.to_string()),
                    ("fragmentCollectionId", collection_id.to_string()),
                    ("start", "-1".to_string()),
                    ("end", "-1".to_string()),
                ],
            )
            .await?;
        decode(value)
    }

    async fn get_fragment_compositions(
        &self,
        session: &Session,
        group_id: &str,
        collection_id: &str,
    ) -> Vec<ServerFragmentComposition> {
        let result = self
            .jsonws(
                session,
                "fragment.fragmentcomposition/get-fragment-compositions",
                &[
                    ("groupId", group_id.to_string()),
                    ("fragmentCollectionId", collection_id.to_string()),
                    ("start", "-1".to_string()),
                    ("end", "-1".to_string()),
                ],
            )
            .await
            .and_then(decode);

        result.unwrap_or_else(|error| {
            debug!(
                collection_id,
                error = %error,
                "Compositions unavailable, treating as none"
            );
            Vec::new()
        })
    }

    async fn add_fragment_collection(
        &self,
        session: &Session,
        group_id: &str,
        collection_key: &str,
        metadata: &CollectionMetadata,
    ) -> Result<()> {
        self.jsonws(
            session,
            "fragment.fragmentcollection/add-fragment-collection",
            &[
                ("groupId", group_id.to_string()),
                ("fragmentCollectionKey", collection_key.to_string()),
                ("name", metadata.name.clone()),
                ("description", metadata.description.clone()),
            ],
        )
        .await
        .map(|_| ())
    }

    async fn update_fragment_collection(
        &self,
        session: &Session,
        collection_id: &str,
        metadata: &CollectionMetadata,
    ) -> Result<()> {
        self.jsonws(
            session,
            "fragment.fragmentcollection/update-fragment-collection",
            &[
                ("fragmentCollectionId", collection_id.to_string()),
                ("name", metadata.name.clone()),
                ("description", metadata.description.clone()),
            ],
        )
        .await
        .map(|_| ())
    }

    async fn add_fragment_entry(
        &self,
        session: &Session,
        group_id: &str,
        collection_id: &str,
        fragment: &Fragment,
        preview_file_entry_id: Option<&str>,
    ) -> Result<()> {
        let mut form = vec![
            ("groupId", group_id.to_string()),
            ("fragmentCollectionId", collection_id.to_string()),
            ("fragmentEntryKey", fragment.slug.clone()),
        ];
        form.extend(fragment_form(fragment));
        form.push(("previewFileEntryId", preview_file_entry_id.unwrap_or("0").to_string()));
        form.push((
            "type",
            server_type_code(fragment.metadata.fragment_type).to_string(),
        ));
        form.push(("status", "0".to_string()));

        self.jsonws(session, "fragment.fragmententry/add-fragment-entry", &form)
            .await
            .map(|_| ())
    }

    async fn update_fragment_entry(
        &self,
        session: &Session,
        fragment_entry_id: &str,
        fragment: &Fragment,
        preview_file_entry_id: Option<&str>,
    ) -> Result<()> {
        let mut form = vec![("fragmentEntryId", fragment_entry_id.to_string())];
        form.extend(fragment_form(fragment));
        form.push(("previewFileEntryId", preview_file_entry_id.unwrap_or("0").to_string()));
        form.push(("status", "0".to_string()));

        self.jsonws(session, "fragment.fragmententry/update-fragment-entry", &form)
            .await
            .map(|_| ())
    }

    async fn upload_thumbnail(
        &self,
        session: &Session,
        group_id: &str,
        fragment: &Fragment,
        thumbnail: &[u8],
    ) -> Result<String> {
        let file_name = fragment
            .metadata
            .thumbnail_path
            .as_deref()
            .and_then(|path| path.rsplit('/').next())
            .unwrap_or("thumbnail.png")
            .to_string();

        let body = self
            .portal_text(
                session,
                "upload_fragment_entry_preview",
                &[
                    ("groupId", group_id.to_string()),
                    ("fileName", file_name),
                    ("fileContent", STANDARD.encode(thumbnail)),
                ],
            )
            .await?;
        let value = parse_response(200, &body)?;
        id_field(&value, "fileEntryId")
            .ok_or_else(|| FragkitError::api("Thumbnail upload returned no fileEntryId"))
    }

    async fn export_zip(&self, session: &Session, group_id: &str) -> Result<Bytes> {
        let action = "export_fragment_compositions_and_fragment_entries";
        let request = self
            .post(
                session,
                AuthScheme::PreferBearer,
                &format!("{PORTAL_FRAGMENT_PREFIX}/{action}"),
            )
            .form(&[("groupId", group_id.to_string())]);
        let (status, body) = self.execute(action, request).await?;

        if status >= 400 || body.first() == Some(&b'{') {
            parse_response(status, &String::from_utf8_lossy(&body))?;
        }
        Ok(body)
    }

    async fn import_zip(
        &self,
        session: &Session,
        group_id: &str,
        archive: Bytes,
    ) -> Result<ImportZipResponse> {
        let part = Part::bytes(archive.to_vec())
            .file_name("liferay-fragments.zip")
            .mime_str("application/zip")?;
        let form = Form::new()
            .text("groupId", group_id.to_string())
            .part("file", part);

        let request = self
            .post(
                session,
                AuthScheme::PreferBearer,
                &format!("{PORTAL_FRAGMENT_PREFIX}/import"),
            )
            .multipart(form);
        let (status, body) = self.execute("import", request).await?;
        let value = parse_response(status, &String::from_utf8_lossy(&body))?;
        decode_import_response(value)
    }

    async fn render_fragment_preview(
        &self,
        session: &Session,
        group_id: &str,
        fragment: &Fragment,
    ) -> Result<String> {
        self.render_preview(session, group_id, Preview::Fragment(fragment))
            .await
    }

    async fn render_page_definition_preview(
        &self,
        session: &Session,
        group_id: &str,
        definition_data: &str,
    ) -> Result<String> {
        self.render_preview(session, group_id, Preview::PageDefinition(definition_data))
            .await
    }

    async fn render_composition_preview(
        &self,
        session: &Session,
        group_id: &str,
        definition_data: &str,
    ) -> Result<String> {
        self.render_preview(session, group_id, Preview::Composition(definition_data))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::session::{BasicCredentials, OAuthToken};
    use crate::project::{FragmentMetadata, FragmentType};
    use chrono::Duration;

    /// Nothing listens here, so any request fails fast
    const UNREACHABLE_HOST: &str = "http://127.0.0.1:1";

    fn oauth_session(expires_in: Duration) -> Session {
        Session::new(UNREACHABLE_HOST)
            .with_basic(BasicCredentials::new("test@liferay.com", "test"))
            .with_token(OAuthToken {
                access_token: "access".to_string(),
                refresh_token: Some("refresh".to_string()),
                expiration_date: Utc::now() + expires_in,
            })
    }

    fn with_client(mut session: Session) -> Session {
        session.oauth_client = Some(OAuthClient::new("client", "secret"));
        session
    }

    fn form_body(request: &reqwest::Request) -> String {
        let bytes = request.body().and_then(|body| body.as_bytes()).unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn api_message(result: Result<Value>) -> String {
        match result {
            Err(FragkitError::Api { message }) => message,
            other => panic!("expected API error, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_success_body() {
        let value = parse_response(200, r#"[{"name": "Basic"}]"#).unwrap();
        assert_eq!(value[0]["name"], "Basic");
        assert_eq!(parse_response(200, "").unwrap(), Value::Null);
    }

    #[test]
    fn test_status_400_fails_regardless_of_body() {
        assert_eq!(
            api_message(parse_response(404, "<html>Not Found</html>")),
            "Request failed with status 404"
        );
        assert_eq!(
            api_message(parse_response(500, r#"{"ok": true}"#)),
            "Request failed with status 500"
        );
    }

    #[test]
    fn test_known_error_type_maps_to_message() {
        let body = r#"{"error": {"type": "com.liferay.fragment.exception.DuplicateFragmentEntryKeyException", "message": "raw"}}"#;
        assert_eq!(
            api_message(parse_response(200, body)),
            "A fragment with the same key already exists"
        );

        let body = r#"{"exception": "com.liferay.portal.kernel.security.auth.PrincipalException: no"}"#;
        assert_eq!(
            api_message(parse_response(403, body)),
            "Not enough permissions to perform this operation"
        );
    }

    #[test]
    fn test_generic_error_fields() {
        assert_eq!(
            api_message(parse_response(200, r#"{"error": "Unable to import"}"#)),
            "Unable to import"
        );
        assert_eq!(
            api_message(parse_response(200, r#"{"error": {"type": "SomethingElse", "message": "boom"}}"#)),
            "boom"
        );
        assert_eq!(
            api_message(parse_response(200, r#"{"exception": "java.lang.NullPointerException"}"#)),
            "java.lang.NullPointerException"
        );
        assert!(parse_response(200, r#"{"error": null, "name": "x"}"#).is_ok());
    }

    #[test]
    fn test_invalid_json_on_success_fails() {
        assert!(api_message(parse_response(200, "not json")).starts_with("Invalid JSON response"));
    }

    #[test]
    fn test_text_response() {
        assert_eq!(parse_text_response(200, "<p>hi</p>").unwrap(), "<p>hi</p>");
        assert!(parse_text_response(200, r#"{"error": "render failed"}"#).is_err());
        assert!(parse_text_response(502, "").is_err());
    }

    #[test]
    fn test_known_exception_table() {
        assert_eq!(
            known_exception_message("FragmentCollectionNameException"),
            Some("Collection name is not valid")
        );
        assert_eq!(
            known_exception_message("com.liferay.fragment.exception.FragmentEntryConfigurationException: bad"),
            Some("Fragment configuration is not valid")
        );
        assert_eq!(known_exception_message("IllegalStateException"), None);
    }

    #[test]
    fn test_id_field() {
        let value = serde_json::json!({"fileEntryId": 42});
        assert_eq!(id_field(&value, "fileEntryId").as_deref(), Some("42"));
        assert!(id_field(&value, "missing").is_none());
    }

    #[tokio::test]
    async fn test_unexpired_token_is_kept_without_request() {
        let client = HttpApiClient::new().unwrap();
        let session = with_client(oauth_session(Duration::minutes(5)));
        let refreshed = client.refresh_session(session.clone()).await;
        assert_eq!(refreshed, session);
    }

    #[tokio::test]
    async fn test_failed_refresh_clears_token() {
        let client = HttpApiClient::new().unwrap();
        let session = with_client(oauth_session(Duration::minutes(-5)));
        let refreshed = client.refresh_session(session.clone()).await;
        assert!(refreshed.oauth.is_none());
        assert_eq!(refreshed.basic, session.basic);
        assert_eq!(refreshed.oauth_client, session.oauth_client);
    }

    #[tokio::test]
    async fn test_expired_token_without_client_is_dropped() {
        let client = HttpApiClient::new().unwrap();
        let refreshed = client.refresh_session(oauth_session(Duration::minutes(-5))).await;
        assert!(refreshed.oauth.is_none());

        let plain = Session::new(UNREACHABLE_HOST);
        assert_eq!(client.refresh_session(plain.clone()).await, plain);
    }

    #[test]
    fn test_token_grant_selection() {
        let client = OAuthClient::new("client", "secret");

        let refresh = token_form(&client, Some("refresh".to_string()));
        assert!(refresh.contains(&("grant_type", "refresh_token".to_string())));
        assert!(refresh.contains(&("refresh_token", "refresh".to_string())));

        let credentials = token_form(&client, None);
        assert!(credentials.contains(&("grant_type", "client_credentials".to_string())));
        assert!(credentials.contains(&("client_secret", "secret".to_string())));
        assert!(!credentials.iter().any(|(key, _)| *key == "refresh_token"));
    }

    #[test]
    fn test_empty_import_body_means_nothing_imported() {
        let response = decode_import_response(parse_response(200, "").unwrap()).unwrap();
        assert_eq!(response, ImportZipResponse::default());

        let value = parse_response(200, r#"{"fragmentEntriesImportResult": []}"#).unwrap();
        let response = decode_import_response(value).unwrap();
        assert_eq!(response.fragment_entries_import_result, Some(Vec::new()));
    }

    #[test]
    fn test_preview_requests() {
        let client = HttpApiClient::new().unwrap();
        let session = oauth_session(Duration::minutes(5));

        let mut fragment = Fragment::new("card", FragmentMetadata::with_defaults("Card", FragmentType::Component));
        fragment.html = "<div>card</div>".to_string();
        let request = client
            .preview_request(&session, "20121", Preview::Fragment(&fragment))
            .build()
            .unwrap();
        assert_eq!(request.url().path(), "/c/portal/fragment/render_fragment_entry");
        assert_eq!(request.headers()[AUTHORIZATION], "Bearer access");
        let body = form_body(&request);
        assert!(body.contains("groupId=20121"));
        assert!(body.contains("html=%3Cdiv%3Ecard%3C%2Fdiv%3E"));

        let request = client
            .preview_request(&session, "20121", Preview::PageDefinition("{}"))
            .build()
            .unwrap();
        assert_eq!(request.url().path(), "/c/portal/fragment/render_page_definition");
        assert!(form_body(&request).contains("pageDefinition=%7B%7D"));

        let request = client
            .preview_request(&session.without_token(), "20121", Preview::Composition("{}"))
            .build()
            .unwrap();
        assert_eq!(request.url().path(), "/c/portal/fragment/render_fragment_composition");
        assert!(request.headers()[AUTHORIZATION].to_str().unwrap().starts_with("Basic "));
        assert!(form_body(&request).contains("fragmentCompositionDefinition=%7B%7D"));
    }
}
