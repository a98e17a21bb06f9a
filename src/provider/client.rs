//! HTTP client for a Prismic-compatible content API

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use super::wire::{ApiInfo, RawDocument, RawPage};
use super::{ContentProvider, ProviderError};
use crate::config::ProviderConfig;

/// Client for the content API's REST interface
#[derive(Clone)]
pub struct PrismicClient {
    client: Client,
    endpoint: String,
    access_token: Option<String>,
}

impl PrismicClient {
    /// Create a client from the provider configuration
    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let endpoint = config.endpoint.trim().trim_end_matches('/').to_string();
        if endpoint.is_empty() {
            return Err(ProviderError::NotConfigured);
        }
        Url::parse(&endpoint).map_err(|e| ProviderError::InvalidUrl {
            url: endpoint.clone(),
            reason: e.to_string(),
        })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .user_agent(concat!("spacetraveling/", env!("CARGO_PKG_VERSION")))
            .gzip(true)
            .build()?;

        Ok(Self {
            client,
            endpoint,
            access_token: config.access_token.clone().filter(|t| !t.is_empty()),
        })
    }

    fn url_with_params(&self, base: &str, params: &[(&str, String)]) -> Result<Url, ProviderError> {
        let mut url = Url::parse(base).map_err(|e| ProviderError::InvalidUrl {
            url: base.to_string(),
            reason: e.to_string(),
        })?;
        if !params.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in params {
                pairs.append_pair(key, value);
            }
        }
        Ok(self.with_token(url))
    }

    /// Append the configured access token, if any
    fn with_token(&self, mut url: Url) -> Url {
        if let Some(token) = &self.access_token {
            url.query_pairs_mut().append_pair(ACCESS_TOKEN, token);
        }
        url
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, ProviderError> {
        debug!("GET {}", redact(&url));
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();

        if !status.is_success() {
            return Err(ProviderError::Status {
                status: status.as_u16(),
                url: redact(&url),
            });
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| ProviderError::Decode {
            url: redact(&url),
            reason: e.to_string(),
        })
    }

    /// Current published content ref
    async fn master_ref(&self) -> Result<String, ProviderError> {
        let url = self.url_with_params(&self.endpoint, &[])?;
        let info: ApiInfo = self.get_json(url).await?;
        info.master_ref()
            .map(str::to_string)
            .ok_or(ProviderError::NoMasterRef)
    }

    async fn search(&self, predicate: String, page_size: usize) -> Result<RawPage, ProviderError> {
        let reference = self.master_ref().await?;
        let url = self.url_with_params(
            &format!("{}/documents/search", self.endpoint),
            &[
                ("ref", reference),
                ("q", predicate),
                ("pageSize", page_size.max(1).to_string()),
            ],
        )?;
        self.get_json(url).await
    }
}

#[async_trait]
impl ContentProvider for PrismicClient {
    async fn query(&self, document_type: &str, page_size: usize) -> Result<RawPage, ProviderError> {
        let page = self
            .search(at_predicate("document.type", document_type), page_size)
            .await?;
        info!(
            "Fetched {} `{}` documents (more: {})",
            page.results.len(),
            document_type,
            !page.cursor().is_exhausted()
        );
        Ok(page)
    }

    async fn get_by_uid(&self, document_type: &str, uid: &str) -> Result<RawDocument, ProviderError> {
        let not_found = || ProviderError::NotFound {
            document_type: document_type.to_string(),
            uid: uid.to_string(),
        };

        if uid.is_empty() || uid.contains(['"', '[', ']']) {
            return Err(not_found());
        }

        let page = self
            .search(at_predicate(&format!("my.{}.uid", document_type), uid), 1)
            .await?;
        page.results.into_iter().next().ok_or_else(not_found)
    }

    async fn fetch_page(&self, url: &str) -> Result<RawPage, ProviderError> {
        let parsed = Url::parse(url).map_err(|e| ProviderError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ProviderError::InvalidUrl {
                url: url.to_string(),
                reason: "cursor must be an http(s) URL".to_string(),
            });
        }
        // cursors never carry the token; it is added per request
        let url = self.with_token(strip_token(parsed));
        self.get_json(url).await
    }
}

/// `[[at(path, "value")]]` query predicate
fn at_predicate(path: &str, value: &str) -> String {
    format!(r#"[[at({}, "{}")]]"#, path, value)
}

/// Query parameter carrying the repository access token
const ACCESS_TOKEN: &str = "access_token";

/// `url` without its access token, for cursors that end up in pages and for
/// logs. Text that is not a URL is returned unchanged.
pub fn without_access_token(url: &str) -> String {
    match Url::parse(url) {
        Ok(parsed) if has_token(&parsed) => strip_token(parsed).to_string(),
        _ => url.to_string(),
    }
}

fn has_token(url: &Url) -> bool {
    url.query_pairs().any(|(k, _)| k == ACCESS_TOKEN)
}

fn strip_token(mut url: Url) -> Url {
    if !has_token(&url) {
        return url;
    }
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != ACCESS_TOKEN)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(kept);
    }
    url
}

fn redact(url: &Url) -> String {
    strip_token(url.clone()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::{
        matchers::{method, path, query_param},
        Mock, MockServer, ResponseTemplate,
    };

    async fn mount_api(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/api/v2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "refs": [{ "id": "master", "ref": "MASTER", "isMasterRef": true }]
            })))
            .mount(server)
            .await;
    }

    fn client_for(server: &MockServer, token: Option<&str>) -> PrismicClient {
        PrismicClient::new(&ProviderConfig {
            endpoint: format!("{}/api/v2", server.uri()),
            access_token: token.map(str::to_string),
            ..ProviderConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_requires_endpoint() {
        let err = PrismicClient::new(&ProviderConfig::default()).err().unwrap();
        assert!(matches!(err, ProviderError::NotConfigured));

        let err = PrismicClient::new(&ProviderConfig {
            endpoint: "not a url".to_string(),
            ..ProviderConfig::default()
        })
        .err()
        .unwrap();
        assert!(matches!(err, ProviderError::InvalidUrl { .. }));
    }

    #[test]
    fn test_at_predicate() {
        assert_eq!(
            at_predicate("document.type", "posts"),
            r#"[[at(document.type, "posts")]]"#
        );
    }

    #[test]
    fn test_redact_hides_token() {
        let url = Url::parse("https://x.io/api?ref=a&access_token=secret&q=1").unwrap();
        let shown = redact(&url);
        assert!(!shown.contains("secret"));
        assert!(shown.contains("ref=a"));
        assert!(shown.contains("q=1"));
    }

    #[tokio::test]
    async fn test_query_uses_master_ref_and_page_size() {
        let server = MockServer::start().await;
        mount_api(&server).await;

        Mock::given(method("GET"))
            .and(path("/api/v2/documents/search"))
            .and(query_param("ref", "MASTER"))
            .and(query_param("q", r#"[[at(document.type, "posts")]]"#))
            .and(query_param("pageSize", "5"))
            .and(query_param("access_token", "tok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [{ "uid": "a", "data": {} }],
                "next_page": "https://next"
            })))
            .mount(&server)
            .await;

        let client = client_for(&server, Some("tok"));
        let page = client.query("posts", 5).await.unwrap();
        assert_eq!(page.results.len(), 1);
        assert_eq!(page.cursor().url(), Some("https://next"));
    }

    #[test]
    fn test_without_access_token() {
        assert_eq!(
            without_access_token("https://x.io/api?page=2&access_token=secret"),
            "https://x.io/api?page=2"
        );
        assert_eq!(
            without_access_token("https://x.io/api?access_token=secret"),
            "https://x.io/api"
        );
        assert_eq!(without_access_token("https://next"), "https://next");
    }

    #[tokio::test]
    async fn test_next_page_cursor_hides_token_and_fetch_adds_it() {
        let server = MockServer::start().await;
        mount_api(&server).await;

        let next = format!(
            "{}/api/v2/documents/search?page=2&pageSize=5&access_token=tok",
            server.uri()
        );
        Mock::given(method("GET"))
            .and(path("/api/v2/documents/search"))
            .and(query_param("q", r#"[[at(document.type, "posts")]]"#))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [{ "uid": "a", "data": {} }],
                "next_page": next
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v2/documents/search"))
            .and(query_param("page", "2"))
            .and(query_param("access_token", "tok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [{ "uid": "b", "data": {} }],
                "next_page": null
            })))
            .mount(&server)
            .await;

        let client = client_for(&server, Some("tok"));
        let first = client.query("posts", 5).await.unwrap();
        let cursor = first.cursor();
        let url = cursor.url().unwrap();
        assert!(!url.contains("tok"));
        assert!(url.contains("page=2"));

        let second = client.fetch_page(url).await.unwrap();
        assert_eq!(second.results[0].uid.as_deref(), Some("b"));
        assert!(second.cursor().is_exhausted());
    }

    #[tokio::test]
    async fn test_get_by_uid_not_found() {
        let server = MockServer::start().await;
        mount_api(&server).await;

        Mock::given(method("GET"))
            .and(path("/api/v2/documents/search"))
            .and(query_param("q", r#"[[at(my.posts.uid, "missing")]]"#))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "results": [] })))
            .mount(&server)
            .await;

        let client = client_for(&server, None);
        let err = client.get_by_uid("posts", "missing").await.unwrap_err();
        assert!(err.is_not_found());

        // never reaches the network
        let err = client.get_by_uid("posts", r#"x")]]"#).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_get_by_uid_found() {
        let server = MockServer::start().await;
        mount_api(&server).await;

        Mock::given(method("GET"))
            .and(path("/api/v2/documents/search"))
            .and(query_param("q", r#"[[at(my.posts.uid, "hello")]]"#))
            .and(query_param("pageSize", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [{ "uid": "hello", "data": { "title": "Hello" } }]
            })))
            .mount(&server)
            .await;

        let client = client_for(&server, None);
        let doc = client.get_by_uid("posts", "hello").await.unwrap();
        assert_eq!(doc.uid.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn test_fetch_page_errors() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/broken"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/down"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = client_for(&server, None);

        let err = client
            .fetch_page(&format!("{}/broken", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Decode { .. }));

        let err = client
            .fetch_page(&format!("{}/down", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Status { status: 503, .. }));

        let err = client.fetch_page("ftp://x/y").await.unwrap_err();
        assert!(matches!(err, ProviderError::InvalidUrl { .. }));
    }
}
