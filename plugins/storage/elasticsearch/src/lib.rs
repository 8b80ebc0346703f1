mod dsl;

use std::future::Future;
use std::pin::Pin;

use reqwest::{Method, StatusCode, Url};
use serde_json::{Value, json};

use txwatch_api::{SearchIndex, SearchQuery, SearchResponse, StoreError};

pub use dsl::search_body;

/// Config for `backend = "elasticsearch"`.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct ElasticsearchConfig {
    /// Cluster base URL, e.g. `https://localhost:9200`.
    pub url: String,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub accept_invalid_certs: bool,
}

/// Elasticsearch `SearchIndex` backend over the REST API.
///
/// Аннотации пишутся через `_update` с `refresh=wait_for`: следующий
/// search уже видит новое значение поля.
pub struct ElasticsearchIndex {
    http: reqwest::Client,
    base_url: Url,
    user: Option<String>,
    password: Option<String>,
}

impl ElasticsearchIndex {
    pub fn new(config: &ElasticsearchConfig) -> Result<Self, StoreError> {
        let base_url = Url::parse(&config.url)
            .map_err(|e| StoreError::Rejected(format!("invalid url '{}': {e}", config.url)))?;
        if base_url.cannot_be_a_base() {
            return Err(StoreError::Rejected(format!("invalid url '{}'", config.url)));
        }
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()
            .map_err(|e| StoreError::Unavailable(format!("HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url,
            user: config.user.clone(),
            password: config.password.clone(),
        })
    }

    /// `base_url` + percent-encoded path segments.
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn request(&self, method: Method, url: Url) -> reqwest::RequestBuilder {
        let req = self.http.request(method, url);
        match &self.user {
            Some(user) => req.basic_auth(user, self.password.as_deref()),
            None => req,
        }
    }

    async fn send(
        &self,
        req: reqwest::RequestBuilder,
        what: &str,
    ) -> Result<reqwest::Response, StoreError> {
        let resp = req
            .send()
            .await
            .map_err(|e| StoreError::Unavailable(format!("ES request: {e}")))?;

        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        tracing::debug!(%status, what, body = %body, "elasticsearch error response");
        Err(classify(status, what, body))
    }

    /// HEAD: 2xx → есть, 404 → нет, остальное → кластер недоступен.
    async fn head(&self, url: Url) -> Result<bool, StoreError> {
        let path = url.path().to_string();
        let resp = self
            .request(Method::HEAD, url)
            .send()
            .await
            .map_err(|e| StoreError::Unavailable(format!("ES request: {e}")))?;
        match resp.status() {
            s if s.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            s => Err(StoreError::Unavailable(format!("HEAD {path}: {s}"))),
        }
    }
}

/// 404 → missing, 5xx/429 → transient, other 4xx → refused.
fn classify(status: StatusCode, what: &str, body: String) -> StoreError {
    if status == StatusCode::NOT_FOUND {
        StoreError::NotFound(what.to_string())
    } else if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        StoreError::Unavailable(format!("{status}: {body}"))
    } else {
        StoreError::Rejected(format!("{status}: {body}"))
    }
}

impl SearchIndex for ElasticsearchIndex {
    fn search(
        &self,
        index: &str,
        query: &SearchQuery,
    ) -> Pin<Box<dyn Future<Output = Result<SearchResponse, StoreError>> + Send + '_>> {
        let index = index.to_string();
        let body = search_body(query);
        Box::pin(async move {
            let url = self.url(&[&index, "_search"]);
            let req = self.request(Method::POST, url).json(&body);
            let resp = self.send(req, &format!("index '{index}'")).await?;
            let parsed: dsl::EsSearchResponse = resp
                .json()
                .await
                .map_err(|e| StoreError::Unavailable(format!("parse ES response: {e}")))?;
            Ok(parsed.into_response())
        })
    }

    fn exists(
        &self,
        index: &str,
    ) -> Pin<Box<dyn Future<Output = Result<bool, StoreError>> + Send + '_>> {
        let index = index.to_string();
        Box::pin(async move { self.head(self.url(&[&index])).await })
    }

    fn contains(
        &self,
        index: &str,
        id: &str,
    ) -> Pin<Box<dyn Future<Output = Result<bool, StoreError>> + Send + '_>> {
        let (index, id) = (index.to_string(), id.to_string());
        Box::pin(async move { self.head(self.url(&[&index, "_doc", &id])).await })
    }

    fn indices(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<String>, StoreError>> + Send + '_>> {
        Box::pin(async move {
            let mut url = self.url(&["_cat", "indices"]);
            url.query_pairs_mut()
                .append_pair("format", "json")
                .append_pair("h", "index");
            let resp = self.send(self.request(Method::GET, url), "indices").await?;
            let rows: Vec<dsl::CatIndex> = resp
                .json()
                .await
                .map_err(|e| StoreError::Unavailable(format!("parse ES response: {e}")))?;
            Ok(rows.into_iter().map(|r| r.index).collect())
        })
    }

    fn update_field(
        &self,
        index: &str,
        id: &str,
        field: &str,
        value: Value,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
        let (index, id) = (index.to_string(), id.to_string());
        let body = json!({ "doc": { field: value } });
        Box::pin(async move {
            let mut url = self.url(&[&index, "_update", &id]);
            url.query_pairs_mut().append_pair("refresh", "wait_for");
            let req = self.request(Method::POST, url).json(&body);
            self.send(req, &format!("document '{id}' in index '{index}'"))
                .await?;
            Ok(())
        })
    }
}
