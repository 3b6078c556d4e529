//! # REST Client
//!
//! [`DocumentStore`] over the document database's HTTPS REST API.
//!
//! ## Request Anatomy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  PUT https://account.documents.azure.com/dbs/ToDoList/colls/Items/docs/42│
//! │                                                                         │
//! │  authorization:               type%3Dmaster%26ver%3D1.0%26sig%3D...    │
//! │  x-ms-date:                   Tue, 01 Nov 1994 08:12:31 GMT             │
//! │  x-ms-version:                2018-12-31                                │
//! │  x-ms-documentdb-partitionkey: ["42"]                                   │
//! │  if-match:                    "00000a00-0000-0000-0000-000000000000"    │
//! │                                                                         │
//! │  {"id":"42","description":"Buy milk","isComplete":true}                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Queries are `POST`s of parameterized SQL to a feed (`.../docs`) with
//! `content-type: application/query+json`; large results come back in pages
//! chained by the `x-ms-continuation` header.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{HeaderMap, CONTENT_TYPE, IF_MATCH};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use super::auth::{rfc1123_date, MasterKey};
use super::DocumentStore;
use crate::error::{DocDbError, DocDbResult};
use crate::resource::{
    CollectionResource, DatabaseResource, Document, PartitionKeyDefinition, RequestOptions,
    ResourceQuery,
};

/// REST API version sent with every request.
pub const API_VERSION: &str = "2018-12-31";

const QUERY_CONTENT_TYPE: &str = "application/query+json";
const JSON_CONTENT_TYPE: &str = "application/json";
const CONTINUATION_HEADER: &str = "x-ms-continuation";
const PARTITION_KEY_HEADER: &str = "x-ms-documentdb-partitionkey";
const REQUEST_CHARGE_HEADER: &str = "x-ms-request-charge";

/// Default timeout for a single request.
const REQUEST_TIMEOUT_SECS: u64 = 60;

/// Resource type segment used when signing a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResourceType {
    Databases,
    Collections,
    Documents,
}

impl ResourceType {
    fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Databases => "dbs",
            ResourceType::Collections => "colls",
            ResourceType::Documents => "docs",
        }
    }

    /// Property of a query response holding the result list.
    fn list_property(&self) -> &'static str {
        match self {
            ResourceType::Databases => "Databases",
            ResourceType::Collections => "DocumentCollections",
            ResourceType::Documents => "Documents",
        }
    }
}

/// Error body returned by the service on non-2xx responses.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: Option<String>,
    message: Option<String>,
}

/// Client for one database account.
#[derive(Debug)]
pub struct CosmosClient {
    http: Client,
    endpoint: Url,
    key: MasterKey,
}

impl CosmosClient {
    /// Creates a client for `endpoint` signing with the base64 `auth_key`.
    ///
    /// ## Errors
    /// `DocDbError::Connection` if the endpoint is not an http(s) base URL,
    /// the key is not base64, or the HTTP client cannot be built.
    pub fn new(endpoint: Url, auth_key: &str) -> DocDbResult<Self> {
        if endpoint.cannot_be_a_base() || !matches!(endpoint.scheme(), "http" | "https") {
            return Err(DocDbError::Connection(format!(
                "Endpoint must be an http(s) URL, got: {}",
                endpoint
            )));
        }

        let key = MasterKey::from_base64(auth_key)?;

        let http = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| DocDbError::Connection(e.to_string()))?;

        debug!(endpoint = %endpoint, "Document store client created");

        Ok(CosmosClient {
            http,
            endpoint,
            key,
        })
    }

    /// Returns the account endpoint.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Starts a signed request.
    ///
    /// `path` is what goes on the wire; `resource_link` is what gets signed
    /// (the feed's parent for POSTs, the resource itself otherwise).
    fn request(
        &self,
        method: Method,
        path: &str,
        resource_type: ResourceType,
        resource_link: &str,
    ) -> DocDbResult<RequestBuilder> {
        let url = self.endpoint.join(path)?;
        let date = rfc1123_date(Utc::now());
        let authorization =
            self.key
                .authorization(method.as_str(), resource_type.as_str(), resource_link, &date);

        Ok(self
            .http
            .request(method, url)
            .header("authorization", authorization)
            .header("x-ms-date", date)
            .header("x-ms-version", API_VERSION))
    }

    /// Sends a request, turning non-2xx responses into `DocDbError::Store`.
    async fn execute(&self, request: RequestBuilder) -> DocDbResult<Response> {
        let response = request.send().await?;
        let status = response.status();

        if let Some(charge) = response.headers().get(REQUEST_CHARGE_HEADER) {
            debug!(status = status.as_u16(), charge = ?charge, "Store response");
        }

        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let (code, message) = parse_error_body(&body);
        warn!(status = status.as_u16(), code = ?code, "Store request failed");

        Err(DocDbError::store(status.as_u16(), code, message))
    }

    /// Sends a request with a JSON body and decodes the JSON response.
    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        body: &Value,
    ) -> DocDbResult<T> {
        let request = request
            .header(CONTENT_TYPE, JSON_CONTENT_TYPE)
            .body(serde_json::to_vec(body)?);
        let response = self.execute(request).await?;
        Ok(response.json().await?)
    }

    /// Builds one page request of a query.
    fn query_request(
        &self,
        feed_path: &str,
        resource_type: ResourceType,
        resource_link: &str,
        sql: &[u8],
        continuation: Option<&str>,
    ) -> DocDbResult<RequestBuilder> {
        let mut request = self
            .request(Method::POST, feed_path, resource_type, resource_link)?
            .header(CONTENT_TYPE, QUERY_CONTENT_TYPE)
            .header("x-ms-documentdb-isquery", "True")
            .header("x-ms-documentdb-query-enablecrosspartition", "True")
            .body(sql.to_vec());

        if let Some(token) = continuation {
            request = request.header(CONTINUATION_HEADER, token);
        }
        Ok(request)
    }

    /// Runs a query against a feed, following continuation tokens.
    async fn query<T: DeserializeOwned>(
        &self,
        feed_path: &str,
        resource_type: ResourceType,
        resource_link: &str,
        query: &ResourceQuery,
    ) -> DocDbResult<Vec<T>> {
        let sql = serde_json::to_vec(&query.to_sql())?;

        let results = collect_pages(|continuation| {
            let request = self.query_request(
                feed_path,
                resource_type,
                resource_link,
                &sql,
                continuation.as_deref(),
            );
            async move {
                let response = self.execute(request?).await?;
                let next = continuation_token(response.headers());
                let page: Value = response.json().await?;
                Ok((take_page::<T>(page, resource_type.list_property())?, next))
            }
        })
        .await?;

        debug!(feed = %feed_path, count = results.len(), "Query complete");
        Ok(results)
    }

    /// Builds a document replace, carrying the If-Match precondition if any.
    fn replace_request(
        &self,
        document_link: &str,
        options: &RequestOptions,
    ) -> DocDbResult<RequestBuilder> {
        let mut request = self
            .request(Method::PUT, document_link, ResourceType::Documents, document_link)?
            .header(
                PARTITION_KEY_HEADER,
                partition_key_header(last_segment(document_link)),
            );

        if let Some(condition) = &options.access_condition {
            request = request.header(IF_MATCH, condition.etag.as_str());
        }
        Ok(request)
    }

    /// Builds a document delete.
    fn delete_request(&self, document_link: &str) -> DocDbResult<RequestBuilder> {
        Ok(self
            .request(
                Method::DELETE,
                document_link,
                ResourceType::Documents,
                document_link,
            )?
            .header(
                PARTITION_KEY_HEADER,
                partition_key_header(last_segment(document_link)),
            ))
    }
}

#[async_trait]
impl DocumentStore for CosmosClient {
    async fn query_databases(&self, query: &ResourceQuery) -> DocDbResult<Vec<DatabaseResource>> {
        self.query("dbs", ResourceType::Databases, "", query).await
    }

    async fn create_database(&self, id: &str) -> DocDbResult<DatabaseResource> {
        let request = self.request(Method::POST, "dbs", ResourceType::Databases, "")?;
        self.send_json(request, &json!({ "id": id })).await
    }

    async fn query_collections(
        &self,
        database_link: &str,
        query: &ResourceQuery,
    ) -> DocDbResult<Vec<CollectionResource>> {
        let feed = format!("{}/colls", database_link);
        self.query(&feed, ResourceType::Collections, database_link, query)
            .await
    }

    async fn create_collection(
        &self,
        database_link: &str,
        id: &str,
    ) -> DocDbResult<CollectionResource> {
        let feed = format!("{}/colls", database_link);
        let request = self.request(
            Method::POST,
            &feed,
            ResourceType::Collections,
            database_link,
        )?;
        let body = json!({
            "id": id,
            "partitionKey": PartitionKeyDefinition::default(),
        });
        self.send_json(request, &body).await
    }

    async fn query_documents(
        &self,
        collection_link: &str,
        query: &ResourceQuery,
    ) -> DocDbResult<Vec<Document>> {
        let feed = format!("{}/docs", collection_link);
        self.query(&feed, ResourceType::Documents, collection_link, query)
            .await
    }

    async fn create_document(
        &self,
        collection_link: &str,
        body: &Map<String, Value>,
    ) -> DocDbResult<Document> {
        let id = body.get("id").and_then(Value::as_str).unwrap_or_default();
        let feed = format!("{}/docs", collection_link);
        let request = self
            .request(Method::POST, &feed, ResourceType::Documents, collection_link)?
            .header(PARTITION_KEY_HEADER, partition_key_header(id));
        self.send_json(request, &Value::Object(body.clone())).await
    }

    async fn replace_document(
        &self,
        document_link: &str,
        body: &Map<String, Value>,
        options: &RequestOptions,
    ) -> DocDbResult<Document> {
        let request = self.replace_request(document_link, options)?;
        self.send_json(request, &Value::Object(body.clone())).await
    }

    async fn delete_document(&self, document_link: &str) -> DocDbResult<()> {
        self.execute(self.delete_request(document_link)?).await?;
        Ok(())
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Fetches pages until one comes back without a continuation token.
///
/// `fetch` receives the token of the previous page (`None` for the first).
async fn collect_pages<T, F, Fut>(mut fetch: F) -> DocDbResult<Vec<T>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = DocDbResult<(Vec<T>, Option<String>)>>,
{
    let mut results = Vec::new();
    let mut continuation = None;

    loop {
        let (page, next) = fetch(continuation.take()).await?;
        results.extend(page);

        match next {
            Some(token) => continuation = Some(token),
            None => return Ok(results),
        }
    }
}

/// Partition key header value for a collection partitioned on `/id`.
fn partition_key_header(id: &str) -> String {
    json!([id]).to_string()
}

fn last_segment(link: &str) -> &str {
    link.trim_end_matches('/').rsplit('/').next().unwrap_or(link)
}

fn continuation_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(CONTINUATION_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Pulls the result list out of one query response page.
fn take_page<T: DeserializeOwned>(mut page: Value, list_property: &str) -> DocDbResult<Vec<T>> {
    match page.get_mut(list_property).map(Value::take) {
        Some(list) => Ok(serde_json::from_value(list)?),
        None => Err(DocDbError::Serialization(format!(
            "Query response is missing '{}'",
            list_property
        ))),
    }
}

fn parse_error_body(body: &str) -> (Option<String>, String) {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody {
            code,
            message: Some(message),
        }) => (code, message),
        Ok(ErrorBody { code, message: None }) => (code, body.to_string()),
        Err(_) => (None, body.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::AccessCondition;

    fn client() -> CosmosClient {
        let endpoint = Url::parse("https://account.documents.example.com:443/").unwrap();
        CosmosClient::new(endpoint, "dGVzdGtleQ==").unwrap()
    }

    #[test]
    fn test_rejects_non_http_endpoints() {
        let endpoint = Url::parse("mailto:someone@example.com").unwrap();
        assert!(matches!(
            CosmosClient::new(endpoint, "dGVzdGtleQ=="),
            Err(DocDbError::Connection(_))
        ));

        let endpoint = Url::parse("ftp://example.com/").unwrap();
        assert!(CosmosClient::new(endpoint, "dGVzdGtleQ==").is_err());
    }

    #[test]
    fn test_signed_request_headers() {
        let request = client()
            .request(
                Method::PUT,
                "dbs/ToDoList/colls/Items/docs/42",
                ResourceType::Documents,
                "dbs/ToDoList/colls/Items/docs/42",
            )
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(
            request.url().as_str(),
            "https://account.documents.example.com/dbs/ToDoList/colls/Items/docs/42"
        );
        let headers = request.headers();
        assert!(headers["authorization"]
            .to_str()
            .unwrap()
            .starts_with("type%3Dmaster%26ver%3D1.0%26sig%3D"));
        assert_eq!(headers["x-ms-version"], API_VERSION);
        assert!(headers["x-ms-date"].to_str().unwrap().ends_with("GMT"));
    }

    #[test]
    fn test_replace_request_carries_if_match() {
        let options = RequestOptions::with_condition(AccessCondition::if_match("\"v1\""));
        let request = client()
            .replace_request("dbs/ToDoList/colls/Items/docs/42", &options)
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(*request.method(), Method::PUT);
        assert_eq!(
            request.url().path(),
            "/dbs/ToDoList/colls/Items/docs/42"
        );
        let headers = request.headers();
        assert_eq!(headers[IF_MATCH], "\"v1\"");
        assert_eq!(headers[PARTITION_KEY_HEADER], r#"["42"]"#);
    }

    #[test]
    fn test_replace_request_without_condition() {
        let request = client()
            .replace_request("dbs/ToDoList/colls/Items/docs/42", &RequestOptions::default())
            .unwrap()
            .build()
            .unwrap();

        assert!(request.headers().get(IF_MATCH).is_none());
        assert_eq!(request.headers()[PARTITION_KEY_HEADER], r#"["42"]"#);
    }

    #[test]
    fn test_delete_request() {
        let request = client()
            .delete_request("dbs/ToDoList/colls/Items/docs/7")
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(*request.method(), Method::DELETE);
        assert_eq!(request.url().path(), "/dbs/ToDoList/colls/Items/docs/7");
        assert_eq!(request.headers()[PARTITION_KEY_HEADER], r#"["7"]"#);
    }

    #[test]
    fn test_query_request_headers() {
        let client = client();
        let sql = serde_json::to_vec(&ResourceQuery::by_id("1").to_sql()).unwrap();

        let first = client
            .query_request(
                "dbs/ToDoList/colls/Items/docs",
                ResourceType::Documents,
                "dbs/ToDoList/colls/Items",
                &sql,
                None,
            )
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(*first.method(), Method::POST);
        assert_eq!(first.headers()[CONTENT_TYPE], QUERY_CONTENT_TYPE);
        assert_eq!(first.headers()["x-ms-documentdb-isquery"], "True");
        assert!(first.headers().get(CONTINUATION_HEADER).is_none());

        let next = client
            .query_request(
                "dbs/ToDoList/colls/Items/docs",
                ResourceType::Documents,
                "dbs/ToDoList/colls/Items",
                &sql,
                Some("+RID:abc"),
            )
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(next.headers()[CONTINUATION_HEADER], "+RID:abc");
    }

    #[tokio::test]
    async fn test_collect_pages_follows_continuation() {
        let mut seen: Vec<Option<String>> = Vec::new();

        let results = collect_pages(|continuation| {
            seen.push(continuation.clone());
            let page = match continuation.as_deref() {
                None => (vec![1, 2], Some("a".to_string())),
                Some("a") => (vec![3], Some("b".to_string())),
                _ => (vec![4], None),
            };
            std::future::ready(Ok(page))
        })
        .await
        .unwrap();

        assert_eq!(results, vec![1, 2, 3, 4]);
        assert_eq!(
            seen,
            vec![None, Some("a".to_string()), Some("b".to_string())]
        );
    }

    #[tokio::test]
    async fn test_collect_pages_stops_on_error() {
        let mut calls = 0;

        let result: DocDbResult<Vec<i32>> = collect_pages(|continuation| {
            calls += 1;
            std::future::ready(match continuation {
                None => Ok((vec![1], Some("a".to_string()))),
                Some(_) => Err(DocDbError::store(503, None, "unavailable")),
            })
        })
        .await;

        assert_eq!(result.unwrap_err().status(), Some(503));
        assert_eq!(calls, 2);
    }

    #[test]
    fn test_partition_key_header() {
        assert_eq!(partition_key_header("42"), r#"["42"]"#);
        assert_eq!(partition_key_header("a\"b"), r#"["a\"b"]"#);
        assert_eq!(last_segment("dbs/d/colls/c/docs/42"), "42");
        assert_eq!(last_segment("dbs/d/colls/c/docs/42/"), "42");
    }

    #[test]
    fn test_take_page() {
        let page = json!({
            "_rid": "x",
            "Documents": [{"id": "1", "_etag": "\"e\""}],
            "_count": 1
        });
        let docs: Vec<Document> = take_page(page, "Documents").unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].etag, "\"e\"");

        let missing = take_page::<Document>(json!({}), "Documents");
        assert!(matches!(missing, Err(DocDbError::Serialization(_))));
    }

    #[test]
    fn test_parse_error_body() {
        let (code, message) =
            parse_error_body(r#"{"code":"PreconditionFailed","message":"etag mismatch"}"#);
        assert_eq!(code.as_deref(), Some("PreconditionFailed"));
        assert_eq!(message, "etag mismatch");

        let (code, message) = parse_error_body("gateway timeout");
        assert_eq!(code, None);
        assert_eq!(message, "gateway timeout");
    }

    #[test]
    fn test_continuation_token() {
        let mut headers = HeaderMap::new();
        assert_eq!(continuation_token(&headers), None);

        headers.insert(CONTINUATION_HEADER, "".parse().unwrap());
        assert_eq!(continuation_token(&headers), None);

        headers.insert(CONTINUATION_HEADER, "+RID:abc".parse().unwrap());
        assert_eq!(continuation_token(&headers).as_deref(), Some("+RID:abc"));
    }
}
