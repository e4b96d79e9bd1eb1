mod remote;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_RANGE};
use reqwest::{Method, StatusCode, Url};
use thiserror::Error;
use tracing::{debug, warn};

use crate::model::{NewSchool, RecordId, SchoolPatch, SchoolRecord};

pub const DEFAULT_TABLE: &str = "schools";
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("invalid service configuration: {message}")]
    Config { message: String },

    /// Failure reported by the service. Displays the service message as-is.
    #[error("{message}")]
    Remote {
        status: u16,
        message: String,
        code: Option<String>,
        details: Option<String>,
        hint: Option<String>,
    },

    #[error("no record with id {id}")]
    NotFound { id: RecordId },

    #[error("request failed: {source}")]
    Transport {
        #[source]
        source: reqwest::Error,
    },

    #[error("unexpected response from service: {message}")]
    Decode { message: String },
}

impl GatewayError {
    pub fn remote(status: u16, message: impl Into<String>) -> Self {
        GatewayError::Remote {
            status,
            message: message.into(),
            code: None,
            details: None,
            hint: None,
        }
    }
}

/// Sort applied by the service to a listing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Order {
    pub column: String,
    pub ascending: bool,
}

impl Order {
    pub fn newest_first() -> Self {
        Self {
            column: "created_at".to_string(),
            ascending: false,
        }
    }

    fn as_param(&self) -> String {
        let dir = if self.ascending { "asc" } else { "desc" };
        format!("{}.{}", self.column, dir)
    }
}

/// Table-scoped record operations. Each call is a single round trip with no
/// retry; errors are handed back unmodified.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn list_all(&self, order: Option<Order>) -> Result<Vec<SchoolRecord>, GatewayError>;

    async fn get_by_id(&self, id: &RecordId) -> Result<Option<SchoolRecord>, GatewayError>;

    async fn insert(&self, row: &NewSchool) -> Result<SchoolRecord, GatewayError>;

    async fn update_by_id(
        &self,
        id: &RecordId,
        patch: &SchoolPatch,
    ) -> Result<SchoolRecord, GatewayError>;

    async fn delete_by_id(&self, id: &RecordId) -> Result<(), GatewayError>;

    async fn count(&self) -> Result<u64, GatewayError>;
}

#[derive(Clone, Debug)]
pub struct GatewayConfig {
    pub service_url: String,
    pub anon_key: String,
    pub table: String,
    pub timeout_seconds: u64,
}

impl GatewayConfig {
    pub fn new(service_url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        Self {
            service_url: service_url.into(),
            anon_key: anon_key.into(),
            table: DEFAULT_TABLE.to_string(),
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
        }
    }
}

/// HTTP client for the `schools` table behind the service's REST endpoint.
#[derive(Clone, Debug)]
pub struct RecordGateway {
    table_url: Url,
    client: reqwest::Client,
}

pub(crate) fn table_url(service_url: &str, table: &str) -> Result<Url, GatewayError> {
    let service_url = service_url.trim();
    if service_url.is_empty() {
        return Err(GatewayError::Config {
            message: "service URL is not set".to_string(),
        });
    }
    let table = table.trim();
    if table.is_empty() || table.contains('/') {
        return Err(GatewayError::Config {
            message: format!("invalid table name '{table}'"),
        });
    }
    let base = Url::parse(service_url).map_err(|e| GatewayError::Config {
        message: format!("invalid service URL '{service_url}': {e}"),
    })?;
    if !matches!(base.scheme(), "http" | "https") {
        return Err(GatewayError::Config {
            message: format!("service URL must be http(s): '{service_url}'"),
        });
    }
    let joined = format!("{}/rest/v1/{}", base.as_str().trim_end_matches('/'), table);
    Url::parse(&joined).map_err(|e| GatewayError::Config {
        message: format!("invalid table URL '{joined}': {e}"),
    })
}

fn auth_headers(anon_key: &str) -> Result<HeaderMap, GatewayError> {
    let anon_key = anon_key.trim();
    if anon_key.is_empty() {
        return Err(GatewayError::Config {
            message: "anon key is not set".to_string(),
        });
    }
    let invalid = |_| GatewayError::Config {
        message: "anon key contains characters not allowed in a header".to_string(),
    };
    let mut headers = HeaderMap::new();
    let mut key = HeaderValue::from_str(anon_key).map_err(invalid)?;
    key.set_sensitive(true);
    headers.insert("apikey", key);
    let mut bearer = HeaderValue::from_str(&format!("Bearer {anon_key}")).map_err(invalid)?;
    bearer.set_sensitive(true);
    headers.insert(AUTHORIZATION, bearer);
    Ok(headers)
}

impl RecordGateway {
    pub fn new(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let table_url = table_url(&config.service_url, &config.table)?;
        let headers = auth_headers(&config.anon_key)?;
        let timeout = Duration::from_secs(config.timeout_seconds.max(1));
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(concat!("schooldir/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Config {
                message: format!("failed to build http client: {e}"),
            })?;
        Ok(Self { table_url, client })
    }

    pub fn table_url(&self) -> &Url {
        &self.table_url
    }

    pub(crate) fn list_url(&self, order: Option<&Order>) -> Url {
        let mut url = self.table_url.clone();
        {
            let mut q = url.query_pairs_mut();
            q.append_pair("select", "*");
            if let Some(order) = order {
                q.append_pair("order", &order.as_param());
            }
        }
        url
    }

    pub(crate) fn row_url(&self, id: &RecordId, select: bool) -> Url {
        let mut url = self.table_url.clone();
        {
            let mut q = url.query_pairs_mut();
            if select {
                q.append_pair("select", "*");
            }
            q.append_pair("id", &format!("eq.{}", id.as_str()));
        }
        url
    }

    async fn send(
        &self,
        op: &'static str,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, GatewayError> {
        let response = request.send().await.map_err(|e| {
            warn!(op, error = %e, "request to data service failed");
            GatewayError::Transport { source: e }
        })?;
        let status = response.status();
        debug!(op, status = status.as_u16(), "data service responded");
        if status.is_success() {
            return Ok(response);
        }
        let raw = response.text().await.unwrap_or_default();
        let body = remote::parse_error_body(&raw);
        let message = remote::remote_message(&body, &raw, status.as_u16());
        warn!(op, status = status.as_u16(), code = ?body.code, %message, "data service rejected request");
        Err(GatewayError::Remote {
            status: status.as_u16(),
            message,
            code: body.code,
            details: body.details,
            hint: body.hint,
        })
    }

    async fn decode_rows(
        op: &'static str,
        response: reqwest::Response,
    ) -> Result<Vec<SchoolRecord>, GatewayError> {
        let raw = response
            .text()
            .await
            .map_err(|e| GatewayError::Transport { source: e })?;
        serde_json::from_str::<Vec<SchoolRecord>>(&raw).map_err(|e| {
            warn!(op, error = %e, "could not decode rows");
            GatewayError::Decode {
                message: format!("{op}: {e}"),
            }
        })
    }

    fn representation(&self, method: Method, url: Url) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .header("Prefer", "return=representation")
    }
}

#[async_trait]
impl RecordStore for RecordGateway {
    async fn list_all(&self, order: Option<Order>) -> Result<Vec<SchoolRecord>, GatewayError> {
        let url = self.list_url(order.as_ref());
        let response = self.send("list_all", self.client.get(url)).await?;
        let rows = Self::decode_rows("list_all", response).await?;
        debug!(rows = rows.len(), "listed records");
        Ok(rows)
    }

    async fn get_by_id(&self, id: &RecordId) -> Result<Option<SchoolRecord>, GatewayError> {
        let url = self.row_url(id, true);
        let response = self.send("get_by_id", self.client.get(url)).await?;
        let rows = Self::decode_rows("get_by_id", response).await?;
        Ok(rows.into_iter().next())
    }

    async fn insert(&self, row: &NewSchool) -> Result<SchoolRecord, GatewayError> {
        let request = self
            .representation(Method::POST, self.table_url.clone())
            .json(&[row]);
        let response = self.send("insert", request).await?;
        let rows = Self::decode_rows("insert", response).await?;
        rows.into_iter().next().ok_or_else(|| GatewayError::Decode {
            message: "insert returned no rows".to_string(),
        })
    }

    async fn update_by_id(
        &self,
        id: &RecordId,
        patch: &SchoolPatch,
    ) -> Result<SchoolRecord, GatewayError> {
        let request = self
            .representation(Method::PATCH, self.row_url(id, false))
            .json(patch);
        let response = self.send("update_by_id", request).await?;
        let rows = Self::decode_rows("update_by_id", response).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| GatewayError::NotFound { id: id.clone() })
    }

    async fn delete_by_id(&self, id: &RecordId) -> Result<(), GatewayError> {
        let request = self
            .client
            .delete(self.row_url(id, false))
            .header("Prefer", "return=minimal");
        self.send("delete_by_id", request).await?;
        Ok(())
    }

    async fn count(&self) -> Result<u64, GatewayError> {
        let request = self
            .client
            .head(self.list_url(None))
            .header("Prefer", "count=exact");
        let response = self.send("count", request).await?;
        let header = response
            .headers()
            .get(CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());
        let total = header.as_deref().and_then(remote::parse_content_range_total);
        match total {
            Some(total) => Ok(total),
            None if response.status() == StatusCode::NO_CONTENT => Ok(0),
            None => Err(GatewayError::Decode {
                message: format!(
                    "count: missing or malformed Content-Range ({})",
                    header.unwrap_or_else(|| "absent".to_string())
                ),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gateway() -> RecordGateway {
        RecordGateway::new(&GatewayConfig::new("https://demo.example.co/", "anon-key")).unwrap()
    }

    #[test]
    fn builds_table_url_under_rest_prefix() {
        let gw = gateway();
        assert_eq!(
            gw.table_url().as_str(),
            "https://demo.example.co/rest/v1/schools"
        );
    }

    #[test]
    fn list_url_orders_newest_first() {
        let gw = gateway();
        assert_eq!(
            gw.list_url(Some(&Order::newest_first())).as_str(),
            "https://demo.example.co/rest/v1/schools?select=*&order=created_at.desc"
        );
        assert_eq!(
            gw.list_url(None).as_str(),
            "https://demo.example.co/rest/v1/schools?select=*"
        );
    }

    #[test]
    fn row_url_filters_on_id() {
        let gw = gateway();
        let id = RecordId::from("7");
        assert_eq!(
            gw.row_url(&id, false).as_str(),
            "https://demo.example.co/rest/v1/schools?id=eq.7"
        );
        assert_eq!(
            gw.row_url(&id, true).as_str(),
            "https://demo.example.co/rest/v1/schools?select=*&id=eq.7"
        );
    }

    #[test]
    fn rejects_missing_configuration() {
        assert!(matches!(
            RecordGateway::new(&GatewayConfig::new("", "key")),
            Err(GatewayError::Config { .. })
        ));
        assert!(matches!(
            RecordGateway::new(&GatewayConfig::new("https://demo.example.co", "  ")),
            Err(GatewayError::Config { .. })
        ));
        assert!(matches!(
            RecordGateway::new(&GatewayConfig::new("ftp://demo.example.co", "key")),
            Err(GatewayError::Config { .. })
        ));
        assert!(matches!(
            RecordGateway::new(&GatewayConfig::new("not a url", "key")),
            Err(GatewayError::Config { .. })
        ));
    }

    #[test]
    fn auth_headers_carry_key_twice() {
        let headers = auth_headers("k3y").unwrap();
        assert_eq!(headers.get("apikey").unwrap(), "k3y");
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer k3y");
        assert!(headers.get("apikey").unwrap().is_sensitive());
    }

    #[test]
    fn remote_error_displays_service_message() {
        let err = GatewayError::remote(403, "permission denied for table schools");
        assert_eq!(err.to_string(), "permission denied for table schools");
    }

    mod over_http {
        use super::*;
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::TcpListener;
        use tokio::task::JoinHandle;

        fn response(status: &str, headers: &[(&str, &str)], body: &str) -> String {
            let mut out = format!("HTTP/1.1 {status}\r\n");
            for (name, value) in headers {
                out.push_str(&format!("{name}: {value}\r\n"));
            }
            out.push_str(&format!(
                "content-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            ));
            out
        }

        /// Answers exactly one request with `reply` and hands back the raw
        /// request text.
        async fn serve_once(reply: String) -> (RecordGateway, JoinHandle<String>) {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            let handle = tokio::spawn(async move {
                let (mut socket, _) = listener.accept().await.unwrap();
                let mut buf = Vec::new();
                let mut chunk = [0u8; 4096];
                loop {
                    let n = socket.read(&mut chunk).await.unwrap();
                    if n == 0 {
                        break;
                    }
                    buf.extend_from_slice(&chunk[..n]);
                    if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                        let head = String::from_utf8_lossy(&buf[..end]).to_lowercase();
                        let len = head
                            .lines()
                            .find_map(|l| l.strip_prefix("content-length:"))
                            .and_then(|v| v.trim().parse::<usize>().ok())
                            .unwrap_or(0);
                        if buf.len() >= end + 4 + len {
                            break;
                        }
                    }
                }
                socket.write_all(reply.as_bytes()).await.unwrap();
                let _ = socket.shutdown().await;
                String::from_utf8_lossy(&buf).to_string()
            });
            let gw = RecordGateway::new(&GatewayConfig::new(format!("http://{addr}"), "anon-key"))
                .unwrap();
            (gw, handle)
        }

        #[tokio::test]
        async fn list_sends_key_and_decodes_loose_rows() {
            let body = r#"[{"id":1,"name":"Lakeside High","city":null,"created_at":"2024-03-01T10:00:00+00:00"}]"#;
            let (gw, server) = serve_once(response(
                "200 OK",
                &[("content-type", "application/json")],
                body,
            ))
            .await;
            let rows = gw.list_all(Some(Order::newest_first())).await.unwrap();
            assert_eq!(rows.len(), 1);
            assert_eq!(rows[0].id.as_str(), "1");
            assert_eq!(rows[0].city, "");

            let request = server.await.unwrap();
            let lower = request.to_lowercase();
            assert!(request.starts_with(
                "GET /rest/v1/schools?select=*&order=created_at.desc HTTP/1.1"
            ));
            assert!(lower.contains("apikey: anon-key"));
            assert!(lower.contains("authorization: bearer anon-key"));
        }

        #[tokio::test]
        async fn conflict_body_becomes_remote_error() {
            let body = r#"{"code":"23505","details":null,"hint":null,"message":"duplicate key value violates unique constraint \"schools_email_id_key\""}"#;
            let (gw, server) = serve_once(response(
                "409 Conflict",
                &[("content-type", "application/json")],
                body,
            ))
            .await;
            let draft = crate::tests::support::valid_draft();
            let err = gw.insert(&draft.to_new_school()).await.unwrap_err();
            match err {
                GatewayError::Remote {
                    status,
                    message,
                    code,
                    ..
                } => {
                    assert_eq!(status, 409);
                    assert_eq!(
                        message,
                        "duplicate key value violates unique constraint \"schools_email_id_key\""
                    );
                    assert_eq!(code.as_deref(), Some("23505"));
                }
                other => panic!("unexpected error {other:?}"),
            }

            let request = server.await.unwrap();
            assert!(request.starts_with("POST /rest/v1/schools HTTP/1.1"));
            assert!(request.to_lowercase().contains("prefer: return=representation"));
            assert!(request.contains(r#"[{"name":"Lakeside High""#));
        }

        #[tokio::test]
        async fn insert_returns_first_row() {
            let body = r#"[{"id":"a1","name":"Lakeside High","image":""}]"#;
            let (gw, _server) = serve_once(response("201 Created", &[], body)).await;
            let draft = crate::tests::support::valid_draft();
            let row = gw.insert(&draft.to_new_school()).await.unwrap();
            assert_eq!(row.id.as_str(), "a1");
            assert_eq!(row.image, None);
        }

        #[tokio::test]
        async fn update_matching_no_rows_is_not_found() {
            let (gw, server) = serve_once(response("200 OK", &[], "[]")).await;
            let draft = crate::tests::support::valid_draft();
            let id = RecordId::from("42");
            let err = gw.update_by_id(&id, &draft.to_patch()).await.unwrap_err();
            assert!(matches!(err, GatewayError::NotFound { id } if id.as_str() == "42"));
            let request = server.await.unwrap();
            assert!(request.starts_with("PATCH /rest/v1/schools?id=eq.42 HTTP/1.1"));
        }

        #[tokio::test]
        async fn garbage_rows_are_a_decode_error() {
            let (gw, _server) = serve_once(response("200 OK", &[], r#"{"not":"rows"}"#)).await;
            let err = gw.list_all(None).await.unwrap_err();
            assert!(matches!(err, GatewayError::Decode { .. }));
        }

        #[tokio::test]
        async fn count_reads_content_range() {
            let reply = "HTTP/1.1 200 OK\r\ncontent-range: */57\r\nconnection: close\r\n\r\n";
            let (gw, server) = serve_once(reply.to_string()).await;
            assert_eq!(gw.count().await.unwrap(), 57);
            let request = server.await.unwrap();
            assert!(request.starts_with("HEAD /rest/v1/schools?select=* HTTP/1.1"));
            assert!(request.to_lowercase().contains("prefer: count=exact"));
        }

        #[tokio::test]
        async fn count_without_range_on_no_content_is_zero() {
            let reply = "HTTP/1.1 204 No Content\r\nconnection: close\r\n\r\n";
            let (gw, _server) = serve_once(reply.to_string()).await;
            assert_eq!(gw.count().await.unwrap(), 0);
        }

        #[tokio::test]
        async fn delete_filters_on_id() {
            let reply = "HTTP/1.1 204 No Content\r\nconnection: close\r\n\r\n";
            let (gw, server) = serve_once(reply.to_string()).await;
            gw.delete_by_id(&RecordId::from("7")).await.unwrap();
            let request = server.await.unwrap();
            assert!(request.starts_with("DELETE /rest/v1/schools?id=eq.7 HTTP/1.1"));
            assert!(request.to_lowercase().contains("prefer: return=minimal"));
        }
    }
}
