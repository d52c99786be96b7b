//! Authenticated REST handle passed to scripts.
//!
//! HTTP goes through the [`Transport`] trait. The default implementation,
//! [`UreqTransport`], is synchronous and uses `ureq`.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use url::Url;

use crate::errors::RequestError;

/// HTTP methods a script may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl FromStr for Method {
    type Err = RequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "PATCH" => Ok(Self::Patch),
            "DELETE" => Ok(Self::Delete),
            _ => Err(RequestError::Method(s.to_string())),
        }
    }
}

/// A fully-built request handed to a [`Transport`].
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

/// Raw response returned by a [`Transport`].
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

/// Sends HTTP requests on behalf of a [`Connection`].
///
/// Implementations must return non-2xx responses as `Ok`; status handling
/// is the connection's job.
pub trait Transport: Send + Sync {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, RequestError>;
}

/// Blocking transport backed by a `ureq` agent.
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    #[must_use]
    pub fn new() -> Self {
        let config = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build();
        Self {
            agent: config.into(),
        }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

fn with_headers<B>(
    builder: ureq::RequestBuilder<B>,
    headers: &[(String, String)],
) -> ureq::RequestBuilder<B> {
    headers
        .iter()
        .fold(builder, |b, (name, value)| b.header(name.as_str(), value.as_str()))
}

impl Transport for UreqTransport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, RequestError> {
        let url = request.url.as_str();
        let headers = request.headers.as_slice();
        let result = match request.method {
            Method::Get => with_headers(self.agent.get(url), headers).call(),
            Method::Delete => with_headers(self.agent.delete(url), headers).call(),
            Method::Post | Method::Put | Method::Patch => {
                let builder = match request.method {
                    Method::Post => self.agent.post(url),
                    Method::Put => self.agent.put(url),
                    _ => self.agent.patch(url),
                };
                let builder = with_headers(builder, headers);
                match &request.body {
                    Some(body) => builder.send_json(body),
                    None => builder.send_empty(),
                }
            }
        };

        let mut response = result.map_err(|e| RequestError::Transport(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| RequestError::Transport(e.to_string()))?;
        Ok(HttpResponse { status, body })
    }
}

/// Error entry in a Salesforce REST error response.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiError {
    message: String,
    #[serde(default)]
    error_code: Option<String>,
}

/// Live, authenticated handle to one org.
#[derive(Clone)]
pub struct Connection {
    username: String,
    org_id: String,
    instance_url: Url,
    access_token: String,
    api_version: String,
    transport: Arc<dyn Transport>,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("username", &self.username)
            .field("org_id", &self.org_id)
            .field("instance_url", &self.instance_url.as_str())
            .field("api_version", &self.api_version)
            .finish_non_exhaustive()
    }
}

impl Connection {
    pub fn new(
        username: impl Into<String>,
        org_id: impl Into<String>,
        instance_url: Url,
        access_token: impl Into<String>,
        api_version: impl Into<String>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            username: username.into(),
            org_id: org_id.into(),
            instance_url,
            access_token: access_token.into(),
            api_version: api_version.into(),
            transport,
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn org_id(&self) -> &str {
        &self.org_id
    }

    pub fn instance_url(&self) -> &str {
        self.instance_url.as_str().trim_end_matches('/')
    }

    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    /// Base path of the versioned REST API, e.g. `/services/data/v62.0`.
    #[must_use]
    pub fn data_path(&self) -> String {
        format!("/services/data/v{}", self.api_version)
    }

    /// Build an absolute URL for `path`.
    ///
    /// Full URLs pass through, `/services/...` paths are rooted at the
    /// instance, and anything else is taken relative to [`data_path`](Self::data_path).
    pub fn url_for(&self, path: &str) -> Result<Url, RequestError> {
        if path.starts_with("http://") || path.starts_with("https://") {
            return Ok(Url::parse(path)?);
        }
        if path.starts_with("/services/") {
            return Ok(self.instance_url.join(path)?);
        }
        let relative = path.trim_start_matches('/');
        Ok(self
            .instance_url
            .join(&format!("{}/{relative}", self.data_path()))?)
    }

    /// Send a request and decode the JSON response.
    ///
    /// An empty response body (e.g. `204 No Content`) yields `Value::Null`.
    pub fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, RequestError> {
        let url = self.url_for(path)?;
        self.send(method, url, body)
    }

    fn send(&self, method: Method, url: Url, body: Option<Value>) -> Result<Value, RequestError> {
        let mut headers = vec![
            (
                "Authorization".to_string(),
                format!("Bearer {}", self.access_token),
            ),
            ("Accept".to_string(), "application/json".to_string()),
        ];
        if body.is_some() {
            headers.push(("Content-Type".to_string(), "application/json".to_string()));
        }
        let request = HttpRequest {
            method,
            url: url.to_string(),
            headers,
            body,
        };
        tracing::debug!(method = ?request.method, url = %request.url, "sending request");

        let response = self.transport.send(&request)?;
        tracing::debug!(status = response.status, "received response");

        if !(200..300).contains(&response.status) {
            return Err(RequestError::Status {
                status: response.status,
                message: describe_error(&response.body),
            });
        }
        if response.body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&response.body).map_err(|e| RequestError::Decode(e.to_string()))
    }

    /// Run a SOQL query and return the first page of results.
    pub fn query(&self, soql: &str) -> Result<Value, RequestError> {
        let mut url = self.url_for("query")?;
        url.query_pairs_mut().append_pair("q", soql);
        self.send(Method::Get, url, None)
    }

    /// Run a SOQL query, following `nextRecordsUrl` until every page is read.
    /// Returns the concatenated `records` array.
    pub fn query_all(&self, soql: &str) -> Result<Value, RequestError> {
        let mut page = self.query(soql)?;
        let mut records = Vec::new();
        loop {
            if let Some(Value::Array(batch)) = page.get_mut("records").map(Value::take) {
                records.extend(batch);
            }
            let done = page.get("done").and_then(Value::as_bool).unwrap_or(true);
            let next = page
                .get("nextRecordsUrl")
                .and_then(Value::as_str)
                .map(str::to_string);
            match next {
                Some(next) if !done => page = self.request(Method::Get, &next, None)?,
                _ => break,
            }
        }
        Ok(Value::Array(records))
    }
}

/// Render a REST error body as `CODE: message` entries joined by `; `.
fn describe_error(body: &str) -> String {
    if let Ok(errors) = serde_json::from_str::<Vec<ApiError>>(body) {
        if !errors.is_empty() {
            return errors
                .iter()
                .map(|e| match &e.error_code {
                    Some(code) => format!("{code}: {}", e.message),
                    None => e.message.clone(),
                })
                .collect::<Vec<_>>()
                .join("; ");
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        "empty response".to_string()
    } else {
        trimmed.to_string()
    }
}
