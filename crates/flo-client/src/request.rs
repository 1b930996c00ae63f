//! Route definitions and signed request assembly

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::trace;

use crate::config::Credentials;
use crate::error::{FloError, FloResult};
use crate::signer;

pub const HEADER_ACCESS_KEY: &str = "x-api-accessKey";
pub const HEADER_HASH: &str = "x-api-hash";
pub const HEADER_TIMESTAMP: &str = "x-api-timestamp";
pub const HEADER_CONTENT_TYPE: &str = "Content-Type";
pub const HEADER_CONTENT_LENGTH: &str = "Content-Length";

/// Placeholder substituted with a workflow alias
const ALIAS_PLACEHOLDER: &str = ":id";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A statically defined API operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub path_template: &'static str,
    pub method: HttpMethod,
}

/// `GET /account/flos`
pub const LIST_WORKFLOWS: Route = Route {
    path_template: "/account/flos",
    method: HttpMethod::Get,
};

/// `POST /flo/:id/invoke`
pub const INVOKE_WORKFLOW: Route = Route {
    path_template: "/flo/:id/invoke",
    method: HttpMethod::Post,
};

impl Route {
    /// Whether the template carries an alias placeholder
    pub fn needs_alias(&self) -> bool {
        self.path_template
            .split('/')
            .any(|segment| segment == ALIAS_PLACEHOLDER)
    }

    /// Substitutes the alias into the template, percent-encoding it as a path segment
    pub fn resolve_path(&self, alias: Option<&str>) -> FloResult<String> {
        if !self.needs_alias() {
            return Ok(self.path_template.to_string());
        }

        let alias = alias.ok_or_else(|| {
            FloError::InvalidRequest(format!("Route {} requires an alias", self.path_template))
        })?;
        // The URL parser collapses dot segments (encoded or not), so the wire path would differ from the signed one
        if alias == "." || alias == ".." {
            return Err(FloError::InvalidRequest(format!(
                "Alias {:?} cannot be used as a path segment",
                alias
            )));
        }
        let encoded = urlencoding::encode(alias);

        let path = self
            .path_template
            .split('/')
            .map(|segment| if segment == ALIAS_PLACEHOLDER { &*encoded } else { segment })
            .collect::<Vec<_>>()
            .join("/");

        Ok(path)
    }
}

/// A fully authenticated request, built fresh for every call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedRequest {
    pub method: HttpMethod,
    /// Path as sent on the wire, including the query string for GET
    pub path: String,
    pub headers: Vec<(&'static str, String)>,
    pub body: String,
}

impl SignedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

type Clock = Arc<dyn Fn() -> String + Send + Sync>;

/// Builds signed requests from routes, credentials and parameters
#[derive(Clone)]
pub struct RequestBuilder {
    clock: Clock,
}

impl fmt::Debug for RequestBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestBuilder").finish_non_exhaustive()
    }
}

impl Default for RequestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestBuilder {
    pub fn new() -> Self {
        Self {
            clock: Arc::new(signer::timestamp_now),
        }
    }

    /// Uses a custom timestamp source instead of the system clock
    pub fn with_clock<F>(clock: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        Self {
            clock: Arc::new(clock),
        }
    }

    /// Assembles and signs a request.
    ///
    /// Credentials are checked before anything else. For GET routes the
    /// signature covers the path without its query string and an empty body;
    /// for POST routes it covers the exact JSON text that is sent.
    pub fn build(
        &self,
        route: &Route,
        credentials: &Credentials,
        alias: Option<&str>,
        params: Option<&Value>,
    ) -> FloResult<SignedRequest> {
        credentials.ensure_complete()?;

        let path = route.resolve_path(alias)?;
        let timestamp = (self.clock)();

        let (wire_path, body, hash) = match route.method {
            HttpMethod::Get => {
                let hash = signer::sign(
                    &credentials.access_secret,
                    route.method.as_str(),
                    &path,
                    &timestamp,
                    "",
                );
                let query = encode_query(params)?;
                (format!("{}{}", path, query), String::new(), hash)
            }
            HttpMethod::Post => {
                let body = signer::serialize_body(params);
                let hash = signer::sign(
                    &credentials.access_secret,
                    route.method.as_str(),
                    &path,
                    &timestamp,
                    &body,
                );
                (path, body, hash)
            }
        };

        let mut headers = vec![
            (HEADER_CONTENT_TYPE, "application/json".to_string()),
            (HEADER_TIMESTAMP, timestamp),
            (HEADER_HASH, hash),
            (HEADER_ACCESS_KEY, credentials.access_key.clone()),
        ];
        if route.method == HttpMethod::Post {
            headers.push((HEADER_CONTENT_LENGTH, body.len().to_string()));
        }

        trace!(method = %route.method, path = %wire_path, "Built signed request");

        Ok(SignedRequest {
            method: route.method,
            path: wire_path,
            headers,
            body,
        })
    }
}

/// Encodes an object of parameters as `?k=v&k2=v2`; absent or empty params give ""
fn encode_query(params: Option<&Value>) -> FloResult<String> {
    let map = match params {
        None | Some(Value::Null) => return Ok(String::new()),
        Some(Value::Object(map)) => map,
        Some(other) => {
            return Err(FloError::InvalidRequest(format!(
                "Query parameters must be a JSON object, got {}",
                other
            )))
        }
    };

    if map.is_empty() {
        return Ok(String::new());
    }

    let pairs = map
        .iter()
        .map(|(key, value)| {
            let value = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            format!("{}={}", urlencoding::encode(key), urlencoding::encode(&value))
        })
        .collect::<Vec<_>>();

    Ok(format!("?{}", pairs.join("&")))
}
