//! Workflow invocation
//!
//! [`FloClient`] resolves workflow names through the [`AliasCache`], refreshes
//! the cache at most once per call on a miss, and dispatches signed invoke
//! requests through [`FloApi`].

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::cache::{AliasCache, WorkflowDirectory, WorkflowSummary};
use crate::config::{ClientConfig, Credentials};
use crate::error::{FloError, FloResult};
use crate::request::{RequestBuilder, Route, INVOKE_WORKFLOW, LIST_WORKFLOWS};
use crate::transport::{HttpTransport, Transport, TransportResponse};

/// Signs, sends and decodes single API calls
#[derive(Clone)]
pub struct FloApi {
    credentials: Credentials,
    builder: RequestBuilder,
    transport: Arc<dyn Transport>,
}

impl fmt::Debug for FloApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FloApi")
            .field("credentials", &self.credentials)
            .finish_non_exhaustive()
    }
}

impl FloApi {
    pub fn new(credentials: Credentials, transport: Arc<dyn Transport>) -> Self {
        Self {
            credentials,
            builder: RequestBuilder::new(),
            transport,
        }
    }

    /// Replaces the request builder, e.g. to pin the clock
    pub fn with_request_builder(mut self, builder: RequestBuilder) -> Self {
        self.builder = builder;
        self
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Performs one call and returns the decoded JSON body
    pub async fn call(&self, route: &Route, alias: Option<&str>, params: Option<&Value>) -> FloResult<Value> {
        let request = self.builder.build(route, &self.credentials, alias, params)?;
        let response = self.transport.send(&request).await?;
        decode_response(response)
    }
}

#[async_trait]
impl WorkflowDirectory for FloApi {
    #[instrument(skip(self))]
    async fn list_workflows(&self) -> FloResult<Vec<WorkflowSummary>> {
        let body = self.call(&LIST_WORKFLOWS, None, None).await?;
        let workflows: Vec<WorkflowSummary> = serde_json::from_value(body)?;
        debug!(count = workflows.len(), "Listed workflows");
        Ok(workflows)
    }
}

/// Turns a raw response into a JSON value, surfacing any `error` field as a remote failure
fn decode_response(response: TransportResponse) -> FloResult<Value> {
    let parsed = if response.body.trim().is_empty() {
        Ok(Value::Null)
    } else {
        serde_json::from_str::<Value>(&response.body)
    };

    match parsed {
        Ok(value) => {
            if let Some(message) = remote_error(&value) {
                warn!(status = response.status, "Remote error: {}", message);
                return Err(FloError::Remote(message));
            }
            if !response.is_success() {
                return Err(status_error(&response));
            }
            Ok(value)
        }
        Err(_) if !response.is_success() => Err(status_error(&response)),
        Err(e) => Err(FloError::InvalidResponse(e)),
    }
}

fn remote_error(value: &Value) -> Option<String> {
    match value.get("error")? {
        Value::Null => None,
        Value::String(message) => Some(message.clone()),
        other => Some(other.to_string()),
    }
}

fn status_error(response: &TransportResponse) -> FloError {
    FloError::Transport(format!("HTTP {}: {}", response.status, response.body))
}

/// Client for listing and invoking flo workflows
#[derive(Clone)]
pub struct FloClient {
    api: FloApi,
    cache: Arc<AliasCache>,
}

impl fmt::Debug for FloClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FloClient")
            .field("api", &self.api)
            .field("cache", &self.cache)
            .finish()
    }
}

impl FloClient {
    /// Creates a client that talks HTTP to the configured endpoint
    pub fn new(config: ClientConfig) -> FloResult<Self> {
        let transport = HttpTransport::new(config.endpoint, config.timeout_secs)?;
        Ok(Self::with_transport(config.credentials, Arc::new(transport)))
    }

    /// Creates a client from environment configuration
    pub fn from_env() -> FloResult<Self> {
        Self::new(ClientConfig::load()?)
    }

    /// Creates a client over any transport
    pub fn with_transport(credentials: Credentials, transport: Arc<dyn Transport>) -> Self {
        Self {
            api: FloApi::new(credentials, transport),
            cache: Arc::new(AliasCache::new()),
        }
    }

    /// Replaces the request builder, e.g. to pin the clock
    pub fn with_request_builder(mut self, builder: RequestBuilder) -> Self {
        self.api = self.api.with_request_builder(builder);
        self
    }

    pub fn cache(&self) -> &AliasCache {
        &self.cache
    }

    /// Cached alias for a name (or a known alias), without any network call
    pub fn alias_for(&self, name: &str) -> Option<String> {
        self.cache.lookup(name)
    }

    /// Lists workflow names, refreshing first when forced or when never populated
    #[instrument(skip(self))]
    pub async fn list_workflows(&self, force_refresh: bool) -> FloResult<Vec<String>> {
        if force_refresh || !self.cache.has() {
            return self.refresh_aliases().await;
        }
        Ok(self.cache.names())
    }

    /// Full listing from a fresh list call; also replaces the cache
    pub async fn workflows(&self) -> FloResult<Vec<WorkflowSummary>> {
        let workflows = self.api.list_workflows().await?;
        self.cache.replace(&workflows);
        Ok(workflows)
    }

    /// Unconditionally reloads the alias cache
    pub async fn refresh_aliases(&self) -> FloResult<Vec<String>> {
        self.cache.refresh(&self.api).await
    }

    /// Invokes a workflow by name or alias, refreshing the cache once on a miss
    pub async fn invoke<P>(&self, name: &str, payload: &P) -> FloResult<Value>
    where
        P: Serialize + ?Sized,
    {
        self.invoke_with(name, payload, false).await
    }

    /// Invokes with `name` as the alias when the cache does not know it; never refreshes
    pub async fn force_invoke<P>(&self, name: &str, payload: &P) -> FloResult<Value>
    where
        P: Serialize + ?Sized,
    {
        self.invoke_with(name, payload, true).await
    }

    #[instrument(skip(self, payload), fields(workflow = %name))]
    pub async fn invoke_with<P>(&self, name: &str, payload: &P, force: bool) -> FloResult<Value>
    where
        P: Serialize + ?Sized,
    {
        self.api.credentials().ensure_complete()?;

        let payload = serde_json::to_value(payload)
            .map_err(|e| FloError::InvalidRequest(format!("Payload is not serializable: {}", e)))?;

        let alias = self.resolve(name, force).await?;
        self.dispatch(&alias, &payload).await
    }

    async fn resolve(&self, name: &str, force: bool) -> FloResult<String> {
        if let Some(alias) = self.cache.lookup(name) {
            return Ok(alias);
        }

        if force {
            debug!("Using {} verbatim as alias", name);
            return Ok(name.to_string());
        }

        debug!("Cache miss for {}, refreshing aliases", name);
        self.refresh_aliases().await?;

        self.cache
            .lookup(name)
            .ok_or_else(|| FloError::WorkflowNotFound(name.to_string()))
    }

    async fn dispatch(&self, alias: &str, payload: &Value) -> FloResult<Value> {
        debug!(alias, "Invoking workflow");
        self.api.call(&INVOKE_WORKFLOW, Some(alias), Some(payload)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{HttpMethod, SignedRequest, HEADER_HASH, HEADER_TIMESTAMP};
    use crate::signer;
    use crate::transport::MockTransport;
    use mockall::Sequence;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const TS: &str = "2024-05-01T12:00:00.000Z";

    fn is_list(request: &SignedRequest) -> bool {
        request.method == HttpMethod::Get && request.path == "/account/flos"
    }

    fn client_with(transport: MockTransport) -> FloClient {
        FloClient::with_transport(Credentials::new("k", "s"), Arc::new(transport))
            .with_request_builder(RequestBuilder::with_clock(|| TS.to_string()))
    }

    fn expect_list(transport: &mut MockTransport, times: usize, body: &'static str) {
        transport
            .expect_send()
            .withf(|request| is_list(request))
            .times(times)
            .returning(move |_| Ok(TransportResponse::new(200, body)));
    }

    #[tokio::test]
    async fn test_invoke_resolves_alias_after_refresh() {
        let mut transport = MockTransport::new();
        let mut seq = Sequence::new();

        transport
            .expect_send()
            .withf(|request| is_list(request))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(TransportResponse::new(200, r#"[{"name":"billing","alias":"az1"}]"#)));

        transport
            .expect_send()
            .withf(|request| {
                let expected = signer::sign("s", "post", "/flo/az1/invoke", TS, r#"{"amt":5}"#);
                request.method == HttpMethod::Post
                    && request.path == "/flo/az1/invoke"
                    && request.body == r#"{"amt":5}"#
                    && request.header(HEADER_TIMESTAMP) == Some(TS)
                    && request.header(HEADER_HASH) == Some(expected.as_str())
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(TransportResponse::new(200, r#"{"result":"ok"}"#)));

        let client = client_with(transport);
        let result = client.invoke("billing", &json!({"amt": 5})).await.unwrap();

        assert_eq!(result, json!({"result": "ok"}));
        assert_eq!(client.alias_for("billing"), Some("az1".to_string()));
    }

    #[tokio::test]
    async fn test_cache_hit_skips_refresh() {
        let mut transport = MockTransport::new();
        expect_list(&mut transport, 1, r#"[{"name":"billing","alias":"az1"}]"#);
        transport
            .expect_send()
            .withf(|request| request.path == "/flo/az1/invoke")
            .times(2)
            .returning(|_| Ok(TransportResponse::new(200, "{}")));

        let client = client_with(transport);
        client.invoke("billing", &json!({})).await.unwrap();
        client.invoke("billing", &json!({})).await.unwrap();
    }

    #[tokio::test]
    async fn test_invoke_by_alias_after_refresh() {
        let mut transport = MockTransport::new();
        expect_list(&mut transport, 1, r#"[{"name":"billing","alias":"az1"}]"#);
        transport
            .expect_send()
            .withf(|request| request.path == "/flo/az1/invoke")
            .times(1)
            .returning(|_| Ok(TransportResponse::new(200, "{}")));

        let client = client_with(transport);
        client.list_workflows(false).await.unwrap();
        client.invoke("az1", &json!({})).await.unwrap();
    }

    #[tokio::test]
    async fn test_unknown_workflow_refreshes_exactly_once() {
        let mut transport = MockTransport::new();
        expect_list(&mut transport, 1, "[]");

        let client = client_with(transport);
        let err = client.invoke("missing", &json!({})).await.unwrap_err();

        assert!(matches!(err, FloError::WorkflowNotFound(ref name) if name == "missing"));
    }

    #[tokio::test]
    async fn test_each_miss_gets_its_own_single_refresh() {
        let mut transport = MockTransport::new();
        expect_list(&mut transport, 2, r#"[{"name":"billing","alias":"az1"}]"#);

        let client = client_with(transport);
        assert!(matches!(
            client.invoke("missing", &json!({})).await,
            Err(FloError::WorkflowNotFound(_))
        ));
        assert!(matches!(
            client.invoke("missing", &json!({})).await,
            Err(FloError::WorkflowNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_refresh_failure_aborts_invoke() {
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .withf(|request| is_list(request))
            .times(1)
            .returning(|_| Err(FloError::Transport("connection reset".to_string())));

        let client = client_with(transport);
        let err = client.invoke("billing", &json!({})).await.unwrap_err();

        assert!(matches!(err, FloError::Transport(_)));
        assert!(!client.cache().has());
    }

    #[tokio::test]
    async fn test_force_invoke_uses_name_verbatim() {
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .withf(|request| request.method == HttpMethod::Post && request.path == "/flo/raw-alias/invoke")
            .times(1)
            .returning(|_| Ok(TransportResponse::new(200, r#"{"done":true}"#)));

        let client = client_with(transport);
        let result = client.force_invoke("raw-alias", &json!({"x": 1})).await.unwrap();

        assert_eq!(result, json!({"done": true}));
        assert!(!client.cache().has());
    }

    #[tokio::test]
    async fn test_force_invoke_prefers_cached_alias() {
        let mut transport = MockTransport::new();
        expect_list(&mut transport, 1, r#"[{"name":"billing","alias":"az1"}]"#);
        transport
            .expect_send()
            .withf(|request| request.path == "/flo/az1/invoke")
            .times(1)
            .returning(|_| Ok(TransportResponse::new(200, "{}")));

        let client = client_with(transport);
        client.list_workflows(false).await.unwrap();
        client.force_invoke("billing", &json!({})).await.unwrap();
    }

    #[tokio::test]
    async fn test_remote_error_field_fails_invoke() {
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .times(1)
            .returning(|_| Ok(TransportResponse::new(200, r#"{"error":"quota exceeded"}"#)));

        let client = client_with(transport);
        let err = client.force_invoke("az1", &json!({})).await.unwrap_err();

        assert!(matches!(err, FloError::Remote(ref message) if message == "quota exceeded"));
    }

    #[tokio::test]
    async fn test_missing_credentials_never_touch_transport() {
        let mut transport = MockTransport::new();
        transport.expect_send().times(0);

        let client = FloClient::with_transport(Credentials::new("k", ""), Arc::new(transport));

        assert!(matches!(
            client.invoke("billing", &json!({})).await,
            Err(FloError::MissingCredentials)
        ));
        assert!(matches!(
            client.force_invoke("az1", &json!({})).await,
            Err(FloError::MissingCredentials)
        ));
        assert!(matches!(
            client.list_workflows(true).await,
            Err(FloError::MissingCredentials)
        ));
    }

    #[tokio::test]
    async fn test_list_workflows_uses_cache_unless_forced() {
        let mut transport = MockTransport::new();
        expect_list(
            &mut transport,
            2,
            r#"[{"name":"shipping","alias":"bx2"},{"name":"billing","alias":"az1"}]"#,
        );

        let client = client_with(transport);
        let first = client.list_workflows(false).await.unwrap();
        let cached = client.list_workflows(false).await.unwrap();
        let forced = client.list_workflows(true).await.unwrap();

        assert_eq!(first, vec!["billing".to_string(), "shipping".to_string()]);
        assert_eq!(cached, first);
        assert_eq!(forced, first);
    }

    #[tokio::test]
    async fn test_workflows_returns_full_listing() {
        let mut transport = MockTransport::new();
        expect_list(
            &mut transport,
            1,
            r#"[{"name":"billing","alias":"az1","description":"monthly"}]"#,
        );

        let client = client_with(transport);
        let workflows = client.workflows().await.unwrap();

        assert_eq!(workflows.len(), 1);
        assert_eq!(workflows[0].extra.get("description"), Some(&json!("monthly")));
        assert_eq!(client.alias_for("billing"), Some("az1".to_string()));
    }

    #[test]
    fn test_decode_response() {
        assert_eq!(decode_response(TransportResponse::new(200, r#"{"a":1}"#)).unwrap(), json!({"a": 1}));
        assert_eq!(decode_response(TransportResponse::new(204, "")).unwrap(), Value::Null);
        assert_eq!(
            decode_response(TransportResponse::new(200, r#"{"error":null,"a":1}"#)).unwrap(),
            json!({"error": null, "a": 1})
        );

        assert!(matches!(
            decode_response(TransportResponse::new(200, "not json")),
            Err(FloError::InvalidResponse(_))
        ));
        assert!(matches!(
            decode_response(TransportResponse::new(502, "Bad Gateway")),
            Err(FloError::Transport(ref message)) if message.contains("502")
        ));
        assert!(matches!(
            decode_response(TransportResponse::new(401, r#"{"error":{"code":"bad_hash"}}"#)),
            Err(FloError::Remote(ref message)) if message.contains("bad_hash")
        ));
    }

    #[test]
    fn test_falsy_error_field_still_fails() {
        assert!(matches!(
            decode_response(TransportResponse::new(200, r#"{"error":false}"#)),
            Err(FloError::Remote(ref message)) if message == "false"
        ));
        assert!(matches!(
            decode_response(TransportResponse::new(200, r#"{"error":""}"#)),
            Err(FloError::Remote(ref message)) if message.is_empty()
        ));
    }
}
