//! HTTP ingest module.
//!
//! An axum server that accepts any method on any path, captures the request
//! as an [`HttpMessage`] and enqueues its JSON line for the ingest bridge.
//!
//! # Responses
//!
//! - `200 {"code":0,"message":"forwarded","data":null}` once enqueued
//! - `500 {"code":-1,"message":"forward failed","data":{"error":..}}` otherwise

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{ConnectInfo, DefaultBodyLimit, State};
use axum::http::{header, HeaderMap, Method, StatusCode, Uri, Version};
use axum::{Json, Router};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::config::HttpServerConfig;
use super::metrics::HttpIngestMetrics;
use crate::adapter::{IngestModule, Payload};
use crate::config::{ConnectorConfig, ConnectorInfo};
use crate::error::ConnectorError;
use crate::message::{HttpMessage, HOST_PLACEHOLDER};
use crate::metrics::ConnectorMetrics;
use crate::shutdown::{self, ShutdownSignal};

/// Largest request body the server accepts.
pub const MAX_BODY_BYTES: usize = 200 * 1024 * 1024;

/// Body of every response the ingest server sends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    /// 0 on success, -1 on failure.
    pub code: i32,
    /// Human-readable outcome.
    pub message: String,
    /// Error details on failure.
    pub data: Option<serde_json::Value>,
}

impl Reply {
    fn forwarded() -> (StatusCode, Json<Self>) {
        (
            StatusCode::OK,
            Json(Self {
                code: 0,
                message: "forwarded".into(),
                data: None,
            }),
        )
    }

    fn failed(error: impl std::fmt::Display) -> (StatusCode, Json<Self>) {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(Self {
                code: -1,
                message: "forward failed".into(),
                data: Some(serde_json::json!({ "error": error.to_string() })),
            }),
        )
    }
}

#[derive(Clone)]
struct IngestState {
    queue: mpsc::Sender<Payload>,
    metrics: Arc<HttpIngestMetrics>,
}

fn parse_form(raw: &[u8], into: &mut HashMap<String, Vec<String>>) {
    match serde_urlencoded::from_bytes::<Vec<(String, String)>>(raw) {
        Ok(pairs) => {
            for (k, v) in pairs {
                into.entry(k).or_default().push(v);
            }
        }
        Err(e) => warn!(error = %e, "ignoring malformed form data"),
    }
}

/// Captures one request as an [`HttpMessage`].
///
/// The URL keeps path and query with the host replaced by `%s`. The `Host`
/// header is dropped. `form` holds query and urlencoded body parameters,
/// `post_form` only the body ones.
#[must_use]
pub fn capture(
    peer: SocketAddr,
    method: &Method,
    uri: &Uri,
    version: Version,
    headers: &HeaderMap,
    body: &[u8],
) -> HttpMessage {
    let mut fields: HashMap<String, Vec<String>> = HashMap::new();
    for (name, value) in headers {
        if name == header::HOST {
            continue;
        }
        fields
            .entry(name.as_str().to_string())
            .or_default()
            .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
    }

    let transfer_encoding: Vec<String> = fields
        .get(header::TRANSFER_ENCODING.as_str())
        .into_iter()
        .flatten()
        .flat_map(|v| v.split(','))
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect();

    let content_length = match headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<i64>().ok())
    {
        Some(len) => len,
        None if transfer_encoding.is_empty() => 0,
        None => -1,
    };

    let mut form = HashMap::new();
    if let Some(query) = uri.query() {
        parse_form(query.as_bytes(), &mut form);
    }
    let mut post_form = HashMap::new();
    let urlencoded = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/x-www-form-urlencoded"));
    if urlencoded {
        parse_form(body, &mut post_form);
        for (k, values) in &post_form {
            form.entry(k.clone())
                .or_insert_with(Vec::new)
                .extend(values.iter().cloned());
        }
    }

    let path = uri.path_and_query().map_or("/", |pq| pq.as_str());
    HttpMessage {
        method: method.as_str().to_string(),
        url: format!("{HOST_PLACEHOLDER}{path}"),
        header: fields,
        body: String::from_utf8_lossy(body).into_owned(),
        remote_addr: peer.to_string(),
        proto: format!("{version:?}"),
        content_length,
        transfer_encoding,
        form,
        post_form,
        trailer: HashMap::new(),
    }
}

async fn forward(
    State(state): State<IngestState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    method: Method,
    uri: Uri,
    version: Version,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<Reply>) {
    let message = capture(peer, &method, &uri, version, &headers, &body);
    let line = match message.encode() {
        Ok(line) => line,
        Err(e) => {
            state.metrics.record_rejected();
            warn!(method = %method, url = %uri, error = %e, "failed to encode request");
            return Reply::failed(e);
        }
    };
    if state.queue.send(Bytes::from(line)).await.is_err() {
        state.metrics.record_rejected();
        warn!(method = %method, url = %uri, "ingest queue closed");
        return Reply::failed(ConnectorError::Closed);
    }
    state.metrics.record_forwarded(body.len() as u64);
    info!(
        method = %message.method,
        remote = %message.remote_addr,
        url = %message.url,
        content_length = message.content_length,
        "request received"
    );
    Reply::forwarded()
}

/// Builds the catch-all router feeding `queue`.
pub fn router(queue: mpsc::Sender<Payload>, metrics: Arc<HttpIngestMetrics>) -> Router {
    Router::new()
        .fallback(forward)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(IngestState { queue, metrics })
}

/// The `http` ingest module.
pub struct HttpIngest {
    config: Option<HttpServerConfig>,
    listener: Option<TcpListener>,
    queue: Option<mpsc::Sender<Payload>>,
    metrics: Arc<HttpIngestMetrics>,
}

impl std::fmt::Debug for HttpIngest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpIngest")
            .field("config", &self.config)
            .field("local_addr", &self.local_addr())
            .finish_non_exhaustive()
    }
}

impl Default for HttpIngest {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpIngest {
    /// Creates an unconfigured module.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: None,
            listener: None,
            queue: None,
            metrics: Arc::new(HttpIngestMetrics::new()),
        }
    }

    /// Address the server is bound to, once set up.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.as_ref().and_then(|l| l.local_addr().ok())
    }
}

#[async_trait]
impl IngestModule for HttpIngest {
    fn name(&self) -> &str {
        "http"
    }

    async fn setup(
        &mut self,
        config: &ConnectorConfig,
        queue: mpsc::Sender<Payload>,
    ) -> Result<(), ConnectorError> {
        let cfg = HttpServerConfig::from_config(config)?;
        let listener = TcpListener::bind(&cfg.listen).await.map_err(|e| {
            ConnectorError::ConnectionFailed(format!("cannot listen on {}: {e}", cfg.listen))
        })?;
        self.listener = Some(listener);
        self.config = Some(cfg);
        self.queue = Some(queue);
        Ok(())
    }

    async fn run(&mut self, mut shutdown: ShutdownSignal) -> Result<(), ConnectorError> {
        let (Some(listener), Some(queue)) = (self.listener.take(), self.queue.take()) else {
            return Err(ConnectorError::InvalidState {
                expected: "Initialized".into(),
                actual: "Created".into(),
            });
        };
        let addr = listener.local_addr()?;
        info!(listen = %addr, "http ingest listening");

        let app = router(queue, Arc::clone(&self.metrics));
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move { shutdown::requested(&mut shutdown).await })
        .await?;
        info!(listen = %addr, "http ingest stopped");
        Ok(())
    }

    fn info(&self) -> ConnectorInfo {
        ConnectorInfo::new(
            "http",
            "Captures HTTP requests and forwards them as JSON lines",
            HttpServerConfig::config_keys(),
        )
    }

    fn metrics(&self) -> ConnectorMetrics {
        self.metrics.to_connector_metrics()
    }
}
