//! HTTP delivery module.
//!
//! Replays every [`HttpMessage`] envelope against the configured host with
//! a shared reqwest client. Each request runs on its own task; failures are
//! logged and counted, never retried.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, Method};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use super::config::HttpClientConfig;
use super::metrics::HttpDeliveryMetrics;
use crate::adapter::DeliveryModule;
use crate::config::{ConnectorConfig, ConnectorInfo};
use crate::error::ConnectorError;
use crate::message::{http_transform, Envelope, HttpMessage, Transform};
use crate::metrics::ConnectorMetrics;
use crate::shutdown::{self, ShutdownSignal};

/// Headers the client sets itself.
const SKIPPED_HEADERS: [&str; 4] = ["host", "content-length", "transfer-encoding", "connection"];

/// Sends one captured request to `bind`.
async fn replay(client: Client, bind: Arc<str>, message: HttpMessage, metrics: Arc<HttpDeliveryMetrics>) {
    let url = message.target_url(&bind);
    let method = match Method::from_bytes(message.method.as_bytes()) {
        Ok(method) => method,
        Err(e) => {
            metrics.record_failed();
            error!(method = %message.method, url = %url, error = %e, "invalid request method");
            return;
        }
    };

    let mut request = client.request(method, &url).body(message.body);
    for (name, values) in &message.header {
        if SKIPPED_HEADERS.contains(&name.to_ascii_lowercase().as_str()) {
            continue;
        }
        for value in values {
            request = request.header(name.as_str(), value.as_str());
        }
    }

    match request.send().await {
        Ok(response) => {
            let status = response.status();
            if status.as_u16() >= 400 {
                metrics.record_rejected();
                error!(method = %message.method, url = %url, status = %status, "request rejected by target");
            } else {
                metrics.record_sent();
                info!(method = %message.method, url = %url, status = %status, "request forwarded");
            }
            if tracing::enabled!(tracing::Level::DEBUG) {
                match response.text().await {
                    Ok(body) => debug!(url = %url, body = %body, "response body"),
                    Err(e) => debug!(url = %url, error = %e, "unreadable response body"),
                }
            }
        }
        Err(e) => {
            metrics.record_failed();
            error!(method = %message.method, url = %url, error = %e, "request failed");
        }
    }
}

/// The `http` delivery module.
#[derive(Debug)]
pub struct HttpDelivery {
    config: Option<HttpClientConfig>,
    client: Option<Client>,
    queue: Option<mpsc::Receiver<Envelope>>,
    metrics: Arc<HttpDeliveryMetrics>,
}

impl Default for HttpDelivery {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpDelivery {
    /// Creates an unconfigured module.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: None,
            client: None,
            queue: None,
            metrics: Arc::new(HttpDeliveryMetrics::new()),
        }
    }
}

impl HttpDelivery {
    fn dispatch(
        &self,
        envelope: Envelope,
        client: &Client,
        bind: &Arc<str>,
        in_flight: &mut JoinSet<()>,
    ) {
        match envelope {
            Envelope::Http(message) => {
                self.metrics.record_started();
                in_flight.spawn(replay(
                    client.clone(),
                    Arc::clone(bind),
                    message,
                    Arc::clone(&self.metrics),
                ));
            }
            other => {
                self.metrics.record_skipped();
                warn!(kind = other.kind(), "http delivery ignores non-http envelope");
            }
        }
    }
}

#[async_trait]
impl DeliveryModule for HttpDelivery {
    fn name(&self) -> &str {
        "http"
    }

    async fn setup(
        &mut self,
        config: &ConnectorConfig,
        queue: mpsc::Receiver<Envelope>,
    ) -> Result<(), ConnectorError> {
        let cfg = HttpClientConfig::from_config(config)?;
        let client = Client::builder()
            .timeout(cfg.timeout)
            .build()
            .map_err(|e| ConnectorError::ConfigurationError(format!("http client: {e}")))?;
        self.client = Some(client);
        self.config = Some(cfg);
        self.queue = Some(queue);
        Ok(())
    }

    async fn run(&mut self, mut shutdown: ShutdownSignal) -> Result<(), ConnectorError> {
        let (Some(config), Some(client), Some(mut queue)) =
            (self.config.as_ref(), self.client.clone(), self.queue.take())
        else {
            return Err(ConnectorError::InvalidState {
                expected: "Initialized".into(),
                actual: "Created".into(),
            });
        };
        let bind: Arc<str> = Arc::from(config.bind.as_str());
        info!(bind = %bind, "http delivery started");

        let mut in_flight = JoinSet::new();
        loop {
            tokio::select! {
                biased;
                () = shutdown::requested(&mut shutdown) => break,
                Some(done) = in_flight.join_next(), if !in_flight.is_empty() => {
                    if let Err(e) = done {
                        error!(error = %e, "request task panicked");
                    }
                }
                next = queue.recv() => match next {
                    Some(envelope) => self.dispatch(envelope, &client, &bind, &mut in_flight),
                    None => break,
                },
            }
        }

        // Queued envelopes were already removed from the spool.
        queue.close();
        while let Some(envelope) = queue.recv().await {
            self.dispatch(envelope, &client, &bind, &mut in_flight);
        }

        // Requests already sent finish within the client timeout.
        while let Some(done) = in_flight.join_next().await {
            if let Err(e) = done {
                error!(error = %e, "request task panicked");
            }
        }
        info!(bind = %bind, "http delivery stopped");
        Ok(())
    }

    fn transform(&self) -> Transform {
        http_transform()
    }

    fn info(&self) -> ConnectorInfo {
        ConnectorInfo::new(
            "http",
            "Replays relayed HTTP requests against a target host",
            HttpClientConfig::config_keys(),
        )
    }

    fn metrics(&self) -> ConnectorMetrics {
        self.metrics.to_connector_metrics()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::KafkaMessage;
    use crate::testing::wait_until;
    use axum::http::{HeaderMap, StatusCode};
    use axum::Router;
    use std::collections::HashMap;
    use std::time::Duration;

    type Seen = Arc<parking_lot::Mutex<Vec<(String, String, Option<String>)>>>;

    /// Starts a target that records every request and answers 404 on `/missing`.
    async fn target() -> (std::net::SocketAddr, Seen) {
        let seen: Seen = Arc::default();
        let recorded = Arc::clone(&seen);
        let app = Router::new().fallback(
            move |method: axum::http::Method, uri: axum::http::Uri, headers: HeaderMap, body: String| {
                let recorded = Arc::clone(&recorded);
                async move {
                    let trace = headers
                        .get("x-trace")
                        .and_then(|v| v.to_str().ok())
                        .map(String::from);
                    recorded
                        .lock()
                        .push((method.to_string(), format!("{uri} {body}"), trace));
                    if uri.path() == "/missing" {
                        StatusCode::NOT_FOUND
                    } else {
                        StatusCode::OK
                    }
                }
            },
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await });
        (addr, seen)
    }

    fn request(method: &str, url: &str, body: &str) -> Envelope {
        Envelope::Http(HttpMessage {
            method: method.into(),
            url: url.into(),
            header: HashMap::from([
                ("x-trace".to_string(), vec!["t-9".to_string()]),
                ("host".to_string(), vec!["ingest.example".to_string()]),
            ]),
            body: body.into(),
            ..HttpMessage::default()
        })
    }

    #[tokio::test]
    async fn test_replays_requests() {
        let (addr, seen) = target().await;
        let mut config = ConnectorConfig::new("dimension");
        config.set("http.bind", addr.to_string());

        let (tx, rx) = mpsc::channel(8);
        let mut module = HttpDelivery::new();
        module.setup(&config, rx).await.unwrap();
        let metrics = Arc::clone(&module.metrics);

        let (stop, signal) = shutdown::channel();
        let task = tokio::spawn(async move { module.run(signal).await });

        tx.send(request("POST", "%s/orders?id=1", "hello")).await.unwrap();
        tx.send(request("GET", "%s/missing", "")).await.unwrap();
        tx.send(Envelope::Kafka(KafkaMessage::new("t", "k", b"v".to_vec(), 0)))
            .await
            .unwrap();

        let done = Arc::clone(&metrics);
        wait_until(Duration::from_secs(5), move || {
            let m = done.to_connector_metrics();
            m.records_total == 1 && m.errors_total == 1
        })
        .await;

        let m = metrics.to_connector_metrics();
        assert_eq!(m.custom_value("http.rejected"), Some(1.0));
        assert_eq!(m.custom_value("http.skipped"), Some(1.0));
        assert_eq!(m.lag, 0);

        let mut seen = seen.lock().clone();
        seen.sort();
        assert_eq!(
            seen,
            vec![
                ("GET".to_string(), "/missing ".to_string(), Some("t-9".to_string())),
                ("POST".to_string(), "/orders?id=1 hello".to_string(), Some("t-9".to_string())),
            ]
        );

        stop.send(true).unwrap();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_unreachable_target_is_logged() {
        let unused = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = unused.local_addr().unwrap();
        drop(unused);

        let mut config = ConnectorConfig::new("dimension");
        config.set("http.bind", addr.to_string());
        config.set("http.timeout.secs", "2");
        let (tx, rx) = mpsc::channel(1);
        let mut module = HttpDelivery::new();
        module.setup(&config, rx).await.unwrap();
        let metrics = Arc::clone(&module.metrics);

        tx.send(request("GET", "%s/", "")).await.unwrap();
        drop(tx);
        let (_stop, signal) = shutdown::channel();
        module.run(signal).await.unwrap();
        assert_eq!(metrics.to_connector_metrics().custom_value("http.failed"), Some(1.0));
    }

    #[tokio::test]
    async fn test_shutdown_replays_queued_requests() {
        let (addr, seen) = target().await;
        let mut config = ConnectorConfig::new("dimension");
        config.set("http.bind", addr.to_string());

        let (tx, rx) = mpsc::channel(8);
        let mut module = HttpDelivery::new();
        module.setup(&config, rx).await.unwrap();
        for i in 0..3 {
            tx.send(request("POST", &format!("%s/queued/{i}"), "x"))
                .await
                .unwrap();
        }
        let (stop, signal) = shutdown::channel();
        stop.send(true).unwrap();

        module.run(signal).await.unwrap();

        let m = module.metrics();
        assert_eq!(m.records_total, 3);
        let mut paths: Vec<String> = seen.lock().iter().map(|(_, line, _)| line.clone()).collect();
        paths.sort();
        assert_eq!(paths, vec!["/queued/0 x", "/queued/1 x", "/queued/2 x"]);
        assert!(tx.is_closed());
    }

    #[test]
    fn test_transform_decodes_http_lines() {
        let module = HttpDelivery::new();
        let line = HttpMessage {
            method: "GET".into(),
            url: "%s/".into(),
            ..HttpMessage::default()
        }
        .encode()
        .unwrap();
        assert_eq!((module.transform())(&line).unwrap().kind(), "http");
    }

    #[tokio::test]
    async fn test_setup_rejects_bad_bind() {
        let mut config = ConnectorConfig::new("dimension");
        config.set("http.bind", "no-port");
        let (_tx, rx) = mpsc::channel(1);
        assert!(HttpDelivery::new().setup(&config, rx).await.is_err());
    }
}
