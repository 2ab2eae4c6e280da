//! Development webhook sink
//!
//! A stand-in for the dashboard's webhook receiver: accepts replayed or
//! simulated check-in webhooks, counts them and answers with a configurable
//! status and delay. Used as a local replay target and by integration tests.

use anyhow::{Context, Result};
use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::{info, warn};

pub const WEBHOOK_PATH: &str = "/webhook/eventmobi";

pub const DEFAULT_RETAIN: usize = 1000;

#[derive(Debug, Clone)]
pub struct SinkConfig {
    pub bind_addr: SocketAddr,
    /// Status returned for well-formed webhooks
    pub status: StatusCode,
    /// Artificial processing time per webhook
    pub delay: Duration,
    /// Most recent payloads kept for inspection; older ones are only counted
    pub retain: usize,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            status: StatusCode::OK,
            delay: Duration::ZERO,
            retain: DEFAULT_RETAIN,
        }
    }
}

/// Everything the sink has accepted so far
pub struct SinkState {
    config: SinkConfig,
    recent: Mutex<VecDeque<Value>>,
    received: AtomicUsize,
    by_operation: Mutex<HashMap<String, usize>>,
}

impl SinkState {
    pub fn new(config: SinkConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            recent: Mutex::new(VecDeque::new()),
            received: AtomicUsize::new(0),
            by_operation: Mutex::new(HashMap::new()),
        })
    }

    /// Every accepted webhook, including those no longer retained
    pub fn received_count(&self) -> usize {
        self.received.load(Ordering::Relaxed)
    }

    /// Retained payloads in arrival order
    pub fn received(&self) -> Vec<Value> {
        self.recent.lock().iter().cloned().collect()
    }

    fn record(&self, payload: Value) {
        let operation = payload
            .get("operation")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();
        *self.by_operation.lock().entry(operation).or_insert(0) += 1;
        self.received.fetch_add(1, Ordering::Relaxed);

        if self.config.retain == 0 {
            return;
        }
        let mut recent = self.recent.lock();
        if recent.len() >= self.config.retain {
            recent.pop_front();
        }
        recent.push_back(payload);
    }
}

async fn receive_webhook(State(state): State<Arc<SinkState>>, body: Bytes) -> Response {
    let payload: Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, "Webhook body is not JSON");
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"status": "error", "message": "Invalid JSON body"})),
            )
                .into_response();
        }
    };

    if !state.config.delay.is_zero() {
        tokio::time::sleep(state.config.delay).await;
    }
    state.record(payload);

    (state.config.status, Json(json!({"status": "ok"}))).into_response()
}

async fn verify_webhook() -> Json<Value> {
    Json(json!({"status": "ok", "message": "Webhook endpoint is active"}))
}

async fn sink_stats(State(state): State<Arc<SinkState>>) -> Json<Value> {
    Json(json!({
        "received": state.received_count(),
        "by_operation": state.by_operation.lock().clone(),
    }))
}

/// Logs each request with method, path, status and latency
async fn request_logging(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    let response = next.run(request).await;

    let status = response.status().as_u16();
    let latency_ms = start.elapsed().as_millis() as u64;
    if status >= 400 {
        warn!(method = %method, path = %path, status, latency_ms, "Request failed");
    } else {
        info!(method = %method, path = %path, status, latency_ms, "Request completed");
    }
    response
}

pub fn router(state: Arc<SinkState>) -> Router {
    Router::new()
        .route(WEBHOOK_PATH, get(verify_webhook).post(receive_webhook))
        .route("/stats", get(sink_stats))
        .layer(middleware::from_fn(request_logging))
        .with_state(state)
}

/// Serve the sink on `listener` until `shutdown` resolves
pub async fn serve(
    listener: TcpListener,
    state: Arc<SinkState>,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let addr = listener.local_addr()?;
    info!(%addr, path = WEBHOOK_PATH, "Webhook sink listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .context("Webhook sink server failed")
}

/// A sink running on its own runtime thread; stops when dropped
pub struct SinkHandle {
    addr: SocketAddr,
    state: Arc<SinkState>,
    shutdown: Option<oneshot::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl SinkHandle {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn webhook_url(&self) -> String {
        format!("http://{}{}", self.addr, WEBHOOK_PATH)
    }

    pub fn state(&self) -> &Arc<SinkState> {
        &self.state
    }
}

impl Drop for SinkHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// Start the sink on a background thread, for use from synchronous code
pub fn spawn_background(config: SinkConfig) -> Result<SinkHandle> {
    let state = SinkState::new(config.clone());
    let (ready_tx, ready_rx) = std::sync::mpsc::channel::<Result<SocketAddr>>();
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let server_state = state.clone();
    let thread = thread::Builder::new()
        .name("webhook-sink".to_string())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_multi_thread()
                .worker_threads(2)
                .enable_all()
                .build()
            {
                Ok(rt) => rt,
                Err(e) => {
                    let _ = ready_tx.send(Err(e.into()));
                    return;
                }
            };
            runtime.block_on(async move {
                let listener = match TcpListener::bind(config.bind_addr).await {
                    Ok(l) => l,
                    Err(e) => {
                        let _ = ready_tx.send(Err(anyhow::Error::new(e)
                            .context(format!("Failed to bind webhook sink on {}", config.bind_addr))));
                        return;
                    }
                };
                match listener.local_addr() {
                    Ok(addr) => {
                        let _ = ready_tx.send(Ok(addr));
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e.into()));
                        return;
                    }
                }
                let shutdown = async move {
                    let _ = shutdown_rx.await;
                };
                if let Err(e) = serve(listener, server_state, shutdown).await {
                    warn!(error = %e, "Webhook sink stopped with error");
                }
            });
        })
        .context("Failed to spawn webhook sink thread")?;

    let addr = ready_rx
        .recv()
        .context("Webhook sink thread exited before binding")??;

    Ok(SinkHandle {
        addr,
        state,
        shutdown: Some(shutdown_tx),
        thread: Some(thread),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tower::ServiceExt;

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(WEBHOOK_PATH)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_post_records_payload() {
        let state = SinkState::new(SinkConfig::default());
        let app = router(state.clone());

        let response = app
            .oneshot(post(r#"{"operation":"create","resource_ids":["chk_1"],"type":"checkins"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "ok");
        assert_eq!(state.received_count(), 1);
        assert_eq!(state.received()[0]["resource_ids"][0], "chk_1");
    }

    #[tokio::test]
    async fn test_configured_status_and_bad_json() {
        let state = SinkState::new(SinkConfig {
            status: StatusCode::SERVICE_UNAVAILABLE,
            ..Default::default()
        });

        let response = router(state.clone())
            .oneshot(post(r#"{"operation":"delete"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let response = router(state.clone()).oneshot(post("not json")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(state.received_count(), 1);
    }

    #[tokio::test]
    async fn test_retains_only_recent_payloads() {
        let state = SinkState::new(SinkConfig {
            retain: 2,
            ..Default::default()
        });
        for id in ["chk_1", "chk_2", "chk_3"] {
            let body = format!(r#"{{"operation":"create","resource_ids":["{}"]}}"#, id);
            router(state.clone()).oneshot(post(&body)).await.unwrap();
        }

        assert_eq!(state.received_count(), 3);
        let ids: Vec<_> = state
            .received()
            .iter()
            .map(|p| p["resource_ids"][0].as_str().unwrap().to_string())
            .collect();
        assert_eq!(ids, vec!["chk_2", "chk_3"]);
    }

    #[tokio::test]
    async fn test_verification_and_stats() {
        let state = SinkState::new(SinkConfig::default());
        router(state.clone())
            .oneshot(post(r#"{"operation":"create"}"#))
            .await
            .unwrap();
        router(state.clone())
            .oneshot(post(r#"{"operation":"create"}"#))
            .await
            .unwrap();

        let verify = router(state.clone())
            .oneshot(Request::get(WEBHOOK_PATH).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(body_json(verify).await["message"], "Webhook endpoint is active");

        let stats = router(state)
            .oneshot(Request::get("/stats").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let stats = body_json(stats).await;
        assert_eq!(stats["received"], 2);
        assert_eq!(stats["by_operation"]["create"], 2);
    }
}
