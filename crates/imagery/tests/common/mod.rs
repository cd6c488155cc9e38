//! Stub imagery service for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use imagery::{ApiKey, ImageryConfig};

pub const MAP_PATH: &str = "/REST/v1/Imagery/Map/Aerial";

#[derive(Default)]
pub struct StubState {
    pub status: u16,
    pub metadata: String,
    /// Wait this long before answering.
    pub delay: Option<Duration>,
    pub image_hits: AtomicUsize,
    pub metadata_hits: AtomicUsize,
    pub last_query: Mutex<HashMap<String, String>>,
}

/// A running stub service.
pub struct StubService {
    pub addr: SocketAddr,
    pub state: Arc<StubState>,
}

impl StubService {
    /// Serve `metadata` and a fake image with HTTP 200.
    pub async fn start(metadata: String) -> Self {
        Self::start_with_status(200, metadata).await
    }

    /// Answer every request with `status`.
    pub async fn start_with_status(status: u16, metadata: String) -> Self {
        Self::spawn(StubState {
            status,
            metadata,
            ..Default::default()
        })
        .await
    }

    /// Answer every request successfully, but only after `delay`.
    pub async fn start_with_delay(delay: Duration, metadata: String) -> Self {
        Self::spawn(StubState {
            status: 200,
            metadata,
            delay: Some(delay),
            ..Default::default()
        })
        .await
    }

    async fn spawn(state: StubState) -> Self {
        let state = Arc::new(state);

        let app = Router::new()
            .route(MAP_PATH, get(serve_map))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, state }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}{}", self.addr, MAP_PATH)
    }

    pub fn image_hits(&self) -> usize {
        self.state.image_hits.load(Ordering::SeqCst)
    }

    pub fn metadata_hits(&self) -> usize {
        self.state.metadata_hits.load(Ordering::SeqCst)
    }

    pub fn last_query(&self) -> HashMap<String, String> {
        self.state.last_query.lock().unwrap().clone()
    }

    /// Pipeline configuration pointing at this service and `translate_tool`.
    pub fn config(&self, cache_dir: &Path, translate_tool: &Path) -> ImageryConfig {
        ImageryConfig {
            api_key: ApiKey::new("test-key"),
            base_url: self.base_url(),
            cache_dir: cache_dir.to_path_buf(),
            translate_tool: translate_tool.to_path_buf(),
            fetch_timeout_secs: 5,
            georeference_timeout_secs: 5,
            ..Default::default()
        }
    }
}

async fn serve_map(
    State(state): State<Arc<StubState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let is_metadata = params.get("mapMetadata").map(String::as_str) == Some("1");
    if is_metadata {
        state.metadata_hits.fetch_add(1, Ordering::SeqCst);
    } else {
        state.image_hits.fetch_add(1, Ordering::SeqCst);
    }
    *state.last_query.lock().unwrap() = params;

    if let Some(delay) = state.delay {
        tokio::time::sleep(delay).await;
    }

    let status = StatusCode::from_u16(state.status).unwrap();
    if !status.is_success() {
        return (status, "stub failure").into_response();
    }

    if is_metadata {
        (status, state.metadata.clone()).into_response()
    } else {
        (status, test_utils::FAKE_PNG.to_vec()).into_response()
    }
}
