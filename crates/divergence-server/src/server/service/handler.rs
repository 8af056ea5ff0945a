use crate::server::{
    service::error::ApiError,
    telemetry::{
        decrement_requests_inflight, increment_cache_hits, increment_cache_misses,
        increment_enqueued, increment_requests, increment_requests_inflight,
        record_request_duration,
    },
};
use axum::{
    Json, Router,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use divergence::{
    CounterStore, DiskAssetStore, Lookup, RequestRouter, SchedulerStatus, TubeScene, Value,
};
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::time::Instant;

const NO_STORE: &str = "max-age=0, no-cache, no-store, must-revalidate";
const COUNTER_BORDER_RADIUS: u32 = 15;

/// Serving status published on `GET /health`. Starts out not serving.
#[derive(Clone, Debug, Default)]
pub struct HealthReporter {
    serving: Arc<AtomicBool>,
}

impl HealthReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_serving(&self) {
        self.serving.store(true, Ordering::Release);
    }

    pub fn set_not_serving(&self) {
        self.serving.store(false, Ordering::Release);
    }

    pub fn is_serving(&self) -> bool {
        self.serving.load(Ordering::Acquire)
    }
}

/// State shared by every handler.
///
/// The render worker is not reachable from here: handlers only promote,
/// queue and read.
#[derive(Clone)]
pub struct AppState {
    pub router: RequestRouter<DiskAssetStore>,
    pub counter: Arc<dyn CounterStore>,
    pub scene: Arc<TubeScene>,
    pub counter_digits: usize,
    pub health: HealthReporter,
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/", get(list_queue))
        .route("/status", get(status))
        .route("/health", get(health))
        .route("/count/{key}", get(count))
        .route("/{value}", get(asset))
        .with_state(state)
}

/// Values waiting to render, fresh first.
async fn list_queue(State(state): State<AppState>) -> Json<Vec<Value>> {
    Json(state.router.queues().snapshot())
}

async fn status(State(state): State<AppState>) -> Json<SchedulerStatus> {
    Json(state.router.queues().status())
}

async fn health(State(state): State<AppState>) -> (StatusCode, &'static str) {
    if state.health.is_serving() {
        (StatusCode::OK, "SERVING")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "NOT_SERVING")
    }
}

/// Serves the cached animation for `value`, queueing renders as a side
/// effect. Never waits for a render.
async fn asset(State(state): State<AppState>, Path(raw): Path<String>) -> Response {
    let start = Instant::now();
    increment_requests();
    increment_requests_inflight();

    let response = route_asset(&state, &raw).await.into_response();

    decrement_requests_inflight();
    record_request_duration(start.elapsed().as_secs_f64() * 1000.0);
    response
}

async fn route_asset(state: &AppState, raw: &str) -> Result<Response, ApiError> {
    let value = parse_value(raw)?;

    let router = state.router.clone();
    let routed = tokio::task::spawn_blocking(move || router.lookup(value))
        .await
        .map_err(|e| ApiError::Internal(format!("lookup task failed: {e}")))??;

    increment_enqueued(routed.priority, routed.enqueued as u64);

    match routed.lookup {
        Lookup::Ready(asset) => {
            increment_cache_hits();
            Ok((
                [
                    (header::CONTENT_TYPE, asset.media_type),
                    (header::CACHE_CONTROL, NO_STORE),
                ],
                asset.bytes,
            )
                .into_response())
        }
        Lookup::Pending => {
            increment_cache_misses();
            Err(ApiError::NotFound(format!("{value} is not available yet")))
        }
    }
}

/// Plain decimal digits only; `u64::from_str` alone would also take `+5`.
fn parse_value(raw: &str) -> Result<Value, ApiError> {
    let invalid = || ApiError::BadRequest(format!("'{raw}' is not a non-negative integer"));
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    raw.parse::<u64>().map(Value::new).map_err(|_| invalid())
}

/// Counts a view of `key` and returns the static counter image.
async fn count(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Response, ApiError> {
    let counter = Arc::clone(&state.counter);
    let count = tokio::task::spawn_blocking(move || counter.increment(&key))
        .await
        .map_err(|e| ApiError::Internal(format!("counter task failed: {e}")))??;

    let digits = format!("{count:0width$}", width = state.counter_digits);
    let svg = state.scene.counter_document(&digits, COUNTER_BORDER_RADIUS)?;

    Ok((
        [
            (header::CONTENT_TYPE, "image/svg+xml"),
            (header::CACHE_CONTROL, NO_STORE),
        ],
        svg,
    )
        .into_response())
}
