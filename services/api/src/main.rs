mod appin;
mod error;
mod extractors;
mod middleware;
#[cfg(test)]
mod testutil;
mod tuning;

use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use appin::service::OverviewService;
use appin_common::error::AppinError;
use appin_common::types::ServiceInfo;
use appin_config::{init_tracing, AppConfig};
use appin_source::{CaseSource, GraphCaseSource};
use axum::{
    extract::{Request, State},
    http::{header, HeaderName, HeaderValue, Method, StatusCode, Uri},
    response::IntoResponse,
    routing::get,
    Json, Router, ServiceExt,
};
use chrono::Utc;
use error::ApiError;
use middleware::{panic_response, rate_limit, RateLimiter};
use tokio::sync::Notify;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::normalize_path::NormalizePath;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::{DefaultOnResponse, TraceLayer};
use tracing::Level;

const SERVICE_NAME: &str = "appin-api";

/// How long in-flight requests get to finish after a shutdown signal.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Clone)]
pub struct AppState {
    pub appins: Arc<OverviewService>,
    pub info: Arc<ServiceInfo>,
    pub limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(source: Arc<dyn CaseSource>, engine: appin_engine::EngineConfig) -> Self {
        Self {
            appins: Arc::new(OverviewService::new(source, Arc::new(engine))),
            info: Arc::new(ServiceInfo::new(SERVICE_NAME)),
            limiter: Arc::new(RateLimiter::per_second(
                middleware::DEFAULT_REQUESTS_PER_SECOND,
            )),
        }
    }

    pub fn with_rate_limit(mut self, requests_per_second: u32) -> Self {
        self.limiter = Arc::new(RateLimiter::per_second(requests_per_second));
        self
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn info(State(state): State<AppState>) -> Json<ServiceInfo> {
    Json(state.info.as_ref().clone())
}

async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    let info = &state.info;
    let body = format!(
        "# HELP appin_up Service up indicator\n\
         # TYPE appin_up gauge\n\
         appin_up 1\n\
         # HELP appin_info Service info\n\
         # TYPE appin_info gauge\n\
         appin_info{{service=\"{}\",version=\"{}\"}} 1\n\
         # HELP appin_uptime_seconds Seconds since the instance started\n\
         # TYPE appin_uptime_seconds gauge\n\
         appin_uptime_seconds {}\n",
        info.name,
        info.version,
        info.uptime_secs(Utc::now()),
    );

    (
        StatusCode::OK,
        [(
            header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        body,
    )
}

async fn not_found(uri: Uri) -> ApiError {
    ApiError(AppinError::NotFound(format!("no route for {}", uri.path())))
}

fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET])
        .allow_headers(Any);

    let trace = TraceLayer::new_for_http()
        .make_span_with(|request: &Request| {
            let request_id = request
                .headers()
                .get("x-request-id")
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default();
            tracing::info_span!(
                "http_request",
                method = %request.method(),
                uri = %request.uri(),
                request_id
            )
        })
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    let mut router = Router::new()
        .route("/health", get(health))
        .route("/info", get(info))
        .route("/metrics", get(metrics))
        .merge(appin::router())
        .fallback(not_found)
        .layer(axum::middleware::from_fn_with_state(
            state.limiter.clone(),
            rate_limit,
        ));

    for (name, value) in middleware::SECURE_HEADERS {
        router = router.layer(SetResponseHeaderLayer::if_not_present(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        ));
    }

    // Outermost layer last; the request id must exist before the span opens.
    router
        .layer(cors)
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(trace)
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .with_state(state)
}

/// Router wrapped so `/v1/appins/` and `/v1/appins` hit the same route.
/// Path normalization has to run before routing, outside the router.
fn build_app(state: AppState) -> NormalizePath<Router> {
    NormalizePath::trim_trailing_slash(build_router(state))
}

/// Resolves on Ctrl-C or SIGTERM and starts the drain deadline.
async fn shutdown_signal(draining: Arc<Notify>) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }

    tracing::info!(
        timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
        "shutdown signal received, draining requests"
    );
    draining.notify_one();
}

async fn drain_deadline(draining: Arc<Notify>) {
    draining.notified().await;
    tokio::time::sleep(SHUTDOWN_TIMEOUT).await;
}

#[tokio::main]
async fn main() {
    let config = AppConfig::from_env().expect("failed to load config");
    init_tracing(&config.log_level);
    tracing::info!(service = SERVICE_NAME, graph = ?config.graph, "starting");

    let engine = tuning::engine_config(&config.tuning).expect("invalid overview settings");
    let source = GraphCaseSource::from_config(&config.graph).expect("failed to build graph source");

    let state = AppState::new(Arc::new(source), engine)
        .with_rate_limit(config.rate_limit_per_second);
    let app = build_app(state);
    let addr: SocketAddr = config.bind_addr().parse().expect("invalid bind address");

    tracing::info!(%addr, "listening");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind");

    let draining = Arc::new(Notify::new());
    let server = axum::serve(
        listener,
        ServiceExt::<Request>::into_make_service_with_connect_info::<SocketAddr>(app),
    )
    .with_graceful_shutdown(shutdown_signal(draining.clone()));

    tokio::select! {
        result = server.into_future() => {
            result.expect("server error");
            tracing::info!("server shut down gracefully");
        }
        () = drain_deadline(draining) => {
            tracing::warn!("requests still in flight after shutdown timeout, exiting");
        }
    }
}
