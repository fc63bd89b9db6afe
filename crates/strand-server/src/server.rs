use std::future::Future;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use tower_http::trace::TraceLayer;

use strand_core::{ApiError, Function, ProcessConfig, Record, StrandError, StrandResult};
use strand_runtime::FunctionRegistry;

use crate::wire::{ProcessRequest, ProcessResponse, WireRecord};

#[derive(Clone)]
struct ServeState {
    name: Arc<str>,
    function: Arc<dyn Function>,
}

#[derive(Serialize)]
struct HealthResponse<'a> {
    status: &'static str,
    function: &'a str,
}

#[derive(Debug, thiserror::Error)]
enum ProcessError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Internal(String),
}

impl IntoResponse for ProcessError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "invalid_argument"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        };
        (status, Json(ApiError::new(self.to_string()).with_code(code))).into_response()
    }
}

/// Router serving one function.
pub fn build_app(name: &str, function: Arc<dyn Function>, body_limit: usize) -> Router {
    let state = ServeState {
        name: Arc::from(name),
        function,
    };
    Router::new()
        .route("/v1/process", post(process))
        .route("/healthz", get(healthz))
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    use tracing::field::Empty;
                    tracing::info_span!(
                        "http.request",
                        http.method = %req.method(),
                        http.target = %req.uri(),
                        http.status_code = Empty,
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>, latency: std::time::Duration, span: &tracing::Span| {
                        span.record("http.status_code", tracing::field::display(res.status().as_u16()));
                        tracing::debug!(elapsed_ms = %latency.as_millis(), "request handled");
                    },
                ),
        )
        .layer(axum::extract::DefaultBodyLimit::max(body_limit))
}

async fn healthz(State(state): State<ServeState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok",
            function: &state.name,
        }),
    )
        .into_response()
}

async fn process(
    State(state): State<ServeState>,
    Json(request): Json<ProcessRequest>,
) -> Result<Json<ProcessResponse>, ProcessError> {
    let records = request
        .records
        .into_iter()
        .map(Record::try_from)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ProcessError::BadRequest(e.to_string()))?;
    let received = records.len();

    let function = state.function.clone();
    let (output, failed) = tokio::task::spawn_blocking(move || function.process(records))
        .await
        .map_err(|e| {
            tracing::error!(function = %state.name, error = %e, "function panicked");
            ProcessError::Internal(format!("function {} did not complete", state.name))
        })?;

    if !failed.is_empty() {
        tracing::warn!(
            function = %state.name,
            count = failed.len(),
            "dropping failed records, dead-letter output is not persisted"
        );
    }
    tracing::debug!(function = %state.name, received, emitted = output.len(), "processed batch");

    Ok(Json(ProcessResponse {
        records: output.into_iter().map(WireRecord::from).collect(),
    }))
}

/// Serves a single registered function until a termination signal arrives.
pub struct FunctionServer {
    addr: String,
    name: String,
    app: Router,
}

impl FunctionServer {
    /// Picks `name` out of the registry handed over after the app ran.
    ///
    /// Fails with a fatal error when the function is unknown or no listen
    /// address is configured.
    pub fn new(registry: FunctionRegistry, name: &str, config: &ProcessConfig) -> StrandResult<Self> {
        let function = registry.get(name).ok_or_else(|| {
            StrandError::fatal(format!(
                "function {name} is not registered (registered: {})",
                registry.names().join(", ")
            ))
        })?;
        let addr = config.require_function_addr()?.to_string();

        Ok(Self {
            app: build_app(name, function, config.body_limit_bytes),
            addr,
            name: name.to_string(),
        })
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub async fn run(self) -> anyhow::Result<()> {
        self.run_until(shutdown_signal()).await
    }

    /// Serves until `shutdown` resolves, then drains in-flight requests.
    pub async fn run_until<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = tokio::net::TcpListener::bind(&self.addr).await?;
        tracing::info!(function = %self.name, addr = %listener.local_addr()?, "function server listening");
        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown)
            .await?;
        tracing::info!(function = %self.name, "function server stopped");
        Ok(())
    }
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "unable to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "unable to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
