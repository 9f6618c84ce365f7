use std::future::Future;
use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::{PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::header::{CONTENT_TYPE, HeaderName};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::logs::LogFetcher;
use crate::monitor::StatusCollector;
use crate::runtime::Runtime;

mod models;

pub use models::{ApiError, ErrorBody, LogsParams};

/// Response header telling whether older log output exists beyond the returned window.
pub const LOG_TRUNCATED_HEADER: &str = "x-log-truncated";

struct AppState<R> {
    collector: StatusCollector<R>,
    logs: LogFetcher<R>,
}

async fn monitor<R: Runtime>(State(state): State<Arc<AppState<R>>>) -> Response {
    match state.collector.collect().await {
        Ok(report) => {
            if !report.collection_errors.is_empty() {
                log::warn!(
                    "Status report is missing {} containers",
                    report.collection_errors.len()
                );
            }
            (StatusCode::OK, Json(report)).into_response()
        }
        Err(err) => {
            log::error!("Failed to collect container status: {}", err);
            ApiError::from(err).into_response()
        }
    }
}

async fn container_logs<R: Runtime>(
    State(state): State<Arc<AppState<R>>>,
    container_id: std::result::Result<Path<String>, PathRejection>,
    params: std::result::Result<Query<LogsParams>, QueryRejection>,
) -> Response {
    let Path(container_id) = match container_id {
        Ok(container_id) => container_id,
        Err(rejection) => {
            return ApiError::invalid_request(rejection.body_text()).into_response();
        }
    };
    let Query(params) = match params {
        Ok(params) => params,
        Err(rejection) => {
            return ApiError::invalid_request(rejection.body_text()).into_response();
        }
    };

    match state.logs.fetch(&container_id, params.tail).await {
        Ok(window) => (
            StatusCode::OK,
            [
                (CONTENT_TYPE, "text/plain; charset=utf-8"),
                (
                    HeaderName::from_static(LOG_TRUNCATED_HEADER),
                    if window.truncated { "true" } else { "false" },
                ),
            ],
            window.to_text(),
        )
            .into_response(),
        Err(err) => {
            log::error!("Failed to fetch logs for container `{}`: {}", container_id, err);
            ApiError::from(err).into_response()
        }
    }
}

async fn fallback() -> ApiError {
    ApiError::new(StatusCode::NOT_FOUND, "not_found", "no such endpoint")
}

pub struct ApiServer {
    router: axum::Router,
}

impl ApiServer {
    /// Builds the HTTP routes on top of `runtime`.
    ///
    /// | Method | Path | Success |
    /// |---|---|---|
    /// | GET | `/api/v1/monitor` | `200`, JSON [`MonitorReport`](crate::monitor::MonitorReport) |
    /// | GET | `/api/v1/logs/{container_id}?tail=N` | `200`, `text/plain` |
    pub fn new<R: Runtime>(runtime: Arc<R>, config: &Config) -> Self {
        let state = Arc::new(AppState {
            collector: StatusCollector::new(Arc::clone(&runtime), config),
            logs: LogFetcher::new(runtime, config),
        });
        let router = axum::Router::new()
            .route("/api/v1/monitor", get(monitor::<R>))
            .route("/api/v1/logs/{container_id}", get(container_logs::<R>))
            .fallback(fallback)
            .with_state(state);
        Self { router }
    }

    pub fn into_router(self) -> axum::Router {
        self.router
    }

    /// Serves the API on `addr` until `shutdown` resolves.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Bind`] if the listener cannot be bound and [`Error::Serve`]
    /// if the server fails while running.
    pub async fn listen(
        self,
        addr: &str,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|source| Error::Bind {
                addr: addr.to_owned(),
                source,
            })?;
        log::info!("Listening on {}", addr);
        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(Error::Serve)
    }
}
