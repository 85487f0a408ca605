//! The dashboard's HTTP surface.
//!
//! Every request opens the datastore for itself and closes it when done; no connection or query
//! result is shared between requests.

use anyhow::{Context, Result};
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use serde_json::json;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::chart::{chart_for, Chart};
use crate::datastore::Datastore;
use crate::defaults::DASHBOARD_HTML;
use crate::export::{export_csv, export_file_name};
use crate::filter::FilterParams;
use crate::metrics::{self, MetricKind, MetricRows};

// -------------------------------------------------------------------------------------------------
// AppState
// -------------------------------------------------------------------------------------------------
#[derive(Clone)]
pub struct AppState {
    datastore_path: Arc<PathBuf>,
}

impl AppState {
    pub fn new(datastore_path: PathBuf) -> Self {
        Self {
            datastore_path: Arc::new(datastore_path),
        }
    }

    /// Run `f` against a freshly opened datastore on the blocking thread pool.
    async fn with_datastore<T, F>(&self, f: F) -> Result<T, ApiError>
    where
        F: FnOnce(&Datastore) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let path = self.datastore_path.clone();
        tokio::task::spawn_blocking(move || {
            let datastore = Datastore::open(&path)?;
            f(&datastore)
        })
        .await
        .context("Datastore task failed")
        .map_err(ApiError::internal)?
        .map_err(ApiError::internal)
    }
}

// -------------------------------------------------------------------------------------------------
// ApiError
// -------------------------------------------------------------------------------------------------
/// A failed request, rendered as `{"error": message}`
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request<E: std::fmt::Display>(e: E) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: e.to_string(),
        }
    }

    fn not_found<E: std::fmt::Display>(e: E) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: e.to_string(),
        }
    }

    fn internal(e: anyhow::Error) -> Self {
        error!("Request failed: {e:?}");
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: format!("{e:#}"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({"error": self.message}))).into_response()
    }
}

// -------------------------------------------------------------------------------------------------
// routes
// -------------------------------------------------------------------------------------------------
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { dashboard_page(MetricKind::Commits) }))
        .route("/commits", get(|| async { dashboard_page(MetricKind::Commits) }))
        .route("/prs", get(|| async { dashboard_page(MetricKind::Prs) }))
        .route("/releases", get(|| async { dashboard_page(MetricKind::Releases) }))
        .route("/api/:metric", get(api_handler))
        .route("/export/:metric", get(export_handler))
        .with_state(state)
}

/// Serve the dashboard on `addr` until the process is stopped.
pub async fn serve(state: AppState, addr: SocketAddr) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to listen on {addr}"))?;
    info!("Serving dashboard on http://{}", listener.local_addr()?);
    axum::serve(listener, build_router(state))
        .await
        .context("Server failed")?;
    Ok(())
}

fn dashboard_page(kind: MetricKind) -> Html<String> {
    Html(DASHBOARD_HTML.replace("{{metric}}", kind.name()))
}

#[derive(Serialize)]
struct MetricResponse {
    chart: Chart,
    data: MetricRows,
}

async fn api_handler(
    State(state): State<AppState>,
    Path(metric): Path<String>,
    Query(params): Query<FilterParams>,
) -> Result<Json<MetricResponse>, ApiError> {
    let kind: MetricKind = metric.parse().map_err(ApiError::not_found)?;
    let filter = params.parse().map_err(ApiError::bad_request)?;
    debug!("Summarizing {kind} with {filter:?}");

    let rows = state
        .with_datastore(move |datastore| metrics::summarize(datastore, kind, &filter))
        .await?;
    Ok(Json(MetricResponse {
        chart: chart_for(&rows),
        data: rows,
    }))
}

async fn export_handler(
    State(state): State<AppState>,
    Path(metric): Path<String>,
    Query(params): Query<FilterParams>,
) -> Result<Response, ApiError> {
    let filter = params.parse().map_err(ApiError::bad_request)?;
    debug!("Exporting {metric:?} with {filter:?}");

    // the name ends up in a header, so only keep characters that are safe there
    let file_stem: String = metric
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect();
    let body = state
        .with_datastore(move |datastore| export_csv(datastore, &metric, &filter))
        .await?;

    let disposition = format!("attachment; filename=\"{}\"", export_file_name(&file_stem));
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}
