use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Query, Request, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, put};
use axum::{Json, Router};
use futures_util::TryStreamExt;
use http_body_util::LengthLimitError;
use serde::Deserialize;
use serde_json::json;
use tokio_util::io::StreamReader;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{debug, info};

use repo_api::write::WriteRequest;
use repo_api::{
    paths, Bundle, Cancellation, Config, Filter, Format, GitRepo, LogFilesOptions,
    QueryAggregator, QueryOptions, QueryOutput, RepoSync, TaskQueue, WritePipeline,
};

use crate::auth;
use crate::error::ApiError;

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Shared handler state. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<StateInner>,
}

struct StateInner {
    repo_dir: PathBuf,
    auth_key: Option<String>,
    max_body_bytes: usize,
    sync: Arc<RepoSync>,
    writer: WritePipeline,
    reader: QueryAggregator,
}

impl AppState {
    /// Wire the store components for `config` around one write queue.
    pub fn from_config(config: &Config, queue: TaskQueue) -> Self {
        let sync = Arc::new(RepoSync::new(&config.repo_dir, config.git.sync_options()));
        let writer = WritePipeline::new(
            &config.repo_dir,
            queue,
            Arc::clone(&sync),
            config.git.write_options(),
        );
        Self {
            inner: Arc::new(StateInner {
                repo_dir: config.repo_dir.clone(),
                auth_key: config.auth.key.clone(),
                max_body_bytes: config.max_body_bytes,
                sync,
                writer,
                reader: QueryAggregator::new(&config.repo_dir),
            }),
        }
    }

    pub fn auth_key(&self) -> Option<&str> {
        self.inner.auth_key.as_deref()
    }

    pub fn sync(&self) -> Arc<RepoSync> {
        Arc::clone(&self.inner.sync)
    }

    pub fn queue(&self) -> &TaskQueue {
        self.inner.writer.queue()
    }

    fn repo_dir(&self) -> &Path {
        &self.inner.repo_dir
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/query", get(query))
        .route("/file", put(write_file))
        .route("/expand", get(expand))
        .route("/changed", get(changed))
        .route("/webhook", get(webhook).post(webhook))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_bearer,
        ));

    Router::new()
        .route("/", get(index))
        .route("/healthz", get(healthz))
        .merge(api)
        .fallback(not_found)
        .layer(RequestBodyLimitLayer::new(state.inner.max_body_bytes))
        .layer(middleware::from_fn(log_request))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn log_request(request: Request, next: Next) -> Response {
    if request.uri().path().starts_with("/healthz") {
        return next.run(request).await;
    }
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let response = next.run(request).await;
    info!(%method, %path, status = response.status().as_u16(), "request");
    response
}

async fn index() -> Json<serde_json::Value> {
    Json(json!({
        "app": {
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
        }
    }))
}

async fn healthz() -> &'static str {
    "ok"
}

async fn not_found() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "Not found")
}

// ---------------------------------------------------------------------------
// /query
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
struct QueryParams {
    file: Option<String>,
    glob: Option<String>,
    format: Option<String>,
    /// Older clients send `type` instead of `format`.
    #[serde(rename = "type")]
    legacy_type: Option<String>,
    columns: Option<String>,
    filter: Option<String>,
}

impl QueryParams {
    fn options(&self) -> Result<QueryOptions, ApiError> {
        let format: Format = self
            .format
            .as_deref()
            .or(self.legacy_type.as_deref())
            .unwrap_or_default()
            .parse()?;
        let columns = self.columns.as_deref().map(|columns| {
            columns
                .split(',')
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string)
                .collect()
        });
        let filter = self.filter.as_deref().map(str::parse::<Filter>).transpose()?;
        Ok(QueryOptions {
            format,
            columns,
            filter,
        })
    }
}

async fn query(
    State(state): State<AppState>,
    Query(params): Query<QueryParams>,
) -> Result<Response, ApiError> {
    let opts = params.options()?;

    if let Some(ref file) = params.file {
        return Ok(match state.inner.reader.query_file(file, &opts).await? {
            QueryOutput::Value(value) => Json(value).into_response(),
            QueryOutput::Raw(data) => {
                ([(CONTENT_TYPE, "application/octet-stream")], data).into_response()
            }
        });
    }

    if let Some(ref glob) = params.glob {
        let bundle = state.inner.reader.query_glob(glob, &opts).await?;
        let boundary = Bundle::boundary();
        return Ok((
            [(CONTENT_TYPE, Bundle::content_type(&boundary))],
            bundle.encode(&boundary),
        )
            .into_response());
    }

    Err(ApiError::bad_request("?file or ?glob is required"))
}

// ---------------------------------------------------------------------------
// /file
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct FileParams {
    file: Option<String>,
    message: Option<String>,
}

/// The body is streamed into the write job rather than buffered.
async fn write_file(
    State(state): State<AppState>,
    Query(params): Query<FileParams>,
    body: Body,
) -> Result<Json<&'static str>, ApiError> {
    let file = params.file.ok_or_else(|| ApiError::bad_request("?file not set"))?;
    debug!(%file, "write file");

    // Bodies without a Content-Length only hit the limit mid-stream.
    let over_limit = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&over_limit);
    let stream = body.into_data_stream().map_err(move |err| {
        if exceeds_limit(&err) {
            flag.store(true, Ordering::SeqCst);
        }
        std::io::Error::other(err)
    });

    // A client that disconnects kills the job's in-flight git command.
    let cancel = Cancellation::new();
    let guard = cancel.drop_guard();

    let mut request = WriteRequest::new(file).cancel_on(cancel);
    if let Some(message) = params.message {
        request = request.message(message);
    }
    let outcome = state
        .inner
        .writer
        .write(request, StreamReader::new(stream))
        .await;
    guard.disarm();

    if outcome.is_err() && over_limit.load(Ordering::SeqCst) {
        return Err(ApiError::PayloadTooLarge);
    }
    Ok(Json(outcome?.label()))
}

fn exceeds_limit(err: &axum::Error) -> bool {
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(e) = source {
        if e.is::<LengthLimitError>() {
            return true;
        }
        source = e.source();
    }
    false
}

// ---------------------------------------------------------------------------
// /expand, /changed
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ExpandParams {
    glob: Option<String>,
}

async fn expand(
    State(state): State<AppState>,
    Query(params): Query<ExpandParams>,
) -> Result<Json<Vec<String>>, ApiError> {
    let glob = params
        .glob
        .ok_or_else(|| ApiError::bad_request("?glob is required"))?;
    Ok(Json(state.inner.reader.expand(&glob).await?))
}

/// `paths` may repeat, so the query string is read as raw pairs.
async fn changed(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<Vec<String>>, ApiError> {
    let mut options = LogFilesOptions::default();
    for (key, value) in pairs {
        match key.as_str() {
            "paths" => {
                let path = paths::normalize_path(&value)?;
                options.paths.push(if path.is_empty() { ".".into() } else { path });
            }
            "since" => options.since = Some(value),
            "until" => options.until = Some(value),
            _ => {}
        }
    }

    let cancel = Cancellation::new();
    let guard = cancel.drop_guard();
    let files = GitRepo::new(state.repo_dir())
        .with_cancel(Some(cancel))
        .log_files(&options)
        .await;
    guard.disarm();

    Ok(Json(files?))
}

// ---------------------------------------------------------------------------
// /webhook
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct WebhookParams {
    wait: Option<String>,
}

/// Queue a sync. With `?wait` the response is sent once it has run.
async fn webhook(
    State(state): State<AppState>,
    Query(params): Query<WebhookParams>,
) -> Result<&'static str, ApiError> {
    let sync = state.sync();
    let handle = state.queue().add(move || async move { sync.sync(None).await });
    if params.wait.is_some() {
        let outcome = handle.await?;
        debug!(?outcome, "webhook sync");
    }
    Ok("ok")
}
