//! Session server for interactive point enrichment.
//!
//! Holds a single working session and exposes import, column mapping,
//! selection, enrichment and export as HTTP commands.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post, put},
    Router,
};
use clap::Parser;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use geopin::config::Config;
use geopin::export::{ExportFormat, ExportOptions};
use geopin::import::{self, RemoteImporter};
use geopin::pip::{BoundaryDataset, CountryIndex, EnrichReport};
use geopin::projection::BatchReport;
use geopin::session::{IngestSummary, SessionStatus};
use geopin::store;
use geopin::{GeopinError, Point, SelectionRect, Session};

#[derive(Parser, Debug)]
#[command(name = "serve")]
#[command(about = "Point enrichment session server")]
struct Args {
    /// Optional TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address (overrides the config file)
    #[arg(short, long)]
    listen: Option<String>,

    /// Country boundaries GeoJSON (overrides the config file)
    #[arg(long)]
    boundaries: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

/// Application state shared across handlers
struct AppState {
    session: Mutex<Session>,
    importer: RemoteImporter,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(if args.verbose { Level::DEBUG } else { Level::INFO })
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Geopin Session Server");

    let mut config = Config::load_or_default(args.config.as_deref())?;
    if let Some(path) = args.boundaries {
        config.boundaries.path = path;
    }
    if let Some(listen) = args.listen {
        config.server.listen = listen;
    }

    let state = Arc::new(AppState {
        session: Mutex::new(Session::new()),
        importer: RemoteImporter::new(&config.import)?,
    });

    spawn_boundary_loader(state.clone(), config.boundaries.path.clone());

    let app = router(state);

    info!("Starting server on {}", config.server.listen);

    let listener = tokio::net::TcpListener::bind(&config.server.listen).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Load boundaries off the request path; country enrichment reports
/// `DatasetUnavailable` until this finishes.
fn spawn_boundary_loader(state: Arc<AppState>, path: PathBuf) {
    tokio::spawn(async move {
        info!("Loading boundaries from {}", path.display());
        let loaded =
            tokio::task::spawn_blocking(move || BoundaryDataset::load(&path).map(CountryIndex::build))
                .await;

        match loaded {
            Ok(Ok(index)) => state.session.lock().await.attach_boundaries(Arc::new(index)),
            Ok(Err(e)) => error!("Failed to load boundaries: {}", e),
            Err(e) => error!("Boundary loader task failed: {}", e),
        }
    });
}

fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/v1/status", get(status_handler))
        .route("/v1/import", post(import_handler))
        .route("/v1/sample", post(sample_handler))
        .route("/v1/mapping", post(mapping_handler))
        .route("/v1/filtering", put(filtering_handler))
        .route(
            "/v1/selection",
            put(set_selection_handler).delete(clear_selection_handler),
        )
        .route("/v1/points", get(points_handler))
        .route("/v1/enrich/country", post(country_handler))
        .route("/v1/enrich/utm", post(utm_handler))
        .route("/v1/export", get(export_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

enum ApiError {
    BadRequest(String),
    Session(GeopinError),
}

impl From<GeopinError> for ApiError {
    fn from(e: GeopinError) -> Self {
        ApiError::Session(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let e = match self {
            ApiError::BadRequest(message) => {
                return (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
            }
            ApiError::Session(e) => e,
        };

        let status = match &e {
            GeopinError::NoValidRows { .. } | GeopinError::ProjectionFailure { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            GeopinError::ParseFailure { .. } | GeopinError::NoData => StatusCode::BAD_REQUEST,
            GeopinError::DatasetUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            GeopinError::NetworkFailure { .. } => StatusCode::BAD_GATEWAY,
            GeopinError::EmptyWorkingSet | GeopinError::FieldTruncation(_) => StatusCode::CONFLICT,
            GeopinError::Export(_) | GeopinError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            error!("Request failed: {}", e);
        } else {
            warn!("Request rejected: {}", e);
        }

        let body = match &e {
            GeopinError::FieldTruncation(truncations) => {
                json!({ "error": e.to_string(), "truncations": truncations })
            }
            _ => json!({ "error": e.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

/// Health check endpoint
async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let boundaries = state.session.lock().await.boundaries_loaded();
    Json(HealthResponse {
        status: "ok",
        boundaries,
    })
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    boundaries: bool,
}

async fn status_handler(State(state): State<Arc<AppState>>) -> Json<SessionStatus> {
    Json(state.session.lock().await.status())
}

#[derive(Deserialize)]
struct ImportRequest {
    /// Inline CSV/TSV/JSON text
    text: Option<String>,
    /// Remote CSV or JSON file
    url: Option<String>,
}

/// Import records from inline text or a URL
async fn import_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ImportRequest>,
) -> Result<Json<IngestSummary>, ApiError> {
    let records = match (request.text, request.url) {
        (Some(text), None) => import::parse_text(&text)?,
        // Fetch before taking the session lock
        (None, Some(url)) => state.importer.fetch(&url).await?,
        _ => {
            return Err(ApiError::BadRequest(
                "exactly one of 'text' or 'url' is required".into(),
            ))
        }
    };

    let summary = state.session.lock().await.ingest_records(records)?;
    Ok(Json(summary))
}

async fn sample_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<IngestSummary>, ApiError> {
    let summary = state
        .session
        .lock()
        .await
        .ingest_records(store::sample_records())?;
    Ok(Json(summary))
}

#[derive(Deserialize)]
struct MappingRequest {
    lat: String,
    lng: String,
}

#[derive(Serialize)]
struct MappingResponse {
    points: usize,
}

async fn mapping_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<MappingRequest>,
) -> Result<Json<MappingResponse>, ApiError> {
    let points = state
        .session
        .lock()
        .await
        .apply_column_mapping(&request.lat, &request.lng)?;
    Ok(Json(MappingResponse { points }))
}

#[derive(Deserialize)]
struct FilteringRequest {
    enabled: bool,
}

async fn filtering_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<FilteringRequest>,
) -> Json<SessionStatus> {
    let mut session = state.session.lock().await;
    session.set_filtering(request.enabled);
    Json(session.status())
}

async fn set_selection_handler(
    State(state): State<Arc<AppState>>,
    Json(rect): Json<SelectionRect>,
) -> Json<SessionStatus> {
    let mut session = state.session.lock().await;
    session.set_selection(rect);
    Json(session.status())
}

async fn clear_selection_handler(State(state): State<Arc<AppState>>) -> Json<SessionStatus> {
    let mut session = state.session.lock().await;
    session.clear_selection();
    Json(session.status())
}

#[derive(Deserialize, Default, Clone, Copy)]
#[serde(rename_all = "lowercase")]
enum PointView {
    All,
    Working,
    #[default]
    Visible,
}

#[derive(Deserialize)]
struct PointsQuery {
    #[serde(default)]
    view: PointView,
}

async fn points_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PointsQuery>,
) -> Json<Vec<Point>> {
    let session = state.session.lock().await;
    let points = match params.view {
        PointView::All => session.all_points(),
        PointView::Working => session.working_points(),
        PointView::Visible => session.visible_points(),
    };
    Json(points.to_vec())
}

async fn country_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<EnrichReport>, ApiError> {
    tokio::task::yield_now().await;
    let report = state.session.lock().await.enrich_countries()?;
    Ok(Json(report))
}

async fn utm_handler(State(state): State<Arc<AppState>>) -> Result<Json<BatchReport>, ApiError> {
    tokio::task::yield_now().await;
    let report = state.session.lock().await.add_utm()?;
    Ok(Json(report))
}

#[derive(Deserialize)]
struct ExportQuery {
    format: ExportFormat,
    #[serde(default)]
    allow_field_truncation: bool,
}

/// Download the working view as a file
async fn export_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ExportQuery>,
) -> Result<Response, ApiError> {
    let options = ExportOptions {
        allow_field_truncation: params.allow_field_truncation,
    };
    let bytes = state
        .session
        .lock()
        .await
        .export(params.format, &options)?;

    let headers = [
        (header::CONTENT_TYPE, params.format.content_type().to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", params.format.file_name()),
        ),
    ];
    Ok((headers, bytes).into_response())
}
