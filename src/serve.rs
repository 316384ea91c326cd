use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use log::{error, info};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc as StdArc, Mutex, MutexGuard};
use tower_http::cors::{Any, CorsLayer};

use crate::config::ViewerConfig;
use crate::constants::NO_EDITS_MESSAGE;
use crate::corpus::Corpus;
use crate::edits::{AnnotationKind, EditEntry, EditError, EditMap, EditStore};
use crate::export::{export_edits, export_on_session_end, prepare_export};
use crate::slot::{FileSlotStore, SlotStore};
use crate::view::{
    facet_options, list_profiles, list_records_with_page_size, ListQuery, ProfileCard,
    SentenceCard,
};

pub type SharedEditStore = EditStore<Box<dyn SlotStore>>;

// State shared by the viewer handlers
pub struct AppState {
    pub corpus: Corpus,
    pub store: Mutex<SharedEditStore>,
    pub page_size: usize,
    pub export_dir: PathBuf,
}

impl AppState {
    pub fn new(
        corpus: Corpus,
        store: SharedEditStore,
        page_size: usize,
        export_dir: PathBuf,
    ) -> Self {
        Self {
            corpus,
            store: Mutex::new(store),
            page_size,
            export_dir,
        }
    }

    /// Lock the edit store; one mutation runs at a time
    pub fn store(&self) -> MutexGuard<'_, SharedEditStore> {
        self.store.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Build the viewer API router
pub fn router(state: StdArc<AppState>, frontend_dir: Option<PathBuf>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/health", get(health_handler))
        .route("/api/records", get(records_handler))
        .route("/api/records/{id}", get(record_handler))
        .route("/api/profiles", get(profiles_handler))
        .route("/api/profiles/{id}", get(profile_handler))
        .route("/api/filters", get(filters_handler))
        .route("/api/edits", get(edits_handler))
        .route(
            "/api/edits/{id}/annotations",
            post(add_annotation_handler).delete(remove_annotation_handler),
        )
        .route(
            "/api/edits/export",
            get(export_download_handler).post(export_write_handler),
        );

    let app = with_frontend(api_routes, frontend_dir);
    app.layer(cors).with_state(state)
}

#[cfg(feature = "web-frontend")]
fn with_frontend(routes: Router<StdArc<AppState>>, dir: Option<PathBuf>) -> Router<StdArc<AppState>> {
    match dir {
        Some(dir) => routes.fallback_service(tower_http::services::ServeDir::new(dir)),
        None => routes,
    }
}

#[cfg(not(feature = "web-frontend"))]
fn with_frontend(routes: Router<StdArc<AppState>>, dir: Option<PathBuf>) -> Router<StdArc<AppState>> {
    if let Some(dir) = dir {
        log::warn!(
            "frontend_dir '{}' ignored: built without web-frontend",
            dir.display()
        );
    }
    routes
}

/// Serve the viewer API until Ctrl-C or SIGTERM, then run the session-end export
pub fn serve_viewer(
    config: ViewerConfig,
    corpus: Corpus,
    port: u16,
) -> Result<(), Box<dyn std::error::Error>> {
    let slots: Box<dyn SlotStore> = Box::new(FileSlotStore::new(&config.state_dir));
    let store = EditStore::open(slots);

    println!("Starting corpus viewer");
    println!("Records: {}", corpus.records().len());
    println!("Profiles: {}", corpus.profile_count());
    println!("Edited records: {}", store.edited_count());
    println!("Edit state: {}", config.state_dir.display());
    println!("Listening on: http://[::]:{} (IPv4 + IPv6)", port);
    println!("Endpoints:");
    println!("  GET    /health  - Health check");
    println!("  GET    /api/records  - Filtered, sorted page of sentence cards");
    println!("  GET    /api/records/:id  - One sentence card with its edit entry");
    println!("  GET    /api/profiles  - Filtered, sorted page of profile cards");
    println!("  GET    /api/profiles/:id  - One profile card");
    println!("  GET    /api/filters  - Filter option lists");
    println!("  GET    /api/edits  - Edited count and all edit entries");
    println!("  POST   /api/edits/:id/annotations  - Mark a word as booster or hedge");
    println!("  DELETE /api/edits/:id/annotations  - Unmark a word");
    println!("  GET    /api/edits/export  - Download all edits");
    println!("  POST   /api/edits/export  - Write all edits to the export directory");

    let export_on_shutdown = config.export_on_shutdown;
    let export_dir = config.export_dir().to_path_buf();
    let frontend_dir = config.frontend_dir.clone();

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let app_state = StdArc::new(AppState::new(
            corpus,
            store,
            config.page_size,
            export_dir,
        ));

        let listener = tokio::net::TcpListener::bind(format!("[::]:{}", port))
            .await
            .map_err(|e| format!("Failed to bind to port {}: {}", port, e))?;

        let backup = run_viewer(
            listener,
            app_state,
            frontend_dir,
            export_on_shutdown,
            shutdown_signal(),
        )
        .await
        .map_err(|e| format!("Server error: {}", e))?;

        if let Some(path) = backup {
            println!("Session backup written to {}", path.display());
        }

        Ok::<(), Box<dyn std::error::Error>>(())
    })
}

/// Serve on `listener` until `shutdown` resolves
///
/// When `export_on_shutdown` is set, the edits are then backed up into the
/// state's export directory; the path of that backup is returned.
pub async fn run_viewer<F>(
    listener: tokio::net::TcpListener,
    state: StdArc<AppState>,
    frontend_dir: Option<PathBuf>,
    export_on_shutdown: bool,
    shutdown: F,
) -> std::io::Result<Option<PathBuf>>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let app = router(state.clone(), frontend_dir);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    if !export_on_shutdown {
        return Ok(None);
    }
    let store = state.store();
    Ok(export_on_session_end(&*store, &state.export_dir))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
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
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Shutdown requested (Ctrl-C)"),
        _ = terminate => info!("Shutdown requested (SIGTERM)"),
    }
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({"error": message.into()}))).into_response()
}

fn edit_error_response(err: EditError) -> Response {
    let status = match &err {
        EditError::EmptyWord => StatusCode::BAD_REQUEST,
        EditError::NothingToExport => StatusCode::NOT_FOUND,
        EditError::Storage(_) | EditError::Serialization(_) => {
            error!("Edit operation failed: {}", err);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    error_response(status, err.to_string())
}

// Health check endpoint - returns 200 OK if server is running
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn records_handler(
    State(state): State<StdArc<AppState>>,
    Query(query): Query<ListQuery>,
) -> impl IntoResponse {
    let store = state.store();
    let page = list_records_with_page_size(&state.corpus, store.edits(), &query, state.page_size);
    Json(page)
}

#[derive(Serialize)]
struct RecordDetail {
    card: SentenceCard,
    entry: Option<EditEntry>,
}

async fn record_handler(
    State(state): State<StdArc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let record = match state.corpus.record(&id) {
        Some(record) => record,
        None => {
            return error_response(StatusCode::NOT_FOUND, format!("Record '{}' not found", id))
        }
    };
    let store = state.store();
    let detail = RecordDetail {
        card: SentenceCard::build(record, store.edits()),
        entry: store.entry(&id).cloned(),
    };
    Json(detail).into_response()
}

async fn profiles_handler(
    State(state): State<StdArc<AppState>>,
    Query(query): Query<ListQuery>,
) -> impl IntoResponse {
    Json(list_profiles(&state.corpus, &query, state.page_size))
}

async fn profile_handler(
    State(state): State<StdArc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.corpus.profile(&id) {
        Some(profile) => Json(ProfileCard::build(profile)).into_response(),
        None => error_response(StatusCode::NOT_FOUND, format!("Profile '{}' not found", id)),
    }
}

async fn filters_handler(State(state): State<StdArc<AppState>>) -> impl IntoResponse {
    Json(facet_options(state.corpus.records()))
}

#[derive(Serialize)]
struct EditsResponse<'a> {
    edited_count: usize,
    edits: &'a EditMap,
}

async fn edits_handler(State(state): State<StdArc<AppState>>) -> impl IntoResponse {
    let store = state.store();
    let response = Json(EditsResponse {
        edited_count: store.edited_count(),
        edits: store.edits(),
    })
    .into_response();
    response
}

#[derive(Deserialize)]
pub struct AddAnnotationRequest {
    pub word: String,
    pub kind: AnnotationKind,
}

#[derive(Deserialize)]
pub struct RemoveAnnotationRequest {
    pub word: String,
    #[serde(default)]
    pub kind: Option<AnnotationKind>,
}

#[derive(Serialize)]
struct MutationResponse {
    changed: bool,
    /// Kind the word held before the mutation
    previous_kind: Option<AnnotationKind>,
    edited_count: usize,
    entry: Option<EditEntry>,
    card: Option<SentenceCard>,
}

// Kind held before a mutation; records without an entry answer from their baseline
fn previous_kind(
    state: &AppState,
    store: &SharedEditStore,
    id: &str,
    word: &str,
) -> Option<AnnotationKind> {
    let word = word.trim();
    match store.entry(id) {
        Some(entry) => entry.kind_of(word),
        None => state.corpus.record(id).and_then(|record| {
            EditEntry::seeded(&record.original_boosters, &record.original_hedges).kind_of(word)
        }),
    }
}

fn mutation_response(
    state: &AppState,
    store: &SharedEditStore,
    id: &str,
    changed: bool,
    previous_kind: Option<AnnotationKind>,
) -> Response {
    let card = state
        .corpus
        .record(id)
        .map(|record| SentenceCard::build(record, store.edits()));
    Json(MutationResponse {
        changed,
        previous_kind,
        edited_count: store.edited_count(),
        entry: store.entry(id).cloned(),
        card,
    })
    .into_response()
}

async fn add_annotation_handler(
    State(state): State<StdArc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<AddAnnotationRequest>,
) -> impl IntoResponse {
    let mut store = state.store();
    let previous = previous_kind(&state, &store, &id, &request.word);
    match store.add_annotation(&state.corpus, &id, &request.word, request.kind) {
        Ok(changed) => mutation_response(&state, &store, &id, changed, previous),
        Err(e) => edit_error_response(e),
    }
}

async fn remove_annotation_handler(
    State(state): State<StdArc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<RemoveAnnotationRequest>,
) -> impl IntoResponse {
    let mut store = state.store();
    let previous = previous_kind(&state, &store, &id, &request.word);
    match store.remove_annotation(&id, &request.word, request.kind) {
        Ok(changed) => mutation_response(&state, &store, &id, changed, previous),
        Err(e) => edit_error_response(e),
    }
}

async fn export_download_handler(State(state): State<StdArc<AppState>>) -> impl IntoResponse {
    let store = state.store();
    match prepare_export(&*store) {
        Ok((filename, bytes)) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "application/json".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", filename),
                ),
            ],
            bytes,
        )
            .into_response(),
        Err(EditError::NothingToExport) => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"message": NO_EDITS_MESSAGE})),
        )
            .into_response(),
        Err(e) => edit_error_response(e),
    }
}

async fn export_write_handler(State(state): State<StdArc<AppState>>) -> impl IntoResponse {
    let store = state.store();
    match export_edits(&*store, &state.export_dir) {
        Ok(response) => Json(response).into_response(),
        Err(EditError::NothingToExport) => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"message": NO_EDITS_MESSAGE})),
        )
            .into_response(),
        Err(e) => edit_error_response(e),
    }
}
