//! HTTP API exposing the section and document tree to the console UI.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{
        sse::{self, Sse},
        IntoResponse, Response,
    },
    routing::{delete, get, post, put},
    Json, Router,
};
use docs_hub_core::breadcrumb::Breadcrumb;
use docs_hub_core::cascade::{DocumentDeletion, SectionDeletion};
use docs_hub_core::model::{Document, DocumentDraft, DocumentUpdate, Section, SectionUpdate};
use docs_hub_core::ordering::{Direction, OrderedList};
use docs_hub_core::tree::OutlineNode;
use docs_hub_core::{TreeError, TreeStore};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use uuid::Uuid;

/// Shared application state containing the tree store.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<TreeStore>,
}

#[derive(Serialize, Deserialize)]
pub struct SectionRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Serialize, Deserialize)]
pub struct MoveRequest {
    pub direction: Direction,
}

#[derive(Serialize, Deserialize)]
pub struct ParentRequest {
    pub parent_id: Option<Uuid>,
}

#[derive(Serialize, Deserialize)]
pub struct AssignRequest {
    pub section_id: Uuid,
}

#[derive(Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

/// A [`TreeError`] rendered as a status code plus one readable message.
pub struct ApiError(TreeError);

impl From<TreeError> for ApiError {
    fn from(err: TreeError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self.0 {
            TreeError::NotFound { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            TreeError::ScopeNotFound { .. } => (StatusCode::NOT_FOUND, "SCOPE_NOT_FOUND"),
            TreeError::InvalidParent(_) => (StatusCode::UNPROCESSABLE_ENTITY, "INVALID_PARENT"),
            TreeError::CycleDetected { .. } => (StatusCode::CONFLICT, "CYCLE_DETECTED"),
            TreeError::PersistenceFailure(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "PERSISTENCE_FAILURE")
            }
        };
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }
        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
                code: code.to_string(),
            }),
        )
            .into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

pub fn router(store: Arc<TreeStore>) -> Router {
    let state = AppState { store };
    Router::new()
        .route("/sections", get(list_sections).post(create_section))
        .route(
            "/sections/{id}",
            get(get_section).put(update_section).delete(delete_section),
        )
        .route("/sections/{id}/move", post(move_section))
        .route("/sections/{id}/documents", get(list_documents))
        .route("/sections/{id}/outline", get(document_outline))
        .route("/documents", post(create_document))
        .route(
            "/documents/{id}",
            get(get_document).put(update_document).delete(delete_document),
        )
        .route("/documents/{id}/move", post(move_document))
        .route("/documents/{id}/parent", put(reparent_document))
        .route("/documents/{id}/breadcrumb", get(resolve_breadcrumb))
        .route("/orphans", get(list_orphans))
        .route("/orphans/{id}", delete(discard_orphan))
        .route("/orphans/{id}/section", put(assign_orphan))
        .route("/events", get(event_stream))
        .layer(
            ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            ),
        )
        .with_state(state)
}

async fn list_sections(State(state): State<AppState>) -> ApiResult<Vec<Section>> {
    Ok(Json(state.store.list_sections().await?))
}

async fn create_section(
    State(state): State<AppState>,
    Json(req): Json<SectionRequest>,
) -> Result<(StatusCode, Json<Section>), ApiError> {
    let section = state.store.create_section(req.title, req.description).await?;
    Ok((StatusCode::CREATED, Json(section)))
}

async fn get_section(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Section> {
    Ok(Json(state.store.get_section(id).await?))
}

async fn update_section(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<SectionUpdate>,
) -> ApiResult<Section> {
    Ok(Json(state.store.update_section(id, req).await?))
}

async fn delete_section(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<SectionDeletion> {
    Ok(Json(state.store.delete_section(id).await?))
}

async fn move_section(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<MoveRequest>,
) -> ApiResult<OrderedList> {
    Ok(Json(state.store.move_section(id, req.direction).await?))
}

async fn list_documents(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<Document>> {
    Ok(Json(state.store.list_documents(id).await?))
}

async fn document_outline(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<OutlineNode>> {
    Ok(Json(state.store.document_outline(id).await?))
}

async fn create_document(
    State(state): State<AppState>,
    Json(req): Json<DocumentDraft>,
) -> Result<(StatusCode, Json<Document>), ApiError> {
    let doc = state.store.create_document(req).await?;
    Ok((StatusCode::CREATED, Json(doc)))
}

async fn get_document(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Document> {
    Ok(Json(state.store.get_document(id).await?))
}

async fn update_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<DocumentUpdate>,
) -> ApiResult<Document> {
    Ok(Json(state.store.update_document(id, req).await?))
}

async fn delete_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<DocumentDeletion> {
    Ok(Json(state.store.delete_document(id).await?))
}

async fn move_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<MoveRequest>,
) -> ApiResult<OrderedList> {
    Ok(Json(state.store.move_document(id, req.direction).await?))
}

async fn reparent_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<ParentRequest>,
) -> ApiResult<Document> {
    Ok(Json(state.store.reparent_document(id, req.parent_id).await?))
}

async fn resolve_breadcrumb(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Breadcrumb> {
    Ok(Json(state.store.resolve_breadcrumb(id).await?))
}

async fn list_orphans(State(state): State<AppState>) -> ApiResult<Vec<Document>> {
    Ok(Json(state.store.list_orphans().await?))
}

async fn assign_orphan(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<AssignRequest>,
) -> ApiResult<Document> {
    Ok(Json(state.store.assign_orphan(id, req.section_id).await?))
}

async fn discard_orphan(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<DocumentDeletion> {
    Ok(Json(state.store.discard_orphan(id).await?))
}

/// Server-sent events for every structural change; lets the console reload
/// on demand instead of polling.
async fn event_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<sse::Event, Infallible>>> {
    let rx = state.store.subscribe();
    let stream = tokio_stream::wrappers::BroadcastStream::new(rx).filter_map(|res| async move {
        match res {
            Ok(evt) => {
                let data = serde_json::to_string(&evt).ok()?;
                Some(Ok(sse::Event::default().data(data)))
            }
            Err(_) => None,
        }
    });
    Sse::new(stream).keep_alive(sse::KeepAlive::default())
}
