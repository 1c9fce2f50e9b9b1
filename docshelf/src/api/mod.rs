//! HTTP API layer exposing the node, sharing, and follow endpoints.

use axum::{
    extract::{FromRequestParts, Path, Query, State},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use docshelf_core::caps::ActorContext;
use docshelf_core::error::EngineError;
use docshelf_core::follow::{FollowConfig, FollowedDocument, Follower};
use docshelf_core::model::{FileCategory, Node, NodeStatus};
use docshelf_core::nav::{matches, FilterState};
use docshelf_core::services::{
    CreateNode, FollowService, NodePatch, NodeService, ShareRecord, ShareService,
};
use docshelf_core::store::MemoryStore;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<MemoryStore>,
}

/// Actor identity extracted from request headers. `X-User-Id` is required;
/// `X-Delegated` and `X-Grants` (a JSON grant blob) shape capability
/// resolution. A malformed grant blob resolves to no capabilities rather
/// than rejecting the request.
pub struct Actor(pub ActorContext);

impl FromRequestParts<AppState> for Actor {
    type Rejection = StatusCode;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let headers = &parts.headers;
        let user_id = headers
            .get("X-User-Id")
            .and_then(|v| v.to_str().ok())
            .ok_or(StatusCode::UNAUTHORIZED)?;
        let email = headers
            .get("X-User-Email")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        let delegated = headers
            .get("X-Delegated")
            .and_then(|v| v.to_str().ok())
            .map(|s| s == "true" || s == "1")
            .unwrap_or(false);
        let grants = headers
            .get("X-Grants")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| serde_json::from_str::<serde_json::Value>(s).ok());

        let mut session = json!({
            "user_id": user_id,
            "email": email,
            "delegated": delegated,
        });
        if let Some(grants) = grants {
            session["grants"] = grants;
        }
        let actor = ActorContext::from_session(&session);
        if actor.user_id.is_nil() {
            return Err(StatusCode::UNAUTHORIZED);
        }
        Ok(Self(actor))
    }
}

/// Maps engine errors onto HTTP statuses: validation failures are 400,
/// subscription conflicts 409, authorization refusals 403.
pub struct ApiError(EngineError);

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            EngineError::NotFound(_) | EngineError::UnknownEmail(_) => StatusCode::NOT_FOUND,
            EngineError::NotAFolder
            | EngineError::MoveIntoSelf
            | EngineError::MoveIntoDescendant
            | EngineError::NotAFile
            | EngineError::AlertWindowOutOfRange { .. } => StatusCode::BAD_REQUEST,
            EngineError::AlreadyFollowing
            | EngineError::NotFollowing
            | EngineError::OwnerUnfollow => StatusCode::CONFLICT,
            EngineError::NotOwner | EngineError::PermissionDenied => StatusCode::FORBIDDEN,
            EngineError::Service(err) => {
                warn!(%err, "internal service error");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

#[derive(Deserialize)]
struct ListParams {
    parent: Option<Uuid>,
}

#[derive(Deserialize)]
struct MoveRequest {
    target: Option<Uuid>,
}

#[derive(Deserialize, Default)]
struct FileFilterParams {
    q: Option<String>,
    status: Option<NodeStatus>,
    category: Option<FileCategory>,
}

#[derive(Deserialize)]
struct ShareRequest {
    email: String,
    #[serde(default)]
    allow_editing: bool,
}

#[derive(Deserialize, Default)]
struct FollowRequest {
    days_before_alert: Option<u16>,
    alert_on_due_date: Option<bool>,
}

impl FollowRequest {
    fn config(&self) -> Result<FollowConfig, EngineError> {
        let defaults = FollowConfig::default();
        FollowConfig::new(
            self.days_before_alert.unwrap_or(defaults.days_before_alert),
            self.alert_on_due_date.unwrap_or(defaults.alert_on_due_date),
        )
    }
}

#[derive(Deserialize)]
struct AddFollowerRequest {
    email: String,
    #[serde(flatten)]
    config: FollowRequest,
}

#[derive(Deserialize)]
struct AccountRequest {
    email: String,
    user_id: Uuid,
}

#[derive(Serialize)]
struct Deleted {
    id: Uuid,
}

pub fn router(store: Arc<MemoryStore>) -> Router {
    let state = AppState { store };
    Router::new()
        .route("/nodes", get(list_nodes).post(create_node))
        .route(
            "/nodes/{id}",
            get(get_node).put(update_node).delete(delete_node),
        )
        .route("/nodes/{id}/move", put(move_node))
        .route(
            "/nodes/{id}/shares",
            get(list_shares).post(create_share),
        )
        .route(
            "/nodes/{id}/follow",
            post(follow).put(reconfigure_follow).delete(unfollow),
        )
        .route(
            "/nodes/{id}/followers",
            get(list_followers).post(add_follower),
        )
        .route("/files", get(list_files))
        .route("/folders", get(list_folders))
        .route("/shared", get(shared_with_me))
        .route("/followed", get(followed_documents))
        .route("/accounts", post(register_account))
        .with_state(state)
}

async fn create_node(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Json(req): Json<CreateNode>,
) -> ApiResult<(StatusCode, Json<Node>)> {
    let node = state.store.create(&actor, req).await?;
    Ok((StatusCode::CREATED, Json(node)))
}

async fn get_node(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Node>> {
    Ok(Json(state.store.get(&actor, id).await?))
}

async fn list_nodes(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<Vec<Node>>> {
    Ok(Json(state.store.list(&actor, params.parent).await?))
}

async fn update_node(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<Uuid>,
    Json(patch): Json<NodePatch>,
) -> ApiResult<Json<Node>> {
    Ok(Json(state.store.update(&actor, id, patch).await?))
}

async fn delete_node(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Deleted>> {
    state.store.delete(&actor, id).await?;
    Ok(Json(Deleted { id }))
}

async fn move_node(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<Uuid>,
    Json(req): Json<MoveRequest>,
) -> ApiResult<Json<Node>> {
    Ok(Json(state.store.move_node(&actor, id, req.target).await?))
}

async fn list_files(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Query(params): Query<FileFilterParams>,
) -> ApiResult<Json<Vec<Node>>> {
    let filter = FilterState {
        search_term: params.q.unwrap_or_default(),
        status: params.status,
        category: params.category,
    };
    let mut files = state.store.all_files(&actor).await?;
    files.retain(|n| matches(n, &filter));
    Ok(Json(files))
}

async fn list_folders(
    State(state): State<AppState>,
    Actor(actor): Actor,
) -> ApiResult<Json<Vec<Node>>> {
    Ok(Json(state.store.folders(&actor).await?))
}

async fn list_shares(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<ShareRecord>>> {
    Ok(Json(state.store.shares_of(&actor, id).await?))
}

async fn create_share(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<Uuid>,
    Json(req): Json<ShareRequest>,
) -> ApiResult<(StatusCode, Json<ShareRecord>)> {
    let record = state
        .store
        .create_share(&actor, id, &req.email, req.allow_editing)
        .await?;
    Ok((StatusCode::CREATED, Json(record)))
}

async fn shared_with_me(
    State(state): State<AppState>,
    Actor(actor): Actor,
) -> ApiResult<Json<Vec<Node>>> {
    Ok(Json(state.store.shared_with_me(&actor).await?))
}

async fn follow(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<Uuid>,
    Json(req): Json<FollowRequest>,
) -> ApiResult<(StatusCode, Json<Follower>)> {
    let follower = state.store.follow(&actor, id, req.config()?).await?;
    Ok((StatusCode::CREATED, Json(follower)))
}

async fn unfollow(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.store.unfollow(&actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn reconfigure_follow(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<Uuid>,
    Json(req): Json<FollowRequest>,
) -> ApiResult<Json<Follower>> {
    Ok(Json(state.store.reconfigure(&actor, id, req.config()?).await?))
}

async fn list_followers(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<Follower>>> {
    Ok(Json(state.store.followers(&actor, id).await?))
}

async fn add_follower(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<Uuid>,
    Json(req): Json<AddFollowerRequest>,
) -> ApiResult<(StatusCode, Json<Follower>)> {
    let follower = state
        .store
        .add_follower_by_email(&actor, id, &req.email, req.config.config()?)
        .await?;
    Ok((StatusCode::CREATED, Json(follower)))
}

async fn followed_documents(
    State(state): State<AppState>,
    Actor(actor): Actor,
) -> ApiResult<Json<Vec<FollowedDocument>>> {
    Ok(Json(state.store.followed_documents(&actor).await?))
}

async fn register_account(
    State(state): State<AppState>,
    Json(req): Json<AccountRequest>,
) -> StatusCode {
    state.store.register_account(req.email, req.user_id).await;
    StatusCode::CREATED
}
