//! Route table and request handlers for `/users` and `/health`.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path as AxumPath, Query, State,
    },
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use std::sync::{Arc, Mutex, MutexGuard};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::envelope::{
    now_timestamp, ApiError, ApiErrorBody, ApiResponse, HealthRes, UserEnvelope,
    UserListEnvelope, EMPTY_PATCH,
};
use usuarios_core::{constants::SERVICE_NAME, User, UserCriteria, UserDraft, UserId, UserStore};

/// Application state shared across REST API handlers.
///
/// Holds the single store instance. Every handler takes the lock once and keeps it for the whole
/// "mutate + persist" step, so concurrent requests never interleave inside the store.
#[derive(Clone)]
pub struct AppState {
    store: Arc<Mutex<UserStore>>,
}

impl AppState {
    pub fn new(store: UserStore) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
        }
    }

    /// Handle to the shared store, for teardown after the server stops.
    pub fn store(&self) -> Arc<Mutex<UserStore>> {
        self.store.clone()
    }

    fn lock(&self) -> Result<MutexGuard<'_, UserStore>, ApiError> {
        self.store.lock().map_err(|_| {
            tracing::error!("user store lock is poisoned");
            ApiError::Internal
        })
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        list_users,
        get_user,
        create_user,
        update_user,
        patch_user,
        delete_user,
    ),
    components(schemas(
        HealthRes,
        User,
        UserDraft,
        ApiErrorBody,
        UserEnvelope,
        UserListEnvelope,
    ))
)]
pub struct ApiDoc;

/// Builds the full REST application: routes, OpenAPI docs, CORS and request tracing.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/users", get(list_users).post(create_user))
        .route(
            "/users/:id",
            get(get_user)
                .put(update_user)
                .patch(patch_user)
                .delete(delete_user),
        )
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .fallback(route_not_found)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Rejects path ids outside the generator's alphabet before the store is consulted.
fn parse_id(id: &str) -> Result<UserId, ApiError> {
    UserId::parse(id).map_err(|_| ApiError::InvalidId)
}

/// Unpacks a JSON body, reporting malformed input as a validation failure.
fn draft_from(body: Result<Json<UserDraft>, JsonRejection>) -> Result<UserDraft, ApiError> {
    body.map(|Json(draft)| draft).map_err(|rejection| {
        tracing::debug!("rejected request body: {}", rejection.body_text());
        ApiError::invalid_user(vec![rejection.body_text()])
    })
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint for the REST API
///
/// Used for monitoring and load balancer health checks. Does not touch the store.
#[axum::debug_handler]
async fn health() -> Json<HealthRes> {
    Json(HealthRes {
        status: "OK".into(),
        timestamp: now_timestamp(),
        service: SERVICE_NAME.into(),
    })
}

#[utoipa::path(
    get,
    path = "/users",
    params(UserCriteria),
    responses(
        (status = 200, description = "Users matching every supplied filter", body = UserListEnvelope),
        (status = 400, description = "Malformed filter", body = ApiErrorBody),
        (status = 500, description = "Internal server error", body = ApiErrorBody)
    )
)]
/// List users, optionally filtered
///
/// With no query parameters every user is returned in insertion order. Each supplied parameter
/// must match the stored field exactly.
///
/// # Errors
/// Returns `400 VALIDATION_ERROR` if a parameter cannot be parsed (for example a non-numeric
/// `edad`).
#[axum::debug_handler]
async fn list_users(
    State(state): State<AppState>,
    criteria: Result<Query<UserCriteria>, QueryRejection>,
) -> Result<Json<ApiResponse<Vec<User>>>, ApiError> {
    let Query(criteria) =
        criteria.map_err(|rejection| ApiError::invalid_user(vec![rejection.body_text()]))?;

    let store = state.lock()?;
    let users = if criteria.is_empty() {
        store.list()
    } else {
        store.find(&criteria)
    };

    Ok(Json(ApiResponse::ok(users)))
}

#[utoipa::path(
    get,
    path = "/users/{id}",
    params(("id" = String, Path, description = "User identifier ([A-Z0-9]+)")),
    responses(
        (status = 200, description = "User found", body = UserEnvelope),
        (status = 400, description = "Invalid id", body = ApiErrorBody),
        (status = 404, description = "User not found", body = ApiErrorBody)
    )
)]
/// Get a user by id
#[axum::debug_handler]
async fn get_user(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
) -> Result<Json<ApiResponse<User>>, ApiError> {
    let id = parse_id(&id)?;

    let user = state
        .lock()?
        .get_by_id(id.as_str())
        .ok_or(ApiError::UserNotFound)?;

    Ok(Json(ApiResponse::ok(user)))
}

#[utoipa::path(
    post,
    path = "/users",
    request_body = UserDraft,
    responses(
        (status = 201, description = "User created", body = UserEnvelope),
        (status = 400, description = "Validation failed", body = ApiErrorBody),
        (status = 500, description = "Internal server error", body = ApiErrorBody)
    )
)]
/// Create a new user
///
/// Every field is required. The identifier is assigned by the store; an `id` in the body is
/// ignored.
///
/// # Errors
/// Returns `400 VALIDATION_ERROR` with one message per failed rule, or `500 INTERNAL_ERROR` if
/// the user file cannot be written.
#[axum::debug_handler]
async fn create_user(
    State(state): State<AppState>,
    body: Result<Json<UserDraft>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<User>>), ApiError> {
    let new_user = draft_from(body)?
        .into_new_user()
        .map_err(ApiError::invalid_user)?;

    let user = state.lock()?.create(new_user)?;
    tracing::info!("created user {}", user.id);

    Ok((StatusCode::CREATED, Json(ApiResponse::ok(user))))
}

#[utoipa::path(
    put,
    path = "/users/{id}",
    params(("id" = String, Path, description = "User identifier ([A-Z0-9]+)")),
    request_body = UserDraft,
    responses(
        (status = 200, description = "User replaced", body = UserEnvelope),
        (status = 400, description = "Invalid id or validation failed", body = ApiErrorBody),
        (status = 404, description = "User not found", body = ApiErrorBody),
        (status = 500, description = "Internal server error", body = ApiErrorBody)
    )
)]
/// Replace every field of an existing user
///
/// Never creates a user: an unknown id is `404 USER_NOT_FOUND`.
#[axum::debug_handler]
async fn update_user(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
    body: Result<Json<UserDraft>, JsonRejection>,
) -> Result<Json<ApiResponse<User>>, ApiError> {
    let id = parse_id(&id)?;
    let new_user = draft_from(body)?
        .into_new_user()
        .map_err(ApiError::invalid_user)?;

    let user = state
        .lock()?
        .update(id.as_str(), new_user)?
        .ok_or(ApiError::UserNotFound)?;

    Ok(Json(ApiResponse::ok(user)))
}

#[utoipa::path(
    patch,
    path = "/users/{id}",
    params(("id" = String, Path, description = "User identifier ([A-Z0-9]+)")),
    request_body = UserDraft,
    responses(
        (status = 200, description = "User updated", body = UserEnvelope),
        (status = 400, description = "Invalid id, empty body or validation failed", body = ApiErrorBody),
        (status = 404, description = "User not found", body = ApiErrorBody),
        (status = 500, description = "Internal server error", body = ApiErrorBody)
    )
)]
/// Update only the supplied fields of an existing user
///
/// # Errors
/// Returns `400 VALIDATION_ERROR` if the body carries no recognised field, or if any supplied
/// field fails its rule.
#[axum::debug_handler]
async fn patch_user(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
    body: Result<Json<UserDraft>, JsonRejection>,
) -> Result<Json<ApiResponse<User>>, ApiError> {
    let id = parse_id(&id)?;
    let draft = draft_from(body)?;

    if draft.is_empty() {
        return Err(ApiError::Validation {
            message: EMPTY_PATCH,
            details: None,
        });
    }

    let patch = draft.into_patch().map_err(ApiError::invalid_user)?;

    let user = state
        .lock()?
        .partial_update(id.as_str(), patch)?
        .ok_or(ApiError::UserNotFound)?;

    Ok(Json(ApiResponse::ok(user)))
}

#[utoipa::path(
    delete,
    path = "/users/{id}",
    params(("id" = String, Path, description = "User identifier ([A-Z0-9]+)")),
    responses(
        (status = 200, description = "User deleted; `data` is null"),
        (status = 400, description = "Invalid id", body = ApiErrorBody),
        (status = 404, description = "User not found", body = ApiErrorBody),
        (status = 500, description = "Internal server error", body = ApiErrorBody)
    )
)]
/// Delete a user
#[axum::debug_handler]
async fn delete_user(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    let id = parse_id(&id)?;

    if !state.lock()?.delete(id.as_str())? {
        return Err(ApiError::UserNotFound);
    }
    tracing::info!("deleted user {}", id);

    Ok(Json(ApiResponse::ok(())))
}

async fn route_not_found() -> ApiError {
    ApiError::RouteNotFound
}
