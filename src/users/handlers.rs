use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    Extension, Json,
};
use tracing::instrument;

use super::{
    dto::{
        LoginRequest, MessageResponse, ProtectedResponse, RegisterRequest, TokenResponse,
        UpdateUserRequest,
    },
    model::PublicUser,
    services, validate,
};
use crate::{auth::middleware::AuthUser, error::AppError, state::AppState};

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(v)| v)
        .map_err(|e| AppError::BadRequest(e.body_text()))
}

// A non-numeric id can never name a record.
fn user_id(path: Result<Path<i64>, PathRejection>) -> Result<i64, AppError> {
    path.map(|Path(id)| id).map_err(|_| AppError::NotFound)
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Json<PublicUser>, AppError> {
    let reg = validate::registration(body(payload)?)?;
    let user = services::register(&state, reg).await?;
    Ok(Json(user))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<TokenResponse>, AppError> {
    let creds = validate::login(body(payload)?)?;
    let token = services::login(&state, creds).await?;
    Ok(Json(TokenResponse { token }))
}

#[instrument(skip_all)]
pub async fn protected(Extension(AuthUser(user_id)): Extension<AuthUser>) -> Json<ProtectedResponse> {
    Json(ProtectedResponse {
        message: "Authenticated user",
        user_id,
    })
}

#[instrument(skip(state))]
pub async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<PublicUser>>, AppError> {
    Ok(Json(services::list(&state).await?))
}

#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<PublicUser>, AppError> {
    let id = user_id(path)?;
    Ok(Json(services::get(&state, id).await?))
}

#[instrument(skip(state, payload))]
pub async fn update_user(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> Result<Json<PublicUser>, AppError> {
    let id = user_id(path)?;
    Ok(Json(services::update(&state, id, body(payload)?).await?))
}

#[instrument(skip(state))]
pub async fn delete_user(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<MessageResponse>, AppError> {
    let id = user_id(path)?;
    services::delete(&state, id).await?;
    Ok(Json(MessageResponse {
        message: "User deleted successfully",
    }))
}
