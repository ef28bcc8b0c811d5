use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument};

use crate::{
    auth::{
        dto::{
            LoginRequest, LoginResponse, MessageResponse, ProfileUpdateRequest, PublicUser,
            SignupRequest,
        },
        extractors::AuthUser,
        services::AuthService,
    },
    error::AppError,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/logout", post(logout))
}

pub fn session_routes() -> Router<AppState> {
    Router::new()
        .route("/private", get(private))
        .route("/me", get(get_me).patch(update_me))
}

#[instrument(skip(service, payload))]
pub async fn signup(
    State(service): State<AuthService>,
    Json(payload): Json<SignupRequest>,
) -> Result<(StatusCode, Json<PublicUser>), AppError> {
    let user = service.signup(payload).await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

#[instrument(skip(service, payload))]
pub async fn login(
    State(service): State<AuthService>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let identifier = payload.login_identifier().unwrap_or_default();
    let password = payload.password.as_deref().unwrap_or_default();
    let (token, user) = service.login(identifier, password).await?;
    Ok(Json(LoginResponse {
        message: "Login successful".into(),
        token,
        user: user.into(),
    }))
}

/// Tokens are stateless; the client must discard its copy.
#[instrument(skip_all, fields(user_id = user.id))]
pub async fn logout(AuthUser(user): AuthUser) -> Json<MessageResponse> {
    info!("logout requested");
    Json(MessageResponse {
        message: "Logged out. Discard your token; it stays valid until it expires.".into(),
    })
}

#[instrument(skip_all, fields(user_id = user.id))]
pub async fn private(AuthUser(user): AuthUser) -> Json<MessageResponse> {
    Json(MessageResponse {
        message: format!("Welcome back {}!", user.username),
    })
}

#[instrument(skip_all, fields(user_id = user.id))]
pub async fn get_me(AuthUser(user): AuthUser) -> Json<PublicUser> {
    Json(user.into())
}

#[instrument(skip_all, fields(user_id = user.id))]
pub async fn update_me(
    State(service): State<AuthService>,
    AuthUser(user): AuthUser,
    Json(payload): Json<ProfileUpdateRequest>,
) -> Result<Json<PublicUser>, AppError> {
    let user = service.update_profile(user, payload.profile_photo).await?;
    Ok(Json(user.into()))
}
