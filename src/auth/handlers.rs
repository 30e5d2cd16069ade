use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument, warn};

use super::{
    claims::{Capability, Role},
    dto::{
        ConfirmResetRequest, EmailRequest, LoginRequest, LoginResponse, MessageResponse,
        PublicAdmin, PublicUser, RefreshResponse, SignupRequest, SignupResponse,
    },
    jwt::JwtKeys,
    lifecycle,
    middleware::{guarded, Guard, Identity},
    service,
};
use crate::{error::AuthError, state::AppState};

pub fn auth_routes(state: &AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/admin/login", post(admin_login))
        .route("/verify-email/:token", get(verify_email))
        .route("/resend-verification", post(resend_verification))
        .route("/reset-password", post(request_password_reset))
        .route("/confirm-reset-password", post(confirm_password_reset));

    let refresh = guarded(
        Router::new().route("/refresh", get(refresh)),
        state,
        Guard::refresh(Capability::Read),
    );
    let session = guarded(
        Router::new().route("/logout", post(logout)),
        state,
        Guard::access(Capability::Read),
    );

    public.merge(refresh).merge(session)
}

#[instrument(skip(state, payload))]
pub async fn signup(
    State(state): State<AppState>,
    Json(payload): Json<SignupRequest>,
) -> Result<(StatusCode, Json<SignupResponse>), AuthError> {
    let user = service::signup(&state, payload).await?;
    let message = if user.is_verified {
        "user created successfully"
    } else {
        "user created successfully, check your email to verify your account"
    };
    Ok((
        StatusCode::CREATED,
        Json(SignupResponse {
            message,
            user: PublicUser::from(&user),
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse<PublicUser>>, AuthError> {
    let user = service::login(&state, &payload.email, &payload.password).await?;
    if user.is_blocked {
        warn!(user_id = %user.id, "blocked user login");
        return Err(AuthError::Blocked);
    }

    let access_token = state.keys.sign_access(&user.email, user.id, Role::User)?;
    let refresh_token = state.keys.sign_refresh(&user.email, user.id, Role::User)?;

    info!(user_id = %user.id, "user logged in");
    Ok(Json(LoginResponse {
        message: "login successful",
        access_token,
        refresh_token,
        user: PublicUser::from(&user),
    }))
}

#[instrument(skip(state, payload))]
pub async fn admin_login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse<PublicAdmin>>, AuthError> {
    let admin = service::admin_login(&state, &payload.email, &payload.password).await?;

    let access_token = state.keys.sign_access(&admin.email, admin.id, Role::Admin)?;
    let refresh_token = state.keys.sign_refresh(&admin.email, admin.id, Role::Admin)?;

    info!(admin_id = %admin.id, "admin logged in");
    Ok(Json(LoginResponse {
        message: "login successful",
        access_token,
        refresh_token,
        user: PublicAdmin::from(&admin),
    }))
}

pub async fn verify_email(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<MessageResponse>, AuthError> {
    lifecycle::verify_email(&state, &token).await?;
    Ok(Json(MessageResponse {
        message: "email verified successfully",
    }))
}

pub async fn resend_verification(
    State(state): State<AppState>,
    Json(payload): Json<EmailRequest>,
) -> Result<Json<MessageResponse>, AuthError> {
    lifecycle::resend_verification(&state, &payload.email).await?;
    Ok(Json(MessageResponse {
        message: "verification email sent",
    }))
}

pub async fn request_password_reset(
    State(state): State<AppState>,
    Json(payload): Json<EmailRequest>,
) -> Result<Json<MessageResponse>, AuthError> {
    lifecycle::request_password_reset(&state, &payload.email).await?;
    Ok(Json(MessageResponse {
        message: "password reset email sent",
    }))
}

pub async fn confirm_password_reset(
    State(state): State<AppState>,
    Json(payload): Json<ConfirmResetRequest>,
) -> Result<Json<MessageResponse>, AuthError> {
    lifecycle::confirm_password_reset(&state, &payload.token, &payload.new_password).await?;
    Ok(Json(MessageResponse {
        message: "password reset successfully",
    }))
}

/// Trades a refresh token for a fresh access token.
pub async fn refresh(
    State(keys): State<JwtKeys>,
    identity: Identity,
) -> Result<Json<RefreshResponse>, AuthError> {
    let token = keys.sign_access(&identity.email, identity.id, identity.role)?;
    Ok(Json(RefreshResponse { token }))
}

pub async fn logout(identity: Identity) -> Result<Json<MessageResponse>, AuthError> {
    service::logout(identity.id).await?;
    Ok(Json(MessageResponse {
        message: "logged out successfully",
    }))
}
