use axum::{
    extract::{Query, State},
    routing::{get, post, put},
    Json, Router,
};
use tracing::{info, instrument};

use super::dto::{
    validate_image_url, ImageQuery, PictureResponse, ProfileResponse, UpdateProfileRequest,
};
use crate::{
    auth::{
        claims::Capability,
        dto::MessageResponse,
        middleware::{guarded, Guard, Identity},
    },
    error::AuthError,
    state::AppState,
};

pub fn read_routes(state: &AppState) -> Router<AppState> {
    guarded(
        Router::new().route("/profile", get(get_profile)),
        state,
        Guard::access(Capability::Read),
    )
}

pub fn write_routes(state: &AppState) -> Router<AppState> {
    guarded(
        Router::new()
            .route("/update", put(update_profile))
            .route("/upload-profile-picture", post(upload_profile_picture)),
        state,
        Guard::access(Capability::Write),
    )
}

#[instrument(skip(state, identity), fields(user_id = %identity.id))]
pub async fn get_profile(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<Json<ProfileResponse>, AuthError> {
    let user = state.store.find_user_by_id(identity.id).await?;
    Ok(Json(ProfileResponse { user }))
}

#[instrument(skip(state, identity, payload), fields(user_id = %identity.id))]
pub async fn update_profile(
    State(state): State<AppState>,
    identity: Identity,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<MessageResponse>, AuthError> {
    let mut user = state.store.find_user_by_id(identity.id).await?;
    payload.apply(&mut user)?;
    state.store.update_user(&user).await?;

    info!("profile updated");
    Ok(Json(MessageResponse {
        message: "profile updated successfully",
    }))
}

#[instrument(skip(state, identity, query), fields(user_id = %identity.id))]
pub async fn upload_profile_picture(
    State(state): State<AppState>,
    identity: Identity,
    Query(query): Query<ImageQuery>,
) -> Result<Json<PictureResponse>, AuthError> {
    let url = validate_image_url(query.image_url.as_deref().unwrap_or_default())?;

    let mut user = state.store.find_user_by_id(identity.id).await?;
    user.image_url = Some(url.clone());
    state.store.update_user(&user).await?;

    info!("profile picture set");
    Ok(Json(PictureResponse {
        message: "profile picture uploaded successfully",
        url,
    }))
}
