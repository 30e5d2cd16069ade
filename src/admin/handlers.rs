use axum::{
    extract::{Query, State},
    routing::{delete, get, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::{
    auth::{
        claims::Capability,
        dto::MessageResponse,
        middleware::{guarded, Guard, Identity},
    },
    error::AuthError,
    state::AppState,
    store::User,
};

#[derive(Debug, Deserialize)]
pub struct UserIdQuery {
    #[serde(default)]
    pub id: Option<String>,
}

impl UserIdQuery {
    fn parse(&self) -> Result<Uuid, AuthError> {
        let raw = self
            .id
            .as_deref()
            .ok_or_else(|| AuthError::invalid_input("user id is required"))?;
        Uuid::parse_str(raw).map_err(|_| AuthError::invalid_input("invalid user id"))
    }
}

#[derive(Debug, Serialize)]
pub struct UserListResponse {
    pub users: Vec<User>,
}

pub fn read_routes(state: &AppState) -> Router<AppState> {
    guarded(
        Router::new().route("/users", get(list_users)),
        state,
        Guard::access(Capability::AdminRead),
    )
}

pub fn write_routes(state: &AppState) -> Router<AppState> {
    guarded(
        Router::new()
            .route("/users", delete(delete_user))
            .route("/users/block", put(block_user))
            .route("/users/unblock", put(unblock_user)),
        state,
        Guard::access(Capability::AdminWrite),
    )
}

#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn list_users(
    State(state): State<AppState>,
    admin: Identity,
) -> Result<Json<UserListResponse>, AuthError> {
    let users = state.store.list_users().await?;
    debug!(count = users.len(), "users listed");
    Ok(Json(UserListResponse { users }))
}

#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn delete_user(
    State(state): State<AppState>,
    admin: Identity,
    Query(query): Query<UserIdQuery>,
) -> Result<Json<MessageResponse>, AuthError> {
    let id = query.parse()?;
    state.store.delete_user(id).await?;
    info!(user_id = %id, "user deleted");
    Ok(Json(MessageResponse {
        message: "user deleted successfully",
    }))
}

#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn block_user(
    State(state): State<AppState>,
    admin: Identity,
    Query(query): Query<UserIdQuery>,
) -> Result<Json<MessageResponse>, AuthError> {
    set_blocked(&state, query.parse()?, true).await?;
    Ok(Json(MessageResponse {
        message: "user blocked successfully",
    }))
}

#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn unblock_user(
    State(state): State<AppState>,
    admin: Identity,
    Query(query): Query<UserIdQuery>,
) -> Result<Json<MessageResponse>, AuthError> {
    set_blocked(&state, query.parse()?, false).await?;
    Ok(Json(MessageResponse {
        message: "user unblocked successfully",
    }))
}

async fn set_blocked(state: &AppState, id: Uuid, blocked: bool) -> Result<(), AuthError> {
    state.store.set_user_blocked(id, blocked).await?;
    info!(user_id = %id, blocked, "block status changed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    use crate::{
        app::{build_app, testing::call},
        auth::{claims::Role, dto::SignupRequest, service},
        state::AppState,
    };

    use super::*;

    async fn seeded() -> (AppState, Uuid, String, String) {
        let state = AppState::fake();
        let user = service::signup(
            &state,
            SignupRequest {
                email: "a@x.com".into(),
                password: "Secur3!pass".into(),
                name: None,
                age: None,
                gender: None,
                address: None,
                phone_number: None,
            },
        )
        .await
        .unwrap();
        let user_token = state.keys.sign_access(&user.email, user.id, Role::User).unwrap();
        let admin_token = state
            .keys
            .sign_access("root@x.com", Uuid::new_v4(), Role::Admin)
            .unwrap();
        (state, user.id, user_token, admin_token)
    }

    #[tokio::test]
    async fn users_cannot_reach_admin_routes() {
        let (state, id, user_token, _) = seeded().await;
        let app = build_app(state);

        let (status, _) = call(&app, Method::GET, "/api/admin/users", Some(&user_token), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let uri = format!("/api/admin/users/block?id={id}");
        let (status, _) = call(&app, Method::PUT, &uri, Some(&user_token), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn block_unblock_cycle() {
        let (state, id, user_token, admin_token) = seeded().await;
        let app = build_app(state);

        let (status, body) =
            call(&app, Method::GET, "/api/admin/users", Some(&admin_token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["users"].as_array().unwrap().len(), 1);

        let uri = format!("/api/admin/users/block?id={id}");
        let (status, _) = call(&app, Method::PUT, &uri, Some(&admin_token), None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = call(&app, Method::GET, "/api/user/profile", Some(&user_token), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, body) = call(
            &app,
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": "a@x.com", "password": "Secur3!pass" })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["code"], "BLOCKED");

        let uri = format!("/api/admin/users/unblock?id={id}");
        let (status, _) = call(&app, Method::PUT, &uri, Some(&admin_token), None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = call(&app, Method::GET, "/api/user/profile", Some(&user_token), None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn delete_user_and_bad_ids() {
        let (state, id, user_token, admin_token) = seeded().await;
        let app = build_app(state);

        let (status, _) = call(&app, Method::DELETE, "/api/admin/users?id=nope", Some(&admin_token), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = call(&app, Method::DELETE, "/api/admin/users", Some(&admin_token), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let uri = format!("/api/admin/users?id={id}");
        let (status, _) = call(&app, Method::DELETE, &uri, Some(&admin_token), None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = call(&app, Method::DELETE, &uri, Some(&admin_token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = call(&app, Method::GET, "/api/user/profile", Some(&user_token), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
