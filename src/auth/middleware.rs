//! Bearer-token authorization for protected routes.

use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
    middleware::{self, Next},
    response::Response,
    Router,
};
use tracing::{debug, error, warn};
use uuid::Uuid;

use super::claims::{Capability, Role, TokenKind};
use crate::{error::AuthError, state::AppState, store::StoreError};

/// What a route demands from the caller's token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Guard {
    pub capability: Capability,
    pub kind: TokenKind,
}

impl Guard {
    pub const fn access(capability: Capability) -> Self {
        Self {
            capability,
            kind: TokenKind::Access,
        }
    }

    pub const fn refresh(capability: Capability) -> Self {
        Self {
            capability,
            kind: TokenKind::Refresh,
        }
    }
}

/// The authenticated caller, available to handlers behind a guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    pub expires_at: i64,
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Identity {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .cloned()
            .ok_or_else(|| AuthError::unauthorized("unauthorized"))
    }
}

/// Wraps every route of `router` with `guard`.
pub fn guarded(router: Router<AppState>, state: &AppState, guard: Guard) -> Router<AppState> {
    router.route_layer(middleware::from_fn_with_state(
        (state.clone(), guard),
        authorize,
    ))
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))?
        .trim();
    (!token.is_empty()).then_some(token)
}

pub async fn authorize(
    State((state, guard)): State<(AppState, Guard)>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let token = bearer_token(req.headers())
        .ok_or_else(|| AuthError::unauthorized("missing or malformed authorization header"))?;

    let claims = state.keys.verify_kind(token, guard.kind).map_err(|e| {
        debug!(error = %e, "token rejected");
        AuthError::unauthorized("invalid or expired token")
    })?;

    if !claims.role.can(guard.capability) {
        warn!(principal_id = %claims.sub, role = %claims.role, required = ?guard.capability, "insufficient permissions");
        return Err(AuthError::forbidden("insufficient permissions"));
    }

    // Admins carry no blocked flag.
    if claims.role == Role::User {
        match state.store.find_user_by_id(claims.sub).await {
            Ok(user) if user.is_blocked => {
                warn!(user_id = %user.id, "blocked user rejected");
                return Err(AuthError::forbidden("user is blocked"));
            }
            Ok(_) => {}
            Err(StoreError::NotFound) => {
                warn!(user_id = %claims.sub, "token for unknown user");
                return Err(AuthError::unauthorized("please try again"));
            }
            Err(e) => {
                error!(error = %e, user_id = %claims.sub, "user lookup failed");
                return Err(AuthError::unauthorized("please try again"));
            }
        }
    }

    req.extensions_mut().insert(Identity {
        id: claims.sub,
        email: claims.email,
        role: claims.role,
        expires_at: claims.exp,
    });
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        http::{Method, StatusCode},
        routing::get,
        Json,
    };
    use serde_json::{json, Value};

    use super::*;
    use crate::app::testing::call;
    use crate::auth::{dto::SignupRequest, service};
    use crate::{config::AppConfig, mail::testing::RecordingMailer, store::testing::FlakyStore};

    async fn whoami(identity: Identity) -> Json<Value> {
        Json(json!({ "id": identity.id, "role": identity.role }))
    }

    fn app(state: &AppState) -> Router {
        let user = guarded(
            Router::new().route("/user", get(whoami)),
            state,
            Guard::access(Capability::Read),
        );
        let admin = guarded(
            Router::new().route("/admin", get(whoami)),
            state,
            Guard::access(Capability::AdminRead),
        );
        let refresh = guarded(
            Router::new().route("/refresh", get(whoami)),
            state,
            Guard::refresh(Capability::Read),
        );
        user.merge(admin).merge(refresh).with_state(state.clone())
    }

    async fn user_token(state: &AppState) -> (Uuid, String) {
        let user = service::signup(
            state,
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
        let token = state.keys.sign_access(&user.email, user.id, Role::User).unwrap();
        (user.id, token)
    }

    #[test]
    fn bearer_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);
        headers.insert(AUTHORIZATION, "Bearer abc".parse().unwrap());
        assert_eq!(bearer_token(&headers), Some("abc"));
        headers.insert(AUTHORIZATION, "Token abc".parse().unwrap());
        assert_eq!(bearer_token(&headers), None);
        headers.insert(AUTHORIZATION, "Bearer ".parse().unwrap());
        assert_eq!(bearer_token(&headers), None);
    }

    #[tokio::test]
    async fn missing_or_bad_token_is_unauthorized() {
        let state = AppState::fake();
        let app = app(&state);

        let (status, body) = call(&app, Method::GET, "/user", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "UNAUTHORIZED");

        let (status, _) = call(&app, Method::GET, "/user", Some("not.a.jwt"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn valid_user_token_passes_identity() {
        let state = AppState::fake();
        let (id, token) = user_token(&state).await;

        let (status, body) = call(&app(&state), Method::GET, "/user", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], id.to_string());
        assert_eq!(body["role"], "user");
    }

    #[tokio::test]
    async fn token_kinds_are_not_interchangeable() {
        let state = AppState::fake();
        let (id, access) = user_token(&state).await;
        let refresh = state.keys.sign_refresh("a@x.com", id, Role::User).unwrap();
        let app = app(&state);

        let (status, _) = call(&app, Method::GET, "/user", Some(&refresh), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, _) = call(&app, Method::GET, "/refresh", Some(&access), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, _) = call(&app, Method::GET, "/refresh", Some(&refresh), None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn capabilities_gate_admin_routes() {
        let state = AppState::fake();
        let (_, user) = user_token(&state).await;
        let admin = state
            .keys
            .sign_access("root@x.com", Uuid::new_v4(), Role::Admin)
            .unwrap();
        let app = app(&state);

        let (status, body) = call(&app, Method::GET, "/admin", Some(&user), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["code"], "FORBIDDEN");

        // No admin row exists; admins skip the lookup.
        let (status, _) = call(&app, Method::GET, "/admin", Some(&admin), None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = call(&app, Method::GET, "/user", Some(&admin), None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn blocked_user_with_valid_token_is_forbidden() {
        let state = AppState::fake();
        let (id, token) = user_token(&state).await;
        state.store.set_user_blocked(id, true).await.unwrap();

        let (status, body) = call(&app(&state), Method::GET, "/user", Some(&token), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "user is blocked");
    }

    #[tokio::test]
    async fn deleted_user_is_unauthorized() {
        let state = AppState::fake();
        let (id, token) = user_token(&state).await;
        state.store.delete_user(id).await.unwrap();

        let (status, body) = call(&app(&state), Method::GET, "/user", Some(&token), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "please try again");
    }

    #[tokio::test]
    async fn store_outage_during_lookup_is_unauthorized() {
        let store = Arc::new(FlakyStore::default());
        let state = AppState::from_parts(
            store.clone(),
            Arc::new(RecordingMailer::default()),
            Arc::new(AppConfig::for_tests()),
        )
        .unwrap();
        let (_, token) = user_token(&state).await;
        store.fail_user_lookup(true);

        let (status, body) = call(&app(&state), Method::GET, "/user", Some(&token), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "please try again");
        assert!(!body.to_string().contains("db down"));

        store.fail_user_lookup(false);
        let (status, _) = call(&app(&state), Method::GET, "/user", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
    }
}
