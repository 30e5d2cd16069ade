//! Signup, login and logout against the credential store.

use time::{Duration, OffsetDateTime};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{
    dto::{is_valid_email, normalize_email, SignupRequest},
    lifecycle::generate_token,
};
use crate::{
    error::AuthError,
    state::AppState,
    store::{Admin, NewAdmin, NewUser, StoreError, User},
};

#[instrument(skip(state, req), fields(email = %req.email))]
pub async fn signup(state: &AppState, mut req: SignupRequest) -> Result<User, AuthError> {
    req.validate()?;

    match state.store.find_user_by_email(&req.email).await {
        Ok(_) => {
            warn!("email already registered");
            return Err(AuthError::AlreadyExists);
        }
        Err(StoreError::NotFound) => {}
        Err(e) => return Err(e.into()),
    }

    let password_hash = state.hasher.hash_blocking(req.password).await?;

    let require_verification = state.config.auth.require_email_verification;
    let (token, expires_at) = if require_verification {
        let ttl = Duration::hours(state.config.auth.verification_ttl_hours);
        (Some(generate_token()), Some(OffsetDateTime::now_utc() + ttl))
    } else {
        (None, None)
    };

    // The unique index is the real guard; a concurrent signup surfaces as Conflict here.
    let user = state
        .store
        .create_user(NewUser {
            name: req.name.map(|n| n.trim().to_string()).unwrap_or_default(),
            email: req.email,
            password_hash,
            age: req.age,
            gender: req.gender,
            address: req.address,
            phone_number: req.phone_number,
            is_verified: !require_verification,
            verification_token: token.clone(),
            verification_expires_at: expires_at,
        })
        .await?;

    if let Some(token) = token {
        state
            .mailer
            .send_verification(&user.email, &token)
            .await
            .map_err(|e| AuthError::Delivery(e.to_string()))?;
    }

    info!(user_id = %user.id, "user signed up");
    Ok(user)
}

/// Checks credentials only. The caller must reject blocked users before issuing tokens.
#[instrument(skip(state, password))]
pub async fn login(state: &AppState, email: &str, password: &str) -> Result<User, AuthError> {
    let email = normalize_email(email);
    if !is_valid_email(&email) || password.is_empty() {
        return Err(AuthError::invalid_input("invalid input"));
    }

    let user = match state.store.find_user_by_email(&email).await {
        Ok(u) => u,
        Err(StoreError::NotFound) => {
            warn!("login unknown email");
            return Err(AuthError::NotFound);
        }
        Err(e) => return Err(e.into()),
    };

    let ok = state
        .hasher
        .verify_blocking(password.to_string(), user.password_hash.clone())
        .await?;
    if !ok {
        warn!(user_id = %user.id, "login invalid password");
        return Err(AuthError::InvalidCredentials);
    }

    if !user.is_verified {
        warn!(user_id = %user.id, "login before email verification");
        return Err(AuthError::NotVerified);
    }

    Ok(user)
}

#[instrument(skip(state, password))]
pub async fn admin_login(state: &AppState, email: &str, password: &str) -> Result<Admin, AuthError> {
    let email = normalize_email(email);
    if email.is_empty() || password.is_empty() {
        return Err(AuthError::invalid_input("invalid input"));
    }

    let admin = state.store.find_admin_by_email(&email).await?;
    let ok = state
        .hasher
        .verify_blocking(password.to_string(), admin.password_hash.clone())
        .await?;
    if !ok {
        warn!(admin_id = %admin.id, "admin login invalid password");
        return Err(AuthError::InvalidCredentials);
    }
    Ok(admin)
}

/// Tokens are self-contained and untracked, so there is nothing to invalidate.
pub async fn logout(principal_id: Uuid) -> Result<(), AuthError> {
    info!(%principal_id, "logout");
    Ok(())
}

/// Creates the configured initial admin unless it already exists.
pub async fn bootstrap_admin(state: &AppState) -> anyhow::Result<()> {
    let Some(cfg) = state.config.admin.clone() else {
        return Ok(());
    };
    let email = normalize_email(&cfg.email);

    match state.store.find_admin_by_email(&email).await {
        Ok(_) => return Ok(()),
        Err(StoreError::NotFound) => {}
        Err(e) => return Err(anyhow::anyhow!(e).context("look up bootstrap admin")),
    }

    let password_hash = state.hasher.hash_blocking(cfg.password).await?;
    match state
        .store
        .create_admin(NewAdmin {
            name: cfg.name,
            email,
            password_hash,
        })
        .await
    {
        Ok(admin) => {
            info!(admin_id = %admin.id, email = %admin.email, "bootstrap admin created");
            Ok(())
        }
        // Another instance won the race.
        Err(StoreError::Conflict) => Ok(()),
        Err(e) => Err(anyhow::anyhow!(e).context("create bootstrap admin")),
    }
}
