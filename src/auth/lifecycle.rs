//! Email verification and password reset: one-time tokens with expiry.

use std::time::Duration as StdDuration;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::{rngs::OsRng, RngCore};
use time::{Duration, OffsetDateTime};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use super::dto::{normalize_email, validate_password};
use crate::{
    error::AuthError,
    state::AppState,
    store::{PasswordReset, StoreError},
};

const TOKEN_BYTES: usize = 32;

/// 32 random bytes from the OS RNG, URL-safe base64 without padding.
pub fn generate_token() -> String {
    let mut buf = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut buf);
    URL_SAFE_NO_PAD.encode(buf)
}

pub async fn resend_verification(state: &AppState, email: &str) -> Result<(), AuthError> {
    resend_verification_at(state, email, OffsetDateTime::now_utc()).await
}

#[instrument(skip(state, now))]
pub async fn resend_verification_at(
    state: &AppState,
    email: &str,
    now: OffsetDateTime,
) -> Result<(), AuthError> {
    let mut user = state.store.find_user_by_email(&normalize_email(email)).await?;
    if user.is_verified {
        return Err(AuthError::AlreadyVerified);
    }

    let token = generate_token();
    user.verification_token = Some(token.clone());
    user.verification_expires_at =
        Some(now + Duration::hours(state.config.auth.verification_ttl_hours));
    state.store.update_user(&user).await?;

    state
        .mailer
        .send_verification(&user.email, &token)
        .await
        .map_err(|e| AuthError::Delivery(e.to_string()))?;

    info!(user_id = %user.id, "verification email resent");
    Ok(())
}

pub async fn verify_email(state: &AppState, token: &str) -> Result<(), AuthError> {
    verify_email_at(state, token, OffsetDateTime::now_utc()).await
}

#[instrument(skip_all)]
pub async fn verify_email_at(
    state: &AppState,
    token: &str,
    now: OffsetDateTime,
) -> Result<(), AuthError> {
    if token.is_empty() {
        return Err(AuthError::InvalidToken);
    }
    let mut user = match state.store.find_user_by_verification_token(token).await {
        Ok(u) => u,
        Err(StoreError::NotFound) => return Err(AuthError::InvalidToken),
        Err(e) => return Err(e.into()),
    };

    match user.verification_expires_at {
        Some(expires_at) if now < expires_at => {}
        _ => {
            warn!(user_id = %user.id, "verification token expired");
            return Err(AuthError::Expired);
        }
    }

    user.is_verified = true;
    user.verification_token = None;
    user.verification_expires_at = None;
    state.store.update_user(&user).await?;

    info!(user_id = %user.id, "email verified");
    Ok(())
}

pub async fn request_password_reset(state: &AppState, email: &str) -> Result<(), AuthError> {
    request_password_reset_at(state, email, OffsetDateTime::now_utc())
        .await
        .map(|_| ())
}

/// Returns the stored reset record.
#[instrument(skip(state, now))]
pub async fn request_password_reset_at(
    state: &AppState,
    email: &str,
    now: OffsetDateTime,
) -> Result<PasswordReset, AuthError> {
    let user = state.store.find_user_by_email(&normalize_email(email)).await?;

    let reset = PasswordReset {
        id: Uuid::new_v4(),
        user_id: user.id,
        reset_token: generate_token(),
        expires_at: now + Duration::minutes(state.config.auth.reset_ttl_minutes),
        created_at: now,
    };
    state.store.create_reset(&reset).await?;

    state
        .mailer
        .send_reset(&user.email, &reset.reset_token)
        .await
        .map_err(|e| AuthError::Delivery(e.to_string()))?;

    info!(user_id = %user.id, reset_id = %reset.id, "password reset requested");
    Ok(reset)
}

pub async fn confirm_password_reset(
    state: &AppState,
    token: &str,
    new_password: &str,
) -> Result<(), AuthError> {
    confirm_password_reset_at(state, token, new_password, OffsetDateTime::now_utc()).await
}

#[instrument(skip_all)]
pub async fn confirm_password_reset_at(
    state: &AppState,
    token: &str,
    new_password: &str,
    now: OffsetDateTime,
) -> Result<(), AuthError> {
    validate_password(new_password)?;
    if token.is_empty() {
        return Err(AuthError::InvalidToken);
    }

    let reset = match state.store.find_reset_by_token(token).await {
        Ok(r) => r,
        Err(StoreError::NotFound) => return Err(AuthError::InvalidToken),
        Err(e) => return Err(e.into()),
    };

    if reset.is_expired_at(now) {
        // Lazy expiry: an expired grant is useless, drop it now.
        if let Err(e) = state.store.delete_reset(reset.id).await {
            if !matches!(e, StoreError::NotFound) {
                warn!(error = %e, reset_id = %reset.id, "failed to delete expired reset");
            }
        }
        return Err(AuthError::Expired);
    }

    let user = state.store.find_user_by_id(reset.user_id).await?;
    let password_hash = state.hasher.hash_blocking(new_password.to_string()).await?;

    // Of two concurrent confirms only one consumes the row; a failed write keeps it.
    if !state
        .store
        .consume_reset(reset.id, user.id, &password_hash)
        .await?
    {
        return Err(AuthError::InvalidToken);
    }

    info!(user_id = %user.id, "password reset confirmed");
    Ok(())
}

pub async fn purge_expired_resets(state: &AppState, now: OffsetDateTime) -> Result<u64, AuthError> {
    let purged = state.store.purge_expired_resets(now).await?;
    if purged > 0 {
        info!(purged, "expired password resets purged");
    } else {
        debug!("no expired password resets");
    }
    Ok(purged)
}

/// Periodically deletes expired reset records until the runtime shuts down.
pub fn spawn_reset_sweeper(state: AppState, every: StdDuration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(e) = purge_expired_resets(&state, OffsetDateTime::now_utc()).await {
                error!(error = %e, "reset sweep failed");
            }
        }
    })
}
