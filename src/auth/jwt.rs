use axum::extract::FromRef;
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use super::claims::{Claims, Role, TokenKind};
use crate::{config::JwtConfig, state::AppState};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token signature is invalid")]
    InvalidSignature,
    #[error("token is malformed")]
    Malformed,
    #[error("token has expired")]
    Expired,
    #[error("expected a {expected:?} token")]
    WrongKind { expected: TokenKind },
}

/// Holds JWT signing and verification keys with config data.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    audience: String,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        state.keys.clone()
    }
}

impl JwtKeys {
    pub fn new(cfg: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            access_ttl: Duration::hours(cfg.access_ttl_hours),
            refresh_ttl: Duration::hours(cfg.refresh_ttl_hours),
        }
    }

    /// Signs a claim set expiring `ttl` from now. `ttl` must be positive.
    pub fn issue(
        &self,
        email: &str,
        principal_id: Uuid,
        role: Role,
        kind: TokenKind,
        ttl: Duration,
    ) -> anyhow::Result<String> {
        anyhow::ensure!(ttl.is_positive(), "token ttl must be positive");
        let now = OffsetDateTime::now_utc();
        let claims = Claims {
            sub: principal_id,
            email: email.to_string(),
            role,
            kind,
            iat: now.unix_timestamp(),
            exp: (now + ttl).unix_timestamp(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?;
        debug!(principal_id = %principal_id, role = %role, kind = ?kind, "jwt signed");
        Ok(token)
    }

    pub fn sign_access(&self, email: &str, principal_id: Uuid, role: Role) -> anyhow::Result<String> {
        self.issue(email, principal_id, role, TokenKind::Access, self.access_ttl)
    }

    pub fn sign_refresh(&self, email: &str, principal_id: Uuid, role: Role) -> anyhow::Result<String> {
        self.issue(email, principal_id, role, TokenKind::Refresh, self.refresh_ttl)
    }

    /// Checks signature, expiry, issuer and audience. Says nothing about
    /// whether the principal still exists or is blocked.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub", "iss", "aud"]);
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));

        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::InvalidSignature => TokenError::InvalidSignature,
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Malformed,
            }
        })?;

        // jsonwebtoken accepts exp == now; a token is only valid strictly before expiry.
        if OffsetDateTime::now_utc().unix_timestamp() >= data.claims.exp {
            return Err(TokenError::Expired);
        }

        debug!(principal_id = %data.claims.sub, kind = ?data.claims.kind, "jwt verified");
        Ok(data.claims)
    }

    pub fn verify_kind(&self, token: &str, expected: TokenKind) -> Result<Claims, TokenError> {
        let claims = self.verify(token)?;
        if claims.kind != expected {
            return Err(TokenError::WrongKind { expected });
        }
        Ok(claims)
    }
}
