use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::AuthError,
    store::{Admin, User},
};

pub const MIN_PASSWORD_LENGTH: usize = 8;
pub const MAX_PASSWORD_LENGTH: usize = 72;

/// Request body for user signup.
#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub age: Option<i32>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
}

/// Request body for user and admin login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct EmailRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmResetRequest {
    pub token: String,
    pub new_password: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct SignupResponse {
    pub message: &'static str,
    pub user: PublicUser,
}

/// Response returned after a successful login.
#[derive(Debug, Serialize)]
pub struct LoginResponse<P: Serialize> {
    pub message: &'static str,
    pub access_token: String,
    pub refresh_token: String,
    pub user: P,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub token: String,
}

/// Public part of the user returned to the client.
#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub is_verified: bool,
}

impl From<&User> for PublicUser {
    fn from(u: &User) -> Self {
        Self {
            id: u.id,
            email: u.email.clone(),
            name: u.name.clone(),
            is_verified: u.is_verified,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PublicAdmin {
    pub id: Uuid,
    pub email: String,
    pub name: String,
}

impl From<&Admin> for PublicAdmin {
    fn from(a: &Admin) -> Self {
        Self {
            id: a.id,
            email: a.email.clone(),
            name: a.name.clone(),
        }
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// 8..=72 characters with upper, lower, digit and punctuation/symbol.
pub fn validate_password(password: &str) -> Result<(), AuthError> {
    let len = password.chars().count();
    if !(MIN_PASSWORD_LENGTH..=MAX_PASSWORD_LENGTH).contains(&len) {
        return Err(AuthError::invalid_input(format!(
            "password must be between {MIN_PASSWORD_LENGTH} and {MAX_PASSWORD_LENGTH} characters"
        )));
    }
    let has_upper = password.chars().any(char::is_uppercase);
    let has_lower = password.chars().any(char::is_lowercase);
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_special = password
        .chars()
        .any(|c| !c.is_alphanumeric() && !c.is_whitespace());
    if !(has_upper && has_lower && has_digit && has_special) {
        return Err(AuthError::invalid_input(
            "password must contain at least one uppercase letter, one lowercase letter, one number, and one special character",
        ));
    }
    Ok(())
}

impl SignupRequest {
    /// Normalizes the email in place and checks every field.
    pub fn validate(&mut self) -> Result<(), AuthError> {
        self.email = normalize_email(&self.email);
        if self.email.is_empty() || self.password.is_empty() {
            return Err(AuthError::invalid_input("required fields cannot be empty"));
        }
        if !is_valid_email(&self.email) {
            return Err(AuthError::invalid_input("invalid email format"));
        }
        validate_password(&self.password)?;
        if matches!(self.age, Some(age) if age <= 0) {
            return Err(AuthError::invalid_input("age must be positive"));
        }
        Ok(())
    }
}
