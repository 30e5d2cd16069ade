use serde::{Deserialize, Serialize};

use crate::{error::AuthError, store::User};

/// Partial profile update. Absent fields are left as they are.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateProfileRequest {
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

impl UpdateProfileRequest {
    pub fn apply(self, user: &mut User) -> Result<(), AuthError> {
        if let Some(name) = self.name {
            let name = name.trim();
            if name.is_empty() {
                return Err(AuthError::invalid_input("name cannot be empty"));
            }
            user.name = name.to_string();
        }
        if let Some(age) = self.age {
            if age <= 0 {
                return Err(AuthError::invalid_input("age must be positive"));
            }
            user.age = Some(age);
        }
        if self.gender.is_some() {
            user.gender = self.gender;
        }
        if self.address.is_some() {
            user.address = self.address;
        }
        if self.phone_number.is_some() {
            user.phone_number = self.phone_number;
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct ImageQuery {
    #[serde(default)]
    pub image_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub user: User,
}

#[derive(Debug, Serialize)]
pub struct PictureResponse {
    pub message: &'static str,
    pub url: String,
}

/// Absolute http(s) URL with a host.
pub fn validate_image_url(raw: &str) -> Result<String, AuthError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(AuthError::invalid_input("image URL not provided"));
    }
    let url = reqwest::Url::parse(raw)
        .map_err(|_| AuthError::invalid_input("invalid URL format"))?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(AuthError::invalid_input("invalid URL format"));
    }
    Ok(raw.to_string())
}
