use crate::error::ApiError;
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug)]
pub struct User {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub username: String,
    /// Argon2 hash, never the plain password.
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub created_at: Option<String>,
}

impl User {
    pub fn new(username: &str, hashed_password: &str) -> Self {
        User {
            id: None,
            username: username.to_string(),
            password: hashed_password.to_string(),
            created_at: Some(chrono::Utc::now().to_rfc3339()),
        }
    }
}

/// Register/login request body.
#[derive(Deserialize, Debug)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.username.trim().is_empty() {
            return Err(ApiError::InvalidRequest("username is required".into()));
        }
        if self.password.is_empty() {
            return Err(ApiError::InvalidRequest("password is required".into()));
        }
        Ok(())
    }
}
