use crate::error::ApiError;
use crate::models::user::User;
use mongodb::{bson::doc, Collection};

pub async fn save_user(user: &User, collection: &Collection<User>) -> Result<(), ApiError> {
    collection
        .insert_one(user, None)
        .await
        .map_err(|e| ApiError::StoreUnavailable(e.to_string()))?;
    Ok(())
}

pub async fn find_user_by_username(
    username: &str,
    collection: &Collection<User>,
) -> Result<Option<User>, ApiError> {
    collection
        .find_one(doc! { "username": username }, None)
        .await
        .map_err(|e| ApiError::StoreUnavailable(e.to_string()))
}
