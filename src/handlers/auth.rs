use crate::auth::{generate_jwt, hash_password, verify_password};
use crate::db::user::{find_user_by_username, save_user};
use crate::error;
use crate::models::user::{Credentials, User};
use log::info;
use mongodb::Database;
use std::sync::Arc;
use warp::{http::StatusCode, reply, Rejection, Reply};

fn json_message(message: &str, status: StatusCode) -> warp::reply::Response {
    reply::with_status(
        reply::json(&serde_json::json!({ "message": message })),
        status,
    )
    .into_response()
}

pub async fn register_handler(
    credentials: Credentials,
    db: Arc<Database>,
) -> Result<warp::reply::Response, Rejection> {
    credentials.validate().map_err(error::reject)?;

    let collection = db.collection::<User>("users");
    if find_user_by_username(&credentials.username, &collection)
        .await
        .map_err(error::reject)?
        .is_some()
    {
        return Ok(json_message(
            "Username already taken",
            StatusCode::CONFLICT,
        ));
    }

    let hashed = hash_password(&credentials.password).map_err(error::reject)?;
    let user = User::new(&credentials.username, &hashed);
    save_user(&user, &collection).await.map_err(error::reject)?;

    info!("registered user {}", user.username);
    Ok(json_message(
        "User registered successfully",
        StatusCode::CREATED,
    ))
}

pub async fn login_handler(
    credentials: Credentials,
    db: Arc<Database>,
) -> Result<warp::reply::Response, Rejection> {
    credentials.validate().map_err(error::reject)?;

    let collection = db.collection::<User>("users");
    match find_user_by_username(&credentials.username, &collection)
        .await
        .map_err(error::reject)?
    {
        Some(stored) if verify_password(&stored.password, &credentials.password) => {
            let token = generate_jwt(&stored.username).map_err(error::reject)?;
            Ok(reply::json(&serde_json::json!({ "token": token })).into_response())
        }
        Some(_) => Ok(json_message("Invalid password", StatusCode::UNAUTHORIZED)),
        None => Ok(json_message("User not found", StatusCode::NOT_FOUND)),
    }
}
