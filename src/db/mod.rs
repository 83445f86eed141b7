use crate::config::Config;
use crate::models::message::Message;
use crate::models::user::User;
use mongodb::{
    bson::doc,
    options::{ClientOptions, IndexOptions},
    Client, Database, IndexModel,
};

pub mod message;
pub mod user;

pub async fn connect(config: &Config) -> Result<Database, mongodb::error::Error> {
    let options = ClientOptions::parse(&config.mongodb_uri).await?;
    let client = Client::with_options(options)?;
    Ok(client.database(&config.database_name))
}

/// Create the indexes the chat queries rely on: both orientations of the
/// conversation pair with the creation time as the sort key, and a unique
/// index on usernames.
pub async fn ensure_indexes(db: &Database) -> Result<(), mongodb::error::Error> {
    let messages = db.collection::<Message>("messages");
    let forward = IndexModel::builder()
        .keys(doc! { "sender": 1, "receiver": 1, "timestamp": -1 })
        .build();
    let reverse = IndexModel::builder()
        .keys(doc! { "receiver": 1, "sender": 1, "timestamp": -1 })
        .build();
    messages.create_indexes([forward, reverse], None).await?;

    let users = db.collection::<User>("users");
    let unique_username = IndexModel::builder()
        .keys(doc! { "username": 1 })
        .options(IndexOptions::builder().unique(true).build())
        .build();
    users.create_index(unique_username, None).await?;

    Ok(())
}
