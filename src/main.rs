use log::info;
use std::sync::Arc;
use vibeshare_chat::config::Config;
use vibeshare_chat::db::{self, message::MessageStore, message::MongoMessageStore};
use vibeshare_chat::error::handle_rejection;
use vibeshare_chat::handlers::chat::ConnectionManager;
use vibeshare_chat::routes;
use warp::http::Method;
use warp::Filter;

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    env_logger::init();

    let config = Config::from_env().expect("invalid configuration");

    let database = Arc::new(
        db::connect(&config)
            .await
            .expect("failed to connect to MongoDB"),
    );
    db::ensure_indexes(&database)
        .await
        .expect("failed to create indexes");

    let store: Arc<dyn MessageStore> = Arc::new(MongoMessageStore::new(&database));
    let clients = Arc::new(ConnectionManager::new());

    let cors = warp::cors()
        .allow_any_origin()
        .allow_methods(vec![Method::GET, Method::POST])
        .allow_headers(vec!["Content-Type", "Authorization"])
        .build();

    let api = routes::api(database, store, clients)
        .recover(handle_rejection)
        .with(cors);

    info!("listening on {}", config.bind_addr);
    warp::serve(api).run(config.bind_addr).await;
}
