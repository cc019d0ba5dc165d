pub mod actor;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod metadata;
pub mod models;
pub mod registry;
pub mod routes;
pub mod selection;

use std::env;
use std::sync::Arc;

use config::AppConfig;
use db::Db;
use registry::GroupRegistry;
use rocket_cors::{AllowedOrigins, CorsOptions};

pub fn rocket() -> rocket::Rocket<rocket::Build> {
    let db_path = env::var("DATABASE_PATH").unwrap_or_else(|_| "data/wheel.db".to_string());
    rocket_with_db(&db_path)
}

pub fn rocket_with_db(db_path: &str) -> rocket::Rocket<rocket::Build> {
    build_rocket(db_path, AppConfig::from_env())
}

pub fn rocket_with_db_and_config(
    db_path: &str,
    config: AppConfig,
) -> rocket::Rocket<rocket::Build> {
    build_rocket(db_path, config)
}

fn build_rocket(db_path: &str, config: AppConfig) -> rocket::Rocket<rocket::Build> {
    // Ensure data directory exists
    if let Some(parent) = std::path::Path::new(db_path).parent() {
        std::fs::create_dir_all(parent).ok();
    }

    let db = Arc::new(Db::new(db_path));
    let registry = GroupRegistry::new(db.clone());

    let cors = match &config.frontend_origin {
        Some(origin) => {
            CorsOptions::default().allowed_origins(AllowedOrigins::some_exact(&[origin.as_str()]))
        }
        None => CorsOptions::default(),
    }
    .to_cors()
    .expect("Failed to create CORS");

    rocket::build()
        .manage(db)
        .manage(registry)
        .manage(config)
        .attach(cors)
        .register(
            "/",
            rocket::catchers![routes::unauthorized, routes::not_found, routes::bad_body],
        )
        .mount(
            "/",
            rocket::routes![
                routes::health,
                routes::stats,
                routes::create_group,
                routes::list_my_groups,
                routes::get_bookmarks,
                routes::put_bookmarks,
                routes::get_group,
                routes::rename_group,
                routes::list_participants,
                routes::add_participant,
                routes::update_participant,
                routes::remove_participant,
                routes::commit_participants,
                routes::request_spin,
                routes::list_history,
                routes::save_spin,
                routes::discard_spin,
                routes::group_stream,
            ],
        )
}
