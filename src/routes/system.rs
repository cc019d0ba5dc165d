use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{State, get};

use crate::registry::GroupRegistry;

#[get("/health")]
pub fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "unfair-wheel",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

#[get("/stats")]
pub async fn stats(registry: &State<GroupRegistry>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "groups": registry.group_count(),
        "liveSubscribers": registry.live_subscribers().await,
    }))
}

// --- Catchers ---

#[rocket::catch(401)]
pub fn unauthorized() -> Json<serde_json::Value> {
    Json(serde_json::json!({"error": "Authentication required"}))
}

#[rocket::catch(404)]
pub fn not_found() -> Json<serde_json::Value> {
    Json(serde_json::json!({"error": "Not found"}))
}

// Rocket turns unparseable JSON bodies into 422; the wire contract says 400.
#[rocket::catch(422)]
pub fn bad_body() -> (Status, Json<serde_json::Value>) {
    (
        Status::BadRequest,
        Json(serde_json::json!({"error": "Malformed request body"})),
    )
}
