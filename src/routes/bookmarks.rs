use rocket::serde::json::Json;
use rocket::{State, get, put};
use std::sync::Arc;

use crate::auth::AuthedUser;
use crate::db::Db;
use crate::metadata;
use crate::models::BookmarksPut;

#[get("/groups/bookmarks")]
pub fn get_bookmarks(db: &State<Arc<Db>>, user: AuthedUser) -> Json<Vec<String>> {
    Json(metadata::bookmarks_get(db, &user.0.user_id))
}

#[put("/groups/bookmarks", format = "json", data = "<body>")]
pub fn put_bookmarks(
    db: &State<Arc<Db>>,
    user: AuthedUser,
    body: Json<BookmarksPut>,
) -> Json<Vec<String>> {
    Json(metadata::bookmarks_put(db, &user.0.user_id, &body.group_ids))
}
