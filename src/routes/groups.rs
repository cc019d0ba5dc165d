use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{State, get, patch, post};
use std::sync::Arc;

use crate::auth::AuthedUser;
use crate::db::Db;
use crate::error::{ApiError, GroupError};
use crate::metadata;
use crate::models::{CreateGroup, Group, GroupSummary, RenameGroup};
use crate::registry::GroupRegistry;

use super::{forbidden, lookup_group, role_for};

#[post("/groups", format = "json", data = "<body>")]
pub async fn create_group(
    registry: &State<GroupRegistry>,
    db: &State<Arc<Db>>,
    user: AuthedUser,
    body: Json<CreateGroup>,
) -> Result<(Status, Json<Group>), ApiError> {
    let (group, owner) = registry
        .create(&user.0, body.name.clone())
        .await
        .map_err(GroupError::into_response)?;
    metadata::sync_new_group(db, &group, &[owner]);
    Ok((Status::Created, Json(group)))
}

#[get("/groups/me")]
pub fn list_my_groups(db: &State<Arc<Db>>, user: AuthedUser) -> Json<Vec<GroupSummary>> {
    Json(metadata::groups_for_identity(db, &user.0))
}

#[get("/groups/<group_id>")]
pub async fn get_group(
    registry: &State<GroupRegistry>,
    group_id: &str,
) -> Result<Json<Group>, ApiError> {
    let handle = lookup_group(registry, group_id).await?;
    let group = handle.group().await.map_err(GroupError::into_response)?;
    Ok(Json(group))
}

#[patch("/groups/<group_id>", format = "json", data = "<body>")]
pub async fn rename_group(
    registry: &State<GroupRegistry>,
    db: &State<Arc<Db>>,
    user: AuthedUser,
    group_id: &str,
    body: Json<RenameGroup>,
) -> Result<Json<Group>, ApiError> {
    let handle = lookup_group(registry, group_id).await?;
    let role = role_for(&handle, &user.0).await?;
    if !role.can_manage() {
        return Err(forbidden("Manager access required"));
    }
    let group = handle
        .rename(body.name.clone())
        .await
        .map_err(GroupError::into_response)?;
    let participants = handle
        .participants()
        .await
        .map_err(GroupError::into_response)?;
    metadata::sync_group(db, &group, &participants);
    Ok(Json(group))
}
