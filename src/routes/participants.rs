use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{State, delete, get, patch, post};
use std::sync::Arc;

use crate::auth::AuthedUser;
use crate::db::Db;
use crate::error::{ApiError, GroupError};
use crate::metadata;
use crate::models::{AddParticipant, Participant, RosterCommit, UpdateParticipant};
use crate::registry::GroupRegistry;

use super::{forbidden, lookup_group, role_for};

#[get("/groups/<group_id>/participants")]
pub async fn list_participants(
    registry: &State<GroupRegistry>,
    group_id: &str,
) -> Result<Json<Vec<Participant>>, ApiError> {
    let handle = lookup_group(registry, group_id).await?;
    let participants = handle
        .participants()
        .await
        .map_err(GroupError::into_response)?;
    Ok(Json(participants))
}

#[post("/groups/<group_id>/participants", format = "json", data = "<body>")]
pub async fn add_participant(
    registry: &State<GroupRegistry>,
    db: &State<Arc<Db>>,
    user: AuthedUser,
    group_id: &str,
    body: Json<AddParticipant>,
) -> Result<(Status, Json<Participant>), ApiError> {
    let handle = lookup_group(registry, group_id).await?;
    let role = role_for(&handle, &user.0).await?;
    if !role.can_manage() {
        return Err(forbidden("Manager access required"));
    }
    let participant = handle
        .add_participant(body.into_inner())
        .await
        .map_err(GroupError::into_response)?;
    sync_metadata(&handle, db).await;
    Ok((Status::Created, Json(participant)))
}

#[patch(
    "/groups/<group_id>/participants/<participant_id>",
    format = "json",
    data = "<body>"
)]
pub async fn update_participant(
    registry: &State<GroupRegistry>,
    db: &State<Arc<Db>>,
    user: AuthedUser,
    group_id: &str,
    participant_id: &str,
    body: Json<UpdateParticipant>,
) -> Result<Json<Participant>, ApiError> {
    let handle = lookup_group(registry, group_id).await?;
    let role = role_for(&handle, &user.0).await?;
    if !role.can_manage() {
        return Err(forbidden("Manager access required"));
    }
    let participant = handle
        .update_participant(participant_id.to_string(), body.into_inner())
        .await
        .map_err(GroupError::into_response)?;
    sync_metadata(&handle, db).await;
    Ok(Json(participant))
}

#[delete("/groups/<group_id>/participants/<participant_id>")]
pub async fn remove_participant(
    registry: &State<GroupRegistry>,
    db: &State<Arc<Db>>,
    user: AuthedUser,
    group_id: &str,
    participant_id: &str,
) -> Result<Status, ApiError> {
    let handle = lookup_group(registry, group_id).await?;
    let role = role_for(&handle, &user.0).await?;
    if !role.can_manage() {
        return Err(forbidden("Manager access required"));
    }
    handle
        .remove_participant(participant_id.to_string())
        .await
        .map_err(GroupError::into_response)?;
    sync_metadata(&handle, db).await;
    Ok(Status::NoContent)
}

#[post(
    "/groups/<group_id>/participants/commit",
    format = "json",
    data = "<body>"
)]
pub async fn commit_participants(
    registry: &State<GroupRegistry>,
    db: &State<Arc<Db>>,
    user: AuthedUser,
    group_id: &str,
    body: Json<RosterCommit>,
) -> Result<Json<Vec<Participant>>, ApiError> {
    let handle = lookup_group(registry, group_id).await?;
    let role = role_for(&handle, &user.0).await?;
    if !role.can_manage() {
        return Err(forbidden("Manager access required"));
    }
    let participants = handle
        .commit_roster(body.into_inner())
        .await
        .map_err(GroupError::into_response)?;
    sync_metadata(&handle, db).await;
    Ok(Json(participants))
}

/// Roster mutations can change the group's email set; refresh the
/// cross-group indices from the post-mutation state.
async fn sync_metadata(handle: &crate::actor::GroupHandle, db: &Db) {
    if let (Ok(group), Ok(participants)) = (handle.group().await, handle.participants().await) {
        metadata::sync_group(db, &group, &participants);
    }
}
