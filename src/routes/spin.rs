use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{State, delete, get, post};

use crate::auth::AuthedUser;
use crate::error::{ApiError, GroupError};
use crate::models::SpinHistoryItem;
use crate::registry::GroupRegistry;

use super::{forbidden, lookup_group, role_for};

#[post("/groups/<group_id>/spin")]
pub async fn request_spin(
    registry: &State<GroupRegistry>,
    user: AuthedUser,
    group_id: &str,
) -> Result<(Status, Json<serde_json::Value>), ApiError> {
    let handle = lookup_group(registry, group_id).await?;
    let role = role_for(&handle, &user.0).await?;
    if !role.can_participate() {
        return Err(forbidden("Participant access required"));
    }
    let spin = handle
        .request_spin()
        .await
        .map_err(GroupError::into_response)?;
    Ok((Status::Accepted, Json(serde_json::json!({"spin": spin}))))
}

#[get("/groups/<group_id>/history")]
pub async fn list_history(
    registry: &State<GroupRegistry>,
    user: AuthedUser,
    group_id: &str,
) -> Result<Json<Vec<SpinHistoryItem>>, ApiError> {
    let handle = lookup_group(registry, group_id).await?;
    let role = role_for(&handle, &user.0).await?;
    if !role.can_participate() {
        return Err(forbidden("Participant access required"));
    }
    let items = handle.history().await.map_err(GroupError::into_response)?;
    Ok(Json(items))
}

#[post("/groups/<group_id>/history/<spin_id>/save")]
pub async fn save_spin(
    registry: &State<GroupRegistry>,
    user: AuthedUser,
    group_id: &str,
    spin_id: &str,
) -> Result<Status, ApiError> {
    let handle = lookup_group(registry, group_id).await?;
    let role = role_for(&handle, &user.0).await?;
    if !role.can_participate() {
        return Err(forbidden("Participant access required"));
    }
    handle
        .save_spin(spin_id.to_string())
        .await
        .map_err(GroupError::into_response)?;
    Ok(Status::NoContent)
}

#[delete("/groups/<group_id>/history/<spin_id>")]
pub async fn discard_spin(
    registry: &State<GroupRegistry>,
    user: AuthedUser,
    group_id: &str,
    spin_id: &str,
) -> Result<Status, ApiError> {
    let handle = lookup_group(registry, group_id).await?;
    let role = role_for(&handle, &user.0).await?;
    if !role.can_participate() {
        return Err(forbidden("Participant access required"));
    }
    handle
        .discard_spin(spin_id.to_string())
        .await
        .map_err(GroupError::into_response)?;
    Ok(Status::NoContent)
}
