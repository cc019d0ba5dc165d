// Route module decomposition — each domain area in its own file.
// Shared role plumbing lives here; route functions in submodules.

mod bookmarks;
mod groups;
mod participants;
mod spin;
mod system;
mod ws;

// --- Re-exports (all route functions used by lib.rs mount) ---

pub use bookmarks::{get_bookmarks, put_bookmarks};
pub use groups::{create_group, get_group, list_my_groups, rename_group};
pub use participants::{
    add_participant, commit_participants, list_participants, remove_participant,
    update_participant,
};
pub use spin::{discard_spin, list_history, request_spin, save_spin};
pub use system::{bad_body, health, not_found, stats, unauthorized};
pub use ws::group_stream;

use crate::actor::GroupHandle;
use crate::auth::Identity;
use crate::error::{ApiError, GroupError};
use crate::models::{Group, Participant};
use crate::registry::GroupRegistry;

/// The caller's standing with respect to one group, resolved per request
/// from the authenticated identity and the group's current roster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Owner,
    Manager,
    Participant,
    Outsider,
}

impl Role {
    pub fn can_manage(self) -> bool {
        matches!(self, Role::Owner | Role::Manager)
    }

    pub fn can_participate(self) -> bool {
        !matches!(self, Role::Outsider)
    }
}

pub fn resolve_role(identity: &Identity, group: &Group, participants: &[Participant]) -> Role {
    if identity.user_id == group.owner_user_id {
        return Role::Owner;
    }
    let emails = identity.emails();
    let matched = participants
        .iter()
        .find(|p| p.email_id.as_ref().is_some_and(|e| emails.contains(e)));
    match matched {
        Some(p) if p.manager => Role::Manager,
        Some(_) => Role::Participant,
        None => Role::Outsider,
    }
}

pub async fn lookup_group(
    registry: &GroupRegistry,
    group_id: &str,
) -> Result<GroupHandle, ApiError> {
    registry
        .lookup(group_id)
        .await
        .ok_or_else(|| GroupError::not_found("Group not found").into_response())
}

pub async fn role_for(handle: &GroupHandle, identity: &Identity) -> Result<Role, ApiError> {
    let group = handle.group().await.map_err(GroupError::into_response)?;
    let participants = handle
        .participants()
        .await
        .map_err(GroupError::into_response)?;
    Ok(resolve_role(identity, &group, &participants))
}

pub fn forbidden(message: &str) -> ApiError {
    GroupError::access(message).into_response()
}
