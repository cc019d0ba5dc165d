use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::GroupError;

/// Upper bound for group and participant names (after normalization).
pub const NAME_MAX: usize = 60;

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: String,
    pub name: String,
    pub created_at: String,
    pub owner_user_id: String,
    pub owner_email: String,
    pub owner_participant_id: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub id: String,
    pub name: String,
    pub active: bool,
    pub email_id: Option<String>,
    pub manager: bool,
    pub spins_since_last_won: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SpinStatus {
    Idle,
    Spinning,
}

/// The spin state machine's public shape. Spin-specific fields are populated
/// while spinning and retained through the resolved-but-pending window; a
/// save/discard clears them back to null while `resolvedAt` keeps the last
/// resolution instant.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct GroupSpinState {
    pub status: SpinStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spin_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winner_participant_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra_turns: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<String>,
}

impl GroupSpinState {
    pub fn idle() -> Self {
        GroupSpinState {
            status: SpinStatus::Idle,
            spin_id: None,
            started_at: None,
            winner_participant_id: None,
            duration_ms: None,
            extra_turns: None,
            resolved_at: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SpinHistoryItem {
    pub id: String,
    pub created_at: String,
    pub winner_participant_id: String,
    pub participants: Vec<Participant>,
}

/// A resolved spin awaiting save or discard. `counters` holds each affected
/// participant's spinsSinceLastWon from just before resolution so a discard
/// can restore them.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PendingResult {
    pub spin_id: String,
    pub counters: BTreeMap<String, u32>,
    pub expires_at: chrono::DateTime<chrono::Utc>,
}

/// The flat record kept under `group:{id}` in the metadata store.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct GroupSummary {
    pub id: String,
    pub name: String,
    pub created_at: String,
    pub owner_user_id: String,
    pub owner_email: String,
}

// --- Request bodies ---

#[derive(Debug, Deserialize)]
pub struct CreateGroup {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct RenameGroup {
    pub name: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct AddParticipant {
    pub name: String,
    #[serde(default)]
    pub email_id: Option<String>,
    #[serde(default)]
    pub manager: bool,
}

/// Patch body for a participant. `emailId` distinguishes "absent" (leave
/// unchanged) from an explicit null (clear the email, demoting a manager).
#[derive(Debug, Default, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct UpdateParticipant {
    pub active: Option<bool>,
    #[serde(default, deserialize_with = "double_option")]
    pub email_id: Option<Option<String>>,
    pub manager: Option<bool>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RosterUpdate {
    pub participant_id: String,
    pub active: Option<bool>,
    #[serde(default, deserialize_with = "double_option")]
    pub email_id: Option<Option<String>>,
    pub manager: Option<bool>,
}

impl RosterUpdate {
    pub fn patch(&self) -> UpdateParticipant {
        UpdateParticipant {
            active: self.active,
            email_id: self.email_id.clone(),
            manager: self.manager,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterCommit {
    #[serde(default)]
    pub adds: Vec<AddParticipant>,
    #[serde(default)]
    pub updates: Vec<RosterUpdate>,
    #[serde(default)]
    pub removes: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookmarksPut {
    pub group_ids: Vec<String>,
}

fn double_option<'de, T, D>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: serde::Deserializer<'de>,
{
    Deserialize::deserialize(de).map(Some)
}

// --- Name and email normalization ---

/// Trim and collapse internal whitespace.
pub fn normalize_name(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn validate_name(raw: &str) -> Result<String, GroupError> {
    let name = normalize_name(raw);
    if name.is_empty() || name.chars().count() > NAME_MAX {
        return Err(GroupError::validation("Name must be 1-60 characters"));
    }
    Ok(name)
}

/// Case-folded form used for uniqueness checks.
pub fn folded(name: &str) -> String {
    name.to_lowercase()
}

pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

pub fn validate_email(raw: &str) -> Result<String, GroupError> {
    let email = normalize_email(raw);
    if email.is_empty() || !email.contains('@') {
        return Err(GroupError::validation("Invalid email address"));
    }
    Ok(email)
}
