use std::collections::{BTreeSet, HashMap};

use crate::auth::Identity;
use crate::db::Db;
use crate::models::{Group, GroupSummary, Participant};

// Cross-group indices kept in the flat metadata store. Written only by the
// router, outside the actor's transaction: last-write-wins, best-effort, and
// rebuildable by walking the group read endpoints.

/// Refresh the `group:{id}` summary record and the email membership indices
/// after a successful mutation. Failures are logged, never surfaced — clients
/// see authoritative state over the WebSocket.
pub fn sync_group(db: &Db, group: &Group, participants: &[Participant]) {
    if let Err(e) = record_group(db, group) {
        eprintln!("⚠️ Metadata sync failed for group {}: {e}", group.id);
    }
    if let Err(e) = sync_participant_emails(db, &group.id, participants) {
        eprintln!("⚠️ Metadata email sync failed for group {}: {e}", group.id);
    }
}

/// Additional bookkeeping on group creation: the owned-by-user presence key.
pub fn sync_new_group(db: &Db, group: &Group, participants: &[Participant]) {
    let owner_key = format!("owner-group:{}:{}", group.owner_user_id, group.id);
    if let Err(e) = db.kv_put(&owner_key, "1") {
        eprintln!("⚠️ Metadata owner-index write failed for group {}: {e}", group.id);
    }
    sync_group(db, group, participants);
}

fn record_group(db: &Db, group: &Group) -> rusqlite::Result<()> {
    let summary = GroupSummary {
        id: group.id.clone(),
        name: group.name.clone(),
        created_at: group.created_at.clone(),
        owner_user_id: group.owner_user_id.clone(),
        owner_email: group.owner_email.clone(),
    };
    let value = serde_json::to_string(&summary).unwrap_or_default();
    db.kv_put(&format!("group:{}", group.id), &value)
}

/// Diff the group's previous email set (from `participant-index:{id}`)
/// against the current roster, updating one membership key per email. The
/// stored index makes the diff deterministic across restarts.
fn sync_participant_emails(
    db: &Db,
    group_id: &str,
    participants: &[Participant],
) -> rusqlite::Result<()> {
    let index_key = format!("participant-index:{group_id}");
    let previous: BTreeSet<String> = db
        .kv_get(&index_key)?
        .and_then(|json| serde_json::from_str::<Vec<String>>(&json).ok())
        .unwrap_or_default()
        .into_iter()
        .collect();
    let current: BTreeSet<String> = participants
        .iter()
        .filter_map(|p| p.email_id.clone())
        .collect();

    for email in current.difference(&previous) {
        db.kv_put(&format!("participant-group:{email}:{group_id}"), "1")?;
    }
    for email in previous.difference(&current) {
        db.kv_delete(&format!("participant-group:{email}:{group_id}"))?;
    }

    let index: Vec<&String> = current.iter().collect();
    db.kv_put(&index_key, &serde_json::to_string(&index).unwrap_or_default())
}

/// Groups the caller can see in their overview: owned ∪ email-matched,
/// deduplicated, sorted by name.
pub fn groups_for_identity(db: &Db, identity: &Identity) -> Vec<GroupSummary> {
    let mut ids: BTreeSet<String> = BTreeSet::new();

    let owner_prefix = format!("owner-group:{}:", identity.user_id);
    for (key, _) in db.kv_prefix(&owner_prefix).unwrap_or_default() {
        if let Some(id) = key.rsplit(':').next() {
            ids.insert(id.to_string());
        }
    }
    for email in identity.emails() {
        let prefix = format!("participant-group:{email}:");
        for (key, _) in db.kv_prefix(&prefix).unwrap_or_default() {
            if let Some(id) = key.rsplit(':').next() {
                ids.insert(id.to_string());
            }
        }
    }

    let mut summaries: HashMap<String, GroupSummary> = HashMap::new();
    for id in ids {
        if let Ok(Some(json)) = db.kv_get(&format!("group:{id}"))
            && let Ok(summary) = serde_json::from_str::<GroupSummary>(&json)
        {
            summaries.insert(id, summary);
        }
    }
    let mut list: Vec<GroupSummary> = summaries.into_values().collect();
    list.sort_by(|a, b| a.name.cmp(&b.name));
    list
}

// --- Bookmarks ---

pub fn bookmarks_get(db: &Db, user_id: &str) -> Vec<String> {
    db.kv_get(&format!("bookmarks:{user_id}"))
        .ok()
        .flatten()
        .and_then(|json| serde_json::from_str(&json).ok())
        .unwrap_or_default()
}

/// Store the caller's bookmark list: entries trimmed, empties dropped,
/// duplicates removed keeping first occurrence. Returns the normalized list.
pub fn bookmarks_put(db: &Db, user_id: &str, group_ids: &[String]) -> Vec<String> {
    let mut seen = BTreeSet::new();
    let normalized: Vec<String> = group_ids
        .iter()
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty() && seen.insert(id.clone()))
        .collect();
    let value = serde_json::to_string(&normalized).unwrap_or_default();
    if let Err(e) = db.kv_put(&format!("bookmarks:{user_id}"), &value) {
        eprintln!("⚠️ Bookmark write failed for user {user_id}: {e}");
    }
    normalized
}
