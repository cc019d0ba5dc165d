use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::actor::{self, GroupCheckpoint, GroupHandle};
use crate::auth::Identity;
use crate::db::Db;
use crate::error::GroupError;
use crate::models::*;

/// Lazy per-id registry of running group actors. Actors are spawned on first
/// access from their checkpoint; distinct groups run independently.
pub struct GroupRegistry {
    db: Arc<Db>,
    actors: RwLock<HashMap<String, GroupHandle>>,
}

impl GroupRegistry {
    pub fn new(db: Arc<Db>) -> Self {
        GroupRegistry {
            db,
            actors: RwLock::new(HashMap::new()),
        }
    }

    /// Create a group on behalf of an authenticated user. The owner becomes
    /// the first participant: always a manager, email locked to the owner's
    /// primary email.
    pub async fn create(
        &self,
        identity: &Identity,
        raw_name: String,
    ) -> Result<(Group, Participant), GroupError> {
        let name = validate_name(&raw_name)?;
        let owner_email = validate_email(&identity.primary_email)
            .map_err(|_| GroupError::validation("Owner identity has no usable email"))?;
        let owner_name = validate_name(&identity.display_name)
            .unwrap_or_else(|_| "Owner".to_string());

        let group = Group {
            id: uuid::Uuid::new_v4().to_string(),
            name,
            created_at: chrono::Utc::now().to_rfc3339(),
            owner_user_id: identity.user_id.clone(),
            owner_email: owner_email.clone(),
            owner_participant_id: uuid::Uuid::new_v4().to_string(),
        };
        let owner = Participant {
            id: group.owner_participant_id.clone(),
            name: owner_name,
            active: true,
            email_id: Some(owner_email),
            manager: true,
            spins_since_last_won: 0,
        };

        let checkpoint = GroupCheckpoint::new(group.clone(), owner.clone());
        let state_json = serde_json::to_string(&checkpoint)
            .map_err(|e| GroupError::internal(format!("Could not serialize group: {e}")))?;
        self.db
            .save_group(&group.id, &state_json, 0)
            .map_err(|e| GroupError::internal(format!("Could not persist group: {e}")))?;

        let handle = actor::spawn(checkpoint, self.db.clone());
        self.actors
            .write()
            .await
            .insert(group.id.clone(), handle);
        Ok((group, owner))
    }

    /// Find the actor for a group, reviving it from its checkpoint if this
    /// process has not touched the group yet. None means the group does not
    /// exist.
    pub async fn lookup(&self, group_id: &str) -> Option<GroupHandle> {
        if let Some(handle) = self.actors.read().await.get(group_id) {
            return Some(handle.clone());
        }
        let mut actors = self.actors.write().await;
        // Re-check under the write lock: another request may have won.
        if let Some(handle) = actors.get(group_id) {
            return Some(handle.clone());
        }
        let state_json = match self.db.load_group(group_id) {
            Ok(Some(json)) => json,
            Ok(None) => return None,
            Err(e) => {
                eprintln!("⚠️ Checkpoint read failed for group {group_id}: {e}");
                return None;
            }
        };
        let checkpoint: GroupCheckpoint = match serde_json::from_str(&state_json) {
            Ok(cp) => cp,
            Err(e) => {
                eprintln!("⚠️ Checkpoint parse failed for group {group_id}: {e}");
                return None;
            }
        };
        let handle = actor::spawn(checkpoint, self.db.clone());
        actors.insert(group_id.to_string(), handle.clone());
        Some(handle)
    }

    pub fn group_count(&self) -> i64 {
        self.db.group_count()
    }

    /// Sum of live WebSocket subscriptions across resident actors.
    pub async fn live_subscribers(&self) -> usize {
        let handles: Vec<GroupHandle> =
            self.actors.read().await.values().cloned().collect();
        let mut total = 0;
        for handle in handles {
            total += handle.subscriber_count().await;
        }
        total
    }
}
