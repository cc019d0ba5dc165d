use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::{mpsc, oneshot};

use crate::db::Db;
use crate::error::GroupError;
use crate::events::GroupEvent;
use crate::models::*;

/// Bounded ring of resolved spins.
pub const HISTORY_LIMIT: usize = 20;
/// Soft TTL after which a pending result behaves as already saved.
pub const PENDING_TTL_MINUTES: i64 = 10;

const MAILBOX_DEPTH: usize = 64;

/// Everything a group actor owns, serialized as one JSON checkpoint row.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct GroupCheckpoint {
    pub group: Group,
    pub participants: Vec<Participant>,
    pub spin: GroupSpinState,
    #[serde(default)]
    pub history: Vec<SpinHistoryItem>,
    #[serde(default)]
    pub pending: Option<PendingResult>,
    #[serde(default)]
    pub version: u64,
}

impl GroupCheckpoint {
    pub fn new(group: Group, owner: Participant) -> Self {
        GroupCheckpoint {
            group,
            participants: vec![owner],
            spin: GroupSpinState::idle(),
            history: Vec::new(),
            pending: None,
            version: 0,
        }
    }
}

/// Mailbox messages. Every public operation carries a oneshot reply; the
/// resolve message is internal and fire-and-forget.
pub enum Command {
    GetGroup {
        reply: oneshot::Sender<Group>,
    },
    GetParticipants {
        reply: oneshot::Sender<Vec<Participant>>,
    },
    Rename {
        name: String,
        reply: oneshot::Sender<Result<Group, GroupError>>,
    },
    AddParticipant {
        body: AddParticipant,
        reply: oneshot::Sender<Result<Participant, GroupError>>,
    },
    UpdateParticipant {
        participant_id: String,
        body: UpdateParticipant,
        reply: oneshot::Sender<Result<Participant, GroupError>>,
    },
    RemoveParticipant {
        participant_id: String,
        reply: oneshot::Sender<Result<(), GroupError>>,
    },
    CommitRoster {
        body: RosterCommit,
        reply: oneshot::Sender<Result<Vec<Participant>, GroupError>>,
    },
    RequestSpin {
        reply: oneshot::Sender<Result<GroupSpinState, GroupError>>,
    },
    ResolveSpin {
        spin_id: String,
    },
    ListHistory {
        reply: oneshot::Sender<Vec<SpinHistoryItem>>,
    },
    SaveSpin {
        spin_id: String,
        reply: oneshot::Sender<Result<(), GroupError>>,
    },
    DiscardSpin {
        spin_id: String,
        reply: oneshot::Sender<Result<(), GroupError>>,
    },
    Subscribe {
        reply: oneshot::Sender<(GroupEvent, mpsc::UnboundedReceiver<GroupEvent>)>,
    },
    SubscriberCount {
        reply: oneshot::Sender<usize>,
    },
}

/// Cloneable handle to a running group actor.
#[derive(Clone)]
pub struct GroupHandle {
    tx: mpsc::Sender<Command>,
}

impl GroupHandle {
    async fn call<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, GroupError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .map_err(|_| GroupError::internal("Group actor is not running"))?;
        rx.await
            .map_err(|_| GroupError::internal("Group actor dropped the request"))
    }

    pub async fn group(&self) -> Result<Group, GroupError> {
        self.call(|reply| Command::GetGroup { reply }).await
    }

    pub async fn participants(&self) -> Result<Vec<Participant>, GroupError> {
        self.call(|reply| Command::GetParticipants { reply }).await
    }

    pub async fn rename(&self, name: String) -> Result<Group, GroupError> {
        self.call(|reply| Command::Rename { name, reply }).await?
    }

    pub async fn add_participant(&self, body: AddParticipant) -> Result<Participant, GroupError> {
        self.call(|reply| Command::AddParticipant { body, reply })
            .await?
    }

    pub async fn update_participant(
        &self,
        participant_id: String,
        body: UpdateParticipant,
    ) -> Result<Participant, GroupError> {
        self.call(|reply| Command::UpdateParticipant {
            participant_id,
            body,
            reply,
        })
        .await?
    }

    pub async fn remove_participant(&self, participant_id: String) -> Result<(), GroupError> {
        self.call(|reply| Command::RemoveParticipant {
            participant_id,
            reply,
        })
        .await?
    }

    pub async fn commit_roster(&self, body: RosterCommit) -> Result<Vec<Participant>, GroupError> {
        self.call(|reply| Command::CommitRoster { body, reply })
            .await?
    }

    pub async fn request_spin(&self) -> Result<GroupSpinState, GroupError> {
        self.call(|reply| Command::RequestSpin { reply }).await?
    }

    pub async fn history(&self) -> Result<Vec<SpinHistoryItem>, GroupError> {
        self.call(|reply| Command::ListHistory { reply }).await
    }

    pub async fn save_spin(&self, spin_id: String) -> Result<(), GroupError> {
        self.call(|reply| Command::SaveSpin { spin_id, reply })
            .await?
    }

    pub async fn discard_spin(&self, spin_id: String) -> Result<(), GroupError> {
        self.call(|reply| Command::DiscardSpin { spin_id, reply })
            .await?
    }

    pub async fn subscribe(
        &self,
    ) -> Result<(GroupEvent, mpsc::UnboundedReceiver<GroupEvent>), GroupError> {
        self.call(|reply| Command::Subscribe { reply }).await
    }

    pub async fn subscriber_count(&self) -> usize {
        self.call(|reply| Command::SubscriberCount { reply })
            .await
            .unwrap_or(0)
    }
}

/// Spawn an actor from its checkpoint. A checkpoint mid-spin re-schedules
/// the resolve for the remaining duration so restarts cannot strand a spin.
pub fn spawn(checkpoint: GroupCheckpoint, db: Arc<Db>) -> GroupHandle {
    let (tx, rx) = mpsc::channel(MAILBOX_DEPTH);
    let actor = GroupActor {
        group: checkpoint.group,
        participants: checkpoint.participants,
        spin: checkpoint.spin,
        history: checkpoint.history,
        pending: checkpoint.pending,
        version: checkpoint.version,
        subscribers: HashMap::new(),
        next_subscriber: 0,
        rng: StdRng::from_entropy(),
        db,
        self_tx: tx.clone(),
    };
    if actor.spin.status == SpinStatus::Spinning
        && let Some(spin_id) = actor.spin.spin_id.clone()
    {
        actor.schedule_resolve(spin_id, actor.remaining_spin_time());
    }
    tokio::spawn(actor.run(rx));
    GroupHandle { tx }
}

struct GroupActor {
    group: Group,
    participants: Vec<Participant>,
    spin: GroupSpinState,
    history: Vec<SpinHistoryItem>,
    pending: Option<PendingResult>,
    version: u64,
    subscribers: HashMap<u64, mpsc::UnboundedSender<GroupEvent>>,
    next_subscriber: u64,
    rng: StdRng,
    db: Arc<Db>,
    self_tx: mpsc::Sender<Command>,
}

impl GroupActor {
    async fn run(mut self, mut rx: mpsc::Receiver<Command>) {
        // Single-writer: each command runs to completion, including event
        // emission, before the next is taken off the mailbox.
        while let Some(cmd) = rx.recv().await {
            self.handle(cmd);
        }
    }

    fn handle(&mut self, cmd: Command) {
        match cmd {
            Command::GetGroup { reply } => {
                let _ = reply.send(self.group.clone());
            }
            Command::GetParticipants { reply } => {
                let _ = reply.send(self.participants.clone());
            }
            Command::Rename { name, reply } => {
                let _ = reply.send(self.rename(name));
            }
            Command::AddParticipant { body, reply } => {
                let _ = reply.send(self.add_participant(body));
            }
            Command::UpdateParticipant {
                participant_id,
                body,
                reply,
            } => {
                let _ = reply.send(self.update_participant(&participant_id, body));
            }
            Command::RemoveParticipant {
                participant_id,
                reply,
            } => {
                let _ = reply.send(self.remove_participant(&participant_id));
            }
            Command::CommitRoster { body, reply } => {
                let _ = reply.send(self.commit_roster(body));
            }
            Command::RequestSpin { reply } => {
                let _ = reply.send(self.request_spin());
            }
            Command::ResolveSpin { spin_id } => self.resolve_spin(&spin_id),
            Command::ListHistory { reply } => {
                let mut items = self.history.clone();
                items.reverse();
                let _ = reply.send(items);
            }
            Command::SaveSpin { spin_id, reply } => {
                let _ = reply.send(self.save_spin(&spin_id));
            }
            Command::DiscardSpin { spin_id, reply } => {
                let _ = reply.send(self.discard_spin(&spin_id));
            }
            Command::Subscribe { reply } => {
                let (tx, rx) = mpsc::unbounded_channel();
                let id = self.next_subscriber;
                self.next_subscriber += 1;
                self.subscribers.insert(id, tx);
                let snapshot = GroupEvent::new(
                    "snapshot",
                    &self.group.id,
                    self.version,
                    json!({
                        "group": &self.group,
                        "participants": &self.participants,
                        "spin": &self.spin,
                    }),
                );
                let _ = reply.send((snapshot, rx));
            }
            Command::SubscriberCount { reply } => {
                let _ = reply.send(self.subscribers.len());
            }
        }
    }

    // --- Group ---

    fn rename(&mut self, raw: String) -> Result<Group, GroupError> {
        let name = validate_name(&raw)?;
        self.group.name = name;
        let group = self.group.clone();
        self.commit(vec![("group.updated", json!({"group": group}))]);
        Ok(self.group.clone())
    }

    // --- Roster ---

    fn add_participant(&mut self, body: AddParticipant) -> Result<Participant, GroupError> {
        let p = new_participant(&body)?;
        self.ensure_name_free(&p.name)?;
        self.participants.push(p.clone());
        self.commit(vec![("participant.added", json!({"participant": &p}))]);
        Ok(p)
    }

    fn update_participant(
        &mut self,
        participant_id: &str,
        body: UpdateParticipant,
    ) -> Result<Participant, GroupError> {
        let is_owner = participant_id == self.group.owner_participant_id;
        let Some(idx) = self.participants.iter().position(|p| p.id == participant_id) else {
            return Err(GroupError::not_found("Participant not found"));
        };
        let mut p = self.participants[idx].clone();
        apply_patch(&mut p, &body, is_owner)?;
        self.participants[idx] = p.clone();
        self.commit(vec![("participant.updated", json!({"participant": p}))]);
        Ok(self.participants[idx].clone())
    }

    fn remove_participant(&mut self, participant_id: &str) -> Result<(), GroupError> {
        if participant_id == self.group.owner_participant_id {
            return Err(GroupError::validation(
                "The owner's participant cannot be removed",
            ));
        }
        let Some(idx) = self.participants.iter().position(|p| p.id == participant_id) else {
            return Err(GroupError::not_found("Participant not found"));
        };
        self.participants.remove(idx);
        self.commit(vec![(
            "participant.removed",
            json!({"participantId": participant_id}),
        )]);
        Ok(())
    }

    /// All-or-nothing roster change: validate the full request against the
    /// post-remove roster, then apply removes, updates, adds in that order
    /// under a single version bump.
    fn commit_roster(&mut self, body: RosterCommit) -> Result<Vec<Participant>, GroupError> {
        let mut seen: HashSet<&str> = HashSet::new();
        for id in &body.removes {
            if !seen.insert(id.as_str()) {
                return Err(GroupError::validation("Duplicate participant id in commit"));
            }
            if *id == self.group.owner_participant_id {
                return Err(GroupError::validation(
                    "The owner's participant cannot be removed",
                ));
            }
            if !self.participants.iter().any(|p| p.id == *id) {
                return Err(GroupError::not_found("Participant not found"));
            }
        }
        for up in &body.updates {
            if !seen.insert(up.participant_id.as_str()) {
                return Err(GroupError::validation("Duplicate participant id in commit"));
            }
        }

        let owner_id = self.group.owner_participant_id.clone();
        let mut staged: Vec<Participant> = self
            .participants
            .iter()
            .filter(|p| !body.removes.contains(&p.id))
            .cloned()
            .collect();

        for up in &body.updates {
            let Some(p) = staged.iter_mut().find(|p| p.id == up.participant_id) else {
                return Err(GroupError::not_found("Participant not found"));
            };
            let is_owner = p.id == owner_id;
            apply_patch(p, &up.patch(), is_owner)?;
        }

        let mut names: HashSet<String> = staged.iter().map(|p| folded(&p.name)).collect();
        let mut added: Vec<Participant> = Vec::new();
        for add in &body.adds {
            let p = new_participant(add)?;
            if !names.insert(folded(&p.name)) {
                return Err(GroupError::conflict(
                    "Participant with this name already exists",
                ));
            }
            added.push(p);
        }

        let updated: Vec<Participant> = body
            .updates
            .iter()
            .filter_map(|up| staged.iter().find(|p| p.id == up.participant_id).cloned())
            .collect();

        staged.extend(added.iter().cloned());
        self.participants = staged;

        let mut events = Vec::new();
        for id in &body.removes {
            events.push(("participant.removed", json!({"participantId": id})));
        }
        for p in &updated {
            events.push(("participant.updated", json!({"participant": p})));
        }
        for p in &added {
            events.push(("participant.added", json!({"participant": p})));
        }
        if !events.is_empty() {
            self.commit(events);
        }
        Ok(self.participants.clone())
    }

    fn ensure_name_free(&self, name: &str) -> Result<(), GroupError> {
        let key = folded(name);
        if self.participants.iter().any(|p| folded(&p.name) == key) {
            return Err(GroupError::conflict(
                "Participant with this name already exists",
            ));
        }
        Ok(())
    }

    // --- Spin state machine ---

    fn request_spin(&mut self) -> Result<GroupSpinState, GroupError> {
        if self.spin.status == SpinStatus::Spinning {
            return Err(GroupError::conflict("A spin is already running"));
        }
        let active: Vec<&Participant> = self.participants.iter().filter(|p| p.active).collect();
        let winner_id = crate::selection::draw(&active, &mut self.rng)?.id.clone();

        let spin_id = uuid::Uuid::new_v4().to_string();
        let duration_ms: u64 = self.rng.gen_range(4000..6000);
        let extra_turns: u8 = self.rng.gen_range(6..=8);
        self.spin = GroupSpinState {
            status: SpinStatus::Spinning,
            spin_id: Some(spin_id.clone()),
            started_at: Some(Utc::now().to_rfc3339()),
            winner_participant_id: Some(winner_id),
            duration_ms: Some(duration_ms),
            extra_turns: Some(extra_turns),
            resolved_at: None,
        };
        self.schedule_resolve(spin_id, Duration::from_millis(duration_ms));
        let spin = self.spin.clone();
        self.commit(vec![("spin.started", json!({"spin": spin}))]);
        Ok(self.spin.clone())
    }

    fn schedule_resolve(&self, spin_id: String, delay: Duration) {
        let tx = self.self_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(Command::ResolveSpin { spin_id }).await;
        });
    }

    fn remaining_spin_time(&self) -> Duration {
        let duration_ms = self.spin.duration_ms.unwrap_or(0);
        let Some(started) = self
            .spin
            .started_at
            .as_deref()
            .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
        else {
            return Duration::ZERO;
        };
        let deadline = started.with_timezone(&Utc) + chrono::Duration::milliseconds(duration_ms as i64);
        (deadline - Utc::now())
            .to_std()
            .unwrap_or(Duration::ZERO)
    }

    /// Deferred resolution. A stale spin id means this spin was superseded;
    /// the timer fires into nothing.
    fn resolve_spin(&mut self, spin_id: &str) {
        if self.spin.status != SpinStatus::Spinning
            || self.spin.spin_id.as_deref() != Some(spin_id)
        {
            return;
        }
        let winner_id = self.spin.winner_participant_id.clone().unwrap_or_default();
        let now = Utc::now();

        // The precomputed winner stands even if it went inactive or was
        // removed mid-spin; in that case its counter is left untouched.
        let mut counters: BTreeMap<String, u32> = BTreeMap::new();
        let mut affected: Vec<Participant> = Vec::new();
        for p in self.participants.iter_mut() {
            if !p.active {
                continue;
            }
            counters.insert(p.id.clone(), p.spins_since_last_won);
            if p.id == winner_id {
                p.spins_since_last_won = 0;
            } else {
                p.spins_since_last_won += 1;
            }
            affected.push(p.clone());
        }

        let snapshot: Vec<Participant> =
            self.participants.iter().filter(|p| p.active).cloned().collect();
        self.history.push(SpinHistoryItem {
            id: spin_id.to_string(),
            created_at: now.to_rfc3339(),
            winner_participant_id: winner_id,
            participants: snapshot,
        });
        if self.history.len() > HISTORY_LIMIT {
            let excess = self.history.len() - HISTORY_LIMIT;
            self.history.drain(..excess);
        }

        self.pending = Some(PendingResult {
            spin_id: spin_id.to_string(),
            counters,
            expires_at: now + chrono::Duration::minutes(PENDING_TTL_MINUTES),
        });
        self.spin.status = SpinStatus::Idle;
        self.spin.resolved_at = Some(now.to_rfc3339());

        let mut events = vec![("spin.resolved", json!({"spin": self.spin.clone()}))];
        for p in &affected {
            events.push(("participant.updated", json!({"participant": p})));
        }
        self.commit(events);
    }

    fn save_spin(&mut self, spin_id: &str) -> Result<(), GroupError> {
        let matches = self
            .pending
            .as_ref()
            .is_some_and(|p| p.spin_id == spin_id);
        if !matches {
            return Ok(());
        }
        let expired = self
            .pending
            .as_ref()
            .is_some_and(|p| Utc::now() >= p.expires_at);
        self.pending = None;
        self.clear_resolved_spin(spin_id);
        if expired {
            // Expired pendings behave as already saved: consume silently.
            self.checkpoint();
        } else {
            self.commit(vec![(
                "spin.result.dismissed",
                json!({"spinId": spin_id, "action": "save"}),
            )]);
        }
        Ok(())
    }

    fn discard_spin(&mut self, spin_id: &str) -> Result<(), GroupError> {
        let now = Utc::now();
        let live = self
            .pending
            .as_ref()
            .is_some_and(|p| p.spin_id == spin_id && now < p.expires_at);
        if !live {
            // Expired or already consumed: the history entry still goes, but
            // counters stand and no dismissal is emitted.
            if self.pending.as_ref().is_some_and(|p| p.spin_id == spin_id) {
                self.pending = None;
            }
            let before = self.history.len();
            self.history.retain(|item| item.id != spin_id);
            self.clear_resolved_spin(spin_id);
            if self.history.len() != before {
                self.checkpoint();
            }
            return Ok(());
        }

        let Some(pending) = self.pending.take() else {
            return Ok(());
        };
        let mut reverted: Vec<Participant> = Vec::new();
        for p in self.participants.iter_mut() {
            if let Some(previous) = pending.counters.get(&p.id) {
                p.spins_since_last_won = *previous;
                reverted.push(p.clone());
            }
        }
        self.history.retain(|item| item.id != spin_id);
        self.clear_resolved_spin(spin_id);

        let mut events: Vec<(&'static str, serde_json::Value)> = reverted
            .iter()
            .map(|p| ("participant.updated", json!({"participant": p})))
            .collect();
        events.push((
            "spin.result.dismissed",
            json!({"spinId": spin_id, "action": "discard"}),
        ));
        self.commit(events);
        Ok(())
    }

    /// After a save/discard the idle state sheds its spin-specific fields;
    /// `resolvedAt` stays as the last resolution instant. Guarded so a newer
    /// in-flight spin is never touched.
    fn clear_resolved_spin(&mut self, spin_id: &str) {
        if self.spin.status == SpinStatus::Idle && self.spin.spin_id.as_deref() == Some(spin_id) {
            self.spin.spin_id = None;
            self.spin.started_at = None;
            self.spin.winner_participant_id = None;
            self.spin.duration_ms = None;
            self.spin.extra_turns = None;
        }
    }

    // --- Versioning, persistence, fan-out ---

    /// One state-change transaction: bump the version once, checkpoint, then
    /// broadcast the events stamped with that version.
    fn commit(&mut self, events: Vec<(&'static str, serde_json::Value)>) {
        self.version += 1;
        self.checkpoint();
        let ts = Utc::now().to_rfc3339();
        let envelopes: Vec<GroupEvent> = events
            .into_iter()
            .map(|(event_type, payload)| GroupEvent {
                event_type: event_type.to_string(),
                group_id: self.group.id.clone(),
                version: self.version,
                ts: ts.clone(),
                payload,
            })
            .collect();
        self.broadcast(&envelopes);
    }

    fn checkpoint(&self) {
        let checkpoint = GroupCheckpoint {
            group: self.group.clone(),
            participants: self.participants.clone(),
            spin: self.spin.clone(),
            history: self.history.clone(),
            pending: self.pending.clone(),
            version: self.version,
        };
        let state_json = match serde_json::to_string(&checkpoint) {
            Ok(json) => json,
            Err(e) => {
                eprintln!("⚠️ Checkpoint serialize failed for group {}: {e}", self.group.id);
                return;
            }
        };
        if let Err(e) = self.db.save_group(&self.group.id, &state_json, self.version) {
            eprintln!("⚠️ Checkpoint write failed for group {}: {e}", self.group.id);
        }
    }

    /// Fan out to every subscriber; a failed send means the transport is
    /// gone, so the subscriber is dropped on the spot.
    fn broadcast(&mut self, events: &[GroupEvent]) {
        self.subscribers
            .retain(|_, tx| events.iter().all(|ev| tx.send(ev.clone()).is_ok()));
    }
}

fn new_participant(body: &AddParticipant) -> Result<Participant, GroupError> {
    let name = validate_name(&body.name)?;
    let email_id = match &body.email_id {
        Some(raw) if !raw.trim().is_empty() => Some(validate_email(raw)?),
        _ => None,
    };
    if body.manager && email_id.is_none() {
        return Err(GroupError::validation("A manager requires a verified email"));
    }
    Ok(Participant {
        id: uuid::Uuid::new_v4().to_string(),
        name,
        active: true,
        email_id,
        manager: body.manager,
        spins_since_last_won: 0,
    })
}

fn apply_patch(
    p: &mut Participant,
    patch: &UpdateParticipant,
    is_owner: bool,
) -> Result<(), GroupError> {
    if is_owner {
        if patch.email_id.is_some() {
            return Err(GroupError::validation("The owner's email cannot be changed"));
        }
        if patch.manager.is_some_and(|m| !m) {
            return Err(GroupError::validation("The owner is always a manager"));
        }
        if patch.active.is_some_and(|a| !a) {
            return Err(GroupError::validation(
                "The owner's participant cannot be deactivated",
            ));
        }
    }
    if let Some(active) = patch.active {
        p.active = active;
    }
    match &patch.email_id {
        Some(Some(raw)) => {
            p.email_id = Some(validate_email(raw)?);
        }
        Some(None) => {
            // Clearing the email demotes a manager.
            p.email_id = None;
            p.manager = false;
        }
        None => {}
    }
    if let Some(manager) = patch.manager {
        if manager && p.email_id.is_none() {
            return Err(GroupError::validation("A manager requires a verified email"));
        }
        p.manager = manager;
    }
    Ok(())
}
