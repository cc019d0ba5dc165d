use serde::Serialize;

/// Envelope shared by every realtime event. `version` is the actor's
/// transaction counter; events emitted by one transaction share it so clients
/// can drop anything older than their last-seen value.
#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct GroupEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub group_id: String,
    pub version: u64,
    pub ts: String,
    pub payload: serde_json::Value,
}

impl GroupEvent {
    pub fn new(event_type: &str, group_id: &str, version: u64, payload: serde_json::Value) -> Self {
        GroupEvent {
            event_type: event_type.to_string(),
            group_id: group_id.to_string(),
            version,
            ts: chrono::Utc::now().to_rfc3339(),
            payload,
        }
    }
}
