use rocket::http::{ContentType, Status};

use crate::common::{add_test_participant, bearer, create_test_group, test_client, token};

fn setup_with_roster() -> (crate::common::TestClient, String, String) {
    let client = test_client();
    let t = token("u1", "User One", &["u1@x"]);
    let group = create_test_group(&client, &t, "Spin Group");
    let id = group["id"].as_str().unwrap().to_string();
    add_test_participant(&client, &t, &id, "Ada", Some("ada@x"));
    add_test_participant(&client, &t, &id, "Ben", Some("ben@x"));
    (client, t, id)
}

#[test]
fn test_spin_requires_two_active() {
    let client = test_client();
    let t = token("u1", "User One", &["u1@x"]);
    let group = create_test_group(&client, &t, "Lonely");
    let id = group["id"].as_str().unwrap();

    // Only the owner is active.
    let res = client
        .post(format!("/groups/{id}/spin"))
        .header(bearer(&t))
        .dispatch();
    assert_eq!(res.status(), Status::Conflict);

    // A second active participant is enough.
    add_test_participant(&client, &t, id, "Ada", None);
    let res = client
        .post(format!("/groups/{id}/spin"))
        .header(bearer(&t))
        .dispatch();
    assert_eq!(res.status(), Status::Accepted);
}

#[test]
fn test_spin_response_shape() {
    let (client, t, id) = setup_with_roster();
    let res = client
        .post(format!("/groups/{id}/spin"))
        .header(bearer(&t))
        .dispatch();
    assert_eq!(res.status(), Status::Accepted);
    let body: serde_json::Value = res.into_json().unwrap();
    let spin = &body["spin"];
    assert_eq!(spin["status"], "spinning");
    assert!(!spin["spinId"].as_str().unwrap().is_empty());
    assert!(!spin["winnerParticipantId"].as_str().unwrap().is_empty());
    let duration = spin["durationMs"].as_u64().unwrap();
    assert!((4000..6000).contains(&duration));
    let turns = spin["extraTurns"].as_u64().unwrap();
    assert!((6..=8).contains(&turns));
    assert!(spin["startedAt"].as_str().unwrap().contains('T'));
}

#[test]
fn test_spin_while_spinning_conflicts() {
    let (client, t, id) = setup_with_roster();
    let res = client
        .post(format!("/groups/{id}/spin"))
        .header(bearer(&t))
        .dispatch();
    assert_eq!(res.status(), Status::Accepted);

    let res = client
        .post(format!("/groups/{id}/spin"))
        .header(bearer(&t))
        .dispatch();
    assert_eq!(res.status(), Status::Conflict);
}

#[test]
fn test_spin_gates() {
    let (client, _t, id) = setup_with_roster();

    // Unauthenticated spin is a 401; outsiders get 403 but can still read
    // the public roster.
    let res = client.post(format!("/groups/{id}/spin")).dispatch();
    assert_eq!(res.status(), Status::Unauthorized);

    let outsider = token("u9", "Outsider", &["u9@x"]);
    let res = client
        .post(format!("/groups/{id}/spin"))
        .header(bearer(&outsider))
        .dispatch();
    assert_eq!(res.status(), Status::Forbidden);

    let res = client.get(format!("/groups/{id}/participants")).dispatch();
    assert_eq!(res.status(), Status::Ok);
}

#[test]
fn test_history_gates_and_empty() {
    let (client, t, id) = setup_with_roster();

    let outsider = token("u9", "Outsider", &["u9@x"]);
    let res = client
        .get(format!("/groups/{id}/history"))
        .header(bearer(&outsider))
        .dispatch();
    assert_eq!(res.status(), Status::Forbidden);

    let res = client
        .get(format!("/groups/{id}/history"))
        .header(bearer(&t))
        .dispatch();
    assert_eq!(res.status(), Status::Ok);
    let items: Vec<serde_json::Value> = res.into_json().unwrap();
    assert!(items.is_empty());
}

#[test]
fn test_save_and_discard_unknown_spin_are_noops() {
    let (client, t, id) = setup_with_roster();

    let res = client
        .post(format!("/groups/{id}/history/not-a-spin/save"))
        .header(bearer(&t))
        .dispatch();
    assert_eq!(res.status(), Status::NoContent);

    let res = client
        .delete(format!("/groups/{id}/history/not-a-spin"))
        .header(bearer(&t))
        .dispatch();
    assert_eq!(res.status(), Status::NoContent);
}

#[test]
fn test_spin_not_found_group() {
    let client = test_client();
    let t = token("u1", "User One", &["u1@x"]);
    let res = client
        .post("/groups/unknown/spin")
        .header(bearer(&t))
        .dispatch();
    assert_eq!(res.status(), Status::NotFound);
}

/// End-to-end resolve over real time: one deliberately slow test. The spin
/// resolves within 6 seconds; counters shift, the history gains an entry,
/// saving is idempotent, and a post-save discard still removes the entry.
#[test]
fn test_spin_resolves_end_to_end() {
    let (client, t, id) = setup_with_roster();

    let res = client
        .post(format!("/groups/{id}/spin"))
        .header(bearer(&t))
        .dispatch();
    assert_eq!(res.status(), Status::Accepted);
    let body: serde_json::Value = res.into_json().unwrap();
    let spin_id = body["spin"]["spinId"].as_str().unwrap().to_string();
    let winner_id = body["spin"]["winnerParticipantId"]
        .as_str()
        .unwrap()
        .to_string();

    std::thread::sleep(std::time::Duration::from_millis(6500));

    let res = client
        .get(format!("/groups/{id}/history"))
        .header(bearer(&t))
        .dispatch();
    let items: Vec<serde_json::Value> = res.into_json().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["id"], spin_id.as_str());
    assert_eq!(items[0]["winnerParticipantId"], winner_id.as_str());
    assert_eq!(items[0]["participants"].as_array().unwrap().len(), 3);

    // Winner reset to zero, both active non-winners incremented.
    let res = client.get(format!("/groups/{id}/participants")).dispatch();
    let participants: Vec<serde_json::Value> = res.into_json().unwrap();
    for p in &participants {
        let expected = if p["id"] == winner_id.as_str() { 0 } else { 1 };
        assert_eq!(p["spinsSinceLastWon"], expected, "participant {}", p["name"]);
    }

    // Save is idempotent.
    let res = client
        .post(format!("/groups/{id}/history/{spin_id}/save"))
        .header(bearer(&t))
        .dispatch();
    assert_eq!(res.status(), Status::NoContent);
    let res = client
        .post(format!("/groups/{id}/history/{spin_id}/save"))
        .header(bearer(&t))
        .dispatch();
    assert_eq!(res.status(), Status::NoContent);

    // Counters stand after save.
    let res = client.get(format!("/groups/{id}/participants")).dispatch();
    let participants: Vec<serde_json::Value> = res.into_json().unwrap();
    let winner = participants
        .iter()
        .find(|p| p["id"] == winner_id.as_str())
        .unwrap();
    assert_eq!(winner["spinsSinceLastWon"], 0);

    // Discard after save removes the history entry without reverting.
    let res = client
        .delete(format!("/groups/{id}/history/{spin_id}"))
        .header(bearer(&t))
        .dispatch();
    assert_eq!(res.status(), Status::NoContent);
    let res = client
        .get(format!("/groups/{id}/history"))
        .header(bearer(&t))
        .dispatch();
    let items: Vec<serde_json::Value> = res.into_json().unwrap();
    assert!(items.is_empty());
}

#[test]
fn test_spin_ignores_inactive_participants() {
    let client = test_client();
    let t = token("u1", "User One", &["u1@x"]);
    let group = create_test_group(&client, &t, "Inactives");
    let id = group["id"].as_str().unwrap();
    let ada = add_test_participant(&client, &t, id, "Ada", None);
    let ada_id = ada["id"].as_str().unwrap();

    // Deactivate Ada: back to one active participant.
    let res = client
        .patch(format!("/groups/{id}/participants/{ada_id}"))
        .header(ContentType::JSON)
        .header(bearer(&t))
        .body(r#"{"active": false}"#)
        .dispatch();
    assert_eq!(res.status(), Status::Ok);

    let res = client
        .post(format!("/groups/{id}/spin"))
        .header(bearer(&t))
        .dispatch();
    assert_eq!(res.status(), Status::Conflict);
}
