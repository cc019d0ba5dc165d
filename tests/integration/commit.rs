use rocket::http::{ContentType, Status};

use crate::common::{add_test_participant, bearer, create_test_group, test_client, token};

fn setup() -> (crate::common::TestClient, String, String) {
    let client = test_client();
    let t = token("u1", "User One", &["u1@x"]);
    let group = create_test_group(&client, &t, "Commit Group");
    let id = group["id"].as_str().unwrap().to_string();
    (client, t, id)
}

fn names(client: &rocket::local::blocking::Client, group_id: &str) -> Vec<String> {
    let res = client
        .get(format!("/groups/{group_id}/participants"))
        .dispatch();
    let list: Vec<serde_json::Value> = res.into_json().unwrap();
    list.iter()
        .map(|p| p["name"].as_str().unwrap().to_string())
        .collect()
}

#[test]
fn test_commit_applies_removes_updates_adds() {
    let (client, t, id) = setup();
    let ada = add_test_participant(&client, &t, &id, "Ada", Some("ada@x"));
    let ben = add_test_participant(&client, &t, &id, "Ben", None);
    let ada_id = ada["id"].as_str().unwrap();
    let ben_id = ben["id"].as_str().unwrap();

    let body = serde_json::json!({
        "removes": [ben_id],
        "updates": [{"participantId": ada_id, "active": false}],
        "adds": [{"name": "Cid", "emailId": "cid@x"}],
    });
    let res = client
        .post(format!("/groups/{id}/participants/commit"))
        .header(ContentType::JSON)
        .header(bearer(&t))
        .body(body.to_string())
        .dispatch();
    assert_eq!(res.status(), Status::Ok);
    let list: Vec<serde_json::Value> = res.into_json().unwrap();

    assert!(list.iter().all(|p| p["id"] != ben_id));
    let ada_after = list.iter().find(|p| p["id"] == ada_id).unwrap();
    assert_eq!(ada_after["active"], false);
    assert!(list.iter().any(|p| p["name"] == "Cid"));
}

#[test]
fn test_commit_duplicate_add_name_rejected_without_side_effects() {
    let (client, t, id) = setup();
    add_test_participant(&client, &t, &id, "Ada", Some("ada@x"));
    let before = names(&client, &id);

    let body = serde_json::json!({"adds": [{"name": "Ada"}], "updates": [], "removes": []});
    let res = client
        .post(format!("/groups/{id}/participants/commit"))
        .header(ContentType::JSON)
        .header(bearer(&t))
        .body(body.to_string())
        .dispatch();
    assert_eq!(res.status(), Status::Conflict);
    assert_eq!(names(&client, &id), before);
}

#[test]
fn test_commit_rejects_unknown_remove() {
    let (client, t, id) = setup();
    let before = names(&client, &id);

    let body = serde_json::json!({"adds": [], "updates": [], "removes": ["missing"]});
    let res = client
        .post(format!("/groups/{id}/participants/commit"))
        .header(ContentType::JSON)
        .header(bearer(&t))
        .body(body.to_string())
        .dispatch();
    assert_eq!(res.status(), Status::NotFound);
    assert_eq!(names(&client, &id), before);
}

#[test]
fn test_commit_rejects_update_of_removed_id() {
    let (client, t, id) = setup();
    let ada = add_test_participant(&client, &t, &id, "Ada", None);
    let ada_id = ada["id"].as_str().unwrap();

    let body = serde_json::json!({
        "adds": [],
        "updates": [{"participantId": ada_id, "active": false}],
        "removes": [ada_id],
    });
    let res = client
        .post(format!("/groups/{id}/participants/commit"))
        .header(ContentType::JSON)
        .header(bearer(&t))
        .body(body.to_string())
        .dispatch();
    assert_eq!(res.status(), Status::BadRequest);
}

#[test]
fn test_commit_rejects_owner_removal() {
    let (client, t, id) = setup();
    let res = client.get(format!("/groups/{id}")).dispatch();
    let group: serde_json::Value = res.into_json().unwrap();
    let owner_pid = group["ownerParticipantId"].as_str().unwrap();

    let body = serde_json::json!({"adds": [], "updates": [], "removes": [owner_pid]});
    let res = client
        .post(format!("/groups/{id}/participants/commit"))
        .header(ContentType::JSON)
        .header(bearer(&t))
        .body(body.to_string())
        .dispatch();
    assert_eq!(res.status(), Status::BadRequest);
}

#[test]
fn test_commit_rejects_manager_without_email_in_adds() {
    let (client, t, id) = setup();
    let body = serde_json::json!({"adds": [{"name": "Cid", "manager": true}], "updates": [], "removes": []});
    let res = client
        .post(format!("/groups/{id}/participants/commit"))
        .header(ContentType::JSON)
        .header(bearer(&t))
        .body(body.to_string())
        .dispatch();
    assert_eq!(res.status(), Status::BadRequest);
}

#[test]
fn test_commit_requires_manager_role() {
    let (client, t, id) = setup();
    add_test_participant(&client, &t, &id, "Ada", Some("ada@x"));

    let ada = token("u-ada", "Ada", &["ada@x"]);
    let body = serde_json::json!({"adds": [{"name": "Eve"}], "updates": [], "removes": []});
    let res = client
        .post(format!("/groups/{id}/participants/commit"))
        .header(ContentType::JSON)
        .header(bearer(&ada))
        .body(body.to_string())
        .dispatch();
    assert_eq!(res.status(), Status::Forbidden);
}

#[test]
fn test_commit_inverse_restores_roster() {
    let (client, t, id) = setup();
    let ben = add_test_participant(&client, &t, &id, "Ben", Some("ben@x"));
    let ben_id = ben["id"].as_str().unwrap();
    let mut before = names(&client, &id);
    before.sort();

    let body = serde_json::json!({
        "removes": [ben_id],
        "updates": [],
        "adds": [{"name": "Cid"}],
    });
    let res = client
        .post(format!("/groups/{id}/participants/commit"))
        .header(ContentType::JSON)
        .header(bearer(&t))
        .body(body.to_string())
        .dispatch();
    assert_eq!(res.status(), Status::Ok);
    let list: Vec<serde_json::Value> = res.into_json().unwrap();
    let cid_id = list
        .iter()
        .find(|p| p["name"] == "Cid")
        .unwrap()["id"]
        .as_str()
        .unwrap()
        .to_string();

    // Inverse commit: remove Cid, re-add Ben. Participant ids differ but the
    // name set is restored.
    let body = serde_json::json!({
        "removes": [cid_id],
        "updates": [],
        "adds": [{"name": "Ben", "emailId": "ben@x"}],
    });
    let res = client
        .post(format!("/groups/{id}/participants/commit"))
        .header(ContentType::JSON)
        .header(bearer(&t))
        .body(body.to_string())
        .dispatch();
    assert_eq!(res.status(), Status::Ok);

    let mut after = names(&client, &id);
    after.sort();
    assert_eq!(after, before);
}

#[test]
fn test_empty_commit_is_a_noop() {
    let (client, t, id) = setup();
    let before = names(&client, &id);
    let body = serde_json::json!({"adds": [], "updates": [], "removes": []});
    let res = client
        .post(format!("/groups/{id}/participants/commit"))
        .header(ContentType::JSON)
        .header(bearer(&t))
        .body(body.to_string())
        .dispatch();
    assert_eq!(res.status(), Status::Ok);
    assert_eq!(names(&client, &id), before);
}
