use rocket::http::{ContentType, Status};

use crate::common::{bearer, create_test_group, test_client, token};

#[test]
fn test_health() {
    let client = test_client();
    let res = client.get("/health").dispatch();
    assert_eq!(res.status(), Status::Ok);
    let body: serde_json::Value = res.into_json().unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "unfair-wheel");
}

#[test]
fn test_stats_counts_groups() {
    let client = test_client();
    let t = token("u1", "User One", &["u1@x"]);
    create_test_group(&client, &t, "Alpha");
    create_test_group(&client, &t, "Beta");

    let res = client.get("/stats").dispatch();
    assert_eq!(res.status(), Status::Ok);
    let body: serde_json::Value = res.into_json().unwrap();
    assert_eq!(body["groups"], 2);
}

#[test]
fn test_unknown_path_is_json_404() {
    let client = test_client();
    let res = client.get("/nope").dispatch();
    assert_eq!(res.status(), Status::NotFound);
    let body: serde_json::Value = res.into_json().unwrap();
    assert_eq!(body["error"], "Not found");
}

#[test]
fn test_malformed_body_is_400() {
    let client = test_client();
    let t = token("u1", "User One", &["u1@x"]);
    let res = client
        .post("/groups")
        .header(ContentType::JSON)
        .header(bearer(&t))
        .body("{not json")
        .dispatch();
    assert_eq!(res.status(), Status::BadRequest);
}
