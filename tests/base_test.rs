mod common;

use common::{setup, unique_email, unique_ip, with_service_token};
use rocket::http::{ContentType, Header, Status};
use serial_test::serial;

#[test]
#[serial]
fn health_returns_ok() {
    let client = setup();
    let response = client.get("/health").dispatch();
    assert_eq!(Status::Ok, response.status());
    assert_eq!(Some(ContentType::JSON), response.content_type());
    let cnt = response.into_string().unwrap();
    assert!(cnt.contains("ok"));
}

#[test]
#[serial]
fn api_requires_service_token() {
    let client = setup();

    let response = client
        .post("/api/usage")
        .body(common::usage_request(None, &unique_ip(), 1))
        .dispatch();
    assert_eq!(Status::Unauthorized, response.status());

    let response = client
        .post("/api/usage")
        .header(Header::new("X-Service-Token", "wrong-token"))
        .body(common::usage_request(None, &unique_ip(), 1))
        .dispatch();
    assert_eq!(Status::Unauthorized, response.status());
}

#[test]
#[serial]
fn admin_routes_require_login() {
    let client = setup();

    let response = client.get("/api/accounts").dispatch();
    assert_eq!(Status::Unauthorized, response.status());

    let response = client
        .put(format!("/api/admin/users/{}/block", unique_email("nobody")))
        .dispatch();
    assert_eq!(Status::Unauthorized, response.status());
}

#[test]
#[serial]
fn admin_login_round_trip() {
    let client = setup();

    // wrong password leaves no cookie behind
    let response = client
        .post("/admin/login")
        .body("{\"user\":\"auditor\",\"password\":\"nope\"}")
        .dispatch();
    assert_eq!(Status::Unauthorized, response.status());

    let response = client
        .post("/admin/login")
        .body("{\"user\":\"auditor\",\"password\":\"test-admin-password\"}")
        .dispatch();
    assert_eq!(Status::NoContent, response.status());

    // the tracked client keeps the private cookie, admin routes open up
    let response = client.get("/api/accounts").dispatch();
    assert_eq!(Status::Ok, response.status());

    let response = client.get("/admin/logout").dispatch();
    assert_eq!(Status::NoContent, response.status());
    let response = client.get("/api/accounts").dispatch();
    assert_eq!(Status::Unauthorized, response.status());
}

#[test]
#[serial]
fn service_token_accepted() {
    let client = setup();

    let response = with_service_token(client.get(format!(
        "/api/accounts/{}",
        unique_email("missing")
    )))
    .dispatch();
    assert_eq!(Status::NotFound, response.status());
}
