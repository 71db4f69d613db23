use rocket::http::{ContentType, Cookie, Header, Status};
use rocket::local::blocking::{Client, LocalRequest};
use rocket::serde::DeserializeOwned;
use std::env;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use usageregi::accounts::AccountRequest;
use usageregi::base::AdminContext;
use usageregi::model::User;
use usageregi::usage::{RemainingQuota, UsageRequest};

pub const SERVICE_TOKEN: &str = "test-service-token";

static SEQ: AtomicU32 = AtomicU32::new(0);

pub fn setup() -> Client {
    env::set_var("ROCKET_PROFILE", "test");

    let rocket = usageregi::rocket();
    Client::tracked(rocket).unwrap()
}

pub fn with_service_token(req: LocalRequest) -> LocalRequest {
    req.header(Header::new("X-Service-Token", SERVICE_TOKEN))
}

pub fn with_admin_login(req: LocalRequest) -> LocalRequest {
    let ctx = AdminContext {
        admin_user: String::from("auditor"),
    };
    req.private_cookie(Cookie::new("admin", serde_json::to_string(&ctx).unwrap()))
}

fn nanos() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos()
}

/// Emails and IPs are unique per test run so reruns against the same
/// test database never collide.
pub fn unique_email(tag: &str) -> String {
    format!(
        "{}-{}-{}@example.com",
        tag,
        nanos(),
        SEQ.fetch_add(1, Ordering::SeqCst)
    )
}

pub fn unique_name(tag: &str) -> String {
    format!("{}-{}", tag, nanos())
}

pub fn unique_ip() -> String {
    let n = nanos() / 7 + SEQ.fetch_add(1, Ordering::SeqCst) as u128;
    format!("10.{}.{}.{}", n % 199 + 1, (n / 251) % 251, (n / 63001) % 251)
}

pub fn json_ok_response<T>(req: LocalRequest) -> T
where
    T: Send + DeserializeOwned + 'static,
{
    let response = req.dispatch();
    assert_eq!(response.status(), Status::Ok);
    assert_eq!(response.content_type(), Some(ContentType::JSON));
    response.into_json().unwrap()
}

pub fn create_account(client: &Client, email: &str, ip: &str) -> User {
    let body = serde_json::to_string(&AccountRequest {
        email: String::from(email),
        ip_address: String::from(ip),
    })
    .unwrap();
    json_ok_response(with_service_token(client.post("/api/accounts")).body(body))
}

pub fn usage_request(email: Option<&str>, ip: &str, count: i32) -> String {
    serde_json::to_string(&UsageRequest {
        email: email.map(String::from),
        ip_address: String::from(ip),
        questions_generated: count,
        source_type: Some(String::from("USER_DOCS")),
        category: Some(String::from("General Education")),
        difficulty: Some(String::from("Medium")),
        notes: None,
    })
    .unwrap()
}

pub fn record_usage(client: &Client, email: Option<&str>, ip: &str, count: i32) -> RemainingQuota {
    json_ok_response(
        with_service_token(client.post("/api/usage")).body(usage_request(email, ip, count)),
    )
}

pub fn record_usage_status(client: &Client, email: Option<&str>, ip: &str, count: i32) -> Status {
    with_service_token(client.post("/api/usage"))
        .body(usage_request(email, ip, count))
        .dispatch()
        .status()
}

pub fn get_account(client: &Client, email: &str) -> User {
    json_ok_response(with_service_token(client.get(format!("/api/accounts/{}", email))))
}

pub fn submit_payment(client: &Client, full_name: &str, email: &str, plan: &str) -> i32 {
    let body = format!(
        "{{\"full_name\":\"{}\",\"email\":\"{}\",\"gcash_ref\":\"REF-001\",\"plan_requested\":\"{}\",\"receipt_storage_path\":\"@receipts/{}.jpg\"}}",
        full_name, email, plan, email
    );
    json_ok_response(with_service_token(client.post("/api/payments")).body(body))
}
