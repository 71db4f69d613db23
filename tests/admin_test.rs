mod common;

use common::{
    create_account, get_account, json_ok_response, record_usage, setup, submit_payment,
    unique_email, unique_ip, with_admin_login, with_service_token,
};
use rocket::http::Status;
use serial_test::serial;
use usageregi::model::{AdminAction, Payment, UsageLog, User};

#[test]
#[serial]
fn quota_adjustment_and_plan_change() {
    let client = setup();

    let email = unique_email("adjust");
    create_account(&client, &email, &unique_ip());

    let response =
        with_admin_login(client.put(format!("/api/accounts/{}/quota?quota=42", email))).dispatch();
    assert_eq!(Status::NoContent, response.status());
    assert_eq!(42, get_account(&client, &email).questions_remaining);

    let user: User = json_ok_response(with_admin_login(
        client.put(format!("/api/accounts/{}/plan?plan=PREMIUM", email)),
    ));
    assert_eq!("PREMIUM", &user.plan_status);
    assert_eq!(9999, user.questions_remaining);
    assert!(user.premium_expiry.is_some());

    let user: User = json_ok_response(with_admin_login(
        client.put(format!("/api/accounts/{}/plan?plan=FREE", email)),
    ));
    assert_eq!("FREE", &user.plan_status);
    assert_eq!(15, user.questions_remaining);
    assert!(user.premium_expiry.is_none());

    // a plan outside the three tiers is refused
    let response =
        with_admin_login(client.put(format!("/api/accounts/{}/plan?plan=GOLD", email))).dispatch();
    assert_eq!(Status::UnprocessableEntity, response.status());

    let actions: Vec<AdminAction> =
        json_ok_response(with_admin_login(client.get("/api/admin/actions?limit=20")));
    assert!(actions.iter().any(|a| a.action_type == "QUOTA_ADJUSTED"));
    assert!(actions.iter().any(|a| a.action_type == "PLAN_CHANGED"));
}

#[test]
#[serial]
fn blocking_is_idempotent_and_audited() {
    let client = setup();

    let email = unique_email("blocked");
    let ip = unique_ip();
    create_account(&client, &email, &ip);

    for _ in 0..2 {
        let response =
            with_admin_login(client.put(format!("/api/admin/users/{}/block", email))).dispatch();
        assert_eq!(Status::NoContent, response.status());
    }
    assert!(get_account(&client, &email).is_blocked);

    // blocking an address nobody has used yet creates its row
    let fresh_ip = unique_ip();
    for _ in 0..2 {
        let response =
            with_admin_login(client.put(format!("/api/admin/ips/{}/block", fresh_ip))).dispatch();
        assert_eq!(Status::NoContent, response.status());
    }
    let response = with_service_token(
        client
            .post("/api/usage")
            .body(common::usage_request(None, &fresh_ip, 1)),
    )
    .dispatch();
    assert_eq!(Status::Forbidden, response.status());

    let response =
        with_admin_login(client.put(format!("/api/admin/ips/{}/unblock", fresh_ip))).dispatch();
    assert_eq!(Status::NoContent, response.status());
    let quota = record_usage(&client, None, &fresh_ip, 1);
    assert_eq!(0, quota.questions_remaining);

    let actions: Vec<AdminAction> =
        json_ok_response(with_admin_login(client.get("/api/admin/actions?limit=20")));
    assert!(actions.iter().any(|a| a.action_type == "USER_BLOCKED"));
    assert!(actions.iter().any(|a| a.action_type == "IP_BLOCKED"));
    assert!(actions.iter().any(|a| a.action_type == "IP_UNBLOCKED"));
}

#[test]
#[serial]
fn blocking_unknown_user_not_found() {
    let client = setup();

    let response = with_admin_login(
        client.put(format!("/api/admin/users/{}/block", unique_email("ghost"))),
    )
    .dispatch();
    assert_eq!(Status::NotFound, response.status());
}

#[test]
#[serial]
fn deleting_user_cascades() {
    let client = setup();

    let email = unique_email("cascade");
    let ip = unique_ip();
    create_account(&client, &email, &ip);
    record_usage(&client, Some(&email), &ip, 2);
    submit_payment(&client, "Cascade Case", &email, "PRO");

    let response = with_admin_login(client.delete(format!("/api/accounts/{}", email))).dispatch();
    assert_eq!(Status::NoContent, response.status());

    let response = with_service_token(client.get(format!("/api/accounts/{}", email))).dispatch();
    assert_eq!(Status::NotFound, response.status());

    let logs: Vec<UsageLog> = json_ok_response(with_service_token(
        client.get(format!("/api/usage/logs/{}", email)),
    ));
    assert_eq!(0, logs.len());
    let mine: Vec<Payment> = json_ok_response(with_service_token(
        client.get(format!("/api/payments/user/{}", email)),
    ));
    assert_eq!(0, mine.len());

    let actions: Vec<AdminAction> =
        json_ok_response(with_admin_login(client.get("/api/admin/actions?limit=10")));
    assert!(actions.iter().any(|a| a.action_type == "USER_DELETED"));
}

#[test]
#[serial]
fn returning_user_keeps_remaining_quota() {
    let client = setup();

    let email = unique_email("returning");
    let first_ip = unique_ip();
    create_account(&client, &email, &first_ip);
    record_usage(&client, Some(&email), &first_ip, 5);

    // same account from a new address, quota carries over
    let second_ip = unique_ip();
    let user = create_account(&client, &email, &second_ip);
    assert_eq!(10, user.questions_remaining);
    assert_eq!(Some(second_ip), user.ip_address);
}
