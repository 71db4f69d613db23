#[macro_use]
extern crate rocket;
#[macro_use]
extern crate diesel_migrations;
#[macro_use]
extern crate diesel;

use rocket::fairing::AdHoc;
use rocket::http::{Cookie, CookieJar, SameSite, Status};
use rocket::outcome::IntoOutcome;
use rocket::request::{FromRequest, Outcome, Request};
use rocket::response::status;
use rocket::serde::json::{Json, Value};
use rocket::tokio::time;
use rocket::{Build, Rocket, State};
use std::time::Duration;

pub mod base;
use base::*;

pub mod model;
pub mod schema;

pub mod accounts;
pub mod admin;
pub mod docs;
pub mod payments;
pub mod usage;

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AdminContext {
    type Error = AcctError;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        request
            .cookies()
            .get_private(ADMIN_COOKIE)
            .map(|c| serde_json::from_str(c.value()).ok())
            .flatten()
            .into_outcome((Status::Unauthorized, AcctError::Unauthorized))
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for ServiceAuth {
    type Error = AcctError;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let presented = request.headers().get_one("X-Service-Token");
        let expected = request
            .rocket()
            .state::<Config>()
            .map(|config| config.service_token.as_str());
        match (presented, expected) {
            (Some(presented), Some(expected)) if presented == expected => {
                Outcome::Success(ServiceAuth)
            }
            _ => Outcome::Failure((Status::Unauthorized, AcctError::Unauthorized)),
        }
    }
}

#[get("/health")]
fn health() -> Value {
    serde_json::json!({"status": "ok"})
}

#[post("/admin/login", data = "<login>")]
async fn admin_login(
    login: Json<AdminLogin<'_>>,
    config: &State<Config>,
    cookies: &CookieJar<'_>,
) -> AcctResult<Status> {
    if login.password != config.admin_password {
        slog_scope::warn!("failed admin login"; "user" => %login.user);
        return Err(AcctError::Unauthorized);
    }
    let ctx = AdminContext {
        admin_user: String::from(login.user),
    };
    let cookie = Cookie::build(ADMIN_COOKIE, serde_json::to_string(&ctx).unwrap())
        .secure(true)
        .same_site(SameSite::Lax)
        .finish();
    cookies.add_private(cookie);
    slog_scope::info!("admin logged in"; "user" => %login.user);
    Ok(Status::NoContent)
}

#[get("/admin/logout")]
async fn admin_logout(cookies: &CookieJar<'_>) -> Status {
    cookies.remove_private(Cookie::named(ADMIN_COOKIE));
    Status::NoContent
}

#[catch(401)]
fn no_auth_api() -> status::Unauthorized<()> {
    status::Unauthorized(None)
}

async fn run_migrations(rocket: Rocket<Build>) -> Rocket<Build> {
    embed_migrations!("migrations");

    let conn = MainDbConn::get_one(&rocket)
        .await
        .expect("database connection");
    conn.run(|c| embedded_migrations::run(c))
        .await
        .expect("diesel migrations");

    rocket
}

pub fn rocket() -> rocket::Rocket<Build> {
    rocket::build()
        .attach(MainDbConn::fairing())
        .attach(AdHoc::on_ignite("Diesel Migrations", run_migrations))
        .attach(AdHoc::on_liftoff("Premium expiry sweep", |rocket| {
            Box::pin(async move {
                let conn = MainDbConn::get_one(rocket)
                    .await
                    .expect("database connection");
                let secs = rocket
                    .state::<Config>()
                    .map(|config| config.expiry_sweep_seconds)
                    .unwrap_or(300);
                rocket::tokio::spawn(async move {
                    let mut interval = time::interval(Duration::from_secs(secs));
                    loop {
                        interval.tick().await;
                        match accounts::revert_expired_premium(&conn).await {
                            Ok(0) => (),
                            Ok(reverted) => {
                                slog_scope::info!("premium expiry sweep"; "reverted" => reverted)
                            }
                            Err(e) => {
                                slog_scope::error!("premium expiry sweep failed"; "error" => %e)
                            }
                        }
                    }
                });
            })
        }))
        .mount("/", routes![health, admin_login, admin_logout])
        .mount("/api/accounts", accounts::routes())
        .mount("/api/usage", usage::routes())
        .mount("/api/payments", payments::routes())
        .mount("/api/docs", docs::routes())
        .mount("/api/admin", admin::routes())
        .register("/api", catchers!(no_auth_api))
        .attach(AdHoc::config::<Config>())
}
