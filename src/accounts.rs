use crate::admin::record_action;
use crate::base::*;
use crate::model::{
    IpUsage, NewIpHistory, User, ACTION_PLAN_CHANGED, ACTION_QUOTA_ADJUSTED, ACTION_USER_DELETED,
    PLAN_FREE, PLAN_PREMIUM, PLAN_PRO,
};
use crate::schema::ip_usage as ipu;
use crate::schema::ip_usage::dsl::ip_usage;
use crate::schema::payments as pays;
use crate::schema::payments::dsl::payments;
use crate::schema::usage_logs as logs;
use crate::schema::usage_logs::dsl::usage_logs;
use crate::schema::user_documents as docs;
use crate::schema::user_documents::dsl::user_documents;
use crate::schema::user_ip_history as hist;
use crate::schema::user_ip_history::dsl::user_ip_history;
use crate::schema::users as usrs;
use crate::schema::users::dsl::users;
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::serde::{Deserialize, Serialize};
use rocket::{Route, State};

use chrono::{DateTime, Duration, Utc};
use diesel::prelude::*;
use diesel::PgConnection;

/// Quota and expiry granted when a plan is assigned, from configuration.
#[derive(Clone, Copy)]
pub struct PlanRules {
    pub free_question_limit: i32,
    pub pro_question_bonus: i32,
    pub premium_question_allowance: i32,
    pub premium_duration_days: i64,
}

impl PlanRules {
    pub fn from_config(config: &Config) -> Self {
        PlanRules {
            free_question_limit: config.free_question_limit,
            pro_question_bonus: config.pro_question_bonus,
            premium_question_allowance: config.premium_question_allowance,
            premium_duration_days: config.premium_duration_days,
        }
    }

    pub fn grant(&self, plan: &str) -> AcctResult<(i32, Option<DateTime<Utc>>)> {
        match plan {
            PLAN_FREE => Ok((self.free_question_limit, None)),
            PLAN_PRO => Ok((self.pro_question_bonus, None)),
            PLAN_PREMIUM => Ok((
                self.premium_question_allowance,
                Some(Utc::now() + Duration::days(self.premium_duration_days)),
            )),
            other => Err(AcctError::ConstraintViolation(format!(
                "unknown plan {}",
                other
            ))),
        }
    }
}

#[derive(Deserialize, Serialize)]
pub struct AccountRequest {
    pub email: String,
    pub ip_address: String,
}

pub fn upsert_ip_history(c: &PgConnection, email: &str, ip: &str) -> AcctResult<()> {
    let seen: i64 = user_ip_history
        .filter(hist::email.eq(email).and(hist::ip_address.eq(ip)))
        .count()
        .get_result(c)?;
    if seen == 0 {
        diesel::insert_into(user_ip_history)
            .values(&NewIpHistory::seen_now(email, ip))
            .execute(c)?;
    } else {
        diesel::update(user_ip_history.filter(hist::email.eq(email).and(hist::ip_address.eq(ip))))
            .set(hist::last_seen.eq(Utc::now()))
            .execute(c)?;
    }
    Ok(())
}

pub fn touch_ip_usage(c: &PgConnection, ip: &str) -> AcctResult<()> {
    let seen: i64 = ip_usage
        .filter(ipu::ip_address.eq(ip))
        .count()
        .get_result(c)?;
    if seen == 0 {
        diesel::insert_into(ip_usage)
            .values(&IpUsage::first_sighting(ip))
            .execute(c)?;
    } else {
        diesel::update(ip_usage.filter(ipu::ip_address.eq(ip)))
            .set(ipu::last_seen.eq(Utc::now()))
            .execute(c)?;
    }
    Ok(())
}

/// Looks the user up by email, creating it with the free allowance on
/// first sight. A blocked IP or a blocked account rejects the call, and
/// an expired PREMIUM plan is reverted to FREE with nothing left.
pub async fn get_or_create_account(
    email: String,
    ip: String,
    free_question_limit: i32,
    conn: &MainDbConn,
) -> AcctResult<User> {
    conn.run(move |c| {
        c.transaction::<User, AcctError, _>(|| {
            let blocked: Option<bool> = ip_usage
                .filter(ipu::ip_address.eq(&ip))
                .select(ipu::is_blocked)
                .first(c)
                .optional()?;
            if blocked.unwrap_or(false) {
                return Err(AcctError::Blocked);
            }

            let ouser: Option<User> = users
                .filter(usrs::email.eq(&email))
                .first(c)
                .optional()?;
            match ouser {
                None => {
                    let user = User::new_free(email.clone(), ip.clone(), free_question_limit);
                    diesel::insert_into(users).values(&user).execute(c)?;
                    upsert_ip_history(c, &email, &ip)?;
                    touch_ip_usage(c, &ip)?;
                    slog_scope::info!("account created"; "email" => %email);
                    Ok(user)
                }
                Some(user) => {
                    if user.is_blocked {
                        return Err(AcctError::Blocked);
                    }
                    if user.plan_status == PLAN_PREMIUM && !user.has_active_premium() {
                        diesel::update(users.filter(usrs::email.eq(&email)))
                            .set((
                                usrs::plan_status.eq(PLAN_FREE),
                                usrs::questions_remaining.eq(0),
                                usrs::premium_expiry.eq(None::<DateTime<Utc>>),
                                usrs::updated_at.eq(Utc::now()),
                            ))
                            .execute(c)?;
                        slog_scope::info!("premium expired"; "email" => %email);
                    }
                    diesel::update(users.filter(usrs::email.eq(&email)))
                        .set((
                            usrs::ip_address.eq(Some(ip.clone())),
                            usrs::updated_at.eq(Utc::now()),
                        ))
                        .execute(c)?;
                    upsert_ip_history(c, &email, &ip)?;
                    touch_ip_usage(c, &ip)?;
                    let user = users.filter(usrs::email.eq(&email)).first(c)?;
                    Ok(user)
                }
            }
        })
    })
    .await
}

/// Reverts every PREMIUM account whose expiry has passed. Run
/// periodically from the liftoff fairing.
pub async fn revert_expired_premium(conn: &MainDbConn) -> AcctResult<usize> {
    conn.run(|c| {
        diesel::update(
            users.filter(
                usrs::plan_status
                    .eq(PLAN_PREMIUM)
                    .and(usrs::premium_expiry.lt(Some(Utc::now()))),
            ),
        )
        .set((
            usrs::plan_status.eq(PLAN_FREE),
            usrs::questions_remaining.eq(0),
            usrs::premium_expiry.eq(None::<DateTime<Utc>>),
            usrs::updated_at.eq(Utc::now()),
        ))
        .execute(c)
        .map_err(AcctError::from)
    })
    .await
}

#[post("/", data = "<account>")]
async fn get_or_create(
    _svc: ServiceAuth,
    account: Json<AccountRequest>,
    config: &State<Config>,
    conn: MainDbConn,
) -> AcctResult<Json<User>> {
    let account = account.into_inner();
    let user = get_or_create_account(
        account.email,
        account.ip_address,
        config.free_question_limit,
        &conn,
    )
    .await?;
    Ok(Json(user))
}

#[get("/<email>")]
async fn get_account(
    _svc: ServiceAuth,
    email: String,
    conn: MainDbConn,
) -> AcctResult<Json<User>> {
    let user = conn
        .run(move |c| users.filter(usrs::email.eq(&email)).first::<User>(c))
        .await?;
    Ok(Json(user))
}

#[get("/")]
async fn list_accounts(_ctx: AdminContext, conn: MainDbConn) -> AcctResult<Json<Vec<User>>> {
    let all = conn
        .run(|c| users.order(usrs::created_at.desc()).load::<User>(c))
        .await?;
    Ok(Json(all))
}

#[put("/<email>/quota?<quota>")]
async fn adjust_quota(
    ctx: AdminContext,
    email: String,
    quota: i32,
    conn: MainDbConn,
) -> AcctResult<Status> {
    conn.run(move |c| {
        c.transaction::<_, AcctError, _>(|| {
            let rows = diesel::update(users.filter(usrs::email.eq(&email)))
                .set((
                    usrs::questions_remaining.eq(quota),
                    usrs::updated_at.eq(Utc::now()),
                ))
                .execute(c)?;
            if rows == 0 {
                return Err(AcctError::NotFound);
            }
            record_action(
                c,
                &ctx.admin_user,
                ACTION_QUOTA_ADJUSTED,
                Some(format!("Quota set to {} for {}", quota, email)),
            )?;
            Ok(())
        })
    })
    .await?;
    Ok(Status::NoContent)
}

#[put("/<email>/plan?<plan>")]
async fn change_plan(
    ctx: AdminContext,
    email: String,
    plan: String,
    config: &State<Config>,
    conn: MainDbConn,
) -> AcctResult<Json<User>> {
    let rules = PlanRules::from_config(config);
    let user = conn
        .run(move |c| {
            c.transaction::<User, AcctError, _>(|| {
                let (quota, expiry) = rules.grant(&plan)?;
                let rows = diesel::update(users.filter(usrs::email.eq(&email)))
                    .set((
                        usrs::plan_status.eq(&plan),
                        usrs::questions_remaining.eq(quota),
                        usrs::premium_expiry.eq(expiry),
                        usrs::updated_at.eq(Utc::now()),
                    ))
                    .execute(c)?;
                if rows == 0 {
                    return Err(AcctError::NotFound);
                }
                record_action(
                    c,
                    &ctx.admin_user,
                    ACTION_PLAN_CHANGED,
                    Some(format!("Plan changed to {} for {}", plan, email)),
                )?;
                let user = users.filter(usrs::email.eq(&email)).first(c)?;
                Ok(user)
            })
        })
        .await?;
    Ok(Json(user))
}

#[delete("/<email>")]
async fn delete_account(
    ctx: AdminContext,
    email: String,
    conn: MainDbConn,
) -> AcctResult<Status> {
    conn.run(move |c| {
        c.transaction::<_, AcctError, _>(|| {
            let found: i64 = users
                .filter(usrs::email.eq(&email))
                .count()
                .get_result(c)?;
            if found == 0 {
                return Err(AcctError::NotFound);
            }
            // usage logs and payments carry no foreign key, so the
            // cascade is spelled out here
            diesel::delete(user_ip_history.filter(hist::email.eq(&email))).execute(c)?;
            diesel::delete(usage_logs.filter(logs::email.eq(Some(email.clone())))).execute(c)?;
            diesel::delete(user_documents.filter(docs::email.eq(&email))).execute(c)?;
            diesel::delete(payments.filter(pays::email.eq(&email))).execute(c)?;
            diesel::delete(users.filter(usrs::email.eq(&email))).execute(c)?;
            record_action(
                c,
                &ctx.admin_user,
                ACTION_USER_DELETED,
                Some(format!("Deleted user {}", email)),
            )?;
            Ok(())
        })
    })
    .await?;
    Ok(Status::NoContent)
}

pub fn routes() -> Vec<Route> {
    routes![
        get_or_create,
        get_account,
        list_accounts,
        adjust_quota,
        change_plan,
        delete_account
    ]
}
