use crate::accounts::upsert_ip_history;
use crate::base::*;
use crate::model::{IpUsage, NewUsageLog, UsageLog, User, PLAN_PREMIUM};
use crate::schema::ip_usage as ipu;
use crate::schema::ip_usage::dsl::ip_usage;
use crate::schema::usage_logs as logs;
use crate::schema::usage_logs::dsl::usage_logs;
use crate::schema::users as usrs;
use crate::schema::users::dsl::users;
use rocket::serde::json::Json;
use rocket::serde::{Deserialize, Serialize};
use rocket::{Route, State};

use chrono::Utc;
use diesel::prelude::*;

#[derive(Deserialize, Serialize)]
pub struct UsageRequest {
    pub email: Option<String>,
    pub ip_address: String,
    pub questions_generated: i32,
    pub source_type: Option<String>,
    pub category: Option<String>,
    pub difficulty: Option<String>,
    pub notes: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub struct RemainingQuota {
    pub questions_remaining: i32,
    pub unlimited: bool,
}

/// Accounts for one generation event in a single transaction: the quota
/// decrement, the IP aggregates, the IP history and the usage log either
/// all land or none do. A failed gate (blocked IP or account, exhausted
/// quota) rolls everything back, so no log row is written for a rejected
/// event.
pub async fn record_usage(
    req: UsageRequest,
    ip_abuse_threshold: i32,
    conn: &MainDbConn,
) -> AcctResult<RemainingQuota> {
    if req.questions_generated <= 0 {
        return Err(AcctError::ConstraintViolation(String::from(
            "questions_generated must be positive",
        )));
    }
    conn.run(move |c| {
        c.transaction::<RemainingQuota, AcctError, _>(|| {
            let ip = req.ip_address.clone();
            let known_ip: Option<IpUsage> = ip_usage
                .filter(ipu::ip_address.eq(&ip))
                .first(c)
                .optional()?;
            if known_ip.as_ref().map(|u| u.is_blocked).unwrap_or(false) {
                return Err(AcctError::Blocked);
            }

            let quota = match &req.email {
                None => RemainingQuota {
                    questions_remaining: 0,
                    unlimited: false,
                },
                Some(em) => {
                    let user: User = users
                        .filter(usrs::email.eq(em))
                        .first(c)
                        .optional()?
                        .ok_or(AcctError::NotFound)?;
                    if user.is_blocked {
                        return Err(AcctError::Blocked);
                    }
                    if user.plan_status == PLAN_PREMIUM {
                        // active premium consumes no quota
                        if !user.has_active_premium() {
                            return Err(AcctError::QuotaExceeded);
                        }
                        diesel::update(users.filter(usrs::email.eq(em)))
                            .set((
                                usrs::questions_used_total
                                    .eq(usrs::questions_used_total + req.questions_generated),
                                usrs::ip_address.eq(Some(ip.clone())),
                                usrs::updated_at.eq(Utc::now()),
                            ))
                            .execute(c)?;
                        RemainingQuota {
                            questions_remaining: user.questions_remaining,
                            unlimited: true,
                        }
                    } else {
                        // the WHERE clause is the quota check, zero
                        // affected rows means not enough left
                        let rows = diesel::update(
                            users.filter(
                                usrs::email
                                    .eq(em)
                                    .and(usrs::questions_remaining.ge(req.questions_generated)),
                            ),
                        )
                        .set((
                            usrs::questions_remaining
                                .eq(usrs::questions_remaining - req.questions_generated),
                            usrs::questions_used_total
                                .eq(usrs::questions_used_total + req.questions_generated),
                            usrs::ip_address.eq(Some(ip.clone())),
                            usrs::updated_at.eq(Utc::now()),
                        ))
                        .execute(c)?;
                        if rows == 0 {
                            return Err(AcctError::QuotaExceeded);
                        }
                        let remaining: i32 = users
                            .filter(usrs::email.eq(em))
                            .select(usrs::questions_remaining)
                            .first(c)?;
                        RemainingQuota {
                            questions_remaining: remaining,
                            unlimited: false,
                        }
                    }
                }
            };

            match known_ip {
                None => {
                    let mut row = IpUsage::first_sighting(ip.clone());
                    row.questions_used_total = req.questions_generated;
                    diesel::insert_into(ip_usage).values(&row).execute(c)?;
                }
                Some(_) => {
                    diesel::update(ip_usage.filter(ipu::ip_address.eq(&ip)))
                        .set((
                            ipu::questions_used_total
                                .eq(ipu::questions_used_total + req.questions_generated),
                            ipu::last_seen.eq(Utc::now()),
                        ))
                        .execute(c)?;
                }
            }
            if ip_abuse_threshold > 0 {
                let total: i32 = ip_usage
                    .filter(ipu::ip_address.eq(&ip))
                    .select(ipu::questions_used_total)
                    .first(c)?;
                if total > ip_abuse_threshold {
                    diesel::update(ip_usage.filter(ipu::ip_address.eq(&ip)))
                        .set(ipu::is_blocked.eq(true))
                        .execute(c)?;
                    slog_scope::warn!("ip exceeded abuse threshold"; "ip" => %ip, "total" => total);
                }
            }

            if let Some(em) = &req.email {
                upsert_ip_history(c, em, &ip)?;
            }

            diesel::insert_into(usage_logs)
                .values(&NewUsageLog {
                    email: req.email.clone(),
                    ip_address: ip,
                    event_time: Utc::now(),
                    questions_generated: req.questions_generated,
                    source_type: req.source_type.clone(),
                    category: req.category.clone(),
                    difficulty: req.difficulty.clone(),
                    notes: req.notes.clone(),
                })
                .execute(c)?;

            Ok(quota)
        })
    })
    .await
}

#[post("/", data = "<usage>")]
async fn record(
    _svc: ServiceAuth,
    usage: Json<UsageRequest>,
    config: &State<Config>,
    conn: MainDbConn,
) -> AcctResult<Json<RemainingQuota>> {
    let quota = record_usage(usage.into_inner(), config.ip_abuse_threshold, &conn).await?;
    Ok(Json(quota))
}

#[get("/logs/<email>?<limit>")]
async fn user_logs(
    _svc: ServiceAuth,
    email: String,
    limit: Option<i64>,
    conn: MainDbConn,
) -> AcctResult<Json<Vec<UsageLog>>> {
    let real_limit = limit.unwrap_or(50);
    let rows = conn
        .run(move |c| {
            usage_logs
                .filter(logs::email.eq(Some(email.clone())))
                .order(logs::event_time.desc())
                .limit(real_limit)
                .load::<UsageLog>(c)
        })
        .await?;
    Ok(Json(rows))
}

#[get("/logs?<limit>")]
async fn all_logs(
    _ctx: AdminContext,
    limit: Option<i64>,
    conn: MainDbConn,
) -> AcctResult<Json<Vec<UsageLog>>> {
    let real_limit = limit.unwrap_or(100);
    let rows = conn
        .run(move |c| {
            usage_logs
                .order(logs::event_time.desc())
                .limit(real_limit)
                .load::<UsageLog>(c)
        })
        .await?;
    Ok(Json(rows))
}

pub fn routes() -> Vec<Route> {
    routes![record, user_logs, all_logs]
}
