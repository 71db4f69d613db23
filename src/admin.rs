use crate::base::*;
use crate::model::{
    AdminAction, IpUsage, NewAdminAction, ACTION_IP_BLOCKED, ACTION_IP_UNBLOCKED,
    ACTION_USER_BLOCKED, ACTION_USER_UNBLOCKED,
};
use crate::schema::admin_actions as acts;
use crate::schema::admin_actions::dsl::admin_actions;
use crate::schema::ip_usage as ipu;
use crate::schema::ip_usage::dsl::ip_usage;
use crate::schema::users as usrs;
use crate::schema::users::dsl::users;
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::Route;

use chrono::Utc;
use diesel::prelude::*;
use diesel::{PgConnection, QueryResult};

/// Appends one audit row. Called inside the transaction of the admin
/// operation it describes.
pub fn record_action(
    c: &PgConnection,
    admin_user: &str,
    action_type: &str,
    details: Option<String>,
) -> QueryResult<usize> {
    diesel::insert_into(admin_actions)
        .values(&NewAdminAction::new(admin_user, action_type, details))
        .execute(c)
}

fn set_ip_blocked(c: &PgConnection, ip: &str, blocked: bool) -> AcctResult<()> {
    let existing: Option<IpUsage> = ip_usage
        .filter(ipu::ip_address.eq(ip))
        .first(c)
        .optional()?;
    match existing {
        None => {
            let mut row = IpUsage::first_sighting(ip);
            row.is_blocked = blocked;
            diesel::insert_into(ip_usage).values(&row).execute(c)?;
        }
        Some(_) => {
            diesel::update(ip_usage.filter(ipu::ip_address.eq(ip)))
                .set((ipu::is_blocked.eq(blocked), ipu::last_seen.eq(Utc::now())))
                .execute(c)?;
        }
    }
    Ok(())
}

fn set_user_blocked(c: &PgConnection, email: &str, blocked: bool) -> AcctResult<()> {
    let rows = diesel::update(users.filter(usrs::email.eq(email)))
        .set((usrs::is_blocked.eq(blocked), usrs::updated_at.eq(Utc::now())))
        .execute(c)?;
    if rows == 0 {
        return Err(AcctError::NotFound);
    }
    Ok(())
}

#[put("/ips/<ip>/block")]
async fn block_ip(ctx: AdminContext, ip: String, conn: MainDbConn) -> AcctResult<Status> {
    conn.run(move |c| {
        c.transaction::<_, AcctError, _>(|| {
            set_ip_blocked(c, &ip, true)?;
            record_action(
                c,
                &ctx.admin_user,
                ACTION_IP_BLOCKED,
                Some(format!("Blocked IP {}", ip)),
            )?;
            Ok(())
        })
    })
    .await?;
    Ok(Status::NoContent)
}

#[put("/ips/<ip>/unblock")]
async fn unblock_ip(ctx: AdminContext, ip: String, conn: MainDbConn) -> AcctResult<Status> {
    conn.run(move |c| {
        c.transaction::<_, AcctError, _>(|| {
            set_ip_blocked(c, &ip, false)?;
            record_action(
                c,
                &ctx.admin_user,
                ACTION_IP_UNBLOCKED,
                Some(format!("Unblocked IP {}", ip)),
            )?;
            Ok(())
        })
    })
    .await?;
    Ok(Status::NoContent)
}

#[put("/users/<email>/block")]
async fn block_user(ctx: AdminContext, email: String, conn: MainDbConn) -> AcctResult<Status> {
    conn.run(move |c| {
        c.transaction::<_, AcctError, _>(|| {
            set_user_blocked(c, &email, true)?;
            record_action(
                c,
                &ctx.admin_user,
                ACTION_USER_BLOCKED,
                Some(format!("Blocked user {}", email)),
            )?;
            Ok(())
        })
    })
    .await?;
    Ok(Status::NoContent)
}

#[put("/users/<email>/unblock")]
async fn unblock_user(ctx: AdminContext, email: String, conn: MainDbConn) -> AcctResult<Status> {
    conn.run(move |c| {
        c.transaction::<_, AcctError, _>(|| {
            set_user_blocked(c, &email, false)?;
            record_action(
                c,
                &ctx.admin_user,
                ACTION_USER_UNBLOCKED,
                Some(format!("Unblocked user {}", email)),
            )?;
            Ok(())
        })
    })
    .await?;
    Ok(Status::NoContent)
}

#[get("/actions?<limit>")]
async fn get_actions(
    _ctx: AdminContext,
    limit: Option<i64>,
    conn: MainDbConn,
) -> AcctResult<Json<Vec<AdminAction>>> {
    let real_limit = limit.unwrap_or(100);
    let actions = conn
        .run(move |c| {
            admin_actions
                .order(acts::action_time.desc())
                .limit(real_limit)
                .load::<AdminAction>(c)
        })
        .await?;
    Ok(Json(actions))
}

pub fn routes() -> Vec<Route> {
    routes![block_ip, unblock_ip, block_user, unblock_user, get_actions]
}
