use crate::accounts::PlanRules;
use crate::admin::record_action;
use crate::base::*;
use crate::model::{
    NewPayment, Payment, ACTION_PAYMENT_APPROVED, ACTION_PAYMENT_REJECTED, PAYMENT_APPROVED,
    PAYMENT_PENDING, PAYMENT_REJECTED,
};
use crate::schema::payments as pays;
use crate::schema::payments::dsl::payments;
use crate::schema::users as usrs;
use crate::schema::users::dsl::users;
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::serde::{Deserialize, Serialize};
use rocket::{Route, State};

use chrono::Utc;
use diesel::prelude::*;

#[derive(Deserialize, Serialize)]
pub struct PaymentRequest {
    pub full_name: String,
    pub email: String,
    pub gcash_ref: Option<String>,
    pub plan_requested: String,
    pub receipt_storage_path: Option<String>,
}

#[derive(Deserialize, Serialize)]
pub struct ReviewForm {
    pub notes: Option<String>,
}

/// Creates the PENDING row. The user is not touched until an admin
/// resolves the payment.
pub async fn submit_payment(req: PaymentRequest, conn: &MainDbConn) -> AcctResult<i32> {
    let payment: Payment = conn
        .run(move |c| {
            diesel::insert_into(payments)
                .values(&NewPayment {
                    full_name: req.full_name,
                    email: req.email,
                    gcash_ref: req.gcash_ref,
                    plan_requested: req.plan_requested,
                    receipt_storage_path: req.receipt_storage_path.unwrap_or_default(),
                    status: String::from(PAYMENT_PENDING),
                    submitted_at: Utc::now(),
                })
                .get_result(c)
        })
        .await?;
    slog_scope::info!("payment submitted"; "payment_id" => payment.payment_id, "email" => %payment.email);
    Ok(payment.payment_id)
}

/// Resolves the payment and upgrades the user in one transaction. The
/// status switch is a compare-and-swap on PENDING, so of two concurrent
/// approvals exactly one wins and the loser gets AlreadyResolved.
pub async fn approve_payment(
    payment_id: i32,
    admin_user: String,
    notes: Option<String>,
    rules: PlanRules,
    conn: &MainDbConn,
) -> AcctResult<()> {
    conn.run(move |c| {
        c.transaction::<_, AcctError, _>(|| {
            let payment: Payment = payments
                .filter(pays::payment_id.eq(payment_id))
                .first(c)
                .optional()?
                .ok_or(AcctError::NotFound)?;
            let rows = diesel::update(
                payments.filter(
                    pays::payment_id
                        .eq(payment_id)
                        .and(pays::status.eq(PAYMENT_PENDING)),
                ),
            )
            .set((
                pays::status.eq(PAYMENT_APPROVED),
                pays::admin_notes.eq(notes.clone()),
                pays::approved_at.eq(Some(Utc::now())),
                pays::approved_by.eq(Some(admin_user.clone())),
            ))
            .execute(c)?;
            if rows == 0 {
                return Err(AcctError::AlreadyResolved);
            }
            let (quota, expiry) = rules.grant(&payment.plan_requested)?;
            let updated = diesel::update(users.filter(usrs::email.eq(&payment.email)))
                .set((
                    usrs::plan_status.eq(&payment.plan_requested),
                    usrs::questions_remaining.eq(quota),
                    usrs::premium_expiry.eq(expiry),
                    usrs::updated_at.eq(Utc::now()),
                ))
                .execute(c)?;
            if updated == 0 {
                // no such user, roll the whole approval back
                return Err(AcctError::NotFound);
            }
            record_action(
                c,
                &admin_user,
                ACTION_PAYMENT_APPROVED,
                Some(format!(
                    "Payment {} approved, {} upgraded to {}",
                    payment_id, payment.email, payment.plan_requested
                )),
            )?;
            Ok(())
        })
    })
    .await
}

pub async fn reject_payment(
    payment_id: i32,
    admin_user: String,
    notes: Option<String>,
    conn: &MainDbConn,
) -> AcctResult<()> {
    conn.run(move |c| {
        c.transaction::<_, AcctError, _>(|| {
            let found: i64 = payments
                .filter(pays::payment_id.eq(payment_id))
                .count()
                .get_result(c)?;
            if found == 0 {
                return Err(AcctError::NotFound);
            }
            let rows = diesel::update(
                payments.filter(
                    pays::payment_id
                        .eq(payment_id)
                        .and(pays::status.eq(PAYMENT_PENDING)),
                ),
            )
            .set((
                pays::status.eq(PAYMENT_REJECTED),
                pays::admin_notes.eq(notes.clone()),
                pays::approved_at.eq(Some(Utc::now())),
                pays::approved_by.eq(Some(admin_user.clone())),
            ))
            .execute(c)?;
            if rows == 0 {
                return Err(AcctError::AlreadyResolved);
            }
            record_action(
                c,
                &admin_user,
                ACTION_PAYMENT_REJECTED,
                Some(format!("Payment {} rejected", payment_id)),
            )?;
            Ok(())
        })
    })
    .await
}

#[post("/", data = "<payment>")]
async fn submit(
    _svc: ServiceAuth,
    payment: Json<PaymentRequest>,
    conn: MainDbConn,
) -> AcctResult<Json<i32>> {
    let id = submit_payment(payment.into_inner(), &conn).await?;
    Ok(Json(id))
}

#[get("/pending")]
async fn pending(_ctx: AdminContext, conn: MainDbConn) -> AcctResult<Json<Vec<Payment>>> {
    let rows = conn
        .run(|c| {
            payments
                .filter(pays::status.eq(PAYMENT_PENDING))
                .order(pays::submitted_at.asc())
                .load::<Payment>(c)
        })
        .await?;
    Ok(Json(rows))
}

#[get("/")]
async fn all(_ctx: AdminContext, conn: MainDbConn) -> AcctResult<Json<Vec<Payment>>> {
    let rows = conn
        .run(|c| payments.order(pays::submitted_at.desc()).load::<Payment>(c))
        .await?;
    Ok(Json(rows))
}

#[get("/user/<email>")]
async fn for_user(
    _svc: ServiceAuth,
    email: String,
    conn: MainDbConn,
) -> AcctResult<Json<Vec<Payment>>> {
    let rows = conn
        .run(move |c| {
            payments
                .filter(pays::email.eq(&email))
                .order(pays::submitted_at.desc())
                .load::<Payment>(c)
        })
        .await?;
    Ok(Json(rows))
}

#[put("/<payment_id>/approve", data = "<form>")]
async fn approve(
    ctx: AdminContext,
    payment_id: i32,
    form: Json<ReviewForm>,
    config: &State<Config>,
    conn: MainDbConn,
) -> AcctResult<Status> {
    let rules = PlanRules::from_config(config);
    approve_payment(
        payment_id,
        ctx.admin_user,
        form.into_inner().notes,
        rules,
        &conn,
    )
    .await?;
    Ok(Status::NoContent)
}

#[put("/<payment_id>/reject", data = "<form>")]
async fn reject(
    ctx: AdminContext,
    payment_id: i32,
    form: Json<ReviewForm>,
    conn: MainDbConn,
) -> AcctResult<Status> {
    reject_payment(payment_id, ctx.admin_user, form.into_inner().notes, &conn).await?;
    Ok(Status::NoContent)
}

pub fn routes() -> Vec<Route> {
    routes![submit, pending, all, for_user, approve, reject]
}
