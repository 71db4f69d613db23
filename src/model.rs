use chrono::{DateTime, Utc};
use rocket::serde::{Deserialize, Serialize};

use crate::schema::*;

pub const PLAN_FREE: &str = "FREE";
pub const PLAN_PRO: &str = "PRO";
pub const PLAN_PREMIUM: &str = "PREMIUM";

pub const PAYMENT_PENDING: &str = "PENDING";
pub const PAYMENT_APPROVED: &str = "APPROVED";
pub const PAYMENT_REJECTED: &str = "REJECTED";

pub const ACTION_USER_BLOCKED: &str = "USER_BLOCKED";
pub const ACTION_USER_UNBLOCKED: &str = "USER_UNBLOCKED";
pub const ACTION_USER_DELETED: &str = "USER_DELETED";
pub const ACTION_IP_BLOCKED: &str = "IP_BLOCKED";
pub const ACTION_IP_UNBLOCKED: &str = "IP_UNBLOCKED";
pub const ACTION_QUOTA_ADJUSTED: &str = "QUOTA_ADJUSTED";
pub const ACTION_PLAN_CHANGED: &str = "PLAN_CHANGED";
pub const ACTION_PAYMENT_APPROVED: &str = "PAYMENT_APPROVED";
pub const ACTION_PAYMENT_REJECTED: &str = "PAYMENT_REJECTED";
pub const ACTION_UPLOAD_ADMIN_DOC: &str = "UPLOAD_ADMIN_DOC";
pub const ACTION_DELETE_ADMIN_DOC: &str = "DELETE_ADMIN_DOC";

#[derive(Queryable, Identifiable, Insertable, Serialize, Deserialize, Clone)]
#[table_name = "users"]
#[primary_key(email)]
pub struct User {
    pub email: String,
    pub ip_address: Option<String>,
    pub plan_status: String,
    pub questions_used_total: i32,
    pub questions_remaining: i32,
    pub premium_expiry: Option<DateTime<Utc>>,
    pub is_blocked: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new_free<S: Into<String>>(email: S, ip_address: S, questions_remaining: i32) -> Self {
        User {
            email: email.into(),
            ip_address: Some(ip_address.into()),
            plan_status: String::from(PLAN_FREE),
            questions_used_total: 0,
            questions_remaining,
            premium_expiry: None,
            is_blocked: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    /// PREMIUM with an expiry still in the future.
    pub fn has_active_premium(&self) -> bool {
        self.plan_status == PLAN_PREMIUM
            && self.premium_expiry.map(|e| e > Utc::now()).unwrap_or(false)
    }
}

#[derive(Queryable, Serialize, Deserialize)]
pub struct IpHistory {
    pub id: i32,
    pub email: String,
    pub ip_address: String,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

#[derive(Insertable)]
#[table_name = "user_ip_history"]
pub struct NewIpHistory {
    pub email: String,
    pub ip_address: String,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

impl NewIpHistory {
    pub fn seen_now<S: Into<String>>(email: S, ip_address: S) -> Self {
        NewIpHistory {
            email: email.into(),
            ip_address: ip_address.into(),
            first_seen: Utc::now(),
            last_seen: Utc::now(),
        }
    }
}

#[derive(Queryable, Insertable, Serialize, Deserialize)]
#[table_name = "ip_usage"]
pub struct IpUsage {
    pub ip_address: String,
    pub questions_used_total: i32,
    pub is_blocked: bool,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

impl IpUsage {
    pub fn first_sighting<S: Into<String>>(ip_address: S) -> Self {
        IpUsage {
            ip_address: ip_address.into(),
            questions_used_total: 0,
            is_blocked: false,
            first_seen: Utc::now(),
            last_seen: Utc::now(),
        }
    }
}

#[derive(Queryable, Serialize, Deserialize)]
pub struct UsageLog {
    pub event_id: i64,
    pub email: Option<String>,
    pub ip_address: String,
    pub event_time: DateTime<Utc>,
    pub questions_generated: i32,
    pub source_type: Option<String>,
    pub category: Option<String>,
    pub difficulty: Option<String>,
    pub notes: Option<String>,
}

#[derive(Insertable)]
#[table_name = "usage_logs"]
pub struct NewUsageLog {
    pub email: Option<String>,
    pub ip_address: String,
    pub event_time: DateTime<Utc>,
    pub questions_generated: i32,
    pub source_type: Option<String>,
    pub category: Option<String>,
    pub difficulty: Option<String>,
    pub notes: Option<String>,
}

#[derive(Queryable, Serialize, Deserialize)]
pub struct UserDocument {
    pub doc_id: i32,
    pub email: String,
    pub file_name: String,
    pub file_type: String,
    pub storage_path: String,
    pub text_stage_path: Option<String>,
    pub extracted_text: Option<String>,
    pub text_hash: Option<String>,
    pub is_deleted: bool,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Insertable)]
#[table_name = "user_documents"]
pub struct NewUserDocument {
    pub email: String,
    pub file_name: String,
    pub file_type: String,
    pub storage_path: String,
    pub text_stage_path: Option<String>,
    pub extracted_text: Option<String>,
    pub text_hash: Option<String>,
    pub is_deleted: bool,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Queryable, Serialize, Deserialize)]
pub struct AdminDocument {
    pub admin_doc_id: i32,
    pub file_name: String,
    pub file_type: String,
    pub storage_path: String,
    pub text_stage_path: Option<String>,
    pub is_downloadable: bool,
    pub uploaded_by: String,
    pub text_hash: Option<String>,
    pub file_content: Option<String>,
    pub extracted_text: Option<String>,
    pub category: String,
    pub is_deleted: bool,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Insertable)]
#[table_name = "admin_documents"]
pub struct NewAdminDocument {
    pub file_name: String,
    pub file_type: String,
    pub storage_path: String,
    pub text_stage_path: Option<String>,
    pub is_downloadable: bool,
    pub uploaded_by: String,
    pub text_hash: Option<String>,
    pub file_content: Option<String>,
    pub extracted_text: Option<String>,
    pub category: String,
    pub is_deleted: bool,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Queryable, Serialize, Deserialize)]
pub struct Payment {
    pub payment_id: i32,
    pub full_name: String,
    pub email: String,
    pub gcash_ref: Option<String>,
    pub plan_requested: String,
    pub receipt_storage_path: String,
    pub status: String,
    pub admin_notes: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    pub approved_by: Option<String>,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Insertable)]
#[table_name = "payments"]
pub struct NewPayment {
    pub full_name: String,
    pub email: String,
    pub gcash_ref: Option<String>,
    pub plan_requested: String,
    pub receipt_storage_path: String,
    pub status: String,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Queryable, Serialize, Deserialize)]
pub struct AdminAction {
    pub action_id: i64,
    pub admin_user: String,
    pub action_type: String,
    pub action_time: DateTime<Utc>,
    pub details: Option<String>,
}

#[derive(Insertable)]
#[table_name = "admin_actions"]
pub struct NewAdminAction {
    pub admin_user: String,
    pub action_type: String,
    pub action_time: DateTime<Utc>,
    pub details: Option<String>,
}

impl NewAdminAction {
    pub fn new<S: Into<String>>(admin_user: S, action_type: &str, details: Option<String>) -> Self {
        NewAdminAction {
            admin_user: admin_user.into(),
            action_type: String::from(action_type),
            action_time: Utc::now(),
            details,
        }
    }
}
