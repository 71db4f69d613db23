use rocket::serde::{Deserialize, Serialize};

use diesel::result::{DatabaseErrorKind, Error as DieselError};
use rocket::http::Status;
use rocket::request::Request;
use rocket::response::{Responder, Result};
use rocket_sync_db_pools::database;
use std::error::Error as StdError;
use std::fmt;
use std::io::Error as IOError;

pub const ADMIN_COOKIE: &str = "admin";

/// Settings for plan allowances and abuse limits, loaded from the
/// Rocket figment (Rocket.toml / environment).
#[derive(Deserialize)]
pub struct Config {
    pub free_question_limit: i32,
    pub pro_question_bonus: i32,
    pub premium_question_allowance: i32,
    pub premium_duration_days: i64,
    pub ip_abuse_threshold: i32,
    pub expiry_sweep_seconds: u64,
    pub service_token: String,
    pub admin_password: String,
}

/// Identity of a logged-in admin, carried in a private cookie.
#[derive(Serialize, Deserialize, Clone)]
pub struct AdminContext {
    pub admin_user: String,
}

/// Marker guard for calls from the request/pipeline layer, authenticated
/// with the shared service token.
pub struct ServiceAuth;

#[derive(Deserialize)]
pub struct AdminLogin<'r> {
    pub user: &'r str,
    pub password: &'r str,
}

#[database("postgres_main")]
pub struct MainDbConn(diesel::PgConnection);

#[derive(Debug)]
pub enum AcctError {
    QuotaExceeded,
    Blocked,
    AlreadyResolved,
    NotFound,
    Unauthorized,
    ConstraintViolation(String),
    StoreUnavailable(String),
    IOError(String),
}

impl<'r, 'o: 'r> Responder<'r, 'o> for AcctError {
    fn respond_to(self, _request: &'r Request<'_>) -> Result<'o> {
        slog_scope::warn!("request rejected"; "error" => %self);
        match self {
            AcctError::QuotaExceeded => Err(Status::TooManyRequests),
            AcctError::Blocked => Err(Status::Forbidden),
            AcctError::AlreadyResolved => Err(Status::Conflict),
            AcctError::NotFound => Err(Status::NotFound),
            AcctError::Unauthorized => Err(Status::Unauthorized),
            AcctError::ConstraintViolation(_) => Err(Status::UnprocessableEntity),
            _ => Err(Status::ServiceUnavailable),
        }
    }
}

impl fmt::Display for AcctError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AcctError::QuotaExceeded => f.write_str("quota exceeded"),
            AcctError::Blocked => f.write_str("blocked"),
            AcctError::AlreadyResolved => f.write_str("payment already resolved"),
            AcctError::NotFound => f.write_str("not found"),
            AcctError::Unauthorized => f.write_str("unauthorized"),
            AcctError::ConstraintViolation(msg) => write!(f, "constraint violation: {}", msg),
            AcctError::StoreUnavailable(msg) => write!(f, "store unavailable: {}", msg),
            AcctError::IOError(msg) => write!(f, "io error: {}", msg),
        }
    }
}

impl StdError for AcctError {}

impl From<DieselError> for AcctError {
    fn from(e: DieselError) -> Self {
        match e {
            DieselError::NotFound => AcctError::NotFound,
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                AcctError::ConstraintViolation(info.message().to_string())
            }
            DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, info) => {
                AcctError::ConstraintViolation(info.message().to_string())
            }
            e => AcctError::StoreUnavailable(e.to_string()),
        }
    }
}

impl From<IOError> for AcctError {
    fn from(e: IOError) -> Self {
        AcctError::IOError(e.to_string())
    }
}

pub type AcctResult<T> = std::result::Result<T, AcctError>;
