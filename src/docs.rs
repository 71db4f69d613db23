use crate::admin::record_action;
use crate::base::*;
use crate::model::{
    AdminDocument, NewAdminDocument, NewUserDocument, UserDocument, ACTION_DELETE_ADMIN_DOC,
    ACTION_UPLOAD_ADMIN_DOC,
};
use crate::schema::admin_documents as adocs;
use crate::schema::admin_documents::dsl::admin_documents;
use crate::schema::user_documents as udocs;
use crate::schema::user_documents::dsl::user_documents;
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::serde::{Deserialize, Serialize};
use rocket::Route;

use chrono::Utc;
use diesel::prelude::*;

#[derive(Deserialize, Serialize)]
pub struct UserDocumentRequest {
    pub email: String,
    pub file_name: String,
    pub file_type: String,
    pub storage_path: String,
    pub text_stage_path: Option<String>,
    pub extracted_text: Option<String>,
    pub text_hash: Option<String>,
}

#[derive(Deserialize, Serialize)]
pub struct AdminDocumentRequest {
    pub file_name: String,
    pub file_type: String,
    pub storage_path: String,
    pub text_stage_path: Option<String>,
    pub is_downloadable: bool,
    pub text_hash: Option<String>,
    pub file_content: Option<String>,
    pub extracted_text: Option<String>,
    pub category: Option<String>,
}

/// Fields the extraction pipeline writes back once it has processed the
/// stored file.
#[derive(Deserialize, Serialize)]
pub struct ExtractionUpdate {
    pub text_stage_path: Option<String>,
    pub extracted_text: Option<String>,
    pub text_hash: Option<String>,
}

#[derive(Serialize, Deserialize)]
pub struct DocumentText {
    pub file_name: String,
    pub extracted_text: Option<String>,
}

#[derive(Serialize, Deserialize)]
pub struct DocumentContent {
    pub file_name: String,
    pub file_type: String,
    pub file_content: Option<String>,
}

#[post("/user", data = "<doc>")]
async fn create_user_doc(
    _svc: ServiceAuth,
    doc: Json<UserDocumentRequest>,
    conn: MainDbConn,
) -> AcctResult<Json<i32>> {
    let doc = doc.into_inner();
    let created: UserDocument = conn
        .run(move |c| {
            diesel::insert_into(user_documents)
                .values(&NewUserDocument {
                    email: doc.email,
                    file_name: doc.file_name,
                    file_type: doc.file_type,
                    storage_path: doc.storage_path,
                    text_stage_path: doc.text_stage_path,
                    extracted_text: doc.extracted_text,
                    text_hash: doc.text_hash,
                    is_deleted: false,
                    uploaded_at: Utc::now(),
                })
                .get_result(c)
        })
        .await?;
    Ok(Json(created.doc_id))
}

#[get("/user/<email>")]
async fn list_user_docs(
    _svc: ServiceAuth,
    email: String,
    conn: MainDbConn,
) -> AcctResult<Json<Vec<UserDocument>>> {
    let rows = conn
        .run(move |c| {
            user_documents
                .filter(udocs::email.eq(&email).and(udocs::is_deleted.eq(false)))
                .order(udocs::uploaded_at.desc())
                .load::<UserDocument>(c)
        })
        .await?;
    Ok(Json(rows))
}

/// Audit view, soft-deleted rows included.
#[get("/user/<email>/audit")]
async fn audit_user_docs(
    _ctx: AdminContext,
    email: String,
    conn: MainDbConn,
) -> AcctResult<Json<Vec<UserDocument>>> {
    let rows = conn
        .run(move |c| {
            user_documents
                .filter(udocs::email.eq(&email))
                .order(udocs::uploaded_at.desc())
                .load::<UserDocument>(c)
        })
        .await?;
    Ok(Json(rows))
}

#[delete("/user/<doc_id>?<email>")]
async fn delete_user_doc(
    _svc: ServiceAuth,
    doc_id: i32,
    email: String,
    conn: MainDbConn,
) -> AcctResult<Status> {
    let rows = conn
        .run(move |c| {
            diesel::update(
                user_documents.filter(udocs::doc_id.eq(doc_id).and(udocs::email.eq(&email))),
            )
            .set(udocs::is_deleted.eq(true))
            .execute(c)
        })
        .await?;
    if rows == 0 {
        return Err(AcctError::NotFound);
    }
    Ok(Status::NoContent)
}

#[put("/user/<doc_id>/extraction", data = "<update>")]
async fn update_user_extraction(
    _svc: ServiceAuth,
    doc_id: i32,
    update: Json<ExtractionUpdate>,
    conn: MainDbConn,
) -> AcctResult<Status> {
    let update = update.into_inner();
    let rows = conn
        .run(move |c| {
            diesel::update(user_documents.filter(udocs::doc_id.eq(doc_id)))
                .set((
                    udocs::text_stage_path.eq(update.text_stage_path),
                    udocs::extracted_text.eq(update.extracted_text),
                    udocs::text_hash.eq(update.text_hash),
                ))
                .execute(c)
        })
        .await?;
    if rows == 0 {
        return Err(AcctError::NotFound);
    }
    Ok(Status::NoContent)
}

#[post("/admin", data = "<doc>")]
async fn create_admin_doc(
    ctx: AdminContext,
    doc: Json<AdminDocumentRequest>,
    conn: MainDbConn,
) -> AcctResult<Json<i32>> {
    let doc = doc.into_inner();
    let created: AdminDocument = conn
        .run(move |c| {
            c.transaction::<AdminDocument, AcctError, _>(|| {
                let created: AdminDocument = diesel::insert_into(admin_documents)
                    .values(&NewAdminDocument {
                        file_name: doc.file_name,
                        file_type: doc.file_type,
                        storage_path: doc.storage_path,
                        text_stage_path: doc.text_stage_path,
                        is_downloadable: doc.is_downloadable,
                        uploaded_by: ctx.admin_user.clone(),
                        text_hash: doc.text_hash,
                        file_content: doc.file_content,
                        extracted_text: doc.extracted_text,
                        category: doc.category.unwrap_or_else(|| String::from("General")),
                        is_deleted: false,
                        uploaded_at: Utc::now(),
                    })
                    .get_result(c)?;
                record_action(
                    c,
                    &ctx.admin_user,
                    ACTION_UPLOAD_ADMIN_DOC,
                    Some(format!("Uploaded {}", created.file_name)),
                )?;
                Ok(created)
            })
        })
        .await?;
    Ok(Json(created.admin_doc_id))
}

#[get("/admin")]
async fn list_admin_docs(
    _svc: ServiceAuth,
    conn: MainDbConn,
) -> AcctResult<Json<Vec<AdminDocument>>> {
    let rows = conn
        .run(|c| {
            admin_documents
                .filter(adocs::is_deleted.eq(false))
                .order(adocs::uploaded_at.desc())
                .load::<AdminDocument>(c)
        })
        .await?;
    Ok(Json(rows))
}

#[put("/admin/<doc_id>/downloadable?<downloadable>")]
async fn set_admin_doc_downloadable(
    _ctx: AdminContext,
    doc_id: i32,
    downloadable: bool,
    conn: MainDbConn,
) -> AcctResult<Status> {
    let rows = conn
        .run(move |c| {
            diesel::update(admin_documents.filter(adocs::admin_doc_id.eq(doc_id)))
                .set(adocs::is_downloadable.eq(downloadable))
                .execute(c)
        })
        .await?;
    if rows == 0 {
        return Err(AcctError::NotFound);
    }
    Ok(Status::NoContent)
}

#[delete("/admin/<doc_id>")]
async fn delete_admin_doc(
    ctx: AdminContext,
    doc_id: i32,
    conn: MainDbConn,
) -> AcctResult<Status> {
    conn.run(move |c| {
        c.transaction::<_, AcctError, _>(|| {
            let rows = diesel::update(admin_documents.filter(adocs::admin_doc_id.eq(doc_id)))
                .set(adocs::is_deleted.eq(true))
                .execute(c)?;
            if rows == 0 {
                return Err(AcctError::NotFound);
            }
            record_action(
                c,
                &ctx.admin_user,
                ACTION_DELETE_ADMIN_DOC,
                Some(format!("Deleted admin document {}", doc_id)),
            )?;
            Ok(())
        })
    })
    .await?;
    Ok(Status::NoContent)
}

#[get("/admin/<doc_id>/text")]
async fn admin_doc_text(
    _svc: ServiceAuth,
    doc_id: i32,
    conn: MainDbConn,
) -> AcctResult<Json<DocumentText>> {
    let doc: AdminDocument = conn
        .run(move |c| {
            admin_documents
                .filter(adocs::admin_doc_id.eq(doc_id).and(adocs::is_deleted.eq(false)))
                .first(c)
        })
        .await?;
    Ok(Json(DocumentText {
        file_name: doc.file_name,
        extracted_text: doc.extracted_text,
    }))
}

#[get("/admin/<doc_id>/content")]
async fn admin_doc_content(
    _svc: ServiceAuth,
    doc_id: i32,
    conn: MainDbConn,
) -> AcctResult<Json<DocumentContent>> {
    let doc: AdminDocument = conn
        .run(move |c| {
            admin_documents
                .filter(adocs::admin_doc_id.eq(doc_id).and(adocs::is_deleted.eq(false)))
                .first(c)
        })
        .await?;
    Ok(Json(DocumentContent {
        file_name: doc.file_name,
        file_type: doc.file_type,
        file_content: doc.file_content,
    }))
}

pub fn routes() -> Vec<Route> {
    routes![
        create_user_doc,
        list_user_docs,
        audit_user_docs,
        delete_user_doc,
        update_user_extraction,
        create_admin_doc,
        list_admin_docs,
        set_admin_doc_downloadable,
        delete_admin_doc,
        admin_doc_text,
        admin_doc_content
    ]
}
