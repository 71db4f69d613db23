table! {
    users (email) {
        email -> Varchar,
        ip_address -> Nullable<Varchar>,
        plan_status -> Varchar,
        questions_used_total -> Int4,
        questions_remaining -> Int4,
        premium_expiry -> Nullable<Timestamptz>,
        is_blocked -> Bool,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

table! {
    user_ip_history (id) {
        id -> Int4,
        email -> Varchar,
        ip_address -> Varchar,
        first_seen -> Timestamptz,
        last_seen -> Timestamptz,
    }
}

table! {
    ip_usage (ip_address) {
        ip_address -> Varchar,
        questions_used_total -> Int4,
        is_blocked -> Bool,
        first_seen -> Timestamptz,
        last_seen -> Timestamptz,
    }
}

table! {
    usage_logs (event_id) {
        event_id -> Int8,
        email -> Nullable<Varchar>,
        ip_address -> Varchar,
        event_time -> Timestamptz,
        questions_generated -> Int4,
        source_type -> Nullable<Varchar>,
        category -> Nullable<Varchar>,
        difficulty -> Nullable<Varchar>,
        notes -> Nullable<Text>,
    }
}

table! {
    user_documents (doc_id) {
        doc_id -> Int4,
        email -> Varchar,
        file_name -> Varchar,
        file_type -> Varchar,
        storage_path -> Varchar,
        text_stage_path -> Nullable<Varchar>,
        extracted_text -> Nullable<Text>,
        text_hash -> Nullable<Varchar>,
        is_deleted -> Bool,
        uploaded_at -> Timestamptz,
    }
}

table! {
    admin_documents (admin_doc_id) {
        admin_doc_id -> Int4,
        file_name -> Varchar,
        file_type -> Varchar,
        storage_path -> Varchar,
        text_stage_path -> Nullable<Varchar>,
        is_downloadable -> Bool,
        uploaded_by -> Varchar,
        text_hash -> Nullable<Varchar>,
        file_content -> Nullable<Text>,
        extracted_text -> Nullable<Text>,
        category -> Varchar,
        is_deleted -> Bool,
        uploaded_at -> Timestamptz,
    }
}

table! {
    payments (payment_id) {
        payment_id -> Int4,
        full_name -> Varchar,
        email -> Varchar,
        gcash_ref -> Nullable<Varchar>,
        plan_requested -> Varchar,
        receipt_storage_path -> Varchar,
        status -> Varchar,
        admin_notes -> Nullable<Text>,
        approved_at -> Nullable<Timestamptz>,
        approved_by -> Nullable<Varchar>,
        submitted_at -> Timestamptz,
    }
}

table! {
    admin_actions (action_id) {
        action_id -> Int8,
        admin_user -> Varchar,
        action_type -> Varchar,
        action_time -> Timestamptz,
        details -> Nullable<Text>,
    }
}

joinable!(user_ip_history -> users (email));
joinable!(user_documents -> users (email));

allow_tables_to_appear_in_same_query!(
    users,
    user_ip_history,
    ip_usage,
    usage_logs,
    user_documents,
    admin_documents,
    payments,
    admin_actions,
);
