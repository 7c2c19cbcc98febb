diesel::table! {
    threads (id) {
        id -> Uuid,
        subject -> Text,
        created_by -> Uuid,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    thread_participants (thread_id, user_id) {
        thread_id -> Uuid,
        user_id -> Uuid,
        joined_at -> Timestamptz,
        last_read_at -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    messages (id) {
        id -> Uuid,
        thread_id -> Uuid,
        sender_id -> Uuid,
        body -> Text,
        client_ref -> Nullable<Text>,
        created_at -> Timestamptz,
    }
}
