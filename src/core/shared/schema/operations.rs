diesel::table! {
    projects (id) {
        id -> Uuid,
        code -> Text,
        name -> Text,
        client_name -> Nullable<Text>,
        description -> Nullable<Text>,
        status -> Text,
        manager_id -> Nullable<Uuid>,
        start_date -> Nullable<Date>,
        end_date -> Nullable<Date>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    service_jobs (id) {
        id -> Uuid,
        job_number -> Text,
        project_id -> Nullable<Uuid>,
        title -> Text,
        description -> Nullable<Text>,
        customer_name -> Nullable<Text>,
        location -> Nullable<Text>,
        status -> Text,
        priority -> Text,
        assigned_to -> Nullable<Uuid>,
        scheduled_date -> Nullable<Date>,
        completed_at -> Nullable<Timestamptz>,
        created_by -> Uuid,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    tasks (id) {
        id -> Uuid,
        title -> Text,
        description -> Nullable<Text>,
        status -> Text,
        priority -> Text,
        assignee_id -> Nullable<Uuid>,
        project_id -> Nullable<Uuid>,
        due_date -> Nullable<Date>,
        created_by -> Uuid,
        completed_at -> Nullable<Timestamptz>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    announcements (id) {
        id -> Uuid,
        title -> Text,
        body -> Text,
        author_id -> Uuid,
        pinned -> Bool,
        published_at -> Timestamptz,
        expires_at -> Nullable<Timestamptz>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}
