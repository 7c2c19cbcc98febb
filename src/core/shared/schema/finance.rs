diesel::table! {
    account_heads (id) {
        id -> Uuid,
        name -> Text,
        bank_name -> Text,
        account_number -> Text,
        iban -> Nullable<Text>,
        currency -> Text,
        status -> Text,
        requested_by -> Uuid,
        approved_by -> Nullable<Uuid>,
        approved_at -> Nullable<Timestamptz>,
        rejection_reason -> Nullable<Text>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    payment_instructions (id) {
        id -> Uuid,
        reference -> Text,
        payee -> Text,
        amount -> Numeric,
        currency -> Text,
        due_date -> Date,
        description -> Nullable<Text>,
        project_id -> Nullable<Uuid>,
        account_head_id -> Nullable<Uuid>,
        status -> Text,
        created_by -> Uuid,
        decided_by -> Nullable<Uuid>,
        decided_at -> Nullable<Timestamptz>,
        rejection_reason -> Nullable<Text>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    collections (id) {
        id -> Uuid,
        reference -> Nullable<Text>,
        payer -> Text,
        amount -> Numeric,
        currency -> Text,
        received_on -> Date,
        method -> Text,
        project_id -> Nullable<Uuid>,
        notes -> Nullable<Text>,
        recorded_by -> Uuid,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    deposits (id) {
        id -> Uuid,
        account_head_id -> Uuid,
        amount -> Numeric,
        currency -> Text,
        deposited_on -> Date,
        reference -> Nullable<Text>,
        notes -> Nullable<Text>,
        recorded_by -> Uuid,
        created_at -> Timestamptz,
    }
}
