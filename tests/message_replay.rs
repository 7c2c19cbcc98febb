//! Runs against a real database. Set `PULSE_TEST_DATABASE_URL` to a
//! disposable Postgres; without it the test returns early.

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chrono::Utc;
use diesel::prelude::*;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

use pulse::core::config::AppConfig;
use pulse::core::shared::schema::{roles, users};
use pulse::core::shared::state::AppState;
use pulse::directory::types::UserRow;
use pulse::main_module::{build_router, init_database, seed_defaults};
use pulse::security::permissions::Permission;

fn database_url() -> Option<String> {
    std::env::var("PULSE_TEST_DATABASE_URL")
        .ok()
        .filter(|url| !url.trim().is_empty())
}

fn insert_user(conn: &mut PgConnection, role_id: Uuid, name: &str) -> Uuid {
    let now = Utc::now();
    let id = Uuid::new_v4();
    let username = format!("{name}-{}", &id.simple().to_string()[..8]);
    diesel::insert_into(users::table)
        .values(&UserRow {
            id,
            email: format!("{username}@pulse.test"),
            username,
            full_name: name.to_string(),
            password_hash: "unused".to_string(),
            role_id,
            is_active: true,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        })
        .execute(conn)
        .unwrap();
    id
}

fn bearer(state: &AppState, user_id: Uuid) -> String {
    state
        .jwt_manager
        .issue(
            user_id,
            "tester",
            "Staff",
            vec![Permission::MessagingUse.as_str().to_string()],
        )
        .unwrap()
        .token
}

async fn post(app: &Router, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
    let req = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

#[tokio::test]
async fn test_replayed_client_ref_returns_stored_message() {
    let Some(url) = database_url() else {
        eprintln!("PULSE_TEST_DATABASE_URL not set, skipping");
        return;
    };

    let mut config = AppConfig::default();
    config.database.url = url;
    config.database.pool_size = 2;
    config.server.ui_path = "./does-not-exist".to_string();
    config.auth.jwt_secret = "integration-test-secret-with-enough-bytes".to_string();

    let pool = init_database(&config).unwrap();
    seed_defaults(&pool, Some("Harbour2026!".to_string())).unwrap();
    let (sender, other) = {
        let mut conn = pool.get().unwrap();
        let role_id: Uuid = roles::table.select(roles::id).first(&mut conn).unwrap();
        (
            insert_user(&mut conn, role_id, "rana"),
            insert_user(&mut conn, role_id, "omar"),
        )
    };

    let state = Arc::new(AppState::new(config, pool));
    let app = build_router(Arc::clone(&state));
    let sender_token = bearer(&state, sender);
    let other_token = bearer(&state, other);

    let (status, thread) = post(
        &app,
        "/api/threads",
        &sender_token,
        json!({ "subject": "Depot generator", "participant_ids": [other] }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let uri = format!("/api/threads/{}/messages", thread["id"].as_str().unwrap());

    let message = json!({ "body": "Technician booked for Thursday", "client_ref": "tmp-42" });
    let (first_status, first) = post(&app, &uri, &sender_token, message.clone()).await;
    assert_eq!(first_status, StatusCode::CREATED);

    let (replay_status, replay) = post(&app, &uri, &sender_token, message).await;
    assert_eq!(replay_status, StatusCode::OK);
    assert_eq!(replay["id"], first["id"]);
    assert_eq!(replay["body"], "Technician booked for Thursday");

    // The key is scoped to the sender.
    let (status, theirs) = post(
        &app,
        &uri,
        &other_token,
        json!({ "body": "Thanks", "client_ref": "tmp-42" }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_ne!(theirs["id"], first["id"]);
}
