use axum::{body::Body, http::Request, Extension, Router};
use jsonwebtoken::{encode, EncodingKey, Header};
use newsworthy_backend::billing::StripeGateway;
use newsworthy_backend::routes::api_routes;
use serde_json::json;
use sqlx::{PgPool, Row};
use tower::ServiceExt;
use uuid::Uuid;

const JWT_SECRET: &str = "test-secret";

fn app(pool: PgPool) -> Router {
    std::env::set_var("JWT_SECRET", JWT_SECRET);
    let gateway = StripeGateway::new(
        "sk_test_xxx",
        "whsec_test",
        "http://localhost:0",
        "https://example.com/success",
        "https://example.com/cancel",
    );
    api_routes()
        .layer(Extension(pool))
        .layer(Extension(gateway))
}

fn token(user_id: i32, role: &str) -> String {
    std::env::set_var("JWT_SECRET", JWT_SECRET);
    let claims = json!({"sub": user_id, "role": role, "exp": 9999999999u64});
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .unwrap()
}

fn authed_json(method: &str, uri: &str, user_id: i32, role: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .header("Authorization", format!("Bearer {}", token(user_id, role)))
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap()
}

fn authed(method: &str, uri: &str, user_id: i32, role: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("Authorization", format!("Bearer {}", token(user_id, role)))
        .body(Body::empty())
        .unwrap()
}

async fn seed_user(pool: &PgPool, email: &str, role: &str) -> i32 {
    sqlx::query_scalar(
        "INSERT INTO users (email, password_hash, role) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(email)
    .bind("hashed")
    .bind(role)
    .fetch_one(pool)
    .await
    .unwrap()
}

async fn seed_company(pool: &PgPool, owner_id: i32) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO companies (id, owner_id, name) VALUES ($1, $2, 'Acme Corp')")
        .bind(id)
        .bind(owner_id)
        .execute(pool)
        .await
        .unwrap();
    id
}

async fn seed_release(pool: &PgPool, user_id: i32, company_id: Uuid, status: &str) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO releases (id, user_id, company_id, title, body, status) \
         VALUES ($1, $2, $3, 'launch', 'body', $4)",
    )
    .bind(id)
    .bind(user_id)
    .bind(company_id)
    .bind(status)
    .execute(pool)
    .await
    .unwrap();
    id
}

async fn release_status(pool: &PgPool, id: Uuid) -> String {
    sqlx::query_scalar("SELECT status FROM releases WHERE id = $1")
        .bind(id)
        .fetch_one(pool)
        .await
        .unwrap()
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL with Postgres server"]
async fn submit_moves_draft_to_editorial_and_queues_it(pool: PgPool) {
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();

    let user_id = seed_user(&pool, "owner1@example.com", "user").await;
    let company_id = seed_company(&pool, user_id).await;
    let release_id = seed_release(&pool, user_id, company_id, "draft").await;

    let response = app(pool.clone())
        .oneshot(authed(
            "POST",
            &format!("/api/releases/{release_id}/submit"),
            user_id,
            "user",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::OK);
    assert_eq!(release_status(&pool, release_id).await, "editorial");

    let queue = sqlx::query(
        "SELECT checked_out_by, approved_at, returned_at FROM editorial_queue WHERE release_id = $1",
    )
    .bind(release_id)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert!(queue.get::<Option<i32>, _>("checked_out_by").is_none());
    assert!(queue
        .get::<Option<chrono::DateTime<chrono::Utc>>, _>("approved_at")
        .is_none());
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL with Postgres server"]
async fn submit_refused_outside_draft_like_statuses(pool: PgPool) {
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();

    let user_id = seed_user(&pool, "owner2@example.com", "user").await;
    let company_id = seed_company(&pool, user_id).await;
    let release_id = seed_release(&pool, user_id, company_id, "approved").await;

    let response = app(pool.clone())
        .oneshot(authed(
            "POST",
            &format!("/api/releases/{release_id}/submit"),
            user_id,
            "user",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::CONFLICT);
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL with Postgres server"]
async fn approve_stamps_queue_and_locks_release(pool: PgPool) {
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();

    let owner = seed_user(&pool, "owner3@example.com", "user").await;
    let editor = seed_user(&pool, "editor3@example.com", "editor").await;
    let company_id = seed_company(&pool, owner).await;
    let release_id = seed_release(&pool, owner, company_id, "editorial").await;
    let queue_id = Uuid::new_v4();
    sqlx::query("INSERT INTO editorial_queue (id, release_id) VALUES ($1, $2)")
        .bind(queue_id)
        .bind(release_id)
        .execute(&pool)
        .await
        .unwrap();

    let response = app(pool.clone())
        .oneshot(authed_json(
            "POST",
            "/api/editorial/review",
            editor,
            "editor",
            json!({
                "releaseId": release_id,
                "queueId": queue_id,
                "action": "approve",
                "notes": "looks good",
                "editorId": editor,
                "editorName": "Eddie Editor"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::OK);
    assert_eq!(release_status(&pool, release_id).await, "approved");

    let queue = sqlx::query(
        "SELECT approved_at, editor_id, editor_name FROM editorial_queue WHERE id = $1",
    )
    .bind(queue_id)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert!(queue
        .get::<Option<chrono::DateTime<chrono::Utc>>, _>("approved_at")
        .is_some());
    assert_eq!(queue.get::<Option<i32>, _>("editor_id"), Some(editor));
    assert_eq!(
        queue.get::<Option<String>, _>("editor_name"),
        Some("Eddie Editor".to_string())
    );

    // Approved releases lock the body against further edits.
    let edit = app(pool.clone())
        .oneshot(authed_json(
            "PUT",
            &format!("/api/releases/{release_id}"),
            owner,
            "user",
            json!({"body": "new body"}),
        ))
        .await
        .unwrap();
    assert_eq!(edit.status(), axum::http::StatusCode::CONFLICT);
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL with Postgres server"]
async fn reject_requires_notes_and_returns_release_to_draft(pool: PgPool) {
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();

    let owner = seed_user(&pool, "owner4@example.com", "user").await;
    let editor = seed_user(&pool, "editor4@example.com", "editor").await;
    let company_id = seed_company(&pool, owner).await;
    let release_id = seed_release(&pool, owner, company_id, "editorial").await;
    let queue_id = Uuid::new_v4();
    sqlx::query("INSERT INTO editorial_queue (id, release_id) VALUES ($1, $2)")
        .bind(queue_id)
        .bind(release_id)
        .execute(&pool)
        .await
        .unwrap();

    let missing_notes = app(pool.clone())
        .oneshot(authed_json(
            "POST",
            "/api/editorial/review",
            editor,
            "editor",
            json!({
                "releaseId": release_id,
                "queueId": queue_id,
                "action": "reject",
                "editorId": editor,
                "editorName": "Eddie Editor"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(missing_notes.status(), axum::http::StatusCode::BAD_REQUEST);
    assert_eq!(release_status(&pool, release_id).await, "editorial");

    let rejected = app(pool.clone())
        .oneshot(authed_json(
            "POST",
            "/api/editorial/review",
            editor,
            "editor",
            json!({
                "releaseId": release_id,
                "queueId": queue_id,
                "action": "reject",
                "notes": "needs a stronger headline",
                "editorId": editor,
                "editorName": "Eddie Editor"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(rejected.status(), axum::http::StatusCode::OK);
    assert_eq!(release_status(&pool, release_id).await, "draft");

    let note_count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM editorial_notes WHERE release_id = $1")
            .bind(release_id)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(note_count, 1);
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL with Postgres server"]
async fn review_forbidden_without_editor_role(pool: PgPool) {
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();

    let owner = seed_user(&pool, "owner5@example.com", "user").await;
    let company_id = seed_company(&pool, owner).await;
    let release_id = seed_release(&pool, owner, company_id, "editorial").await;

    let response = app(pool.clone())
        .oneshot(authed_json(
            "POST",
            "/api/editorial/review",
            owner,
            "user",
            json!({
                "releaseId": release_id,
                "queueId": Uuid::new_v4(),
                "action": "approve",
                "editorId": owner,
                "editorName": "Not An Editor"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::FORBIDDEN);
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL with Postgres server"]
async fn retract_refused_while_checked_out(pool: PgPool) {
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();

    let owner = seed_user(&pool, "owner6@example.com", "user").await;
    let editor = seed_user(&pool, "editor6@example.com", "editor").await;
    let company_id = seed_company(&pool, owner).await;
    let release_id = seed_release(&pool, owner, company_id, "editorial").await;
    sqlx::query(
        "INSERT INTO editorial_queue (id, release_id, checked_out_by) VALUES ($1, $2, $3)",
    )
    .bind(Uuid::new_v4())
    .bind(release_id)
    .bind(editor)
    .execute(&pool)
    .await
    .unwrap();

    let response = app(pool.clone())
        .oneshot(authed(
            "POST",
            &format!("/api/releases/{release_id}/retract"),
            owner,
            "user",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::CONFLICT);
    assert_eq!(release_status(&pool, release_id).await, "editorial");
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL with Postgres server"]
async fn retract_moves_release_to_draftnxt_and_drops_queue_row(pool: PgPool) {
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();

    let owner = seed_user(&pool, "owner7@example.com", "user").await;
    let company_id = seed_company(&pool, owner).await;
    let release_id = seed_release(&pool, owner, company_id, "editorial").await;
    sqlx::query("INSERT INTO editorial_queue (id, release_id) VALUES ($1, $2)")
        .bind(Uuid::new_v4())
        .bind(release_id)
        .execute(&pool)
        .await
        .unwrap();

    let response = app(pool.clone())
        .oneshot(authed(
            "POST",
            &format!("/api/releases/{release_id}/retract"),
            owner,
            "user",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::OK);
    assert_eq!(release_status(&pool, release_id).await, "draftnxt");

    let queue_rows: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM editorial_queue WHERE release_id = $1")
            .bind(release_id)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(queue_rows, 0);
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL with Postgres server"]
async fn delete_refused_in_review_and_terminal_statuses(pool: PgPool) {
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();

    let owner = seed_user(&pool, "owner8@example.com", "user").await;
    let company_id = seed_company(&pool, owner).await;

    for status in ["editorial", "approved", "sent"] {
        let release_id = seed_release(&pool, owner, company_id, status).await;
        let response = app(pool.clone())
            .oneshot(authed(
                "DELETE",
                &format!("/api/releases/{release_id}"),
                owner,
                "user",
            ))
            .await
            .unwrap();
        assert_eq!(
            response.status(),
            axum::http::StatusCode::CONFLICT,
            "delete should be refused for status {status}"
        );
    }
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL with Postgres server"]
async fn delete_draft_removes_negative_credit_rows(pool: PgPool) {
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();

    let owner = seed_user(&pool, "owner9@example.com", "user").await;
    let company_id = seed_company(&pool, owner).await;
    let release_id = seed_release(&pool, owner, company_id, "draft").await;

    sqlx::query(
        "INSERT INTO brand_credits (id, user_id, company_id, credits) VALUES ($1, $2, $3, 10)",
    )
    .bind(Uuid::new_v4())
    .bind(owner)
    .bind(company_id)
    .execute(&pool)
    .await
    .unwrap();
    sqlx::query(
        "INSERT INTO brand_credits (id, user_id, company_id, credits, pr_id) \
         VALUES ($1, $2, $3, -1, $4)",
    )
    .bind(Uuid::new_v4())
    .bind(owner)
    .bind(company_id)
    .bind(release_id)
    .execute(&pool)
    .await
    .unwrap();

    let response = app(pool.clone())
        .oneshot(authed(
            "DELETE",
            &format!("/api/releases/{release_id}"),
            owner,
            "user",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::NO_CONTENT);

    let remaining: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM brand_credits WHERE pr_id = $1")
            .bind(release_id)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(remaining, 0);
    let releases: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM releases WHERE id = $1")
        .bind(release_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(releases, 0);
}
