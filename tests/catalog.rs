use axum::{body::Body, http::Request, Extension, Router};
use jsonwebtoken::{encode, EncodingKey, Header};
use newsworthy_backend::billing::StripeGateway;
use newsworthy_backend::routes::api_routes;
use serde_json::json;
use sqlx::PgPool;
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
    let claims = json!({"sub": user_id, "role": role, "exp": 9999999999u64});
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .unwrap()
}

fn request(method: &str, uri: &str, user_id: i32, role: &str, body: Option<serde_json::Value>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("Authorization", format!("Bearer {}", token(user_id, role)));
    let body = match body {
        Some(value) => {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&value).unwrap())
        }
        None => Body::empty(),
    };
    builder.body(body).unwrap()
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

#[sqlx::test]
#[ignore = "requires DATABASE_URL with Postgres server"]
async fn admin_creates_product_and_public_lists_it(pool: PgPool) {
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();

    let admin = seed_user(&pool, "admin@example.com", "admin").await;

    let created = app(pool.clone())
        .oneshot(request(
            "PUT",
            "/api/products",
            admin,
            "admin",
            Some(json!({
                "displayName": "5-credit PR bundle",
                "price": 5000,
                "productType": "pr",
                "credits": 5
            })),
        ))
        .await
        .unwrap();
    assert_eq!(created.status(), axum::http::StatusCode::CREATED);

    let listed = app(pool.clone())
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/api/products")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(listed.status(), axum::http::StatusCode::OK);
    let body = hyper::body::to_bytes(listed.into_body()).await.unwrap();
    let products: Vec<serde_json::Value> = serde_json::from_slice(&body).unwrap();
    assert_eq!(products.len(), 1);
    assert_eq!(products[0]["displayName"], "5-credit PR bundle");
    assert_eq!(products[0]["price"], 5000);
    assert_eq!(products[0]["productType"], "pr");
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL with Postgres server"]
async fn product_create_requires_catalog_role(pool: PgPool) {
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();

    let user = seed_user(&pool, "plain@example.com", "user").await;
    let response = app(pool.clone())
        .oneshot(request(
            "PUT",
            "/api/products",
            user,
            "user",
            Some(json!({
                "displayName": "Bundle",
                "price": 1000,
                "productType": "pr"
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::FORBIDDEN);
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL with Postgres server"]
async fn product_create_validates_required_fields(pool: PgPool) {
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();

    let admin = seed_user(&pool, "admin2@example.com", "admin").await;
    let response = app(pool.clone())
        .oneshot(request(
            "PUT",
            "/api/products",
            admin,
            "admin",
            Some(json!({
                "displayName": "   ",
                "price": 1000,
                "productType": "pr"
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::BAD_REQUEST);
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL with Postgres server"]
async fn delete_is_soft_and_keeps_the_row(pool: PgPool) {
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();

    let staff = seed_user(&pool, "staff@example.com", "staff").await;
    let product_id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO products (id, display_name, product_type, credits, price_cents) \
         VALUES ($1, 'Bundle', 'pr', 5, 5000)",
    )
    .bind(product_id)
    .execute(&pool)
    .await
    .unwrap();

    let response = app(pool.clone())
        .oneshot(request(
            "DELETE",
            &format!("/api/products/{product_id}"),
            staff,
            "staff",
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::NO_CONTENT);

    // Row survives for the sake of historical cart items.
    let is_deleted: bool =
        sqlx::query_scalar("SELECT is_deleted FROM products WHERE id = $1")
            .bind(product_id)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert!(is_deleted);

    // But it no longer appears in the public catalog.
    let listed = app(pool.clone())
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/api/products")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let body = hyper::body::to_bytes(listed.into_body()).await.unwrap();
    let products: Vec<serde_json::Value> = serde_json::from_slice(&body).unwrap();
    assert!(products.is_empty());
}
