use axum::extract::{Extension, Path};
use axum::{http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::billing::Product;
use crate::error::{AppError, AppResult};
use crate::extractor::AuthUser;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductUpsertRequest {
    pub display_name: String,
    /// Integer minor-currency units.
    pub price: i32,
    pub product_type: String,
    #[serde(default)]
    pub credits: Option<i32>,
    #[serde(default)]
    pub currency: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductInfo {
    pub id: Uuid,
    pub display_name: String,
    pub product_type: String,
    pub credits: i32,
    pub price: i32,
    pub currency: String,
}

impl From<Product> for ProductInfo {
    fn from(p: Product) -> Self {
        ProductInfo {
            id: p.id,
            display_name: p.display_name,
            product_type: p.product_type,
            credits: p.credits,
            price: p.price_cents,
            currency: p.currency,
        }
    }
}

/// Public catalog. Soft-deleted products stay in the table for the sake of
/// historical cart items but never show up here.
pub async fn list_products(
    Extension(pool): Extension<PgPool>,
) -> AppResult<Json<Vec<ProductInfo>>> {
    let products = sqlx::query_as::<_, Product>(
        "SELECT * FROM products WHERE is_deleted = FALSE ORDER BY created_at ASC",
    )
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!(?e, "DB error listing products");
        AppError::Db(e)
    })?;
    Ok(Json(products.into_iter().map(ProductInfo::from).collect()))
}

pub async fn create_product(
    Extension(pool): Extension<PgPool>,
    AuthUser { role, .. }: AuthUser,
    Json(payload): Json<ProductUpsertRequest>,
) -> AppResult<(StatusCode, Json<ProductInfo>)> {
    if !role.can_manage_catalog() {
        return Err(AppError::Forbidden);
    }
    if payload.display_name.trim().is_empty() {
        return Err(AppError::BadRequest("displayName required".into()));
    }
    if payload.product_type.trim().is_empty() {
        return Err(AppError::BadRequest("productType required".into()));
    }
    if payload.price < 0 {
        return Err(AppError::BadRequest("price must be non-negative".into()));
    }
    let product = sqlx::query_as::<_, Product>(
        r#"
        INSERT INTO products (id, display_name, product_type, credits, price_cents, currency)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(payload.display_name.trim())
    .bind(payload.product_type.trim())
    .bind(payload.credits.unwrap_or(0))
    .bind(payload.price)
    .bind(payload.currency.as_deref().unwrap_or("usd"))
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!(?e, "DB error creating product");
        AppError::Db(e)
    })?;
    Ok((StatusCode::CREATED, Json(product.into())))
}

pub async fn update_product(
    Extension(pool): Extension<PgPool>,
    AuthUser { role, .. }: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<ProductUpsertRequest>,
) -> AppResult<Json<ProductInfo>> {
    if !role.can_manage_catalog() {
        return Err(AppError::Forbidden);
    }
    if payload.display_name.trim().is_empty() {
        return Err(AppError::BadRequest("displayName required".into()));
    }
    let product = sqlx::query_as::<_, Product>(
        r#"
        UPDATE products SET
            display_name = $1,
            product_type = $2,
            credits = COALESCE($3, credits),
            price_cents = $4,
            currency = COALESCE($5, currency),
            updated_at = NOW()
        WHERE id = $6 AND is_deleted = FALSE
        RETURNING *
        "#,
    )
    .bind(payload.display_name.trim())
    .bind(payload.product_type.trim())
    .bind(payload.credits)
    .bind(payload.price)
    .bind(payload.currency)
    .bind(id)
    .fetch_optional(&pool)
    .await
    .map_err(|e| {
        tracing::error!(?e, "DB error updating product");
        AppError::Db(e)
    })?;
    let Some(product) = product else {
        return Err(AppError::NotFound);
    };
    Ok(Json(product.into()))
}

/// Soft delete. The row stays so historical cart-item snapshots keep a valid
/// product reference.
pub async fn delete_product(
    Extension(pool): Extension<PgPool>,
    AuthUser { role, .. }: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    if !role.can_manage_catalog() {
        return Err(AppError::Forbidden);
    }
    let result = sqlx::query(
        "UPDATE products SET is_deleted = TRUE, updated_at = NOW() WHERE id = $1 AND is_deleted = FALSE",
    )
    .bind(id)
    .execute(&pool)
    .await
    .map_err(|e| {
        tracing::error!(?e, "DB error soft-deleting product");
        AppError::Db(e)
    })?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }
    Ok(StatusCode::NO_CONTENT)
}
