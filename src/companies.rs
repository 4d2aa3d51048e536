use axum::extract::{Extension, Path};
use axum::{http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::billing::BrandCreditLedger;
use crate::error::{AppError, AppResult};
use crate::extractor::AuthUser;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Company {
    pub id: Uuid,
    pub owner_id: i32,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CompanyRequest {
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct BrandBalance {
    pub company_id: Uuid,
    pub credits: i64,
}

async fn fetch_company(pool: &PgPool, id: Uuid) -> AppResult<Company> {
    let company = sqlx::query_as::<_, Company>("SELECT * FROM companies WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(|e| {
            tracing::error!(?e, "DB error fetching company");
            AppError::Db(e)
        })?;
    company.ok_or(AppError::NotFound)
}

pub async fn create_company(
    Extension(pool): Extension<PgPool>,
    AuthUser { user_id, .. }: AuthUser,
    Json(payload): Json<CompanyRequest>,
) -> AppResult<(StatusCode, Json<Company>)> {
    if payload.name.trim().is_empty() {
        return Err(AppError::BadRequest("Name required".into()));
    }
    let company = sqlx::query_as::<_, Company>(
        "INSERT INTO companies (id, owner_id, name) VALUES ($1, $2, $3) RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(payload.name.trim())
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!(?e, "DB error creating company");
        AppError::Db(e)
    })?;
    Ok((StatusCode::CREATED, Json(company)))
}

pub async fn list_companies(
    Extension(pool): Extension<PgPool>,
    AuthUser { user_id, role }: AuthUser,
) -> AppResult<Json<Vec<Company>>> {
    let companies = if role.can_read_any() {
        sqlx::query_as::<_, Company>("SELECT * FROM companies ORDER BY created_at DESC")
            .fetch_all(&pool)
            .await
    } else {
        sqlx::query_as::<_, Company>(
            "SELECT * FROM companies WHERE owner_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&pool)
        .await
    }
    .map_err(|e| {
        tracing::error!(?e, "DB error listing companies");
        AppError::Db(e)
    })?;
    Ok(Json(companies))
}

pub async fn get_company(
    Extension(pool): Extension<PgPool>,
    AuthUser { user_id, role }: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Company>> {
    let company = fetch_company(&pool, id).await?;
    if company.owner_id != user_id && !role.can_read_any() {
        return Err(AppError::Forbidden);
    }
    Ok(Json(company))
}

pub async fn update_company(
    Extension(pool): Extension<PgPool>,
    AuthUser { user_id, .. }: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<CompanyRequest>,
) -> AppResult<Json<Company>> {
    let company = fetch_company(&pool, id).await?;
    if company.owner_id != user_id {
        return Err(AppError::Forbidden);
    }
    if payload.name.trim().is_empty() {
        return Err(AppError::BadRequest("Name required".into()));
    }
    let updated = sqlx::query_as::<_, Company>(
        "UPDATE companies SET name = $1 WHERE id = $2 RETURNING *",
    )
    .bind(payload.name.trim())
    .bind(id)
    .fetch_one(&pool)
    .await
    .map_err(AppError::Db)?;
    Ok(Json(updated))
}

pub async fn delete_company(
    Extension(pool): Extension<PgPool>,
    AuthUser { user_id, .. }: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let company = fetch_company(&pool, id).await?;
    if company.owner_id != user_id {
        return Err(AppError::Forbidden);
    }
    sqlx::query("DELETE FROM companies WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await
        .map_err(AppError::Db)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Company credit balance derived from the brand ledger.
pub async fn company_credits(
    Extension(pool): Extension<PgPool>,
    AuthUser { user_id, role }: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<BrandBalance>> {
    let company = fetch_company(&pool, id).await?;
    if company.owner_id != user_id && !role.can_read_any() {
        return Err(AppError::Forbidden);
    }
    let ledger = BrandCreditLedger::new(pool);
    let credits = ledger
        .balance(id)
        .await
        .map_err(|e| AppError::Message(format!("balance query failed: {e}")))?;
    Ok(Json(BrandBalance {
        company_id: id,
        credits,
    }))
}
