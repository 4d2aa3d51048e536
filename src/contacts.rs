use axum::extract::{Extension, Path};
use axum::{http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Row};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::extractor::{AuthUser, Role};

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Contact {
    pub id: Uuid,
    pub company_id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct ContactRequest {
    pub name: String,
    pub email: Option<String>,
    pub title: Option<String>,
}

async fn authorize_company(
    pool: &PgPool,
    company_id: Uuid,
    user_id: i32,
    role: Role,
) -> AppResult<()> {
    let row = sqlx::query("SELECT owner_id FROM companies WHERE id = $1")
        .bind(company_id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Db)?;
    let Some(row) = row else {
        return Err(AppError::NotFound);
    };
    let owner_id: i32 = row.get("owner_id");
    if owner_id != user_id && !role.can_read_any() {
        return Err(AppError::Forbidden);
    }
    Ok(())
}

pub async fn list_contacts(
    Extension(pool): Extension<PgPool>,
    AuthUser { user_id, role }: AuthUser,
    Path(company_id): Path<Uuid>,
) -> AppResult<Json<Vec<Contact>>> {
    authorize_company(&pool, company_id, user_id, role).await?;
    let contacts = sqlx::query_as::<_, Contact>(
        "SELECT * FROM contacts WHERE company_id = $1 ORDER BY created_at DESC",
    )
    .bind(company_id)
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!(?e, "DB error listing contacts");
        AppError::Db(e)
    })?;
    Ok(Json(contacts))
}

pub async fn create_contact(
    Extension(pool): Extension<PgPool>,
    AuthUser { user_id, role }: AuthUser,
    Path(company_id): Path<Uuid>,
    Json(payload): Json<ContactRequest>,
) -> AppResult<(StatusCode, Json<Contact>)> {
    authorize_company(&pool, company_id, user_id, role).await?;
    if payload.name.trim().is_empty() {
        return Err(AppError::BadRequest("Name required".into()));
    }
    let contact = sqlx::query_as::<_, Contact>(
        r#"
        INSERT INTO contacts (id, company_id, name, email, title)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(company_id)
    .bind(payload.name.trim())
    .bind(payload.email)
    .bind(payload.title)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!(?e, "DB error creating contact");
        AppError::Db(e)
    })?;
    Ok((StatusCode::CREATED, Json(contact)))
}

pub async fn update_contact(
    Extension(pool): Extension<PgPool>,
    AuthUser { user_id, role }: AuthUser,
    Path((company_id, contact_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<ContactRequest>,
) -> AppResult<Json<Contact>> {
    authorize_company(&pool, company_id, user_id, role).await?;
    if payload.name.trim().is_empty() {
        return Err(AppError::BadRequest("Name required".into()));
    }
    let contact = sqlx::query_as::<_, Contact>(
        r#"
        UPDATE contacts SET name = $1, email = $2, title = $3
        WHERE id = $4 AND company_id = $5
        RETURNING *
        "#,
    )
    .bind(payload.name.trim())
    .bind(payload.email)
    .bind(payload.title)
    .bind(contact_id)
    .bind(company_id)
    .fetch_optional(&pool)
    .await
    .map_err(AppError::Db)?;
    contact.map(Json).ok_or(AppError::NotFound)
}

pub async fn delete_contact(
    Extension(pool): Extension<PgPool>,
    AuthUser { user_id, role }: AuthUser,
    Path((company_id, contact_id)): Path<(Uuid, Uuid)>,
) -> AppResult<StatusCode> {
    authorize_company(&pool, company_id, user_id, role).await?;
    let result = sqlx::query("DELETE FROM contacts WHERE id = $1 AND company_id = $2")
        .bind(contact_id)
        .bind(company_id)
        .execute(&pool)
        .await
        .map_err(AppError::Db)?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }
    Ok(StatusCode::NO_CONTENT)
}
