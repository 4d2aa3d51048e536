use axum::extract::{Extension, Path};
use axum::{http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Row};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::extractor::AuthUser;

/// Release lifecycle: start -> draft -> editorial -> {approved | draft} -> sent.
/// `Draftnxt` marks a release retracted from editorial back toward draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseStatus {
    Draft,
    Draftnxt,
    Editorial,
    Approved,
    Sent,
}

impl ReleaseStatus {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "draft" => Some(ReleaseStatus::Draft),
            "draftnxt" => Some(ReleaseStatus::Draftnxt),
            "editorial" => Some(ReleaseStatus::Editorial),
            "approved" => Some(ReleaseStatus::Approved),
            "sent" => Some(ReleaseStatus::Sent),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReleaseStatus::Draft => "draft",
            ReleaseStatus::Draftnxt => "draftnxt",
            ReleaseStatus::Editorial => "editorial",
            ReleaseStatus::Approved => "approved",
            ReleaseStatus::Sent => "sent",
        }
    }

    /// Approved and sent releases lock the body against further edits.
    pub fn is_locked(&self) -> bool {
        matches!(self, ReleaseStatus::Approved | ReleaseStatus::Sent)
    }

    /// Only draft-like releases can be submitted for review.
    pub fn can_submit(&self) -> bool {
        matches!(self, ReleaseStatus::Draft | ReleaseStatus::Draftnxt)
    }

    /// Deletion is refused while a release is under review or past approval.
    pub fn blocks_delete(&self) -> bool {
        matches!(
            self,
            ReleaseStatus::Editorial | ReleaseStatus::Approved | ReleaseStatus::Sent
        )
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Release {
    pub id: Uuid,
    pub user_id: i32,
    pub company_id: Uuid,
    pub title: String,
    pub body: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReleaseRequest {
    pub company_id: Uuid,
    pub title: String,
    #[serde(default)]
    pub body: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateReleaseRequest {
    pub title: Option<String>,
    pub body: Option<String>,
}

async fn fetch_release(pool: &PgPool, id: Uuid) -> AppResult<Release> {
    let release = sqlx::query_as::<_, Release>("SELECT * FROM releases WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(|e| {
            tracing::error!(?e, "DB error fetching release");
            AppError::Db(e)
        })?;
    release.ok_or(AppError::NotFound)
}

fn status_of(release: &Release) -> AppResult<ReleaseStatus> {
    ReleaseStatus::parse(&release.status)
        .ok_or_else(|| AppError::Message(format!("corrupt release status: {}", release.status)))
}

pub async fn create_release(
    Extension(pool): Extension<PgPool>,
    AuthUser { user_id, .. }: AuthUser,
    Json(payload): Json<CreateReleaseRequest>,
) -> AppResult<(StatusCode, Json<Release>)> {
    if payload.title.trim().is_empty() {
        return Err(AppError::BadRequest("title required".into()));
    }
    let release = sqlx::query_as::<_, Release>(
        r#"
        INSERT INTO releases (id, user_id, company_id, title, body, status)
        VALUES ($1, $2, $3, $4, $5, 'draft')
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(payload.company_id)
    .bind(payload.title.trim())
    .bind(&payload.body)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!(?e, "DB error creating release");
        AppError::Db(e)
    })?;
    Ok((StatusCode::CREATED, Json(release)))
}

pub async fn list_releases(
    Extension(pool): Extension<PgPool>,
    AuthUser { user_id, role }: AuthUser,
) -> AppResult<Json<Vec<Release>>> {
    let releases = if role.can_read_any() {
        sqlx::query_as::<_, Release>("SELECT * FROM releases ORDER BY created_at DESC")
            .fetch_all(&pool)
            .await
    } else {
        sqlx::query_as::<_, Release>(
            "SELECT * FROM releases WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&pool)
        .await
    }
    .map_err(|e| {
        tracing::error!(?e, "DB error listing releases");
        AppError::Db(e)
    })?;
    Ok(Json(releases))
}

pub async fn get_release(
    Extension(pool): Extension<PgPool>,
    AuthUser { user_id, role }: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Release>> {
    let release = fetch_release(&pool, id).await?;
    if release.user_id != user_id && !role.can_read_any() && !role.can_review() {
        return Err(AppError::Forbidden);
    }
    Ok(Json(release))
}

/// Edit apply. Rejected once the release reaches a locked status.
pub async fn update_release(
    Extension(pool): Extension<PgPool>,
    AuthUser { user_id, .. }: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateReleaseRequest>,
) -> AppResult<Json<Release>> {
    let release = fetch_release(&pool, id).await?;
    if release.user_id != user_id {
        return Err(AppError::Forbidden);
    }
    if status_of(&release)?.is_locked() {
        return Err(AppError::Conflict(
            "release is approved or sent and can no longer be edited".into(),
        ));
    }
    let updated = sqlx::query_as::<_, Release>(
        r#"
        UPDATE releases SET
            title = COALESCE($1, title),
            body = COALESCE($2, body),
            updated_at = NOW()
        WHERE id = $3
        RETURNING *
        "#,
    )
    .bind(payload.title)
    .bind(payload.body)
    .bind(id)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!(?e, "DB error updating release");
        AppError::Db(e)
    })?;
    Ok(Json(updated))
}

/// Deleting a release also deletes its negative brand-credit rows, which
/// restores the company's ledger balance exactly.
pub async fn delete_release(
    Extension(pool): Extension<PgPool>,
    AuthUser { user_id, .. }: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let release = fetch_release(&pool, id).await?;
    if release.user_id != user_id {
        return Err(AppError::Forbidden);
    }
    if status_of(&release)?.blocks_delete() {
        return Err(AppError::Conflict(format!(
            "release in status '{}' cannot be deleted",
            release.status
        )));
    }

    let mut tx = pool.begin().await.map_err(AppError::Db)?;
    sqlx::query(
        "DELETE FROM brand_credits WHERE pr_id = $1 AND user_id = $2 AND credits < 0",
    )
    .bind(id)
    .bind(user_id)
    .execute(&mut tx)
    .await
    .map_err(AppError::Db)?;
    sqlx::query("DELETE FROM editorial_queue WHERE release_id = $1")
        .bind(id)
        .execute(&mut tx)
        .await
        .map_err(AppError::Db)?;
    sqlx::query("DELETE FROM releases WHERE id = $1")
        .bind(id)
        .execute(&mut tx)
        .await
        .map_err(AppError::Db)?;
    tx.commit().await.map_err(AppError::Db)?;

    Ok(StatusCode::NO_CONTENT)
}

/// Submit for review: draft-like -> editorial, and the queue row is created
/// or reset (prior approve/return stamps and checkout marker cleared).
pub async fn submit_release(
    Extension(pool): Extension<PgPool>,
    AuthUser { user_id, .. }: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Release>> {
    let release = fetch_release(&pool, id).await?;
    if release.user_id != user_id {
        return Err(AppError::Forbidden);
    }
    if !status_of(&release)?.can_submit() {
        return Err(AppError::Conflict(format!(
            "release in status '{}' cannot be submitted for review",
            release.status
        )));
    }

    let mut tx = pool.begin().await.map_err(AppError::Db)?;
    let updated = sqlx::query_as::<_, Release>(
        "UPDATE releases SET status = 'editorial', updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .fetch_one(&mut tx)
    .await
    .map_err(AppError::Db)?;
    sqlx::query(
        r#"
        INSERT INTO editorial_queue (id, release_id, submitted_at)
        VALUES ($1, $2, NOW())
        ON CONFLICT (release_id) DO UPDATE SET
            submitted_at = NOW(),
            checked_out_by = NULL,
            approved_at = NULL,
            returned_at = NULL,
            editor_id = NULL,
            editor_name = NULL
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(id)
    .execute(&mut tx)
    .await
    .map_err(AppError::Db)?;
    tx.commit().await.map_err(AppError::Db)?;

    Ok(Json(updated))
}

/// Owner retract: editorial -> draftnxt, refused while an editor has the
/// release checked out. The queue row is deleted on retract.
pub async fn retract_release(
    Extension(pool): Extension<PgPool>,
    AuthUser { user_id, .. }: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Release>> {
    let release = fetch_release(&pool, id).await?;
    if release.user_id != user_id {
        return Err(AppError::Forbidden);
    }
    if status_of(&release)? != ReleaseStatus::Editorial {
        return Err(AppError::Conflict(format!(
            "release in status '{}' is not in editorial review",
            release.status
        )));
    }

    let queue = sqlx::query("SELECT checked_out_by FROM editorial_queue WHERE release_id = $1")
        .bind(id)
        .fetch_optional(&pool)
        .await
        .map_err(AppError::Db)?;
    if let Some(row) = &queue {
        let checked_out_by: Option<i32> = row.get("checked_out_by");
        if checked_out_by.is_some() {
            return Err(AppError::Conflict(
                "release is checked out by an editor".into(),
            ));
        }
    }

    let mut tx = pool.begin().await.map_err(AppError::Db)?;
    let updated = sqlx::query_as::<_, Release>(
        "UPDATE releases SET status = 'draftnxt', updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .fetch_one(&mut tx)
    .await
    .map_err(AppError::Db)?;
    sqlx::query("DELETE FROM editorial_queue WHERE release_id = $1")
        .bind(id)
        .execute(&mut tx)
        .await
        .map_err(AppError::Db)?;
    tx.commit().await.map_err(AppError::Db)?;

    Ok(Json(updated))
}
