use axum::extract::{Extension, Path};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::extractor::AuthUser;
use crate::releases::{Release, ReleaseStatus};

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct QueueEntry {
    pub id: Uuid,
    pub release_id: Uuid,
    pub submitted_at: DateTime<Utc>,
    pub checked_out_by: Option<i32>,
    pub approved_at: Option<DateTime<Utc>>,
    pub returned_at: Option<DateTime<Utc>>,
    pub editor_id: Option<i32>,
    pub editor_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRequest {
    pub release_id: Uuid,
    pub queue_id: Uuid,
    pub action: ReviewAction,
    #[serde(default)]
    pub notes: Option<String>,
    pub editor_id: i32,
    pub editor_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewAction {
    Approve,
    Reject,
}

pub async fn list_queue(
    Extension(pool): Extension<PgPool>,
    AuthUser { role, .. }: AuthUser,
) -> AppResult<Json<Vec<QueueEntry>>> {
    if !role.can_review() {
        return Err(AppError::Forbidden);
    }
    let entries = sqlx::query_as::<_, QueueEntry>(
        "SELECT * FROM editorial_queue WHERE approved_at IS NULL AND returned_at IS NULL \
         ORDER BY submitted_at ASC",
    )
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!(?e, "DB error listing editorial queue");
        AppError::Db(e)
    })?;
    Ok(Json(entries))
}

/// Marks a queued release as checked out by the reviewing editor, which
/// blocks owner retraction until review finishes.
pub async fn checkout_entry(
    Extension(pool): Extension<PgPool>,
    AuthUser { user_id, role }: AuthUser,
    Path(queue_id): Path<Uuid>,
) -> AppResult<Json<QueueEntry>> {
    if !role.can_review() {
        return Err(AppError::Forbidden);
    }
    let entry = sqlx::query_as::<_, QueueEntry>(
        "UPDATE editorial_queue SET checked_out_by = $1 WHERE id = $2 RETURNING *",
    )
    .bind(user_id)
    .bind(queue_id)
    .fetch_optional(&pool)
    .await
    .map_err(AppError::Db)?;
    entry.map(Json).ok_or(AppError::NotFound)
}

/// Editorial decision endpoint. Approve stamps the queue row with approval
/// time and editor identity; reject stamps the return time and sends the
/// release back to draft. Rejection notes are required.
pub async fn review_release(
    Extension(pool): Extension<PgPool>,
    AuthUser { role, .. }: AuthUser,
    Json(payload): Json<ReviewRequest>,
) -> AppResult<Json<Release>> {
    if !role.can_review() {
        return Err(AppError::Forbidden);
    }

    let notes = payload.notes.as_deref().map(str::trim).filter(|n| !n.is_empty());
    if payload.action == ReviewAction::Reject && notes.is_none() {
        return Err(AppError::BadRequest(
            "notes are required when rejecting a release".into(),
        ));
    }

    let release = sqlx::query_as::<_, Release>("SELECT * FROM releases WHERE id = $1")
        .bind(payload.release_id)
        .fetch_optional(&pool)
        .await
        .map_err(AppError::Db)?
        .ok_or(AppError::NotFound)?;
    if ReleaseStatus::parse(&release.status) != Some(ReleaseStatus::Editorial) {
        return Err(AppError::Conflict(format!(
            "release in status '{}' is not awaiting review",
            release.status
        )));
    }

    let mut tx = pool.begin().await.map_err(AppError::Db)?;

    let updated = match payload.action {
        ReviewAction::Approve => {
            let updated = sqlx::query_as::<_, Release>(
                "UPDATE releases SET status = 'approved', updated_at = NOW() \
                 WHERE id = $1 RETURNING *",
            )
            .bind(payload.release_id)
            .fetch_one(&mut tx)
            .await
            .map_err(AppError::Db)?;
            let stamped = sqlx::query(
                "UPDATE editorial_queue SET approved_at = NOW(), editor_id = $1, \
                 editor_name = $2, checked_out_by = NULL WHERE id = $3 AND release_id = $4",
            )
            .bind(payload.editor_id)
            .bind(&payload.editor_name)
            .bind(payload.queue_id)
            .bind(payload.release_id)
            .execute(&mut tx)
            .await
            .map_err(AppError::Db)?;
            if stamped.rows_affected() == 0 {
                return Err(AppError::NotFound);
            }
            updated
        }
        ReviewAction::Reject => {
            let updated = sqlx::query_as::<_, Release>(
                "UPDATE releases SET status = 'draft', updated_at = NOW() \
                 WHERE id = $1 RETURNING *",
            )
            .bind(payload.release_id)
            .fetch_one(&mut tx)
            .await
            .map_err(AppError::Db)?;
            let stamped = sqlx::query(
                "UPDATE editorial_queue SET returned_at = NOW(), editor_id = $1, \
                 editor_name = $2, checked_out_by = NULL WHERE id = $3 AND release_id = $4",
            )
            .bind(payload.editor_id)
            .bind(&payload.editor_name)
            .bind(payload.queue_id)
            .bind(payload.release_id)
            .execute(&mut tx)
            .await
            .map_err(AppError::Db)?;
            if stamped.rows_affected() == 0 {
                return Err(AppError::NotFound);
            }
            updated
        }
    };

    if let Some(body) = notes {
        sqlx::query(
            r#"
            INSERT INTO editorial_notes (id, release_id, editor_id, editor_name, body)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(payload.release_id)
        .bind(payload.editor_id)
        .bind(&payload.editor_name)
        .bind(body)
        .execute(&mut tx)
        .await
        .map_err(AppError::Db)?;
    }

    tx.commit().await.map_err(AppError::Db)?;
    Ok(Json(updated))
}
