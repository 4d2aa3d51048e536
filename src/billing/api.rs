use axum::extract::Extension;
use axum::Json;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use super::checkout::CheckoutService;
use super::models::UserSubscription;
use super::stripe::StripeGateway;
use crate::error::{AppError, AppResult};
use crate::extractor::AuthUser;

/// key: billing-api -> rest endpoints
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartCheckoutRequest {
    pub product_id: Uuid,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartCheckoutResponse {
    pub url: String,
    pub cart_session_id: Uuid,
}

/// POST /api/checkout. Creates the draft cart session and hands the buyer a
/// hosted checkout URL. An unresolved product id yields 404.
pub async fn start_checkout(
    Extension(pool): Extension<PgPool>,
    Extension(gateway): Extension<StripeGateway>,
    AuthUser { user_id, .. }: AuthUser,
    Json(payload): Json<StartCheckoutRequest>,
) -> AppResult<Json<StartCheckoutResponse>> {
    let service = CheckoutService::new(pool);
    let started = service
        .initiate(&gateway, user_id, payload.product_id)
        .await
        .map_err(|e| {
            tracing::error!(?e, "checkout initiation failed");
            AppError::BadGateway(format!("checkout could not be started: {e}"))
        })?;
    let Some(started) = started else {
        return Err(AppError::NotFound);
    };
    Ok(Json(StartCheckoutResponse {
        url: started.url,
        cart_session_id: started.cart_session_id,
    }))
}

/// GET /api/me/credits. The caller's mutable credit counters; a user who
/// never purchased anything reads as all zeros.
pub async fn my_credits(
    Extension(pool): Extension<PgPool>,
    AuthUser { user_id, .. }: AuthUser,
) -> AppResult<Json<UserSubscription>> {
    let subscription = sqlx::query_as::<_, UserSubscription>(
        "SELECT * FROM user_subscriptions WHERE user_id = $1",
    )
    .bind(user_id)
    .fetch_optional(&pool)
    .await
    .map_err(|e| {
        tracing::error!(?e, "DB error fetching subscription");
        AppError::Db(e)
    })?;
    Ok(Json(subscription.unwrap_or(UserSubscription {
        user_id,
        remaining_pr: 0,
        remaining_pluspr: 0,
        newsdb_credits: 0,
        updated_at: chrono::Utc::now(),
    })))
}
