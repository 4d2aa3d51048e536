use anyhow::Result;
use axum::{body::Bytes, extract::Extension, http::HeaderMap, Json};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row};
use tracing::{info, warn};
use uuid::Uuid;

use super::models::{
    CartItem, CART_STATUS_COMPLETED, TRANSACTION_FAILED, TRANSACTION_SUCCEEDED,
};
use super::stripe::StripeGateway;
use crate::error::{AppError, AppResult};

/// key: webhook-reconciler -> payment events into session/transaction/credit state
#[derive(Clone)]
pub struct Reconciler {
    pool: PgPool,
}

#[derive(Debug, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Applied,
    /// A succeeded transaction already exists for this session; replays are
    /// acknowledged without re-incrementing credits.
    AlreadyProcessed,
    /// No cart session matches the processor reference. Acknowledged so the
    /// processor does not keep redelivering an event we cannot act on.
    UnknownSession,
}

#[derive(Debug, Deserialize)]
struct PaymentEvent {
    #[serde(rename = "type")]
    event_type: String,
    data: PaymentEventData,
}

#[derive(Debug, Deserialize)]
struct PaymentEventData {
    object: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct CheckoutCompletedObject {
    id: String,
    payment_intent: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PaymentFailedObject {
    id: String,
    last_payment_error: Option<PaymentErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct PaymentErrorDetail {
    code: Option<String>,
    message: Option<String>,
}

#[derive(Serialize)]
pub struct WebhookAck {
    pub received: bool,
}

impl Reconciler {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies a confirmed payment: session completed, succeeded transaction
    /// appended, per-user credit counters incremented per line item. The
    /// whole effect runs in one database transaction, gated on transaction
    /// uniqueness so a redelivered event cannot double-credit.
    pub async fn apply_checkout_completed(
        &self,
        checkout_session_id: &str,
        payment_intent_id: Option<&str>,
    ) -> Result<ReconcileOutcome> {
        let mut tx = self.pool.begin().await?;

        let session = sqlx::query(
            "SELECT id, user_id, total_cents, currency, payment_intent_id \
             FROM cart_sessions WHERE checkout_session_id = $1 FOR UPDATE",
        )
        .bind(checkout_session_id)
        .fetch_optional(&mut tx)
        .await?;

        let Some(session) = session else {
            return Ok(ReconcileOutcome::UnknownSession);
        };
        let session_id: Uuid = session.get("id");
        let user_id: i32 = session.get("user_id");
        let total_cents: i32 = session.get("total_cents");
        let currency: String = session.get("currency");
        let stored_intent: Option<String> = session.get("payment_intent_id");

        let already: Option<i32> = sqlx::query_scalar(
            "SELECT 1 FROM cart_transactions WHERE cart_session_id = $1 AND status = $2 LIMIT 1",
        )
        .bind(session_id)
        .bind(TRANSACTION_SUCCEEDED)
        .fetch_optional(&mut tx)
        .await?;
        if already.is_some() {
            return Ok(ReconcileOutcome::AlreadyProcessed);
        }

        let intent = payment_intent_id
            .map(|s| s.to_string())
            .or(stored_intent);

        sqlx::query(
            "UPDATE cart_sessions SET status = $1, completed_at = NOW(), \
             payment_intent_id = COALESCE($2, payment_intent_id) WHERE id = $3",
        )
        .bind(CART_STATUS_COMPLETED)
        .bind(&intent)
        .bind(session_id)
        .execute(&mut tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO cart_transactions (
                id, cart_session_id, status, amount_cents, currency, payment_intent_id
            ) VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(session_id)
        .bind(TRANSACTION_SUCCEEDED)
        .bind(total_cents)
        .bind(&currency)
        .bind(&intent)
        .execute(&mut tx)
        .await?;

        let items = sqlx::query_as::<_, CartItem>(
            "SELECT * FROM cart_items WHERE cart_session_id = $1",
        )
        .bind(session_id)
        .fetch_all(&mut tx)
        .await?;

        for item in &items {
            let granted = item.credits * item.quantity;
            let column = match item.product_type.as_str() {
                "pr" | "credits" => "remaining_pr",
                "enhanced" => "remaining_pluspr",
                "newsdb" => "newsdb_credits",
                other => {
                    warn!(product_type = other, %session_id, "unknown product type; no credits applied");
                    continue;
                }
            };
            // Column name comes from the fixed match above, never from input.
            let sql = format!(
                "INSERT INTO user_subscriptions (user_id, {column}) VALUES ($1, $2) \
                 ON CONFLICT (user_id) DO UPDATE SET \
                 {column} = user_subscriptions.{column} + EXCLUDED.{column}, updated_at = NOW()"
            );
            sqlx::query(&sql)
                .bind(user_id)
                .bind(granted)
                .execute(&mut tx)
                .await?;
        }

        tx.commit().await?;

        info!(%session_id, %user_id, items = items.len(), "checkout reconciled");
        Ok(ReconcileOutcome::Applied)
    }

    /// Records a failed payment attempt against the session identified by
    /// the processor's payment-intent reference.
    pub async fn apply_payment_failed(
        &self,
        payment_intent_id: &str,
        error_code: Option<&str>,
        error_message: Option<&str>,
    ) -> Result<ReconcileOutcome> {
        let session = sqlx::query(
            "SELECT id, total_cents, currency FROM cart_sessions WHERE payment_intent_id = $1",
        )
        .bind(payment_intent_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(session) = session else {
            return Ok(ReconcileOutcome::UnknownSession);
        };
        let session_id: Uuid = session.get("id");
        let total_cents: i32 = session.get("total_cents");
        let currency: String = session.get("currency");

        sqlx::query(
            r#"
            INSERT INTO cart_transactions (
                id, cart_session_id, status, amount_cents, currency,
                payment_intent_id, error_code, error_message
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(session_id)
        .bind(TRANSACTION_FAILED)
        .bind(total_cents)
        .bind(&currency)
        .bind(payment_intent_id)
        .bind(error_code)
        .bind(error_message)
        .execute(&self.pool)
        .await?;

        info!(%session_id, ?error_code, "payment failure recorded");
        Ok(ReconcileOutcome::Applied)
    }
}

/// POST /api/webhooks/payment. Verifies the processor signature, applies the
/// event, and acknowledges with `{"received": true}`. Invalid or missing
/// signatures are rejected with 400 and nothing is processed.
pub async fn payment_webhook(
    Extension(pool): Extension<PgPool>,
    Extension(gateway): Extension<StripeGateway>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<WebhookAck>> {
    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::BadRequest("missing signature header".into()))?;

    let valid = gateway
        .verify_webhook_signature(&body, signature)
        .map_err(|e| AppError::BadRequest(format!("malformed signature header: {e}")))?;
    if !valid {
        return Err(AppError::BadRequest("invalid signature".into()));
    }

    let event: PaymentEvent = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("malformed event payload: {e}")))?;

    let reconciler = Reconciler::new(pool);
    match event.event_type.as_str() {
        "checkout.session.completed" => {
            let object: CheckoutCompletedObject = serde_json::from_value(event.data.object)
                .map_err(|e| AppError::BadRequest(format!("malformed checkout object: {e}")))?;
            let outcome = reconciler
                .apply_checkout_completed(&object.id, object.payment_intent.as_deref())
                .await
                .map_err(|e| AppError::Message(format!("reconciliation failed: {e}")))?;
            if outcome == ReconcileOutcome::UnknownSession {
                warn!(checkout_session = object.id, "completed event for unknown session");
            }
        }
        "payment_intent.payment_failed" => {
            let object: PaymentFailedObject = serde_json::from_value(event.data.object)
                .map_err(|e| AppError::BadRequest(format!("malformed intent object: {e}")))?;
            let (code, message) = object
                .last_payment_error
                .map(|e| (e.code, e.message))
                .unwrap_or((None, None));
            let outcome = reconciler
                .apply_payment_failed(&object.id, code.as_deref(), message.as_deref())
                .await
                .map_err(|e| AppError::Message(format!("reconciliation failed: {e}")))?;
            if outcome == ReconcileOutcome::UnknownSession {
                // Nothing to record; acknowledge to stop redelivery.
                warn!(payment_intent = object.id, "failure event for unknown session");
            }
        }
        other => {
            info!(event_type = other, "ignoring unhandled payment event");
        }
    }

    Ok(Json(WebhookAck { received: true }))
}
