use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// key: billing-models -> catalog,cart,ledger
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub display_name: String,
    pub product_type: String,
    pub credits: i32,
    pub price_cents: i32,
    pub currency: String,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One checkout attempt. Transitions draft -> completed, never deleted.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CartSession {
    pub id: Uuid,
    pub user_id: i32,
    pub status: String,
    pub subtotal_cents: i32,
    pub tax_cents: i32,
    pub total_cents: i32,
    pub currency: String,
    pub checkout_session_id: Option<String>,
    pub payment_intent_id: Option<String>,
    pub attempted_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Line item snapshot captured at purchase time; not live-joined against the
/// catalog, so later product edits leave history intact.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CartItem {
    pub id: Uuid,
    pub cart_session_id: Uuid,
    pub product_id: Uuid,
    pub display_name: String,
    pub product_type: String,
    pub credits: i32,
    pub unit_price_cents: i32,
    pub quantity: i32,
    pub total_price_cents: i32,
}

/// key: billing-transaction-model -> append-only audit of payment outcomes
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CartTransaction {
    pub id: Uuid,
    pub cart_session_id: Uuid,
    pub status: String,
    pub amount_cents: i32,
    pub currency: String,
    pub payment_intent_id: Option<String>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Per-user mutable credit counters (the subscription-style credit system,
/// distinct from the append-only brand ledger).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct UserSubscription {
    pub user_id: i32,
    pub remaining_pr: i32,
    pub remaining_pluspr: i32,
    pub newsdb_credits: i32,
    pub updated_at: DateTime<Utc>,
}

/// key: billing-brand-credit -> immutable ledger row; balance is derived by
/// summing unconsumed rows (pr_id IS NULL), never stored as a counter.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct BrandCredit {
    pub id: Uuid,
    pub user_id: i32,
    pub company_id: Uuid,
    pub credits: i32,
    pub pr_id: Option<Uuid>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

pub const CART_STATUS_DRAFT: &str = "draft";
pub const CART_STATUS_COMPLETED: &str = "completed";

pub const TRANSACTION_SUCCEEDED: &str = "succeeded";
pub const TRANSACTION_FAILED: &str = "failed";
