use anyhow::Result;
use sqlx::PgPool;
use uuid::Uuid;

use super::models::{Product, CART_STATUS_DRAFT};
use super::stripe::{CheckoutLineItem, StripeGateway};

/// key: checkout-service -> cart session + item snapshot + hosted checkout
#[derive(Clone)]
pub struct CheckoutService {
    pool: PgPool,
}

#[derive(Debug, Clone)]
pub struct CheckoutStarted {
    pub cart_session_id: Uuid,
    pub url: String,
}

impl CheckoutService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates a draft cart session with a single line-item snapshot of the
    /// product, asks the processor for a hosted checkout page, and persists
    /// the processor identifiers back onto the session.
    ///
    /// Returns Ok(None) when the product id does not resolve. No idempotency
    /// key is used: repeated calls create duplicate draft sessions, and a
    /// processor failure leaves the committed draft rows in place.
    pub async fn initiate(
        &self,
        gateway: &StripeGateway,
        user_id: i32,
        product_id: Uuid,
    ) -> Result<Option<CheckoutStarted>> {
        let product = sqlx::query_as::<_, Product>(
            "SELECT * FROM products WHERE id = $1 AND is_deleted = FALSE",
        )
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(product) = product else {
            return Ok(None);
        };

        let quantity = 1i32;
        let subtotal = product.price_cents * quantity;
        let tax = 0i32;
        let total = subtotal + tax;

        // Session and snapshot land together or not at all.
        let mut tx = self.pool.begin().await?;

        let cart_session_id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO cart_sessions (
                id, user_id, status, subtotal_cents, tax_cents, total_cents, currency
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(cart_session_id)
        .bind(user_id)
        .bind(CART_STATUS_DRAFT)
        .bind(subtotal)
        .bind(tax)
        .bind(total)
        .bind(&product.currency)
        .execute(&mut tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO cart_items (
                id, cart_session_id, product_id, display_name, product_type,
                credits, unit_price_cents, quantity, total_price_cents
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(cart_session_id)
        .bind(product.id)
        .bind(&product.display_name)
        .bind(&product.product_type)
        .bind(product.credits)
        .bind(product.price_cents)
        .bind(quantity)
        .bind(product.price_cents * quantity)
        .execute(&mut tx)
        .await?;

        tx.commit().await?;

        let item = CheckoutLineItem {
            name: product.display_name.clone(),
            unit_amount_cents: product.price_cents,
            quantity,
            currency: product.currency.clone(),
        };
        let hosted = gateway
            .create_checkout_session(&cart_session_id.to_string(), &item)
            .await?;

        sqlx::query(
            "UPDATE cart_sessions SET checkout_session_id = $1, payment_intent_id = $2 WHERE id = $3",
        )
        .bind(&hosted.id)
        .bind(&hosted.payment_intent)
        .bind(cart_session_id)
        .execute(&self.pool)
        .await?;

        Ok(Some(CheckoutStarted {
            cart_session_id,
            url: hosted.url,
        }))
    }
}
