use anyhow::Result;
use sqlx::PgPool;
use uuid::Uuid;

use super::models::BrandCredit;

/// key: brand-ledger -> append-only company credits, balance by summation
///
/// Positive rows are grants, negative rows are consumption linked to a
/// release via pr_id. The balance is always derived from the unconsumed
/// rows; there is no mutable counter to drift out of sync.
#[derive(Clone)]
pub struct BrandCreditLedger {
    pool: PgPool,
}

impl BrandCreditLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn balance(&self, company_id: Uuid) -> Result<i64> {
        let balance: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(credits), 0) FROM brand_credits \
             WHERE company_id = $1 AND pr_id IS NULL",
        )
        .bind(company_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(balance)
    }

    pub async fn grant(
        &self,
        user_id: i32,
        company_id: Uuid,
        credits: i32,
        note: Option<&str>,
    ) -> Result<BrandCredit> {
        let row = sqlx::query_as::<_, BrandCredit>(
            r#"
            INSERT INTO brand_credits (id, user_id, company_id, credits, note)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(company_id)
        .bind(credits)
        .bind(note)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    /// Consumes credits against a release by appending a negative row linked
    /// to it. Deleting the release later removes this row, which restores
    /// the balance without an explicit refund transaction type.
    pub async fn consume(
        &self,
        user_id: i32,
        company_id: Uuid,
        release_id: Uuid,
        credits: i32,
    ) -> Result<BrandCredit> {
        let row = sqlx::query_as::<_, BrandCredit>(
            r#"
            INSERT INTO brand_credits (id, user_id, company_id, credits, pr_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(company_id)
        .bind(-credits.abs())
        .bind(release_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }
}
