use sqlx::PgPool;

use crate::error::AppResult;
use crate::models::InvoiceCounter;

#[derive(Clone)]
pub struct CounterRepository {
    pool: PgPool,
}

impl CounterRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Allocate the next invoice number for a tenant-year. The row lock
    /// serializes concurrent callers, so every caller gets a distinct,
    /// monotone number. Numbers abandoned by failed generations leave gaps;
    /// the sequence is monotone, not dense.
    pub async fn next(&self, tenant_id: i64, year: i32) -> AppResult<String> {
        let id = InvoiceCounter::composite_id(tenant_id, year);
        let mut tx = self.pool.begin().await?;

        let existing: Option<(i64,)> =
            sqlx::query_as("SELECT counter FROM invoice_counters WHERE id = $1 FOR UPDATE")
                .bind(&id)
                .fetch_optional(&mut *tx)
                .await?;

        let counter = match existing {
            Some((current,)) => {
                let next = current + 1;
                sqlx::query(
                    "UPDATE invoice_counters SET counter = $2, last_updated = NOW() WHERE id = $1",
                )
                .bind(&id)
                .bind(next)
                .execute(&mut *tx)
                .await?;
                next
            }
            None => {
                sqlx::query(
                    r#"
                    INSERT INTO invoice_counters (id, tenant_id, year, counter)
                    VALUES ($1, $2, $3, 1)
                    "#,
                )
                .bind(&id)
                .bind(tenant_id)
                .bind(year)
                .execute(&mut *tx)
                .await?;
                1
            }
        };

        tx.commit().await?;
        Ok(InvoiceCounter::format_number(year, counter))
    }

    /// Seed the counter during onboarding. Safe against racing `next`
    /// calls: if the year row already exists the seed is a no-op.
    pub async fn initialize(&self, tenant_id: i64, year: i32, seed: i64) -> AppResult<()> {
        let id = InvoiceCounter::composite_id(tenant_id, year);
        sqlx::query(
            r#"
            INSERT INTO invoice_counters (id, tenant_id, year, counter)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(&id)
        .bind(tenant_id)
        .bind(year)
        .bind(seed)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
