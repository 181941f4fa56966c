use sqlx::PgPool;

use crate::error::AppResult;
use crate::models::{BusinessConfig, Language};

#[derive(Clone)]
pub struct BusinessRepository {
    pool: PgPool,
}

/// Everything the onboarding completion writes in one shot.
pub struct NewBusinessConfig<'a> {
    pub tenant_id: i64,
    pub language: Language,
    pub business_name: &'a str,
    pub tax_id: &'a str,
    pub tax_status: &'a str,
    pub email: &'a str,
    pub phone: &'a str,
    pub address: &'a str,
    pub logo_url: Option<&'a str>,
    pub sheet_id: &'a str,
    pub digital_signature_text: &'a str,
    pub generated_by_text: &'a str,
}

impl BusinessRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_tenant(&self, tenant_id: i64) -> AppResult<Option<BusinessConfig>> {
        let config = sqlx::query_as::<_, BusinessConfig>(
            "SELECT * FROM business_configs WHERE tenant_id = $1",
        )
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(config)
    }

    /// Onboarding completion: the business config, the user-tenant mapping
    /// entry and (conditionally) the initial counter land in one
    /// transaction, so a crash mid-completion leaves no partial setup.
    pub async fn complete_onboarding(
        &self,
        config: NewBusinessConfig<'_>,
        user_id: i64,
        chat_title: &str,
        counter_seed: Option<i64>,
        year: i32,
    ) -> AppResult<BusinessConfig> {
        let mut tx = self.pool.begin().await?;

        let saved = sqlx::query_as::<_, BusinessConfig>(
            r#"
            INSERT INTO business_configs (
                tenant_id, language, business_name, tax_id, tax_status,
                email, phone, address, logo_url, sheet_id,
                digital_signature_text, generated_by_text
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (tenant_id) DO UPDATE
            SET language = EXCLUDED.language,
                business_name = EXCLUDED.business_name,
                tax_id = EXCLUDED.tax_id,
                tax_status = EXCLUDED.tax_status,
                email = EXCLUDED.email,
                phone = EXCLUDED.phone,
                address = EXCLUDED.address,
                logo_url = EXCLUDED.logo_url,
                sheet_id = EXCLUDED.sheet_id,
                digital_signature_text = EXCLUDED.digital_signature_text,
                generated_by_text = EXCLUDED.generated_by_text,
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(config.tenant_id)
        .bind(config.language)
        .bind(config.business_name)
        .bind(config.tax_id)
        .bind(config.tax_status)
        .bind(config.email)
        .bind(config.phone)
        .bind(config.address)
        .bind(config.logo_url)
        .bind(config.sheet_id)
        .bind(config.digital_signature_text)
        .bind(config.generated_by_text)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO user_tenants (user_id, tenant_id, title, added_by)
            VALUES ($1, $2, $3, 'onboarding')
            ON CONFLICT (user_id, tenant_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(config.tenant_id)
        .bind(chat_title)
        .execute(&mut *tx)
        .await?;

        if let Some(seed) = counter_seed {
            sqlx::query(
                r#"
                INSERT INTO invoice_counters (id, tenant_id, year, counter)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (id) DO NOTHING
                "#,
            )
            .bind(crate::models::InvoiceCounter::composite_id(config.tenant_id, year))
            .bind(config.tenant_id)
            .bind(year)
            .bind(seed)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(saved)
    }
}
