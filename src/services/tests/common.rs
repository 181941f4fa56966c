use sqlx::PgPool;

use crate::config::Config;

/// A config pointing every collaborator at localhost. Tests override the
/// base URLs they exercise with a wiremock server's address.
pub fn test_config() -> Config {
    Config {
        port: 8080,
        rust_log: "info".to_string(),
        environment: "test".to_string(),
        database_url: std::env::var("DATABASE_URL").unwrap_or_default(),
        bot_token: "test-token".to_string(),
        chat_api_url: "http://127.0.0.1:1".to_string(),
        webhook_secret: "s123456789abcdef0".to_string(),
        queue_api_url: "http://127.0.0.1:1".to_string(),
        queue_name: "ingest-tasks".to_string(),
        queue_region: "europe-west1".to_string(),
        project_id: "scribe-test".to_string(),
        worker_url: "http://worker.test".to_string(),
        max_retries: 6,
        storage_api_url: "http://127.0.0.1:1".to_string(),
        invoice_bucket: "scribe-invoices".to_string(),
        generated_bucket: "scribe-generated".to_string(),
        logo_bucket: "scribe-logos".to_string(),
        sheets_api_url: "http://127.0.0.1:1".to_string(),
        admin_sheet_id: "admin-sheet".to_string(),
        service_account_email: "svc@scribe.test".to_string(),
        renderer_url: "http://127.0.0.1:1".to_string(),
        primary_llm_api_key: "primary-key".to_string(),
        primary_llm_model: "test-model".to_string(),
        fallback_llm_api_key: "fallback-key".to_string(),
        fallback_llm_model: "test-model".to_string(),
        max_file_size_bytes: 5 * 1024 * 1024,
        max_pdf_pages: 5,
        admin_password: String::new(),
    }
}

/// Pool for the DB-bound integration tests; they are ignored unless a live
/// Postgres is reachable through DATABASE_URL.
pub async fn test_pool() -> PgPool {
    let config = test_config();
    let pool = PgPool::connect(&config.database_url)
        .await
        .expect("Failed to connect to DB");
    crate::database::run_migrations(&pool)
        .await
        .expect("Failed to run migrations");
    pool
}
