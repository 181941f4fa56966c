use std::env;
use anyhow::{Context, Result};

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    // Server
    pub port: u16,
    pub rust_log: String,
    pub environment: String,

    // Database
    pub database_url: String,

    // Chat platform
    pub bot_token: String,
    pub chat_api_url: String,
    pub webhook_secret: String,

    // Task queue
    pub queue_api_url: String,
    pub queue_name: String,
    pub queue_region: String,
    pub project_id: String,
    pub worker_url: String,
    pub max_retries: u32,

    // Object store
    pub storage_api_url: String,
    pub invoice_bucket: String,
    pub generated_bucket: String,
    pub logo_bucket: String,

    // Spreadsheet service
    pub sheets_api_url: String,
    pub admin_sheet_id: String,
    pub service_account_email: String,

    // Headless renderer (HTML->PDF, PDF->JPEG pages, HEIC->JPEG)
    pub renderer_url: String,

    // LLM providers
    pub primary_llm_api_key: String,
    pub primary_llm_model: String,
    pub fallback_llm_api_key: String,
    pub fallback_llm_model: String,

    // File limits
    pub max_file_size_bytes: usize,
    pub max_pdf_pages: usize,

    // Admin
    pub admin_password: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        let database_url = get_env("DATABASE_URL").unwrap_or_else(|_| {
            format!(
                "postgresql://{}:{}@{}:{}/{}",
                get_env_or_default("POSTGRES_USER", "postgres"),
                get_env_or_default("POSTGRES_PASSWORD", ""),
                get_env_or_default("POSTGRES_HOST", "localhost"),
                get_env_or_default("POSTGRES_PORT", "5432"),
                get_env_or_default("POSTGRES_DB", "scribe")
            )
        });

        let max_file_size_mb: usize = get_env_or_default("MAX_FILE_SIZE_MB", "5")
            .parse()
            .unwrap_or(5);

        Ok(Self {
            // Server
            port: get_env_or_default("PORT", "8080").parse().unwrap_or(8080),
            rust_log: get_env_or_default("RUST_LOG", "info"),
            environment: get_env_or_default("ENVIRONMENT", "development"),

            // Database
            database_url,

            // Chat platform
            bot_token: get_env("BOT_TOKEN").context("BOT_TOKEN is required")?,
            chat_api_url: get_env_or_default("CHAT_API_URL", "https://api.telegram.org"),
            webhook_secret: get_env("WEBHOOK_SECRET").context("WEBHOOK_SECRET is required")?,

            // Task queue
            queue_api_url: get_env_or_default(
                "QUEUE_API_URL",
                "https://cloudtasks.googleapis.com/v2",
            ),
            queue_name: get_env_or_default("QUEUE_NAME", "ingest-tasks"),
            queue_region: get_env_or_default("QUEUE_REGION", "europe-west1"),
            project_id: get_env("PROJECT_ID").context("PROJECT_ID is required")?,
            worker_url: get_env("WORKER_URL").context("WORKER_URL is required")?,
            max_retries: get_env_or_default("MAX_RETRIES", "6").parse().unwrap_or(6),

            // Object store
            storage_api_url: get_env_or_default(
                "STORAGE_API_URL",
                "https://storage.googleapis.com",
            ),
            invoice_bucket: get_env_or_default("INVOICE_BUCKET", "scribe-invoices"),
            generated_bucket: get_env_or_default("GENERATED_BUCKET", "scribe-generated"),
            logo_bucket: get_env_or_default("LOGO_BUCKET", "scribe-logos"),

            // Spreadsheet service
            sheets_api_url: get_env_or_default(
                "SHEETS_API_URL",
                "https://sheets.googleapis.com/v4",
            ),
            admin_sheet_id: get_env_or_default("ADMIN_SHEET_ID", ""),
            service_account_email: get_env_or_default("SERVICE_ACCOUNT_EMAIL", ""),

            // Headless renderer
            renderer_url: get_env("RENDERER_URL").context("RENDERER_URL is required")?,

            // LLM providers
            primary_llm_api_key: get_env_or_default("PRIMARY_LLM_API_KEY", ""),
            primary_llm_model: get_env_or_default(
                "PRIMARY_LLM_MODEL",
                "claude-sonnet-4-20250514",
            ),
            fallback_llm_api_key: get_env("FALLBACK_LLM_API_KEY")
                .context("FALLBACK_LLM_API_KEY is required")?,
            fallback_llm_model: get_env_or_default("FALLBACK_LLM_MODEL", "gpt-4o"),

            // File limits
            max_file_size_bytes: max_file_size_mb * 1024 * 1024,
            max_pdf_pages: get_env_or_default("MAX_PDF_PAGES", "5").parse().unwrap_or(5),

            // Admin
            admin_password: get_env_or_default("ADMIN_PASSWORD", ""),
        })
    }
}

fn get_env(key: &str) -> Result<String> {
    env::var(key).with_context(|| format!("Missing environment variable: {}", key))
}

fn get_env_or_default(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}
