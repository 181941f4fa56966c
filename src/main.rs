use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod database;
mod error;
mod handlers;
mod middleware;
mod models;
mod repository;
mod services;
mod utils;

use config::Config;
use database::create_pool;
use services::llm::{anthropic, openai, AnthropicExtractor, OpenAiExtractor, VisionExtractor};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration; invalid config is a fatal startup error
    let config = match Config::from_env() {
        Ok(config) => Arc::new(config),
        Err(e) => {
            error!("Failed to load configuration: {:#}", e);
            std::process::exit(1);
        }
    };

    info!("Starting SCRIBE Backend on port {}", config.port);

    // Initialize database pool
    let db_pool = create_pool(&config)
        .await
        .expect("Failed to create database pool");

    // Run migrations
    database::run_migrations(&db_pool)
        .await
        .expect("Failed to run migrations");

    // Initialize repositories
    let tenant_repo = Arc::new(repository::TenantRepository::new(db_pool.clone()));
    let business_repo = Arc::new(repository::BusinessRepository::new(db_pool.clone()));
    let job_repo = Arc::new(repository::JobRepository::new(db_pool.clone()));
    let counter_repo = Arc::new(repository::CounterRepository::new(db_pool.clone()));
    let session_repo = Arc::new(repository::SessionRepository::new(db_pool.clone()));
    let invoice_repo = Arc::new(repository::GeneratedInvoiceRepository::new(db_pool.clone()));

    // Initialize external clients
    let chat_service = Arc::new(services::ChatService::new(config.clone()));
    let storage_service = Arc::new(services::StorageService::new(config.clone()));
    let sheets_service = Arc::new(services::SheetsService::new(config.clone()));
    let queue_service = Arc::new(services::QueueService::new(config.clone()));
    let renderer_service = Arc::new(services::RendererService::new(config.clone()));
    let media_service = Arc::new(services::MediaService::new(
        config.clone(),
        renderer_service.clone(),
    ));

    // LLM providers: primary is optional, fallback is required
    let primary: Option<Box<dyn VisionExtractor>> = if config.primary_llm_api_key.is_empty() {
        info!("No primary LLM key configured; using fallback provider directly");
        None
    } else {
        Some(Box::new(AnthropicExtractor::new(
            &config.primary_llm_api_key,
            &config.primary_llm_model,
            anthropic::DEFAULT_API_URL,
        )))
    };
    let fallback: Box<dyn VisionExtractor> = Box::new(OpenAiExtractor::new(
        &config.fallback_llm_api_key,
        &config.fallback_llm_model,
        openai::DEFAULT_API_URL,
    ));
    let extractor = Arc::new(services::ExtractionRouter::new(primary, fallback));

    // Initialize services
    let pipeline_service = Arc::new(services::PipelineService::new(
        config.clone(),
        job_repo.clone(),
        business_repo.clone(),
        chat_service.clone(),
        storage_service.clone(),
        sheets_service.clone(),
        media_service.clone(),
        extractor.clone(),
    ));
    let callback_service = Arc::new(services::CallbackService::new(
        config.clone(),
        job_repo.clone(),
        business_repo.clone(),
        session_repo.clone(),
        chat_service.clone(),
        storage_service.clone(),
        pipeline_service.clone(),
    ));
    let onboarding_service = Arc::new(services::OnboardingService::new(
        config.clone(),
        tenant_repo.clone(),
        business_repo.clone(),
        session_repo.clone(),
        chat_service.clone(),
        storage_service.clone(),
        sheets_service.clone(),
    ));
    let invoicegen_service = Arc::new(services::InvoiceGenService::new(
        config.clone(),
        business_repo.clone(),
        session_repo.clone(),
        counter_repo.clone(),
        invoice_repo.clone(),
        chat_service.clone(),
        storage_service.clone(),
        renderer_service.clone(),
        pipeline_service.clone(),
    ));
    let ingest_service = Arc::new(services::IngestService::new(
        config.clone(),
        tenant_repo.clone(),
        session_repo.clone(),
        queue_service.clone(),
    ));
    let report_service = Arc::new(services::ReportService::new(
        job_repo.clone(),
        business_repo.clone(),
        chat_service.clone(),
    ));

    // Webhook rate limiter with its sweeper
    let rate_limiter = Arc::new(middleware::RateLimiter::new(
        middleware::RateLimitConfig::default(),
    ));
    middleware::spawn_cleanup_task(rate_limiter.clone());

    // Create application state
    let app_state = web::Data::new(handlers::AppState {
        config: config.clone(),
        db_pool: db_pool.clone(),
        started_at: Instant::now(),
        tenant_repo,
        business_repo,
        job_repo,
        counter_repo,
        session_repo,
        invoice_repo,
        ingest_service,
        pipeline_service,
        callback_service,
        onboarding_service,
        invoicegen_service,
        report_service,
    });

    let server_port = config.port;

    HttpServer::new(move || {
        // /metrics feeds a browser dashboard
        let cors = Cors::default()
            .allow_any_origin()
            .allowed_methods(vec!["GET"])
            .max_age(3600);

        // Custom JSON error handler: schema failures answer with a generic
        // 400 and no echo of the payload
        let json_cfg = web::JsonConfig::default().error_handler(|err, _req| {
            actix_web::error::InternalError::from_response(
                err,
                actix_web::HttpResponse::BadRequest().json(serde_json::json!({
                    "success": false,
                    "error": { "code": "VALIDATION_ERROR", "message": "Invalid payload" }
                })),
            )
            .into()
        });

        App::new()
            .app_data(app_state.clone())
            .app_data(json_cfg)
            .wrap(Logger::default())
            // Health check
            .route("/health", web::get().to(handlers::health_check))
            // Metrics for the dashboard
            .service(
                web::scope("/metrics")
                    .wrap(cors)
                    .route("", web::get().to(handlers::metrics)),
            )
            // Ingest surface
            .service(
                web::scope("/webhook")
                    .wrap(middleware::RateLimitMiddleware::new(rate_limiter.clone()))
                    .route("/{secret}", web::post().to(handlers::webhook::receive)),
            )
            // Worker surface
            .service(
                web::scope("/tasks")
                    .route("/ingest", web::post().to(handlers::tasks::ingest))
                    .route("/callback", web::post().to(handlers::tasks::callback))
                    .route("/onboard", web::post().to(handlers::tasks::onboard))
                    .route(
                        "/onboard-message",
                        web::post().to(handlers::tasks::onboard_message),
                    )
                    .route(
                        "/onboard-photo",
                        web::post().to(handlers::tasks::onboard_photo),
                    )
                    .route(
                        "/invoice-command",
                        web::post().to(handlers::tasks::invoice_command),
                    )
                    .route(
                        "/invoice-message",
                        web::post().to(handlers::tasks::invoice_message),
                    )
                    .route(
                        "/invoice-callback",
                        web::post().to(handlers::tasks::invoice_callback),
                    )
                    .route("/report", web::post().to(handlers::tasks::report))
                    .route("/cancel", web::post().to(handlers::tasks::cancel))
                    .route("/failure", web::post().to(handlers::tasks::failure)),
            )
            // Admin surface (password-gated)
            .service(web::scope("/admin").route(
                "/invite-codes",
                web::post().to(handlers::admin::create_invite_code),
            ))
    })
    .bind(format!("0.0.0.0:{}", server_port))?
    .run()
    .await
}
