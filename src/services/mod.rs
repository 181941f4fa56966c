pub mod callback_service;
pub mod chat_service;
pub mod ingest_service;
pub mod invoicegen_service;
pub mod llm;
pub mod media_service;
pub mod onboarding_service;
pub mod pipeline_service;
pub mod queue_service;
pub mod renderer_service;
pub mod report_service;
pub mod sheets_service;
pub mod storage_service;

pub use callback_service::CallbackService;
pub use chat_service::ChatService;
pub use ingest_service::IngestService;
pub use invoicegen_service::InvoiceGenService;
pub use llm::ExtractionRouter;
pub use media_service::MediaService;
pub use onboarding_service::OnboardingService;
pub use pipeline_service::{PipelineResult, PipelineService};
pub use queue_service::QueueService;
pub use renderer_service::RendererService;
pub use report_service::ReportService;
pub use sheets_service::SheetsService;
pub use storage_service::StorageService;

#[cfg(test)]
pub mod tests;
