pub mod business_repository;
pub mod counter_repository;
pub mod invoice_repository;
pub mod job_repository;
pub mod session_repository;
pub mod tenant_repository;

pub use business_repository::BusinessRepository;
pub use counter_repository::CounterRepository;
pub use invoice_repository::GeneratedInvoiceRepository;
pub use job_repository::JobRepository;
pub use session_repository::SessionRepository;
pub use tenant_repository::TenantRepository;
