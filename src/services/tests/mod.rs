pub mod common;

mod chat_test;
mod counter_test;
mod job_store_test;
mod llm_test;
mod queue_test;
mod sheets_test;
