pub mod cancellation;
pub mod inference;
pub mod knowledge_base;
pub mod llm_service;
pub mod progress;
pub mod question_catalog;
pub mod response_parser;
pub mod result_writer;

pub use cancellation::{CancelToken, CancellationController, RunKind};
pub use inference::{Inference, Retrieval};
pub use knowledge_base::KnowledgeBaseClient;
pub use llm_service::LlmService;
pub use progress::{ChannelReporter, ProgressEvent, ProgressReporter, ScaledReporter, TracingReporter};
pub use question_catalog::{CatalogSource, FileCatalogSource, QuestionCatalog};
pub use result_writer::{ResultWriter, RunState, RunStatus};
