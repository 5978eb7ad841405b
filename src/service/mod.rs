pub mod catalog;
pub mod matcher;
pub mod pipeline;
pub mod report;
pub mod validator;

pub use catalog::ReferenceCatalog;
pub use matcher::ProcedureMatcher;
pub use pipeline::PipelineService;
pub use report::ReportBuilder;
pub use validator::StructuralValidator;
