//! Business services and external collaborators

pub mod diagnosis;
pub mod inference;
pub mod media;
pub mod object_store;
pub mod report;
pub mod storage;

pub use diagnosis::DiagnosisService;
pub use inference::{HttpInferenceClient, InferenceClient};
pub use object_store::{HttpObjectStore, LocalDirStore, ObjectStore};
pub use report::ReportRenderer;
pub use storage::{PersistOutcome, StorageKind, TieredStorage};
