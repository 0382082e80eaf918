pub mod config;
pub mod error;
pub mod repository;

pub use config::{FlowConfig, NoemaConfig, StorageConfig, default_base_dir, resolve_base_dir};
pub use error::{Result, StoreError};
pub use repository::{PersistedDocument, StateRepository, DOCUMENT_VERSION};
