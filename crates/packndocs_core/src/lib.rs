pub mod aggregation;
pub mod attachment;
pub mod catalog;
pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod kv;
pub mod models;
pub mod preferences;
pub mod progress;
pub mod runtime;
pub mod services;

pub use aggregation::UploadedDocumentsView;
pub use attachment::{AttachmentPolicy, AttachmentService};
pub use config::{Platform, RuntimeConfig, StorageBackend};
pub use error::{AttachmentError, StoreError};
pub use preferences::PreferenceStore;
pub use progress::ProgressRepository;
pub use runtime::{InvokeError, InvokeRequest, InvokeResponse, Runtime};
pub use services::{AppServices, SetupStage};
