mod errors;
mod manager;
mod store;
mod task;
mod types;
pub mod validator;
mod worker;

pub use errors::{Result, SessionError, UploadFailure, ValidationError};
pub use manager::{TaskEventReceiver, UploadSession};
pub use task::UploadTask;
pub use types::{FileDescriptor, StepPolicy, UploadEvent, UploadId, UploadStatus};
pub use validator::{validate, ValidationPolicy};
