pub mod auth;
pub mod config;
pub mod notify;
pub mod session;
pub mod utils;

// 重新导出核心类型
pub use auth::{login, AuthSession};
pub use config::{load_config, SessionConfig};
pub use notify::{Notification, NotificationBus, NotificationId, NotificationKind};
pub use session::{
    FileDescriptor,
    Result,
    SessionError,
    StepPolicy,
    UploadEvent,
    UploadFailure,
    UploadId,
    UploadSession,
    UploadStatus,
    UploadTask,
    ValidationError,
    ValidationPolicy,
};
