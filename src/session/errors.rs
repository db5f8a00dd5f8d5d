use thiserror::Error;

/// 引擎构建 / 配置阶段的错误
///
/// 上传过程中的失败不会以错误形式返回给调用方，而是记录在任务状态里（见 [`UploadFailure`]）。
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Auth error: {0}")]
    Auth(String),

    #[error("No tokio runtime available: {0}")]
    NoRuntime(#[from] tokio::runtime::TryCurrentError),
}

impl SessionError {
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth(message.into())
    }
}

/// 准入校验失败的原因
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("File too large")]
    TooLarge {
        size: u64,
        limit: u64,
    },

    #[error("Invalid file type")]
    InvalidType {
        mime_type: String,
    },
}

/// 任务失败的两种来源，最终渲染为 `failure_reason` 和一条 error 通知
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UploadFailure {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Upload failed")]
    SimulatedTransfer,
}

/// Error alias
pub type Result<T, E = SessionError> = std::result::Result<T, E>;
