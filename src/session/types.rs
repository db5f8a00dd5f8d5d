use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 上传任务唯一标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct UploadId(Uuid);

impl UploadId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for UploadId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for UploadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    /// 上传中
    Uploading,
    /// 已完成
    Completed,
    /// 失败（可重试）
    Error,
}

impl UploadStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, UploadStatus::Uploading)
    }
}

/// 待提交文件的描述，不包含文件内容
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct FileDescriptor {
    pub name: String,
    pub size: u64,
    pub mime_type: String,
}

impl FileDescriptor {
    pub fn new(name: impl Into<String>, size: u64, mime_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size,
            mime_type: mime_type.into(),
        }
    }
}

/// 进度步进策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StepPolicy {
    /// 每次 tick 固定增加 `step`
    Fixed { step: u8 },
    /// 每次 tick 增加 `1..=max_step` 之间的随机值
    Randomized { max_step: u8 },
}

impl Default for StepPolicy {
    fn default() -> Self {
        StepPolicy::Fixed { step: 10 }
    }
}

#[derive(Debug, Clone)]
pub enum UploadEvent {
    /// 任务已加入会话
    Submitted {
        upload_id: UploadId,
        status: UploadStatus,
    },

    /// 任务状态变更
    StateChanged {
        upload_id: UploadId,
        old_status: UploadStatus,
        new_status: UploadStatus,
    },

    /// 进度更新
    Progress {
        upload_id: UploadId,
        progress: u8,
    },

    /// 任务已删除
    Removed {
        upload_id: UploadId,
    },
}

impl UploadEvent {
    pub fn upload_id(&self) -> UploadId {
        match self {
            UploadEvent::Submitted { upload_id, .. }
            | UploadEvent::StateChanged { upload_id, .. }
            | UploadEvent::Progress { upload_id, .. }
            | UploadEvent::Removed { upload_id } => *upload_id,
        }
    }
}

// 静态断言确保类型是 Send 的
#[allow(dead_code)]
const _: () = {
    fn assert_send<T: Send>() {}
    fn assert_types() {
        assert_send::<UploadEvent>();
        assert_send::<FileDescriptor>();
    }
};
