use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use super::errors::UploadFailure;
use super::types::{FileDescriptor, UploadId, UploadStatus};

/// 单个文件的上传任务快照
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct UploadTask {
    pub id: UploadId,
    pub name: String,
    /// 声明的文件大小（字节）
    pub size: u64,
    /// 声明的 MIME 类型
    pub mime_type: String,
    /// 0..=100
    pub progress: u8,
    pub status: UploadStatus,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    /// 已启动的模拟传输次数
    pub attempts: u32,
}

impl UploadTask {
    pub(crate) fn accepted(file: FileDescriptor) -> Self {
        Self::from_descriptor(file, UploadStatus::Uploading, None)
    }

    pub(crate) fn rejected(file: FileDescriptor, failure: &UploadFailure) -> Self {
        Self::from_descriptor(file, UploadStatus::Error, Some(failure.to_string()))
    }

    fn from_descriptor(file: FileDescriptor, status: UploadStatus, failure_reason: Option<String>) -> Self {
        Self {
            id: UploadId::new(),
            name: file.name,
            size: file.size,
            mime_type: file.mime_type,
            progress: 0,
            status,
            failure_reason,
            created_at: Utc::now(),
            completed_at: None,
            attempts: 0,
        }
    }

    /// Advance progress by `step`, clamped to 100. Returns true once 100 is reached.
    pub(crate) fn advance(&mut self, step: u8) -> bool {
        debug_assert_eq!(self.status, UploadStatus::Uploading);
        self.progress = self.progress.saturating_add(step).min(100);
        self.progress == 100
    }

    pub(crate) fn complete(&mut self) {
        self.progress = 100;
        self.status = UploadStatus::Completed;
        self.failure_reason = None;
        if self.completed_at.is_none() {
            self.completed_at = Some(Utc::now());
        }
    }

    pub(crate) fn fail(&mut self, failure: &UploadFailure) {
        self.status = UploadStatus::Error;
        self.failure_reason = Some(failure.to_string());
    }

    /// error -> uploading，其他状态返回 false 且不做任何修改
    pub(crate) fn restart(&mut self) -> bool {
        if self.status != UploadStatus::Error {
            return false;
        }

        self.status = UploadStatus::Uploading;
        self.progress = 0;
        self.failure_reason = None;
        true
    }
}
