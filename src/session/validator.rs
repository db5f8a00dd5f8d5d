//! Intake admission rules.

use serde::{Deserialize, Serialize};
use super::errors::ValidationError;
use super::types::FileDescriptor;

pub const DEFAULT_MAX_FILE_SIZE: u64 = 5 * 1024 * 1024; // 5MB

pub fn default_allowed_types() -> Vec<String> {
    ["image/png", "image/jpeg", "application/pdf"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// 准入策略
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ValidationPolicy {
    pub max_file_size: u64,
    /// 为空表示接受任意类型
    pub allowed_types: Vec<String>,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            allowed_types: default_allowed_types(),
        }
    }
}

/// Classify a file as admissible or not. Size is checked before type.
pub fn validate(file: &FileDescriptor, policy: &ValidationPolicy) -> Result<(), ValidationError> {
    if file.size > policy.max_file_size {
        return Err(ValidationError::TooLarge {
            size: file.size,
            limit: policy.max_file_size,
        });
    }

    let type_allowed = policy.allowed_types.is_empty()
        || policy
            .allowed_types
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(&file.mime_type));

    if !type_allowed {
        return Err(ValidationError::InvalidType {
            mime_type: file.mime_type.clone(),
        });
    }

    Ok(())
}
