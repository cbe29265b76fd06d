// 主机目录错误类型定义

use thiserror::Error;

use crate::models::HostId;

/// 错误类别（供 UI/CLI 直接匹配，不再依赖错误文本）
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Conflict,
    NotFound,
    Storage,
}

/// 主机目录错误类型
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// 必填字段缺失或取值非法
    #[error("Validation error: {0}")]
    Validation(String),

    /// 名称重复
    #[error("Host name '{0}' already exists")]
    Conflict(String),

    /// 按 ID 查找失败
    #[error("Host with id {0} not found")]
    IdNotFound(HostId),

    /// 按名称查找失败
    #[error("Host with name '{0}' not found")]
    NameNotFound(String),

    /// 持久化失败（操作已中止，未留下部分状态）
    #[error("Storage error: {0}")]
    Storage(String),
}

impl DirectoryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::IdNotFound(_) | Self::NameNotFound(_) => ErrorKind::NotFound,
            Self::Storage(_) => ErrorKind::Storage,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

impl From<std::io::Error> for DirectoryError {
    fn from(e: std::io::Error) -> Self {
        DirectoryError::Storage(e.to_string())
    }
}

impl From<anyhow::Error> for DirectoryError {
    fn from(e: anyhow::Error) -> Self {
        DirectoryError::Storage(format!("{:#}", e))
    }
}

pub type Result<T> = std::result::Result<T, DirectoryError>;
