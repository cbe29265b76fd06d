// SSH 连接配置
// 由主机档案生成交给外部 ssh 客户端的参数，本身不建立连接

use std::path::{Path, PathBuf};

use crate::constants::discovery::SSH_COMMAND;
use crate::constants::DEFAULT_SSH_PORT;
use crate::error::{DirectoryError, Result};
use crate::models::HostProfile;

/// SSH 连接配置
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SshConfig {
    /// 目标主机
    pub host: String,
    /// 端口
    pub port: u16,
    /// 用户名
    pub username: String,
    /// 认证方式
    pub auth: AuthMethod,
}

/// 认证方式
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthMethod {
    /// 交给 ssh-agent / 默认密钥
    Agent,
    /// 公钥认证
    PublicKey {
        /// 私钥文件路径
        key_path: PathBuf,
    },
}

impl From<&HostProfile> for SshConfig {
    fn from(host: &HostProfile) -> Self {
        let auth = match host.key_path.as_deref() {
            Some(path) if !path.trim().is_empty() => AuthMethod::PublicKey {
                key_path: PathBuf::from(path),
            },
            _ => AuthMethod::Agent,
        };
        Self {
            host: host.hostname.clone(),
            port: host.port,
            username: host.username.clone(),
            auth,
        }
    }
}

impl SshConfig {
    /// 传给 ssh 的参数（不含命令本身）
    pub fn to_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if self.port != DEFAULT_SSH_PORT {
            args.push("-p".to_string());
            args.push(self.port.to_string());
        }
        if let AuthMethod::PublicKey { key_path } = &self.auth {
            args.push("-i".to_string());
            args.push(key_path.display().to_string());
        }
        args.push(format!("{}@{}", self.username, self.host));
        args
    }

    /// 展示用的完整命令行
    pub fn command_line(&self) -> String {
        let mut parts = vec![SSH_COMMAND.to_string()];
        parts.extend(self.to_args());
        parts.join(" ")
    }
}

/// 检查私钥文件：必须存在且是普通文件，权限过宽时只告警
pub fn check_key_file(path: &Path) -> Result<()> {
    let metadata = std::fs::metadata(path).map_err(|_| {
        DirectoryError::Validation(format!("SSH key file does not exist: {}", path.display()))
    })?;
    if !metadata.is_file() {
        return Err(DirectoryError::Validation(format!(
            "SSH key path is not a regular file: {}",
            path.display()
        )));
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = metadata.permissions().mode() & 0o777;
        if mode & 0o077 != 0 {
            tracing::warn!(
                "[SSH] Key file {} has overly permissive permissions ({:o}), consider chmod 600",
                path.display(),
                mode
            );
        }
    }
    Ok(())
}
