// 自动发现候选数据模型
// 候选只在内存中流转，经过合并与对账后才可能写入主机目录

use std::fmt;

/// 证据来源
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EvidenceSource {
    KnownHosts,
    SshConfig,
    ShellHistory,
}

impl EvidenceSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::KnownHosts => "known_hosts",
            Self::SshConfig => "ssh_config",
            Self::ShellHistory => "shell_history",
        }
    }
}

impl fmt::Display for EvidenceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 发现候选
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiscoveryCandidate {
    pub name: String,
    pub hostname: String,
    pub username: String,
    pub port: u16,
    pub source: EvidenceSource,
    /// 仅 known_hosts 来源携带（ssh-ed25519, ssh-rsa 等）
    pub key_type: Option<String>,
}

/// 去重用的身份键 (username, hostname, port)
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct IdentityKey {
    pub username: String,
    pub hostname: String,
    pub port: u16,
}

impl DiscoveryCandidate {
    pub fn identity(&self) -> IdentityKey {
        IdentityKey {
            username: self.username.clone(),
            hostname: self.hostname.clone(),
            port: self.port,
        }
    }

    /// 写入新主机时使用的来源描述
    pub fn provenance(&self) -> String {
        match &self.key_type {
            Some(key_type) => format!("Auto-detected from {} ({})", self.source, key_type),
            None => format!("Auto-detected from {}", self.source),
        }
    }
}
