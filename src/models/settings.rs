// Settings 配置数据结构

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::constants::discovery::RESOLVE_TIMEOUT_MS;

// ======================== 主配置结构 ========================

/// 应用设置（持久化用）
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub storage: StorageSettings,
    pub discovery: DiscoverySettings,
}

// ======================== 存储设置 ========================

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// 主机数据文件，None 时使用配置目录下的 hosts.json
    pub hosts_file: Option<PathBuf>,
}

// ======================== 自动发现设置 ========================

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoverySettings {
    /// 启动时自动扫描
    pub on_startup: bool,
    pub scan_known_hosts: bool,
    pub scan_ssh_config: bool,
    /// Shell 历史只用于推断用户名，默认不直接产生候选
    pub scan_history: bool,
    pub resolve_addresses: bool,
    pub resolve_timeout_ms: u64,
    // 证据文件路径覆盖，None 表示使用默认位置
    pub known_hosts_path: Option<PathBuf>,
    pub ssh_config_path: Option<PathBuf>,
    pub history_files: Option<Vec<PathBuf>>,
    /// 覆盖从环境变量推断的默认用户名
    pub fallback_username: Option<String>,
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            on_startup: true,
            scan_known_hosts: true,
            scan_ssh_config: true,
            scan_history: false,
            resolve_addresses: true,
            resolve_timeout_ms: RESOLVE_TIMEOUT_MS,
            known_hosts_path: None,
            ssh_config_path: None,
            history_files: None,
            fallback_username: None,
        }
    }
}
