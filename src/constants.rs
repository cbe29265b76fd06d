// 全局常量

/// SSH 默认端口
pub const DEFAULT_SSH_PORT: u16 = 22;

/// 配置目录名（位于系统配置目录下）
pub const APP_DIR_NAME: &str = "hostbook";

pub mod files {
    pub const HOSTS: &str = "hosts.json";
    pub const SETTINGS: &str = "settings.json";
}

pub mod discovery {
    /// 自动发现的主机统一打上的标签
    pub const TAG: &str = "ssh-detected";
    /// 合并候选时优先保留的密钥类型
    pub const PREFERRED_KEY_TYPE: &str = "ssh-ed25519";
    /// 环境变量都取不到时使用的用户名
    pub const FALLBACK_USERNAME: &str = "user";
    /// 系统 DNS 解析的默认超时（毫秒）
    pub const RESOLVE_TIMEOUT_MS: u64 = 2000;
    /// 连接命令
    pub const SSH_COMMAND: &str = "ssh";
}

/// 默认扫描的证据文件（相对用户主目录）
pub mod evidence {
    pub const KNOWN_HOSTS: &str = ".ssh/known_hosts";
    pub const SSH_CONFIG: &str = ".ssh/config";
    pub const HISTORY_FILES: &[&str] = &[
        ".zsh_history",
        ".bash_history",
        ".history",
        ".local/share/fish/fish_history",
    ];
}
