// 自动发现模块
//
// 模块结构:
// - known_hosts: known_hosts 解析、同行 IP 查找、记录删除
// - ssh_config: ~/.ssh/config 用户名查找与 Host 段候选
// - history: Shell 历史中的 ssh 调用
// - merge: 候选去重
// - resolver: 地址解析链
// - reconcile: 候选与主机目录对账
//
// 数据流: 证据文件 -> 解析 -> 合并 -> 对账 -> HostStore

pub mod history;
pub mod known_hosts;
pub mod merge;
pub mod reconcile;
pub mod resolver;
pub mod ssh_config;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::constants::discovery::FALLBACK_USERNAME;
use crate::constants::evidence;
use crate::error::Result;
use crate::models::{DiscoveryCandidate, DiscoverySettings};
use crate::services::host_store::HostStore;

pub use merge::merge_candidates;
pub use reconcile::{ReconcileReport, Reconciler};
pub use resolver::{AddressChain, AddressResolver, NoopResolver, SystemResolver};

/// 当前登录用户名：USER -> USERNAME -> "user"
pub fn current_username() -> String {
    ["USER", "USERNAME"]
        .iter()
        .filter_map(|key| std::env::var(key).ok())
        .find(|name| !name.trim().is_empty())
        .unwrap_or_else(|| FALLBACK_USERNAME.to_string())
}

// ======================== 证据文件 ========================

/// 证据文件位置
#[derive(Clone, Debug, Default)]
pub struct EvidencePaths {
    pub known_hosts: Option<PathBuf>,
    pub ssh_config: Option<PathBuf>,
    pub history: Vec<PathBuf>,
}

impl EvidencePaths {
    /// 设置中的覆盖优先，其余使用主目录下的默认位置
    pub fn from_settings(settings: &DiscoverySettings) -> Self {
        let home = dirs::home_dir();
        let under_home = |rel: &str| home.as_ref().map(|h| h.join(rel));

        Self {
            known_hosts: settings
                .known_hosts_path
                .clone()
                .or_else(|| under_home(evidence::KNOWN_HOSTS)),
            ssh_config: settings
                .ssh_config_path
                .clone()
                .or_else(|| under_home(evidence::SSH_CONFIG)),
            history: settings.history_files.clone().unwrap_or_else(|| {
                evidence::HISTORY_FILES
                    .iter()
                    .filter_map(|rel| under_home(rel))
                    .collect()
            }),
        }
    }
}

/// 一次扫描读入的证据内容
#[derive(Clone, Debug, Default)]
pub struct Evidence {
    pub known_hosts: String,
    pub ssh_config: String,
    pub history: Vec<String>,
}

impl Evidence {
    /// 读取所有证据文件，缺失或不可读的文件视为空
    pub fn load(paths: &EvidencePaths) -> Self {
        Self {
            known_hosts: paths
                .known_hosts
                .as_deref()
                .and_then(read_optional)
                .unwrap_or_default(),
            ssh_config: paths
                .ssh_config
                .as_deref()
                .and_then(read_optional)
                .unwrap_or_default(),
            history: paths
                .history
                .iter()
                .filter_map(|p| read_optional(p))
                .collect(),
        }
    }
}

fn read_optional(path: &Path) -> Option<String> {
    if !path.exists() {
        debug!("[Discovery] {} not found, skipping", path.display());
        return None;
    }
    // 历史文件可能含非 UTF-8 字节（zsh metafied），按有损方式读取
    match fs::read(path) {
        Ok(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
        Err(e) => {
            warn!("[Discovery] Cannot read {}: {}", path.display(), e);
            None
        }
    }
}

// ======================== 用户名推断 ========================

/// 用户名推断链：ssh_config -> Shell 历史 -> 默认用户名，永不失败
pub struct UsernameResolver<'a> {
    ssh_config: &'a str,
    history: &'a [String],
    fallback: &'a str,
}

impl<'a> UsernameResolver<'a> {
    pub fn new(evidence: &'a Evidence, fallback: &'a str) -> Self {
        Self {
            ssh_config: &evidence.ssh_config,
            history: &evidence.history,
            fallback,
        }
    }

    pub fn resolve(&self, hostname: &str) -> String {
        ssh_config::find_user(self.ssh_config, hostname)
            .or_else(|| {
                self.history
                    .iter()
                    .find_map(|content| history::find_user(content, hostname))
            })
            .unwrap_or_else(|| self.fallback.to_string())
    }
}

// ======================== 发现流程 ========================

/// 扫描哪些证据来源
#[derive(Clone, Copy, Debug)]
pub struct DiscoveryOptions {
    pub known_hosts: bool,
    pub ssh_config: bool,
    pub history: bool,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            known_hosts: true,
            ssh_config: true,
            history: false,
        }
    }
}

/// 解析全部证据并合并候选
pub fn collect_candidates(
    evidence: &Evidence,
    options: DiscoveryOptions,
    fallback_username: &str,
) -> Vec<DiscoveryCandidate> {
    let usernames = UsernameResolver::new(evidence, fallback_username);
    let mut candidates = Vec::new();

    if options.known_hosts {
        candidates.extend(known_hosts::candidates(&evidence.known_hosts, |host| {
            usernames.resolve(host)
        }));
    }
    if options.ssh_config {
        candidates.extend(ssh_config::candidates(&evidence.ssh_config, |host| {
            usernames.resolve(host)
        }));
    }
    if options.history {
        for content in &evidence.history {
            candidates.extend(history::candidates(content));
        }
    }

    let total = candidates.len();
    let merged = merge_candidates(candidates);
    debug!(
        "[Discovery] {} candidates, {} after merge",
        total,
        merged.len()
    );
    merged
}

/// 发现引擎：证据位置 + 解析器 + 默认用户名
pub struct Discovery {
    paths: EvidencePaths,
    options: DiscoveryOptions,
    resolver: Box<dyn AddressResolver>,
    fallback_username: String,
}

impl Discovery {
    pub fn new(
        paths: EvidencePaths,
        options: DiscoveryOptions,
        resolver: Box<dyn AddressResolver>,
        fallback_username: impl Into<String>,
    ) -> Self {
        Self {
            paths,
            options,
            resolver,
            fallback_username: fallback_username.into(),
        }
    }

    /// 按设置构建；系统解析器创建失败时退化为不解析
    pub fn from_settings(settings: &DiscoverySettings) -> Self {
        let resolver: Box<dyn AddressResolver> = if settings.resolve_addresses {
            match SystemResolver::new(Duration::from_millis(settings.resolve_timeout_ms)) {
                Ok(resolver) => Box::new(resolver),
                Err(e) => {
                    warn!("[Resolver] Cannot start resolver runtime: {}", e);
                    Box::new(NoopResolver)
                }
            }
        } else {
            Box::new(NoopResolver)
        };

        let options = DiscoveryOptions {
            known_hosts: settings.scan_known_hosts,
            ssh_config: settings.scan_ssh_config,
            history: settings.scan_history,
        };
        let fallback = settings
            .fallback_username
            .clone()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(current_username);

        Self::new(EvidencePaths::from_settings(settings), options, resolver, fallback)
    }

    pub fn paths(&self) -> &EvidencePaths {
        &self.paths
    }

    pub fn resolver(&self) -> &dyn AddressResolver {
        self.resolver.as_ref()
    }

    /// 读取证据（不需要持有存储锁）
    pub fn load_evidence(&self) -> Evidence {
        Evidence::load(&self.paths)
    }

    /// 对已读入的证据执行合并与对账
    pub fn reconcile(&self, store: &mut HostStore, evidence: &Evidence) -> Result<ReconcileReport> {
        let candidates = collect_candidates(evidence, self.options, &self.fallback_username);
        let addresses = AddressChain::new(&evidence.known_hosts, self.resolver.as_ref());
        let report = Reconciler::new(&addresses, &self.fallback_username)
            .reconcile(store, candidates)?;
        if report.created > 0 {
            info!("[Discovery] Discovered {} new hosts", report.created);
        }
        Ok(report)
    }
}
