// 主机目录服务
// UI / CLI 通过它访问主机档案和自动发现，所有修改操作共用一把锁串行执行

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use tracing::{info, warn};

use crate::error::{DirectoryError, Result};
use crate::models::{AppSettings, HostId, HostProfile, NewHost};
use crate::services::discovery::{known_hosts, AddressChain, Discovery};
use crate::services::host_store::HostStore;
use crate::services::storage;
use crate::ssh;

pub struct HostDirectory {
    store: Mutex<HostStore>,
    discovery: Discovery,
}

impl HostDirectory {
    pub fn new(store: HostStore, discovery: Discovery) -> Self {
        Self {
            store: Mutex::new(store),
            discovery,
        }
    }

    /// 按设置打开主机数据文件并构建发现引擎
    pub fn open(settings: &AppSettings) -> Result<Self> {
        let path = storage::get_hosts_file(settings)?;
        let store = HostStore::open(path)?;
        Ok(Self::new(store, Discovery::from_settings(&settings.discovery)))
    }

    fn store(&self) -> MutexGuard<'_, HostStore> {
        // 持锁期间的失败不会留下部分状态，忽略中毒标记
        self.store.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn list_hosts(&self) -> Vec<HostProfile> {
        self.store().get_all()
    }

    /// 数字先按 ID 查找，找不到再按名称
    pub fn get_host(&self, id_or_name: &str) -> Result<HostProfile> {
        let store = self.store();
        let key = id_or_name.trim();
        match key.parse::<HostId>() {
            Ok(id) => store.get_by_id(id).or_else(|e| {
                if e.is_not_found() {
                    store.get_by_name(key)
                } else {
                    Err(e)
                }
            }),
            Err(_) => store.get_by_name(key),
        }
    }

    pub fn add_host(&self, mut new: NewHost) -> Result<HostProfile> {
        if let Some(key_path) = new.key_path.as_deref().filter(|p| !p.trim().is_empty()) {
            ssh::check_key_file(Path::new(key_path))?;
        }

        // 地址解析可能耗时到超时，不能持锁进行
        if new.ip_address.as_deref().map_or(true, |ip| ip.trim().is_empty()) {
            let known_hosts = self.known_hosts_content();
            let chain = AddressChain::new(&known_hosts, self.discovery.resolver());
            new.ip_address = chain.resolve(&new.hostname);
        }
        self.store().create(new)
    }

    pub fn edit_host(&self, profile: HostProfile) -> Result<()> {
        if let Some(key_path) = profile.key_path.as_deref().filter(|p| !p.trim().is_empty()) {
            ssh::check_key_file(Path::new(key_path))?;
        }
        self.store().update(profile)?;
        Ok(())
    }

    pub fn remove_host(&self, id: HostId) -> Result<()> {
        self.store().delete(id)
    }

    /// 删除主机，同时清理 known_hosts 中对应的记录
    pub fn remove_host_and_known_hosts(&self, id: HostId) -> Result<()> {
        let host = {
            let mut store = self.store();
            let host = store.get_by_id(id)?;
            store.delete(id)?;
            host
        };

        let Some(path) = self.discovery.paths().known_hosts.as_deref() else {
            return Ok(());
        };
        known_hosts::remove_from_file(path, &host.hostname, host.port).map_err(|e| {
            warn!(
                "[Directory] Host '{}' removed but known_hosts cleanup failed: {:#}",
                host.name, e
            );
            DirectoryError::from(e)
        })?;
        Ok(())
    }

    pub fn search_hosts(&self, query: &str) -> Vec<HostProfile> {
        self.store().search(query)
    }

    pub fn record_connection_use(&self, id: HostId) -> Result<()> {
        self.store().increment_use(id)
    }

    /// 执行一次自动发现，返回新建的主机数
    pub fn run_discovery(&self) -> Result<usize> {
        let evidence = self.discovery.load_evidence();
        let mut store = self.store();
        let report = self.discovery.reconcile(&mut store, &evidence)?;
        info!(
            "[Directory] Discovery finished, {} hosts in directory",
            store.len()
        );
        Ok(report.created)
    }

    fn known_hosts_content(&self) -> String {
        self.discovery
            .paths()
            .known_hosts
            .as_deref()
            .and_then(|path| std::fs::read_to_string(path).ok())
            .unwrap_or_default()
    }
}
