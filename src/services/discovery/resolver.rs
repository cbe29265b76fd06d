// 地址解析
// 解析链：字面 IP -> known_hosts 同行 IP -> 系统 DNS（带超时，优先 IPv4）

use std::net::IpAddr;
use std::time::Duration;

use tokio::runtime::Runtime;
use tokio::time::timeout;
use tracing::{debug, warn};

use super::known_hosts;

/// 系统名称解析接口，便于在测试中替换
pub trait AddressResolver: Send + Sync {
    /// 解析失败或超时返回空列表
    fn lookup(&self, hostname: &str) -> Vec<IpAddr>;
}

/// 不做任何解析（设置中关闭地址解析时使用）
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopResolver;

impl AddressResolver for NoopResolver {
    fn lookup(&self, _hostname: &str) -> Vec<IpAddr> {
        Vec::new()
    }
}

/// 基于 tokio 的系统 DNS 解析
/// 自带单线程运行时，不能在异步上下文中调用
pub struct SystemResolver {
    runtime: Option<Runtime>,
    timeout: Duration,
}

impl SystemResolver {
    pub fn new(lookup_timeout: Duration) -> std::io::Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .thread_name("hostbook-resolver")
            .build()?;
        Ok(Self {
            runtime: Some(runtime),
            timeout: lookup_timeout,
        })
    }
}

impl AddressResolver for SystemResolver {
    fn lookup(&self, hostname: &str) -> Vec<IpAddr> {
        let Some(runtime) = &self.runtime else {
            return Vec::new();
        };
        let result = runtime.block_on(async {
            timeout(self.timeout, tokio::net::lookup_host((hostname, 0u16))).await
        });
        match result {
            Ok(Ok(addrs)) => addrs.map(|addr| addr.ip()).collect(),
            Ok(Err(e)) => {
                debug!("[Resolver] Failed to resolve {}: {}", hostname, e);
                Vec::new()
            }
            Err(_) => {
                warn!(
                    "[Resolver] Lookup of {} timed out after {}ms",
                    hostname,
                    self.timeout.as_millis()
                );
                Vec::new()
            }
        }
    }
}

impl Drop for SystemResolver {
    fn drop(&mut self) {
        // 超时的解析任务仍在阻塞线程池中，不等待它们结束
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

/// 解析链
pub struct AddressChain<'a> {
    known_hosts: &'a str,
    system: &'a dyn AddressResolver,
}

impl<'a> AddressChain<'a> {
    pub fn new(known_hosts: &'a str, system: &'a dyn AddressResolver) -> Self {
        Self {
            known_hosts,
            system,
        }
    }

    /// 解析 hostname，全部失败时返回 None
    pub fn resolve(&self, hostname: &str) -> Option<String> {
        if hostname.parse::<IpAddr>().is_ok() {
            return Some(hostname.to_string());
        }
        if let Some(ip) = known_hosts::find_colocated_ip(self.known_hosts, hostname) {
            return Some(ip);
        }
        let ips = self.system.lookup(hostname);
        ips.iter()
            .find(|ip| ip.is_ipv4())
            .or_else(|| ips.first())
            .map(IpAddr::to_string)
    }
}
