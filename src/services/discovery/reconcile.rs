// 候选对账：新增、补全或跳过
// 已存在的同名主机只做补全，绝不用推断值覆盖更可靠的已有值

use tracing::{debug, info, warn};

use super::resolver::AddressChain;
use crate::constants::discovery::TAG;
use crate::error::{ErrorKind, Result};
use crate::models::{DiscoveryCandidate, HostProfile, NewHost};
use crate::services::host_store::HostStore;

/// 一次对账的统计
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// 新建的主机数（对外只报告这一项）
    pub created: usize,
    pub enriched: usize,
    /// 因校验或名称冲突被跳过的候选
    pub skipped: usize,
}

pub struct Reconciler<'a> {
    addresses: &'a AddressChain<'a>,
    fallback_username: &'a str,
}

impl<'a> Reconciler<'a> {
    pub fn new(addresses: &'a AddressChain<'a>, fallback_username: &'a str) -> Self {
        Self {
            addresses,
            fallback_username,
        }
    }

    /// 逐个处理合并后的候选；存储错误会中止整个批次
    pub fn reconcile(
        &self,
        store: &mut HostStore,
        candidates: Vec<DiscoveryCandidate>,
    ) -> Result<ReconcileReport> {
        let mut report = ReconcileReport::default();

        for candidate in candidates {
            let outcome = match store.get_by_name(&candidate.name) {
                Ok(existing) => self.enrich(store, existing, &candidate).map(|changed| {
                    if changed {
                        report.enriched += 1;
                    }
                }),
                Err(e) if e.is_not_found() => self
                    .create(store, &candidate)
                    .map(|_| report.created += 1),
                Err(e) => Err(e),
            };

            match outcome {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::Storage => return Err(e),
                Err(e) => {
                    warn!(
                        "[Discovery] Skipped candidate '{}' ({}): {}",
                        candidate.name, candidate.hostname, e
                    );
                    report.skipped += 1;
                }
            }
        }

        info!(
            "[Discovery] Reconciled: {} created, {} enriched, {} skipped",
            report.created, report.enriched, report.skipped
        );
        Ok(report)
    }

    fn create(&self, store: &mut HostStore, candidate: &DiscoveryCandidate) -> Result<HostProfile> {
        let mut new = NewHost::new(
            candidate.name.clone(),
            candidate.hostname.clone(),
            candidate.username.clone(),
        )
        .port(candidate.port as i64)
        .description(candidate.provenance())
        .tags(TAG);
        new.ip_address = self.addresses.resolve(&candidate.hostname);

        let host = store.create(new)?;
        debug!(
            "[Discovery] New host '{}' -> {}@{}:{}",
            host.name, host.username, host.hostname, host.port
        );
        Ok(host)
    }

    /// 只在严格改善时修改：占位用户名替换为推断用户名；补上缺失的地址
    fn enrich(
        &self,
        store: &mut HostStore,
        mut existing: HostProfile,
        candidate: &DiscoveryCandidate,
    ) -> Result<bool> {
        let mut changed = false;

        if existing.username == self.fallback_username
            && candidate.username != self.fallback_username
            && !candidate.username.trim().is_empty()
        {
            existing.username = candidate.username.clone();
            changed = true;
        }

        if !existing.has_address() {
            if let Some(ip) = self.addresses.resolve(&existing.hostname) {
                existing.ip_address = Some(ip);
                changed = true;
            }
        }

        if !changed {
            return Ok(false);
        }
        let host = store.update(existing)?;
        debug!("[Discovery] Enriched host '{}'", host.name);
        Ok(true)
    }
}
