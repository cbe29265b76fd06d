// 主机档案存储
//
// 整张表保存在一个 JSON 文件中。所有修改先作用在表的副本上，
// 原子写盘成功后才替换内存中的表，因此删除 + ID 压缩要么全部生效，要么完全不生效。

use std::cmp::Ordering;
use std::path::PathBuf;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{DirectoryError, Result};
use crate::models::{normalize_port, HostId, HostProfile, NewHost};
use crate::services::storage;

/// 持久化的表结构
#[derive(Clone, Debug, Serialize, Deserialize)]
struct HostTable {
    next_id: HostId,
    /// 按 id 升序
    hosts: Vec<HostProfile>,
}

impl Default for HostTable {
    fn default() -> Self {
        Self {
            next_id: 1,
            hosts: Vec::new(),
        }
    }
}

impl HostTable {
    fn position_by_id(&self, id: HostId) -> Option<usize> {
        self.hosts.iter().position(|h| h.id == id)
    }

    fn name_taken(&self, name: &str, except: Option<HostId>) -> bool {
        self.hosts
            .iter()
            .any(|h| h.name == name && Some(h.id) != except)
    }

    /// 按现有顺序重新编号为 1..=n，并重置计数器
    fn compact_ids(&mut self) {
        for (index, host) in self.hosts.iter_mut().enumerate() {
            host.id = index as HostId + 1;
        }
        self.next_id = self.hosts.len() as HostId + 1;
    }

    fn is_dense(&self) -> bool {
        self.next_id == self.hosts.len() as HostId + 1
            && self
                .hosts
                .iter()
                .enumerate()
                .all(|(index, h)| h.id == index as HostId + 1)
    }
}

/// 主机档案存储
pub struct HostStore {
    /// None 表示纯内存存储
    path: Option<PathBuf>,
    table: HostTable,
}

impl HostStore {
    /// 打开（或新建）文件存储
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let mut table: HostTable = storage::load_json(&path)?;
        table.hosts.sort_by_key(|h| h.id);

        let mut store = Self {
            path: Some(path),
            table: table.clone(),
        };
        if !table.is_dense() {
            warn!(
                "[Store] Host ids in {} are not contiguous, renumbering",
                store.path_display()
            );
            table.compact_ids();
            store.commit(table)?;
        }
        debug!(
            "[Store] Opened {} with {} hosts",
            store.path_display(),
            store.table.hosts.len()
        );
        Ok(store)
    }

    /// 不落盘的内存存储
    pub fn in_memory() -> Self {
        Self {
            path: None,
            table: HostTable::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.table.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.hosts.is_empty()
    }

    /// 新建主机
    pub fn create(&mut self, new: NewHost) -> Result<HostProfile> {
        validate_required(&new.name, &new.hostname, &new.username)?;

        self.transaction(|table| {
            if table.name_taken(&new.name, None) {
                return Err(DirectoryError::Conflict(new.name.clone()));
            }

            let now = Utc::now();
            let host = HostProfile {
                id: table.next_id,
                name: new.name,
                hostname: new.hostname,
                ip_address: non_empty(new.ip_address),
                port: normalize_port(new.port),
                username: new.username,
                key_path: non_empty(new.key_path),
                description: non_empty(new.description),
                tags: non_empty(new.tags),
                last_used: None,
                use_count: 0,
                created_at: now,
                updated_at: now,
            };
            table.next_id += 1;
            table.hosts.push(host.clone());
            Ok(host)
        })
        .inspect(|host| info!("[Store] Created host {} '{}'", host.id, host.name))
    }

    /// 所有主机，最近使用的在前，其余按名称排序
    pub fn get_all(&self) -> Vec<HostProfile> {
        let mut hosts = self.table.hosts.clone();
        sort_for_display(&mut hosts);
        hosts
    }

    pub fn get_by_id(&self, id: HostId) -> Result<HostProfile> {
        self.table
            .hosts
            .iter()
            .find(|h| h.id == id)
            .cloned()
            .ok_or(DirectoryError::IdNotFound(id))
    }

    pub fn get_by_name(&self, name: &str) -> Result<HostProfile> {
        self.table
            .hosts
            .iter()
            .find(|h| h.name == name)
            .cloned()
            .ok_or_else(|| DirectoryError::NameNotFound(name.to_string()))
    }

    /// 更新主机，保留创建时间与使用统计
    pub fn update(&mut self, profile: HostProfile) -> Result<HostProfile> {
        validate_required(&profile.name, &profile.hostname, &profile.username)?;

        self.transaction(|table| {
            let pos = table
                .position_by_id(profile.id)
                .ok_or(DirectoryError::IdNotFound(profile.id))?;
            if table.name_taken(&profile.name, Some(profile.id)) {
                return Err(DirectoryError::Conflict(profile.name.clone()));
            }

            let stored = &mut table.hosts[pos];
            let updated = HostProfile {
                id: stored.id,
                name: profile.name,
                hostname: profile.hostname,
                ip_address: non_empty(profile.ip_address),
                port: normalize_port(profile.port as i64),
                username: profile.username,
                key_path: non_empty(profile.key_path),
                description: non_empty(profile.description),
                tags: non_empty(profile.tags),
                last_used: stored.last_used,
                use_count: stored.use_count,
                created_at: stored.created_at,
                updated_at: Utc::now(),
            };
            *stored = updated.clone();
            Ok(updated)
        })
        .inspect(|host| debug!("[Store] Updated host {} '{}'", host.id, host.name))
    }

    /// 删除主机并压缩 ID：被删行之后的主机依次前移，计数器重置为 count + 1
    pub fn delete(&mut self, id: HostId) -> Result<()> {
        let removed = self.transaction(|table| {
            let pos = table
                .position_by_id(id)
                .ok_or(DirectoryError::IdNotFound(id))?;
            let removed = table.hosts.remove(pos);
            table.compact_ids();
            Ok(removed)
        })?;
        info!(
            "[Store] Deleted host {} '{}', {} hosts remain",
            id,
            removed.name,
            self.table.hosts.len()
        );
        Ok(())
    }

    /// 不区分大小写的子串搜索，空白查询等同 get_all；其余查询按原样匹配（不去空白）
    pub fn search(&self, query: &str) -> Vec<HostProfile> {
        if query.trim().is_empty() {
            return self.get_all();
        }
        let query = query.to_lowercase();
        let mut hosts: Vec<HostProfile> = self
            .table
            .hosts
            .iter()
            .filter(|h| h.matches(&query))
            .cloned()
            .collect();
        sort_for_display(&mut hosts);
        hosts
    }

    /// 记录一次成功连接
    pub fn increment_use(&mut self, id: HostId) -> Result<()> {
        self.transaction(|table| {
            let pos = table
                .position_by_id(id)
                .ok_or(DirectoryError::IdNotFound(id))?;
            let host = &mut table.hosts[pos];
            host.use_count += 1;
            host.last_used = Some(Utc::now());
            Ok(())
        })
    }

    /// 在表副本上执行修改，写盘成功后再提交到内存
    fn transaction<T>(&mut self, f: impl FnOnce(&mut HostTable) -> Result<T>) -> Result<T> {
        let mut draft = self.table.clone();
        let value = f(&mut draft)?;
        self.commit(draft)?;
        Ok(value)
    }

    fn commit(&mut self, table: HostTable) -> Result<()> {
        if let Some(path) = &self.path {
            storage::write_json_atomic(path, &table)?;
        }
        self.table = table;
        Ok(())
    }

    fn path_display(&self) -> String {
        self.path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<memory>".to_string())
    }
}

fn validate_required(name: &str, hostname: &str, username: &str) -> Result<()> {
    if name.trim().is_empty() || hostname.trim().is_empty() || username.trim().is_empty() {
        return Err(DirectoryError::Validation(
            "name, hostname and username are required".to_string(),
        ));
    }
    Ok(())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// 展示顺序：有 last_used 的按时间倒序在前，从未使用的在后，同级按名称
pub fn sort_for_display(hosts: &mut [HostProfile]) {
    hosts.sort_by(|a, b| {
        let by_use = match (a.last_used, b.last_used) {
            (Some(x), Some(y)) => y.cmp(&x),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        by_use.then_with(|| a.name.cmp(&b.name))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use proptest::prelude::*;

    fn store_with(names: &[&str]) -> HostStore {
        let mut store = HostStore::in_memory();
        for name in names {
            store
                .create(NewHost::new(*name, format!("{}.example.com", name), "alice"))
                .unwrap();
        }
        store
    }

    fn ids_by_name(store: &HostStore) -> Vec<(HostId, String)> {
        let mut hosts: Vec<(HostId, String)> = store
            .get_all()
            .into_iter()
            .map(|h| (h.id, h.name))
            .collect();
        hosts.sort();
        hosts
    }

    #[test]
    fn test_create_assigns_sequential_ids() {
        let store = store_with(&["a", "b", "c"]);
        assert_eq!(store.get_by_name("a").unwrap().id, 1);
        assert_eq!(store.get_by_name("c").unwrap().id, 3);
        let host = store.get_by_id(2).unwrap();
        assert_eq!(host.port, 22);
        assert_eq!(host.use_count, 0);
        assert!(host.last_used.is_none());
        assert_eq!(host.created_at, host.updated_at);
    }

    #[test]
    fn test_create_validation() {
        let mut store = HostStore::in_memory();
        let err = store.create(NewHost::new("", "h", "u")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        let err = store.create(NewHost::new("n", "  ", "u")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        let err = store.create(NewHost::new("n", "h", "")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(store.is_empty());
    }

    #[test]
    fn test_create_normalizes_port() {
        let mut store = HostStore::in_memory();
        let host = store.create(NewHost::new("a", "h", "u").port(0)).unwrap();
        assert_eq!(host.port, 22);
        let host = store.create(NewHost::new("b", "h", "u").port(99999)).unwrap();
        assert_eq!(host.port, 22);
        let host = store.create(NewHost::new("c", "h", "u").port(2222)).unwrap();
        assert_eq!(host.port, 2222);
    }

    #[test]
    fn test_duplicate_name_conflicts_and_leaves_store_unchanged() {
        let mut store = store_with(&["web", "db"]);
        let before = store.get_all();
        let err = store
            .create(NewHost::new("web", "other.example.com", "bob"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(store.get_all(), before);

        // 失败后下一个 ID 不受影响
        let host = store.create(NewHost::new("cache", "c", "u")).unwrap();
        assert_eq!(host.id, 3);
    }

    #[test]
    fn test_get_not_found() {
        let store = store_with(&["a"]);
        assert!(store.get_by_id(9).unwrap_err().is_not_found());
        assert!(store.get_by_name("zzz").unwrap_err().is_not_found());
    }

    #[test]
    fn test_delete_compacts_ids() {
        let mut store = store_with(&["one", "two", "three", "four"]);
        store.delete(2).unwrap();

        assert_eq!(
            ids_by_name(&store),
            vec![
                (1, "one".to_string()),
                (2, "three".to_string()),
                (3, "four".to_string()),
            ]
        );
        let host = store.create(NewHost::new("five", "h", "u")).unwrap();
        assert_eq!(host.id, 4);
    }

    #[test]
    fn test_delete_missing() {
        let mut store = store_with(&["a", "b"]);
        let err = store.delete(5).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_update_preserves_stats() {
        let mut store = store_with(&["a", "b"]);
        store.increment_use(1).unwrap();
        let before = store.get_by_id(1).unwrap();

        let mut edited = before.clone();
        edited.hostname = "new.example.com".into();
        edited.use_count = 99;
        edited.port = 0;
        let updated = store.update(edited).unwrap();

        assert_eq!(updated.hostname, "new.example.com");
        assert_eq!(updated.use_count, 1);
        assert_eq!(updated.port, 22);
        assert_eq!(updated.created_at, before.created_at);
        assert_eq!(updated.last_used, before.last_used);
        assert!(updated.updated_at >= before.updated_at);
    }

    #[test]
    fn test_update_errors() {
        let mut store = store_with(&["a", "b"]);
        let mut ghost = store.get_by_id(1).unwrap();
        ghost.id = 42;
        assert_eq!(store.update(ghost).unwrap_err().kind(), ErrorKind::NotFound);

        let mut renamed = store.get_by_id(1).unwrap();
        renamed.name = "b".into();
        assert_eq!(store.update(renamed).unwrap_err().kind(), ErrorKind::Conflict);

        let mut blank = store.get_by_id(1).unwrap();
        blank.username = String::new();
        assert_eq!(store.update(blank).unwrap_err().kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_ordering_most_recently_used_first() {
        let mut store = store_with(&["delta", "alpha", "charlie", "bravo"]);
        store.increment_use(3).unwrap(); // charlie
        std::thread::sleep(std::time::Duration::from_millis(5));
        store.increment_use(1).unwrap(); // delta

        let names: Vec<String> = store.get_all().into_iter().map(|h| h.name).collect();
        assert_eq!(names, vec!["delta", "charlie", "alpha", "bravo"]);
    }

    #[test]
    fn test_search() {
        let mut store = HostStore::in_memory();
        store
            .create(
                NewHost::new("web", "web.prod.example.com", "alice")
                    .description("Frontend")
                    .tags("prod, nginx"),
            )
            .unwrap();
        store
            .create(NewHost::new("db", "10.0.0.5", "bob").ip_address("10.0.0.5"))
            .unwrap();

        let names = |hosts: Vec<HostProfile>| hosts.into_iter().map(|h| h.name).collect::<Vec<_>>();
        assert_eq!(names(store.search("NGINX")), vec!["web"]);
        assert_eq!(names(store.search("frontend")), vec!["web"]);
        assert_eq!(names(store.search("10.0")), vec!["db"]);
        assert!(store.search("nomatch").is_empty());
        assert_eq!(store.search(""), store.get_all());
        assert_eq!(store.search("   "), store.get_all());

        // 非空查询中的空白是匹配内容的一部分
        assert!(store.search("web ").is_empty());
        assert_eq!(names(store.search(" nginx")), vec!["web"]);
        assert_eq!(names(store.search("prod, ")), vec!["web"]);
    }

    #[test]
    fn test_increment_use() {
        let mut store = store_with(&["a"]);
        store.increment_use(1).unwrap();
        store.increment_use(1).unwrap();
        let host = store.get_by_id(1).unwrap();
        assert_eq!(host.use_count, 2);
        assert!(host.last_used.is_some());
        assert!(store.increment_use(7).unwrap_err().is_not_found());
    }

    #[test]
    fn test_file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hosts.json");
        {
            let mut store = HostStore::open(&path).unwrap();
            store.create(NewHost::new("a", "a.example.com", "u")).unwrap();
            store.create(NewHost::new("b", "b.example.com", "u")).unwrap();
            store.create(NewHost::new("c", "c.example.com", "u")).unwrap();
            store.delete(1).unwrap();
        }

        let mut store = HostStore::open(&path).unwrap();
        assert_eq!(
            ids_by_name(&store),
            vec![(1, "b".to_string()), (2, "c".to_string())]
        );
        assert_eq!(store.create(NewHost::new("d", "d", "u")).unwrap().id, 3);
    }

    #[test]
    fn test_open_renumbers_sparse_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hosts.json");
        let mut store = HostStore::open(&path).unwrap();
        store.create(NewHost::new("a", "a", "u")).unwrap();
        store.create(NewHost::new("b", "b", "u")).unwrap();

        // 手工把 ID 改出空洞
        let mut table: HostTable = storage::load_json(&path).unwrap();
        table.hosts[0].id = 3;
        table.hosts[1].id = 7;
        table.next_id = 8;
        storage::write_json_atomic(&path, &table).unwrap();

        let store = HostStore::open(&path).unwrap();
        assert_eq!(
            ids_by_name(&store),
            vec![(1, "a".to_string()), (2, "b".to_string())]
        );
    }

    #[test]
    fn test_failed_commit_keeps_previous_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hosts.json");
        let mut store = HostStore::open(&path).unwrap();
        store.create(NewHost::new("a", "a", "u")).unwrap();
        store.create(NewHost::new("b", "b", "u")).unwrap();
        let before = store.get_all();

        // 目标路径变成目录后 rename 必然失败
        std::fs::remove_file(&path).unwrap();
        std::fs::create_dir(&path).unwrap();

        let err = store.delete(1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Storage);
        assert_eq!(store.get_all(), before);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Create,
        Delete(usize),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![Just(Op::Create), (0usize..16).prop_map(Op::Delete)]
    }

    proptest! {
        #[test]
        fn prop_ids_stay_dense(ops in proptest::collection::vec(op_strategy(), 1..60)) {
            let mut store = HostStore::in_memory();
            let mut counter = 0;
            for op in ops {
                match op {
                    Op::Create => {
                        counter += 1;
                        store.create(NewHost::new(format!("h{}", counter), "host", "u")).unwrap();
                    }
                    Op::Delete(pick) => {
                        if store.is_empty() {
                            continue;
                        }
                        let id = (pick % store.len()) as HostId + 1;
                        let mut order: Vec<String> = ids_by_name(&store)
                            .into_iter()
                            .map(|(_, name)| name)
                            .collect();
                        order.sort_by_key(|name| store.get_by_name(name).unwrap().id);
                        let victim = store.get_by_id(id).unwrap().name;
                        order.retain(|name| *name != victim);

                        store.delete(id).unwrap();

                        let mut ids: Vec<HostId> = store.get_all().iter().map(|h| h.id).collect();
                        ids.sort();
                        let expected: Vec<HostId> = (1..=store.len() as HostId).collect();
                        prop_assert_eq!(ids, expected);

                        // 相对顺序不变
                        let mut after: Vec<(HostId, String)> = ids_by_name(&store);
                        after.sort();
                        let after: Vec<String> = after.into_iter().map(|(_, n)| n).collect();
                        prop_assert_eq!(after, order);
                    }
                }
            }
            let next = store.create(NewHost::new("last", "host", "u")).unwrap();
            prop_assert_eq!(next.id as usize, store.len());
        }
    }
}
