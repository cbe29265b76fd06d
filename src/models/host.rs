// HostProfile, NewHost 数据结构

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_SSH_PORT;

/// 主机 ID（从 1 开始连续编号，删除后会重新压缩）
pub type HostId = u32;

/// 主机档案（持久化用）
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct HostProfile {
    pub id: HostId,
    pub name: String,
    pub hostname: String,
    /// 解析得到的 IP，仅作缓存参考
    #[serde(default)]
    pub ip_address: Option<String>,
    pub port: u16,
    pub username: String,
    #[serde(default)]
    pub key_path: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// 逗号分隔的标签
    #[serde(default)]
    pub tags: Option<String>,
    /// None 表示从未连接过
    #[serde(default)]
    pub last_used: Option<DateTime<Utc>>,
    #[serde(default)]
    pub use_count: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl HostProfile {
    /// 是否已有解析地址
    pub fn has_address(&self) -> bool {
        self.ip_address.as_deref().is_some_and(|ip| !ip.is_empty())
    }

    pub fn tag_list(&self) -> Vec<String> {
        parse_tags(self.tags.as_deref().unwrap_or(""))
    }

    /// 搜索匹配（调用方负责把 query 转成小写）
    pub(crate) fn matches(&self, query_lower: &str) -> bool {
        let fields = [
            Some(self.name.as_str()),
            Some(self.hostname.as_str()),
            self.ip_address.as_deref(),
            self.description.as_deref(),
            self.tags.as_deref(),
        ];
        fields
            .into_iter()
            .flatten()
            .any(|field| field.to_lowercase().contains(query_lower))
    }
}

/// 新建主机请求
#[derive(Clone, Debug)]
pub struct NewHost {
    pub name: String,
    pub hostname: String,
    pub username: String,
    /// 允许越界输入，写入时规范化
    pub port: i64,
    pub key_path: Option<String>,
    pub description: Option<String>,
    pub tags: Option<String>,
    pub ip_address: Option<String>,
}

impl NewHost {
    pub fn new(
        name: impl Into<String>,
        hostname: impl Into<String>,
        username: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            hostname: hostname.into(),
            username: username.into(),
            port: DEFAULT_SSH_PORT as i64,
            key_path: None,
            description: None,
            tags: None,
            ip_address: None,
        }
    }

    pub fn port(mut self, port: i64) -> Self {
        self.port = port;
        self
    }

    pub fn key_path(mut self, key_path: impl Into<String>) -> Self {
        self.key_path = Some(key_path.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn tags(mut self, tags: impl Into<String>) -> Self {
        self.tags = Some(tags.into());
        self
    }

    pub fn ip_address(mut self, ip: impl Into<String>) -> Self {
        self.ip_address = Some(ip.into());
        self
    }
}

/// 端口越界（0 或 > 65535）时回退到 22
pub fn normalize_port(port: i64) -> u16 {
    match u16::try_from(port) {
        Ok(p) if p > 0 => p,
        _ => DEFAULT_SSH_PORT,
    }
}

/// 拆分逗号分隔的标签，去除空白和空项
pub fn parse_tags(tags: &str) -> Vec<String> {
    tags.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// 合并标签为 "a, b" 形式
pub fn join_tags<S: AsRef<str>>(tags: &[S]) -> String {
    tags.iter()
        .map(|t| t.as_ref().trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_port() {
        assert_eq!(normalize_port(2222), 2222);
        assert_eq!(normalize_port(0), 22);
        assert_eq!(normalize_port(-5), 22);
        assert_eq!(normalize_port(70000), 22);
        assert_eq!(normalize_port(65535), 65535);
    }

    #[test]
    fn test_parse_and_join_tags() {
        assert_eq!(parse_tags(""), Vec::<String>::new());
        assert_eq!(parse_tags(" prod, ,web ,"), vec!["prod", "web"]);
        assert_eq!(join_tags(&["prod", " ", " web "]), "prod, web");
    }

    #[test]
    fn test_tag_list() {
        let now = chrono::Utc::now();
        let mut host = HostProfile {
            id: 1,
            name: "web".into(),
            hostname: "web.example.com".into(),
            ip_address: None,
            port: 22,
            username: "alice".into(),
            key_path: None,
            description: None,
            tags: None,
            last_used: None,
            use_count: 0,
            created_at: now,
            updated_at: now,
        };
        assert!(host.tag_list().is_empty());
        host.tags = Some("ssh-detected, prod,".into());
        assert_eq!(host.tag_list(), vec!["ssh-detected", "prod"]);
    }
}
