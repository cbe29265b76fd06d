// known_hosts 解析
// 格式: host[,host...] keytype key-data [comment]

use std::net::IpAddr;
use std::path::Path;

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::constants::DEFAULT_SSH_PORT;
use crate::models::{DiscoveryCandidate, EvidenceSource};
use crate::services::storage;

static BRACKETED_HOST: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\[([^\]]+)\]:(\d+)$").expect("valid regex"));
static NAME_INVALID_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9\-]").expect("valid regex"));

/// known_hosts 中的一条有效记录
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KnownHostEntry {
    /// 第一个主机模式（已去掉 [..]:port）
    pub hostname: String,
    pub port: u16,
    pub key_type: String,
    /// 同一行列出的其余模式，例如 "host,10.0.0.5" 中的 IP
    pub aliases: Vec<String>,
}

/// 解析单行，无法使用的行返回 None
pub fn parse_line(line: &str) -> Option<KnownHostEntry> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') || line.starts_with('@') {
        return None;
    }

    let mut fields = line.split_whitespace();
    let host_field = fields.next()?;
    let key_type = fields.next()?;
    fields.next()?; // key-data

    // 哈希过的主机名无法还原
    if host_field.starts_with('|') {
        return None;
    }

    let mut patterns = host_field.split(',').filter(|p| !p.is_empty());
    let (hostname, port) = split_host_port(patterns.next()?);
    if hostname.is_empty() || is_wildcard(&hostname) {
        return None;
    }

    let aliases = patterns
        .map(|p| split_host_port(p).0)
        .filter(|p| !p.is_empty() && !is_wildcard(p))
        .collect();

    Some(KnownHostEntry {
        hostname,
        port,
        key_type: key_type.to_string(),
        aliases,
    })
}

pub fn parse(content: &str) -> Vec<KnownHostEntry> {
    content.lines().filter_map(parse_line).collect()
}

/// 把 known_hosts 内容转换为发现候选，用户名由调用方推断
pub fn candidates(
    content: &str,
    mut username_for: impl FnMut(&str) -> String,
) -> Vec<DiscoveryCandidate> {
    parse(content)
        .into_iter()
        .map(|entry| DiscoveryCandidate {
            name: candidate_name(&entry.hostname),
            username: username_for(&entry.hostname),
            hostname: entry.hostname,
            port: entry.port,
            source: EvidenceSource::KnownHosts,
            key_type: Some(entry.key_type),
        })
        .collect()
}

/// "[host]:port" -> (host, port)，其余形式端口为 22
fn split_host_port(pattern: &str) -> (String, u16) {
    if let Some(caps) = BRACKETED_HOST.captures(pattern) {
        let port = caps[2].parse::<u16>().unwrap_or(DEFAULT_SSH_PORT);
        return (caps[1].to_string(), port);
    }
    (pattern.to_string(), DEFAULT_SSH_PORT)
}

fn is_wildcard(pattern: &str) -> bool {
    pattern.contains(['*', '?', '!'])
}

/// 由主机名生成档案名称：取第一段并去掉非 [A-Za-z0-9-] 字符，
/// 结果为空时退回整个主机名（点替换为连字符）
pub fn candidate_name(hostname: &str) -> String {
    let label = hostname.split('.').next().unwrap_or_default();
    let name = NAME_INVALID_CHARS.replace_all(label, "");
    if !name.is_empty() {
        return name.into_owned();
    }
    hostname.replace('.', "-")
}

/// 查找与 hostname 同行记录的字面 IP
pub fn find_colocated_ip(content: &str, hostname: &str) -> Option<String> {
    parse(content).into_iter().find_map(|entry| {
        let mut patterns = std::iter::once(&entry.hostname).chain(entry.aliases.iter());
        if !patterns.any(|p| p == hostname) {
            return None;
        }
        std::iter::once(&entry.hostname)
            .chain(entry.aliases.iter())
            .find(|p| p.parse::<IpAddr>().is_ok())
            .cloned()
    })
}

/// 该行是否属于指定主机（host 或 [host]:port 精确匹配）
fn line_refers_to(line: &str, hostname: &str, port: u16) -> bool {
    let Some(host_field) = line.split_whitespace().next() else {
        return false;
    };
    let bracketed = format!("[{}]:{}", hostname, port);
    host_field.split(',').any(|pattern| {
        pattern == bracketed || (port == DEFAULT_SSH_PORT && pattern == hostname)
    })
}

/// 从 known_hosts 内容中去掉指定主机的记录，返回 (新内容, 删除行数)
pub fn remove_entries(content: &str, hostname: &str, port: u16) -> (String, usize) {
    let mut removed = 0;
    let mut kept = String::with_capacity(content.len());
    for line in content.lines() {
        let trimmed = line.trim_start();
        if !trimmed.starts_with('#') && line_refers_to(trimmed, hostname, port) {
            removed += 1;
            continue;
        }
        kept.push_str(line);
        kept.push('\n');
    }
    (kept, removed)
}

/// 从 known_hosts 文件中删除主机记录，文件不存在时视为无事可做
pub fn remove_from_file(path: &Path, hostname: &str, port: u16) -> Result<usize> {
    if !path.exists() {
        return Ok(0);
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("无法读取 known_hosts: {}", path.display()))?;
    let (kept, removed) = remove_entries(&content, hostname, port);
    if removed > 0 {
        storage::write_atomic(path, kept.as_bytes())?;
        debug!(
            "[Discovery] Removed {} known_hosts entries for {}:{}",
            removed, hostname, port
        );
    }
    Ok(removed)
}
