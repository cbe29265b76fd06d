// ~/.ssh/config 解析
// 只关心 Host / HostName / User / Port 四个指令

use crate::models::{DiscoveryCandidate, EvidenceSource};
use crate::services::discovery::known_hosts::candidate_name;

/// 拆分 "Key Value" 或 "Key=Value"，返回 (小写 key, value)
fn split_directive(line: &str) -> Option<(String, &str)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let split_at = line.find(|c: char| c.is_whitespace() || c == '=')?;
    let (key, rest) = line.split_at(split_at);
    let value = rest
        .trim_start_matches(|c: char| c.is_whitespace() || c == '=')
        .trim()
        .trim_matches('"');
    if value.is_empty() {
        return None;
    }
    Some((key.to_ascii_lowercase(), value))
}

/// 查找 hostname 对应的 User
///
/// 自上而下扫描，Host 开启新作用域；作用域模式等于或包含 hostname
/// （或该段 HostName 等于 hostname）且已出现 User 时即返回，先匹配者优先。
pub fn find_user(content: &str, hostname: &str) -> Option<String> {
    let mut pattern: Option<&str> = None;
    let mut target: Option<&str> = None;
    let mut user: Option<&str> = None;

    for (key, value) in content.lines().filter_map(split_directive) {
        match key.as_str() {
            "host" => {
                pattern = Some(value);
                target = None;
                user = None;
            }
            "hostname" if pattern.is_some() => target = Some(value),
            "user" if pattern.is_some() && user.is_none() => user = Some(value),
            "match" => {
                pattern = None;
                target = None;
                user = None;
            }
            _ => {}
        }

        if let (Some(pattern), Some(user)) = (pattern, user) {
            if pattern == hostname || pattern.contains(hostname) || target == Some(hostname) {
                return Some(user.to_string());
            }
        }
    }
    None
}

/// 一个 Host 段
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HostStanza {
    pub alias: String,
    pub hostname: Option<String>,
    pub user: Option<String>,
    pub port: Option<u16>,
}

/// 收集所有具体别名（不含通配符）的 Host 段
pub fn parse_stanzas(content: &str) -> Vec<HostStanza> {
    let mut stanzas: Vec<HostStanza> = Vec::new();
    // 当前段对应的下标（一行 Host 可以列出多个别名）
    let mut current: Vec<usize> = Vec::new();

    for (key, value) in content.lines().filter_map(split_directive) {
        match key.as_str() {
            "host" => {
                current.clear();
                for alias in value.split_whitespace() {
                    if alias.contains(['*', '?', '!']) {
                        continue;
                    }
                    current.push(stanzas.len());
                    stanzas.push(HostStanza {
                        alias: alias.to_string(),
                        ..Default::default()
                    });
                }
            }
            "match" => current.clear(),
            "hostname" => {
                for &i in &current {
                    if stanzas[i].hostname.is_none() {
                        stanzas[i].hostname = Some(value.to_string());
                    }
                }
            }
            "user" => {
                for &i in &current {
                    if stanzas[i].user.is_none() {
                        stanzas[i].user = Some(value.to_string());
                    }
                }
            }
            "port" => {
                match value.parse::<u16>() {
                    Ok(port) if port > 0 => {
                        for &i in &current {
                            if stanzas[i].port.is_none() {
                                stanzas[i].port = Some(port);
                            }
                        }
                    }
                    _ => {}
                }
            }
            _ => {}
        }
    }
    stanzas
}

/// 把 Host 段转换为候选，未写 User 时由调用方推断
pub fn candidates(
    content: &str,
    mut username_for: impl FnMut(&str) -> String,
) -> Vec<DiscoveryCandidate> {
    parse_stanzas(content)
        .into_iter()
        .map(|stanza| {
            let hostname = stanza.hostname.unwrap_or_else(|| stanza.alias.clone());
            let username = stanza.user.unwrap_or_else(|| username_for(&hostname));
            DiscoveryCandidate {
                name: candidate_name(&stanza.alias),
                hostname,
                username,
                port: stanza.port.unwrap_or(crate::constants::DEFAULT_SSH_PORT),
                source: EvidenceSource::SshConfig,
                key_type: None,
            }
        })
        .collect()
}
