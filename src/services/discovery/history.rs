// Shell 历史解析
// 支持 bash 纯文本、zsh 扩展格式（": 1700000000:0;cmd"）和 fish（"- cmd: ..."）

use crate::constants::discovery::SSH_COMMAND;
use crate::constants::DEFAULT_SSH_PORT;
use crate::models::{DiscoveryCandidate, EvidenceSource};
use crate::services::discovery::known_hosts::candidate_name;

/// ssh 中需要带参数的选项
const FLAGS_WITH_VALUE: &[&str] = &[
    "-B", "-b", "-c", "-D", "-E", "-e", "-F", "-I", "-i", "-J", "-L", "-l", "-m", "-O", "-o",
    "-P", "-p", "-Q", "-R", "-S", "-W", "-w",
];

/// 命令行中截断目标参数的 shell 分隔符
const SHELL_SEPARATORS: &[char] = &[';', '&', '|', '<', '>', ')'];

/// 主机名（含 IPv6 字面量）允许的字符
fn is_hostname_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | ':' | '%')
}

/// 一条 ssh 调用
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SshInvocation {
    pub user: Option<String>,
    pub host: String,
    pub port: Option<u16>,
}

/// 去掉时间戳前缀，返回实际命令
fn strip_prefix(line: &str) -> &str {
    let line = line.trim();
    if let Some(cmd) = line.strip_prefix("- cmd:") {
        return cmd.trim();
    }
    if line.starts_with(':') {
        if let Some((_, cmd)) = line.split_once(';') {
            return cmd.trim();
        }
    }
    line
}

/// 解析一行历史记录中的 ssh 调用
pub fn parse_invocation(line: &str) -> Option<SshInvocation> {
    let command = strip_prefix(line);
    if command.is_empty() || command.starts_with('#') {
        return None;
    }

    let mut args = command.split_whitespace();
    if args.next()? != SSH_COMMAND {
        return None;
    }

    let mut login: Option<String> = None;
    let mut port: Option<u16> = None;
    while let Some(arg) = args.next() {
        if arg.starts_with('-') && arg.len() > 1 {
            // "-l user" 与 "-luser" 两种写法
            let split = arg.char_indices().nth(2).map_or(arg.len(), |(i, _)| i);
            let (flag, inline) = arg.split_at(split);
            if !FLAGS_WITH_VALUE.contains(&flag) {
                continue;
            }
            let value = if inline.is_empty() { args.next()? } else { inline };
            match flag {
                "-l" => login = Some(value.to_string()),
                "-p" => port = value.parse().ok().filter(|p| *p > 0),
                _ => {}
            }
            continue;
        }

        // 第一个非选项参数就是目标，之后是远程命令；紧贴的 shell 分隔符不属于目标
        let arg = arg
            .split(SHELL_SEPARATORS)
            .next()
            .unwrap_or_default();
        let (user, host) = match arg.rsplit_once('@') {
            Some((user, host)) => (Some(user.to_string()), host),
            None => (login.clone(), arg),
        };
        if host.is_empty()
            || user.as_deref() == Some("")
            || !host.chars().all(is_hostname_char)
        {
            return None;
        }
        return Some(SshInvocation {
            user,
            host: host.to_string(),
            port,
        });
    }
    None
}

/// 主机名匹配：完全相同，或一方是另一方加上更多域名段（"box" 与 "box.example.com"）
pub fn host_matches(candidate: &str, hostname: &str) -> bool {
    if candidate.eq_ignore_ascii_case(hostname) {
        return true;
    }
    let (short, long) = if candidate.len() < hostname.len() {
        (candidate, hostname)
    } else {
        (hostname, candidate)
    };
    long.len() > short.len()
        && long.as_bytes()[short.len()] == b'.'
        && long[..short.len()].eq_ignore_ascii_case(short)
}

/// 在一份历史内容中查找连接 hostname 时使用的用户名
pub fn find_user(content: &str, hostname: &str) -> Option<String> {
    content
        .lines()
        .filter_map(parse_invocation)
        .find(|inv| inv.user.is_some() && host_matches(&inv.host, hostname))
        .and_then(|inv| inv.user)
}

/// 带显式用户名的调用转换为候选
pub fn candidates(content: &str) -> Vec<DiscoveryCandidate> {
    content
        .lines()
        .filter_map(parse_invocation)
        .filter_map(|inv| {
            let username = inv.user?;
            Some(DiscoveryCandidate {
                name: candidate_name(&inv.host),
                hostname: inv.host,
                username,
                port: inv.port.unwrap_or(DEFAULT_SSH_PORT),
                source: EvidenceSource::ShellHistory,
                key_type: None,
            })
        })
        .collect()
}
