// 本地数据持久化服务

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::constants::{files, APP_DIR_NAME};
use crate::models::AppSettings;

/// 获取配置目录路径
/// macOS: ~/Library/Application Support/hostbook
/// Linux: ~/.config/hostbook
/// Windows: C:\Users\<用户名>\AppData\Roaming\hostbook
pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .context("无法获取系统配置目录")?
        .join(APP_DIR_NAME);
    if !config_dir.exists() {
        fs::create_dir_all(&config_dir).context("无法创建配置目录")?;
    }
    Ok(config_dir)
}

/// 获取主机数据文件路径（设置中的覆盖优先）
pub fn get_hosts_file(settings: &AppSettings) -> Result<PathBuf> {
    match &settings.storage.hosts_file {
        Some(path) => Ok(path.clone()),
        None => Ok(get_config_dir()?.join(files::HOSTS)),
    }
}

/// 获取设置配置文件路径
pub fn get_settings_file() -> Result<PathBuf> {
    Ok(get_config_dir()?.join(files::SETTINGS))
}

/// 加载应用设置
pub fn load_settings() -> Result<AppSettings> {
    let path = get_settings_file()?;
    load_json(&path)
}

/// 保存应用设置
pub fn save_settings(settings: &AppSettings) -> Result<()> {
    let path = get_settings_file()?;
    write_json_atomic(&path, settings)
}

// ======================== 通用读写 ========================

/// 读取 JSON 文件，不存在时返回默认值
pub fn load_json<T: DeserializeOwned + Default>(path: &Path) -> Result<T> {
    if !path.exists() {
        return Ok(T::default());
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("无法读取文件: {}", path.display()))?;
    if content.trim().is_empty() {
        return Ok(T::default());
    }
    let value = serde_json::from_str(&content)
        .with_context(|| format!("无法解析文件: {}", path.display()))?;
    Ok(value)
}

/// 原子写入 JSON：先写同目录临时文件并 fsync，再 rename 覆盖
/// 失败时目标文件保持原样
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let content = serde_json::to_string_pretty(value).context("无法序列化数据")?;
    write_atomic(path, content.as_bytes())
}

/// 原子替换文件内容
pub fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    if !dir.exists() {
        fs::create_dir_all(dir).with_context(|| format!("无法创建目录: {}", dir.display()))?;
    }

    let mut tmp = tempfile::NamedTempFile::new_in(dir).context("无法创建临时文件")?;
    tmp.write_all(content).context("无法写入临时文件")?;
    tmp.as_file().sync_all().context("无法同步临时文件")?;
    tmp.persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("无法替换文件: {}", path.display()))?;
    Ok(())
}
