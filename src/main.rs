// hostbook - SSH 主机目录
// 应用入口：加载设置、打开主机目录、按需执行自动发现并列出主机

use anyhow::{Context, Result};

use hostbook::models::{join_tags, AppSettings};
use hostbook::services::storage;
use hostbook::ssh::SshConfig;
use hostbook::HostDirectory;

fn main() -> Result<()> {
    // 初始化日志系统
    // 可以通过 RUST_LOG 环境变量控制日志级别，例如：RUST_LOG=debug hostbook
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false) // 不显示 target（模块路径）
        .init();

    let settings = load_or_init_settings();

    let directory = HostDirectory::open(&settings).context("无法打开主机目录")?;

    if settings.discovery.on_startup {
        match directory.run_discovery() {
            Ok(0) => {}
            Ok(count) => tracing::info!("自动发现新增 {} 台主机", count),
            Err(e) => tracing::warn!("自动发现失败: {}", e),
        }
    }

    let hosts = directory.list_hosts();
    if hosts.is_empty() {
        println!("No hosts yet.");
        return Ok(());
    }
    for host in &hosts {
        let tags = host.tag_list();
        let tags = if tags.is_empty() {
            String::new()
        } else {
            format!("  [{}]", join_tags(&tags))
        };
        println!(
            "{:>3}  {:<20} {}{}",
            host.id,
            host.name,
            SshConfig::from(host).command_line(),
            tags
        );
    }
    Ok(())
}

/// 读取设置；首次运行时写出默认设置文件，方便用户修改
fn load_or_init_settings() -> AppSettings {
    let exists = storage::get_settings_file().is_ok_and(|path| path.exists());
    if !exists {
        let settings = AppSettings::default();
        if let Err(e) = storage::save_settings(&settings) {
            tracing::warn!("默认设置写入失败: {:#}", e);
        }
        return settings;
    }
    storage::load_settings().unwrap_or_else(|e| {
        tracing::warn!("设置加载失败，使用默认设置: {:#}", e);
        AppSettings::default()
    })
}
